//! Unix domain socket server for IPC

use anyhow::{Context, Result};
use pomonote_ipc::{read_message, write_message, Command, Response, TimerEvent};
use std::path::Path;
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::drivers::SharedPlugin;
use crate::plugin::PomodoroPlugin;
use crate::session::{SessionHandle, SessionStore};

pub async fn start<S>(
    socket_path: &Path,
    plugin: SharedPlugin<S>,
    events: broadcast::Sender<TimerEvent>,
) -> Result<()>
where
    S: SessionStore + 'static,
{
    // Remove old socket if it exists
    let _ = std::fs::remove_file(socket_path);

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind IPC socket at {:?}", socket_path))?;
    info!("IPC server listening on {}", socket_path.display());

    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let plugin = plugin.clone();
                let events = events.subscribe();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, plugin, events).await {
                        error!("Error handling client: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
            }
        }
    }
}

async fn handle_client<S>(
    stream: UnixStream,
    plugin: SharedPlugin<S>,
    mut events: broadcast::Receiver<TimerEvent>,
) -> Result<()>
where
    S: SessionStore + 'static,
{
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let Some(command) = read_message::<_, Command>(&mut reader).await? else {
        return Ok(());
    };
    debug!(?command, "IPC command received");

    if command == Command::Watch {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if write_message(&mut writer, &Response::Event(event)).await.is_err() {
                        debug!("watcher disconnected");
                        return Ok(());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "watcher fell behind; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }

    let response = {
        let mut plugin = plugin.lock().await;
        dispatch(&mut plugin, command)
    };
    write_message(&mut writer, &response).await?;
    Ok(())
}

/// Runs one command against the plugin. Every failure becomes
/// `Response::Error` so the client can show it.
pub fn dispatch<S: SessionStore>(plugin: &mut PomodoroPlugin<S>, command: Command) -> Response {
    let result = match command {
        Command::Start {
            task_name,
            task_path,
        } => plugin
            .timer_mut()
            .start(&task_name, task_path.as_deref())
            .map(|session| Response::Session(session.to_string()))
            .map_err(|e| e.to_string()),
        Command::Pause => plugin
            .timer_mut()
            .pause()
            .map(|_| Response::Ok)
            .map_err(|e| e.to_string()),
        Command::Resume => plugin
            .timer_mut()
            .resume()
            .map(|_| Response::Ok)
            .map_err(|e| e.to_string()),
        Command::Toggle => plugin
            .timer_mut()
            .toggle_pause()
            .map(|_| Response::Ok)
            .map_err(|e| e.to_string()),
        Command::Complete => plugin
            .timer_mut()
            .complete()
            .map(|session| Response::Session(session.to_string()))
            .map_err(|e| e.to_string()),
        Command::Stop => plugin
            .timer_mut()
            .stop()
            .map(|session| Response::Session(session.to_string()))
            .map_err(|e| e.to_string()),
        Command::Cancel => plugin
            .timer_mut()
            .cancel()
            .map(|_| Response::Ok)
            .map_err(|e| e.to_string()),
        Command::Status => Ok(Response::Status(plugin.timer().status())),
        Command::Recovery => Ok(Response::Recovery(plugin.pending_recovery())),
        Command::Recover { decision } => plugin
            .decide_recovery(decision)
            .map(|_| Response::Ok)
            .map_err(|e| e.to_string()),
        Command::RateEnergy { session, level } => plugin
            .timer_mut()
            .rate_energy(&SessionHandle::new(session), level)
            .map(|_| Response::Ok)
            .map_err(|e| e.to_string()),
        Command::AddTask { name } => plugin
            .tasks_mut()
            .create(&name)
            .map(Response::Task)
            .map_err(|e| e.to_string()),
        Command::ListTasks { status } => plugin
            .tasks()
            .list_tasks_by_status(status)
            .map(Response::Tasks)
            .map_err(|e| e.to_string()),
        Command::SetTaskStatus { path, status } => plugin
            .tasks_mut()
            .update_status(&path, status)
            .map(Response::Task)
            .map_err(|e| e.to_string()),
        Command::Watch => Err("watch needs a streaming connection".to_string()),
    };

    result.unwrap_or_else(|message| {
        warn!(%message, "IPC command failed");
        Response::Error(message)
    })
}
