use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pomonote::ipc::server;
use pomonote::{
    drivers, load_config, notify, FileSessionStore, FileTaskRepository, Persistence,
    PomodoroPlugin, SessionStore, SystemClock, TimerService,
};

#[derive(Parser)]
#[command(name = "pomonote")]
#[command(about = "Pomodoro timer for a note vault", long_about = None)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Vault directory, overriding the config file
    #[arg(long)]
    vault: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    if let Some(vault) = args.vault {
        config.vault_dir = vault;
    }
    init_tracing(&config.log_level);
    info!(vault = %config.vault_dir.display(), "starting pomonote");

    let persistence = match Persistence::default_location() {
        Ok(persistence) => Some(persistence),
        Err(e) => {
            warn!(error = %e, "crash snapshots disabled");
            None
        }
    };
    let store = FileSessionStore::new(&config.vault_dir, config.sessions_folder.as_str());
    let tasks = FileTaskRepository::new(&config.vault_dir, config.tasks_folder.as_str());
    let timer = TimerService::new(store, Arc::new(SystemClock), config.pomodoro());
    let mut plugin = PomodoroPlugin::new(timer, Box::new(tasks), persistence, config.recovery);

    let (events_tx, _) = broadcast::channel(64);
    {
        let tx = events_tx.clone();
        plugin.timer_mut().subscribe(move |event| {
            // No watchers connected is not an error.
            let _ = tx.send(event.clone());
        });
    }
    if config.notifications {
        plugin.timer_mut().subscribe(notify::desktop_notifier());
    }

    // Phase 1: load the note index. Phase 2 (recovery) only runs on success.
    plugin.on_load();
    match plugin.timer_mut().store_mut().load_index() {
        Ok(ready) => {
            if let Some(pending) = plugin.on_index_ready(ready) {
                info!(
                    session = %pending.session,
                    task = %pending.task_name,
                    started = %pending.started,
                    "unfinished session waiting for a decision (pomonotectl recover ...)"
                );
            }
        }
        Err(e) => error!(error = %e, "could not load session index; skipping recovery"),
    }

    let plugin = Arc::new(Mutex::new(plugin));
    let ticker = drivers::spawn_ticker(plugin.clone(), config.tick_interval());
    let snapshotter = drivers::spawn_snapshotter(plugin.clone(), config.snapshot_interval());

    let outcome = tokio::select! {
        res = server::start(&config.socket_path, plugin.clone(), events_tx.clone()) => res,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    };

    ticker.abort();
    snapshotter.abort();
    plugin.lock().await.on_unload();
    let _ = std::fs::remove_file(&config.socket_path);

    outcome
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
