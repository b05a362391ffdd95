use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pomonote_ipc::{
    read_message, write_message, Command, RecoveryDecision, Response, TaskStatus, TimerEvent,
    TimerStatus, SOCKET_PATH,
};
use std::path::PathBuf;
use tokio::io::BufReader;
use tokio::net::UnixStream;

#[derive(Parser)]
#[command(name = "pomonotectl")]
#[command(about = "Control the pomonote timer", long_about = None)]
struct Cli {
    /// Socket of the running pomonote daemon
    #[arg(long, default_value = SOCKET_PATH)]
    socket: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the timer on a task
    Start {
        task: String,
        /// Vault-relative path of the task note
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Pause the timer
    Pause,
    /// Resume the timer
    Resume,
    /// Pause or resume
    Toggle,
    /// Finish the work block and keep its session note
    Complete {
        /// Rate your energy for the finished session (0-5)
        #[arg(short, long)]
        energy: Option<u8>,
    },
    /// Give up on the work block, keeping a note marked `stop`
    Stop,
    /// Discard the work block and its note
    Cancel,
    /// Get timer status
    Status,
    /// Decide what to do with a session left open by a crash
    Recover {
        #[arg(value_enum)]
        decision: Option<Decision>,
    },
    /// Rate the energy of a finished session (0-5)
    Rate { session: String, level: u8 },
    /// Manage tasks
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Stream timer events until interrupted
    Watch,
}

#[derive(Subcommand)]
enum TaskAction {
    /// Add a new task
    Add { name: String },
    /// List tasks
    List {
        #[arg(short, long, value_enum)]
        status: Option<Status>,
    },
    /// Change a task's status
    Set {
        path: String,
        #[arg(value_enum)]
        status: Status,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Decision {
    Resume,
    Abandon,
    Ignore,
}

#[derive(Clone, Copy, ValueEnum)]
enum Status {
    Todo,
    Doing,
    Done,
}

impl From<Decision> for RecoveryDecision {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Resume => RecoveryDecision::Resume,
            Decision::Abandon => RecoveryDecision::Abandon,
            Decision::Ignore => RecoveryDecision::Ignore,
        }
    }
}

impl From<Status> for TaskStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Todo => TaskStatus::Todo,
            Status::Doing => TaskStatus::Doing,
            Status::Done => TaskStatus::Done,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Convert CLI command to IPC command
    let (command, energy) = match cli.command {
        Commands::Start { task, path } => (
            Command::Start {
                task_name: task,
                task_path: path,
            },
            None,
        ),
        Commands::Pause => (Command::Pause, None),
        Commands::Resume => (Command::Resume, None),
        Commands::Toggle => (Command::Toggle, None),
        Commands::Complete { energy } => (Command::Complete, energy),
        Commands::Stop => (Command::Stop, None),
        Commands::Cancel => (Command::Cancel, None),
        Commands::Status => (Command::Status, None),
        Commands::Recover { decision: None } => (Command::Recovery, None),
        Commands::Recover {
            decision: Some(decision),
        } => (
            Command::Recover {
                decision: decision.into(),
            },
            None,
        ),
        Commands::Rate { session, level } => (Command::RateEnergy { session, level }, None),
        Commands::Task { action } => match action {
            TaskAction::Add { name } => (Command::AddTask { name }, None),
            TaskAction::List { status } => (
                Command::ListTasks {
                    status: status.map(Into::into),
                },
                None,
            ),
            TaskAction::Set { path, status } => (
                Command::SetTaskStatus {
                    path,
                    status: status.into(),
                },
                None,
            ),
        },
        Commands::Watch => return watch(&cli.socket).await,
    };

    let response = send_command(&cli.socket, command).await?;
    print_response(&response)?;

    // Chain the energy rating onto the session `complete` just returned.
    if let (Some(level), Response::Session(session)) = (energy, &response) {
        let rated = send_command(
            &cli.socket,
            Command::RateEnergy {
                session: session.clone(),
                level,
            },
        )
        .await?;
        print_response(&rated)?;
    }

    Ok(())
}

fn print_response(response: &Response) -> Result<()> {
    match response {
        Response::Ok => println!("OK"),
        Response::Session(session) => println!("Session: {}", session),
        Response::Status(status) => print_status(status),
        Response::Recovery(None) => println!("No unfinished session"),
        Response::Recovery(Some(info)) => {
            println!("Unfinished session: {}", info.session);
            println!("Task: {}", info.task_name);
            println!("Started: {} ({} ago)", info.started, clock(info.elapsed_seconds));
            println!("Decide with: pomonotectl recover resume|abandon|ignore");
        }
        Response::Tasks(tasks) => {
            for task in tasks {
                let check = match task.status {
                    TaskStatus::Done => "✓",
                    TaskStatus::Doing => "~",
                    TaskStatus::Todo => " ",
                };
                println!("[{}] {} ({})", check, task.name, task.path);
            }
        }
        Response::Task(task) => println!("{} [{}] {}", task.path, task.status.as_str(), task.name),
        Response::Event(event) => print_event(event),
        Response::Error(e) => bail!("{}", e),
    }
    Ok(())
}

fn print_status(status: &TimerStatus) {
    println!("State: {}", status.phase.as_str());
    if let Some(task) = &status.task_name {
        println!("Task: {}", task);
    }
    if let Some(session) = &status.session {
        println!("Session: {}", session);
    }
    println!("Elapsed: {}", clock(status.elapsed_seconds));
    if status.current_pomodoro_index > 0 {
        println!("Pomodoro: #{}", status.current_pomodoro_index);
    }
}

fn print_event(event: &TimerEvent) {
    match event {
        TimerEvent::Tick { status } => println!(
            "tick {} #{}",
            clock(status.elapsed_seconds),
            status.current_pomodoro_index
        ),
        TimerEvent::PomodoroComplete { count } => println!("pomodoro-complete {}", count),
        TimerEvent::Start { task_name, .. } => println!("start {}", task_name),
        TimerEvent::Complete { session } | TimerEvent::Stop { session } => {
            println!("{} {}", event.name(), session)
        }
        TimerEvent::SessionWriteFailed { session, message } => {
            println!("session-write-failed {}: {}", session, message)
        }
        other => println!("{}", other.name()),
    }
}

fn clock(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    )
}

async fn connect(socket: &PathBuf) -> Result<UnixStream> {
    UnixStream::connect(socket)
        .await
        .with_context(|| format!("Could not connect to {:?} - is pomonote running?", socket))
}

async fn send_command(socket: &PathBuf, cmd: Command) -> Result<Response> {
    let stream = connect(socket).await?;
    let (reader, mut writer) = stream.into_split();

    // Send command
    write_message(&mut writer, &cmd).await?;

    // Read response
    let mut reader = BufReader::new(reader);
    read_message(&mut reader)
        .await?
        .context("pomonote closed the connection without answering")
}

async fn watch(socket: &PathBuf) -> Result<()> {
    let stream = connect(socket).await?;
    let (reader, mut writer) = stream.into_split();
    write_message(&mut writer, &Command::Watch).await?;

    let mut reader = BufReader::new(reader);
    while let Some(response) = read_message::<_, Response>(&mut reader).await? {
        print_response(&response)?;
    }
    Ok(())
}
