//! FastList command-line front end.
//!
//! # Responsibility
//! - Resolve configuration, start logging and open the store once per run.
//! - Map one subcommand onto one store operation and print the result.
//!
//! # Invariants
//! - Never writes `order` itself; all mutations go through `TaskStore`.
//! - Blank-title input exits with code 2; every other failure exits with 1.

use clap::{Parser, Subcommand};
use fastlist_core::db::{open_db, DbError};
use fastlist_core::{
    core_version, init_logging, ConfigError, ConfigOverrides, SqliteTaskRepository, StoreConfig,
    StoreError, Task, TaskId, TaskRepository, TaskStore,
};
use log::warn;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(version, about = "Persistent ordered task list")]
struct Cli {
    /// Directory holding the database and logs (env: FASTLIST_DATA_DIR).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error (env: FASTLIST_LOG_LEVEL).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Print tasks and summary as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show tasks in display order.
    List,
    /// Add a task at the top of the list.
    Add {
        /// Task text.
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },
    /// Mark a task done or undone, by id or position.
    Toggle { target: String },
    /// Move the task at one position to another.
    Move { from: usize, to: usize },
    /// Delete a task, by id or position.
    Rm { target: String },
    /// Print the done/total counter.
    Summary,
    /// Print the core version.
    Version,
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Db(DbError),
    Store(StoreError),
    InvalidTarget(String),
    Output(serde_json::Error),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration error: {err}"),
            Self::Db(err) => write!(f, "failed to open database: {err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::InvalidTarget(value) => {
                write!(f, "`{value}` is neither a task id nor a position")
            }
            Self::Output(err) => write!(f, "failed to encode output: {err}"),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for CliError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<StoreError> for CliError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Output(value)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Store(err)) if err.is_user_error() => {
            eprintln!("Please correct your input: {err}");
            ExitCode::from(2)
        }
        Err(err) => {
            eprintln!("Something went wrong: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    if matches!(cli.command, Command::Version) {
        println!("fastlist_core version={}", core_version());
        return Ok(());
    }

    let config = StoreConfig::load(&ConfigOverrides {
        data_dir: cli.data_dir,
        log_level: cli.log_level,
    })?;
    if let Err(err) = init_logging(config.log_level, config.log_dir()) {
        eprintln!("logging disabled: {err}");
    }

    let conn = open_db(config.db_path())?;
    let repo = SqliteTaskRepository::try_new(&conn).map_err(StoreError::from)?;
    let mut store = TaskStore::open(repo)?;

    match cli.command {
        Command::List => {}
        Command::Add { title } => {
            store.create(title.join(" "))?;
        }
        Command::Toggle { target } => {
            let id = resolve_target(&store, &target)?;
            store.toggle_done(id)?;
        }
        Command::Move { from, to } => {
            store.move_task(from, to)?;
        }
        Command::Rm { target } => {
            let id = resolve_target(&store, &target)?;
            store.delete(id)?;
        }
        Command::Summary => {
            print_summary_only(&store, cli.json)?;
            return Ok(());
        }
        Command::Version => {}
    }

    print_tasks(&store, cli.json)
}

/// Accepts a full task id or a zero-based position in the current list.
fn resolve_target<R: TaskRepository>(
    store: &TaskStore<R>,
    target: &str,
) -> Result<TaskId, CliError> {
    if let Ok(id) = Uuid::parse_str(target) {
        return Ok(id);
    }
    let position: usize = target
        .parse()
        .map_err(|_| CliError::InvalidTarget(target.to_string()))?;
    store
        .tasks()
        .get(position)
        .map(|task| task.id)
        .ok_or_else(|| {
            warn!(
                "event=cli_target module=cli status=rejected position={} len={}",
                position,
                store.len()
            );
            CliError::Store(StoreError::OutOfRange {
                position,
                len: store.len(),
            })
        })
}

fn print_tasks<R: TaskRepository>(store: &TaskStore<R>, json: bool) -> Result<(), CliError> {
    if json {
        let view = serde_json::json!({
            "tasks": store.tasks(),
            "summary": store.summary(),
        });
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    for task in store.tasks() {
        println!("{}", format_task(task));
    }
    println!("{}", store.summary());
    Ok(())
}

fn print_summary_only<R: TaskRepository>(store: &TaskStore<R>, json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string(&store.summary())?);
    } else {
        println!("{}", store.summary());
    }
    Ok(())
}

fn format_task(task: &Task) -> String {
    let mark = if task.done { 'x' } else { ' ' };
    format!("{}. [{}] {}  ({})", task.order, mark, task.title, task.id)
}

#[cfg(test)]
mod tests {
    use super::{format_task, resolve_target, Cli, CliError, Command};
    use clap::Parser;
    use fastlist_core::db::open_db_in_memory;
    use fastlist_core::{SqliteTaskRepository, StoreError, Task, TaskStore};

    #[test]
    fn format_task_marks_done() {
        let mut task = Task::new("Buy milk").unwrap();
        task.order = 2;
        task.done = true;
        assert_eq!(
            format_task(&task),
            format!("2. [x] Buy milk  ({})", task.id)
        );
    }

    #[test]
    fn add_joins_words() {
        let cli = Cli::try_parse_from(["fastlist", "add", "Call", "Bob"]).unwrap();
        match cli.command {
            Command::Add { title } => assert_eq!(title.join(" "), "Call Bob"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["fastlist", "list", "--json", "--data-dir", "/tmp/x"])
            .unwrap();
        assert!(cli.json);
        assert_eq!(cli.data_dir.unwrap().to_str(), Some("/tmp/x"));
    }

    #[test]
    fn resolve_target_accepts_id_or_position() {
        let conn = open_db_in_memory().unwrap();
        let mut store = TaskStore::open(SqliteTaskRepository::try_new(&conn).unwrap()).unwrap();
        let b = store.create("B").unwrap();
        let a = store.create("A").unwrap();

        assert_eq!(resolve_target(&store, "1").unwrap(), b.id);
        assert_eq!(resolve_target(&store, &a.id.to_string()).unwrap(), a.id);
        assert!(matches!(
            resolve_target(&store, "9"),
            Err(CliError::Store(StoreError::OutOfRange { position: 9, len: 2 }))
        ));
        assert!(matches!(
            resolve_target(&store, "nope"),
            Err(CliError::InvalidTarget(_))
        ));
    }
}
