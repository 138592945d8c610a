use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use eyre::{Result, eyre};
use std::path::PathBuf;
use todostore::{
    Backend, Config, PriorityFilter, StoreEvent, Task, TaskDraft, TaskPriority, TaskStatus, TaskStore,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "todostore")]
#[command(about = "todostore CLI - manage local tasks persisted to a key-value store")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Path to a YAML config file (default: platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured storage backend
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    /// Override the configured data directory
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Seed sample tasks when nothing has been stored yet
    #[arg(long)]
    seed: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task
    Add {
        title: String,
        description: String,
        #[arg(short, long, value_enum, default_value = "low")]
        priority: PriorityArg,
        #[arg(short, long, value_enum, default_value = "todo")]
        status: StatusArg,
        /// RFC 3339 timestamp or YYYY-MM-DD (default: now)
        #[arg(long, value_parser = parse_deadline)]
        deadline: Option<DateTime<Utc>>,
    },

    /// Edit a task; omitted fields keep their current value
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(short, long, value_enum)]
        priority: Option<PriorityArg>,
        #[arg(short, long, value_enum)]
        status: Option<StatusArg>,
        #[arg(long, value_parser = parse_deadline)]
        deadline: Option<DateTime<Utc>>,
    },

    /// Remove a task
    Remove { id: String },

    /// Toggle a task between done and not done
    Toggle { id: String },

    /// List tasks through the filtered view
    List {
        /// Only show one priority (default: the stored filter)
        #[arg(short, long, value_enum)]
        priority: Option<FilterArg>,
        /// Order the view (default: the stored sort mode)
        #[arg(short, long, value_enum)]
        sort: Option<SortArg>,
    },

    /// Remove every task and the stored state
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum PriorityArg {
    Low,
    Medium,
    High,
}

impl From<PriorityArg> for TaskPriority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Low => TaskPriority::Low,
            PriorityArg::Medium => TaskPriority::Medium,
            PriorityArg::High => TaskPriority::High,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Todo,
    InProgress,
    Done,
}

impl From<StatusArg> for TaskStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Todo => TaskStatus::Todo,
            StatusArg::InProgress => TaskStatus::InProgress,
            StatusArg::Done => TaskStatus::Done,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FilterArg {
    All,
    Low,
    Medium,
    High,
}

impl From<FilterArg> for PriorityFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::All => PriorityFilter::All,
            FilterArg::Low => PriorityFilter::Only(TaskPriority::Low),
            FilterArg::Medium => PriorityFilter::Only(TaskPriority::Medium),
            FilterArg::High => PriorityFilter::Only(TaskPriority::High),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Priority,
    Id,
}

fn parse_deadline(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid deadline '{}': expected RFC 3339 or YYYY-MM-DD", s))
}

fn main() -> Result<()> {
    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if cli.seed {
        config.seed_sample_tasks = true;
    }

    let storage = config.open_storage()?;
    let mut store = TaskStore::open(storage, config.store_options())?;
    store.subscribe(|event| {
        if let StoreEvent::PersistenceFailed { message } = event {
            eprintln!("{} {}", "warning:".yellow().bold(), message);
        }
    });

    match cli.command {
        Commands::Add {
            title,
            description,
            priority,
            status,
            deadline,
        } => {
            let id = store.add_task(TaskDraft {
                title,
                description,
                status: status.into(),
                priority: priority.into(),
                deadline: deadline.unwrap_or_else(Utc::now),
            });
            println!("Added task {}", id.bold());
        }
        Commands::Edit {
            id,
            title,
            description,
            priority,
            status,
            deadline,
        } => {
            let current = store.get_task(&id).cloned().ok_or_else(|| eyre!("Task not found: {}", id))?;
            store.edit_task(
                &id,
                TaskDraft {
                    title: title.unwrap_or(current.title),
                    description: description.unwrap_or(current.description),
                    status: status.map(Into::into).unwrap_or(current.status),
                    priority: priority.map(Into::into).unwrap_or(current.priority),
                    deadline: deadline.unwrap_or(current.deadline),
                },
            )?;
            println!("Updated task {}", id.bold());
        }
        Commands::Remove { id } => {
            store.remove_task(&id)?;
            println!("Removed task {}", id.bold());
        }
        Commands::Toggle { id } => {
            let status = store.toggle_task_status(&id)?;
            println!("Task {} is now {}", id.bold(), paint_status(status));
        }
        Commands::List { priority, sort } => {
            if let Some(filter) = priority {
                store.filter_tasks_by_priority(filter);
            }
            if let Some(sort) = sort {
                store.sort_filtered_tasks(matches!(sort, SortArg::Priority));
            }
            print_tasks(&store);
        }
        Commands::Clear => {
            store.clear_tasks();
            println!("Cleared all tasks");
        }
    }

    store.flush()?;
    Ok(())
}

fn print_tasks(store: &TaskStore) {
    let view = store.filtered_tasks();
    let sort = store.sort_mode().map(|m| m.to_string()).unwrap_or_else(|| "insertion".to_string());
    println!(
        "{} of {} tasks (filter: {}, order: {})",
        view.len(),
        store.len(),
        store.filter(),
        sort
    );

    let now = Utc::now();
    for task in view {
        print_task(task, now);
    }
}

fn print_task(task: &Task, now: DateTime<Utc>) {
    let title = if task.status == TaskStatus::Done {
        task.title.strikethrough().to_string()
    } else {
        task.title.bold().to_string()
    };
    let expired = expired_badge(task, now)
        .map(|badge| format!(" {}", badge.red().bold()))
        .unwrap_or_default();

    println!(
        "{} [{}] [{}] {} (due {}){}",
        task.id.dimmed(),
        paint_status(task.status),
        paint_priority(task.priority),
        title,
        task.deadline.format("%b %d %Y"),
        expired
    );
    println!("    {}", task.description.dimmed());
}

/// Shown for any task past its deadline, whatever its status
fn expired_badge(task: &Task, now: DateTime<Utc>) -> Option<&'static str> {
    task.is_expired(now).then_some("EXPIRED")
}

fn paint_status(status: TaskStatus) -> colored::ColoredString {
    match status {
        TaskStatus::Todo => status.to_string().normal(),
        TaskStatus::InProgress => status.to_string().cyan(),
        TaskStatus::Done => status.to_string().green(),
    }
}

fn paint_priority(priority: TaskPriority) -> colored::ColoredString {
    match priority {
        TaskPriority::High => priority.to_string().red(),
        TaskPriority::Medium => priority.to_string().yellow(),
        TaskPriority::Low => priority.to_string().green(),
    }
}
