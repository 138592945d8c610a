//! Demo 01: Basic Usage
//!
//! Adds, edits, toggles, filters and sorts tasks, then reopens the store to
//! show the state coming back from SQLite.
//!
//! Run with: cargo run --example 01_basic_usage

use chrono::{Duration, Utc};
use eyre::Result;
use todostore::{PriorityFilter, SqliteKv, StoreEvent, StoreOptions, TaskDraft, TaskPriority, TaskStatus, TaskStore};

fn main() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let db_path = temp_dir.path().join("todostore.db");

    println!("todostore Basic Usage Demo");
    println!("==========================\n");

    {
        let mut store = TaskStore::open(SqliteKv::open(&db_path)?, StoreOptions::default())?;
        store.subscribe(|event| {
            if let StoreEvent::PersistenceFailed { message } = event {
                println!("   (persistence warning: {})", message);
            }
        });

        println!("1. ADD - three tasks...");
        let milk = store.add_task(TaskDraft {
            title: "Buy milk".to_string(),
            description: "2%".to_string(),
            status: TaskStatus::Todo,
            priority: TaskPriority::Low,
            deadline: Utc::now() + Duration::days(1),
        });
        let report = store.add_task(TaskDraft {
            title: "Write report".to_string(),
            description: "Quarterly numbers".to_string(),
            status: TaskStatus::InProgress,
            priority: TaskPriority::High,
            deadline: Utc::now() + Duration::days(3),
        });
        store.add_task(TaskDraft {
            title: "Call plumber".to_string(),
            description: "Kitchen sink".to_string(),
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            deadline: Utc::now() - Duration::days(1),
        });
        println!("   Store has {} tasks\n", store.len());

        println!("2. TOGGLE - finishing the report...");
        let status = store.toggle_task_status(&report)?;
        println!("   Report is now {}\n", status);

        println!("3. EDIT - milk becomes urgent...");
        store.edit_task(
            &milk,
            TaskDraft {
                title: "Buy milk".to_string(),
                description: "2%, two litres".to_string(),
                status: TaskStatus::Todo,
                priority: TaskPriority::High,
                deadline: Utc::now(),
            },
        )?;

        println!("4. FILTER + SORT - high priority only, by priority...");
        store.filter_tasks_by_priority(TaskPriority::High);
        store.sort_filtered_tasks(true);
        for task in store.filtered_tasks() {
            println!("   - [{}] {} ({})", task.priority, task.title, task.status);
        }
        println!();

        println!("5. MISSING ID - removing a task that does not exist...");
        match store.remove_task("no-such-task") {
            Ok(()) => println!("   unexpectedly removed"),
            Err(e) => println!("   {}\n", e),
        }

        store.flush()?;
    }

    println!("6. REOPEN - state rehydrated from storage...");
    let mut store = TaskStore::open(SqliteKv::open(&db_path)?, StoreOptions::default())?;
    println!("   {} tasks, filter = {}, sort = {:?}", store.len(), store.filter(), store.sort_mode());
    let now = Utc::now();
    for task in store.tasks() {
        let expired = if task.is_expired(now) { " (expired)" } else { "" };
        println!("   - {} : {}{}", task.id, task.title, expired);
    }

    store.filter_tasks_by_priority(PriorityFilter::All);
    println!("\n   Showing all: {} tasks in view", store.filtered_tasks().len());

    println!("\nDemo complete!");
    Ok(())
}
