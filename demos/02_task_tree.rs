//! Example 02: Task Tree
//!
//! This example builds a small task hierarchy and shows how completion
//! cascades: completing a task completes its subtasks, and reopening a
//! subtask reopens its parents. Deleting a task removes its subtree.
//!
//! Run with: cargo run --example 02_task_tree

use daybook::{Journal, MemoryKv, Task, TaskIndex};
use eyre::Result;

fn print_tree(tasks: &[Task]) {
    for (depth, task) in TaskIndex::new(tasks).depth_first() {
        let mark = if task.completed { "[x]" } else { "[ ]" };
        println!("   {}{} {}", "  ".repeat(depth), mark, task.title);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let journal = Journal::new(MemoryKv::new());

    println!("daybook Task Tree Example");
    println!("=========================\n");

    println!("1. BUILD - Adding tasks...");
    let trip = journal.tasks.add_task("Plan trip", None).await?;
    let book = journal.tasks.add_task("Book flights", Some(&trip.id)).await?;
    let pack = journal.tasks.add_task("Pack", Some(&trip.id)).await?;
    journal.tasks.add_task("Charger", Some(&pack.id)).await?;
    journal.tasks.add_task("Water plants", None).await?;
    print_tree(&journal.tasks.list_hierarchy().await?);
    println!();

    println!("2. COMPLETE - Toggling 'Plan trip'...");
    journal.tasks.toggle_completion(&trip.id).await?;
    print_tree(&journal.tasks.list_hierarchy().await?);
    println!();

    println!("3. REOPEN - Toggling 'Book flights'...");
    journal.tasks.toggle_completion(&book.id).await?;
    print_tree(&journal.tasks.list_hierarchy().await?);
    println!();

    println!("4. DELETE - Removing 'Pack'...");
    let removed = journal.tasks.delete_task(&pack.id).await?;
    println!("   Removed {} task(s)", removed.len());
    print_tree(&journal.tasks.list_hierarchy().await?);
    println!();

    println!("Example complete!");
    Ok(())
}
