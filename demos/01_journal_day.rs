//! Example 01: A Journal Day
//!
//! This example walks one day's entry through its lifecycle: draft edits,
//! a rejected submit, a successful submit, an amend that is rolled back,
//! and finally the month's CSV.
//!
//! Run with: cargo run --example 01_journal_day

use chrono::NaiveDate;
use daybook::{ActivityKind, EntryEdits, FileKv, Journal, YearMonth, build_month_csv};
use eyre::Result;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Create a temporary directory for this example
    let temp_dir = tempfile::tempdir()?;
    let journal = Journal::new(FileKv::open(temp_dir.path())?);

    println!("daybook Journal Day Example");
    println!("===========================\n");
    println!("Data path: {}\n", temp_dir.path().display());

    let date = NaiveDate::from_ymd_opt(2025, 3, 14).ok_or_else(|| eyre::eyre!("bad date"))?;

    // DRAFT: every change is saved as it is made
    println!("1. DRAFT - Adding activities...");
    let mut day = journal.open_day(date).await?;
    day.add_activity(ActivityKind::Productive, "Went to the gym").await?;
    day.add_activity(ActivityKind::Productive, "Read a chapter").await?;
    day.add_activity(ActivityKind::Unproductive, "Scrolled for an hour").await?;
    println!("   State: {:?}", day.state());
    println!("   Stored: {}\n", journal.entries.get_entry(date).await?.is_some());

    // SUBMIT: needs a mood answer first
    println!("2. SUBMIT - Trying without a mood...");
    if let Err(e) = day.submit().await {
        println!("   Rejected: {}", e);
    }
    day.set_feel_good(Some(true)).await?;
    day.set_reason("Got things done").await?;
    day.submit().await?;
    println!("   State after answering: {:?}\n", day.state());

    // AMEND: removing every activity cannot be submitted, so nothing changes
    println!("3. AMEND - Removing all productive activities...");
    let edits = EntryEdits {
        remove_productive: vec![1, 2],
        ..Default::default()
    };
    if let Err(e) = day.amend(&edits).await {
        println!("   Rolled back: {}", e);
    }
    println!("   Still submitted: {:?}", day.entry().productive_activities);

    let edits = EntryEdits {
        add_productive: vec!["Cooked dinner".to_string()],
        ..Default::default()
    };
    day.amend(&edits).await?;
    println!("   After a valid amend: {:?}\n", day.entry().productive_activities);

    // EXPORT: one row per day of the month
    println!("4. EXPORT - Rendering March 2025...");
    let month = YearMonth::new(2025, 3)?;
    let entries = journal.entries.list_entries_for_month(month).await?;
    let csv = build_month_csv(&entries, month, date);
    for line in csv.lines().take(1).chain(csv.lines().filter(|l| l.contains("2025-03-14"))) {
        println!("   {}", line);
    }
    println!("   ({} rows)\n", csv.lines().count() - 1);

    println!("Example complete!");
    Ok(())
}
