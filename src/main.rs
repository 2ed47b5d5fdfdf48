use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use daybook::calendar::{self, YearMonth};
use daybook::export::{self, AutoExportCheck, ExportChoice, Resolution};
use daybook::{
    ActivityKind, AnyKv, Backend, Config, DaySession, EntryEdits, EntryState, Journal, JournalError, Task, TaskIndex,
    TaskPatch,
};
use eyre::{Result, eyre};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "daybook")]
#[command(about = "Daily journal and hierarchical task tracker")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Config file (default: <config dir>/daybook/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory; overrides the config file and DAYBOOK_HOME
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Storage backend; overrides the config file
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or change the journal entry for a day
    Entry {
        /// Day to work on (default: the picked date, else today)
        #[arg(short = 'D', long)]
        date: Option<NaiveDate>,

        #[command(subcommand)]
        action: EntryAction,
    },

    /// Calendar view and date picking
    Calendar {
        #[command(subcommand)]
        action: CalendarAction,
    },

    /// Manage the task tree
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Export a month to CSV
    Export {
        /// Month as YYYY-MM (default: current month)
        month: Option<YearMonth>,

        /// Output directory (default: from config)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Offer last month's export, once per month
    AutoExport {
        /// Export last month if the offer is pending
        #[arg(long, conflicts_with_all = ["decline", "reset"])]
        accept: bool,

        /// Dismiss the pending offer for this month
        #[arg(long, conflicts_with = "reset")]
        decline: bool,

        /// Forget that this month's offer was handled
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mood {
    Yes,
    No,
    Unset,
}

impl Mood {
    fn as_option(self) -> Option<bool> {
        match self {
            Mood::Yes => Some(true),
            Mood::No => Some(false),
            Mood::Unset => None,
        }
    }
}

#[derive(Subcommand)]
enum EntryAction {
    /// Print the entry
    Show,

    /// Add an activity
    Add {
        #[arg(value_enum)]
        kind: ActivityKind,
        text: String,
    },

    /// Remove an activity by its position (starting at 1)
    Remove {
        #[arg(value_enum)]
        kind: ActivityKind,
        position: usize,
    },

    /// Answer "Do you feel good about your day?"
    Mood {
        #[arg(value_enum)]
        answer: Mood,

        /// Why
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Finalize the entry
    Submit,

    /// Change a submitted entry and submit it again; nothing is kept if
    /// the result cannot be submitted
    Edit {
        #[arg(long)]
        add_productive: Vec<String>,
        #[arg(long)]
        add_unproductive: Vec<String>,
        #[arg(long)]
        remove_productive: Vec<usize>,
        #[arg(long)]
        remove_unproductive: Vec<usize>,
        #[arg(long, value_enum)]
        mood: Option<Mood>,
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Subcommand)]
enum CalendarAction {
    /// List a month's days, marking completed ones
    Month {
        /// Month as YYYY-MM (default: current month)
        month: Option<YearMonth>,
    },

    /// Pick the date `entry` commands work on
    Pick { date: NaiveDate },

    /// Forget the picked date; `entry` goes back to today
    Clear,
}

#[derive(Subcommand)]
enum TaskAction {
    /// Add a task, optionally under a parent
    Add {
        title: String,
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Print the task tree
    List,

    /// Flip completion (cascades to subtasks or parents)
    Toggle { id: String },

    /// Change a task's title
    Rename { id: String, title: String },

    /// Delete a task and all of its subtasks
    Delete { id: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    let journal = Journal::new(config.open_store()?);
    let today = calendar::today();

    match cli.command {
        Commands::Entry { date, action } => {
            let date = journal.entry_date(date, today).await?;
            run_entry(&journal, date, action).await?;
        }
        Commands::Calendar { action } => run_calendar(&journal, action, today).await?,
        Commands::Task { action } => run_task(&journal, action).await?,
        Commands::Export { month, dir } => {
            let month = month.unwrap_or_else(|| YearMonth::of(today));
            let dir = dir.unwrap_or_else(|| config.export_dir());
            let path = export::export_month(&journal.entries, month, today, &dir).await?;
            println!("{} {}", "Exported".green(), path.display());
        }
        Commands::AutoExport { accept, decline, reset } => {
            run_auto_export(&journal, &config, today, accept, decline, reset).await?;
        }
    }

    Ok(())
}

async fn run_entry(journal: &Journal<AnyKv>, date: NaiveDate, action: EntryAction) -> Result<()> {
    let mut day = journal.open_day(date).await?;

    match action {
        EntryAction::Show => {}
        EntryAction::Add { kind, text } => day.add_activity(kind, &text).await?,
        EntryAction::Remove { kind, position } => day.remove_at_position(kind, position).await?,
        EntryAction::Mood { answer, reason } => {
            day.set_feel_good(answer.as_option()).await?;
            if let Some(reason) = reason {
                day.set_reason(&reason).await?;
            }
        }
        EntryAction::Submit => {
            day.submit().await?;
            println!("{}", "Entry submitted".green());
        }
        EntryAction::Edit {
            add_productive,
            add_unproductive,
            remove_productive,
            remove_unproductive,
            mood,
            reason,
        } => {
            let edits = EntryEdits {
                add_productive,
                add_unproductive,
                remove_productive,
                remove_unproductive,
                feel_good: mood.map(Mood::as_option),
                reason,
            };
            if let Err(e) = day.amend(&edits).await {
                return Err(eyre!("Edit discarded: {}", e));
            }
            println!("{}", "Entry updated".green());
        }
    }

    print_entry(&day);
    Ok(())
}

fn print_entry(day: &DaySession<AnyKv>) {
    let entry = day.entry();
    let state = match day.state() {
        EntryState::Draft => "draft".yellow(),
        EntryState::Submitted => "submitted".green(),
        EntryState::Editing => "editing".cyan(),
    };
    println!("{} ({})", entry.date.format("%A, %B %-d, %Y").to_string().bold(), state);

    println!("{}", "What did I do Productive".bold());
    print_activities(&entry.productive_activities);
    println!("{}", "What did I do Unproductive".bold());
    print_activities(&entry.unproductive_activities);

    let mood = match entry.feel_good_about_day {
        Some(true) => "Yes".green(),
        Some(false) => "No".red(),
        None => "-".dimmed(),
    };
    println!("{} {}", "Do you feel good about your day?".bold(), mood);
    if entry.feel_good_about_day.is_some() && !entry.feel_good_reason.is_empty() {
        println!("  {}", entry.feel_good_reason);
    }
}

fn print_activities(activities: &[String]) {
    if activities.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for (i, text) in activities.iter().enumerate() {
        println!("  {}. {}", i + 1, text);
    }
}

async fn run_calendar(journal: &Journal<AnyKv>, action: CalendarAction, today: NaiveDate) -> Result<()> {
    match action {
        CalendarAction::Month { month } => {
            let month = month.unwrap_or_else(|| YearMonth::of(today));
            let completed = journal.entries.list_completed_dates().await?;

            println!("{}", format!("{} {}", month.name(), month.year()).bold());
            for day in (1..=month.days_in_month()).filter_map(|d| month.day(d)) {
                let label = format!("{:>2} {}", day.day(), day.format("%a"));
                if completed.contains(&day) {
                    println!("{} {}", label.green(), "✓".green());
                } else if day == today {
                    println!("{}", label.bold());
                } else {
                    println!("{}", label);
                }
            }
        }
        CalendarAction::Pick { date } => {
            journal.selection.set(date).await?;
            println!("Picked {}", date.to_string().bold());
        }
        CalendarAction::Clear => {
            journal.selection.clear().await?;
            println!("Back to today");
        }
    }
    Ok(())
}

/// Tasks are addressed by full id or by the last characters shown in `task list`
fn resolve_task_id(tasks: &[Task], id: &str) -> Result<String> {
    let matches: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.id == id || (!id.is_empty() && t.id.ends_with(id)))
        .collect();
    match matches.as_slice() {
        [task] => Ok(task.id.clone()),
        [] => Err(eyre!("No task matches {:?}", id)),
        _ => Err(eyre!("{:?} matches {} tasks; use more characters", id, matches.len())),
    }
}

/// Last 8 characters of an id
fn short_id(id: &str) -> &str {
    match id.char_indices().rev().nth(7) {
        Some((start, _)) => &id[start..],
        None => id,
    }
}

async fn run_task(journal: &Journal<AnyKv>, action: TaskAction) -> Result<()> {
    let tasks = journal.tasks.list_hierarchy().await?;

    match action {
        TaskAction::Add { title, parent } => {
            let parent = parent.map(|p| resolve_task_id(&tasks, &p)).transpose()?;
            let task = journal.tasks.add_task(&title, parent.as_deref()).await?;
            println!("{} {} {}", "Added".green(), short_id(&task.id).dimmed(), task.title);
        }
        TaskAction::List => {
            let index = TaskIndex::new(&tasks);
            if tasks.is_empty() {
                println!("{}", "No tasks".dimmed());
            }
            for (depth, task) in index.depth_first() {
                let mark = if task.completed { "[x]".green() } else { "[ ]".normal() };
                let title = if task.completed {
                    task.title.dimmed()
                } else {
                    task.title.normal()
                };
                println!("{}{} {} {}", "  ".repeat(depth), mark, title, short_id(&task.id).dimmed());
            }
        }
        TaskAction::Toggle { id } => {
            let id = resolve_task_id(&tasks, &id)?;
            if let Some(task) = journal.tasks.toggle_completion(&id).await? {
                let state = if task.completed { "done".green() } else { "open".yellow() };
                println!("{} is {}", task.title, state);
            }
        }
        TaskAction::Rename { id, title } => {
            let id = resolve_task_id(&tasks, &id)?;
            journal.tasks.update_task(&id, TaskPatch::title(title)).await?;
            println!("{}", "Renamed".green());
        }
        TaskAction::Delete { id } => {
            let id = resolve_task_id(&tasks, &id)?;
            let removed = journal.tasks.delete_task(&id).await?;
            println!("{} {} task(s)", "Deleted".red(), removed.len());
        }
    }
    Ok(())
}

async fn run_auto_export(
    journal: &Journal<AnyKv>,
    config: &Config,
    today: NaiveDate,
    accept: bool,
    decline: bool,
    reset: bool,
) -> Result<()> {
    if reset {
        journal.auto_export.reset().await?;
        println!("Auto-export tracker reset");
        return Ok(());
    }

    match journal.auto_export.check(today).await? {
        AutoExportCheck::AlreadyResolved => {
            println!("{}", "Auto-export already handled this month".dimmed());
        }
        AutoExportCheck::Skipped { month } => {
            println!("No submitted entries for {} {}, nothing to export", month.name(), month.year());
        }
        AutoExportCheck::Offer(offer) => {
            println!("{}", offer.prompt().bold());
            let choice = match (accept, decline) {
                (true, _) => ExportChoice::Export,
                (_, true) => ExportChoice::Decline,
                _ => {
                    println!("Run again with --accept or --decline");
                    return Ok(());
                }
            };
            match offer.resolve(choice, &config.export_dir()).await {
                Ok(Resolution::Exported(path)) => println!("{} {}", "Exported".green(), path.display()),
                Ok(Resolution::Declined) => println!("Not now. You won't be asked again this month"),
                Err(e @ JournalError::Export(_)) => {
                    return Err(eyre!("{} (you won't be asked again this month)", e));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}
