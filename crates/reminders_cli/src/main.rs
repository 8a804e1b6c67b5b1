//! Reminders command-line front end.
//!
//! # Responsibility
//! - Load configuration, start logging, and build the reminder service.
//! - Map subcommands onto service operations and print plain-text results.
//!
//! # See also
//! - `reminders_core::service::reminder_service` for the operation semantics.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use log::info;
use reminders_core::{
    group_by_day, init_logging, parse_due_at, AiClient, AppConfig, GroupedReminders, Reminder,
    ReminderDraft, ReminderPatch, ReminderService, TextAction, TextTransformer,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reminders")]
#[command(version)]
#[command(about = "Reminders stored remotely when reachable, locally otherwise")]
struct Cli {
    /// Path to a TOML config file (defaults to ./reminders.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List reminders grouped into Today, Tomorrow and Upcoming
    List,

    /// Create a reminder
    Add {
        #[arg(short, long)]
        title: String,

        /// Due time, RFC 3339 or local `YYYY-MM-DDTHH:MM`
        #[arg(short, long)]
        due: String,

        #[arg(short, long)]
        note: Option<String>,
    },

    /// Change fields of an existing reminder
    Edit {
        id: String,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        due: Option<String>,

        #[arg(short, long, conflicts_with = "clear_note")]
        note: Option<String>,

        /// Remove the note
        #[arg(long)]
        clear_note: bool,
    },

    /// Mark a reminder completed
    Done { id: String },

    /// Mark a reminder not completed
    Undo { id: String },

    /// Delete a reminder
    Delete { id: String },

    /// Summarize a note with the configured AI provider
    Summarize { text: String },

    /// Fix spelling and grammar of a note
    Spellcheck { text: String },

    /// Print the refreshed list whenever any store changes, until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load config")?;

    let log_dir = match &config.log.dir {
        Some(dir) if dir.is_relative() => Some(std::env::current_dir()?.join(dir)),
        other => other.clone(),
    };
    if let Err(err) = init_logging(&config.log.level, log_dir.as_deref()) {
        eprintln!("warning: logging disabled: {err}");
    }

    run(&config, cli.command).await
}

async fn run(config: &AppConfig, command: Commands) -> Result<()> {
    match command {
        Commands::List => {
            let service = open_service(config)?;
            print_grouped(&service.list_grouped(&Local::now()).await);
        }
        Commands::Add { title, due, note } => {
            let draft = ReminderDraft::from_input(title, &due, note.as_deref())?;
            let created = open_service(config)?.create(&draft).await?;
            println!("created {}", format_reminder(&created));
        }
        Commands::Edit {
            id,
            title,
            due,
            note,
            clear_note,
        } => {
            let patch = ReminderPatch {
                title,
                due_at: due.as_deref().map(parse_due_at).transpose()?,
                note: if clear_note { Some(None) } else { note.map(Some) },
                completed: None,
            };
            if patch.is_empty() {
                bail!("nothing to change; pass --title, --due, --note or --clear-note");
            }
            report_update(&id, open_service(config)?.update(&id, &patch).await?);
        }
        Commands::Done { id } => {
            report_update(&id, open_service(config)?.set_completed(&id, true).await?)
        }
        Commands::Undo { id } => {
            report_update(&id, open_service(config)?.set_completed(&id, false).await?)
        }
        Commands::Delete { id } => {
            open_service(config)?.delete(&id).await?;
            println!("deleted {id}");
        }
        Commands::Summarize { text } => transform(config, TextAction::Summarize, &text).await?,
        Commands::Spellcheck { text } => transform(config, TextAction::Spellcheck, &text).await?,
        Commands::Watch => watch(&open_service(config)?).await?,
    }
    Ok(())
}

fn open_service(config: &AppConfig) -> Result<ReminderService> {
    ReminderService::from_config(config).context("failed to open local store")
}

async fn watch(service: &ReminderService) -> Result<()> {
    print_grouped(&service.list_grouped(&Local::now()).await);
    let subscription = service.on_change(|items| {
        println!();
        print_grouped(&group_by_day(items, &Local::now()));
    });
    info!("event=watch module=cli status=start");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    subscription.unsubscribe();
    info!("event=watch module=cli status=stop");
    Ok(())
}

async fn transform(config: &AppConfig, action: TextAction, text: &str) -> Result<()> {
    let client = AiClient::new(config.ai.clone())?;
    let result = client.transform(action, text).await?;
    println!("{result}");
    Ok(())
}

fn report_update(id: &str, updated: Option<Reminder>) {
    match updated {
        Some(reminder) => println!("updated {}", format_reminder(&reminder)),
        None => println!("no reminder with id {id}"),
    }
}

fn print_grouped(grouped: &GroupedReminders) {
    if grouped.is_empty() {
        println!("No reminders.");
        return;
    }
    for (label, items) in [
        ("Today", &grouped.today),
        ("Tomorrow", &grouped.tomorrow),
        ("Upcoming", &grouped.upcoming),
    ] {
        if items.is_empty() {
            continue;
        }
        println!("{label}");
        for reminder in items {
            println!("  {}", format_reminder(reminder));
            if let Some(note) = &reminder.note {
                println!("      {note}");
            }
        }
    }
}

fn format_reminder(reminder: &Reminder) -> String {
    let due: DateTime<Local> = reminder.due_at.with_timezone(&Local);
    let mark = if reminder.completed { "[x]" } else { "[ ]" };
    format!(
        "{mark} {}  {}  ({})",
        due.format("%Y-%m-%d %H:%M"),
        reminder.title,
        reminder.id
    )
}
