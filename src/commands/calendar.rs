use clap::Subcommand;
use linkcal_core::coordinator::INVALID_RANGE;
use linkcal_core::{
    CalendarId, EditOutcome, Event, EventTime, IdentityResolver, Location, Prompter, Selection,
    SyncCoordinator,
};
use url::Url;

use super::OutputFormat;
use crate::clipboard;
use crate::location_file::without_id;
use crate::prompt::FlagPrompter;

#[derive(Subcommand)]
pub enum CalendarCommand {
    /// Start a new, empty calendar
    New,

    /// Open a calendar from a shared link or id (default: the last one)
    Open {
        /// Shared link or calendar id
        target: Option<String>,
    },

    /// Show the shareable link of the current calendar
    Link {
        /// Also copy the link to the clipboard
        #[arg(long)]
        copy: bool,
    },

    /// List the events of the current calendar
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Add an event
    Add {
        /// Start date (YYYY-MM-DD) or date-time (YYYY-MM-DDTHH:MM[:SS], RFC 3339)
        #[arg(long)]
        start: EventTime,

        /// End date or date-time
        #[arg(long)]
        end: Option<EventTime>,

        /// Mark as an all-day event (implied by a plain start date)
        #[arg(long)]
        all_day: bool,

        /// Event title (prompted for if omitted)
        #[arg(long)]
        title: Option<String>,
    },

    /// Rename an event; an empty title offers to delete it
    Edit {
        /// Event ID
        id: String,

        /// New title (prompted for if omitted)
        #[arg(long)]
        title: Option<String>,
    },

    /// Delete an event
    Delete {
        /// Event ID
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Move an event to a new start
    Move {
        /// Event ID
        id: String,

        /// New start
        #[arg(long)]
        start: EventTime,

        /// New end (default: keeps the event's length)
        #[arg(long)]
        end: Option<EventTime>,
    },

    /// Change when an event ends
    Resize {
        /// Event ID
        id: String,

        /// New end
        #[arg(long)]
        end: EventTime,
    },

    /// Print the events whenever the calendar changes, until Ctrl-C
    Watch,
}

impl CalendarCommand {
    /// Where to go before the calendar is opened, if anywhere.
    pub fn destination(&self, current: &Url) -> Result<Option<Url>, Box<dyn std::error::Error>> {
        match self {
            CalendarCommand::New => Ok(Some(without_id(current))),
            CalendarCommand::Open {
                target: Some(target),
            } => match Url::parse(target.trim()) {
                Ok(url) => Ok(Some(url)),
                Err(_) => {
                    let id = CalendarId::parse(target)?;
                    Ok(Some(linkcal_core::location::with_id(current, &id)))
                }
            },
            _ => Ok(None),
        }
    }

    pub async fn run<L: Location, P: Prompter>(
        &self,
        coordinator: &SyncCoordinator,
        resolver: &IdentityResolver<L>,
        fallback: P,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match self {
            CalendarCommand::New | CalendarCommand::Open { .. } => {
                if let Some(id) = coordinator.current() {
                    println!("Calendar: {}", id);
                }
                println!("Link: {}", resolver.share_link());
                println!("Events: {}", coordinator.events().len());
                Ok(())
            }

            CalendarCommand::Link { copy } => {
                let link = resolver.share_link();
                println!("{}", link);
                if *copy {
                    clipboard::copy_link(&link, coordinator.status()).await;
                }
                Ok(())
            }

            CalendarCommand::List { format } => {
                print_events(&coordinator.events(), format)?;
                Ok(())
            }

            CalendarCommand::Add {
                start,
                end,
                all_day,
                title,
            } => {
                let selection = Selection {
                    start: *start,
                    end: *end,
                    all_day: *all_day || start.is_date(),
                };
                let mut prompter = FlagPrompter::new(title.clone(), false, fallback);
                match coordinator.create_event(selection, &mut prompter).await {
                    Some(id) => println!("Created event: {}", id),
                    None => println!("No title given, nothing created"),
                }
                Ok(())
            }

            CalendarCommand::Edit { id, title } => {
                let mut prompter = FlagPrompter::new(title.clone(), false, fallback);
                report_edit(id, coordinator.edit_event(id, &mut prompter).await)
            }

            CalendarCommand::Delete { id, yes } => {
                let mut prompter = FlagPrompter::new(Some(String::new()), *yes, fallback);
                report_edit(id, coordinator.edit_event(id, &mut prompter).await)
            }

            CalendarCommand::Move { id, start, end } => {
                if !coordinator.move_event(id, *start, *end).await {
                    return Err(reschedule_error(coordinator, id));
                }
                println!("Moved event: {}", id);
                Ok(())
            }

            CalendarCommand::Resize { id, end } => {
                if !coordinator.resize_event(id, *end).await {
                    return Err(reschedule_error(coordinator, id));
                }
                println!("Resized event: {}", id);
                Ok(())
            }

            CalendarCommand::Watch => watch(coordinator).await,
        }
    }
}

fn report_edit(id: &str, outcome: EditOutcome) -> Result<(), Box<dyn std::error::Error>> {
    match outcome {
        EditOutcome::NotFound => return Err(format!("Event not found: {}", id).into()),
        EditOutcome::Cancelled => println!("Cancelled"),
        EditOutcome::Renamed => println!("Renamed event: {}", id),
        EditOutcome::Deleted => println!("Deleted event: {}", id),
        EditOutcome::Kept => println!("Kept event: {}", id),
    }
    Ok(())
}

/// Why a move or resize of `id` was refused.
fn reschedule_error(coordinator: &SyncCoordinator, id: &str) -> Box<dyn std::error::Error> {
    if coordinator.events().iter().any(|e| e.id == id) {
        INVALID_RANGE.into()
    } else {
        format!("Event not found: {}", id).into()
    }
}

fn print_events(events: &[Event], format: &OutputFormat) -> Result<(), serde_json::Error> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(events)?);
        }
        OutputFormat::Text => {
            if events.is_empty() {
                println!("No events.");
                return Ok(());
            }
            let mut sorted: Vec<&Event> = events.iter().collect();
            sorted.sort_by_key(|e| e.start.date());
            for event in sorted {
                println!("{}  {}", event.id, event);
            }
        }
    }
    Ok(())
}

async fn watch(coordinator: &SyncCoordinator) -> Result<(), Box<dyn std::error::Error>> {
    if !coordinator.backend().is_cloud() {
        eprintln!("No cloud store configured; only local changes would appear.");
    } else if !coordinator.is_subscribed() {
        eprintln!("Cloud store unreachable; showing local data only.");
    }

    let mut updates = coordinator.updates();
    print_events(&coordinator.events(), &OutputFormat::Text)?;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                println!();
                print_events(&coordinator.events(), &OutputFormat::Text)?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}
