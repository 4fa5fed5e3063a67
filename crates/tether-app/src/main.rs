//! Tether - follow-up reminders from one line of text.
//!
//! This is the command-line front end for the reminder engine:
//! - quick-add parsing that turns plain text into a scheduled follow-up
//! - list / done / snooze / open / delete management
//! - reminder settings, including the quiet-hours window
//! - a resident loop that delivers desktop notifications as they come due

use std::panic;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use tether_core::{
    relative_phrase, tomorrow_at, ActionOutcome, DesktopCenter, FollowUp, FollowUpKind,
    FollowUpStore, QuickAddParser, QuietHours, ReminderAction, ReminderScheduler, SettingsStore,
    TimeOfDay, CREATION_NUDGE_DELAY_SECS, MAX_SCHEDULED,
};
use tether_storage::Database;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Divergence between wall-clock and monotonic elapsed time that counts as a
/// clock adjustment rather than timer jitter.
const CLOCK_JUMP_SECS: i64 = 60;

/// Tether - follow-up reminders from one line of text
#[derive(Parser, Debug)]
#[command(name = "tether", version, about)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add a follow-up from plain text, e.g. "call dana tomorrow at 9"
    Add {
        /// Follow-up text; the due time and kind are read from it
        #[arg(value_name = "TEXT")]
        text: Vec<String>,

        /// Contact to tie the follow-up to
        #[arg(short, long)]
        contact: Option<String>,

        /// Link to open later with `tether open`
        #[arg(long)]
        url: Option<String>,

        /// Hour that "end of day" resolves to
        #[arg(long, default_value = "18")]
        eod_hour: u32,

        /// Hour that "morning" resolves to
        #[arg(long, default_value = "9")]
        morning_hour: u32,
    },

    /// List open follow-ups
    List {
        /// Include completed follow-ups
        #[arg(long)]
        all: bool,
    },

    /// Mark a follow-up done
    Done {
        /// Follow-up id, or a unique prefix of one
        id: String,
    },

    /// Push a follow-up's reminder back
    Snooze {
        /// Follow-up id, or a unique prefix of one
        id: String,

        /// How far to push it: 10m, 1h, or tomorrow
        #[arg(long = "for", value_name = "WHEN", default_value = "10m")]
        duration: String,
    },

    /// Open the link attached to a follow-up
    Open {
        /// Follow-up id, or a unique prefix of one
        id: String,
    },

    /// Delete a follow-up and cancel its reminders
    Delete {
        /// Follow-up id, or a unique prefix of one
        id: String,
    },

    /// Show or change reminder settings
    Settings {
        /// Turn reminders at the due time on or off
        #[arg(long, value_name = "ON|OFF")]
        due_reminders: Option<String>,

        /// Turn overdue alerts on or off
        #[arg(long, value_name = "ON|OFF")]
        overdue_alerts: Option<String>,

        /// Turn the post-creation nudge on or off
        #[arg(long, value_name = "ON|OFF")]
        creation_nudge: Option<String>,

        /// Quiet-hours window as HH:MM-HH:MM, or "off" to disable
        #[arg(long, value_name = "WINDOW")]
        quiet_hours: Option<String>,

        /// Print the current settings
        #[arg(long)]
        show: bool,
    },

    /// Stay resident and deliver reminders as they come due
    Run {
        /// Seconds between delivery passes
        #[arg(long, default_value = "30")]
        interval: u64,
    },
}

/// Get the logs directory path.
fn logs_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "tether", "tether").map(|dirs| dirs.data_dir().join("logs"))
}

/// Initialize logging with file rotation.
fn init_logging(cli: &Cli) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_level = if cli.debug { "debug" } else { &cli.log_level };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "tether={0},tether_core={0},tether_storage={0},warn",
            log_level
        ))
    });

    // Try to set up file logging
    if let Some(log_dir) = logs_dir() {
        // Create logs directory if it doesn't exist
        if std::fs::create_dir_all(&log_dir).is_ok() {
            // Create rolling file appender (rotates daily, keeps files)
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(5)
                .filename_prefix("tether")
                .filename_suffix("log")
                .build(&log_dir)
                .ok();

            if let Some(appender) = file_appender {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);

                // In debug mode, also log to console
                if cli.debug {
                    tracing_subscriber::registry()
                        .with(env_filter)
                        .with(fmt::layer().with_writer(std::io::stdout))
                        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                        .init();
                } else {
                    // Keep stdout clean for command output; log to file only
                    tracing_subscriber::registry()
                        .with(env_filter)
                        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                        .init();
                }

                return Some(guard);
            }
        }
    }

    // Fallback: console logging only
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::warn!("File logging unavailable, using console only");
    None
}

/// Wire a scheduler to the database and the desktop notification center.
fn build_scheduler(db: &Database) -> ReminderScheduler {
    let store: Arc<dyn FollowUpStore> = Arc::new(db.clone());
    let settings_store: Arc<dyn SettingsStore> = Arc::new(db.clone());
    ReminderScheduler::new(store, settings_store, Box::new(DesktopCenter::new()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging (keep guard alive for the duration of the program)
    let _log_guard = init_logging(&cli);

    tracing::debug!("Args: {:?}", cli);

    // Open the database (creates if doesn't exist)
    let db = Database::new().map_err(|e| anyhow::anyhow!("Database error: {}", e))?;
    tracing::info!("Database opened at {:?}", Database::default_db_path()?);

    match cli.command {
        Commands::Add {
            text,
            contact,
            url,
            eod_hour,
            morning_hour,
        } => cmd_add(&db, &text.join(" "), contact, url, eod_hour, morning_hour),
        Commands::List { all } => cmd_list(&db, all),
        Commands::Done { id } => cmd_done(&db, &id),
        Commands::Snooze { id, duration } => cmd_snooze(&db, &id, &duration),
        Commands::Open { id } => cmd_open(&db, &id),
        Commands::Delete { id } => cmd_delete(&db, &id),
        Commands::Settings {
            due_reminders,
            overdue_alerts,
            creation_nudge,
            quiet_hours,
            show,
        } => cmd_settings(
            &db,
            due_reminders,
            overdue_alerts,
            creation_nudge,
            quiet_hours,
            show,
        ),
        Commands::Run { interval } => cmd_run(db, interval).await,
    }
}

// ---------- commands ----------

/// Parse the text, save the follow-up, and schedule its reminders.
fn cmd_add(
    db: &Database,
    text: &str,
    contact: Option<String>,
    url: Option<String>,
    eod_hour: u32,
    morning_hour: u32,
) -> anyhow::Result<()> {
    let text = text.trim();
    if text.is_empty() {
        anyhow::bail!("Nothing to add; pass the follow-up text");
    }
    if eod_hour > 23 || morning_hour > 23 {
        anyhow::bail!("Hours must be 0-23");
    }

    let now = Local::now();
    let intent = QuickAddParser::new().parse(text, now, eod_hour, morning_hour);

    let (kind, due_at) = match &intent {
        Some(intent) => (intent.kind, intent.due_at),
        // No due-time signal in the text: tomorrow morning keeps it in view.
        None => (FollowUpKind::DoIt, tomorrow_at(now, morning_hour, 0)),
    };

    let mut followup = FollowUp::new(text, kind).with_due_at(due_at.with_timezone(&Utc));
    if let Some(contact) = contact {
        followup = followup.with_contact(contact);
    }
    if let Some(url) = url {
        followup = followup.with_web_url(url);
    }
    db.save_followup(&followup)?;

    let mut scheduler = build_scheduler(db);
    scheduler.schedule_reminder(&mut followup);
    scheduler.schedule_creation_nudge(&followup);
    // Deliver the nudge before this process exits
    scheduler.pump(Utc::now() + chrono::Duration::seconds(CREATION_NUDGE_DELAY_SECS));

    let id_str = followup.id.to_string();
    println!(
        "Saved {} [{}] due {}",
        &id_str[..8],
        followup.kind.label(),
        relative_phrase(now, due_at)
    );
    Ok(())
}

/// Print open follow-ups, or every follow-up with --all.
fn cmd_list(db: &Database, all: bool) -> anyhow::Result<()> {
    let followups = if all {
        db.get_all_followups()?
    } else {
        db.get_open_followups()?
    };

    if followups.is_empty() {
        println!("No follow-ups.");
        return Ok(());
    }

    let now = Local::now();
    println!(
        "{:<8}  {:<8}  {:<16}  {:<38}  {:<22}  {}",
        "ID", "STATUS", "KIND", "TITLE", "WHEN", "CONTACT"
    );
    for followup in &followups {
        let id_str = followup.id.to_string();
        let status = if followup.completed {
            "done"
        } else {
            followup.status.as_str()
        };
        let when = match followup.next_fire_time(Utc::now()) {
            Some(at) => relative_phrase(now, at.with_timezone(&Local)),
            None => "no due time".to_string(),
        };
        println!(
            "{:<8}  {:<8}  {:<16}  {:<38}  {:<22}  {}",
            &id_str[..8],
            status,
            followup.kind.label(),
            truncate(&followup.title, 38),
            when,
            followup.contact_label.as_deref().unwrap_or("-"),
        );
    }

    println!();
    println!("{} shown, {} total", followups.len(), db.count_followups()?);
    Ok(())
}

/// Mark a follow-up done and clear its notifications.
fn cmd_done(db: &Database, id: &str) -> anyhow::Result<()> {
    let followup = resolve_prefix(db, id)?;
    let mut scheduler = build_scheduler(db);
    match scheduler.handle_action(ReminderAction::MarkDone, followup.id) {
        ActionOutcome::Applied => {
            println!("Done: {}", followup.title);
            Ok(())
        }
        ActionOutcome::NotFound => anyhow::bail!("No follow-up with id {}", followup.id),
        ActionOutcome::Failed(e) => anyhow::bail!("Could not mark done: {}", e),
    }
}

/// Push a follow-up's reminder back by 10m, 1h, or to tomorrow.
fn cmd_snooze(db: &Database, id: &str, duration: &str) -> anyhow::Result<()> {
    let action = parse_snooze(duration)?;
    let followup = resolve_prefix(db, id)?;
    let mut scheduler = build_scheduler(db);
    match scheduler.handle_action(action, followup.id) {
        ActionOutcome::Applied => {
            let until = db.get_followup(followup.id)?.and_then(|f| f.snoozed_until);
            match until {
                Some(at) => println!(
                    "Snoozed \"{}\" until {}",
                    followup.title,
                    relative_phrase(Local::now(), at.with_timezone(&Local))
                ),
                None => println!("Snoozed \"{}\"", followup.title),
            }
            Ok(())
        }
        ActionOutcome::NotFound => anyhow::bail!("No follow-up with id {}", followup.id),
        ActionOutcome::Failed(e) => anyhow::bail!("Could not snooze: {}", e),
    }
}

/// Open the link attached to a follow-up in the default browser.
fn cmd_open(db: &Database, id: &str) -> anyhow::Result<()> {
    let followup = resolve_prefix(db, id)?;
    match &followup.web_url {
        Some(url) => {
            open::that(url)?;
            println!("Opened {}", url);
            Ok(())
        }
        None => anyhow::bail!("\"{}\" has no link attached", followup.title),
    }
}

/// Delete a follow-up after cancelling anything scheduled for it.
fn cmd_delete(db: &Database, id: &str) -> anyhow::Result<()> {
    let followup = resolve_prefix(db, id)?;
    let mut scheduler = build_scheduler(db);
    scheduler.cancel_reminder(followup.id);
    db.delete_followup(followup.id)?;
    println!("Deleted: {}", followup.title);
    Ok(())
}

/// Show current settings, or apply the given changes and reschedule.
fn cmd_settings(
    db: &Database,
    due_reminders: Option<String>,
    overdue_alerts: Option<String>,
    creation_nudge: Option<String>,
    quiet_hours: Option<String>,
    show: bool,
) -> anyhow::Result<()> {
    let mut scheduler = build_scheduler(db);
    let changing = due_reminders.is_some()
        || overdue_alerts.is_some()
        || creation_nudge.is_some()
        || quiet_hours.is_some();

    if changing {
        let mut settings = scheduler.settings().clone();
        if let Some(value) = due_reminders {
            settings.due_reminders = parse_toggle(&value)?;
        }
        if let Some(value) = overdue_alerts {
            settings.overdue_alerts = parse_toggle(&value)?;
        }
        if let Some(value) = creation_nudge {
            settings.creation_nudge = parse_toggle(&value)?;
        }
        if let Some(value) = quiet_hours {
            settings.quiet_hours = parse_quiet_hours(&value)?;
        }
        scheduler.update_settings(settings);
        println!("Settings updated.");
    }

    if show || !changing {
        let settings = scheduler.settings();
        println!("Due reminders:  {}", on_off(settings.due_reminders));
        println!("Overdue alerts: {}", on_off(settings.overdue_alerts));
        println!("Creation nudge: {}", on_off(settings.creation_nudge));
        if settings.quiet_hours.enabled {
            println!(
                "Quiet hours:    {}-{}",
                settings.quiet_hours.start, settings.quiet_hours.end
            );
        } else {
            println!("Quiet hours:    off");
        }
    }
    Ok(())
}

/// Stay resident: pump deliveries on an interval and map clock events
/// onto the scheduler's lifecycle triggers.
async fn cmd_run(db: Database, interval: u64) -> anyhow::Result<()> {
    let mut scheduler = build_scheduler(&db);

    // Set up panic hook to log panics to file
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        tracing::error!("PANIC: {}", panic_info);
        default_hook(panic_info);
    }));

    // Startup counts as a foreground pass: reconcile, rebuild, scan
    scheduler.will_enter_foreground();

    let interval = interval.max(1);
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval));
    let mut last_date = Local::now().date_naive();
    let mut last_wall = Utc::now();
    let mut last_mono = Instant::now();

    println!(
        "Watching {} follow-ups, checking every {}s. Ctrl-C to stop.",
        db.count_followups()?,
        interval
    );
    tracing::info!("Reminder loop started (interval {}s)", interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Utc::now();

                // A gap between wall-clock and monotonic elapsed time means
                // the system clock was adjusted
                let wall_elapsed = now - last_wall;
                let mono_elapsed = chrono::Duration::from_std(last_mono.elapsed())
                    .unwrap_or_else(|_| chrono::Duration::zero());
                if (wall_elapsed - mono_elapsed).num_seconds().abs() > CLOCK_JUMP_SECS {
                    tracing::info!("Wall clock moved; rebuilding reminder schedule");
                    scheduler.significant_time_change();
                }
                last_wall = now;
                last_mono = Instant::now();

                let today = Local::now().date_naive();
                if today != last_date {
                    tracing::info!("Local date rolled over to {}", today);
                    scheduler.day_changed();
                    last_date = today;
                }

                // Pick up rows touched by other commands since the last pass
                scheduler.sync();
                match db.due_candidates(MAX_SCHEDULED) {
                    Ok(candidates) => {
                        for mut followup in candidates {
                            // Fire times already in the past belong to the
                            // overdue scan, not the due queue
                            if matches!(followup.next_fire_time(now), Some(at) if at > now) {
                                scheduler.schedule_reminder(&mut followup);
                            }
                        }
                    }
                    Err(e) => tracing::warn!("Failed to refresh due reminders: {}", e),
                }

                scheduler.scan_overdue();

                for note in scheduler.pump(now) {
                    tracing::info!("Delivered: {}", note.title);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down reminder loop");
                println!("Stopped.");
                break;
            }
        }
    }

    Ok(())
}

// ---------- helpers ----------

/// Load every follow-up and resolve a short id prefix against them.
fn resolve_prefix(db: &Database, prefix: &str) -> anyhow::Result<FollowUp> {
    let all = db.get_all_followups()?;
    match_prefix(&all, prefix).map(|f| f.clone())
}

/// Find the single follow-up whose id starts with `prefix`.
fn match_prefix<'a>(followups: &'a [FollowUp], prefix: &str) -> anyhow::Result<&'a FollowUp> {
    let prefix = prefix.trim().to_lowercase();
    if prefix.is_empty() {
        anyhow::bail!("Empty follow-up id");
    }
    let mut hits: Vec<&FollowUp> = followups
        .iter()
        .filter(|f| f.id.to_string().starts_with(&prefix))
        .collect();
    match hits.len() {
        1 => Ok(hits.remove(0)),
        0 => anyhow::bail!("No follow-up with id starting '{}'", prefix),
        n => anyhow::bail!(
            "Id prefix '{}' matches {} follow-ups; use more characters",
            prefix,
            n
        ),
    }
}

/// Map a snooze argument onto a reminder action.
fn parse_snooze(value: &str) -> anyhow::Result<ReminderAction> {
    match value.to_lowercase().as_str() {
        "10m" => Ok(ReminderAction::Snooze10Min),
        "1h" => Ok(ReminderAction::Snooze1Hour),
        "tomorrow" => Ok(ReminderAction::SnoozeTomorrow),
        other => anyhow::bail!("Expected 10m, 1h, or tomorrow, got '{}'", other),
    }
}

/// Parse an on/off toggle argument.
fn parse_toggle(value: &str) -> anyhow::Result<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        other => anyhow::bail!("Expected on or off, got '{}'", other),
    }
}

/// Parse a quiet-hours window given as "HH:MM-HH:MM", or "off" to disable.
fn parse_quiet_hours(value: &str) -> anyhow::Result<QuietHours> {
    if value.eq_ignore_ascii_case("off") {
        return Ok(QuietHours::default());
    }
    let (start, end) = value
        .split_once('-')
        .ok_or_else(|| anyhow::anyhow!("Expected HH:MM-HH:MM or off, got '{}'", value))?;
    Ok(QuietHours::new(
        parse_time_of_day(start)?,
        parse_time_of_day(end)?,
    ))
}

/// Parse a wall-clock time given as "HH:MM".
fn parse_time_of_day(value: &str) -> anyhow::Result<TimeOfDay> {
    let value = value.trim();
    let (hour, minute) = value
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("Expected HH:MM, got '{}'", value))?;
    let (hour, minute): (u8, u8) = match (hour.parse(), minute.parse()) {
        (Ok(h), Ok(m)) => (h, m),
        _ => anyhow::bail!("Expected HH:MM, got '{}'", value),
    };
    if hour > 23 || minute > 59 {
        anyhow::bail!("Time of day out of range: '{}'", value);
    }
    Ok(TimeOfDay::new(hour, minute))
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

/// Truncate a string to `max` characters, appending "..." when cut.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
