//! Command-line front end over `startrack_core`.
//!
//! # Responsibility
//! - Drive every lifecycle operation against a local SQLite store.
//! - Print effects and unlocked badges as plain text lines.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use startrack_core::db::open_db;
use startrack_core::{
    core_version, countdown_from_str, init_logging, ping, Clock, CoreConfig, Event, EventDraft,
    EventId, EventLifecycle, EventType, LifecycleEffect, Mutation, ReminderKind,
    Settings, SqliteKvRepository, SystemClock,
};

type Lifecycle<'conn> = EventLifecycle<SqliteKvRepository<'conn>, SystemClock>;

#[derive(Debug, Parser)]
#[command(name = "startrack")]
#[command(about = "Star Track Chronicles CLI")]
struct Cli {
    /// Store path. Falls back to STARTRACK_DB_PATH, then the temp directory.
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print core linkage info.
    Ping,
    /// List events with their countdowns, optionally by type.
    List(ListArgs),
    /// Show every field of one event.
    Show(IdArgs),
    /// Create an event.
    Create(CreateArgs),
    /// Set a track's progress (clamped to 0..=100).
    Progress(ProgressArgs),
    /// Flip one milestone of a track.
    Toggle(ToggleArgs),
    /// Mark an event completed.
    Complete(IdArgs),
    /// Delete an event.
    Delete(IdArgs),
    /// Record today's check-in.
    CheckIn,
    /// List all badges and whether they are unlocked.
    Achievements,
    /// Show settings, or update the ones passed as flags.
    Settings(SettingsArgs),
    /// Write all data to a JSON file.
    Export(ExportArgs),
    /// Merge a JSON export into the store.
    Import(ImportArgs),
    /// Delete all data and re-arm the welcome guide.
    Clear(ClearArgs),
    /// Countdown from now to an arbitrary date.
    Countdown { target: String },
    /// List events due tomorrow and letters ready to open.
    Reminders,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::List(_) => "list",
            Self::Show(_) => "show",
            Self::Create(_) => "create",
            Self::Progress(_) => "progress",
            Self::Toggle(_) => "toggle",
            Self::Complete(_) => "complete",
            Self::Delete(_) => "delete",
            Self::CheckIn => "check-in",
            Self::Achievements => "achievements",
            Self::Settings(_) => "settings",
            Self::Export(_) => "export",
            Self::Import(_) => "import",
            Self::Clear(_) => "clear",
            Self::Countdown { .. } => "countdown",
            Self::Reminders => "reminders",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TypeArg {
    Capsule,
    Track,
    Milestone,
    Letter,
}

impl From<TypeArg> for EventType {
    fn from(value: TypeArg) -> Self {
        match value {
            TypeArg::Capsule => EventType::Capsule,
            TypeArg::Track => EventType::Track,
            TypeArg::Milestone => EventType::Milestone,
            TypeArg::Letter => EventType::Letter,
        }
    }
}

#[derive(Debug, Args)]
struct ListArgs {
    #[arg(long = "type", value_enum)]
    event_type: Option<TypeArg>,
}

#[derive(Debug, Args)]
struct IdArgs {
    id: String,
}

#[derive(Debug, Args)]
struct CreateArgs {
    #[arg(value_enum)]
    event_type: TypeArg,
    name: String,
    #[arg(long)]
    date: String,
    /// Letter content or free-form notes.
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long)]
    color: Option<String>,
    #[arg(long, default_value_t = false)]
    important: bool,
    #[arg(long, allow_hyphen_values = true)]
    progress: Option<i64>,
    /// Track checklist item; repeat for several.
    #[arg(long = "milestone")]
    milestones: Vec<String>,
    #[arg(long, allow_hyphen_values = true)]
    stars: Option<i64>,
}

#[derive(Debug, Args)]
struct ProgressArgs {
    id: String,
    #[arg(allow_hyphen_values = true)]
    value: i64,
}

#[derive(Debug, Args)]
struct ToggleArgs {
    id: String,
    index: usize,
}

#[derive(Debug, Args)]
struct SettingsArgs {
    #[arg(long)]
    voice: Option<bool>,
    #[arg(long)]
    notifications: Option<bool>,
    #[arg(long)]
    particles: Option<bool>,
    #[arg(long)]
    volume: Option<u8>,
    #[arg(long)]
    timezone: Option<String>,
}

#[derive(Debug, Args)]
struct ExportArgs {
    /// Output file; defaults to a timestamped name in the current directory.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ImportArgs {
    #[arg(long = "in")]
    input: PathBuf,
}

#[derive(Debug, Args)]
struct ClearArgs {
    /// Required confirmation.
    #[arg(long, default_value_t = false)]
    yes: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CoreConfig::from_env();
    if let Some(log_dir) = &config.log_dir {
        init_logging(config.log_level.as_str(), &log_dir.to_string_lossy())
            .map_err(|err| anyhow!(err))
            .context("failed to initialize logging")?;
    }

    let name = cli.command.name();
    let result = dispatch(cli.command, cli.db, config);
    match &result {
        Ok(()) => info!("event=cli_command module=cli status=ok command={name}"),
        Err(err) => warn!("event=cli_command module=cli status=error command={name} error={err:#}"),
    }
    result
}

fn dispatch(command: Command, db: Option<PathBuf>, config: CoreConfig) -> Result<()> {
    match command {
        Command::Ping => {
            println!("startrack_core ping={}", ping());
            println!("startrack_core version={}", core_version());
            Ok(())
        }
        Command::Countdown { target } => run_countdown(&target),
        command => {
            let db_path = db.unwrap_or(config.db_path);
            let conn = open_db(&db_path)
                .with_context(|| format!("failed to open store at {}", db_path.display()))?;
            let repo = SqliteKvRepository::with_quota(&conn, config.quota_bytes);
            let mut lifecycle = EventLifecycle::open(repo, SystemClock);
            run(command, &mut lifecycle)
        }
    }
}

fn run(command: Command, lifecycle: &mut Lifecycle<'_>) -> Result<()> {
    match command {
        Command::List(args) => run_list(&args, lifecycle),
        Command::Show(args) => run_show(&args, lifecycle),
        Command::Create(args) => run_create(args, lifecycle),
        Command::Progress(args) => {
            let id = parse_id(&args.id)?;
            let mutation = lifecycle.update_progress(&id, args.value)?;
            print_event_mutation(&mutation);
            Ok(())
        }
        Command::Toggle(args) => {
            let id = parse_id(&args.id)?;
            let mutation = lifecycle.toggle_milestone(&id, args.index)?;
            print_event_mutation(&mutation);
            Ok(())
        }
        Command::Complete(args) => {
            let id = parse_id(&args.id)?;
            let mutation = lifecycle.mark_completed(&id)?;
            print_event_mutation(&mutation);
            Ok(())
        }
        Command::Delete(args) => {
            let id = parse_id(&args.id)?;
            let mutation = lifecycle.delete_event(&id)?;
            println!("deleted {}", mutation.value.id());
            print_outcome(&mutation);
            Ok(())
        }
        Command::CheckIn => {
            let mutation = lifecycle.check_in();
            if mutation.value {
                println!("checked in");
            } else {
                println!("already checked in today");
            }
            print_outcome(&mutation);
            Ok(())
        }
        Command::Achievements => {
            for record in lifecycle.achievements().records() {
                let mark = if record.unlocked { "x" } else { " " };
                println!(
                    "[{mark}] {} {} ({}): {}",
                    record.icon, record.name, record.id, record.desc
                );
            }
            Ok(())
        }
        Command::Settings(args) => run_settings(args, lifecycle),
        Command::Export(args) => run_export(args, lifecycle),
        Command::Import(args) => {
            let bytes = fs::read(&args.input)
                .with_context(|| format!("failed to read {}", args.input.display()))?;
            let mutation = lifecycle.import_data(&bytes)?;
            println!("imported {} event(s)", mutation.value.total());
            print_outcome(&mutation);
            Ok(())
        }
        Command::Clear(args) => {
            if !args.yes {
                bail!("refusing to clear all data without --yes");
            }
            let mutation = lifecycle.clear_all();
            println!("all data cleared");
            print_outcome(&mutation);
            Ok(())
        }
        Command::Reminders => {
            for reminder in lifecycle.due_reminders() {
                let label = match reminder.kind {
                    ReminderKind::EventApproaching => "tomorrow",
                    ReminderKind::LetterReady => "letter ready",
                };
                println!("{label}\t{}\t{}", reminder.id, reminder.name);
            }
            Ok(())
        }
        Command::Ping | Command::Countdown { .. } => Ok(()),
    }
}

fn run_list(args: &ListArgs, lifecycle: &Lifecycle<'_>) -> Result<()> {
    let events = lifecycle.list_events(args.event_type.map(EventType::from));
    if events.is_empty() {
        println!("no events");
        return Ok(());
    }
    for event in events {
        let countdown = lifecycle
            .countdown_for(event.id())
            .map(|countdown| countdown.text)
            .unwrap_or_default();
        println!(
            "{}\t{}\t{}\t{}\t{}",
            event.id(),
            event.event_type(),
            event.name,
            event.date,
            countdown
        );
    }
    Ok(())
}

fn run_show(args: &IdArgs, lifecycle: &Lifecycle<'_>) -> Result<()> {
    let id = parse_id(&args.id)?;
    let Some(event) = lifecycle.get_event(&id) else {
        bail!("event not found: {id}");
    };
    println!("id={}", event.id());
    println!("type={}", event.event_type());
    println!("name={}", event.name);
    println!("date={}", event.date);
    println!("color={}", event.color);
    println!("important={}", event.important);
    println!("completed={}", event.completed);
    println!("created_at={}", event.created_at().to_rfc3339());
    if let Some(progress) = event.progress() {
        println!("progress={progress}");
    }
    for (index, milestone) in event.milestones().iter().enumerate() {
        let mark = if milestone.completed { "x" } else { " " };
        println!("milestone[{index}]=[{mark}] {}", milestone.name);
    }
    if let Some(stars) = event.star_count() {
        println!("stars={stars}");
    }
    if !event.description.is_empty() {
        println!("description={}", event.description);
    }
    if let Some(countdown) = lifecycle.countdown_for(&id) {
        println!("countdown={}", countdown.text);
    }
    Ok(())
}

fn run_create(args: CreateArgs, lifecycle: &mut Lifecycle<'_>) -> Result<()> {
    let draft = EventDraft {
        event_type: args.event_type.into(),
        name: args.name,
        date: args.date,
        description: args.description,
        color: args.color,
        important: args.important,
        progress: args.progress,
        milestones: (!args.milestones.is_empty()).then(|| args.milestones.join("\n")),
        star_count: args.stars,
    };
    let mutation = lifecycle.create_event(&draft)?;
    println!("created {}", mutation.value.id());
    print_outcome(&mutation);
    Ok(())
}

fn run_settings(args: SettingsArgs, lifecycle: &mut Lifecycle<'_>) -> Result<()> {
    let current = lifecycle.settings().clone();
    let changed = args.voice.is_some()
        || args.notifications.is_some()
        || args.particles.is_some()
        || args.volume.is_some()
        || args.timezone.is_some();

    let settings = if changed {
        let next = Settings {
            voice_enabled: args.voice.unwrap_or(current.voice_enabled),
            notifications_enabled: args.notifications.unwrap_or(current.notifications_enabled),
            particles_enabled: args.particles.unwrap_or(current.particles_enabled),
            music_volume: args.volume.unwrap_or(current.music_volume),
            timezone: args.timezone.unwrap_or(current.timezone),
        };
        let mutation = lifecycle.update_settings(next);
        print_outcome(&mutation);
        mutation.value
    } else {
        current
    };

    println!("voice={}", settings.voice_enabled);
    println!("notifications={}", settings.notifications_enabled);
    println!("particles={}", settings.particles_enabled);
    println!("volume={}", settings.music_volume);
    println!("timezone={}", settings.timezone);
    Ok(())
}

fn run_export(args: ExportArgs, lifecycle: &Lifecycle<'_>) -> Result<()> {
    let bytes = lifecycle.export()?;
    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(lifecycle.export_file_name()));
    fs::write(&out, bytes).with_context(|| format!("failed to write {}", out.display()))?;
    println!("exported to {}", out.display());
    Ok(())
}

fn run_countdown(target: &str) -> Result<()> {
    let countdown = countdown_from_str(target, SystemClock.now())
        .ok_or_else(|| anyhow!("unrecognized date `{target}`"))?;
    println!("{}", countdown.text);
    Ok(())
}

fn parse_id(raw: &str) -> Result<EventId> {
    EventId::parse(raw).ok_or_else(|| anyhow!("event id cannot be blank"))
}

fn print_event_mutation(mutation: &Mutation<Event>) {
    let event = &mutation.value;
    match event.progress() {
        Some(progress) => println!(
            "{} progress={progress} completed={}",
            event.id(),
            event.completed
        ),
        None => println!("{} completed={}", event.id(), event.completed),
    }
    print_outcome(mutation);
}

fn print_outcome<T>(mutation: &Mutation<T>) {
    for effect in &mutation.effects {
        match effect {
            LifecycleEffect::AchievementUnlocked { key } => {
                println!("achievement unlocked: {} {}", key.icon(), key.name());
            }
            LifecycleEffect::ProgressCrossedHalf { .. } => println!("halfway there"),
            LifecycleEffect::ReachedCompletion { .. } => println!("goal reached"),
            _ => {}
        }
    }
    if let Some(err) = &mutation.save_error {
        warn!("event=cli_save module=cli status=error error={err}");
        eprintln!("warning: change applied but not saved: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn every_subcommand_has_help_text() {
        let cli = Cli::command();
        for sub in cli.get_subcommands() {
            assert!(
                sub.get_about().is_some(),
                "subcommand `{}` has no help text",
                sub.get_name()
            );
        }
    }

    #[test]
    fn logged_command_name_matches_cli_name() {
        let cli = Cli::command();
        let names: Vec<&str> = cli.get_subcommands().map(|sub| sub.get_name()).collect();
        for args in [
            vec!["startrack", "list"],
            vec!["startrack", "check-in"],
            vec!["startrack", "countdown", "2030-01-01"],
            vec!["startrack", "progress", "abc", "-5"],
        ] {
            let parsed = Cli::try_parse_from(args.iter().copied()).unwrap();
            assert!(names.contains(&parsed.command.name()), "{args:?}");
            assert_eq!(parsed.command.name(), args[1]);
        }
        assert!(matches!(
            Cli::try_parse_from(["startrack", "ping"]).unwrap().command,
            Command::Ping
        ));
    }
}
