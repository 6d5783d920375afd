use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use nudge::advisor::AdvisorClient;
use nudge::config::EngineConfig;
use nudge::core::analytics::Stats;
use nudge::core::mood::Mood;
use nudge::core::summary::DaySummary;
use nudge::core::task::{NewTask, Task, TaskPatch};
use nudge::engine::reconcile::spawn_advisory_refresh;
use nudge::engine::reminder::spawn_reminder_loop;
use nudge::engine::{SchedulingEngine, SharedEngine};
use nudge::notify::{DesktopNotifier, LogNotifier, Notifier};
use nudge::store::TaskStore;

/// Deadline-aware task list that learns how late you start.
#[derive(Parser)]
#[command(name = "nudge", version, about)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Add a task.
    Add {
        title: String,
        /// Official deadline: RFC 3339, "YYYY-MM-DD HH:MM" or "YYYY-MM-DD" (local time).
        #[arg(short, long)]
        deadline: Option<String>,
        /// Estimated minutes of work.
        #[arg(short, long)]
        estimate: Option<i64>,
    },
    /// Edit a task.
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        deadline: Option<String>,
        #[arg(long, conflicts_with = "deadline")]
        clear_deadline: bool,
        #[arg(short, long)]
        estimate: Option<i64>,
    },
    /// Toggle a task between done and open.
    Done { id: String },
    /// Delete a task.
    Remove { id: String },
    /// Show tasks by priority.
    List,
    /// Show tasks for a mood (all, lazy, focus, stress).
    Recommend {
        #[arg(short, long, default_value = "all")]
        mood: String,
    },
    /// Completion statistics.
    Stats,
    /// What today looks like.
    Summary,
    /// Interactive session with background reminders (default).
    Run,
}

/// Log to the systemd user journal (`journalctl --user -t nudge -f`).
/// Records from this crate pass at info (debug when enabled), others at warn.
fn init_logging(debug: bool) {
    struct FilteredJournal {
        inner: systemd_journal_logger::JournalLog,
    }

    impl log::Log for FilteredJournal {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            if metadata.target().starts_with("nudge") {
                let max = if nudge::debug_logging() {
                    log::LevelFilter::Debug
                } else {
                    log::LevelFilter::Info
                };
                metadata.level() <= max
            } else {
                metadata.level() <= log::LevelFilter::Warn
            }
        }
        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                self.inner.log(record);
            }
        }
        fn flush(&self) {
            self.inner.flush();
        }
    }

    nudge::set_debug_logging(debug);

    let journal = match systemd_journal_logger::JournalLog::new() {
        Ok(j) => j.with_syslog_identifier("nudge".to_string()),
        Err(e) => {
            eprintln!("journal unavailable, logging disabled: {}", e);
            return;
        }
    };
    if log::set_boxed_logger(Box::new(FilteredJournal { inner: journal })).is_ok() {
        // Global max must be Debug so debug records can pass when toggled
        log::set_max_level(log::LevelFilter::Debug);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(EngineConfig::default_path);
    let config = EngineConfig::load(&config_path)?;
    init_logging(config.debug_logging);
    config.ensure_dirs()?;

    let store = TaskStore::open(config.tasks_path())?;
    let mut engine = SchedulingEngine::new(store, &config);
    let now = Utc::now();

    match cli.command.unwrap_or(Command::Run) {
        Command::Add {
            title,
            deadline,
            estimate,
        } => {
            let mut new = NewTask::new(title);
            new.official_deadline = deadline.as_deref().map(parse_deadline).transpose()?;
            new.estimate = estimate;
            let task = engine.add_task(new, now)?;
            println!("Added {}", describe(&task));
        }
        Command::Edit {
            id,
            title,
            deadline,
            clear_deadline,
            estimate,
        } => {
            let official_deadline = if clear_deadline {
                Some(None)
            } else {
                deadline.as_deref().map(parse_deadline).transpose()?.map(Some)
            };
            let patch = TaskPatch {
                title,
                official_deadline,
                estimate,
            };
            if patch.is_empty() {
                println!("Nothing to change.");
            } else {
                let task = engine.update_task(&id, patch, now)?;
                println!("Updated {}", describe(&task));
            }
        }
        Command::Done { id } => {
            let task = engine.toggle_done(&id, now)?;
            println!("{} {}", if task.done { "Done:" } else { "Reopened:" }, task.title);
        }
        Command::Remove { id } => {
            let task = engine.remove_task(&id, now)?;
            println!("Removed {}", task.title);
        }
        Command::List => print_tasks(&engine, &engine.ordered(now), now),
        Command::Recommend { mood } => {
            let mood: Mood = mood.parse()?;
            let refresh = engine.set_mood(mood);
            let engine = engine.shared();
            if refresh {
                if let Some(client) = advisor_client(&config) {
                    // A one-shot command waits for the answer; failures fall back.
                    if let Err(e) = spawn_advisory_refresh(engine.clone(), client).await {
                        log::warn!("Advisory refresh ended abnormally: {}", e);
                    }
                }
            }
            let engine = engine.lock().await;
            if let Some(advisory) = engine.advisory() {
                println!("Advisor: {}", advisory.reason);
            }
            print_tasks(&engine, &engine.displayed(now), now);
        }
        Command::Stats => print_stats(&Stats::build(engine.tasks(), &Local)),
        Command::Summary => {
            let ordered = engine.ordered(now);
            let summary = DaySummary::build(&ordered, now, &Local);
            println!("{}", summary.short_summary);
            println!(
                "Due today: {} ({} min, {} h)",
                summary.important, summary.total_minutes, summary.total_hours
            );
        }
        Command::Run => run_session(engine, &config).await?,
    }

    Ok(())
}

fn advisor_client(config: &EngineConfig) -> Option<AdvisorClient> {
    let url = config.advisor_url.as_deref()?;
    match AdvisorClient::new(url, config.advisor_timeout()) {
        Ok(client) => Some(client),
        Err(e) => {
            log::warn!("Advisor disabled: {}", e);
            None
        }
    }
}

/// Parse a deadline in RFC 3339, "YYYY-MM-DD HH:MM" or "YYYY-MM-DD" (end of
/// that local day).
fn parse_deadline(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(&format!("{} 23:59", s), "%Y-%m-%d %H:%M"))
        .map_err(|_| format!("Unrecognized deadline '{}'", s))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("Deadline '{}' does not exist in local time", s))
}

fn describe(task: &Task) -> String {
    let mut out = format!("[{}] {} ({} min)", short_id(&task.id), task.title, task.estimate);
    if let Some(deadline) = task.official_deadline {
        out.push_str(&format!(
            " due {}",
            deadline.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        ));
    }
    if let Some(real) = task.real_deadline {
        out.push_str(&format!(
            ", start by {}",
            real.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        ));
    }
    out
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn print_tasks(engine: &SchedulingEngine, tasks: &[&Task], now: DateTime<Utc>) {
    if tasks.is_empty() {
        println!("No tasks.");
        return;
    }
    for task in tasks {
        println!(
            "{} {:>7.2}  {}  {}",
            if task.done { "[x]" } else { "[ ]" },
            engine.score(task, now),
            task.id,
            describe(task)
        );
    }
}

fn print_stats(stats: &Stats) {
    println!("Completed: {}  Pending: {}", stats.completed, stats.pending);
    if !stats.by_deadline.is_empty() {
        println!("By deadline:");
        for (day, count) in &stats.by_deadline {
            println!("  {}  {}", day, count);
        }
    }
    if !stats.completed_by_day.is_empty() {
        println!("Completed per day:");
        for (day, count) in &stats.completed_by_day {
            println!("  {}  {}", day, count);
        }
    }
    if let Some(hour) = stats.best_hour() {
        println!("Best work hour: {}:00", hour);
    }
}

/// Long-running session: reminders poll in the background while commands are
/// read from stdin. Delay learning and postpone counts only build up here.
async fn run_session(
    mut engine: SchedulingEngine,
    config: &EngineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let notifier: Arc<dyn Notifier> = if config.desktop_notifications {
        Arc::new(DesktopNotifier::new())
    } else {
        Arc::new(LogNotifier)
    };
    engine.probe_notifications(notifier.as_ref());

    let engine = engine.shared();
    let reminders = spawn_reminder_loop(engine.clone(), notifier, config.poll_interval());
    let advisor = advisor_client(config);

    println!("nudge session. Commands: list, add <title> [| deadline [| estimate]], start <id>, done <id>, rm <id>, mood <m>, delay, quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        if !handle_line(&engine, advisor.as_ref(), line.trim()).await {
            break;
        }
    }

    reminders.stop().await;
    Ok(())
}

/// Returns false when the session should end.
async fn handle_line(engine: &SharedEngine, advisor: Option<&AdvisorClient>, line: &str) -> bool {
    match dispatch(engine, advisor, line).await {
        Ok(keep_going) => keep_going,
        Err(e) => {
            println!("Error: {}", e);
            true
        }
    }
}

async fn dispatch(
    engine: &SharedEngine,
    advisor: Option<&AdvisorClient>,
    line: &str,
) -> Result<bool, Box<dyn std::error::Error>> {
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let now = Utc::now();

    match cmd {
        "" => {}
        "quit" | "exit" => return Ok(false),
        "list" | "ls" => {
            let e = engine.lock().await;
            print_tasks(&e, &e.displayed(now), now);
        }
        "add" => {
            let mut parts = rest.split('|').map(str::trim);
            let mut new = NewTask::new(parts.next().unwrap_or_default());
            if let Some(d) = parts.next().filter(|d| !d.is_empty()) {
                new.official_deadline = Some(parse_deadline(d)?);
            }
            if let Some(m) = parts.next().filter(|m| !m.is_empty()) {
                new.estimate = Some(m.parse()?);
            }
            let task = engine.lock().await.add_task(new, now)?;
            println!("Added {}", describe(&task));
        }
        "start" => {
            let id = resolve_id(engine, rest).await?;
            engine.lock().await.start_task(&id, now)?;
            println!("Started {}", id);
        }
        "done" => {
            let id = resolve_id(engine, rest).await?;
            let task = engine.lock().await.toggle_done(&id, now)?;
            println!("{} {}", if task.done { "Done:" } else { "Reopened:" }, task.title);
        }
        "rm" => {
            let id = resolve_id(engine, rest).await?;
            let task = engine.lock().await.remove_task(&id, now)?;
            println!("Removed {}", task.title);
        }
        "mood" => {
            let mood: Mood = rest.parse()?;
            let refresh = engine.lock().await.set_mood(mood);
            if let (true, Some(client)) = (refresh, advisor) {
                // Fire and forget; `list` shows the advice once it lands.
                drop(spawn_advisory_refresh(engine.clone(), client.clone()));
            }
            let e = engine.lock().await;
            print_tasks(&e, &e.displayed(now), now);
        }
        "delay" => println!("Average delay: {} min", engine.lock().await.average_delay()),
        other => println!("Unknown command '{}'", other),
    }
    Ok(true)
}

/// Accept a full id or a unique prefix of one.
async fn resolve_id(engine: &SharedEngine, prefix: &str) -> Result<String, String> {
    if prefix.is_empty() {
        return Err("missing task id".to_string());
    }
    let e = engine.lock().await;
    let matches: Vec<&Task> = e.tasks().iter().filter(|t| t.id.starts_with(prefix)).collect();
    match matches.as_slice() {
        [task] => Ok(task.id.clone()),
        [] => Err(format!("no task with id {}", prefix)),
        _ => Err(format!("id prefix {} is ambiguous", prefix)),
    }
}
