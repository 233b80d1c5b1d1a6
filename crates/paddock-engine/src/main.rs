//! Paddock operator console.
//!
//! # Usage
//!
//! ```bash
//! # List karts with their current status
//! paddock --db venue.redb units
//!
//! # Rent kart 42 for half an hour at the category price
//! paddock --db venue.redb plan new-steering-wheel-–-large-karts-42 half-hour
//!
//! # Run the countdown and expiry alerts until Ctrl-C
//! paddock --db venue.redb --notify-command notify-send watch
//! ```
//!
//! The database is held open for as long as `watch` runs. While it runs,
//! lifecycle commands are typed on its stdin instead, one per line:
//!
//! ```text
//! confirm basic-karts-1 returned
//! stop new-steering-wheel-–-large-karts-42
//! ```

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    thread,
    time::Duration,
};

use clap::{Parser, Subcommand, ValueEnum};
use paddock_core::{
    Clock, RentalPlan, Unit, format_countdown, format_datetime, format_stopwatch, status_label,
};
use paddock_engine::{
    CommandOutcome, CommandSink, EngineCommand, EngineConfig, EngineError, EngineEvent,
    ExpiryAlert, LogSink, NotificationSink, NotifyError, Permission, Presenter, RedbStorage,
    RentalEngine, StorageError, SystemClock, load_registry, runtime,
};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Kart rental console
#[derive(Parser, Debug)]
#[command(name = "paddock")]
#[command(about = "Kart rental lifecycle console")]
#[command(version)]
struct Args {
    /// Path to the rental database
    #[arg(long, default_value = "paddock.redb")]
    db: PathBuf,

    /// Catalog JSON file (built-in venue catalog when absent)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Tick interval of `watch` in milliseconds
    #[arg(long, default_value = "1000")]
    tick_ms: u64,

    /// Program run with title and body for each expiry alert
    #[arg(long)]
    notify_command: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List units grouped by category
    Units,

    /// Start a rental with an explicit duration and price
    Start {
        /// Unit id
        id: String,
        /// Paid minutes
        minutes: u32,
        /// Price charged
        price: u32,
    },

    /// Start a rental on a priced plan
    Plan {
        /// Unit id
        id: String,
        /// Plan
        plan: PlanArg,
    },

    /// Answer the return prompt of an expired unit
    Confirm {
        /// Unit id
        id: String,
        /// The kart is back
        #[arg(long, conflicts_with = "not_returned", required_unless_present = "not_returned")]
        returned: bool,
        /// The kart is still out; start overtime
        #[arg(long)]
        not_returned: bool,
    },

    /// Return a rented kart before its paid time is up
    Return {
        /// Unit id
        id: String,
    },

    /// Stop the overtime of an overdue kart
    Stop {
        /// Unit id
        id: String,
    },

    /// Reset a unit to available without logging the session
    Reset {
        /// Unit id
        id: String,
    },

    /// Show recent sessions, newest first
    History {
        /// Number of sessions
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Sessions per category over the last week, month and year
    Stats,

    /// Delete all session history
    ClearHistory,

    /// Run the tick loop until Ctrl-C, reading commands from stdin
    Watch,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PlanArg {
    /// 30 minutes
    HalfHour,
    /// 60 minutes
    Hour,
}

impl From<PlanArg> for RentalPlan {
    fn from(plan: PlanArg) -> Self {
        match plan {
            PlanArg::HalfHour => RentalPlan::HalfHour,
            PlanArg::Hour => RentalPlan::Hour,
        }
    }
}

/// Alert sink chosen on the command line.
enum ConsoleSink {
    Log(LogSink),
    Command(CommandSink),
}

impl NotificationSink for ConsoleSink {
    fn current_permission(&self) -> Permission {
        match self {
            Self::Log(sink) => sink.current_permission(),
            Self::Command(sink) => sink.current_permission(),
        }
    }

    fn request_permission(&self) -> Permission {
        match self {
            Self::Log(sink) => sink.request_permission(),
            Self::Command(sink) => sink.request_permission(),
        }
    }

    fn deliver(&self, alert: &ExpiryAlert) -> Result<(), NotifyError> {
        match self {
            Self::Log(sink) => sink.deliver(alert),
            Self::Command(sink) => sink.deliver(alert),
        }
    }
}

/// Presenter that reports tick events through the log.
struct LogPresenter;

impl Presenter for LogPresenter {
    fn render(&mut self, events: &[EngineEvent]) {
        for event in events {
            match event {
                EngineEvent::Countdown { unit_id, remaining } => {
                    let remaining = format_countdown(*remaining);
                    tracing::debug!(%unit_id, %remaining, "Countdown");
                },
                EngineEvent::ReturnDue { unit_id } => {
                    tracing::info!(%unit_id, "CONFIRM? Paid time is up, confirm return");
                },
                EngineEvent::Overtime { unit_id, elapsed } => {
                    tracing::debug!(%unit_id, overtime = %format_stopwatch(*elapsed), "Overtime");
                },
            }
        }
    }

    fn storage_faults(&mut self, faults: &[StorageError]) {
        for fault in faults {
            tracing::error!(error = %fault, "Rental state not saved");
        }
    }

    fn command_result(
        &mut self,
        command: &EngineCommand,
        result: &Result<CommandOutcome, EngineError>,
    ) {
        match result {
            Ok(CommandOutcome { unit, closed }) => {
                if let Some(record) = closed {
                    tracing::info!(
                        unit_id = %unit.id(),
                        minutes = record.duration_minutes,
                        price = record.price_paid,
                        "Session closed"
                    );
                }
                tracing::info!(unit_id = %unit.id(), status = %unit.status(), "Command applied");
            },
            Err(err) => {
                tracing::error!(unit_id = command.unit_id(), error = %err, "Command failed");
            },
        }
    }
}

type Engine = RentalEngine<SystemClock, RedbStorage, ConsoleSink>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let registry = load_registry(args.catalog.as_deref())?;
    let storage = RedbStorage::open(&args.db)?;
    let sink = match args.notify_command {
        Some(program) => ConsoleSink::Command(CommandSink::new(program)),
        None => ConsoleSink::Log(LogSink),
    };
    let tick_interval = Duration::from_millis(args.tick_ms.max(1));
    let config = EngineConfig { tick_interval, ..Default::default() };

    let mut engine = RentalEngine::open(config, SystemClock::new(), storage, sink, registry);
    let mut out = io::stdout().lock();

    match args.command {
        Command::Units => print_units(&mut out, &mut engine)?,
        Command::Start { id, minutes, price } => {
            let outcome = engine.execute(&EngineCommand::Start { id, minutes, price })?;
            print_outcome(&mut out, &engine, &outcome)?;
        },
        Command::Plan { id, plan } => {
            let outcome = engine.execute(&EngineCommand::Plan { id, plan: plan.into() })?;
            print_outcome(&mut out, &engine, &outcome)?;
        },
        Command::Confirm { id, returned, not_returned } => {
            let returned = returned && !not_returned;
            let outcome = engine.execute(&EngineCommand::Confirm { id, returned })?;
            print_outcome(&mut out, &engine, &outcome)?;
        },
        Command::Return { id } => {
            let outcome = engine.execute(&EngineCommand::Return { id })?;
            print_outcome(&mut out, &engine, &outcome)?;
        },
        Command::Stop { id } => {
            let outcome = engine.execute(&EngineCommand::Stop { id })?;
            print_outcome(&mut out, &engine, &outcome)?;
        },
        Command::Reset { id } => {
            let outcome = engine.execute(&EngineCommand::Reset { id })?;
            print_outcome(&mut out, &engine, &outcome)?;
        },
        Command::History { limit } => {
            for record in engine.recent_history(limit)? {
                writeln!(
                    out,
                    "{}  {:<14} {:<36} {:>4} min {:>5} lei",
                    format_datetime(record.ended_at),
                    record.display_name,
                    record.category,
                    record.duration_minutes,
                    record.price_paid
                )?;
            }
        },
        Command::Stats => {
            for days in [7, 30, 365] {
                writeln!(out, "Last {days} days")?;
                for usage in engine.usage_report(days)? {
                    writeln!(out, "  {:<36} {:>5}", usage.category, usage.sessions)?;
                }
            }
        },
        Command::ClearHistory => {
            engine.clear_history()?;
            writeln!(out, "History cleared")?;
        },
        Command::Watch => {
            drop(out);
            let shutdown = async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %err, "Cannot listen for Ctrl-C");
                }
            };
            let (sender, mut commands) = mpsc::channel(16);
            thread::spawn(move || read_commands(&sender));
            runtime::serve(&mut engine, &mut LogPresenter, &mut commands, shutdown).await;
            return Ok(());
        },
    }

    for fault in engine.take_storage_faults() {
        tracing::warn!(error = %fault, "Rental state not saved");
    }

    Ok(())
}

fn print_units(out: &mut impl Write, engine: &mut Engine) -> io::Result<()> {
    let groups = engine.units_by_category();
    let now = engine.clock().now();

    for (category, units) in groups {
        writeln!(out, "{category}")?;
        for unit in units {
            let label = status_label(&unit, now);
            writeln!(out, "  {:<44} {:<14} {label}", unit.id(), unit.display_name())?;
        }
    }
    Ok(())
}

fn print_outcome(
    out: &mut impl Write,
    engine: &Engine,
    outcome: &CommandOutcome,
) -> io::Result<()> {
    if let Some(record) = &outcome.closed {
        writeln!(
            out,
            "{} ({}): {} min, {} lei",
            record.display_name, record.category, record.duration_minutes, record.price_paid
        )?;
    }

    let unit: &Unit = &outcome.unit;
    writeln!(
        out,
        "{} ({}): {} {}",
        unit.display_name(),
        unit.category(),
        unit.status(),
        status_label(unit, engine.clock().now())
    )
}

/// Forward operator commands typed on stdin until EOF or until the runtime
/// stops listening.
fn read_commands(sender: &mpsc::Sender<EngineCommand>) {
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(error = %err, "Cannot read commands from stdin");
                return;
            },
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<EngineCommand>() {
            Ok(command) => {
                if sender.blocking_send(command).is_err() {
                    return;
                }
            },
            Err(err) => tracing::warn!(error = %err, "Ignoring command"),
        }
    }
}
