//! Async tick runtime
//!
//! Drives [`RentalEngine::tick`] on a fixed interval and hands the resulting
//! render events to a [`Presenter`]. Operator commands arriving on a channel
//! are applied to the same engine between ticks. The engine itself stays
//! synchronous; this loop is the only place time passes on its own.

use std::future::Future;

use paddock_core::Clock;
use tokio::{
    sync::mpsc,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    command::{CommandOutcome, EngineCommand},
    engine::{EngineEvent, RentalEngine},
    error::EngineError,
    notifier::NotificationSink,
    storage::{Storage, StorageError},
};

/// Consumer of engine render state (the presentation layer).
pub trait Presenter {
    /// Render the events of one tick.
    fn render(&mut self, events: &[EngineEvent]);

    /// Warn the operator that state or history could not be saved.
    fn storage_faults(&mut self, faults: &[StorageError]);

    /// Report the result of an operator command.
    fn command_result(
        &mut self,
        command: &EngineCommand,
        result: &Result<CommandOutcome, EngineError>,
    );
}

/// Tick `engine` every `tick_interval` until `shutdown` resolves.
///
/// Same as [`serve`] without operator commands.
pub async fn run<C, S, N, P>(
    engine: &mut RentalEngine<C, S, N>,
    presenter: &mut P,
    shutdown: impl Future<Output = ()>,
) where
    C: Clock,
    S: Storage,
    N: NotificationSink,
    P: Presenter,
{
    let (_, mut commands) = mpsc::channel(1);
    serve(engine, presenter, &mut commands, shutdown).await;
}

/// Tick `engine` and apply `commands` until `shutdown` resolves.
///
/// The first tick runs immediately, so units whose paid time lapsed while
/// the process was down, and units restored awaiting confirmation, are
/// prompted for at once. Missed ticks are not replayed in a burst. Ticking
/// continues after every command sender is dropped.
pub async fn serve<C, S, N, P>(
    engine: &mut RentalEngine<C, S, N>,
    presenter: &mut P,
    commands: &mut mpsc::Receiver<EngineCommand>,
    shutdown: impl Future<Output = ()>,
) where
    C: Clock,
    S: Storage,
    N: NotificationSink,
    P: Presenter,
{
    let mut interval = time::interval(engine.config().tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);
    let mut accepting = true;

    info!(interval = ?engine.config().tick_interval, "Tick runtime started");

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("Tick runtime stopping");
                break;
            }

            command = commands.recv(), if accepting => {
                let Some(command) = command else {
                    debug!("Command channel closed");
                    accepting = false;
                    continue;
                };

                let result = engine.execute(&command);
                if let Err(err) = &result {
                    warn!(unit_id = command.unit_id(), error = %err, "Command rejected");
                }
                presenter.command_result(&command, &result);
                report_faults(engine, presenter);
            }

            _ = interval.tick() => {
                let events = engine.tick();
                if !events.is_empty() {
                    presenter.render(&events);
                }
                report_faults(engine, presenter);
            }
        }
    }
}

fn report_faults<C, S, N, P>(engine: &mut RentalEngine<C, S, N>, presenter: &mut P)
where
    C: Clock,
    S: Storage,
    N: NotificationSink,
    P: Presenter,
{
    let faults = engine.take_storage_faults();
    if !faults.is_empty() {
        debug!(count = faults.len(), "Reporting storage faults");
        presenter.storage_faults(&faults);
    }
}
