//! Tick runtime on paused tokio time.

use std::time::Duration;

use paddock_core::{Clock, Timestamp, UnitStatus};
use paddock_engine::{
    ChaoticStorage, CommandOutcome, EngineCommand, EngineConfig, EngineError, EngineEvent,
    MemoryStorage, Presenter, RentalEngine, Storage, StorageError, runtime,
};
use paddock_harness::{RecordingSink, test_registry};
use tokio::{
    sync::mpsc,
    time::{Instant, sleep},
};

/// Engine clock that follows tokio's (paused) clock.
#[derive(Clone)]
struct TokioClock {
    start: Instant,
}

impl TokioClock {
    fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.start.elapsed().as_millis() as u64)
    }
}

#[derive(Default)]
struct RecordingPresenter {
    batches: usize,
    events: Vec<EngineEvent>,
    faults: Vec<StorageError>,
    outcomes: Vec<Result<CommandOutcome, EngineError>>,
}

impl RecordingPresenter {
    fn return_due(&self) -> usize {
        self.events.iter().filter(|e| matches!(e, EngineEvent::ReturnDue { .. })).count()
    }

    fn countdowns(&self) -> usize {
        self.events.iter().filter(|e| matches!(e, EngineEvent::Countdown { .. })).count()
    }
}

impl Presenter for RecordingPresenter {
    fn render(&mut self, events: &[EngineEvent]) {
        self.batches += 1;
        self.events.extend_from_slice(events);
    }

    fn storage_faults(&mut self, faults: &[StorageError]) {
        self.faults.extend_from_slice(faults);
    }

    fn command_result(
        &mut self,
        _command: &EngineCommand,
        result: &Result<CommandOutcome, EngineError>,
    ) {
        self.outcomes.push(result.clone());
    }
}

fn engine<S: Storage>(
    storage: S,
    sink: RecordingSink,
) -> RentalEngine<TokioClock, S, RecordingSink> {
    engine_on(TokioClock::new(), storage, sink)
}

fn engine_on<S: Storage>(
    clock: TokioClock,
    storage: S,
    sink: RecordingSink,
) -> RentalEngine<TokioClock, S, RecordingSink> {
    RentalEngine::open(EngineConfig::default(), clock, storage, sink, test_registry())
}

#[tokio::test(start_paused = true)]
async fn countdown_then_single_return_prompt() {
    let sink = RecordingSink::new();
    let mut engine = engine(MemoryStorage::new(), sink.clone());
    let mut presenter = RecordingPresenter::default();
    engine.start_rental("basic-karts-1", 1, 20).unwrap();

    runtime::run(&mut engine, &mut presenter, sleep(Duration::from_secs(90))).await;

    assert!(presenter.countdowns() >= 59);
    assert_eq!(presenter.return_due(), 1);
    assert_eq!(sink.alert_count(), 1);
    assert_eq!(engine.get_unit("basic-karts-1").unwrap().status(), UnitStatus::ExpiredUnconfirmed);
}

#[tokio::test(start_paused = true)]
async fn idle_venue_renders_nothing() {
    let mut engine = engine(MemoryStorage::new(), RecordingSink::new());
    let mut presenter = RecordingPresenter::default();

    runtime::run(&mut engine, &mut presenter, sleep(Duration::from_secs(10))).await;

    assert_eq!(presenter.batches, 0);
    assert!(presenter.faults.is_empty());
}

#[tokio::test(start_paused = true)]
async fn overtime_keeps_ticking() {
    let mut engine = engine(MemoryStorage::new(), RecordingSink::new());
    let mut presenter = RecordingPresenter::default();
    engine.start_rental("basic-karts-2", 1, 20).unwrap();

    sleep(Duration::from_secs(61)).await;
    engine.confirm_return("basic-karts-2", false).unwrap();
    runtime::run(&mut engine, &mut presenter, sleep(Duration::from_millis(4500))).await;

    let overtime: Vec<_> = presenter
        .events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Overtime { elapsed, .. } => Some(*elapsed),
            _ => None,
        })
        .collect();
    assert_eq!(overtime.len(), 5);
    assert!(overtime.windows(2).all(|pair| pair[0] < pair[1]));
    // Overtime counts from the end of paid time, not from the confirmation
    assert!(overtime[0] >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn storage_faults_reach_the_presenter() {
    let storage = ChaoticStorage::with_seed(MemoryStorage::new(), 1.0, 3);
    let mut engine = engine(storage, RecordingSink::new());
    let mut presenter = RecordingPresenter::default();
    engine.start_rental("basic-karts-1", 1, 20).unwrap();

    runtime::run(&mut engine, &mut presenter, sleep(Duration::from_secs(65))).await;

    // Load at open and snapshot after start, then the expiry snapshot
    assert_eq!(presenter.faults.len(), 3);
    assert_eq!(presenter.return_due(), 1);
    assert!(engine.take_storage_faults().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_before_first_tick_completes_promptly() {
    let mut engine = engine(MemoryStorage::new(), RecordingSink::new());
    let mut presenter = RecordingPresenter::default();
    let started = Instant::now();

    runtime::run(&mut engine, &mut presenter, std::future::ready(())).await;

    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn commands_are_applied_while_ticking() {
    let mut engine = engine(MemoryStorage::new(), RecordingSink::new());
    let mut presenter = RecordingPresenter::default();
    let (sender, mut commands) = mpsc::channel(4);

    tokio::spawn(async move {
        let start: EngineCommand = "start basic-karts-1 1 20".parse().unwrap();
        sender.send(start).await.unwrap();
        sleep(Duration::from_secs(61)).await;
        let confirm = EngineCommand::Confirm { id: "basic-karts-1".into(), returned: true };
        sender.send(confirm).await.unwrap();
        sender.send(EngineCommand::Stop { id: "basic-karts-1".into() }).await.unwrap();
    });

    runtime::serve(&mut engine, &mut presenter, &mut commands, sleep(Duration::from_secs(70)))
        .await;

    assert_eq!(presenter.return_due(), 1);
    assert_eq!(presenter.outcomes.len(), 3);
    let closed = presenter.outcomes[1].as_ref().unwrap().closed.as_ref().unwrap();
    assert_eq!(closed.duration_minutes, 1);
    assert_eq!(closed.price_paid, 20);
    assert!(matches!(presenter.outcomes[2], Err(EngineError::InvalidTransition { .. })));
    assert_eq!(engine.get_unit("basic-karts-1").unwrap().status(), UnitStatus::Available);
    assert_eq!(engine.history().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn ticking_continues_after_command_senders_drop() {
    let mut engine = engine(MemoryStorage::new(), RecordingSink::new());
    let mut presenter = RecordingPresenter::default();
    let (sender, mut commands) = mpsc::channel(1);
    let start = EngineCommand::Start { id: "basic-karts-3".into(), minutes: 1, price: 30 };
    sender.send(start).await.unwrap();
    drop(sender);

    runtime::serve(&mut engine, &mut presenter, &mut commands, sleep(Duration::from_secs(65)))
        .await;

    assert_eq!(presenter.outcomes.len(), 1);
    assert_eq!(presenter.return_due(), 1);
}

#[tokio::test(start_paused = true)]
async fn prompt_restored_after_restart_reaches_the_presenter() {
    let clock = TokioClock::new();
    let storage = MemoryStorage::new();
    let sink = RecordingSink::new();
    {
        let mut first = engine_on(clock.clone(), storage.clone(), sink.clone());
        first.start_rental("basic-karts-1", 1, 20).unwrap();
        sleep(Duration::from_secs(61)).await;
        first.list_units();
    }
    assert_eq!(sink.alert_count(), 1);

    let mut second = engine_on(clock, storage, sink.clone());
    let mut presenter = RecordingPresenter::default();
    runtime::run(&mut second, &mut presenter, sleep(Duration::from_secs(5))).await;

    assert_eq!(presenter.return_due(), 1);
    assert_eq!(sink.alert_count(), 1);
}
