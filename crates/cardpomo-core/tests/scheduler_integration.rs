//! Scheduler tests, mostly on paused tokio time.
//!
//! The session clock and the tokio clock are separate, so each paused-time
//! test moves the `ManualClock` forward before letting tokio reach the same
//! instant. The multi-thread test runs in real time.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use cardpomo_core::{
    engine, CardId, Clock, FixedCard, ManualClock, MemoryStore, OwnerId, Phase, PomodoroService,
    RenderFrame, RenderSink, ServiceOptions, SessionState, SessionStore, TimerScheduler,
};
use chrono::{Duration, TimeZone, Utc};

#[derive(Default)]
struct RecordingSink {
    frames: Mutex<Vec<RenderFrame>>,
}

impl RenderSink for RecordingSink {
    fn render(&self, frame: &RenderFrame) {
        self.frames.lock().unwrap().push(frame.clone());
    }
}

struct Harness {
    clock: Arc<ManualClock>,
    service: Arc<PomodoroService<MemoryStore>>,
    scheduler: Arc<TimerScheduler<MemoryStore>>,
    sink: Arc<RecordingSink>,
    owner: OwnerId,
}

fn harness_with(store: MemoryStore, clock: Arc<ManualClock>) -> Harness {
    let owner = OwnerId::new("sched");
    let sink = Arc::new(RecordingSink::default());
    let service = Arc::new(
        PomodoroService::new(store)
            .with_clock(clock.clone())
            .with_notifier(Arc::new(cardpomo_core::notify::NullNotifier)),
    );
    let scheduler = Arc::new(
        TimerScheduler::new(service.clone(), owner.clone(), sink.clone())
            .with_card_context(Arc::new(FixedCard(Some(CardId::new("card")))))
            .with_tick_interval(StdDuration::from_secs(1)),
    );
    Harness {
        clock,
        service,
        scheduler,
        sink,
        owner,
    }
}

fn harness() -> Harness {
    harness_with(MemoryStore::new(), clock())
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap(),
    ))
}

impl Harness {
    /// Move both clocks forward and let due timers run.
    async fn pass(&self, minutes: u64, extra_ms: u64) {
        let by = StdDuration::from_secs(minutes * 60) + StdDuration::from_millis(extra_ms);
        self.clock.advance(Duration::from_std(by).unwrap());
        tokio::time::sleep(by).await;
    }
}

#[tokio::test(start_paused = true)]
async fn expiry_finishes_work_and_disarms() {
    let h = harness();
    let card = CardId::new("card");
    let out = h.service.start(&h.owner, Some(&card)).unwrap();
    h.scheduler.observe(&out);
    assert!(h.scheduler.is_armed());
    assert!(h.scheduler.is_ticking());

    h.pass(25, 1).await;

    let state = h.service.session(&h.owner).unwrap();
    assert_eq!(state.phase, Phase::ShortBreak);
    assert!(!state.is_running());
    assert_eq!(state.today_count, 1);
    assert_eq!(h.service.card_count(&card).unwrap(), 1);
    assert!(!h.scheduler.is_armed());
    assert!(!h.scheduler.is_ticking());
}

#[tokio::test(start_paused = true)]
async fn suspend_cancels_pending_expiry() {
    let h = harness();
    let out = h.service.start(&h.owner, None).unwrap();
    h.scheduler.observe(&out);
    h.pass(10, 0).await;

    let out = h.service.suspend(&h.owner).unwrap();
    h.scheduler.observe(&out);
    assert!(!h.scheduler.is_armed());

    h.pass(30, 0).await;
    let state = h.service.session(&h.owner).unwrap();
    assert_eq!(state.phase, Phase::Working);
    assert!(state.is_suspended());
    assert_eq!(state.today_count, 0);
}

#[tokio::test(start_paused = true)]
async fn resumed_session_expires_after_the_time_left() {
    let h = harness();
    let card = CardId::new("card");
    h.scheduler.observe(&h.service.start(&h.owner, Some(&card)).unwrap());
    h.pass(10, 0).await;
    h.scheduler.observe(&h.service.suspend(&h.owner).unwrap());
    h.pass(5, 0).await;
    h.scheduler.observe(&h.service.start(&h.owner, Some(&card)).unwrap());

    h.pass(14, 0).await;
    assert_eq!(h.service.session(&h.owner).unwrap().phase, Phase::Working);

    h.pass(1, 1).await;
    let state = h.service.session(&h.owner).unwrap();
    assert_eq!(state.phase, Phase::ShortBreak);
    assert_eq!(state.today_count, 1);
    assert_eq!(h.service.card_count(&card).unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_sync_keeps_a_single_expiry() {
    let h = harness();
    let card = CardId::new("card");
    let out = h.service.start(&h.owner, Some(&card)).unwrap();
    for _ in 0..3 {
        h.scheduler.observe(&out);
    }
    h.scheduler.refresh().unwrap();

    h.pass(25, 1).await;
    assert_eq!(h.service.session(&h.owner).unwrap().today_count, 1);
    assert_eq!(h.service.card_count(&card).unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn restore_finishes_an_overdue_session() {
    let clock = clock();
    let store = MemoryStore::new();
    let owner = OwnerId::new("sched");
    let running = engine::start(&SessionState::new(owner), None, clock.now())
        .unwrap()
        .state;
    store.create_session(&running).unwrap();
    clock.advance(Duration::minutes(40));

    let h = harness_with(store, clock);
    h.scheduler.restore().unwrap();
    tokio::time::sleep(StdDuration::from_millis(1)).await;

    let state = h.service.session(&h.owner).unwrap();
    assert_eq!(state.phase, Phase::ShortBreak);
    assert_eq!(state.today_count, 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_notices_changes_made_elsewhere() {
    let h = harness();
    h.scheduler.observe(&h.service.start(&h.owner, None).unwrap());
    assert!(h.scheduler.is_armed());

    // Another window suspends without telling this scheduler.
    h.service.suspend(&h.owner).unwrap();
    h.scheduler.refresh().unwrap();
    assert!(!h.scheduler.is_armed());
    assert!(!h.scheduler.is_ticking());
}

#[tokio::test(start_paused = true)]
async fn ticker_renders_once_per_second_while_running() {
    let h = harness();
    h.scheduler.observe(&h.service.start(&h.owner, None).unwrap());

    h.clock.advance(Duration::seconds(3));
    tokio::time::sleep(StdDuration::from_millis(3_500)).await;

    let frames = h.sink.frames.lock().unwrap().clone();
    assert!(frames.len() >= 3, "got {} frames", frames.len());
    assert!(frames.iter().all(|f| f.phase == Phase::Working && f.running));
    assert!(frames.iter().all(|f| f.can_bind_card));
}

/// An overdue session restored on a multi-thread runtime expires at once,
/// and the break that auto-starts must end up with its own armed expiry.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn auto_started_break_keeps_its_expiry_across_workers() {
    for run in 0..200 {
        let clock = clock();
        let store = MemoryStore::new();
        let owner = OwnerId::new("sched");
        let running = engine::start(&SessionState::new(owner.clone()), None, clock.now())
            .unwrap()
            .state;
        store.create_session(&running).unwrap();
        clock.advance(Duration::minutes(30));

        let service = Arc::new(
            PomodoroService::new(store)
                .with_clock(clock.clone())
                .with_notifier(Arc::new(cardpomo_core::notify::NullNotifier))
                .with_options(ServiceOptions {
                    auto_start_breaks: true,
                    ..ServiceOptions::default()
                }),
        );
        let scheduler = Arc::new(TimerScheduler::new(
            service.clone(),
            owner.clone(),
            Arc::new(RecordingSink::default()),
        ));
        scheduler.restore().unwrap();

        let mut settled = false;
        for _ in 0..200 {
            tokio::time::sleep(StdDuration::from_millis(5)).await;
            let state = service.session(&owner).unwrap();
            if state.phase == Phase::ShortBreak && state.is_running() {
                settled = true;
                break;
            }
        }
        assert!(settled, "run {run}: break never started");
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        assert!(scheduler.is_armed(), "run {run}: running break has no expiry");
        scheduler.shutdown();
    }
}
