//! Wall-clock driver for one owner's session.
//!
//! Holds at most one pending expiry and one redraw ticker. Whenever the
//! session starts counting time the expiry is re-armed for the time left;
//! whenever it stops, both are cancelled. Must be used inside a tokio runtime.
//!
//! Store access from the timers runs on the blocking pool, since the SQLite
//! store blocks on its connection lock and on disk.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::display::{RenderFrame, RenderSink};
use crate::error::Result;
use crate::service::{Outcome, PomodoroService};
use crate::session::{CardId, OwnerId, Phase, SessionState};
use crate::storage::SessionStore;
use crate::timer::engine;

/// Supplies the card the user is currently looking at.
pub trait CardContext: Send + Sync {
    fn current_card_id(&self) -> Option<CardId>;
}

/// A card context that never changes.
#[derive(Debug, Clone, Default)]
pub struct FixedCard(pub Option<CardId>);

impl CardContext for FixedCard {
    fn current_card_id(&self) -> Option<CardId> {
        self.0.clone()
    }
}

pub struct TimerScheduler<S> {
    service: Arc<PomodoroService<S>>,
    owner: OwnerId,
    render: Arc<dyn RenderSink>,
    card: Arc<dyn CardContext>,
    tick_interval: Duration,
    expiry: Mutex<Option<JoinHandle<()>>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    /// Bumped on every arm/disarm; a woken expiry from an older arm does nothing.
    generation: AtomicU64,
    last_synced: Mutex<Option<(Phase, Option<DateTime<Utc>>)>>,
}

impl<S: SessionStore + 'static> TimerScheduler<S> {
    pub fn new(
        service: Arc<PomodoroService<S>>,
        owner: OwnerId,
        render: Arc<dyn RenderSink>,
    ) -> Self {
        Self {
            service,
            owner,
            render,
            card: Arc::new(FixedCard::default()),
            tick_interval: Duration::from_secs(1),
            expiry: Mutex::new(None),
            ticker: Mutex::new(None),
            generation: AtomicU64::new(0),
            last_synced: Mutex::new(None),
        }
    }

    pub fn with_card_context(mut self, card: Arc<dyn CardContext>) -> Self {
        self.card = card;
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval.max(Duration::from_millis(1));
        self
    }

    /// Pick up persisted state after a (re)start of the host.
    ///
    /// A session that ran out while nobody was watching finishes right away.
    pub fn restore(self: &Arc<Self>) -> Result<SessionState> {
        let state = self.service.session(&self.owner)?;
        tracing::debug!(owner = %self.owner, phase = ?state.phase, running = state.is_running(), "restoring timers");
        self.sync(&state);
        Ok(state)
    }

    /// Re-read the session and re-sync if its timing changed since the last sync.
    pub fn refresh(self: &Arc<Self>) -> Result<SessionState> {
        let state = self.service.session(&self.owner)?;
        let key = (state.phase, state.started_at);
        if *lock(&self.last_synced) != Some(key) {
            self.sync(&state);
        }
        Ok(state)
    }

    /// Follow up on a transition the caller just applied.
    pub fn observe(self: &Arc<Self>, outcome: &Outcome) {
        if outcome.is_applied() {
            self.sync(outcome.state());
        }
    }

    /// Arm for a running session, disarm otherwise.
    pub fn sync(self: &Arc<Self>, state: &SessionState) {
        *lock(&self.last_synced) = Some((state.phase, state.started_at));
        if state.is_running() {
            let remaining = engine::remaining_ms(state, self.service.now());
            self.arm_expiry(Duration::from_millis(remaining));
            self.arm_ticker();
        } else {
            self.disarm();
        }
    }

    /// Cancel the pending expiry and the ticker.
    pub fn disarm(&self) {
        let expiry = {
            let mut slot = lock(&self.expiry);
            self.generation.fetch_add(1, Ordering::SeqCst);
            slot.take()
        };
        let ticker = lock(&self.ticker).take();
        if expiry.is_some() || ticker.is_some() {
            tracing::debug!(owner = %self.owner, "timers disarmed");
        }
        if let Some(handle) = expiry {
            handle.abort();
        }
        if let Some(handle) = ticker {
            handle.abort();
        }
    }

    pub fn shutdown(&self) {
        self.disarm();
    }

    pub fn is_armed(&self) -> bool {
        lock(&self.expiry)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn is_ticking(&self) -> bool {
        lock(&self.ticker)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Render the current state once, outside the ticker.
    pub fn render_now(&self) -> Result<RenderFrame> {
        let state = self.service.session(&self.owner)?;
        let frame = self.frame(&state);
        self.render.render(&frame);
        Ok(frame)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn frame(&self, state: &SessionState) -> RenderFrame {
        let viewing = self.card.current_card_id();
        RenderFrame::compute(state, viewing.as_ref(), self.service.now())
    }

    fn arm_expiry(self: &Arc<Self>, delay: Duration) {
        // The slot stays locked until the new handle is stored, so a task
        // that fires right away cannot observe or clear a stale slot.
        let mut slot = lock(&self.expiry);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let owner = this.owner.clone();
            let fired = tokio::task::spawn_blocking(move || this.on_expiry(generation)).await;
            if let Err(e) = fired {
                tracing::error!(%owner, "expiry task failed: {e}");
            }
        });

        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
        drop(slot);
        tracing::debug!(owner = %self.owner, delay_ms = delay.as_millis() as u64, "expiry armed");
    }

    fn arm_ticker(self: &Arc<Self>) {
        let mut slot = lock(&self.ticker);
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let this = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.tick_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let tick = Arc::clone(&this);
                match tokio::task::spawn_blocking(move || tick.tick_once()).await {
                    Ok(Ok(true)) => {}
                    Ok(Ok(false)) => break,
                    Ok(Err(e)) => {
                        tracing::warn!(owner = %this.owner, "tick could not read session: {e}");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(owner = %this.owner, "tick task failed: {e}");
                        break;
                    }
                }
            }
        }));
    }

    /// Draw one frame; returns whether the session is still running.
    fn tick_once(&self) -> Result<bool> {
        let state = self.service.session(&self.owner)?;
        self.render.render(&self.frame(&state));
        Ok(state.is_running())
    }

    fn on_expiry(self: &Arc<Self>, generation: u64) {
        {
            let mut slot = lock(&self.expiry);
            if self.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            // The slot holds this task's own handle; release it without aborting.
            drop(slot.take());
        }

        match self.service.expire(&self.owner) {
            Ok(outcome) => {
                let state = outcome.state().clone();
                if let Outcome::Ignored { reason, .. } = &outcome {
                    tracing::debug!(owner = %self.owner, %reason, "expiry found nothing to finish");
                }
                self.sync(&state);
                self.render.render(&self.frame(&state));
            }
            Err(e) => {
                tracing::error!(owner = %self.owner, "expiry failed: {e}");
                self.disarm();
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
