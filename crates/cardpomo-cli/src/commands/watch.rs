//! Live countdown in the terminal.
//!
//! Runs the timer scheduler for the owner's session, so phases finish on
//! time while this command is open. Other `cardpomo` invocations may change
//! the session meanwhile; the store is polled to pick those up.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use cardpomo_core::{
    CardId, FixedCard, Glyph, Notification, Notifier, RenderFrame, RenderSink, Tint,
    TimerScheduler,
};

use super::{CliResult, Context, Globals};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Draws one status line, rewritten in place every tick.
struct TerminalSink;

impl TerminalSink {
    fn draw(out: &mut impl Write, frame: &RenderFrame) -> std::io::Result<()> {
        let glyph = match frame.glyph {
            Glyph::Play => ">",
            Glyph::Pause => "||",
            Glyph::None => " ",
        };
        let note = match frame.tint {
            Tint::Disabled => "  (busy on another card)",
            Tint::Break | Tint::Active => "",
        };
        write!(
            out,
            "\r{:>2} {} {:<11} {}/{}{:<24}",
            glyph,
            frame.label,
            frame.phase.label(),
            frame.today_count,
            frame.daily_target,
            note
        )?;
        out.flush()
    }
}

impl RenderSink for TerminalSink {
    fn render(&self, frame: &RenderFrame) {
        if let Err(e) = Self::draw(&mut std::io::stdout().lock(), frame) {
            tracing::trace!("status line not drawn: {e}");
        }
    }
}

/// Rings the terminal bell with the configured message.
struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notification: &Notification) {
        eprintln!("\n\x07{}", notification.message);
    }
}

pub fn run(globals: &Globals, card: Option<String>) -> CliResult {
    let ctx = Context::open(globals)?;
    let card = card
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .map(CardId::new);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(watch(ctx, card))
}

async fn watch(ctx: Context, card: Option<CardId>) -> CliResult {
    let tick = Duration::from_secs(ctx.config.scheduler.tick_secs);
    let service = Arc::new(ctx.service.with_notifier(Arc::new(TerminalNotifier)));
    let scheduler = Arc::new(
        TimerScheduler::new(service, ctx.owner, Arc::new(TerminalSink))
            .with_card_context(Arc::new(FixedCard(card)))
            .with_tick_interval(tick),
    );

    let state = scheduler.restore()?;
    scheduler.render_now()?;
    let mut last = (state.phase, state.started_at);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut poll = tokio::time::interval(POLL_INTERVAL);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = poll.tick() => {
                let state = scheduler.refresh()?;
                let key = (state.phase, state.started_at);
                // The ticker only draws while running; stopped states draw once.
                if key != last && !state.is_running() {
                    scheduler.render_now()?;
                }
                last = key;
            }
        }
    }

    scheduler.shutdown();
    println!();
    Ok(())
}
