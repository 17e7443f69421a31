use cardpomo_core::{CardId, Outcome};
use clap::Subcommand;
use serde_json::json;

use super::{print_json, CliResult, Context, Globals};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a work phase, or continue a suspended one
    Start {
        /// Card to bind the work phase to
        #[arg(long)]
        card: Option<String>,
    },
    /// Freeze the running phase
    Suspend,
    /// Continue a suspended phase, including a pending break
    Resume,
    /// End the running phase now
    Finish,
    /// Finish the running phase only if its time is up
    Expire,
    /// Press the widget button: suspend, resume or start
    Click {
        /// Card being viewed
        #[arg(long)]
        card: Option<String>,
    },
    /// Bind the current work phase to another card
    Bind {
        /// Card to bind
        #[arg(required_unless_present = "clear")]
        card: Option<String>,
        /// Remove the binding instead
        #[arg(long, conflicts_with = "card")]
        clear: bool,
    },
    /// Print a snapshot of the session as JSON
    Status {
        /// Also report whether this card may start work
        #[arg(long)]
        card: Option<String>,
    },
    /// Print how many work phases a card has completed
    Count { card: String },
}

pub fn run(globals: &Globals, action: TimerAction) -> CliResult {
    let ctx = Context::open(globals)?;
    let owner = &ctx.owner;
    let svc = &ctx.service;

    let outcome = match action {
        TimerAction::Start { card } => svc.start(owner, card_id(card).as_ref())?,
        TimerAction::Suspend => svc.suspend(owner)?,
        TimerAction::Resume => svc.resume(owner)?,
        TimerAction::Finish => svc.finish(owner)?,
        TimerAction::Expire => svc.expire(owner)?,
        TimerAction::Click { card } => svc.click(owner, card_id(card).as_ref())?,
        TimerAction::Bind { card, clear } => {
            let card = if clear { None } else { card_id(card) };
            svc.rebind_card(owner, card.as_ref())?
        }
        TimerAction::Status { card } => return status(&ctx, card_id(card)),
        TimerAction::Count { card } => {
            let card = CardId::new(card);
            let count = svc.card_count(&card)?;
            return print_json(&json!({ "card_id": card, "completed_count": count }));
        }
    };

    print_outcome(&outcome)
}

fn status(ctx: &Context, card: Option<CardId>) -> CliResult {
    let snapshot = ctx.service.status(&ctx.owner)?.snapshot_event();
    let Some(card) = card else {
        return print_json(&snapshot);
    };
    let mut value = serde_json::to_value(&snapshot)?;
    value["can_bind_card"] = json!(ctx.service.can_bind_card(&ctx.owner, &card)?);
    print_json(&value)
}

/// Applied transitions print their events; ignored ones print why.
fn print_outcome(outcome: &Outcome) -> CliResult {
    match outcome {
        Outcome::Applied { events, .. } => {
            for event in events {
                print_json(event)?;
            }
        }
        Outcome::Ignored { state, reason } => {
            print_json(&json!({
                "type": "Ignored",
                "reason": reason.to_string(),
                "phase": state.phase,
                "running": state.is_running(),
            }))?;
        }
    }
    Ok(())
}

fn card_id(card: Option<String>) -> Option<CardId> {
    card.map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .map(CardId::new)
}
