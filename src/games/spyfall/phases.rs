//! `SpyFall` phases after the lobby.
//!
//! The discussion can be interrupted by an accusation that reaches half
//! the table or by a spy guessing the place. An interruption pauses the
//! countdown, resolves, and then either resumes it with its exact
//! remaining time or ends the round.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rand::seq::{IndexedRandom, SliceRandom};
use tokio::sync::mpsc;

use super::{SpyFallState, option};
use crate::engine::action::{ActionKind, InboundAction, UserId};
use crate::engine::core::PhaseContext;
use crate::engine::countdown::Countdown;
use crate::engine::lock;
use crate::engine::phase::{Phase, PhaseKind, Step};
use crate::engine::round::RoundState;
use crate::engine::tally::{Ballot, Decision};
use crate::games::content::ContentProvider;
use crate::games::{
    VOTE, Winner, interrogate, living_menu, name_of, names_of, rng, spies_dominate, vote_summary,
};
use crate::observability::{Event, metrics};
use crate::transport::{Content, Cue, SelectOption};

/// Select id of the spies' place guess menu.
pub const GUESS_PLACE: &str = "guess_place";

/// Length of one final-vote window.
const LAST_VOTE_WINDOW: Duration = Duration::from_secs(60);

type Ctx = PhaseContext<SpyFallState>;

fn spies_alive(s: &RoundState<SpyFallState>) -> usize {
    s.game.spies.iter().filter(|id| s.is_living(id)).count()
}

// ============================================================================
// START
// ============================================================================

/// Picks the place and deals roles.
pub(super) struct StartPhase {
    content: Arc<dyn ContentProvider>,
}

impl StartPhase {
    pub(super) fn new(content: Arc<dyn ContentProvider>) -> Self {
        Self { content }
    }
}

#[async_trait::async_trait]
impl Phase<SpyFallState> for StartPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Start
    }

    async fn act(&self, ctx: &Ctx) -> Step {
        let living = ctx.state(|s| s.living().to_vec());
        let places = self.content.places(ctx.option_bool(option::EXTEND_MODE));
        let Some(place) = places.choose(&mut rng()).cloned() else {
            ctx.session.force_stop("No places are available.").await;
            return Step::Halt;
        };

        let wanted = usize::try_from(ctx.option_u64(option::SPY_COUNT, 1)).unwrap_or(1);
        let count = wanted.clamp(1, living.len().saturating_sub(1).max(1));
        let spies: Vec<UserId> = living
            .choose_multiple(&mut rng(), count)
            .map(|p| p.id().clone())
            .collect();

        let mut roles = place.roles.clone();
        roles.shuffle(&mut rng());
        let citizens = living.len() - spies.len();
        if roles.len() < citizens {
            ctx.session
                .force_stop(&format!(
                    "{} has {} roles but {citizens} are needed.",
                    place.name,
                    roles.len()
                ))
                .await;
            return Step::Halt;
        }

        ctx.state(|s| {
            s.game.spies.clone_from(&spies);
            s.game.place = Some(place.clone());
            s.game.places.clone_from(&places);
        });

        let guess_menu: Vec<SelectOption> = places
            .iter()
            .map(|p| SelectOption::new(&p.name, &p.name))
            .collect();
        let spy_names = names_of(&ctx.session, &spies);
        let mut deck = roles.into_iter();
        for participant in &living {
            let content = if spies.contains(participant.id()) {
                let mut alert = Content::titled(
                    "You are a spy",
                    "Work out the place from the questions. Guess it at any time before the final vote.",
                )
                .select(GUESS_PLACE, "Guess the place", guess_menu.clone());
                if spies.len() > 1 {
                    alert = alert.field("Spies", &spy_names);
                }
                alert
            } else {
                Content::titled("Your role", "Keep the place secret from the spies.")
                    .field("Place", &place.name)
                    .field("Role", deck.next().unwrap_or_default())
            };
            participant.send_private(&content).await;
        }

        let place_list: Vec<&str> = places.iter().map(|p| p.name.as_str()).collect();
        ctx.session
            .send_public(
                &Content::titled("Roles dealt", "Everyone has a role. Start asking questions.")
                    .field("Possible places", place_list.join(", ")),
            )
            .await;
        tracing::debug!(session = %ctx.session.id(), spies = count, place = %place.name, "roles dealt");
        Step::Continue
    }
}

// ============================================================================
// PREPARE_ROUND
// ============================================================================

/// Resets the vote window.
pub(super) struct PreparePhase;

#[async_trait::async_trait]
impl Phase<SpyFallState> for PreparePhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::PrepareRound
    }

    async fn act(&self, ctx: &Ctx) -> Step {
        ctx.state(RoundState::clear_round);
        Step::Continue
    }
}

// ============================================================================
// PROCESS_ROUND
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum RoundStep {
    #[default]
    None,
    Discussion,
    Paused,
    LastVote,
    Stop,
}

#[derive(Debug)]
enum Interrupt {
    Accuse(UserId),
    Guess { spy: UserId, place: String },
}

/// Discussion with interrupts, then final votes.
pub(super) struct ProcessPhase {
    step: Mutex<RoundStep>,
    countdown: Mutex<Option<Countdown>>,
    interrupts_tx: mpsc::UnboundedSender<Interrupt>,
    interrupts_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Interrupt>>,
}

impl Default for ProcessPhase {
    fn default() -> Self {
        let (interrupts_tx, interrupts_rx) = mpsc::unbounded_channel();
        Self {
            step: Mutex::new(RoundStep::None),
            countdown: Mutex::new(None),
            interrupts_tx,
            interrupts_rx: tokio::sync::Mutex::new(interrupts_rx),
        }
    }
}

impl ProcessPhase {
    fn set_step(&self, step: RoundStep) {
        *lock(&self.step) = step;
    }

    fn step(&self) -> RoundStep {
        *lock(&self.step)
    }

    /// Moves `Discussion` to `Paused`, stops the clock and queues the
    /// interrupt. Returns `false` if the discussion is not running.
    /// No timer edit may land on messages posted after the interrupt.
    fn interrupt(&self, interrupt: Interrupt) -> bool {
        {
            let mut step = lock(&self.step);
            if *step != RoundStep::Discussion {
                return false;
            }
            *step = RoundStep::Paused;
        }
        if let Some(countdown) = lock(&self.countdown).as_ref() {
            countdown.pause();
        }
        self.interrupts_tx.send(interrupt).is_ok()
    }

    async fn discussion(&self, ctx: &Ctx) {
        let mut interrupts = self.interrupts_rx.lock().await;
        while interrupts.try_recv().is_ok() {}

        let base = Content::titled(
            "Discussion",
            "Ask each other questions. Accuse someone with the vote menu; half the table is enough.",
        )
        .select(VOTE, "Accuse", living_menu(ctx));
        let countdown = ctx.countdown_with_display(base.clone());
        *lock(&self.countdown) = Some(countdown.clone());
        self.set_step(RoundStep::Discussion);
        ctx.session.send_public(&base).await;

        let wait = countdown.start(Duration::from_secs(ctx.option_u64(option::SPY_GUESS_TIME, 600)));
        tokio::pin!(wait);
        loop {
            tokio::select! {
                _ = &mut wait => break,
                Some(interrupt) = interrupts.recv() => {
                    // Already paused by `interrupt`; this reads the time left.
                    let left = countdown.pause();
                    ctx.session.set_paused(true);
                    ctx.session.pause_audio();
                    tracing::debug!(?interrupt, left = left.as_secs(), "discussion interrupted");

                    let ended = self.resolve(ctx, interrupt).await;
                    ctx.session.set_paused(false);
                    if ended || ctx.is_expired() {
                        self.set_step(RoundStep::Stop);
                        countdown.cancel();
                    } else {
                        ctx.state(RoundState::clear_votes);
                        ctx.session.resume_audio();
                        ctx.session.send_public(&base).await;
                        self.set_step(RoundStep::Discussion);
                        countdown.resume();
                    }
                }
            }
        }
        // An interrupt queued as the clock ran out still resolves.
        if self.step() == RoundStep::Paused {
            if let Ok(interrupt) = interrupts.try_recv() {
                let ended = self.resolve(ctx, interrupt).await;
                ctx.session.set_paused(false);
                if ended {
                    self.set_step(RoundStep::Stop);
                }
            }
        }
        *lock(&self.countdown) = None;
    }

    /// Resolves an interrupt. Returns `true` if the round is over.
    async fn resolve(&self, ctx: &Ctx, interrupt: Interrupt) -> bool {
        match interrupt {
            Interrupt::Accuse(target) => {
                let was_spy = interrogate(ctx, &target).await;
                ctx.state(|s| {
                    if !was_spy {
                        s.game.result = Some(Winner::Spies);
                    } else if spies_alive(s) == 0 {
                        s.game.result = Some(Winner::Citizens);
                    }
                    s.game.result.is_some()
                })
            }
            Interrupt::Guess { spy, place } => {
                let name = name_of(&ctx.session, &spy);
                ctx.session
                    .send_public(&Content::titled(
                        "A spy steps forward",
                        format!("{name} was a spy and guesses the place: {place}."),
                    ))
                    .await;
                ctx.pause_for(Duration::from_secs(3)).await;

                let correct = ctx.state(|s| s.game.place_name() == Some(place.as_str()));
                if correct {
                    ctx.session
                        .send_public(&Content::titled("Correct guess", format!("{name} found the place.")))
                        .await;
                    ctx.session.cue(Cue::Success);
                    ctx.state(|s| s.game.result = Some(Winner::Spies));
                    return true;
                }

                ctx.session
                    .send_public(&Content::titled(
                        "Wrong guess",
                        format!("The place is not {place}. {name} is out."),
                    ))
                    .await;
                ctx.session.cue(Cue::Fail);
                ctx.session.emit(Event::ParticipantEliminated {
                    timestamp: Utc::now(),
                    session_id: ctx.session.id().to_string(),
                    participant: spy.to_string(),
                    was_spy: true,
                });
                ctx.state(|s| {
                    s.remove_living(&spy);
                    if spies_alive(s) == 0 {
                        s.game.result = Some(Winner::Citizens);
                    }
                    s.game.result.is_some()
                })
            }
        }
    }

    async fn last_vote(&self, ctx: &Ctx) -> Step {
        self.set_step(RoundStep::LastVote);
        while ctx.state(|s| spies_alive(s) > 0 && s.game.result.is_none()) {
            ctx.state(RoundState::clear_votes);
            let base = Content::titled("Final vote", "Time is up. Vote for the spy.")
                .select(VOTE, "Suspect", living_menu(ctx));
            let countdown = ctx.countdown_with_display(base.clone());
            *lock(&self.countdown) = Some(countdown.clone());
            ctx.session.send_public(&base).await;
            countdown.start(LAST_VOTE_WINDOW).await;
            *lock(&self.countdown) = None;
            if ctx.is_expired() {
                return Step::Halt;
            }

            let tally = ctx.state(|s| s.tally());
            let decision = tally.decision();
            ctx.session.emit(Event::VoteTallied {
                timestamp: Utc::now(),
                session_id: ctx.session.id().to_string(),
                voters: tally.voters,
                decision: match &decision {
                    Decision::Eliminate(id) => Some(id.to_string()),
                    Decision::NoElimination => None,
                },
            });

            if tally.voters == 0 {
                ctx.session
                    .send_public(&Content::titled("Nobody voted", "The spies slip away."))
                    .await;
                ctx.state(|s| s.game.result = Some(Winner::Spies));
                break;
            }
            ctx.session.send_public(&vote_summary(&ctx.session, &tally)).await;
            match decision {
                Decision::Eliminate(target) => {
                    if !interrogate(ctx, &target).await {
                        ctx.state(|s| s.game.result = Some(Winner::Spies));
                    }
                }
                Decision::NoElimination => {
                    ctx.session
                        .send_public(&Content::titled("Tie", "The vote is tied. Vote again."))
                        .await;
                }
            }
        }
        self.set_step(RoundStep::Stop);
        Step::Continue
    }

    async fn vote(&self, ctx: &Ctx, action: &InboundAction, step: RoundStep) {
        let target = UserId::from(action.first_value().unwrap_or_default());
        let outcome = ctx.state(|s| {
            s.cast_vote(&action.actor, Ballot::Player(target.clone()))
                .map(|voters| (voters, s.votes().count_for(&target), s.living_count()))
        });
        let Some((voters, against, living)) = outcome else {
            ctx.session
                .reply(action, &Content::text("You cannot cast that vote."), true)
                .await;
            return;
        };
        metrics::record_vote(ctx.game_id());

        match step {
            RoundStep::Discussion if against * 2 >= living => {
                if self.interrupt(Interrupt::Accuse(target.clone())) {
                    let name = name_of(&ctx.session, &target);
                    ctx.session
                        .send_public(&Content::titled("Accusation", format!("Half the table accuses {name}.")))
                        .await;
                }
            }
            RoundStep::LastVote if voters >= living => {
                let countdown = lock(&self.countdown).clone();
                if let Some(countdown) = countdown {
                    countdown.cancel();
                }
            }
            _ => {}
        }
        ctx.session
            .reply(action, &Content::text("Vote recorded."), true)
            .await;
    }

    async fn guess(&self, ctx: &Ctx, action: &InboundAction, step: RoundStep) {
        let message = match step {
            RoundStep::LastVote => "It is too late to guess the place.",
            RoundStep::Discussion => {
                let place = action.first_value().unwrap_or_default().to_owned();
                let (is_spy, known) = ctx.state(|s| {
                    (
                        s.is_living(&action.actor) && s.game.spies.contains(&action.actor),
                        s.game.places.iter().any(|p| p.name == place),
                    )
                });
                if !is_spy {
                    "Only a spy can guess the place."
                } else if !known {
                    "That place is not in play."
                } else if self.interrupt(Interrupt::Guess {
                    spy: action.actor.clone(),
                    place,
                }) {
                    "Your guess is in."
                } else {
                    "The game is busy; try again."
                }
            }
            _ => "You cannot guess right now.",
        };
        ctx.session.reply(action, &Content::text(message), true).await;
    }
}

#[async_trait::async_trait]
impl Phase<SpyFallState> for ProcessPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::ProcessRound
    }

    async fn enter(&self, _ctx: &Ctx) -> Step {
        self.set_step(RoundStep::None);
        Step::Continue
    }

    async fn act(&self, ctx: &Ctx) -> Step {
        self.discussion(ctx).await;
        if ctx.is_expired() {
            return Step::Halt;
        }
        if self.step() == RoundStep::Stop {
            return Step::Continue;
        }
        self.last_vote(ctx).await
    }

    async fn on_action(&self, ctx: &Ctx, action: &InboundAction) {
        let step = self.step();
        if step == RoundStep::Paused {
            ctx.session
                .reply(action, &Content::text("The game is paused."), true)
                .await;
            return;
        }
        match (step, action.kind, action.custom_id.as_str()) {
            (RoundStep::Discussion | RoundStep::LastVote, ActionKind::Select, VOTE) => {
                self.vote(ctx, action, step).await;
            }
            (_, ActionKind::Select, GUESS_PLACE) => self.guess(ctx, action, step).await,
            _ => tracing::trace!(?step, custom_id = %action.custom_id, "action ignored"),
        }
    }
}

// ============================================================================
// CLEAR_ROUND
// ============================================================================

/// Decides whether another round runs.
pub(super) struct ClearPhase;

/// Round-boundary outcome when the round left no result.
pub(super) const fn verdict(spies_alive: usize, living: usize) -> Option<Winner> {
    if spies_alive == 0 {
        Some(Winner::Citizens)
    } else if spies_dominate(spies_alive, living, false) {
        Some(Winner::Spies)
    } else {
        None
    }
}

#[async_trait::async_trait]
impl Phase<SpyFallState> for ClearPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::ClearRound
    }

    async fn act(&self, ctx: &Ctx) -> Step {
        let result = ctx.state(|s| {
            if s.game.result.is_none() {
                s.game.result = verdict(spies_alive(s), s.living_count());
            }
            s.game.result
        });
        match result {
            Some(winner) => {
                tracing::info!(session = %ctx.session.id(), ?winner, "game decided");
                Step::Branch(PhaseKind::Ending)
            }
            None => Step::Continue,
        }
    }
}
