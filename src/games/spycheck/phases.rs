//! `SpyCheck` phases after the lobby.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use rand::seq::{IndexedRandom, SliceRandom};

use super::{SpyCheckState, option};
use crate::engine::action::{ActionKind, InboundAction, UserId};
use crate::engine::core::PhaseContext;
use crate::engine::countdown::Countdown;
use crate::engine::lock;
use crate::engine::phase::{Phase, PhaseKind, Step};
use crate::engine::round::RoundState;
use crate::engine::tally::{Ballot, Decision};
use crate::games::content::{AnswerKind, ContentProvider, Question};
use crate::games::{
    VOTE, VOTE_SKIP, Winner, interrogate, living_menu, name_of, names_of, rng, spies_dominate,
    vote_summary,
};
use crate::observability::{Event, metrics};
use crate::transport::{Content, Cue, SelectOption};

/// Select id of the private answer menu.
pub const ANSWER_SELECT: &str = "answer_select";

/// Modal id for submitting a custom question.
pub const CUSTOM_QUESTION: &str = "custom_question";

type Ctx = PhaseContext<SpyCheckState>;

fn seconds(ctx: &Ctx, id: &str, default: u64) -> Duration {
    Duration::from_secs(ctx.option_u64(id, default))
}

// ============================================================================
// START
// ============================================================================

/// Deals the spy role, gathers custom questions and builds the pool.
pub(super) struct StartPhase {
    content: Arc<dyn ContentProvider>,
    collecting: AtomicBool,
}

impl StartPhase {
    pub(super) fn new(content: Arc<dyn ContentProvider>) -> Self {
        Self {
            content,
            collecting: AtomicBool::new(false),
        }
    }

    async fn deal_roles(ctx: &Ctx) -> usize {
        let living = ctx.state(|s| s.living().to_vec());
        let wanted = usize::try_from(ctx.option_u64(option::SPY_COUNT, 1)).unwrap_or(1);
        let count = wanted.clamp(1, living.len().saturating_sub(1).max(1));
        let spies: Vec<UserId> = living
            .choose_multiple(&mut rng(), count)
            .map(|p| p.id().clone())
            .collect();
        ctx.state(|s| s.game.spies.clone_from(&spies));

        let spy_names = names_of(&ctx.session, &spies);
        let noun = if count > 1 { "spies" } else { "spy" };
        let mut spy_alert = Content::titled(
            "You are a spy",
            "You will not see the questions. Blend in with your answers.",
        );
        if spies.len() > 1 {
            spy_alert = spy_alert.field("Spies", &spy_names);
        }
        let citizen_alert = Content::titled(
            "You are a citizen",
            format!("Answer honestly and find the {count} {noun} among you."),
        );

        join_all(living.iter().map(|participant| {
            let content = if spies.contains(participant.id()) {
                &spy_alert
            } else {
                &citizen_alert
            };
            participant.send_private(content)
        }))
        .await;
        tracing::debug!(session = %ctx.session.id(), spies = count, "roles dealt");
        count
    }

    async fn collect_custom(&self, ctx: &Ctx) {
        let base = Content::titled(
            "Custom questions",
            "Add your own questions for this game before the first round.",
        )
        .modal(CUSTOM_QUESTION, "Add a question");
        ctx.session.send_public(&base).await;
        let countdown = ctx.countdown_with_display(base);
        self.collecting.store(true, Ordering::SeqCst);
        countdown
            .start(seconds(ctx, option::CUSTOM_QUESTION_TIME, 60))
            .await;
        self.collecting.store(false, Ordering::SeqCst);
    }
}

/// Keeps every custom question and tops up with built-in ones until
/// `needed` are in play, then shuffles.
fn fill_questions(
    mut custom: Vec<Question>,
    mut builtin: Vec<Question>,
    needed: usize,
    rng: &mut impl rand::Rng,
) -> Vec<Question> {
    builtin.shuffle(rng);
    builtin.truncate(needed.saturating_sub(custom.len()));
    custom.append(&mut builtin);
    custom.shuffle(rng);
    custom
}

#[async_trait::async_trait]
impl Phase<SpyCheckState> for StartPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Start
    }

    async fn act(&self, ctx: &Ctx) -> Step {
        let spy_count = Self::deal_roles(ctx).await;
        if ctx.option_bool(option::CUSTOM_QUESTION_ENABLE) {
            self.collect_custom(ctx).await;
            if ctx.is_expired() {
                return Step::Halt;
            }
        }

        let needed = spy_count + 2;
        let custom = ctx.state(|s| std::mem::take(&mut s.game.questions));
        let pool = self.content.question_pool();
        if custom.len() + pool.len() < needed {
            ctx.session
                .force_stop(&format!(
                    "SpyCheck needs at least {needed} questions but only {} are available.",
                    custom.len() + pool.len()
                ))
                .await;
            return Step::Halt;
        }

        let questions = fill_questions(custom, pool, needed, &mut rng());
        ctx.state(|s| s.game.questions = questions);
        Step::Continue
    }

    async fn on_action(&self, ctx: &Ctx, action: &InboundAction) {
        if !self.collecting.load(Ordering::SeqCst) || !action.is(ActionKind::Modal, CUSTOM_QUESTION) {
            return;
        }
        let text = action.first_value().map(str::trim).unwrap_or_default();
        if text.is_empty() {
            ctx.session
                .reply(action, &Content::text("The question is empty."), true)
                .await;
            return;
        }
        let code = action
            .values
            .get(1)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        let Ok(question) = Question::new(text, code) else {
            ctx.session
                .reply(action, &Content::text(format!("Unknown answer kind {code}.")), true)
                .await;
            return;
        };
        let added = ctx.state(|s| {
            s.is_living(&action.actor).then(|| {
                s.game.questions.push(question);
                s.game.questions.len()
            })
        });
        let message = match added {
            Some(n) => format!("Question added ({n} so far)."),
            None => "Only players can add questions.".to_string(),
        };
        ctx.session.reply(action, &Content::text(message), true).await;
    }
}

// ============================================================================
// PREPARE_ROUND
// ============================================================================

/// Clears the round and draws the next question.
pub(super) struct PreparePhase;

#[async_trait::async_trait]
impl Phase<SpyCheckState> for PreparePhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::PrepareRound
    }

    async fn act(&self, ctx: &Ctx) -> Step {
        let round = ctx.state(|s| {
            s.clear_round();
            s.game.current = s.game.questions.pop();
            s.game.current.is_some().then(|| {
                s.game.round += 1;
                s.game.round
            })
        });
        let Some(round) = round else {
            ctx.session.force_stop("The question pool ran out.").await;
            return Step::Halt;
        };
        ctx.session
            .send_public(&Content::titled(
                format!("Round {round}"),
                "Your question is waiting in your private menu.",
            ))
            .await;
        ctx.session.cue(Cue::Pling);
        Step::Continue
    }
}

// ============================================================================
// PROCESS_ROUND
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum SpyCheckStep {
    #[default]
    Idle,
    Answering,
    Revealing,
    Voting,
    Resolving,
}

/// Ask, collect, reveal, vote, resolve.
#[derive(Default)]
pub(super) struct ProcessPhase {
    step: Mutex<SpyCheckStep>,
    countdown: Mutex<Option<Countdown>>,
}

impl ProcessPhase {
    fn begin(&self, step: SpyCheckStep, countdown: Option<&Countdown>) {
        *lock(&self.countdown) = countdown.cloned();
        *lock(&self.step) = step;
    }

    fn early_out(&self) {
        let countdown = lock(&self.countdown).clone();
        if let Some(countdown) = countdown {
            countdown.cancel();
        }
    }

    fn answer_menu(ctx: &Ctx, question: &Question) -> Vec<SelectOption> {
        match question.kind {
            AnswerKind::Participant => living_menu(ctx),
            kind => kind
                .choices()
                .iter()
                .map(|c| SelectOption::new(*c, *c))
                .collect(),
        }
    }

    async fn collect_answers(&self, ctx: &Ctx, round: u32, question: &Question, menu: &[SelectOption]) {
        let base = Content::titled(
            format!("Round {round}: answer"),
            "Pick your answer in your private menu.",
        );
        let countdown = ctx.countdown_with_display(base.clone());
        self.begin(SpyCheckStep::Answering, Some(&countdown));

        let (living, spies) = ctx.state(|s| (s.living().to_vec(), s.game.spies.clone()));
        for participant in &living {
            let prompt = if spies.contains(participant.id()) {
                Content::titled(
                    "Hidden question",
                    "You are the spy, so the question is hidden. Pick an answer that blends in.",
                )
            } else {
                Content::titled(format!("Round {round}"), &question.text)
            };
            participant
                .send_private(&prompt.select(ANSWER_SELECT, "Your answer", menu.to_vec()))
                .await;
        }
        ctx.session.send_public(&base).await;
        countdown
            .start(seconds(ctx, option::ANSWER_SELECT_TIME, 30))
            .await;
        self.begin(SpyCheckStep::Revealing, None);
    }

    async fn reveal(ctx: &Ctx, round: u32, question: &Question, menu: &[SelectOption]) {
        let values: Vec<String> = menu.iter().map(|o| o.value.clone()).collect();
        let filled = ctx.state(|s| {
            s.backfill(|_| values.choose(&mut rng()).cloned().unwrap_or_default())
        });
        for (id, value) in filled {
            ctx.session
                .send_private(
                    &id,
                    &Content::text(format!(
                        "Time ran out, so an answer was picked for you: {}.",
                        label_of(menu, &value)
                    )),
                )
                .await;
        }

        let answers: Vec<(UserId, String)> = ctx.state(|s| {
            s.answers()
                .iter()
                .map(|(id, a)| (id.clone(), a.value.clone()))
                .collect()
        });
        let mut content = Content::titled(format!("Round {round} answers"), &question.text);
        for (id, value) in &answers {
            content = content.field(name_of(&ctx.session, id), label_of(menu, value));
        }
        ctx.session.send_public(&content).await;
        ctx.session.cue(Cue::ScoreAlarm);
        ctx.pause_for(Duration::from_secs(5)).await;
    }

    async fn collect_votes(&self, ctx: &Ctx) {
        ctx.state(RoundState::clear_votes);
        let base = Content::titled("Vote", "Discuss, then vote for the player you suspect.")
            .select(VOTE, "Suspect", living_menu(ctx))
            .button(VOTE_SKIP, "Skip");
        let countdown = ctx.countdown_with_display(base.clone());
        self.begin(SpyCheckStep::Voting, Some(&countdown));
        ctx.session.send_public(&base).await;
        countdown.start(seconds(ctx, option::SPY_GUESS_TIME, 70)).await;
        self.begin(SpyCheckStep::Resolving, None);
    }

    async fn resolve(ctx: &Ctx) {
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
        ctx.session.send_public(&vote_summary(&ctx.session, &tally)).await;

        match decision {
            Decision::Eliminate(target) => {
                interrogate(ctx, &target).await;
            }
            Decision::NoElimination => {
                ctx.session
                    .send_public(&Content::titled(
                        "No elimination",
                        "Nobody was singled out. On to the next round.",
                    ))
                    .await;
            }
        }
    }

    async fn answer(&self, ctx: &Ctx, action: &InboundAction) {
        let value = action.first_value().unwrap_or_default();
        let recorded = ctx.state(|s| {
            let valid = match s.game.current.as_ref().map(|q| q.kind) {
                Some(AnswerKind::Participant) => s.is_living(&UserId::from(value)),
                Some(kind) => kind.choices().contains(&value),
                None => false,
            };
            if !valid {
                return None;
            }
            s.record_answer(&action.actor, value)
                .map(|n| n >= s.living_count())
        });
        let message = match recorded {
            Some(all_in) => {
                if all_in {
                    self.early_out();
                }
                "Answer recorded."
            }
            None => "That answer is not available.",
        };
        ctx.session.reply(action, &Content::text(message), true).await;
    }

    async fn vote(&self, ctx: &Ctx, action: &InboundAction, ballot: Ballot) {
        let cast = ctx.state(|s| {
            s.cast_vote(&action.actor, ballot)
                .map(|n| n >= s.living_count())
        });
        let message = match cast {
            Some(all_in) => {
                metrics::record_vote(ctx.game_id());
                if all_in {
                    self.early_out();
                }
                "Vote recorded."
            }
            None => "You cannot cast that vote.",
        };
        ctx.session.reply(action, &Content::text(message), true).await;
    }
}

fn label_of<'a>(menu: &'a [SelectOption], value: &'a str) -> &'a str {
    menu.iter()
        .find(|o| o.value == value)
        .map_or(value, |o| o.label.as_str())
}

#[async_trait::async_trait]
impl Phase<SpyCheckState> for ProcessPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::ProcessRound
    }

    async fn enter(&self, _ctx: &Ctx) -> Step {
        self.begin(SpyCheckStep::Idle, None);
        Step::Continue
    }

    async fn act(&self, ctx: &Ctx) -> Step {
        let current = ctx.state(|s| s.game.current.clone().map(|q| (q, s.game.round)));
        let Some((question, round)) = current else {
            ctx.session.force_stop("No question for this round.").await;
            return Step::Halt;
        };
        let menu = Self::answer_menu(ctx, &question);

        self.collect_answers(ctx, round, &question, &menu).await;
        if ctx.is_expired() {
            return Step::Halt;
        }
        Self::reveal(ctx, round, &question, &menu).await;
        if ctx.is_expired() {
            return Step::Halt;
        }
        self.collect_votes(ctx).await;
        if ctx.is_expired() {
            return Step::Halt;
        }
        Self::resolve(ctx).await;
        self.begin(SpyCheckStep::Idle, None);
        Step::Continue
    }

    async fn on_action(&self, ctx: &Ctx, action: &InboundAction) {
        let step = *lock(&self.step);
        match (step, action.kind, action.custom_id.as_str()) {
            (SpyCheckStep::Answering, ActionKind::Select, ANSWER_SELECT) => {
                self.answer(ctx, action).await;
            }
            (SpyCheckStep::Voting, ActionKind::Select, VOTE) => {
                let target = UserId::from(action.first_value().unwrap_or_default());
                self.vote(ctx, action, Ballot::Player(target)).await;
            }
            (SpyCheckStep::Voting, ActionKind::Button, VOTE_SKIP) => {
                self.vote(ctx, action, Ballot::Skip).await;
            }
            _ => tracing::trace!(?step, custom_id = %action.custom_id, "action ignored"),
        }
    }
}

// ============================================================================
// CLEAR_ROUND
// ============================================================================

/// Decides whether another round runs.
pub(super) struct ClearPhase;

/// Round-boundary outcome.
pub(super) const fn verdict(spies_alive: usize, living: usize, pool_empty: bool) -> Option<Winner> {
    if spies_alive == 0 {
        Some(Winner::Citizens)
    } else if spies_dominate(spies_alive, living, true) || pool_empty {
        Some(Winner::Spies)
    } else {
        None
    }
}

#[async_trait::async_trait]
impl Phase<SpyCheckState> for ClearPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::ClearRound
    }

    async fn act(&self, ctx: &Ctx) -> Step {
        let result = ctx.state(|s| {
            let alive = s.game.spies.iter().filter(|id| s.is_living(id)).count();
            let result = verdict(alive, s.living_count(), s.game.questions.is_empty());
            s.game.result = result;
            result
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::core::{GameCore, GameDriver};
    use crate::engine::settings::EngineSettings;
    use crate::engine::testing::{Harness, harness_with, inbound_with, settle};
    use crate::games::content::ContentLibrary;
    use crate::games::spycheck::{INFO, default_options, new_core};

    fn questions(prefix: &str, n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| Question::new(format!("{prefix} {i}?"), 0).unwrap())
            .collect()
    }

    #[test]
    fn test_fill_questions_keeps_every_custom_question() {
        let custom = questions("custom", 5);
        let filled = fill_questions(custom.clone(), questions("builtin", 10), 3, &mut rng());
        assert_eq!(filled.len(), 5);
        assert!(custom.iter().all(|q| filled.contains(q)));
    }

    #[test]
    fn test_fill_questions_tops_up_shortfall() {
        let custom = questions("custom", 1);
        let filled = fill_questions(custom.clone(), questions("builtin", 10), 4, &mut rng());
        assert_eq!(filled.len(), 4);
        assert!(filled.contains(&custom[0]));
        assert_eq!(filled.iter().filter(|q| q.text.starts_with("builtin")).count(), 3);
    }

    #[test]
    fn test_verdict() {
        assert_eq!(verdict(0, 3, false), Some(Winner::Citizens));
        assert_eq!(verdict(2, 3, false), Some(Winner::Spies));
        assert_eq!(verdict(2, 4, false), None);
        assert_eq!(verdict(1, 4, true), Some(Winner::Spies));
        assert_eq!(verdict(1, 4, false), None);
    }

    fn setup(members: &[&str], spy: &str) -> (Arc<GameCore<SpyCheckState>>, Harness) {
        let settings = EngineSettings {
            pacing_scale: 0.0,
            ..EngineSettings::default()
        };
        let core = new_core(
            INFO,
            default_options(),
            Arc::new(ContentLibrary::builtin()),
            settings,
        );
        let h = harness_with(core.clone(), members);
        let participants = h.session.participants();
        core.with_state(|s| {
            s.set_living(participants);
            s.game.spies = vec![UserId::from(spy)];
            s.game.round = 1;
            s.game.current = Some(Question::new("Do you like tea?", 3).unwrap());
            s.game.questions = vec![
                Question::new("Do you like rain?", 3).unwrap(),
                Question::new("Do you like snow?", 3).unwrap(),
            ];
        });
        (core, h)
    }

    async fn send(core: &Arc<GameCore<SpyCheckState>>, h: &Harness, actor: &str, id: &str, value: &str) {
        let kind = if id == VOTE_SKIP {
            ActionKind::Button
        } else {
            ActionKind::Select
        };
        core.clone()
            .dispatch(h.session.clone(), inbound_with(kind, actor, id, &[value]))
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_answers_end_collection_early() {
        let members = ["host", "u2", "u3", "u4", "u5"];
        let (core, h) = setup(&members, "u5");
        let chain = {
            let core = core.clone();
            let session = h.session.clone();
            tokio::spawn(async move { core.do_cycle(&session, PhaseKind::ProcessRound).await })
        };
        settle().await;
        let started = tokio::time::Instant::now();

        let spy_prompt = h.messenger.privates_to(&UserId::from("u5"));
        assert!(spy_prompt.iter().any(|c| c.title.as_deref() == Some("Hidden question")));
        assert!(!spy_prompt.iter().any(|c| c.body.contains("tea")));
        assert!(
            h.messenger
                .privates_to(&UserId::from("u2"))
                .iter()
                .any(|c| c.body.contains("tea") && c.has_control(ANSWER_SELECT))
        );

        for member in members {
            send(&core, &h, member, ANSWER_SELECT, "Yes").await;
        }
        settle().await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(h.messenger.publics().iter().any(|c| c.has_control(VOTE)));
        assert!(h.messenger.public_mentions("Round 1 answers"));

        h.session.expire("test over");
        chain.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_tied_vote_loops_to_next_round() {
        let members = ["host", "u2", "u3", "u4"];
        let (core, h) = setup(&members, "u4");
        let chain = {
            let core = core.clone();
            let session = h.session.clone();
            tokio::spawn(async move { core.do_cycle(&session, PhaseKind::ProcessRound).await })
        };
        settle().await;
        for member in members {
            send(&core, &h, member, ANSWER_SELECT, "No").await;
        }
        settle().await;

        send(&core, &h, "host", VOTE, "u3").await;
        send(&core, &h, "u2", VOTE, "u3").await;
        send(&core, &h, "u3", VOTE, "host").await;
        send(&core, &h, "u4", VOTE, "host").await;
        settle().await;

        assert!(h.messenger.public_mentions("No elimination"));
        assert_eq!(core.with_state(|s| s.living_count()), 4);
        assert_eq!(core.with_state(|s| s.game.round), 2);
        assert_eq!(core.current_phase(), Some(PhaseKind::ProcessRound));

        h.session.expire("test over");
        chain.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_catching_the_spy_ends_game() {
        let members = ["host", "u2", "u3", "u4"];
        let (core, h) = setup(&members, "u4");
        let chain = {
            let core = core.clone();
            let session = h.session.clone();
            tokio::spawn(async move { core.do_cycle(&session, PhaseKind::ProcessRound).await })
        };
        settle().await;
        // Nobody answers: everyone is backfilled when time runs out.
        tokio::time::sleep(Duration::from_secs(31)).await;
        settle().await;
        assert!(
            h.messenger
                .privates_to(&UserId::from("u2"))
                .iter()
                .any(|c| c.body.contains("picked for you"))
        );

        for member in ["host", "u2", "u3"] {
            send(&core, &h, member, VOTE, "u4").await;
        }
        send(&core, &h, "u4", VOTE_SKIP, "").await;
        chain.await.unwrap();

        assert!(h.messenger.public_mentions("was a spy!"));
        assert!(h.messenger.public_mentions("The citizens win!"));
        assert_eq!(core.with_state(|s| s.game.result), Some(Winner::Citizens));
        assert!(h.session.is_expired());
    }
}
