//! The shared lobby phase.
//!
//! The lobby posts a join board, gathers participants and lets the host
//! tune options. Its `act` step halts the chain; only the host's `start`
//! press moves the game on, by queueing `START` on the driver.

use std::marker::PhantomData;
use std::sync::Mutex;

use crate::engine::action::{ActionKind, InboundAction};
use crate::engine::core::{GameDriver, PhaseContext};
use crate::engine::lock;
use crate::engine::options::{GameOptions, OPTION_TYPE_SELECT, OPTION_VALUE_SELECT};
use crate::engine::phase::{Phase, PhaseKind, Step};
use crate::transport::{Content, Cue, MessageRef};

/// Game-specific lobby behaviour.
pub trait LobbyRules: Send + Sync {
    /// Extra start condition beyond the player limits.
    ///
    /// # Errors
    ///
    /// Returns the message shown to the host when the game cannot start.
    fn check_start(&self, count: usize, options: &GameOptions) -> Result<(), String>;

    /// Rule text shown by the rule book button.
    fn rule_book(&self) -> Content;
}

/// Lobby phase parameterised by its rules.
pub struct LobbyPhase<G> {
    rules: Box<dyn LobbyRules>,
    board: Mutex<Vec<MessageRef>>,
    _game: PhantomData<fn() -> G>,
}

impl<G> LobbyPhase<G> {
    /// Creates a lobby with `rules`.
    #[must_use]
    pub fn new(rules: impl LobbyRules + 'static) -> Self {
        Self {
            rules: Box::new(rules),
            board: Mutex::new(Vec::new()),
            _game: PhantomData,
        }
    }
}

impl<G: Send + 'static> LobbyPhase<G> {
    fn board_content(ctx: &PhaseContext<G>) -> Content {
        let info = ctx.info();
        let names: Vec<String> = ctx
            .session
            .participants()
            .iter()
            .map(|p| p.display_name().to_owned())
            .collect();
        let mut content = Content::titled(
            info.title,
            format!(
                "Press join to play. The host starts the game once {} to {} players are in.",
                info.min_players, info.max_players
            ),
        )
        .field(
            format!("Players ({}/{})", names.len(), info.max_players),
            names.join(", "),
        );
        for option in ctx.options().iter() {
            if let Some(choice) = option.current() {
                content = content.field(&option.label, &choice.label);
            }
        }
        content
            .button("join", "Join")
            .button("leave", "Leave")
            .button("start", "Start")
            .button("rule_book", "Rules")
            .button("setting", "Settings")
    }

    async fn refresh_board(&self, ctx: &PhaseContext<G>) {
        let board = lock(&self.board).clone();
        ctx.session.edit_public(&board, &Self::board_content(ctx)).await;
    }

    async fn join(&self, ctx: &PhaseContext<G>, action: &InboundAction) {
        let session = &ctx.session;
        let message = if ctx.core.is_started() {
            "The game has already started."
        } else if session.has_participant(&action.actor) {
            "You already joined."
        } else if session.participant_count() >= ctx.info().max_players {
            "The lobby is full."
        } else {
            session.add_participant(action);
            session.reply(action, &Content::text("You joined the game."), true).await;
            self.refresh_board(ctx).await;
            session.cue(Cue::Join);
            tracing::debug!(session = %session.id(), actor = %action.actor, "participant joined");
            return;
        };
        session.reply(action, &Content::text(message), true).await;
    }

    async fn leave(&self, ctx: &PhaseContext<G>, action: &InboundAction) {
        let session = &ctx.session;
        if !session.has_participant(&action.actor) {
            session.reply(action, &Content::text("You are not in this game."), true).await;
            return;
        }
        if session.is_host(&action.actor) {
            session
                .send_public(&Content::titled(
                    "Lobby closed",
                    format!("{} left, so the game is cancelled.", action.display_name()),
                ))
                .await;
            let board = std::mem::take(&mut *lock(&self.board));
            session.delete_public(&board).await;
            session.remove_participant(&action.actor);
            return;
        }
        session.remove_participant(&action.actor);
        session.reply(action, &Content::text("You left the game."), true).await;
        self.refresh_board(ctx).await;
    }

    async fn start(&self, ctx: &PhaseContext<G>, action: &InboundAction) {
        let session = &ctx.session;
        let info = ctx.info();
        if !session.is_host(&action.actor) {
            session.reply(action, &Content::text("Only the host can start the game."), true).await;
            return;
        }
        let count = session.participant_count();
        if count < info.min_players || count > info.max_players {
            let message = format!(
                "{} needs {} to {} players; {count} joined.",
                info.title, info.min_players, info.max_players
            );
            session.reply(action, &Content::text(message), true).await;
            return;
        }
        if let Err(message) = self.rules.check_start(count, &ctx.options()) {
            session.reply(action, &Content::text(message), true).await;
            return;
        }
        if !ctx.core.mark_started() {
            return;
        }

        let participants = session.participants();
        ctx.state(|s| s.set_living(participants));
        session.reply(action, &Content::text("Starting."), true).await;

        let board = lock(&self.board).clone();
        session
            .edit_public(&board, &Content::titled(info.title, format!("Game started with {count} players.")))
            .await;
        session.cue(Cue::GameStart);
        tracing::info!(session = %session.id(), players = count, "game started");

        if let Err(e) = ctx.enqueue(PhaseKind::Start) {
            tracing::error!(session = %session.id(), error = %e, "cannot queue start");
            session.force_stop("The game could not start.").await;
        }
    }

    async fn setting(ctx: &PhaseContext<G>, action: &InboundAction) {
        let session = &ctx.session;
        if !session.is_host(&action.actor) {
            session.reply(action, &Content::text("Only the host can change settings."), true).await;
            return;
        }
        if action.custom_id == "setting" {
            let menu = ctx.options().type_menu(ctx.info().title);
            session.reply(action, &menu, true).await;
            return;
        }
        if action.custom_id == OPTION_TYPE_SELECT {
            let menu = action
                .first_value()
                .and_then(|id| ctx.options().value_menu(id))
                .unwrap_or_else(|| Content::text("Unknown setting."));
            session.reply(action, &menu, true).await;
            return;
        }

        let Some(id) = action.custom_id.strip_prefix(OPTION_VALUE_SELECT) else {
            return;
        };
        let value = action.first_value().unwrap_or_default();
        if ctx.core.select_option(id, value) {
            session.save_options();
            let label = ctx
                .options()
                .get(id)
                .and_then(|o| o.current().map(|c| format!("{} set to {}.", o.label, c.label)))
                .unwrap_or_default();
            session.reply(action, &Content::text(label), true).await;
        } else {
            session.reply(action, &Content::text("That value is not available."), true).await;
        }
    }
}

#[async_trait::async_trait]
impl<G: Send + 'static> Phase<G> for LobbyPhase<G> {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Lobby
    }

    async fn enter(&self, ctx: &PhaseContext<G>) -> Step {
        let board = ctx.session.send_public(&Self::board_content(ctx)).await;
        *lock(&self.board) = board;
        Step::Continue
    }

    async fn act(&self, _ctx: &PhaseContext<G>) -> Step {
        Step::Halt
    }

    async fn on_action(&self, ctx: &PhaseContext<G>, action: &InboundAction) {
        match (action.kind, action.custom_id.as_str()) {
            (ActionKind::Button, "join") => self.join(ctx, action).await,
            (ActionKind::Button, "leave") => self.leave(ctx, action).await,
            (ActionKind::Button, "start") => self.start(ctx, action).await,
            (ActionKind::Button, "rule_book") => {
                ctx.session.reply(action, &self.rules.rule_book(), true).await;
            }
            (ActionKind::Button, "setting") => Self::setting(ctx, action).await,
            (ActionKind::Select, id)
                if id == OPTION_TYPE_SELECT || id.starts_with(OPTION_VALUE_SELECT) =>
            {
                Self::setting(ctx, action).await;
            }
            _ => tracing::trace!(custom_id = %action.custom_id, "lobby ignores action"),
        }
    }
}
