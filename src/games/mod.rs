//! Game implementations on top of the phase engine.
//!
//! Each game supplies its typed round state, its options, and one phase
//! per [`PhaseKind`]. The lobby, ending and expire phases are shared; the
//! lobby takes its game-specific start check as a [`LobbyRules`] value.

pub mod content;
pub mod lobby;
pub mod spycheck;
pub mod spyfall;

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use partyline_core::config::schema::{GameKind, GamesConfig};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::engine::action::UserId;
use crate::engine::core::{GameDriver, GameInfo, PhaseContext};
use crate::engine::options::GameOptions;
use crate::engine::phase::{Phase, PhaseKind, Step};
use crate::engine::session::GameSession;
use crate::engine::settings::EngineSettings;
use crate::engine::tally::VoteTally;
use crate::observability::Event;
use crate::transport::{Content, Cue, SelectOption};

/// Select id of the public vote menu.
pub const VOTE: &str = "vote";

/// Button id for abstaining.
pub const VOTE_SKIP: &str = "vote_skip";

pub use content::{ContentLibrary, ContentProvider};
pub use lobby::{LobbyPhase, LobbyRules};

/// Which side won.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    /// Every spy was caught
    Citizens,
    /// The spies prevailed
    Spies,
}

impl Winner {
    /// Headline for the ending message.
    #[must_use]
    pub const fn headline(self) -> &'static str {
        match self {
            Self::Citizens => "The citizens win!",
            Self::Spies => "The spies win!",
        }
    }
}

/// What the shared ending phase needs from a game's state.
pub trait GameSummary: Send + 'static {
    /// The decided winner, if any.
    fn winner(&self) -> Option<Winner>;

    /// Every participant dealt the spy role.
    fn spies(&self) -> &[UserId];

    /// Extra reveal fields (`name`, `value`).
    fn reveal(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Builds cores for the enabled games.
pub struct GameCatalog {
    games: GamesConfig,
    content: Arc<dyn ContentProvider>,
    enabled: Vec<GameKind>,
    settings: EngineSettings,
}

impl std::fmt::Debug for GameCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameCatalog")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl GameCatalog {
    /// Creates a catalog with every game enabled.
    #[must_use]
    pub fn new(games: GamesConfig, content: Arc<dyn ContentProvider>, settings: EngineSettings) -> Self {
        Self {
            games,
            content,
            enabled: GameKind::ALL.to_vec(),
            settings,
        }
    }

    /// Restricts the catalog to `kinds`. An empty list keeps every game.
    #[must_use]
    pub fn with_enabled(mut self, kinds: &[GameKind]) -> Self {
        if !kinds.is_empty() {
            self.enabled = kinds.to_vec();
        }
        self
    }

    /// Returns `true` if `kind` may be played.
    #[must_use]
    pub fn is_enabled(&self, kind: GameKind) -> bool {
        self.enabled.contains(&kind)
    }

    /// Game description with configured player limits applied.
    #[must_use]
    pub fn info(&self, kind: GameKind) -> GameInfo {
        let base = match kind {
            GameKind::Spycheck => spycheck::INFO,
            GameKind::Spyfall => spyfall::INFO,
        };
        let rules = self.games.rules(kind);
        GameInfo {
            min_players: rules.min_players.unwrap_or(base.min_players),
            max_players: rules.max_players.unwrap_or(base.max_players),
            ..base
        }
    }

    /// The game's options with configured defaults applied.
    #[must_use]
    pub fn default_options(&self, kind: GameKind) -> GameOptions {
        let mut options = match kind {
            GameKind::Spycheck => spycheck::default_options(),
            GameKind::Spyfall => spyfall::default_options(),
        };
        for warning in options.apply_overrides(&self.games.rules(kind).options) {
            tracing::warn!(game = %kind, "{warning}");
        }
        options
    }

    /// Builds a fresh core.
    #[must_use]
    pub fn build(&self, kind: GameKind, options: GameOptions) -> Arc<dyn GameDriver> {
        let info = self.info(kind);
        match kind {
            GameKind::Spycheck => {
                spycheck::build(info, options, Arc::clone(&self.content), self.settings)
            }
            GameKind::Spyfall => {
                spyfall::build(info, options, Arc::clone(&self.content), self.settings)
            }
        }
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// A `Send` RNG for use inside phase steps.
pub(crate) fn rng() -> StdRng {
    StdRng::from_os_rng()
}

/// Display name of a participant, falling back to the id.
pub(crate) fn name_of(session: &GameSession, id: &UserId) -> String {
    session
        .participant(id)
        .map_or_else(|| id.to_string(), |p| p.display_name().to_owned())
}

/// Comma-separated display names.
pub(crate) fn names_of(session: &GameSession, ids: &[UserId]) -> String {
    if ids.is_empty() {
        return "nobody".to_string();
    }
    ids.iter()
        .map(|id| name_of(session, id))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Select entries for every living participant.
pub(crate) fn living_menu<G: Send + 'static>(ctx: &PhaseContext<G>) -> Vec<SelectOption> {
    ctx.state(|s| {
        s.living()
            .iter()
            .map(|p| SelectOption::new(p.display_name(), p.id().as_str()))
            .collect()
    })
}

/// Public summary of a voting window.
pub(crate) fn vote_summary(session: &GameSession, tally: &VoteTally) -> Content {
    let mut content = Content::titled("Votes", format!("{} voted.", tally.voters));
    for group in tally.groups.iter().filter(|g| g.count > 0) {
        for target in &group.targets {
            content = content.field(name_of(session, target), group.count.to_string());
        }
    }
    content
}

/// Interrogates `target`: reveals their role and removes them from play.
///
/// Returns whether the target was a spy.
pub(crate) async fn interrogate<G: GameSummary>(ctx: &PhaseContext<G>, target: &UserId) -> bool {
    let session = &ctx.session;
    let name = name_of(session, target);
    session
        .send_public(&Content::titled(
            "Interrogation",
            format!("{name} is taken in for questioning."),
        ))
        .await;
    session.cue(Cue::Punch);
    ctx.pause_for(Duration::from_secs(3)).await;

    let was_spy = ctx.state(|s| {
        let spy = s.game.spies().contains(target);
        s.remove_living(target);
        spy
    });
    let (verdict, cue) = if was_spy {
        (format!("{name} was a spy!"), Cue::GunShot)
    } else {
        (format!("{name} was innocent."), Cue::Error)
    };
    session.send_public(&Content::titled("Interrogation result", verdict)).await;
    session.cue(cue);
    session.emit(Event::ParticipantEliminated {
        timestamp: Utc::now(),
        session_id: session.id().to_string(),
        participant: target.to_string(),
        was_spy,
    });
    tracing::info!(session = %session.id(), participant = %target, was_spy, "participant eliminated");
    ctx.pause_for(Duration::from_secs(2)).await;
    was_spy
}

/// Whether the spies outnumber the table.
///
/// `strict` demands a strict majority; otherwise half the table is enough.
#[must_use]
pub(crate) const fn spies_dominate(spies: usize, living: usize, strict: bool) -> bool {
    if strict {
        spies * 2 > living
    } else {
        spies * 2 >= living
    }
}

// ============================================================================
// Shared phases
// ============================================================================

/// Announces the winner and reveals the hidden roles.
pub struct EndingPhase<G>(PhantomData<fn() -> G>);

impl<G> Default for EndingPhase<G> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

#[async_trait::async_trait]
impl<G: GameSummary> Phase<G> for EndingPhase<G> {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Ending
    }

    async fn act(&self, ctx: &PhaseContext<G>) -> Step {
        let (winner, spies, reveal) =
            ctx.state(|s| (s.game.winner(), s.game.spies().to_vec(), s.game.reveal()));

        let headline = winner.map_or("The game ended without a winner.", Winner::headline);
        let mut content = Content::titled("Game over", headline)
            .field("Spies", names_of(&ctx.session, &spies));
        for (name, value) in reveal {
            content = content.field(name, value);
        }
        ctx.session.send_public(&content).await;
        ctx.session.cue(Cue::Finish);
        ctx.pause_for(Duration::from_secs(5)).await;
        Step::Continue
    }
}

/// Tears the session down.
pub struct ExpirePhase<G>(PhantomData<fn() -> G>);

impl<G> Default for ExpirePhase<G> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

#[async_trait::async_trait]
impl<G: Send + 'static> Phase<G> for ExpirePhase<G> {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Expire
    }

    async fn act(&self, ctx: &PhaseContext<G>) -> Step {
        ctx.session.expire("game finished");
        Step::Continue
    }

    async fn exit(&self, _ctx: &PhaseContext<G>) -> Step {
        Step::Halt
    }
}
