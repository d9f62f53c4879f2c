//! `SpyFall`: everyone but the spies knows the secret place. Citizens hunt
//! the spies through questions; a spy may try to guess the place.

pub mod data;
mod phases;

use std::sync::Arc;

use partyline_core::config::schema::GameKind;

use super::content::{ContentProvider, Place};
use super::lobby::{LobbyPhase, LobbyRules};
use super::{EndingPhase, ExpirePhase, GameSummary, Winner};
use crate::engine::action::UserId;
use crate::engine::core::{GameCore, GameDriver, GameInfo};
use crate::engine::options::{GameOption, GameOptions};
use crate::engine::phase::Phase;
use crate::engine::settings::EngineSettings;
use crate::transport::Content;

/// Built-in description; player limits may be overridden by config.
pub const INFO: GameInfo = GameInfo {
    kind: GameKind::Spyfall,
    title: "SpyFall",
    min_players: 3,
    max_players: 8,
};

/// Option ids.
pub mod option {
    /// Include the extended place set
    pub const EXTEND_MODE: &str = "extend_mode";
    /// Seconds of discussion before the final vote
    pub const SPY_GUESS_TIME: &str = "spy_guess_time";
    /// Number of spies
    pub const SPY_COUNT: &str = "spy_count";
}

/// Round state specific to `SpyFall`.
#[derive(Debug, Default)]
pub struct SpyFallState {
    /// Everyone dealt the spy role, eliminated or not
    pub spies: Vec<UserId>,
    /// The secret place
    pub place: Option<Place>,
    /// Places the spies may guess from
    pub places: Vec<Place>,
    /// Decided winner
    pub result: Option<Winner>,
}

impl SpyFallState {
    fn place_name(&self) -> Option<&str> {
        self.place.as_ref().map(|p| p.name.as_str())
    }
}

impl GameSummary for SpyFallState {
    fn winner(&self) -> Option<Winner> {
        self.result
    }

    fn spies(&self) -> &[UserId] {
        &self.spies
    }

    fn reveal(&self) -> Vec<(String, String)> {
        self.place_name()
            .map(|name| vec![("Place".to_string(), name.to_string())])
            .unwrap_or_default()
    }
}

/// The game's options with built-in defaults.
#[must_use]
pub fn default_options() -> GameOptions {
    GameOptions::new([
        GameOption::toggle(option::EXTEND_MODE, "Extended places", false),
        GameOption::range(option::SPY_GUESS_TIME, "Discussion time (s)", 300, 900, 60, 600),
        GameOption::range(option::SPY_COUNT, "Spies", 1, 2, 1, 1),
    ])
}

struct Rules;

impl LobbyRules for Rules {
    fn check_start(&self, count: usize, options: &GameOptions) -> Result<(), String> {
        let spies = options.selected_u64(option::SPY_COUNT).unwrap_or(1);
        if spies.saturating_mul(2) >= count as u64 {
            return Err(format!("{spies} spies are too many for {count} players."));
        }
        Ok(())
    }

    fn rule_book(&self) -> Content {
        Content::titled("SpyFall rules", data::RULES)
    }
}

pub(crate) fn new_core(
    info: GameInfo,
    options: GameOptions,
    content: Arc<dyn ContentProvider>,
    settings: EngineSettings,
) -> Arc<GameCore<SpyFallState>> {
    let phases: Vec<Arc<dyn Phase<SpyFallState>>> = vec![
        Arc::new(LobbyPhase::new(Rules)),
        Arc::new(phases::StartPhase::new(content)),
        Arc::new(phases::PreparePhase),
        Arc::new(phases::ProcessPhase::default()),
        Arc::new(phases::ClearPhase),
        Arc::new(EndingPhase::default()),
        Arc::new(ExpirePhase::default()),
    ];
    GameCore::new(info, options, SpyFallState::default(), settings, phases)
}

/// Builds a `SpyFall` core.
#[must_use]
pub fn build(
    info: GameInfo,
    options: GameOptions,
    content: Arc<dyn ContentProvider>,
    settings: EngineSettings,
) -> Arc<dyn GameDriver> {
    new_core(info, options, content, settings)
}
