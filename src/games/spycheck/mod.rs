//! `SpyCheck`: everyone answers the same question except the spies, who
//! have to bluff from the answer choices alone.

pub mod data;
mod phases;

use std::sync::Arc;

use partyline_core::config::schema::GameKind;

use super::content::{ContentProvider, Question};
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
    kind: GameKind::Spycheck,
    title: "SpyCheck",
    min_players: 4,
    max_players: 9,
};

/// Option ids.
pub mod option {
    /// Let players submit their own questions before the first round
    pub const CUSTOM_QUESTION_ENABLE: &str = "custom_question_enable";
    /// Seconds for submitting custom questions
    pub const CUSTOM_QUESTION_TIME: &str = "custom_question_time";
    /// Seconds for picking an answer
    pub const ANSWER_SELECT_TIME: &str = "answer_select_time";
    /// Seconds for discussion and voting
    pub const SPY_GUESS_TIME: &str = "spy_guess_time";
    /// Number of spies
    pub const SPY_COUNT: &str = "spy_count";
}

/// Round state specific to `SpyCheck`.
#[derive(Debug, Default)]
pub struct SpyCheckState {
    /// Everyone dealt the spy role, eliminated or not
    pub spies: Vec<UserId>,
    /// Remaining questions; the next one is popped from the back
    pub questions: Vec<Question>,
    /// Question of the running round
    pub current: Option<Question>,
    /// Round number, starting at 1
    pub round: u32,
    /// Decided winner
    pub result: Option<Winner>,
}

impl GameSummary for SpyCheckState {
    fn winner(&self) -> Option<Winner> {
        self.result
    }

    fn spies(&self) -> &[UserId] {
        &self.spies
    }

    fn reveal(&self) -> Vec<(String, String)> {
        vec![("Rounds played".to_string(), self.round.to_string())]
    }
}

/// The game's options with built-in defaults.
#[must_use]
pub fn default_options() -> GameOptions {
    GameOptions::new([
        GameOption::toggle(option::CUSTOM_QUESTION_ENABLE, "Custom questions", false),
        GameOption::range(option::CUSTOM_QUESTION_TIME, "Custom question time (s)", 30, 90, 10, 60),
        GameOption::range(option::ANSWER_SELECT_TIME, "Answer time (s)", 10, 60, 10, 30),
        GameOption::range(option::SPY_GUESS_TIME, "Discussion time (s)", 30, 120, 10, 70),
        GameOption::range(option::SPY_COUNT, "Spies", 1, 3, 1, 1),
    ])
}

struct Rules;

impl LobbyRules for Rules {
    fn check_start(&self, count: usize, options: &GameOptions) -> Result<(), String> {
        let spies = options.selected_u64(option::SPY_COUNT).unwrap_or(1);
        if spies.saturating_mul(2) >= count as u64 {
            return Err(format!(
                "{spies} spies need more than {} players.",
                spies.saturating_mul(2)
            ));
        }
        Ok(())
    }

    fn rule_book(&self) -> Content {
        Content::titled("SpyCheck rules", data::RULES)
    }
}

pub(crate) fn new_core(
    info: GameInfo,
    options: GameOptions,
    content: Arc<dyn ContentProvider>,
    settings: EngineSettings,
) -> Arc<GameCore<SpyCheckState>> {
    let phases: Vec<Arc<dyn Phase<SpyCheckState>>> = vec![
        Arc::new(LobbyPhase::new(Rules)),
        Arc::new(phases::StartPhase::new(content)),
        Arc::new(phases::PreparePhase),
        Arc::new(phases::ProcessPhase::default()),
        Arc::new(phases::ClearPhase),
        Arc::new(EndingPhase::default()),
        Arc::new(ExpirePhase::default()),
    ];
    GameCore::new(info, options, SpyCheckState::default(), settings, phases)
}

/// Builds a `SpyCheck` core.
#[must_use]
pub fn build(
    info: GameInfo,
    options: GameOptions,
    content: Arc<dyn ContentProvider>,
    settings: EngineSettings,
) -> Arc<dyn GameDriver> {
    new_core(info, options, content, settings)
}
