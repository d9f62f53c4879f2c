//! Configuration schema types
//!
//! This module defines the configuration types for a `partyline` process.
//! These types are deserialized from YAML configuration files. Every
//! section is optional; a missing section takes its defaults.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root configuration for a `partyline` process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct PartylineConfig {
    /// Engine timing and pacing knobs
    #[serde(default)]
    pub engine: EngineConfig,

    /// Game content sources (question bank, place table)
    #[serde(default)]
    pub content: ContentConfig,

    /// Per-game rules and option defaults
    #[serde(default)]
    pub games: GamesConfig,
}

// ============================================================================
// Engine
// ============================================================================

/// Timing knobs for countdowns and the reply-lifetime guard.
///
/// Durations are humantime strings (`"840s"`, `"14m"`, `"250ms"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct EngineConfig {
    /// Countdowns shorter than this get no visible progress display
    #[serde(default = "default_countdown_floor")]
    pub countdown_floor: String,

    /// Countdowns at or above this are logged as likely unit confusion
    #[serde(default = "default_countdown_warn_threshold")]
    pub countdown_warn_threshold: String,

    /// How long a participant's private reply token stays valid
    #[serde(default = "default_reply_ttl")]
    pub reply_ttl: String,

    /// Period of the per-participant token ticker
    #[serde(default = "default_ticker_period")]
    pub ticker_period: String,

    /// Tick at which the participant is asked to refresh
    #[serde(default = "default_refresh_prompt_tick")]
    pub refresh_prompt_tick: u32,

    /// Tick at which the token is declared dead
    #[serde(default = "default_dead_tick")]
    pub dead_tick: u32,

    /// Multiplier applied to presentational pauses between reveals
    #[serde(default = "default_pacing_scale")]
    pub pacing_scale: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            countdown_floor: default_countdown_floor(),
            countdown_warn_threshold: default_countdown_warn_threshold(),
            reply_ttl: default_reply_ttl(),
            ticker_period: default_ticker_period(),
            refresh_prompt_tick: default_refresh_prompt_tick(),
            dead_tick: default_dead_tick(),
            pacing_scale: default_pacing_scale(),
        }
    }
}

fn default_countdown_floor() -> String {
    "10s".to_string()
}

fn default_countdown_warn_threshold() -> String {
    "10000s".to_string()
}

fn default_reply_ttl() -> String {
    "840s".to_string()
}

fn default_ticker_period() -> String {
    "60s".to_string()
}

const fn default_refresh_prompt_tick() -> u32 {
    10
}

const fn default_dead_tick() -> u32 {
    15
}

const fn default_pacing_scale() -> f64 {
    1.0
}

// ============================================================================
// Content
// ============================================================================

/// Sources for game content.
///
/// Inline lists and file references may be combined; file entries are
/// appended after inline ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct ContentConfig {
    /// Inline question bank
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<QuestionDef>>,

    /// YAML or JSON file holding a list of questions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions_file: Option<PathBuf>,

    /// Inline place table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub places: Option<Vec<PlaceDef>>,

    /// YAML or JSON file holding a list of places
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub places_file: Option<PathBuf>,
}

/// A question from the bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QuestionDef {
    /// Question text shown to non-spies
    pub text: String,

    /// Answer kind (0..=4)
    #[serde(default)]
    pub answer_kind: u8,
}

/// A place with its role deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PlaceDef {
    /// Place name, also the value of the guess menu
    pub name: String,

    /// Whether the place only appears in extended mode
    #[serde(default)]
    pub extended: bool,

    /// Roles dealt to non-spies at this place
    pub roles: Vec<String>,
}

// ============================================================================
// Games
// ============================================================================

/// Identifies a game type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    /// Question/answer/vote rounds with hidden spies
    #[serde(alias = "spy_check")]
    Spycheck,
    /// Place/role discussion with a hidden spy
    #[serde(alias = "spy_fall")]
    Spyfall,
}

impl GameKind {
    /// All game kinds, in menu order.
    pub const ALL: [Self; 2] = [Self::Spycheck, Self::Spyfall];

    /// Stable identifier used in commands, metrics and cache keys.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Spycheck => "spycheck",
            Self::Spyfall => "spyfall",
        }
    }

    /// Parses a game identifier, accepting the `spy_check`/`spy-check` spellings.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        let normalized: String = id
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL.into_iter().find(|k| k.id() == normalized)
    }
}

impl std::fmt::Display for GameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Per-game configuration blocks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct GamesConfig {
    /// `SpyCheck` rules
    #[serde(default)]
    pub spycheck: GameRules,

    /// `SpyFall` rules
    #[serde(default)]
    pub spyfall: GameRules,
}

impl GamesConfig {
    /// Returns the rules block for `kind`.
    #[must_use]
    pub const fn rules(&self, kind: GameKind) -> &GameRules {
        match kind {
            GameKind::Spycheck => &self.spycheck,
            GameKind::Spyfall => &self.spyfall,
        }
    }
}

/// Player limits and option defaults for one game.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct GameRules {
    /// Overrides the game's minimum player count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_players: Option<usize>,

    /// Overrides the game's maximum player count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_players: Option<usize>,

    /// Option id → default selected value
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub options: IndexMap<String, String>,
}
