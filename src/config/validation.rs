//! Configuration validation
//!
//! Checks a parsed [`PartylineConfig`] for semantic problems serde cannot
//! catch. Every issue is collected rather than stopping at the first, so
//! `partyline validate` can report them together.

use std::collections::HashSet;

use crate::config::schema::{
    ContentConfig, EngineConfig, GameKind, GameRules, PartylineConfig,
};
use crate::engine::options::GameOptions;
use crate::engine::settings::parse_duration;
use crate::error::{Severity, ValidationIssue};
use crate::games::content::AnswerKind;
use crate::games::{spycheck, spyfall};

/// Collected validation issues.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Issues that make the configuration unusable
    pub errors: Vec<ValidationIssue>,
    /// Issues worth reporting that do not block loading
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if any error was found.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if no errors or warnings were found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// Semantic validator for `partyline` configuration.
#[derive(Debug, Default)]
pub struct Validator {
    result: ValidationResult,
}

impl Validator {
    /// Creates a validator with no recorded issues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `config`, consuming the validator.
    #[must_use]
    pub fn validate(mut self, config: &PartylineConfig) -> ValidationResult {
        self.validate_engine(&config.engine);
        self.validate_content(&config.content);
        for kind in GameKind::ALL {
            self.validate_rules(kind, config.games.rules(kind));
        }
        self.result
    }

    fn validate_engine(&mut self, engine: &EngineConfig) {
        let durations = [
            ("engine.countdown_floor", &engine.countdown_floor),
            ("engine.countdown_warn_threshold", &engine.countdown_warn_threshold),
            ("engine.reply_ttl", &engine.reply_ttl),
            ("engine.ticker_period", &engine.ticker_period),
        ];
        let mut parsed = Vec::with_capacity(durations.len());
        for (field, value) in durations {
            match parse_duration(field, value) {
                Ok(d) => parsed.push(Some(d)),
                Err(e) => {
                    self.add_error(field, e.to_string());
                    parsed.push(None);
                }
            }
        }

        if let [Some(floor), Some(threshold), _, Some(period)] = parsed.as_slice() {
            if floor >= threshold {
                self.add_warning(
                    "engine.countdown_floor",
                    "countdown floor is at or above the warn threshold",
                );
            }
            if period.is_zero() {
                self.add_error("engine.ticker_period", "ticker period must be non-zero");
            }
        }

        if engine.refresh_prompt_tick >= engine.dead_tick {
            self.add_error(
                "engine.refresh_prompt_tick",
                format!(
                    "refresh prompt tick ({}) must come before the dead tick ({})",
                    engine.refresh_prompt_tick, engine.dead_tick
                ),
            );
        }

        if !engine.pacing_scale.is_finite() || engine.pacing_scale < 0.0 {
            self.add_error(
                "engine.pacing_scale",
                format!("pacing scale must be a finite number >= 0, got {}", engine.pacing_scale),
            );
        }
    }

    fn validate_content(&mut self, content: &ContentConfig) {
        if let Some(questions) = &content.questions {
            if questions.is_empty() {
                self.add_warning("content.questions", "inline question bank is empty");
            }
            for (i, q) in questions.iter().enumerate() {
                let path = format!("content.questions[{i}]");
                if q.text.trim().is_empty() {
                    self.add_error(&path, "question text is empty");
                }
                if AnswerKind::from_code(q.answer_kind).is_none() {
                    self.add_error(
                        format!("{path}.answer_kind"),
                        format!("answer kind must be 0 to 4, got {}", q.answer_kind),
                    );
                }
            }
        }

        if let Some(places) = &content.places {
            if places.is_empty() {
                self.add_warning("content.places", "inline place table is empty");
            }
            let mut seen = HashSet::new();
            for (i, place) in places.iter().enumerate() {
                let path = format!("content.places[{i}]");
                if place.name.trim().is_empty() {
                    self.add_error(&path, "place name is empty");
                } else if !seen.insert(place.name.as_str()) {
                    self.add_warning(&path, format!("duplicate place '{}'", place.name));
                }
                if place.roles.is_empty() {
                    self.add_error(format!("{path}.roles"), "place has no roles");
                }
            }
        }
    }

    fn validate_rules(&mut self, kind: GameKind, rules: &GameRules) {
        let path = format!("games.{}", kind.id());
        let (info, mut options): (_, GameOptions) = match kind {
            GameKind::Spycheck => (spycheck::INFO, spycheck::default_options()),
            GameKind::Spyfall => (spyfall::INFO, spyfall::default_options()),
        };

        let min = rules.min_players.unwrap_or(info.min_players);
        let max = rules.max_players.unwrap_or(info.max_players);
        if min == 0 {
            self.add_error(format!("{path}.min_players"), "min_players must be at least 1");
        }
        if min > max {
            self.add_error(
                &path,
                format!("min_players ({min}) exceeds max_players ({max})"),
            );
        }

        for message in options.apply_overrides(&rules.options) {
            self.add_warning(format!("{path}.options"), message);
        }
    }

    fn add_error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.result.errors.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.result.warnings.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
            severity: Severity::Warning,
        });
    }
}
