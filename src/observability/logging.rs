//! Logging setup for `partyline`.
//!
//! Logs go to stderr; stdout carries the platform protocol. The verbosity
//! flags raise the level of the `partyline` crates only, so dependencies
//! stay at `warn` unless `PARTYLINE_LOG_LEVEL` replaces the whole filter.
//!
//! Every task a session spawns runs inside [`session_span`], so lines
//! emitted by a game carry its session id and game.

use std::io::IsTerminal;

use tracing::Span;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::cli::args::ColorChoice;

/// Environment variable holding a full `EnvFilter` directive.
pub const LOG_LEVEL_ENV: &str = "PARTYLINE_LOG_LEVEL";

/// Targets raised by `-v`.
const ENGINE_TARGETS: [&str; 2] = ["partyline", "partyline_core"];

/// Level for the engine targets at `verbosity`. Saturates at `trace`.
#[must_use]
pub const fn verbosity_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Filter used when `PARTYLINE_LOG_LEVEL` is unset or unparsable.
#[must_use]
pub fn default_directives(verbosity: u8) -> String {
    let level = verbosity_level(verbosity);
    std::iter::once("warn".to_owned())
        .chain(ENGINE_TARGETS.iter().map(|target| format!("{target}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

fn build_filter(env_directive: Option<String>, verbosity: u8) -> EnvFilter {
    env_directive
        .and_then(|directive| match EnvFilter::try_new(&directive) {
            Ok(filter) => Some(filter),
            Err(e) => {
                eprintln!("ignoring {LOG_LEVEL_ENV}={directive:?}: {e}");
                None
            }
        })
        .unwrap_or_else(|| EnvFilter::new(default_directives(verbosity)))
}

/// Installs the global subscriber. Calling it again is a no-op.
pub fn init_logging(verbosity: u8, color: ColorChoice) {
    let filter = build_filter(std::env::var(LOG_LEVEL_ENV).ok(), verbosity);

    let use_ansi = match color {
        ColorChoice::Auto => {
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(use_ansi)
        .with_target(verbosity >= 2)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Span wrapping a session's tasks.
#[must_use]
pub fn session_span(session: Uuid, game: &str) -> Span {
    tracing::info_span!("session", id = %session, game)
}
