//! Phase state-machine vocabulary.
//!
//! Every phase runs `enter`, `act` and `exit` in order. Each step returns
//! a [`Step`]; anything but [`Step::Continue`] ends the chain quietly
//! ([`Step::Halt`]) or redirects it ([`Step::Branch`]). Player actions
//! reach the current phase through [`Phase::on_action`], concurrently with
//! the running step.

use super::action::InboundAction;
use super::core::PhaseContext;

/// The fixed set of phase kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PhaseKind {
    /// Gathering participants
    Lobby,
    /// One-off setup
    Start,
    /// Per-round setup
    PrepareRound,
    /// Prompt, collect, reveal, resolve
    ProcessRound,
    /// Round boundary: loop or end
    ClearRound,
    /// Result announcement
    Ending,
    /// Teardown
    Expire,
}

impl PhaseKind {
    /// All kinds in chain order.
    pub const ALL: [Self; 7] = [
        Self::Lobby,
        Self::Start,
        Self::PrepareRound,
        Self::ProcessRound,
        Self::ClearRound,
        Self::Ending,
        Self::Expire,
    ];

    /// Stable label used in logs, events and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lobby => "LOBBY",
            Self::Start => "START",
            Self::PrepareRound => "PREPARE_ROUND",
            Self::ProcessRound => "PROCESS_ROUND",
            Self::ClearRound => "CLEAR_ROUND",
            Self::Ending => "ENDING",
            Self::Expire => "EXPIRE",
        }
    }

    /// The pre-wired successor. `CLEAR_ROUND` may branch to `ENDING` at
    /// runtime; `EXPIRE` has none.
    #[must_use]
    pub const fn default_next(self) -> Option<Self> {
        match self {
            Self::Lobby => Some(Self::Start),
            Self::Start => Some(Self::PrepareRound),
            Self::PrepareRound => Some(Self::ProcessRound),
            Self::ProcessRound => Some(Self::ClearRound),
            Self::ClearRound => Some(Self::PrepareRound),
            Self::Ending => Some(Self::Expire),
            Self::Expire => None,
        }
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the chain does after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Run the next step or phase
    Continue,
    /// Stop the chain without error
    Halt,
    /// Finish this phase, then go to the given kind instead of the
    /// pre-wired one
    Branch(PhaseKind),
}

/// One state-machine step of a game.
///
/// Implementations keep round-scoped fields behind short synchronous
/// locks and reset them in `enter`.
#[async_trait::async_trait]
pub trait Phase<G: Send + 'static>: Send + Sync {
    /// Which kind this phase implements.
    fn kind(&self) -> PhaseKind;

    /// Resets round-scoped fields and announces the phase.
    async fn enter(&self, _ctx: &PhaseContext<G>) -> Step {
        Step::Continue
    }

    /// The phase body.
    async fn act(&self, ctx: &PhaseContext<G>) -> Step;

    /// Cleanup after the body.
    async fn exit(&self, _ctx: &PhaseContext<G>) -> Step {
        Step::Continue
    }

    /// Handles a player action while this phase is current.
    async fn on_action(&self, _ctx: &PhaseContext<G>, _action: &InboundAction) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_wiring() {
        let mut kind = PhaseKind::Lobby;
        let mut seen = vec![kind];
        while let Some(next) = kind.default_next() {
            if seen.contains(&next) {
                break;
            }
            seen.push(next);
            kind = next;
        }
        assert_eq!(
            seen,
            vec![
                PhaseKind::Lobby,
                PhaseKind::Start,
                PhaseKind::PrepareRound,
                PhaseKind::ProcessRound,
                PhaseKind::ClearRound,
            ]
        );
        assert_eq!(PhaseKind::Ending.default_next(), Some(PhaseKind::Expire));
        assert_eq!(PhaseKind::Expire.default_next(), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(PhaseKind::PrepareRound.to_string(), "PREPARE_ROUND");
        assert_eq!(PhaseKind::ALL.len(), 7);
    }
}
