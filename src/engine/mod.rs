//! Phase-cycle engine.
//!
//! Bottom-up:
//!
//! - [`countdown`]: cancelable, pausable timed wait
//! - [`tally`]: one-vote-per-voter aggregation and decision policy
//! - [`participant`]: per-player reply-lifetime guard
//! - [`round`]: per-instance scratch state
//! - [`phase`]: the phase trait and state-machine vocabulary
//! - [`core`]: phase graph owner and driver
//! - [`session`]: roster, tables, and the link to the core
//! - [`registry`]: routing of inbound actions to sessions

pub mod action;
pub mod core;
pub mod countdown;
pub mod options;
pub mod participant;
pub mod phase;
pub mod registry;
pub mod round;
pub mod session;
pub mod settings;
pub mod tally;

#[cfg(test)]
pub(crate) mod testing;

pub use action::{ActionKind, ChannelId, GroupId, InboundAction, Origin, UserId};
pub use self::core::{GameCore, GameDriver, GameInfo, PhaseContext};
pub use countdown::{Countdown, Finish};
pub use options::{Choice, GameOption, GameOptions, OptionsStore};
pub use participant::{ParticipantHandle, ReplyPolicy};
pub use phase::{Phase, PhaseKind, Step};
pub use registry::Registry;
pub use round::{Answer, AnswerOrigin, RoundState};
pub use session::GameSession;
pub use settings::EngineSettings;
pub use tally::{Ballot, Decision, VoteMap, VoteTally};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a short synchronous critical section.
///
/// A poisoned lock still yields its data; round state stays usable after a
/// panicking handler.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
