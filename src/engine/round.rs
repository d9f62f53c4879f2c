//! Per-instance round scratch state.
//!
//! The engine only needs the living roster, the answer map and the vote
//! map; everything game-specific lives in the typed `game` field.

use std::sync::Arc;

use indexmap::IndexMap;

use super::action::UserId;
use super::participant::ParticipantHandle;
use super::tally::{self, Ballot, VoteMap, VoteTally};

/// Whether an answer came from the participant or was filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOrigin {
    /// Submitted before the deadline
    Chosen,
    /// Picked at random for a non-responder
    Backfilled,
}

/// One participant's answer for the current round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    /// Selected value
    pub value: String,
    /// Where it came from
    pub origin: AnswerOrigin,
}

/// Mutable state of one game instance.
#[derive(Debug)]
pub struct RoundState<G> {
    living: Vec<Arc<ParticipantHandle>>,
    answers: IndexMap<UserId, Answer>,
    votes: VoteMap,
    /// Game-specific state
    pub game: G,
}

impl<G: Default> Default for RoundState<G> {
    fn default() -> Self {
        Self::new(G::default())
    }
}

impl<G> RoundState<G> {
    /// Creates empty state around `game`.
    #[must_use]
    pub fn new(game: G) -> Self {
        Self {
            living: Vec::new(),
            answers: IndexMap::new(),
            votes: VoteMap::new(),
            game,
        }
    }

    /// Participants still in play, in join order.
    #[must_use]
    pub fn living(&self) -> &[Arc<ParticipantHandle>] {
        &self.living
    }

    /// Ids of the living participants.
    #[must_use]
    pub fn living_ids(&self) -> Vec<UserId> {
        self.living.iter().map(|p| p.id().clone()).collect()
    }

    /// Number of living participants.
    #[must_use]
    pub fn living_count(&self) -> usize {
        self.living.len()
    }

    /// Returns `true` if `id` is still in play.
    #[must_use]
    pub fn is_living(&self, id: &UserId) -> bool {
        self.living.iter().any(|p| p.id() == id)
    }

    /// Looks up a living participant.
    #[must_use]
    pub fn find_living(&self, id: &UserId) -> Option<Arc<ParticipantHandle>> {
        self.living.iter().find(|p| p.id() == id).cloned()
    }

    /// Replaces the living roster.
    pub fn set_living(&mut self, living: Vec<Arc<ParticipantHandle>>) {
        self.living = living;
    }

    /// Removes a participant from play and expires their handle.
    pub fn remove_living(&mut self, id: &UserId) -> Option<Arc<ParticipantHandle>> {
        let index = self.living.iter().position(|p| p.id() == id)?;
        let removed = self.living.remove(index);
        removed.expire();
        self.answers.shift_remove(id);
        Some(removed)
    }

    /// Records an answer from a living participant.
    ///
    /// Returns the number of answers so far, or `None` if the participant
    /// is not in play.
    pub fn record_answer(&mut self, id: &UserId, value: impl Into<String>) -> Option<usize> {
        if !self.is_living(id) {
            return None;
        }
        self.answers.insert(
            id.clone(),
            Answer {
                value: value.into(),
                origin: AnswerOrigin::Chosen,
            },
        );
        Some(self.answers.len())
    }

    /// Fills in answers for living participants who gave none.
    ///
    /// `pick` chooses the value for each non-responder. Returns who was
    /// backfilled and with what.
    pub fn backfill(&mut self, mut pick: impl FnMut(&UserId) -> String) -> Vec<(UserId, String)> {
        let missing: Vec<UserId> = self
            .living
            .iter()
            .map(|p| p.id().clone())
            .filter(|id| !self.answers.contains_key(id))
            .collect();
        missing
            .into_iter()
            .map(|id| {
                let value = pick(&id);
                self.answers.insert(
                    id.clone(),
                    Answer {
                        value: value.clone(),
                        origin: AnswerOrigin::Backfilled,
                    },
                );
                (id, value)
            })
            .collect()
    }

    /// Answers of the current round, in submission order.
    #[must_use]
    pub const fn answers(&self) -> &IndexMap<UserId, Answer> {
        &self.answers
    }

    /// Casts a ballot from a living voter.
    ///
    /// Returns the number of distinct voters so far, or `None` if the
    /// voter or target is not in play.
    pub fn cast_vote(&mut self, voter: &UserId, ballot: Ballot) -> Option<usize> {
        if !self.is_living(voter) {
            return None;
        }
        if let Ballot::Player(target) = &ballot {
            if !self.is_living(target) {
                return None;
            }
        }
        Some(self.votes.cast(voter.clone(), ballot))
    }

    /// Votes of the current window.
    #[must_use]
    pub const fn votes(&self) -> &VoteMap {
        &self.votes
    }

    /// Empties the vote window.
    pub fn clear_votes(&mut self) {
        self.votes.clear();
    }

    /// Clears answers and votes for a new round.
    pub fn clear_round(&mut self) {
        self.answers.clear();
        self.votes.clear();
    }

    /// Tallies the current window over the living roster.
    #[must_use]
    pub fn tally(&self) -> VoteTally {
        tally::tally(&self.votes, self.living.iter().map(|p| p.id()))
    }
}
