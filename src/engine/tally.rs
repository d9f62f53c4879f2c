//! One-vote-per-voter aggregation.
//!
//! The decision policy is deliberately conservative: only a unique
//! nonzero leader is eliminated. Ties and empty windows yield
//! [`Decision::NoElimination`]; nothing falls back to random or
//! first-come selection.

use indexmap::IndexMap;

use super::action::UserId;

/// One voter's ballot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ballot {
    /// A vote against a participant
    Player(UserId),
    /// An explicit abstention
    Skip,
}

/// Voter → ballot for a single voting window.
#[derive(Debug, Clone, Default)]
pub struct VoteMap {
    ballots: IndexMap<UserId, Ballot>,
}

impl VoteMap {
    /// Creates an empty window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a ballot, replacing any earlier one from the same voter.
    ///
    /// Returns the number of distinct voters so far.
    pub fn cast(&mut self, voter: UserId, ballot: Ballot) -> usize {
        self.ballots.insert(voter, ballot);
        self.ballots.len()
    }

    /// Empties the window.
    pub fn clear(&mut self) {
        self.ballots.clear();
    }

    /// Number of distinct voters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ballots.len()
    }

    /// Returns `true` if nobody has voted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ballots.is_empty()
    }

    /// Ballots cast against `target`.
    #[must_use]
    pub fn count_for(&self, target: &UserId) -> usize {
        self.ballots
            .values()
            .filter(|b| matches!(b, Ballot::Player(t) if t == target))
            .count()
    }

    /// The ballot cast by `voter`, if any.
    #[must_use]
    pub fn ballot_of(&self, voter: &UserId) -> Option<&Ballot> {
        self.ballots.get(voter)
    }

    /// Iterates ballots in casting order.
    pub fn iter(&self) -> impl Iterator<Item = (&UserId, &Ballot)> {
        self.ballots.iter()
    }
}

/// Targets sharing one vote count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyGroup {
    /// Votes each target received
    pub count: usize,
    /// Targets, in candidate order
    pub targets: Vec<UserId>,
}

/// Outcome of a voting window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Exactly one target leads
    Eliminate(UserId),
    /// No votes, or a tie at the top
    NoElimination,
}

/// Count-ranked groups for one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteTally {
    /// Groups sorted by count, descending
    pub groups: Vec<TallyGroup>,
    /// Distinct voters, including abstainers
    pub voters: usize,
}

impl VoteTally {
    /// The highest group with a nonzero count.
    #[must_use]
    pub fn top(&self) -> Option<&TallyGroup> {
        self.groups.first().filter(|g| g.count > 0)
    }

    /// Applies the decision policy.
    #[must_use]
    pub fn decision(&self) -> Decision {
        match self.top() {
            Some(group) if group.targets.len() == 1 => Decision::Eliminate(group.targets[0].clone()),
            _ => Decision::NoElimination,
        }
    }
}

/// Groups `candidates` by the votes they received.
///
/// Ballots for non-candidates are ignored; skips count only as voters.
#[must_use]
pub fn tally<'a>(votes: &VoteMap, candidates: impl IntoIterator<Item = &'a UserId>) -> VoteTally {
    let mut by_count: IndexMap<usize, Vec<UserId>> = IndexMap::new();
    for candidate in candidates {
        by_count
            .entry(votes.count_for(candidate))
            .or_default()
            .push(candidate.clone());
    }
    let mut groups: Vec<TallyGroup> = by_count
        .into_iter()
        .map(|(count, targets)| TallyGroup { count, targets })
        .collect();
    groups.sort_by(|a, b| b.count.cmp(&a.count));

    VoteTally {
        groups,
        voters: votes.len(),
    }
}
