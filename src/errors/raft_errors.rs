use std::fmt;

use crate::types::Index;
use crate::types::NodeId;
use crate::types::Term;

/// A follower's journal does not contain the entry preceding an append request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("Log inconsistency at prev_index {prev_index}: leader term {prev_term}, local term {}, local last index {last_index}", DisplayTerm(.local_term))]
pub struct LogInconsistency {
    pub prev_index: Index,
    pub prev_term: Term,
    /// Term of the local entry at `prev_index`, `None` if there is none.
    pub local_term: Option<Term>,
    pub last_index: Index,
}

impl LogInconsistency {
    pub fn new(
        prev_index: Index,
        prev_term: Term,
        local_term: Option<Term>,
        last_index: Index,
    ) -> Self {
        Self {
            prev_index,
            prev_term,
            local_term,
            last_index,
        }
    }
}

struct DisplayTerm<'a>(&'a Option<Term>);

impl fmt::Display for DisplayTerm<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(t) => write!(f, "{}", t),
            None => write!(f, "none"),
        }
    }
}

/// A proposal was not acknowledged by a quorum within the request timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("Quorum unavailable: entry {index} of term {term} not committed in time")]
pub struct QuorumUnavailable {
    pub index: Index,
    pub term: Term,
}

impl QuorumUnavailable {
    pub fn new(index: Index, term: Term) -> Self {
        Self { index, term }
    }
}

/// Why a proposal did not commit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
pub enum ProposeError {
    #[error("Not leader; current leader: {leader:?}")]
    NotLeader { leader: Option<NodeId> },

    #[error(transparent)]
    QuorumUnavailable(#[from] QuorumUnavailable),

    #[error("Raft node is stopped")]
    Stopped,

    #[error("Journal failure: {0}")]
    Journal(String),
}

impl ProposeError {
    pub fn not_leader(leader: Option<NodeId>) -> Self {
        ProposeError::NotLeader { leader }
    }

    pub fn journal(e: impl fmt::Display) -> Self {
        ProposeError::Journal(e.to_string())
    }
}
