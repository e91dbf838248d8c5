use crate::types::Index;

/// The commit index is only allowed to grow.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("Commit index cannot go backwards: current {current}, attempted {attempted}")]
pub struct InvalidCommitRegression {
    pub current: Index,
    pub attempted: Index,
}

impl InvalidCommitRegression {
    pub fn new(current: Index, attempted: Index) -> Self {
        Self { current, attempted }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("Commit index {attempted} is beyond the last index {last_index}")]
pub struct CommitBeyondLastIndex {
    pub last_index: Index,
    pub attempted: Index,
}

impl CommitBeyondLastIndex {
    pub fn new(last_index: Index, attempted: Index) -> Self {
        Self {
            last_index,
            attempted,
        }
    }
}

/// Committed records are never removed by a truncation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("Cannot remove committed records: commit index {commit_index}, remove from {remove_from}")]
pub struct InvalidTruncationOfCommitted {
    pub commit_index: Index,
    pub remove_from: Index,
}

impl InvalidTruncationOfCommitted {
    pub fn new(commit_index: Index, remove_from: Index) -> Self {
        Self {
            commit_index,
            remove_from,
        }
    }
}

/// A replicated record does not continue the local journal.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("Record index mismatch: expected {expected}, got {actual}")]
pub struct IndexMismatch {
    pub expected: Index,
    pub actual: Index,
}

impl IndexMismatch {
    pub fn new(expected: Index, actual: Index) -> Self {
        Self { expected, actual }
    }
}

/// A record does not fit even in an empty segment.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("Record of {size} bytes exceeds the segment capacity of {capacity} bytes")]
pub struct RecordTooLarge {
    pub size: u64,
    pub capacity: u64,
}

impl RecordTooLarge {
    pub fn new(size: u64, capacity: u64) -> Self {
        Self { size, capacity }
    }
}
