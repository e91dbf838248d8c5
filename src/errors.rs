mod codec_errors;
mod journal_errors;
mod raft_errors;
mod runtime_errors;
mod storage_errors;

use std::io;

pub use codec_errors::CorruptedRecord;
pub use codec_errors::Corruption;
pub use codec_errors::InsufficientCapacity;
pub use journal_errors::CommitBeyondLastIndex;
pub use journal_errors::IndexMismatch;
pub use journal_errors::InvalidCommitRegression;
pub use journal_errors::InvalidTruncationOfCommitted;
pub use journal_errors::RecordTooLarge;
pub use raft_errors::LogInconsistency;
pub use raft_errors::ProposeError;
pub use raft_errors::QuorumUnavailable;
pub use runtime_errors::PartitionError;
pub use runtime_errors::SchedulerError;
pub use storage_errors::InvalidSegmentFileName;
pub use storage_errors::SegmentFull;

/// Error returned by journal operations.
#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum JournalError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Corrupted(#[from] CorruptedRecord),

    #[error(transparent)]
    SegmentFull(#[from] SegmentFull),

    #[error(transparent)]
    RecordTooLarge(#[from] RecordTooLarge),

    #[error(transparent)]
    CommitRegression(#[from] InvalidCommitRegression),

    #[error(transparent)]
    CommitBeyondLastIndex(#[from] CommitBeyondLastIndex),

    #[error(transparent)]
    TruncateCommitted(#[from] InvalidTruncationOfCommitted),

    #[error(transparent)]
    IndexMismatch(#[from] IndexMismatch),

    #[error("journal is closed")]
    Closed,
}

impl From<JournalError> for io::Error {
    fn from(value: JournalError) -> Self {
        match value {
            JournalError::Io(e) => e,
            JournalError::Corrupted(e) => e.into(),
            JournalError::Closed => {
                io::Error::new(io::ErrorKind::BrokenPipe, value)
            }
            other => io::Error::new(io::ErrorKind::InvalidInput, other),
        }
    }
}
