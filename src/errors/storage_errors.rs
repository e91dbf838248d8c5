use crate::types::Index;

#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("Invalid journal segment file name: {bad_file_name}: {reason}")]
pub struct InvalidSegmentFileName {
    pub bad_file_name: String,
    pub reason: String,
}

impl InvalidSegmentFileName {
    pub fn new(bad_file_name: impl ToString, reason: impl ToString) -> Self {
        Self {
            bad_file_name: bad_file_name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A record does not fit in the remaining space of a segment.
///
/// The journal handles it by rolling over to a new segment.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("Segment is full at index {index}: requires {required} bytes, {remaining} remaining")]
pub struct SegmentFull {
    pub index: Index,
    pub required: u64,
    pub remaining: u64,
}

impl SegmentFull {
    pub fn new(index: Index, required: u64, remaining: u64) -> Self {
        Self {
            index,
            required,
            remaining,
        }
    }
}
