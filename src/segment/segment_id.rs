use std::fmt;
use std::ops::Deref;

use crate::num::format_pad_u64;

/// Monotonic id of a segment; it names the segment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(pub u64);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SegmentId({})", format_pad_u64(self.0))
    }
}

impl From<u64> for SegmentId {
    fn from(id: u64) -> Self {
        SegmentId(id)
    }
}

impl Deref for SegmentId {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl SegmentId {
    pub fn next(&self) -> SegmentId {
        SegmentId(self.0 + 1)
    }
}
