use crate::codec::JournalRecord;
use crate::errors::JournalError;
use crate::segment::Segment;
use crate::types::Index;

/// Iterates over the records of one segment.
///
/// A committed reader stops at the index returned by its commit supplier,
/// which is asked again on every call.
pub struct SegmentReader<'a, F = fn() -> Index> {
    segment: &'a Segment,
    next_index: Index,
    commit_index: Option<F>,
}

impl<'a, F> SegmentReader<'a, F>
where F: Fn() -> Index
{
    pub(crate) fn new(segment: &'a Segment, commit_index: Option<F>) -> Self {
        Self {
            segment,
            next_index: segment.first_index(),
            commit_index,
        }
    }

    /// Move the cursor so that the next record returned is `index`, clamped
    /// to the records of this segment.
    pub fn seek(&mut self, index: Index) -> Index {
        let first = self.segment.first_index();
        let next = self.segment.next_index();
        self.next_index = index.clamp(first, next);
        self.next_index
    }

    pub fn next_index(&self) -> Index {
        self.next_index
    }

    fn last_visible(&self) -> Index {
        let last = self.segment.last_index();
        match &self.commit_index {
            Some(f) => last.min(f()),
            None => last,
        }
    }
}

impl<F> Iterator for SegmentReader<'_, F>
where F: Fn() -> Index
{
    type Item = Result<JournalRecord, JournalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index > self.last_visible() {
            return None;
        }

        match self.segment.read(self.next_index) {
            Ok(Some(record)) => {
                self.next_index += 1;
                Some(Ok(record))
            }
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
