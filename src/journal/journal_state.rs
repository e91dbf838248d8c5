use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;
use std::sync::Weak;

use crate::segment::RecordLocation;
use crate::segment::Segment;
use crate::types::Index;
use crate::Config;

/// Segments and commit index of a journal, shared by the writer and readers.
#[derive(Debug)]
pub(crate) struct JournalState {
    /// Segments keyed by their first index. Never empty; the last one is the
    /// active segment.
    pub(crate) segments: BTreeMap<Index, Segment>,

    pub(crate) commit_index: Index,

    pub(crate) closed: bool,

    /// Number of times records were removed from the end of the journal.
    ///
    /// A reader that read a record without holding the lock discards it if
    /// this changed meanwhile.
    pub(crate) rewinds: u64,

    /// Cursors of open readers, moved back when records at or after them are
    /// removed.
    readers: Vec<Weak<AtomicU64>>,
}

impl JournalState {
    pub(crate) fn new(segments: BTreeMap<Index, Segment>) -> Self {
        let mut st = Self {
            segments,
            commit_index: 0,
            closed: false,
            rewinds: 0,
            readers: vec![],
        };
        st.commit_index = st.first_index() - 1;
        st
    }

    pub(crate) fn first_index(&self) -> Index {
        self.first_segment().first_index()
    }

    pub(crate) fn last_index(&self) -> Index {
        self.last_segment().last_index()
    }

    fn first_segment(&self) -> &Segment {
        match self.segments.first_key_value() {
            Some((_, s)) => s,
            None => unreachable!("journal has at least one segment"),
        }
    }

    pub(crate) fn last_segment(&self) -> &Segment {
        match self.segments.last_key_value() {
            Some((_, s)) => s,
            None => unreachable!("journal has at least one segment"),
        }
    }

    pub(crate) fn last_segment_mut(&mut self) -> &mut Segment {
        match self.segments.last_entry() {
            Some(e) => e.into_mut(),
            None => unreachable!("journal has at least one segment"),
        }
    }

    /// The segment holding `index`, if any.
    pub(crate) fn segment(&self, index: Index) -> Option<&Segment> {
        self.segments
            .range(..=index)
            .next_back()
            .map(|(_, s)| s)
            .filter(|s| index <= s.last_index())
    }

    pub(crate) fn locate(&self, index: Index) -> Option<RecordLocation> {
        self.segment(index).and_then(|s| s.locate(index))
    }

    /// Seal the active segment and start a new one after it.
    pub(crate) fn roll_over(&mut self, config: &Config) -> Result<(), io::Error> {
        let last = self.last_segment();
        let id = last.id().next();
        let first_index = last.next_index();

        let segment = Segment::create(config, id, first_index)?;

        let res = self.last_segment_mut().seal();
        self.segments.insert(first_index, segment);
        res
    }

    /// Remove every record after `index`.
    pub(crate) fn delete_after(&mut self, index: Index) -> Result<(), io::Error> {
        while self.segments.len() > 1 {
            let Some(entry) = self.segments.last_entry() else {
                break;
            };
            if entry.get().first_index() <= index {
                break;
            }
            entry.remove().delete()?;
        }

        self.last_segment_mut().truncate(index + 1)?;
        self.rewind_readers(index + 1);
        Ok(())
    }

    /// The first index that remains after removing the segments entirely
    /// below `boundary`. The active segment is never removed.
    pub(crate) fn compaction_point(&self, boundary: Index) -> Index {
        let n = self.segments.len();
        self.segments
            .values()
            .take(n - 1)
            .find(|s| s.last_index() >= boundary)
            .unwrap_or_else(|| self.last_segment())
            .first_index()
    }

    pub(crate) fn register_reader(&mut self, cursor: &Arc<AtomicU64>) {
        self.readers.retain(|w| w.strong_count() > 0);
        self.readers.push(Arc::downgrade(cursor));
    }

    /// Move reader cursors beyond `index` back to `index`.
    pub(crate) fn rewind_readers(&mut self, index: Index) {
        self.rewinds += 1;
        self.readers.retain(|w| match w.upgrade() {
            Some(cursor) => {
                cursor.fetch_min(index, Ordering::SeqCst);
                true
            }
            None => false,
        });
    }
}

/// Acquire the read lock, ignoring poisoning.
pub(crate) fn read_lock(
    state: &RwLock<JournalState>,
) -> RwLockReadGuard<'_, JournalState> {
    state.read().unwrap_or_else(|e| e.into_inner())
}

pub(crate) fn write_lock(
    state: &RwLock<JournalState>,
) -> RwLockWriteGuard<'_, JournalState> {
    state.write().unwrap_or_else(|e| e.into_inner())
}
