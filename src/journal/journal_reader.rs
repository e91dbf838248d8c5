use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::RwLock;

use crate::codec::JournalRecord;
use crate::errors::JournalError;
use crate::journal::journal_state::read_lock;
use crate::journal::journal_state::write_lock;
use crate::journal::journal_state::JournalState;
use crate::types::Asqn;
use crate::types::Index;

/// A cursor over the records of a [`Journal`](crate::Journal).
///
/// The visible range is `[first_index, last_index]`, or
/// `[first_index, commit_index]` for a committed reader. It is read again on
/// every call, so a reader observes appends, commits, compactions and
/// truncations made after it was opened:
///
/// - A cursor below the first index, after compaction, resumes at the first
///   index.
/// - A cursor beyond a truncation point is moved back to it.
#[derive(Debug)]
pub struct JournalReader {
    state: Arc<RwLock<JournalState>>,

    /// The index of the next record to return.
    cursor: Arc<AtomicU64>,

    committed_only: bool,
}

impl JournalReader {
    pub(crate) fn new(
        state: Arc<RwLock<JournalState>>,
        committed_only: bool,
    ) -> Self {
        let cursor = {
            let mut st = write_lock(&state);
            let cursor = Arc::new(AtomicU64::new(st.first_index()));
            st.register_reader(&cursor);
            cursor
        };

        Self {
            state,
            cursor,
            committed_only,
        }
    }

    pub fn is_committed_only(&self) -> bool {
        self.committed_only
    }

    /// The index of the record the next call to `next()` returns.
    pub fn next_index(&self) -> Index {
        let st = read_lock(&self.state);
        self.cursor_at(&st)
    }

    pub fn has_next(&self) -> bool {
        let st = read_lock(&self.state);
        !st.closed && self.cursor_at(&st) <= self.last_visible(&st)
    }

    /// Position the cursor at `index`, clamped to the visible range plus one.
    ///
    /// Returns the new position.
    pub fn seek(&mut self, index: Index) -> Index {
        let st = read_lock(&self.state);
        let pos = index.clamp(st.first_index(), self.last_visible(&st) + 1);
        self.cursor.store(pos, Ordering::SeqCst);
        pos
    }

    pub fn seek_to_first(&mut self) -> Index {
        self.seek(0)
    }

    /// Position the cursor at the last visible record and return its index.
    ///
    /// If nothing is visible, the cursor is at the first index and
    /// `first_index - 1` is returned.
    pub fn seek_to_last(&mut self) -> Index {
        let st = read_lock(&self.state);
        let first = st.first_index();
        let last = self.last_visible(&st);
        self.cursor.store(last.max(first), Ordering::SeqCst);
        last
    }

    /// Position the cursor at the first visible record whose asqn is at least
    /// `asqn`, and return its index.
    ///
    /// If there is no such record, the cursor is placed after the last
    /// visible record and that position is returned.
    pub fn seek_to_asqn(&mut self, asqn: Asqn) -> Index {
        let st = read_lock(&self.state);
        let last = self.last_visible(&st);

        let pos = st
            .segments
            .values()
            .take_while(|s| s.first_index() <= last)
            .find_map(|s| s.seek_asqn(asqn, last))
            .unwrap_or(last + 1);

        self.cursor.store(pos, Ordering::SeqCst);
        pos
    }

    fn cursor_at(&self, st: &JournalState) -> Index {
        self.cursor.load(Ordering::SeqCst).max(st.first_index())
    }

    fn last_visible(&self, st: &JournalState) -> Index {
        let last = st.last_index();
        if self.committed_only {
            last.min(st.commit_index)
        } else {
            last
        }
    }
}

impl Iterator for JournalReader {
    type Item = Result<JournalRecord, JournalError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (index, location, rewinds) = {
                let st = read_lock(&self.state);
                if st.closed {
                    return None;
                }

                let index = self.cursor_at(&st);
                if index > self.last_visible(&st) {
                    return None;
                }

                (index, st.locate(index)?, st.rewinds)
            };

            // Read without the lock so that appends and other readers are not
            // blocked by the disk read.
            let res = location.read();

            let st = read_lock(&self.state);
            if st.rewinds != rewinds {
                // The record may have been removed or replaced while it was
                // read.
                continue;
            }

            if res.is_ok() {
                self.cursor.store(index + 1, Ordering::SeqCst);
            }
            return Some(res);
        }
    }
}
