//! The journal: an append-only sequence of records stored in segment files.
//!
//! Records are addressed by a dense index. Only the last segment is written
//! to; when it is full a new one is created. Readers iterate over all
//! records or only over committed ones.

pub(crate) mod dump;
mod journal_reader;
pub(crate) mod journal_state;
pub(crate) mod stat;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::mem;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::RwLockWriteGuard;

use codeq::error_context_ext::ErrorContextExt;
pub use dump::Dump;
pub use journal_reader::JournalReader;
use journal_state::read_lock;
use journal_state::write_lock;
use journal_state::JournalState;
use log::debug;
use log::info;
use log::warn;
pub use stat::JournalStat;
pub use stat::SegmentStat;

use crate::codec::JournalRecord;
use crate::codec::RecordCodec;
use crate::codec::RecordData;
use crate::errors::CommitBeyondLastIndex;
use crate::errors::IndexMismatch;
use crate::errors::InvalidCommitRegression;
use crate::errors::InvalidTruncationOfCommitted;
use crate::errors::JournalError;
use crate::errors::RecordTooLarge;
use crate::file_lock::FileLock;
use crate::segment::PendingRecord;
use crate::segment::Segment;
use crate::segment::SegmentId;
use crate::types::Asqn;
use crate::types::Index;
use crate::Config;

/// A segmented, append-only journal with a commit index.
///
/// There is a single writer, the owner of the `Journal`. Any number of
/// [`JournalReader`]s may read concurrently; they observe appends, commits and
/// truncations made after they are opened.
#[derive(Debug)]
pub struct Journal {
    config: Arc<Config>,

    state: Arc<RwLock<JournalState>>,

    _dir_lock: FileLock,
}

impl Journal {
    /// Open the journal in [`Config::dir`], creating the directory and the
    /// first segment if they do not exist.
    ///
    /// The commit index is not persisted: after open it is `first_index - 1`.
    pub fn open(config: Arc<Config>) -> Result<Self, JournalError> {
        fs::create_dir_all(&config.dir)
            .context(|| format!("create journal dir {}", config.dir))?;

        let dir_lock = FileLock::new(&config)?;

        let segments = Self::load_segments(&config)?;
        let state = JournalState::new(segments);

        info!(
            "Journal opened at {}: {} segments, index range [{}, {}]",
            config.dir,
            state.segments.len(),
            state.first_index(),
            state.last_index()
        );

        Ok(Self {
            config,
            state: Arc::new(RwLock::new(state)),
            _dir_lock: dir_lock,
        })
    }

    fn load_segments(
        config: &Config,
    ) -> Result<BTreeMap<Index, Segment>, io::Error> {
        let ids = Self::load_segment_ids(config)?;
        let n = ids.len();

        let mut segments: BTreeMap<Index, Segment> = BTreeMap::new();
        let mut next_id = SegmentId(1);

        for (i, id) in ids.into_iter().enumerate() {
            let is_last = i + 1 == n;
            next_id = id.next();

            if is_last && Segment::is_blank(config, id)? {
                warn!("Remove {} whose descriptor is never written", id);
                fs::remove_file(config.segment_path(id))
                    .context(|| format!("remove blank {}", id))?;
                continue;
            }

            let segment = Segment::open(config, id)?;

            if let Some((_, prev)) = segments.last_key_value() {
                let prev_id = prev.id();
                let expected = prev.next_index();
                let got = segment.first_index();

                if got == expected {
                    if let Some(mut e) = segments.last_entry() {
                        e.get_mut().seal()?;
                    }
                } else if is_last && segment.is_empty() {
                    // An empty last segment that does not continue the others
                    // is left by a reset that did not finish removing the old
                    // segments. It may start after them or inside them.
                    warn!(
                        "{} starts at {}, previous segments end at {}; remove them",
                        id,
                        got,
                        expected - 1
                    );
                    for (_, s) in mem::take(&mut segments) {
                        s.delete()?;
                    }
                } else {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "Journal segments are not contiguous: {} ends at {}, {} starts at {}",
                            prev_id,
                            expected - 1,
                            id,
                            got
                        ),
                    ));
                }
            }

            segments.insert(segment.first_index(), segment);
        }

        if segments.is_empty() {
            let segment = Segment::create(config, next_id, 1)?;
            segments.insert(segment.first_index(), segment);
        }

        Ok(segments)
    }

    /// List the segment ids in the journal directory, sorted.
    pub fn load_segment_ids(config: &Config) -> Result<Vec<SegmentId>, io::Error> {
        let entries = fs::read_dir(&config.dir)
            .context(|| format!("read journal dir {}", config.dir))?;

        let mut ids = vec![];
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();

            let fn_str = file_name.to_string_lossy();
            if fn_str == FileLock::LOCK_FILE_NAME || !fn_str.ends_with(".log") {
                continue;
            }

            match Config::parse_segment_file_name(&fn_str) {
                Ok(id) => ids.push(id),
                Err(err) => {
                    warn!("Ignore invalid segment file name: '{}': {}", fn_str, err);
                }
            }
        }

        ids.sort();

        Ok(ids)
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    /// Append a record with the next index and return the index.
    pub fn append(&mut self, asqn: Asqn, data: &[u8]) -> Result<Index, JournalError> {
        self.check_fits(&RecordData::new(0, asqn, data))?;
        self.append_with(|s| s.prepare_append(asqn, data))
    }

    /// Append a record replicated from another journal.
    ///
    /// The record must continue this journal and its checksum must match its
    /// content.
    pub fn append_record(
        &mut self,
        record: &JournalRecord,
    ) -> Result<Index, JournalError> {
        self.check_fits(&record.as_data())?;

        let expected = self.last_index() + 1;
        if record.index != expected {
            return Err(IndexMismatch::new(expected, record.index).into());
        }

        self.append_with(|s| s.prepare_record(record))
    }

    /// Append the record built by `prepare` to the active segment, rolling
    /// over to a new segment once if it is full.
    ///
    /// The record is written to disk without holding the state lock, so
    /// readers are not blocked by the write. It becomes visible only after
    /// the write completes.
    fn append_with<F>(&mut self, prepare: F) -> Result<Index, JournalError>
    where F: Fn(&Segment) -> Result<PendingRecord, JournalError> {
        let pending = match self.prepare_with(&prepare) {
            Err(JournalError::SegmentFull(full)) => {
                debug!("{}; roll over to a new segment", full);
                self.write_state()?.roll_over(&self.config)?;
                self.prepare_with(&prepare)?
            }
            res => res?,
        };

        pending.write()?;

        let mut st = self.write_state()?;
        Ok(st.last_segment_mut().publish(pending))
    }

    fn prepare_with<F>(&self, prepare: &F) -> Result<PendingRecord, JournalError>
    where F: Fn(&Segment) -> Result<PendingRecord, JournalError> {
        let st = read_lock(&self.state);
        if st.closed {
            return Err(JournalError::Closed);
        }
        prepare(st.last_segment())
    }

    fn check_fits(&self, record: &RecordData<'_>) -> Result<(), JournalError> {
        let size = RecordCodec::record_length(record) as u64;
        let capacity = Segment::capacity(self.config.segment_max_size());
        if size > capacity {
            return Err(RecordTooLarge::new(size, capacity).into());
        }
        Ok(())
    }

    /// Mark every record up to `index` as committed.
    pub fn set_commit_index(&mut self, index: Index) -> Result<(), JournalError> {
        let mut st = self.write_state()?;

        if index < st.commit_index {
            return Err(InvalidCommitRegression::new(st.commit_index, index).into());
        }

        let last = st.last_index();
        if index > last {
            return Err(CommitBeyondLastIndex::new(last, index).into());
        }

        st.commit_index = index;
        Ok(())
    }

    /// Remove every record after `index`.
    ///
    /// Committed records can not be removed.
    pub fn delete_after(&mut self, index: Index) -> Result<(), JournalError> {
        let mut st = self.write_state()?;

        if index < st.commit_index {
            return Err(InvalidTruncationOfCommitted::new(
                st.commit_index,
                index + 1,
            )
            .into());
        }

        if index >= st.last_index() {
            return Ok(());
        }

        info!(
            "Journal delete records after {}, last index was {}",
            index,
            st.last_index()
        );
        st.delete_after(index)?;
        Ok(())
    }

    /// Remove every record at and after `index`.
    pub fn truncate(&mut self, index: Index) -> Result<(), JournalError> {
        if index == 0 {
            return Err(InvalidTruncationOfCommitted::new(
                self.commit_index(),
                index,
            )
            .into());
        }
        self.delete_after(index - 1)
    }

    /// Returns the first index that would remain after
    /// [`compact`](Self::compact) with the same argument.
    pub fn compaction_point(&self, min_retained_index: Index) -> Index {
        let st = read_lock(&self.state);
        let boundary = min_retained_index.min(st.commit_index + 1);
        st.compaction_point(boundary)
    }

    /// Remove the segments whose records are all below `min_retained_index`
    /// and committed. The active segment is never removed.
    ///
    /// Returns the first index after compaction.
    pub fn compact(&mut self, min_retained_index: Index) -> Result<Index, JournalError> {
        let mut st = self.write_state()?;
        let boundary = min_retained_index.min(st.commit_index + 1);

        let mut removed = 0;
        while st.segments.len() > 1 {
            let Some(entry) = st.segments.first_entry() else {
                break;
            };
            if entry.get().last_index() >= boundary {
                break;
            }
            entry.remove().delete()?;
            removed += 1;
        }

        let first = st.first_index();
        if removed > 0 {
            info!(
                "Journal compacted below {}: removed {} segments, first index is {}",
                boundary, removed, first
            );
        }
        Ok(first)
    }

    /// Remove every record and restart the journal at `next_index`.
    ///
    /// Everything before `next_index` is considered committed.
    pub fn reset(&mut self, next_index: Index) -> Result<(), JournalError> {
        if next_index == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "journal can not be reset to index 0",
            )
            .into());
        }

        let mut st = self.write_state()?;

        let id = st.last_segment().id().next();
        let segment = Segment::create(&self.config, id, next_index)?;

        let old =
            mem::replace(&mut st.segments, BTreeMap::from([(next_index, segment)]));
        st.commit_index = next_index - 1;
        st.rewind_readers(next_index);

        info!("Journal reset to start at {}", next_index);

        for (_, s) in old {
            s.delete()?;
        }
        Ok(())
    }

    /// Read the record at `index`; `None` if it is compacted or not written.
    pub fn read(&self, index: Index) -> Result<Option<JournalRecord>, JournalError> {
        let location = read_lock(&self.state).locate(index);
        location.map(|loc| loc.read()).transpose()
    }

    /// Read up to `max` consecutive records starting at `from`.
    pub fn read_range(
        &self,
        from: Index,
        max: usize,
    ) -> Result<Vec<JournalRecord>, JournalError> {
        let st = read_lock(&self.state);

        let mut records = Vec::new();
        let mut next = from;

        while records.len() < max {
            let Some(segment) = st.segment(next) else {
                break;
            };

            let mut reader = segment.open_reader();
            reader.seek(next);
            for res in reader.take(max - records.len()) {
                records.push(res?);
            }
            next = segment.next_index();
        }

        Ok(records)
    }

    /// The first index in the journal. The journal is empty if it is greater
    /// than [`last_index`](Self::last_index).
    pub fn first_index(&self) -> Index {
        read_lock(&self.state).first_index()
    }

    pub fn last_index(&self) -> Index {
        read_lock(&self.state).last_index()
    }

    pub fn commit_index(&self) -> Index {
        read_lock(&self.state).commit_index
    }

    pub fn is_empty(&self) -> bool {
        let st = read_lock(&self.state);
        st.last_index() < st.first_index()
    }

    /// Make every appended record durable.
    pub fn flush(&mut self) -> Result<(), JournalError> {
        let st = self.write_state()?;
        st.last_segment().flush()?;
        Ok(())
    }

    /// Flush and close the journal. Readers see no more records and further
    /// writes fail.
    ///
    /// Closing a closed journal does nothing.
    pub fn close(&mut self) -> Result<(), JournalError> {
        let mut st = write_lock(&self.state);
        if st.closed {
            return Ok(());
        }
        st.last_segment().flush()?;
        st.closed = true;
        info!("Journal closed at {}", self.config.dir);
        Ok(())
    }

    /// Open a reader over all records, including uncommitted ones.
    pub fn open_reader(&self) -> JournalReader {
        JournalReader::new(self.state.clone(), false)
    }

    /// Open a reader that never returns a record beyond the commit index.
    pub fn open_committed_reader(&self) -> JournalReader {
        JournalReader::new(self.state.clone(), true)
    }

    pub fn stat(&self) -> JournalStat {
        let st = read_lock(&self.state);
        JournalStat {
            first_index: st.first_index(),
            last_index: st.last_index(),
            commit_index: st.commit_index,
            segments: st.segments.values().map(|s| s.stat()).collect(),
        }
    }

    pub fn dump(&self) -> Dump {
        Dump::new(self.config.clone())
    }

    fn write_state(
        &self,
    ) -> Result<RwLockWriteGuard<'_, JournalState>, JournalError> {
        let st = write_lock(&self.state);
        if st.closed {
            return Err(JournalError::Closed);
        }
        Ok(st)
    }
}
