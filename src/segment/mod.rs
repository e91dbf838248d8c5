//! A segment is one file of the journal holding a contiguous run of records.
//!
//! ```text
//! | descriptor (29 bytes) | record | record | ... | unwritten space |
//! ```
//!
//! Only the last segment of a journal is written to. A segment keeps the file
//! offset and the asqn of every record in memory, so random reads and asqn
//! seeks do not scan the file.

mod descriptor;
mod record_iterator;
mod segment_id;
mod segment_reader;

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::BufReader;
use std::io::Seek;
use std::sync::Arc;

use codeq::error_context_ext::ErrorContextExt;
use codeq::Decode;
use codeq::Encode;
pub use descriptor::SegmentDescriptor;
use log::debug;
use log::error;
use log::info;
use log::warn;
use record_iterator::RecordIterator;
pub use segment_id::SegmentId;
pub use segment_reader::SegmentReader;

use crate::codec::JournalRecord;
use crate::codec::RecordCodec;
use crate::codec::RecordData;
use crate::errors::CorruptedRecord;
use crate::errors::Corruption;
use crate::errors::IndexMismatch;
use crate::errors::JournalError;
use crate::errors::SegmentFull;
use crate::file_io;
use crate::journal::SegmentStat;
use crate::types::Asqn;
use crate::types::Index;
use crate::types::ASQN_IGNORE;
use crate::Config;

/// Result of dumping a segment file: its descriptor and every record in it.
pub(crate) type SegmentDump =
    (SegmentDescriptor, Vec<Result<(u64, u64, JournalRecord), io::Error>>);

#[derive(Debug)]
pub struct Segment {
    descriptor: SegmentDescriptor,

    path: String,

    f: Arc<File>,

    /// The file offset of each record.
    ///
    /// Contains N+1 offsets where N is the number of records: the last one is
    /// the end of the last record, where the next record will be written.
    offsets: Vec<u64>,

    /// The asqn of each record.
    asqns: Vec<Asqn>,

    sealed: bool,

    preallocated: bool,

    /// Records the original file size if the segment was truncated when
    /// opened.
    ///
    /// This field is primarily used for testing and debugging purposes.
    #[allow(dead_code)]
    pub(crate) truncated: Option<u64>,
}

/// A serialized record for the end of a segment, not yet visible to readers.
///
/// It is written to the file with [`PendingRecord::write`], which needs no
/// access to the segment, and becomes visible with [`Segment::publish`].
#[derive(Debug)]
pub(crate) struct PendingRecord {
    segment_id: SegmentId,
    f: Arc<File>,
    index: Index,
    asqn: Asqn,
    offset: u64,
    bytes: Vec<u8>,
}

impl PendingRecord {
    pub(crate) fn write(&self) -> Result<(), io::Error> {
        file_io::write_all_at(&self.f, &self.bytes, self.offset).context(|| {
            format!("append index {} to {}", self.index, self.segment_id)
        })
    }
}

/// Position of a written record in its segment file.
///
/// Reading through it needs no access to the segment, so it can be done
/// without holding the journal lock.
#[derive(Debug, Clone)]
pub(crate) struct RecordLocation {
    segment_id: SegmentId,
    f: Arc<File>,
    index: Index,
    start: u64,
    end: u64,
}

impl RecordLocation {
    pub(crate) fn read(&self) -> Result<JournalRecord, JournalError> {
        let mut buf = vec![0u8; (self.end - self.start) as usize];
        file_io::read_exact_at(&self.f, &mut buf, self.start).context(|| {
            format!("read index {} from {}", self.index, self.segment_id)
        })?;

        let (metadata, data) =
            RecordCodec::read_record(&buf, 0).map_err(|e| e.rebase(self.start))?;

        Ok(JournalRecord::from_data(&data, metadata.checksum))
    }
}

impl Segment {
    /// Create a new empty segment file whose first record will be
    /// `first_index`.
    pub(crate) fn create(
        config: &Config,
        id: SegmentId,
        first_index: Index,
    ) -> Result<Self, io::Error> {
        let path = config.segment_path(id);
        let f = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .context(|| format!("create {}", id))?;

        let descriptor =
            SegmentDescriptor::new(id, first_index, config.segment_max_size());

        let mut buf = Vec::with_capacity(SegmentDescriptor::ENCODED_SIZE);
        descriptor.encode(&mut buf)?;
        file_io::write_all_at(&f, &buf, 0)
            .context(|| format!("write descriptor of {}", id))?;

        let preallocated = config.preallocate_segment_files();
        if preallocated {
            f.set_len(descriptor.max_segment_size as u64)
                .context(|| format!("preallocate {}", id))?;
        }

        f.sync_all().context(|| format!("sync {}", id))?;

        info!("Created {} starting at index {}", id, first_index);

        Ok(Self {
            descriptor,
            path,
            f: Arc::new(f),
            offsets: vec![SegmentDescriptor::ENCODED_SIZE as u64],
            asqns: vec![],
            sealed: false,
            preallocated,
            truncated: None,
        })
    }

    /// Open an existing segment file and load the position of its records.
    ///
    /// Loading stops at the first record that can not be read back. What
    /// follows it is an unfinished write or damaged bytes; it is truncated if
    /// [`Config::truncate_incomplete_record`] is set, otherwise an error is
    /// returned.
    pub(crate) fn open(config: &Config, id: SegmentId) -> Result<Self, io::Error> {
        let f = Self::open_file(config, id)?;
        let file_size = f.metadata()?.len();
        let descriptor = Self::read_descriptor(&f, id)?;

        if descriptor.id != id {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} has a descriptor of {}", id, descriptor.id),
            ));
        }

        let mut offsets = vec![SegmentDescriptor::ENCODED_SIZE as u64];
        let mut asqns = vec![];
        let mut damage = None;

        // Seek on a newly opened file does not affect other file descriptors.
        let mut r = &f;
        r.seek(io::SeekFrom::Start(SegmentDescriptor::ENCODED_SIZE as u64))?;

        let it = RecordIterator::new(
            BufReader::with_capacity(config.read_buffer_size(), r),
            SegmentDescriptor::ENCODED_SIZE as u64,
            file_size,
            descriptor.first_index,
        );

        for res in it {
            match res {
                Ok((offset, size, record)) => {
                    offsets.push(offset + size);
                    asqns.push(record.asqn);
                }
                Err(io_err) => {
                    damage = Some(io_err);
                    break;
                }
            }
        }

        let end = offsets[offsets.len() - 1];
        let preallocated = config.preallocate_segment_files();
        let mut truncated = None;

        if end < file_size {
            // Trailing zeros are expected in a preallocated file. Otherwise
            // they are an unfinished write: with EXT4 `data=writeback`, data
            // and file length may reach the disk in arbitrary order.
            let all_zero = Self::verify_trailing_zeros(&f, end, id)?;

            if all_zero && preallocated {
                debug!("{} has {} bytes of free space", id, file_size - end);
            } else {
                let io_err = match damage {
                    Some(e) => e,
                    None => io::Error::from(CorruptedRecord::new(
                        end,
                        Corruption::Unwritten,
                    )),
                };

                if all_zero {
                    warn!(
                        "Trailing zeros detected at {} in {}; Treat it as unfinished write",
                        end, id
                    );
                } else if io_err.kind() == io::ErrorKind::UnexpectedEof {
                    warn!("Incomplete record at {} in {}: {}", end, id, io_err);
                } else {
                    error!("Found damaged bytes at {} in {}: {}", end, id, io_err);
                }

                if !config.truncate_incomplete_record() {
                    return Err(io_err);
                }

                f.set_len(end).context(|| format!("truncate {}", id))?;
                if preallocated {
                    f.set_len(descriptor.max_segment_size as u64)?;
                }
                f.sync_all()?;

                warn!(
                    "Truncated {} from {} to {} bytes; {} records remain",
                    id,
                    file_size,
                    end,
                    asqns.len()
                );
                truncated = Some(file_size);
            }
        }

        Ok(Self {
            descriptor,
            path: config.segment_path(id),
            f: Arc::new(f),
            offsets,
            asqns,
            sealed: false,
            preallocated,
            truncated,
        })
    }

    pub(crate) fn open_file(
        config: &Config,
        id: SegmentId,
    ) -> Result<File, io::Error> {
        let path = config.segment_path(id);
        let f = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .context(|| format!("open {}", id))?;

        Ok(f)
    }

    fn read_descriptor(
        f: &File,
        id: SegmentId,
    ) -> Result<SegmentDescriptor, io::Error> {
        let mut buf = [0u8; SegmentDescriptor::ENCODED_SIZE];
        file_io::read_exact_at(f, &mut buf, 0)
            .context(|| format!("read descriptor of {}", id))?;
        SegmentDescriptor::decode(&mut &buf[..])
            .context(|| format!("decode descriptor of {}", id))
    }

    /// Returns true if the segment file has no complete descriptor and nothing
    /// but zeros: the process stopped right after creating it.
    pub(crate) fn is_blank(
        config: &Config,
        id: SegmentId,
    ) -> Result<bool, io::Error> {
        let f = Self::open_file(config, id)?;
        let file_size = f.metadata()?.len();
        if file_size < SegmentDescriptor::ENCODED_SIZE as u64 {
            return Ok(true);
        }
        Self::verify_trailing_zeros(&f, 0, id)
    }

    /// Checks if a file contains only zero bytes from `start` to the end.
    fn verify_trailing_zeros(
        f: &File,
        mut start: u64,
        id: SegmentId,
    ) -> Result<bool, io::Error> {
        let file_size = f.metadata()?.len();

        const WARN_THRESHOLD: u64 = 64 * 1024;
        if file_size.saturating_sub(start) > WARN_THRESHOLD {
            debug!(
                "Checking {} bytes for trailing zeros in {}",
                file_size - start,
                id
            );
        }

        let mut buf = vec![0u8; 64 * 1024];
        while start < file_size {
            let n = buf.len().min((file_size - start) as usize);
            file_io::read_exact_at(f, &mut buf[..n], start)?;

            if let Some(i) = buf[..n].iter().position(|b| *b != 0) {
                error!(
                    "Non-zero byte detected at offset {} in {}",
                    start + i as u64,
                    id
                );
                return Ok(false);
            }

            start += n as u64;
        }
        Ok(true)
    }

    pub fn id(&self) -> SegmentId {
        self.descriptor.id
    }

    pub fn descriptor(&self) -> &SegmentDescriptor {
        &self.descriptor
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn first_index(&self) -> Index {
        self.descriptor.first_index
    }

    /// The last index in this segment, `first_index - 1` if it is empty.
    pub fn last_index(&self) -> Index {
        self.next_index() - 1
    }

    /// The index the next appended record will get.
    pub fn next_index(&self) -> Index {
        self.descriptor.first_index + self.records_count() as u64
    }

    pub fn records_count(&self) -> usize {
        self.asqns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asqns.is_empty()
    }

    /// Bytes used in this file, including the descriptor.
    pub fn size(&self) -> u64 {
        self.offsets[self.offsets.len() - 1]
    }

    /// Bytes still available for records.
    pub fn remaining(&self) -> u64 {
        (self.descriptor.max_segment_size as u64).saturating_sub(self.size())
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Largest record that fits in an empty segment of `max_segment_size`.
    pub(crate) fn capacity(max_segment_size: u32) -> u64 {
        (max_segment_size as u64)
            .saturating_sub(SegmentDescriptor::ENCODED_SIZE as u64)
    }

    /// Append a record built from `asqn` and `data` at [`Self::next_index`].
    ///
    /// Returns [`JournalError::SegmentFull`] and writes nothing if the record
    /// does not fit in the remaining space.
    pub(crate) fn append(
        &mut self,
        asqn: Asqn,
        data: &[u8],
    ) -> Result<Index, JournalError> {
        let pending = self.prepare_append(asqn, data)?;
        pending.write()?;
        Ok(self.publish(pending))
    }

    /// Append a record received from another journal, keeping its checksum.
    pub(crate) fn append_record(
        &mut self,
        record: &JournalRecord,
    ) -> Result<Index, JournalError> {
        let pending = self.prepare_record(record)?;
        pending.write()?;
        Ok(self.publish(pending))
    }

    pub(crate) fn prepare_append(
        &self,
        asqn: Asqn,
        data: &[u8],
    ) -> Result<PendingRecord, JournalError> {
        let record = RecordData::new(self.next_index(), asqn, data);
        self.prepare(&record, None)
    }

    pub(crate) fn prepare_record(
        &self,
        record: &JournalRecord,
    ) -> Result<PendingRecord, JournalError> {
        let expected = self.next_index();
        if record.index != expected {
            return Err(IndexMismatch::new(expected, record.index).into());
        }
        self.prepare(&record.as_data(), Some(record.checksum))
    }

    fn prepare(
        &self,
        record: &RecordData<'_>,
        checksum: Option<u64>,
    ) -> Result<PendingRecord, JournalError> {
        debug_assert!(!self.sealed, "{} is sealed", self.id());

        let required = RecordCodec::record_length(record) as u64;
        let remaining = self.remaining();
        if required > remaining {
            return Err(SegmentFull::new(record.index, required, remaining).into());
        }

        let offset = self.size();

        let mut bytes = vec![0u8; required as usize];
        let (metadata, n) = RecordCodec::write_record(record, &mut bytes, 0)
            .map_err(io::Error::from)?;
        bytes.truncate(n);

        if let Some(expected) = checksum {
            if expected != metadata.checksum {
                return Err(CorruptedRecord::new(
                    offset,
                    Corruption::ChecksumMismatch {
                        expected,
                        actual: metadata.checksum,
                    },
                )
                .into());
            }
        }

        Ok(PendingRecord {
            segment_id: self.id(),
            f: self.f.clone(),
            index: record.index,
            asqn: record.asqn,
            offset,
            bytes,
        })
    }

    /// Make a written [`PendingRecord`] visible and return its index.
    ///
    /// It must be the latest record prepared on this segment.
    pub(crate) fn publish(&mut self, pending: PendingRecord) -> Index {
        debug_assert_eq!(pending.index, self.next_index());
        debug_assert_eq!(pending.offset, self.size());

        self.offsets.push(pending.offset + pending.bytes.len() as u64);
        self.asqns.push(pending.asqn);
        pending.index
    }

    /// Discard records at and after `index`.
    ///
    /// The segment accepts appends again afterwards.
    pub(crate) fn truncate(&mut self, index: Index) -> Result<(), io::Error> {
        self.sealed = false;

        if index >= self.next_index() {
            return Ok(());
        }

        let keep = index.saturating_sub(self.first_index()) as usize;
        let end = self.offsets[keep];
        let id = self.id();

        self.f.set_len(end).context(|| format!("truncate {}", id))?;
        if self.preallocated {
            self.f.set_len(self.descriptor.max_segment_size as u64)?;
        }
        self.f.sync_data().context(|| format!("sync {}", id))?;

        info!(
            "Truncated {} to {} records, removed [{}, {})",
            id,
            keep,
            index.max(self.first_index()),
            self.next_index()
        );

        self.offsets.truncate(keep + 1);
        self.asqns.truncate(keep);

        Ok(())
    }

    /// Read the record at `index`, `None` if it is not in this segment.
    pub fn read(&self, index: Index) -> Result<Option<JournalRecord>, JournalError> {
        self.locate(index).map(|loc| loc.read()).transpose()
    }

    pub(crate) fn locate(&self, index: Index) -> Option<RecordLocation> {
        let pos = self.position(index)?;
        Some(RecordLocation {
            segment_id: self.id(),
            f: self.f.clone(),
            index,
            start: self.offsets[pos],
            end: self.offsets[pos + 1],
        })
    }

    pub fn asqn(&self, index: Index) -> Option<Asqn> {
        self.position(index).map(|pos| self.asqns[pos])
    }

    /// Find the first index not greater than `upto` whose asqn is at least
    /// `asqn`.
    ///
    /// Records carrying [`ASQN_IGNORE`] never match.
    pub fn seek_asqn(&self, asqn: Asqn, upto: Index) -> Option<Index> {
        let first = self.first_index();
        self.asqns
            .iter()
            .enumerate()
            .map(|(i, a)| (first + i as u64, *a))
            .take_while(|(index, _)| *index <= upto)
            .find(|(_, a)| *a != ASQN_IGNORE && *a >= asqn)
            .map(|(index, _)| index)
    }

    fn position(&self, index: Index) -> Option<usize> {
        if index < self.first_index() || index >= self.next_index() {
            return None;
        }
        Some((index - self.first_index()) as usize)
    }

    pub fn open_reader(&self) -> SegmentReader<'_> {
        SegmentReader::new(self, None)
    }

    pub fn open_committed_reader<F>(&self, commit_index: F) -> SegmentReader<'_, F>
    where F: Fn() -> Index {
        SegmentReader::new(self, Some(commit_index))
    }

    pub(crate) fn flush(&self) -> Result<(), io::Error> {
        self.f
            .sync_data()
            .context(|| format!("sync {}", self.descriptor.id))
    }

    /// Make the written records durable; no more records are appended.
    pub(crate) fn seal(&mut self) -> Result<(), io::Error> {
        self.flush()?;
        self.sealed = true;
        Ok(())
    }

    pub(crate) fn delete(self) -> Result<(), io::Error> {
        let Self { f, path, descriptor, .. } = self;
        drop(f);
        fs::remove_file(&path)
            .context(|| format!("remove {} at {}", descriptor.id, path))?;
        info!("Removed {}", descriptor.id);
        Ok(())
    }

    pub(crate) fn stat(&self) -> SegmentStat {
        SegmentStat {
            segment_id: self.id(),
            records_count: self.records_count() as u64,
            first_index: self.first_index(),
            next_index: self.next_index(),
            size: self.size(),
            sealed: self.sealed,
        }
    }

    /// Read every record of a segment file without modifying it.
    pub(crate) fn dump(
        config: &Config,
        id: SegmentId,
    ) -> Result<SegmentDump, io::Error> {
        let f = OpenOptions::new()
            .read(true)
            .open(config.segment_path(id))
            .context(|| format!("open {}", id))?;
        let file_size = f.metadata()?.len();
        let descriptor = Self::read_descriptor(&f, id)?;

        let mut r = &f;
        r.seek(io::SeekFrom::Start(SegmentDescriptor::ENCODED_SIZE as u64))?;

        let it = RecordIterator::new(
            BufReader::with_capacity(config.read_buffer_size(), r),
            SegmentDescriptor::ENCODED_SIZE as u64,
            file_size,
            descriptor.first_index,
        );

        Ok((descriptor, it.collect()))
    }
}
