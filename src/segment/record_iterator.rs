use std::io;
use std::io::Read;

use crate::codec::JournalRecord;
use crate::codec::RecordCodec;
use crate::codec::RecordMetadata;
use crate::errors::CorruptedRecord;
use crate::errors::Corruption;
use crate::errors::IndexMismatch;
use crate::offset_reader::OffsetReader;
use crate::types::Index;

/// Iterates over the records of a segment file from a reader.
///
/// Each item is `(offset, size, record)`. Iteration stops at the end of the
/// file or at the first unwritten metadata header. The first invalid record
/// is returned as an error and ends the iteration.
pub(crate) struct RecordIterator<R: io::Read> {
    r: OffsetReader<R>,
    file_size: u64,
    next_index: Index,
    done: bool,
}

impl<R: io::Read> RecordIterator<R> {
    /// `r` must be positioned at file offset `start`.
    pub(crate) fn new(
        r: R,
        start: u64,
        file_size: u64,
        first_index: Index,
    ) -> Self {
        Self {
            r: OffsetReader::new(r, start),
            file_size,
            next_index: first_index,
            done: false,
        }
    }

    fn available(&self) -> usize {
        (self.file_size - self.r.offset()) as usize
    }

    fn read_next(
        &mut self,
    ) -> Result<Option<(u64, u64, JournalRecord)>, io::Error> {
        let start = self.r.offset();
        let incomplete = |required: usize, available: usize| {
            CorruptedRecord::new(start, Corruption::Incomplete {
                required,
                available,
            })
        };

        let meta_len = RecordMetadata::LENGTH;
        if self.available() < meta_len {
            return Err(incomplete(meta_len, self.available()).into());
        }

        let mut buf = vec![0u8; meta_len];
        self.r.read_exact(&mut buf)?;

        let metadata = match RecordCodec::read_metadata(&buf, 0) {
            Ok(m) => m,
            Err(e) if e.is_unwritten() => return Ok(None),
            Err(e) => return Err(e.rebase(start).into()),
        };

        let data_len = metadata.length as usize;
        let available = self.available();
        if available < data_len {
            return Err(incomplete(meta_len + data_len, meta_len + available)
                .into());
        }

        buf.resize(meta_len + data_len, 0);
        self.r.read_exact(&mut buf[meta_len..])?;

        let (metadata, data) =
            RecordCodec::read_record(&buf, 0).map_err(|e| e.rebase(start))?;

        if data.index != self.next_index {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "at offset {}: {}",
                    start,
                    IndexMismatch::new(self.next_index, data.index)
                ),
            ));
        }

        let record = JournalRecord::from_data(&data, metadata.checksum);
        Ok(Some((start, buf.len() as u64, record)))
    }
}

impl<R: io::Read> Iterator for RecordIterator<R> {
    type Item = Result<(u64, u64, JournalRecord), io::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.r.offset() >= self.file_size {
            return None;
        }

        match self.read_next() {
            Ok(Some(item)) => {
                self.next_index += 1;
                Some(Ok(item))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
