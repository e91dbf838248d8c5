use std::io;
use std::sync::Arc;

use crate::codec::JournalRecord;
use crate::dump_writer;
use crate::segment::Segment;
use crate::Config;
use crate::Journal;

/// Writes a human readable listing of the segment files of a journal.
///
/// Files are read without being modified, so a journal directory can be
/// dumped while it is open.
pub struct Dump {
    config: Arc<Config>,
}

impl Dump {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub fn write_to_string(&self) -> Result<String, io::Error> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        String::from_utf8(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn write<W: io::Write>(&self, mut w: W) -> Result<(), io::Error> {
        writeln!(&mut w, "Journal:")?;
        self.write_with(w, dump_writer::multiline_string)
    }

    pub fn write_with<W: io::Write, D>(
        &self,
        mut w: W,
        write_record: D,
    ) -> Result<(), io::Error>
    where
        D: Fn(
            &mut W,
            u64,
            Result<(u64, u64, JournalRecord), io::Error>,
        ) -> Result<(), io::Error>,
    {
        let config = self.config.as_ref();
        let ids = Journal::load_segment_ids(config)?;
        for id in ids {
            let (descriptor, records) = Segment::dump(config, id)?;
            writeln!(
                &mut w,
                "{} first_index: {}, max_size: {}",
                id, descriptor.first_index, descriptor.max_segment_size
            )?;
            for (i, res) in records.into_iter().enumerate() {
                write_record(&mut w, i as u64, res)?;
            }
        }
        Ok(())
    }
}
