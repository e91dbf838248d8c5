use std::fmt;

use crate::codec::RecordData;
use crate::types::Asqn;
use crate::types::Index;

/// A record as stored in and read from the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRecord {
    pub index: Index,
    pub asqn: Asqn,

    /// Checksum of the serialized record data.
    pub checksum: u64,

    pub data: Vec<u8>,
}

impl JournalRecord {
    pub fn new(index: Index, asqn: Asqn, checksum: u64, data: Vec<u8>) -> Self {
        Self {
            index,
            asqn,
            checksum,
            data,
        }
    }

    pub(crate) fn from_data(record: &RecordData<'_>, checksum: u64) -> Self {
        Self::new(record.index, record.asqn, checksum, record.data.to_vec())
    }

    pub fn as_data(&self) -> RecordData<'_> {
        RecordData::new(self.index, self.asqn, &self.data)
    }
}

impl fmt::Display for JournalRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "JournalRecord{{index: {}, asqn: {}, checksum: {:#010x}, data: {}B}}",
            self.index,
            self.asqn,
            self.checksum,
            self.data.len()
        )
    }
}
