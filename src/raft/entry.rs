use std::io;

use byteorder::BigEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;
use codeq::Decode;
use codeq::Encode;

use crate::codec::JournalRecord;
use crate::types::Term;

/// What a raft entry carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Appended by a new leader at the start of its term.
    Initial,

    /// Opaque application data.
    Application(Vec<u8>),
}

/// The data of a journal record written by the raft core.
///
/// ```text
/// | term: u64 | kind: u8 | application data ... |
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaftEntry {
    pub term: Term,
    pub kind: EntryKind,
}

impl RaftEntry {
    const KIND_INITIAL: u8 = 0;
    const KIND_APPLICATION: u8 = 1;

    pub fn initial(term: Term) -> Self {
        Self {
            term,
            kind: EntryKind::Initial,
        }
    }

    pub fn application(term: Term, data: impl Into<Vec<u8>>) -> Self {
        Self {
            term,
            kind: EntryKind::Application(data.into()),
        }
    }

    /// Application data, `None` for an initial entry.
    pub fn data(&self) -> Option<&[u8]> {
        match &self.kind {
            EntryKind::Initial => None,
            EntryKind::Application(d) => Some(d),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, io::Error> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(buf)
    }

    pub fn from_record(record: &JournalRecord) -> Result<Self, io::Error> {
        Self::decode(record.data.as_slice())
    }

    /// Read only the term of an encoded entry.
    pub fn term_of(data: &[u8]) -> Result<Term, io::Error> {
        let mut r = data;
        r.read_u64::<BigEndian>()
    }
}

impl codeq::Encode for RaftEntry {
    fn encode<W: io::Write>(&self, mut w: W) -> Result<usize, io::Error> {
        w.write_u64::<BigEndian>(self.term)?;
        match &self.kind {
            EntryKind::Initial => {
                w.write_u8(Self::KIND_INITIAL)?;
                Ok(9)
            }
            EntryKind::Application(data) => {
                w.write_u8(Self::KIND_APPLICATION)?;
                w.write_all(data)?;
                Ok(9 + data.len())
            }
        }
    }
}

impl codeq::Decode for RaftEntry {
    fn decode<R: io::Read>(mut r: R) -> Result<Self, io::Error> {
        let term = r.read_u64::<BigEndian>()?;
        let kind = r.read_u8()?;

        match kind {
            Self::KIND_INITIAL => Ok(Self::initial(term)),
            Self::KIND_APPLICATION => {
                let mut data = Vec::new();
                r.read_to_end(&mut data)?;
                Ok(Self::application(term, data))
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown raft entry kind: {}", kind),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use codeq::Decode;

    use super::RaftEntry;

    #[test]
    fn test_raft_entry_codec() -> Result<(), io::Error> {
        let e = RaftEntry::application(3, "foo");
        let b = e.to_bytes()?;
        assert_eq!(b, vec![0, 0, 0, 0, 0, 0, 0, 3, 1, b'f', b'o', b'o']);
        assert_eq!(RaftEntry::decode(b.as_slice())?, e);
        assert_eq!(RaftEntry::term_of(&b)?, 3);
        assert_eq!(e.data(), Some(b"foo".as_slice()));

        let e = RaftEntry::initial(7);
        let b = e.to_bytes()?;
        assert_eq!(b, vec![0, 0, 0, 0, 0, 0, 0, 7, 0]);
        assert_eq!(RaftEntry::decode(b.as_slice())?, e);
        assert_eq!(e.data(), None);

        let err = RaftEntry::decode([0u8, 0, 0, 0, 0, 0, 0, 7, 9].as_slice())
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let err = RaftEntry::term_of(&[0, 1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        Ok(())
    }
}
