use std::fmt;
use std::io;

/// What is wrong with the bytes at a record position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    /// The metadata bytes are all zero: nothing was ever written here.
    Unwritten,

    /// The metadata starts with a version this build does not know.
    UnknownVersion(u8),

    /// The buffer ends before the bytes the record declares.
    Incomplete { required: usize, available: usize },

    /// The length in the metadata disagrees with the serialized data.
    LengthMismatch { declared: usize, actual: usize },

    ChecksumMismatch { expected: u64, actual: u64 },
}

impl fmt::Display for Corruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Corruption::Unwritten => write!(f, "unwritten"),
            Corruption::UnknownVersion(v) => write!(f, "unknown version {}", v),
            Corruption::Incomplete {
                required,
                available,
            } => write!(
                f,
                "incomplete, requires {} bytes but only {} available",
                required, available
            ),
            Corruption::LengthMismatch { declared, actual } => write!(
                f,
                "length mismatch, declared {} but data takes {}",
                declared, actual
            ),
            Corruption::ChecksumMismatch { expected, actual } => write!(
                f,
                "checksum mismatch, expected {:#010x} actual {:#010x}",
                expected, actual
            ),
        }
    }
}

/// A record could not be decoded at the given offset.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("Corrupted record at offset {offset}: {reason}")]
pub struct CorruptedRecord {
    pub offset: u64,
    pub reason: Corruption,
}

impl CorruptedRecord {
    pub fn new(offset: u64, reason: Corruption) -> Self {
        Self { offset, reason }
    }

    /// Returns true if the bytes are not written, not damaged.
    pub fn is_unwritten(&self) -> bool {
        self.reason == Corruption::Unwritten
    }

    /// Returns the same error with its offset shifted by `base`.
    pub(crate) fn rebase(self, base: u64) -> Self {
        Self {
            offset: self.offset + base,
            reason: self.reason,
        }
    }
}

impl From<CorruptedRecord> for io::Error {
    fn from(value: CorruptedRecord) -> Self {
        let kind = match value.reason {
            Corruption::Incomplete { .. } => io::ErrorKind::UnexpectedEof,
            _ => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, value)
    }
}

/// The output buffer cannot hold what is being written.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("Insufficient capacity: requires {required} bytes, {available} available")]
pub struct InsufficientCapacity {
    pub required: usize,
    pub available: usize,
}

impl InsufficientCapacity {
    pub fn new(required: usize, available: usize) -> Self {
        Self {
            required,
            available,
        }
    }
}

impl From<InsufficientCapacity> for io::Error {
    fn from(value: InsufficientCapacity) -> Self {
        io::Error::new(io::ErrorKind::InvalidInput, value)
    }
}
