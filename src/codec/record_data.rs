use crate::types::Asqn;
use crate::types::Index;

/// The payload part of a record, borrowing its data bytes.
///
/// ```text
/// | index: u64 | asqn: i64 | data_len: u32 | data: [u8; data_len] |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordData<'a> {
    pub index: Index,
    pub asqn: Asqn,
    pub data: &'a [u8],
}

impl<'a> RecordData<'a> {
    /// Size of the fixed fields preceding `data`.
    pub const HEADER_LENGTH: usize = 20;

    pub fn new(index: Index, asqn: Asqn, data: &'a [u8]) -> Self {
        Self { index, asqn, data }
    }
}
