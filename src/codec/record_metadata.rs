/// Fixed-size header written in front of every record.
///
/// ```text
/// | version: u8 | checksum: u64 | length: u32 |
/// ```
///
/// `length` is the size of the serialized [`RecordData`] that follows, and
/// `checksum` covers exactly those bytes.
///
/// [`RecordData`]: crate::codec::RecordData
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordMetadata {
    pub checksum: u64,
    pub length: u32,
}

impl RecordMetadata {
    /// Version byte written by this build. `0` is reserved for unwritten space.
    pub const VERSION: u8 = 1;

    /// Size of the serialized metadata in bytes.
    pub const LENGTH: usize = 13;

    pub fn new(checksum: u64, length: u32) -> Self {
        Self { checksum, length }
    }
}
