//! Binary layout of journal records.
//!
//! A record is a fixed-size metadata header followed by the record data:
//!
//! ```text
//! | version: u8 | checksum: u64 | length: u32 |             metadata, 13 bytes
//! | index: u64 | asqn: i64 | data_len: u32 | data ... |    data, `length` bytes
//! ```
//!
//! All integers are big-endian. A metadata header of all zero bytes denotes
//! space that was never written, which is how the end of a preallocated
//! segment is detected.
//!
//! The codec works on a caller supplied buffer and an offset in it, and never
//! writes past the end of the buffer.

mod journal_record;
mod record_data;
mod record_metadata;

use byteorder::BigEndian;
use byteorder::ByteOrder;
pub use journal_record::JournalRecord;
pub use record_data::RecordData;
pub use record_metadata::RecordMetadata;

use crate::errors::CorruptedRecord;
use crate::errors::Corruption;
use crate::errors::InsufficientCapacity;

/// Serializes and deserializes [`RecordMetadata`] and [`RecordData`].
pub struct RecordCodec;

impl RecordCodec {
    /// Size of the metadata header of every record.
    pub const fn metadata_length() -> usize {
        RecordMetadata::LENGTH
    }

    /// Size of the serialized record data, excluding the metadata header.
    pub fn serialized_length(record: &RecordData<'_>) -> usize {
        RecordData::HEADER_LENGTH + record.data.len()
    }

    /// Size of a whole record on disk: metadata header plus data.
    pub fn record_length(record: &RecordData<'_>) -> usize {
        Self::metadata_length() + Self::serialized_length(record)
    }

    /// Checksum of serialized record data.
    pub fn checksum(serialized_data: &[u8]) -> u64 {
        crc32fast::hash(serialized_data) as u64
    }

    /// Check `serialized_data` against the checksum in `metadata`.
    ///
    /// `offset` is only used to report where the record is.
    pub fn verify(
        metadata: &RecordMetadata,
        serialized_data: &[u8],
        offset: u64,
    ) -> Result<(), CorruptedRecord> {
        let actual = Self::checksum(serialized_data);
        if actual != metadata.checksum {
            return Err(CorruptedRecord::new(offset, Corruption::ChecksumMismatch {
                expected: metadata.checksum,
                actual,
            }));
        }
        Ok(())
    }

    /// Write `metadata` at `offset`, returns the number of bytes written.
    pub fn write_metadata(
        metadata: &RecordMetadata,
        buf: &mut [u8],
        offset: usize,
    ) -> Result<usize, InsufficientCapacity> {
        let b = Self::slot(buf, offset, RecordMetadata::LENGTH)?;

        b[0] = RecordMetadata::VERSION;
        BigEndian::write_u64(&mut b[1..9], metadata.checksum);
        BigEndian::write_u32(&mut b[9..13], metadata.length);

        Ok(RecordMetadata::LENGTH)
    }

    /// Read the metadata at `offset`.
    ///
    /// All-zero bytes are reported as [`Corruption::Unwritten`].
    pub fn read_metadata(
        buf: &[u8],
        offset: usize,
    ) -> Result<RecordMetadata, CorruptedRecord> {
        let b = Self::expect(buf, offset, RecordMetadata::LENGTH)?;

        match b[0] {
            RecordMetadata::VERSION => {}
            0 if b.iter().all(|x| *x == 0) => {
                return Err(CorruptedRecord::new(
                    offset as u64,
                    Corruption::Unwritten,
                ));
            }
            v => {
                return Err(CorruptedRecord::new(
                    offset as u64,
                    Corruption::UnknownVersion(v),
                ));
            }
        }

        Ok(RecordMetadata::new(
            BigEndian::read_u64(&b[1..9]),
            BigEndian::read_u32(&b[9..13]),
        ))
    }

    /// Write the serialized `record` at `offset`, returns the number of bytes
    /// written.
    pub fn write_data(
        record: &RecordData<'_>,
        buf: &mut [u8],
        offset: usize,
    ) -> Result<usize, InsufficientCapacity> {
        let n = Self::serialized_length(record);
        let b = Self::slot(buf, offset, n)?;

        BigEndian::write_u64(&mut b[0..8], record.index);
        BigEndian::write_i64(&mut b[8..16], record.asqn);
        BigEndian::write_u32(&mut b[16..20], record.data.len() as u32);
        b[20..].copy_from_slice(record.data);

        Ok(n)
    }

    /// Read the serialized record data at `offset`.
    ///
    /// The returned record borrows its data from `buf`.
    pub fn read_data(
        buf: &[u8],
        offset: usize,
    ) -> Result<RecordData<'_>, CorruptedRecord> {
        let h = Self::expect(buf, offset, RecordData::HEADER_LENGTH)?;

        let index = BigEndian::read_u64(&h[0..8]);
        let asqn = BigEndian::read_i64(&h[8..16]);
        let data_len = BigEndian::read_u32(&h[16..20]) as usize;

        let data_start = offset + RecordData::HEADER_LENGTH;
        let data = Self::expect(buf, data_start, data_len)
            .map_err(|e| CorruptedRecord::new(offset as u64, e.reason))?;

        Ok(RecordData::new(index, asqn, data))
    }

    /// Write a complete record, metadata followed by data, at `offset`.
    ///
    /// Nothing is written if the buffer is too small for the whole record.
    /// Returns the metadata that was written and the total number of bytes.
    pub fn write_record(
        record: &RecordData<'_>,
        buf: &mut [u8],
        offset: usize,
    ) -> Result<(RecordMetadata, usize), InsufficientCapacity> {
        let total = Self::record_length(record);
        Self::slot(buf, offset, total)?;

        let data_offset = offset + RecordMetadata::LENGTH;
        let n = Self::write_data(record, buf, data_offset)?;

        let checksum = Self::checksum(&buf[data_offset..data_offset + n]);
        let metadata = RecordMetadata::new(checksum, n as u32);
        Self::write_metadata(&metadata, buf, offset)?;

        Ok((metadata, total))
    }

    /// Read and verify a complete record at `offset`.
    pub fn read_record(
        buf: &[u8],
        offset: usize,
    ) -> Result<(RecordMetadata, RecordData<'_>), CorruptedRecord> {
        let metadata = Self::read_metadata(buf, offset)?;

        let data_offset = offset + RecordMetadata::LENGTH;
        let declared = metadata.length as usize;
        let bytes = Self::expect(buf, data_offset, declared)
            .map_err(|e| CorruptedRecord::new(offset as u64, e.reason))?;

        Self::verify(&metadata, bytes, offset as u64)?;

        let record = Self::read_data(bytes, 0)
            .map_err(|e| e.rebase(data_offset as u64))?;

        let actual = Self::serialized_length(&record);
        if actual != declared {
            return Err(CorruptedRecord::new(
                offset as u64,
                Corruption::LengthMismatch { declared, actual },
            ));
        }

        Ok((metadata, record))
    }

    /// Borrow `len` writable bytes at `offset`.
    fn slot(
        buf: &mut [u8],
        offset: usize,
        len: usize,
    ) -> Result<&mut [u8], InsufficientCapacity> {
        let available = buf.len().saturating_sub(offset);
        if available < len {
            return Err(InsufficientCapacity::new(len, available));
        }
        Ok(&mut buf[offset..offset + len])
    }

    /// Borrow `len` readable bytes at `offset`.
    fn expect(
        buf: &[u8],
        offset: usize,
        len: usize,
    ) -> Result<&[u8], CorruptedRecord> {
        let available = buf.len().saturating_sub(offset);
        if available < len {
            return Err(CorruptedRecord::new(offset as u64, Corruption::Incomplete {
                required: len,
                available,
            }));
        }
        Ok(&buf[offset..offset + len])
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::RecordCodec;
    use super::RecordData;
    use super::RecordMetadata;
    use crate::errors::CorruptedRecord;
    use crate::errors::Corruption;
    use crate::errors::InsufficientCapacity;
    use crate::types::ASQN_IGNORE;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[rustfmt::skip]
    fn hello_record_bytes() -> Vec<u8> {
        vec![
            1,                                    // version
            0, 0, 0, 0, 0x40, 0x4b, 0xb3, 0x02,   // checksum
            0, 0, 0, 25,                          // length
            0, 0, 0, 0, 0, 0, 0, 1,               // index
            0, 0, 0, 0, 0, 0, 0, 5,               // asqn
            0, 0, 0, 5,                           // data_len
            b'h', b'e', b'l', b'l', b'o',         // data
        ]
    }

    #[test]
    fn test_write_record() -> TestResult {
        let record = RecordData::new(1, 5, b"hello");
        assert_eq!(RecordCodec::serialized_length(&record), 25);

        let mut buf = vec![0xAA; 40];
        let (metadata, n) = RecordCodec::write_record(&record, &mut buf, 1)?;

        assert_eq!(metadata, RecordMetadata::new(0x404b_b302, 25));
        assert_eq!(n, 38);
        assert_eq!(buf[0], 0xAA);
        assert_eq!(buf[1..39].to_vec(), hello_record_bytes());
        assert_eq!(buf[39], 0xAA);

        Ok(())
    }

    #[test]
    fn test_read_record() -> TestResult {
        let mut buf = vec![0; 3];
        buf.extend_from_slice(&hello_record_bytes());

        let (metadata, record) = RecordCodec::read_record(&buf, 3)?;
        assert_eq!(metadata, RecordMetadata::new(0x404b_b302, 25));
        assert_eq!(record, RecordData::new(1, 5, b"hello"));

        Ok(())
    }

    #[test]
    fn test_record_without_asqn() -> TestResult {
        let record = RecordData::new(2, ASQN_IGNORE, b"");

        let mut buf = vec![0; RecordCodec::record_length(&record)];
        let (metadata, n) = RecordCodec::write_record(&record, &mut buf, 0)?;
        assert_eq!(n, 33);
        assert_eq!(metadata.checksum, 0x717e_37c0);

        #[rustfmt::skip]
        assert_eq!(buf[13..].to_vec(), vec![
            0, 0, 0, 0, 0, 0, 0, 2,
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            0, 0, 0, 0,
        ]);

        let (_, got) = RecordCodec::read_record(&buf, 0)?;
        assert_eq!(got, record);

        Ok(())
    }

    #[test]
    fn test_write_insufficient_capacity() {
        let record = RecordData::new(1, 5, b"hello");

        let mut buf = vec![0; 40];
        let res = RecordCodec::write_record(&record, &mut buf, 3);
        assert_eq!(res, Err(InsufficientCapacity::new(38, 37)));
        assert!(buf.iter().all(|x| *x == 0), "nothing written");

        let res = RecordCodec::write_metadata(
            &RecordMetadata::new(1, 1),
            &mut buf,
            30,
        );
        assert_eq!(res, Err(InsufficientCapacity::new(13, 10)));

        let res = RecordCodec::write_data(&record, &mut buf, 50);
        assert_eq!(res, Err(InsufficientCapacity::new(25, 0)));
    }

    #[test]
    fn test_read_unwritten() {
        let buf = vec![0; 64];
        assert_eq!(
            RecordCodec::read_metadata(&buf, 10),
            Err(CorruptedRecord::new(10, Corruption::Unwritten))
        );
        assert_eq!(
            RecordCodec::read_record(&buf, 0),
            Err(CorruptedRecord::new(0, Corruption::Unwritten))
        );
    }

    #[test]
    fn test_read_unknown_version() {
        let mut buf = hello_record_bytes();

        buf[0] = 2;
        assert_eq!(
            RecordCodec::read_metadata(&buf, 0),
            Err(CorruptedRecord::new(0, Corruption::UnknownVersion(2)))
        );

        // Version 0 followed by non-zero bytes is garbage, not free space.
        buf[0] = 0;
        assert_eq!(
            RecordCodec::read_metadata(&buf, 0),
            Err(CorruptedRecord::new(0, Corruption::UnknownVersion(0)))
        );
    }

    #[test]
    fn test_read_incomplete() {
        let buf = hello_record_bytes();

        assert_eq!(
            RecordCodec::read_metadata(&buf[..10], 0),
            Err(CorruptedRecord::new(0, Corruption::Incomplete {
                required: 13,
                available: 10
            }))
        );

        assert_eq!(
            RecordCodec::read_record(&buf[..37], 0),
            Err(CorruptedRecord::new(0, Corruption::Incomplete {
                required: 25,
                available: 24
            }))
        );

        // data_len points past the end of the buffer
        assert_eq!(
            RecordCodec::read_data(&buf[13..36], 0),
            Err(CorruptedRecord::new(0, Corruption::Incomplete {
                required: 5,
                available: 3
            }))
        );
    }

    #[test]
    fn test_read_checksum_mismatch() {
        let mut buf = hello_record_bytes();
        // flip a byte of the payload
        buf[35] = b'j';

        assert_eq!(
            RecordCodec::read_record(&buf, 0),
            Err(CorruptedRecord::new(0, Corruption::ChecksumMismatch {
                expected: 0x404b_b302,
                actual: RecordCodec::checksum(&buf[13..]),
            }))
        );
    }

    #[test]
    fn test_read_length_mismatch() -> TestResult {
        // metadata declares one more byte than the data takes
        let mut buf = hello_record_bytes();
        buf.push(0);
        let checksum = RecordCodec::checksum(&buf[13..]);
        RecordCodec::write_metadata(
            &RecordMetadata::new(checksum, 26),
            &mut buf,
            0,
        )?;

        assert_eq!(
            RecordCodec::read_record(&buf, 0),
            Err(CorruptedRecord::new(0, Corruption::LengthMismatch {
                declared: 26,
                actual: 25
            }))
        );
        Ok(())
    }
}
