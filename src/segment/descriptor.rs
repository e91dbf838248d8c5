use std::io;

use byteorder::BigEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::codec::RecordCodec;
use crate::segment::SegmentId;
use crate::types::Index;

/// Header at the start of every segment file.
///
/// ```text
/// | version: u8 | id: u64 | first_index: u64 | max_segment_size: u32 | checksum: u64 |
/// ```
///
/// The checksum covers the 21 bytes before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentDescriptor {
    pub id: SegmentId,
    pub first_index: Index,
    pub max_segment_size: u32,
}

impl SegmentDescriptor {
    pub const VERSION: u8 = 1;

    /// Size of the encoded descriptor; records start right after it.
    pub const ENCODED_SIZE: usize = 29;

    const CHECKED_SIZE: usize = 21;

    pub fn new(id: SegmentId, first_index: Index, max_segment_size: u32) -> Self {
        Self {
            id,
            first_index,
            max_segment_size,
        }
    }
}

impl codeq::Encode for SegmentDescriptor {
    fn encode<W: io::Write>(&self, mut w: W) -> Result<usize, io::Error> {
        let mut buf = Vec::with_capacity(Self::ENCODED_SIZE);

        buf.write_u8(Self::VERSION)?;
        buf.write_u64::<BigEndian>(*self.id)?;
        buf.write_u64::<BigEndian>(self.first_index)?;
        buf.write_u32::<BigEndian>(self.max_segment_size)?;

        let checksum = RecordCodec::checksum(&buf);
        buf.write_u64::<BigEndian>(checksum)?;

        w.write_all(&buf)?;
        Ok(buf.len())
    }
}

impl codeq::Decode for SegmentDescriptor {
    fn decode<R: io::Read>(mut r: R) -> Result<Self, io::Error> {
        let mut buf = [0u8; Self::ENCODED_SIZE];
        r.read_exact(&mut buf)?;

        let mut cr = &buf[..];
        let version = cr.read_u8()?;
        if version != Self::VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported segment descriptor version: {}", version),
            ));
        }

        let id = cr.read_u64::<BigEndian>()?;
        let first_index = cr.read_u64::<BigEndian>()?;
        let max_segment_size = cr.read_u32::<BigEndian>()?;
        let checksum = cr.read_u64::<BigEndian>()?;

        let actual = RecordCodec::checksum(&buf[..Self::CHECKED_SIZE]);
        if actual != checksum {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "segment descriptor checksum mismatch: expected {:#010x}, actual {:#010x}",
                    checksum, actual
                ),
            ));
        }

        Ok(Self::new(SegmentId(id), first_index, max_segment_size))
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use codeq::Decode;
    use codeq::Encode;

    use super::SegmentDescriptor;
    use crate::segment::SegmentId;

    #[test]
    fn test_descriptor_codec() -> Result<(), io::Error> {
        let desc = SegmentDescriptor::new(SegmentId(1), 1, 1024);

        let mut buf = Vec::new();
        let n = desc.encode(&mut buf)?;
        assert_eq!(n, 29);

        #[rustfmt::skip]
        assert_eq!(buf, vec![
            1,                                  // version
            0, 0, 0, 0, 0, 0, 0, 1,             // id
            0, 0, 0, 0, 0, 0, 0, 1,             // first_index
            0, 0, 4, 0,                         // max_segment_size
            0, 0, 0, 0, 0x5a, 0x44, 0x73, 0x24, // checksum
        ]);

        let got = SegmentDescriptor::decode(&mut buf.as_slice())?;
        assert_eq!(got, desc);

        Ok(())
    }

    #[test]
    fn test_descriptor_damaged() -> Result<(), io::Error> {
        let desc = SegmentDescriptor::new(SegmentId(3), 100, 1024);
        let mut buf = Vec::new();
        desc.encode(&mut buf)?;

        let mut damaged = buf.clone();
        damaged[10] ^= 1;
        let err = SegmentDescriptor::decode(&mut damaged.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let zeros = vec![0u8; 29];
        let err = SegmentDescriptor::decode(&mut zeros.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let err = SegmentDescriptor::decode(&mut &buf[..20]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        Ok(())
    }
}
