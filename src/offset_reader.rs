use std::io;

/// A reader that tracks the file offset of the next byte it returns.
pub(crate) struct OffsetReader<R> {
    inner: R,
    offset: u64,
}

impl<R: io::Read> OffsetReader<R> {
    /// Wraps `inner`, whose next byte is at file offset `start`.
    pub(crate) fn new(inner: R, start: u64) -> Self {
        Self {
            inner,
            offset: start,
        }
    }

    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }
}

impl<R: io::Read> io::Read for OffsetReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.offset += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::io::Read;

    use crate::offset_reader::OffsetReader;

    #[test]
    fn test_offset_reader() -> Result<(), io::Error> {
        let data = b"hello";
        let mut reader = OffsetReader::new(data.as_ref(), 29);
        assert_eq!(reader.offset(), 29);

        let mut buf = [0; 3];
        reader.read_exact(&mut buf)?;
        assert_eq!(reader.offset(), 32);

        let mut buf = [0; 2];
        reader.read_exact(&mut buf)?;
        assert_eq!(reader.offset(), 34);

        let mut buf = [0; 1];
        let err = reader.read_exact(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        Ok(())
    }
}
