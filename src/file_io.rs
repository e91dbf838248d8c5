//! Positional file I/O that does not move the shared file cursor.
//!
//! A segment file is shared between its writer and concurrent readers, so
//! every access names its own offset.

use std::fs::File;
use std::io;

#[cfg(unix)]
pub(crate) fn read_exact_at(
    f: &File,
    buf: &mut [u8],
    offset: u64,
) -> Result<(), io::Error> {
    use std::os::unix::fs::FileExt;

    f.read_exact_at(buf, offset)
}

#[cfg(unix)]
pub(crate) fn write_all_at(
    f: &File,
    buf: &[u8],
    offset: u64,
) -> Result<(), io::Error> {
    use std::os::unix::fs::FileExt;

    f.write_all_at(buf, offset)
}

#[cfg(windows)]
pub(crate) fn read_exact_at(
    f: &File,
    mut buf: &mut [u8],
    mut offset: u64,
) -> Result<(), io::Error> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        match f.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ));
            }
            Ok(n) => {
                buf = &mut std::mem::take(&mut buf)[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(windows)]
pub(crate) fn write_all_at(
    f: &File,
    mut buf: &[u8],
    mut offset: u64,
) -> Result<(), io::Error> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        match f.seek_write(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write whole buffer",
                ));
            }
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs::OpenOptions;
    use std::io;

    use super::read_exact_at;
    use super::write_all_at;

    #[test]
    fn test_positional_io() -> Result<(), io::Error> {
        let dir = tempfile::tempdir()?;
        let f = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(dir.path().join("f"))?;

        write_all_at(&f, b"world", 6)?;
        write_all_at(&f, b"hello ", 0)?;

        let mut buf = [0u8; 5];
        read_exact_at(&f, &mut buf, 6)?;
        assert_eq!(&buf, b"world");

        let err = read_exact_at(&f, &mut buf, 8).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        Ok(())
    }
}
