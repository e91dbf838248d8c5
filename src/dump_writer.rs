use std::io;

use crate::codec::JournalRecord;
use crate::num::format_pad9_u64;

/// Write one record of a segment dump per line:
///
/// ```text
///   R-00000: [000_000_029, 000_000_067) 38: index: 1, asqn: 5, checksum: 0x404bb302, data: "hello"
/// ```
pub fn multiline_string<W: io::Write>(
    w: &mut W,
    record_no: u64,
    res: Result<(u64, u64, JournalRecord), io::Error>,
) -> Result<(), io::Error> {
    match res {
        Ok((offset, size, rec)) => {
            writeln!(
                w,
                "  R-{record_no:05}: [{}, {}) {}: index: {}, asqn: {}, checksum: {:#010x}, data: {:?}",
                format_pad9_u64(offset),
                format_pad9_u64(offset + size),
                size,
                rec.index,
                rec.asqn,
                rec.checksum,
                String::from_utf8_lossy(&rec.data),
            )?;
        }
        Err(io_err) => {
            writeln!(w, "Error: {}", io_err)?;
        }
    }
    Ok(())
}
