use std::fmt;
use std::fmt::Formatter;

use crate::num::format_pad9_u64;
use crate::segment::SegmentId;
use crate::types::Index;

/// Statistics about a journal and its segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalStat {
    pub first_index: Index,
    pub last_index: Index,
    pub commit_index: Index,
    pub segments: Vec<SegmentStat>,
}

impl fmt::Display for JournalStat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let lb = if f.alternate() { "\n" } else { "" };
        let idt = if f.alternate() { "  " } else { "" };
        write!(
            f,
            "JournalStat{{{lb} first_index: {}, last_index: {}, commit_index: {},{lb} segments: [{lb}{idt}{}{lb} ]{lb}}}",
            self.first_index,
            self.last_index,
            self.commit_index,
            self.segments
                .iter()
                .map(|c| format!("{}", c))
                .collect::<Vec<String>>()
                .join(&format!(",{lb}{idt}")),
        )
    }
}

/// Statistics about a single segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentStat {
    pub segment_id: SegmentId,
    pub records_count: u64,
    pub first_index: Index,
    /// Last index in this segment plus one
    pub next_index: Index,
    /// Bytes used, including the descriptor
    pub size: u64,
    pub sealed: bool,
}

impl fmt::Display for SegmentStat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SegmentStat({}){{records: {}, [{}, {}), size: {}{}}}",
            self.segment_id,
            self.records_count,
            self.first_index,
            self.next_index,
            format_pad9_u64(self.size),
            if self.sealed { ", sealed" } else { "" }
        )
    }
}
