use crate::types::Index;

/// What a leader knows about the replication to one follower.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Progress {
    /// The next index to send.
    pub(crate) next_index: Index,

    /// The highest index known to be stored on the follower.
    pub(crate) match_index: Index,

    /// Tick until which the last append request is awaiting a response.
    pub(crate) inflight_until: Option<u64>,

    /// Tick until which the follower is expected to be installing a snapshot.
    pub(crate) snapshot_until: Option<u64>,
}

impl Progress {
    pub(crate) fn new(next_index: Index) -> Self {
        Self {
            next_index,
            match_index: 0,
            inflight_until: None,
            snapshot_until: None,
        }
    }

    pub(crate) fn is_idle(&self, now: u64) -> bool {
        self.inflight_until.map_or(true, |t| now >= t)
    }

    pub(crate) fn snapshot_pending(&self, now: u64) -> bool {
        self.snapshot_until.is_some_and(|t| now < t)
    }
}

/// Number of members that form a majority.
pub(crate) fn quorum(members: usize) -> usize {
    members / 2 + 1
}

/// The highest index stored on at least `quorum` members.
pub(crate) fn quorum_index(mut matched: Vec<Index>, quorum: usize) -> Index {
    matched.sort_unstable_by(|a, b| b.cmp(a));
    matched.get(quorum.saturating_sub(1)).copied().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::quorum;
    use super::quorum_index;
    use super::Progress;

    #[test]
    fn test_quorum() {
        assert_eq!(quorum(1), 1);
        assert_eq!(quorum(2), 2);
        assert_eq!(quorum(3), 2);
        assert_eq!(quorum(5), 3);
    }

    #[test]
    fn test_quorum_index() {
        assert_eq!(quorum_index(vec![7], 1), 7);
        assert_eq!(quorum_index(vec![3, 9, 5], 2), 5);
        assert_eq!(quorum_index(vec![10, 8, 8, 1, 0], 3), 8);
        assert_eq!(quorum_index(vec![10, 9, 2, 1, 0], 3), 2);
        assert_eq!(quorum_index(vec![], 1), 0);
    }

    #[test]
    fn test_progress_timers() {
        let mut p = Progress::new(5);
        assert!(p.is_idle(0));
        assert!(!p.snapshot_pending(0));

        p.inflight_until = Some(10);
        assert!(!p.is_idle(9));
        assert!(p.is_idle(10));

        p.snapshot_until = Some(4);
        assert!(p.snapshot_pending(3));
        assert!(!p.snapshot_pending(4));
    }
}
