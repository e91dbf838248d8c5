use std::collections::BTreeMap;
use std::mem;

use crate::api::callback::Callback;
use crate::errors::ProposeError;
use crate::errors::QuorumUnavailable;
use crate::types::Index;
use crate::types::Term;

struct Pending<C> {
    /// Tick at which the proposal fails if it is not committed.
    deadline: u64,
    callback: C,
}

/// Proposals appended by a leader and waiting for their commit.
pub(crate) struct PendingProposals<C> {
    proposals: BTreeMap<Index, Pending<C>>,
}

impl<C: Callback> PendingProposals<C> {
    pub(crate) fn new() -> Self {
        Self {
            proposals: BTreeMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, index: Index, deadline: u64, callback: C) {
        self.proposals.insert(index, Pending { deadline, callback });
    }

    #[allow(dead_code)]
    pub(crate) fn len(&self) -> usize {
        self.proposals.len()
    }

    /// Complete every proposal up to `commit_index`.
    pub(crate) fn commit(&mut self, commit_index: Index) {
        let rest = self.proposals.split_off(&(commit_index + 1));
        let committed = mem::replace(&mut self.proposals, rest);

        for (index, p) in committed {
            p.callback.send(Ok(index));
        }
    }

    /// Fail the proposals whose deadline is reached at tick `now`.
    pub(crate) fn expire(&mut self, now: u64, term: Term) {
        let expired = self
            .proposals
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(index, _)| *index)
            .collect::<Vec<_>>();

        for index in expired {
            if let Some(p) = self.proposals.remove(&index) {
                p.callback
                    .send(Err(QuorumUnavailable::new(index, term).into()));
            }
        }
    }

    pub(crate) fn fail_all(&mut self, err: ProposeError) {
        for (_, p) in mem::take(&mut self.proposals) {
            p.callback.send(Err(err.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::sync_channel;

    use super::PendingProposals;
    use crate::api::callback::CommitResult;
    use crate::errors::ProposeError;
    use crate::errors::QuorumUnavailable;

    #[test]
    fn test_commit_and_expire() {
        let mut pending = PendingProposals::new();
        let mut rxs = vec![];

        for index in 3..=6 {
            let (tx, rx) = sync_channel::<CommitResult>(1);
            pending.insert(index, 10 + index, tx);
            rxs.push(rx);
        }

        pending.commit(4);
        assert_eq!(rxs[0].try_recv().unwrap(), Ok(3));
        assert_eq!(rxs[1].try_recv().unwrap(), Ok(4));
        assert!(rxs[2].try_recv().is_err());
        assert_eq!(pending.len(), 2);

        pending.expire(15, 2);
        assert_eq!(
            rxs[2].try_recv().unwrap(),
            Err(QuorumUnavailable::new(5, 2).into())
        );
        assert_eq!(pending.len(), 1);

        pending.fail_all(ProposeError::not_leader(Some(3)));
        assert_eq!(
            rxs[3].try_recv().unwrap(),
            Err(ProposeError::not_leader(Some(3)))
        );
        assert_eq!(pending.len(), 0);
    }
}
