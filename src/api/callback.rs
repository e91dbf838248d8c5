use std::sync::mpsc::SyncSender;

use crate::errors::ProposeError;
use crate::types::Index;

/// Outcome of a proposal: the index it was committed at, or why it was not.
pub type CommitResult = Result<Index, ProposeError>;

/// A continuation that receives the outcome of a proposal.
pub trait Callback {
    /// Sends the outcome of a proposal back to the proposer.
    fn send(self, res: CommitResult);
}

/// Implementation of the Callback trait for SyncSender.
///
/// This allows using a synchronous channel sender as a callback mechanism
/// for proposals.
impl Callback for SyncSender<CommitResult> {
    fn send(self, res: CommitResult) {
        let _ = SyncSender::send(&self, res);
    }
}
