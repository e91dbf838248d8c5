use std::fmt;

use crate::codec::JournalRecord;
use crate::errors::LogInconsistency;
use crate::types::Index;
use crate::types::NodeId;
use crate::types::Term;

/// A message addressed from one raft node to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub from: NodeId,
    pub to: NodeId,
    pub message: Message,
}

impl Envelope {
    pub fn new(from: NodeId, to: NodeId, message: impl Into<Message>) -> Self {
        Self {
            from,
            to,
            message: message.into(),
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}: {}", self.from, self.to, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    PollRequest(PollRequest),
    PollResponse(PollResponse),
    VoteRequest(VoteRequest),
    VoteResponse(VoteResponse),
    AppendRequest(AppendRequest),
    AppendResponse(AppendResponse),
    SnapshotRequired(SnapshotRequired),
}

impl Message {
    /// The term of the sender when it sent the message.
    pub fn term(&self) -> Term {
        match self {
            Message::PollRequest(m) => m.term,
            Message::PollResponse(m) => m.term,
            Message::VoteRequest(m) => m.term,
            Message::VoteResponse(m) => m.term,
            Message::AppendRequest(m) => m.term,
            Message::AppendResponse(m) => m.term,
            Message::SnapshotRequired(m) => m.term,
        }
    }

    /// The sender, if the message can only be sent by a leader.
    pub fn leader(&self) -> Option<NodeId> {
        match self {
            Message::AppendRequest(m) => Some(m.leader),
            Message::SnapshotRequired(m) => Some(m.leader),
            _ => None,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::PollRequest(m) => write!(
                f,
                "PollRequest{{term: {}, candidate: {}, last_log: {}-{}}}",
                m.term, m.candidate, m.last_log_term, m.last_log_index
            ),
            Message::PollResponse(m) => write!(
                f,
                "PollResponse{{term: {}, accepted: {}}}",
                m.term, m.accepted
            ),
            Message::VoteRequest(m) => write!(
                f,
                "VoteRequest{{term: {}, candidate: {}, last_log: {}-{}}}",
                m.term, m.candidate, m.last_log_term, m.last_log_index
            ),
            Message::VoteResponse(m) => write!(
                f,
                "VoteResponse{{term: {}, granted: {}}}",
                m.term, m.granted
            ),
            Message::AppendRequest(m) => {
                write!(
                    f,
                    "AppendRequest{{term: {}, leader: {}, prev: {}-{}, commit: {}, entries: ",
                    m.term, m.leader, m.prev_term, m.prev_index, m.commit_index
                )?;
                match (m.entries.first(), m.entries.last()) {
                    (Some(first), Some(last)) => {
                        write!(f, "[{}, {}]}}", first.index, last.index)
                    }
                    _ => write!(f, "[]}}"),
                }
            }
            Message::AppendResponse(m) => {
                write!(
                    f,
                    "AppendResponse{{term: {}, success: {}, last_index: {}",
                    m.term, m.success, m.last_index
                )?;
                if let Some(c) = &m.conflict {
                    write!(f, ", conflict: {}", c)?;
                }
                write!(f, "}}")
            }
            Message::SnapshotRequired(m) => write!(
                f,
                "SnapshotRequired{{term: {}, leader: {}, snapshot: {}-{}}}",
                m.term, m.leader, m.snapshot_term, m.snapshot_index
            ),
        }
    }
}

/// Asks whether the receiver would vote for `candidate` if it started an
/// election.
///
/// `term` is the current term of the candidate. Receiving a poll never
/// changes the term of the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollRequest {
    pub term: Term,
    pub candidate: NodeId,
    pub last_log_index: Index,
    pub last_log_term: Term,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResponse {
    pub term: Term,
    pub accepted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteRequest {
    pub term: Term,
    pub candidate: NodeId,
    pub last_log_index: Index,
    pub last_log_term: Term,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteResponse {
    pub term: Term,
    pub granted: bool,
}

/// Replicates entries following `prev_index`, or is a heartbeat if `entries`
/// is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendRequest {
    pub term: Term,
    pub leader: NodeId,
    pub prev_index: Index,
    pub prev_term: Term,
    pub entries: Vec<JournalRecord>,
    pub commit_index: Index,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendResponse {
    pub term: Term,
    pub success: bool,

    /// On success the last index known to match the leader, otherwise a hint
    /// of the last index the follower may match.
    pub last_index: Index,

    pub conflict: Option<LogInconsistency>,
}

/// The entries a follower needs are compacted on the leader.
///
/// The receiver has to obtain a snapshot covering up to `snapshot_index` out
/// of band and install it with `install_snapshot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRequired {
    pub term: Term,
    pub leader: NodeId,
    pub snapshot_index: Index,
    pub snapshot_term: Term,
}

macro_rules! impl_from_message {
    ($($t:ident),*) => {
        $(
            impl From<$t> for Message {
                fn from(m: $t) -> Self {
                    Message::$t(m)
                }
            }
        )*
    };
}

impl_from_message!(
    PollRequest,
    PollResponse,
    VoteRequest,
    VoteResponse,
    AppendRequest,
    AppendResponse,
    SnapshotRequired
);
