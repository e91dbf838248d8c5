//! The consensus core: leader election and replication of journal records
//! between the members of a partition.

mod election_timer;
pub mod entry;
pub mod message;
pub mod meta_store;
mod pending;
mod progress;
mod raft_node;
mod role;

pub use entry::EntryKind;
pub use entry::RaftEntry;
pub use message::AppendRequest;
pub use message::AppendResponse;
pub use message::Envelope;
pub use message::Message;
pub use message::PollRequest;
pub use message::PollResponse;
pub use message::SnapshotRequired;
pub use message::VoteRequest;
pub use message::VoteResponse;
pub use meta_store::MetaStore;
pub use meta_store::RaftMeta;
pub use raft_node::RaftNode;
pub use role::RaftRole;
