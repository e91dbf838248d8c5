//! Replicated journal for a partition of a distributed log:
//! a segmented, checksummed on-disk journal replicated between the members
//! of a partition by the raft consensus protocol.
//!
//! ## Features
//!
//! - Records addressed by a dense index and carrying an application sequence
//!   number (asqn), stored in fixed-size segment files
//! - Detection and repair of torn writes at the end of the journal on open
//! - Readers over all records or only over committed ones, that observe
//!   appends, commits and truncations made while they are open
//! - Compaction of whole segments below a snapshot boundary
//! - Leader election, log replication and commit tracking driven by logical
//!   ticks, with persisted term and vote
//! - Partition startup and shutdown on a small lane based scheduler
//!
//! ## Example
//!
//! ```rust
//! # use std::sync::Arc;
//! use raft_journal::Config;
//! use raft_journal::Journal;
//!
//! let temp_dir = tempfile::tempdir().unwrap();
//! let config = Arc::new(Config::new(temp_dir.path().to_str().unwrap()));
//!
//! let mut journal = Journal::open(config).unwrap();
//!
//! let index = journal.append(5, b"hello").unwrap();
//! journal.flush().unwrap();
//! journal.set_commit_index(index).unwrap();
//!
//! let mut reader = journal.open_committed_reader();
//! let record = reader.next().unwrap().unwrap();
//!
//! assert_eq!(1, record.index);
//! assert_eq!(5, record.asqn);
//! assert_eq!(b"hello".to_vec(), record.data);
//! ```

mod config;

pub(crate) mod file_io;
pub(crate) mod file_lock;
pub(crate) mod num;
pub(crate) mod offset_reader;
#[cfg(test)]
pub(crate) mod testing;

pub mod api;
pub mod codec;
pub mod dump_writer;
pub mod errors;
pub mod journal;
pub mod partition;
pub mod raft;
pub mod scheduler;
pub mod segment;
pub mod types;

pub use codeq;

pub use api::callback::Callback;
pub use api::callback::CommitResult;
pub use codec::JournalRecord;
pub use codec::RecordCodec;
pub use config::Config;
pub use errors::JournalError;
pub use journal::Dump;
pub use journal::Journal;
pub use journal::JournalReader;
pub use journal::JournalStat;
pub use journal::SegmentStat;
pub use partition::Partition;
pub use partition::PartitionContext;
pub use partition::PartitionHealth;
pub use partition::PartitionLifecycle;
pub use partition::Transport;
pub use raft::Envelope;
pub use raft::RaftNode;
pub use raft::RaftRole;
pub use scheduler::ScheduledFuture;
pub use scheduler::Scheduler;
pub use segment::SegmentId;
pub use types::ASQN_IGNORE;

#[cfg(test)]
mod tests;
