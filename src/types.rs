//! Primitive types shared by the journal and the consensus core.

/// Position of a record in the journal.
///
/// Indexes are dense and start at 1 in a fresh journal. `0` means "no index".
pub type Index = u64;

/// Application sequence number attached to a record by its writer.
pub type Asqn = i64;

/// Raft election term.
pub type Term = u64;

/// Identity of a cluster member.
pub type NodeId = u64;

/// Asqn of a record that carries no application sequence number.
pub const ASQN_IGNORE: Asqn = -1;
