//! Interfaces between the replicated journal and its users.

pub mod callback;
