//! Authoritative component storage.

pub mod sqlite;

pub use sqlite::{ComponentLookup, ComponentStore, StorageTx};
