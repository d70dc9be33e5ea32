//! Data model shared by the query, search and storage layers.

pub mod types;

pub use types::{
    CleanupPolicy, Component, EntityId, PagedResponse, QueryOptions, Repository, SortDirection,
};
