//! Policy-driven cleanup browsing over a component search index.
//!
//! A cleanup policy is a set of named criteria. [`browse::CleanupComponentBrowse`]
//! translates those criteria into a search query through the
//! [`criteria::AppenderRegistry`], runs it against one repository, and either
//! streams matching component ids or returns a sorted, filtered page of
//! components resolved from the store.

pub mod browse;
pub mod config;
pub mod criteria;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod search;
pub mod storage;

pub use browse::{BrowseBackend, CleanupComponentBrowse, ComponentIds};
pub use error::{BrowseError, Result};
