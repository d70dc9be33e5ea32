//! Search layer facade.
//!
//! - **[`tantivy`]**: component index schema, field handles and the index writer.
//! - **[`query`]**: policy query accumulation, preview filter, repository scoping and sort specs.
//! - **[`engine`]**: the [`engine::SearchEngine`] boundary and its tantivy implementation.
//! - **[`cursor`]**: lazy segment cursor backing unbounded browsing.

pub mod cursor;
pub mod engine;
pub mod query;
pub mod tantivy;
