//! # solrfeed Domain
//!
//! Domain types shared by every solrfeed crate.
//!
//! This crate contains:
//! - [`Record`], the document unit fed to the search service
//! - The [`SolrResponse`] envelope returned by update and select calls
//! - [`FeedError`] and the [`Result`] alias
//! - Configuration structures and their defaults
//!
//! ## Architecture
//! - No dependencies on other solrfeed crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod record;
pub mod response;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use record::Record;
pub use response::{ResponseHeader, ResultSet, SolrResponse};
