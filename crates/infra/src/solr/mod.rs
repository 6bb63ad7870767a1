//! Solr transport: query builder, authenticated client and batch sink

pub mod client;
pub mod query;
pub mod sink;

pub use client::SolrClient;
pub use query::SolrQuery;
pub use sink::SolrBatchSink;
