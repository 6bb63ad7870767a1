//! # solrfeed Infrastructure
//!
//! Infrastructure implementations of the core ports.
//!
//! This crate contains:
//! - The pooled HTTP client and the Solr transport built on it
//! - Basic and Kerberos/SPNEGO authentication
//! - The [`solr::SolrBatchSink`] the batch processor delivers through
//! - Configuration loading and the background flush scheduler
//!
//! ## Architecture
//! - Implements [`solrfeed_core::BatchSink`]
//! - Depends on `solrfeed-common`, `solrfeed-domain` and `solrfeed-core`
//! - Contains all "impure" code (network, filesystem, GSSAPI)

pub mod auth;
pub mod config;
pub mod errors;
pub mod http;
pub mod scheduling;
pub mod solr;

// Re-export commonly used items
pub use auth::{default_provider, AuthSession, CredentialProvider, KerberosTicket};
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use scheduling::{FlushScheduler, SchedulerError};
pub use solr::{SolrBatchSink, SolrClient, SolrQuery};
