//! Default values
//!
//! Centralized location for the defaults a bootstrapped configuration file
//! carries.

// Target service
pub const DEFAULT_SOLR_URL: &str = "http://localhost:8983";
pub const DEFAULT_CONTEXT: &str = "/solr";
pub const DEFAULT_COLLECTION: &str = "hadoop_logs";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 60;

// Connection pool
pub const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_IDLE_CONNECTIONS: usize = 100;
pub const DEFAULT_IDLE_CONNECTION_TIMEOUT_SECS: u64 = 30;

// Kerberos
pub const DEFAULT_TICKET_LIFETIME_SECS: u64 = 8 * 60 * 60;

// Batch processing
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_MAX_RETRIES: u32 = 20;
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_PROCESS_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_WAKE_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_DEAD_LETTER_PATH: &str = "solrfeed-dead-letter.jsonl";
