//! Configuration structures
//!
//! Plain values only; loading from files and the environment lives in
//! `solrfeed-infra::config`. Every section defaults to the values a freshly
//! bootstrapped config file carries.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_COLLECTION, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_CONTEXT,
    DEFAULT_DEAD_LETTER_PATH, DEFAULT_IDLE_CONNECTION_TIMEOUT_SECS, DEFAULT_MAX_IDLE_CONNECTIONS,
    DEFAULT_MAX_RETRIES, DEFAULT_PROCESS_INTERVAL_SECS, DEFAULT_RESPONSE_TIMEOUT_SECS,
    DEFAULT_RETRY_INTERVAL_SECS, DEFAULT_SOLR_URL, DEFAULT_TICKET_LIFETIME_SECS,
    DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECS, DEFAULT_WAKE_INTERVAL_SECS,
};
use crate::{FeedError, Result};

/// Root configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub solr: TargetConfig,
    pub security: SecurityConfig,
    pub batch: BatchConfig,
    pub generator: GeneratorConfig,
}

impl FeedConfig {
    /// Reject configurations that can never work, before any I/O happens.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.solr.validate()?;
        self.batch.validate()?;
        if self.security.kerberos.is_some() && self.security.basic.is_some() {
            return Err(FeedError::Config(
                "security.kerberos and security.basic are mutually exclusive".into(),
            ));
        }
        if let Some(krb) = &self.security.kerberos {
            krb.validate()?;
        }
        Ok(())
    }
}

/// Where documents go: base URL, optional context, collection, TLS and
/// connection settings. Immutable once the transport is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Base URL, e.g. `http://localhost:8983`
    pub url: String,
    /// Path context between the base URL and the collection, e.g. `/solr`
    pub context: String,
    pub collection: String,
    /// Refuse plain-http connections
    pub tls_enabled: bool,
    /// Skip certificate verification
    pub insecure: bool,
    /// Extra PEM root certificate to trust
    pub ca_cert: Option<PathBuf>,
    /// Route through the proxy named by `HTTP(S)_PROXY`
    pub use_env_proxy: bool,
    pub connect_timeout_secs: u64,
    pub response_timeout_secs: u64,
    pub tls_handshake_timeout_secs: u64,
    pub max_idle_connections: usize,
    pub idle_connection_timeout_secs: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOLR_URL.to_string(),
            context: DEFAULT_CONTEXT.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            tls_enabled: false,
            insecure: false,
            ca_cert: None,
            use_env_proxy: false,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            response_timeout_secs: DEFAULT_RESPONSE_TIMEOUT_SECS,
            tls_handshake_timeout_secs: DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECS,
            max_idle_connections: DEFAULT_MAX_IDLE_CONNECTIONS,
            idle_connection_timeout_secs: DEFAULT_IDLE_CONNECTION_TIMEOUT_SECS,
        }
    }
}

impl TargetConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Budget for one request/response exchange once connected
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    pub fn tls_handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.tls_handshake_timeout_secs)
    }

    pub fn idle_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_connection_timeout_secs)
    }

    /// Parsed base URL
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Config`] if `url` is not an absolute http(s) URL.
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.url)
            .map_err(|e| FeedError::Config(format!("invalid solr.url '{}': {e}", self.url)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(FeedError::Config(format!("unsupported scheme '{other}' in solr.url"))),
        }
    }

    /// `{url}[{context}]/{collection}/{suffix}`
    pub fn collection_uri(&self, suffix: &str) -> String {
        let base = self.url.trim_end_matches('/');
        let context = self.context.trim_matches('/');
        let collection = self.collection.trim_matches('/');
        let suffix = suffix.trim_start_matches('/');
        if context.is_empty() {
            format!("{base}/{collection}/{suffix}")
        } else {
            format!("{base}/{context}/{collection}/{suffix}")
        }
    }

    fn validate(&self) -> Result<()> {
        let url = self.base_url()?;
        if self.tls_enabled && url.scheme() != "https" {
            return Err(FeedError::Config(
                "solr.tls_enabled requires an https:// solr.url".into(),
            ));
        }
        if self.collection.trim().is_empty() {
            return Err(FeedError::Config("solr.collection must not be empty".into()));
        }
        Ok(())
    }
}

/// Authentication material. At most one of the two is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub kerberos: Option<KerberosConfig>,
    pub basic: Option<BasicAuthConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KerberosConfig {
    pub keytab: PathBuf,
    pub principal: String,
    pub realm: String,
    pub krb5_conf: PathBuf,
    /// Target service principal; defaults to `HTTP/<solr host>@<realm>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_principal: Option<String>,
    /// How long a ticket is trusted before logging in again
    #[serde(default = "default_ticket_lifetime_secs")]
    pub ticket_lifetime_secs: u64,
}

const fn default_ticket_lifetime_secs() -> u64 {
    DEFAULT_TICKET_LIFETIME_SECS
}

impl KerberosConfig {
    /// Principal qualified with the realm unless it already carries one.
    pub fn qualified_principal(&self) -> String {
        if self.principal.contains('@') || self.realm.is_empty() {
            self.principal.clone()
        } else {
            format!("{}@{}", self.principal, self.realm)
        }
    }

    /// Service principal for `host`, explicit setting first.
    pub fn service_principal_for(&self, host: &str) -> String {
        self.service_principal.clone().unwrap_or_else(|| {
            if self.realm.is_empty() {
                format!("HTTP/{host}")
            } else {
                format!("HTTP/{host}@{}", self.realm)
            }
        })
    }

    pub fn ticket_lifetime(&self) -> Duration {
        Duration::from_secs(self.ticket_lifetime_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.principal.trim().is_empty() {
            return Err(FeedError::Config("security.kerberos.principal must not be empty".into()));
        }
        if self.keytab.as_os_str().is_empty() || self.krb5_conf.as_os_str().is_empty() {
            return Err(FeedError::Config(
                "security.kerberos.keytab and krb5_conf must be set".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuthConfig {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What happens to a snapshot whose delivery exhausted its retries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log and discard
    #[default]
    Drop,
    /// Put the records back at the front of the buffer
    Requeue,
    /// Append the records to a JSON-lines file
    DeadLetter,
}

/// Batch buffer thresholds and retry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Append that reaches this size triggers a flush
    pub max_size: usize,
    /// Retries after the first failed attempt; 0 retries forever
    pub max_retries: u32,
    pub retry_interval_secs: u64,
    /// Run the background idle-flush loop
    pub time_based: bool,
    /// Idle time after which the timer flushes
    pub process_interval_secs: u64,
    /// How often the timer checks idleness
    pub wake_interval_secs: u64,
    /// Ask the service to commit after each update
    pub commit: bool,
    pub on_failure: FailurePolicy,
    pub dead_letter_path: PathBuf,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_interval_secs: DEFAULT_RETRY_INTERVAL_SECS,
            time_based: true,
            process_interval_secs: DEFAULT_PROCESS_INTERVAL_SECS,
            wake_interval_secs: DEFAULT_WAKE_INTERVAL_SECS,
            commit: false,
            on_failure: FailurePolicy::Drop,
            dead_letter_path: PathBuf::from(DEFAULT_DEAD_LETTER_PATH),
        }
    }
}

impl BatchConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn process_interval(&self) -> Duration {
        Duration::from_secs(self.process_interval_secs)
    }

    pub fn wake_interval(&self) -> Duration {
        Duration::from_secs(self.wake_interval_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(FeedError::Config("batch.max_size must be greater than 0".into()));
        }
        if self.time_based && self.wake_interval_secs == 0 {
            return Err(FeedError::Config(
                "batch.wake_interval_secs must be greater than 0 when time_based is on".into(),
            ));
        }
        Ok(())
    }
}

/// Shape of the synthetic log documents the `generate` command produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub num_writes: usize,
    pub docs_per_write: usize,
    pub cluster_field: String,
    pub cluster_count: u32,
    pub filterable_field: String,
    pub filterable_count: u32,
    pub level_field: String,
    pub levels: Vec<String>,
    pub type_field: String,
    pub types: Vec<String>,
    pub date_field: String,
    pub message_fields: Vec<String>,
    pub numeric_fields: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
        Self {
            num_writes: 10,
            docs_per_write: 1000,
            cluster_field: "cluster".into(),
            cluster_count: 10,
            filterable_field: "host".into(),
            filterable_count: 1000,
            level_field: "level".into(),
            levels: strings(&["INFO", "DEBUG", "FATAL", "WARN", "ERROR", "UNKNOWN", "TRACE"]),
            type_field: "type".into(),
            types: strings(&[
                "ambari_server",
                "ambari_agent",
                "ambari_config",
                "ambari_eclipselink",
                "hdfs_name_node",
                "hdfs_secondary_name_node",
            ]),
            date_field: "logtime".into(),
            message_fields: strings(&["log_message"]),
            numeric_fields: strings(&["seq_num"]),
        }
    }
}
