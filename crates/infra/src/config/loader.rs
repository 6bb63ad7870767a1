//! Configuration loader
//!
//! Reads a TOML (or JSON, by extension) file and applies `SOLRFEED_*`
//! environment overrides on top.
//!
//! ## Environment Variables
//! - `SOLRFEED_SOLR_URL`, `SOLRFEED_SOLR_CONTEXT`, `SOLRFEED_SOLR_COLLECTION`
//! - `SOLRFEED_TLS_ENABLED`, `SOLRFEED_TLS_INSECURE` (true/false)
//! - `SOLRFEED_CONNECT_TIMEOUT`: connect timeout in seconds
//! - `SOLRFEED_BATCH_SIZE`, `SOLRFEED_MAX_RETRIES`, `SOLRFEED_RETRY_INTERVAL`
//! - `SOLRFEED_TIME_BASED` (true/false), `SOLRFEED_PROCESS_INTERVAL`
//! - `SOLRFEED_BASIC_USERNAME` + `SOLRFEED_BASIC_PASSWORD`: basic auth
//!   credentials, so the password can stay out of the file

use std::path::Path;
use std::str::FromStr;

use solrfeed_domain::{BasicAuthConfig, FeedConfig, FeedError, Result};

/// Commented configuration written when none exists yet. Parses to
/// `FeedConfig::default()`.
pub const DEFAULT_CONFIG: &str = r#"# solrfeed configuration

[solr]
url = "http://localhost:8983"
context = "/solr"
collection = "hadoop_logs"
tls_enabled = false
# Skip certificate verification
insecure = false
# ca_cert = "/etc/pki/solr-ca.pem"
use_env_proxy = false
connect_timeout_secs = 60
response_timeout_secs = 10
tls_handshake_timeout_secs = 10
max_idle_connections = 100
idle_connection_timeout_secs = 30

# Kerberos (SPNEGO); mutually exclusive with [security.basic]
# [security.kerberos]
# keytab = "/tmp/solr.keytab"
# principal = "solr/myhostname"
# realm = "EXAMPLE.COM"
# krb5_conf = "/tmp/krb5.conf"
# service_principal = "HTTP/solr.example.com@EXAMPLE.COM"

# [security.basic]
# username = "solr"
# password = "SolrRocks"

[batch]
max_size = 1000
# 0 retries forever
max_retries = 20
retry_interval_secs = 10
time_based = true
process_interval_secs = 30
wake_interval_secs = 1
commit = false
# drop | requeue | dead_letter
on_failure = "drop"
dead_letter_path = "solrfeed-dead-letter.jsonl"

[generator]
num_writes = 10
docs_per_write = 1000
cluster_field = "cluster"
cluster_count = 10
filterable_field = "host"
filterable_count = 1000
level_field = "level"
levels = ["INFO", "DEBUG", "FATAL", "WARN", "ERROR", "UNKNOWN", "TRACE"]
type_field = "type"
types = [
    "ambari_server",
    "ambari_agent",
    "ambari_config",
    "ambari_eclipselink",
    "hdfs_name_node",
    "hdfs_secondary_name_node",
]
date_field = "logtime"
message_fields = ["log_message"]
numeric_fields = ["seq_num"]
"#;

/// Load `path`, apply environment overrides and validate.
///
/// # Errors
/// Returns `FeedError::Config` if the file is missing or malformed, an
/// override does not parse, or the result fails validation.
pub fn load(path: &Path) -> Result<FeedConfig> {
    let mut config = load_from_file(path)?;
    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load a configuration file without overrides or validation
///
/// Format is detected by extension: `.json` is JSON, anything else TOML.
///
/// # Errors
/// Returns `FeedError::Config` if the file cannot be read or parsed.
pub fn load_from_file(path: &Path) -> Result<FeedConfig> {
    if !path.exists() {
        return Err(FeedError::Config(format!("Config file not found: {}", path.display())));
    }

    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| FeedError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, path)
}

fn parse_config(contents: &str, path: &Path) -> Result<FeedConfig> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(contents)
            .map_err(|e| FeedError::Config(format!("Invalid JSON format: {e}"))),
        _ => toml::from_str(contents)
            .map_err(|e| FeedError::Config(format!("Invalid TOML format: {e}"))),
    }
}

/// Write [`DEFAULT_CONFIG`] to `path`, creating parent directories.
///
/// # Errors
/// Returns `FeedError::Config` if the file already exists or cannot be
/// written.
pub fn write_default(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(FeedError::Config(format!(
            "Refusing to overwrite existing config file: {}",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| FeedError::Config(format!("Failed to create {}: {e}", parent.display())))?;
    }
    std::fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| FeedError::Config(format!("Failed to write config file: {e}")))?;

    tracing::info!(path = %path.display(), "Default configuration written");
    Ok(())
}

/// Apply `SOLRFEED_*` variables on top of `config`.
///
/// # Errors
/// Returns `FeedError::Config` for values that do not parse.
pub fn apply_env_overrides(config: &mut FeedConfig) -> Result<()> {
    if let Some(url) = env_opt("SOLRFEED_SOLR_URL") {
        config.solr.url = url;
    }
    if let Some(context) = env_opt("SOLRFEED_SOLR_CONTEXT") {
        config.solr.context = context;
    }
    if let Some(collection) = env_opt("SOLRFEED_SOLR_COLLECTION") {
        config.solr.collection = collection;
    }
    config.solr.tls_enabled = env_bool("SOLRFEED_TLS_ENABLED", config.solr.tls_enabled);
    config.solr.insecure = env_bool("SOLRFEED_TLS_INSECURE", config.solr.insecure);
    if let Some(secs) = env_parse("SOLRFEED_CONNECT_TIMEOUT")? {
        config.solr.connect_timeout_secs = secs;
    }

    if let Some(size) = env_parse("SOLRFEED_BATCH_SIZE")? {
        config.batch.max_size = size;
    }
    if let Some(retries) = env_parse("SOLRFEED_MAX_RETRIES")? {
        config.batch.max_retries = retries;
    }
    if let Some(secs) = env_parse("SOLRFEED_RETRY_INTERVAL")? {
        config.batch.retry_interval_secs = secs;
    }
    config.batch.time_based = env_bool("SOLRFEED_TIME_BASED", config.batch.time_based);
    if let Some(secs) = env_parse("SOLRFEED_PROCESS_INTERVAL")? {
        config.batch.process_interval_secs = secs;
    }

    match (env_opt("SOLRFEED_BASIC_USERNAME"), env_opt("SOLRFEED_BASIC_PASSWORD")) {
        (Some(username), Some(password)) => {
            config.security.basic = Some(BasicAuthConfig { username, password });
        }
        (None, None) => {}
        _ => {
            return Err(FeedError::Config(
                "SOLRFEED_BASIC_USERNAME and SOLRFEED_BASIC_PASSWORD must be set together".into(),
            ))
        }
    }

    Ok(())
}

/// Non-empty environment variable
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| FeedError::Config(format!("Invalid {key}: {e}")))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
