//! Shared fixtures for the Solr integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use solrfeed_common::RetryConfig;
use solrfeed_core::ProcessorConfig;
use solrfeed_domain::{BasicAuthConfig, FeedError, KerberosConfig, SecurityConfig, TargetConfig};
use solrfeed_infra::auth::{CredentialProvider, KerberosTicket, UnsupportedProvider};
use solrfeed_infra::SolrClient;
use tempfile::NamedTempFile;
use wiremock::MockServer;

pub const UPDATE_PATH: &str = "/solr/logs/update";
pub const SELECT_PATH: &str = "/solr/logs/select";
pub const UPDATE_OK: &str = r#"{"responseHeader":{"status":0,"QTime":3}}"#;

pub fn target_for(server: &MockServer) -> TargetConfig {
    TargetConfig {
        url: server.uri(),
        collection: "logs".into(),
        response_timeout_secs: 2,
        ..TargetConfig::default()
    }
}

pub fn client_for(server: &MockServer) -> Arc<SolrClient> {
    client_with_security(server, &SecurityConfig::default())
}

pub fn client_with_security(server: &MockServer, security: &SecurityConfig) -> Arc<SolrClient> {
    client_with_provider(server, security, Arc::new(UnsupportedProvider))
}

pub fn client_with_provider(
    server: &MockServer,
    security: &SecurityConfig,
    provider: Arc<dyn CredentialProvider>,
) -> Arc<SolrClient> {
    Arc::new(
        SolrClient::new(&target_for(server), security, provider)
            .expect("solr client should build"),
    )
}

pub fn basic_auth() -> SecurityConfig {
    SecurityConfig {
        kerberos: None,
        basic: Some(BasicAuthConfig { username: "solr".into(), password: "SolrRocks".into() }),
    }
}

/// Size-triggered only, fast retries
pub fn processor_config(max_size: usize, max_retries: u32) -> ProcessorConfig {
    ProcessorConfig {
        max_size,
        retry: RetryConfig::new(max_retries, Duration::from_millis(10)),
        time_based: false,
        process_interval: Duration::from_secs(30),
        wake_interval: Duration::from_secs(1),
    }
}

/// Keytab and krb5.conf stand-ins; only their readability is checked
pub struct KerberosFiles {
    keytab: NamedTempFile,
    krb5_conf: NamedTempFile,
}

impl KerberosFiles {
    pub fn new() -> Self {
        Self {
            keytab: NamedTempFile::new().expect("keytab"),
            krb5_conf: NamedTempFile::new().expect("krb5.conf"),
        }
    }

    pub fn security(&self, ticket_lifetime_secs: u64) -> SecurityConfig {
        SecurityConfig {
            kerberos: Some(KerberosConfig {
                keytab: self.keytab.path().to_path_buf(),
                principal: "feeder".into(),
                realm: "EXAMPLE.COM".into(),
                krb5_conf: self.krb5_conf.path().to_path_buf(),
                service_principal: None,
                ticket_lifetime_secs,
            }),
            basic: None,
        }
    }
}

#[derive(Debug)]
struct StubTicket {
    token: String,
}

#[async_trait]
impl KerberosTicket for StubTicket {
    fn principal(&self) -> &str {
        "feeder@EXAMPLE.COM"
    }

    async fn negotiate_token(&self) -> Result<Vec<u8>, FeedError> {
        Ok(self.token.clone().into_bytes())
    }
}

/// Every login yields a ticket whose token is `ticket-<n>`
#[derive(Debug, Default)]
pub struct StubProvider {
    logins: AtomicUsize,
}

impl StubProvider {
    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for StubProvider {
    async fn login(
        &self,
        _config: &KerberosConfig,
        _service_principal: &str,
    ) -> Result<Arc<dyn KerberosTicket>, FeedError> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Arc::new(StubTicket { token: format!("ticket-{n}") }))
    }
}

/// `Authorization` value the stub's `n`th login produces
pub fn negotiate_header(n: usize) -> String {
    use base64::Engine as _;
    let token = base64::engine::general_purpose::STANDARD.encode(format!("ticket-{n}"));
    format!("Negotiate {token}")
}
