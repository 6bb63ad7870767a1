//! Authenticated Solr transport
//!
//! Issues update (write) and select (read) requests against one collection.
//! Each call is a single attempt; retrying is left to the caller so the
//! batch processor and the CLI can apply their own policy.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use solrfeed_domain::{
    FeedConfig, FeedError, Record, SecurityConfig, SolrResponse, TargetConfig,
};
use tracing::{debug, instrument, warn};
use url::Url;

use super::query::SolrQuery;
use crate::auth::{default_provider, AuthSession, CredentialProvider};
use crate::errors::{status_error, InfraError};
use crate::http::HttpClient;

const JSON: &str = "application/json";

/// Client for a single Solr collection
#[derive(Debug)]
pub struct SolrClient {
    http: HttpClient,
    target: TargetConfig,
    session: AuthSession,
}

impl SolrClient {
    /// Create a client for `target`
    ///
    /// # Arguments
    ///
    /// * `target` - Solr URL, collection and connection settings
    /// * `security` - Kerberos or basic credentials, if any
    /// * `provider` - Kerberos implementation used by [`login`](Self::login)
    ///
    /// # Errors
    ///
    /// [`FeedError::Config`] for an unusable URL, CA certificate or
    /// conflicting credentials.
    pub fn new(
        target: &TargetConfig,
        security: &SecurityConfig,
        provider: Arc<dyn CredentialProvider>,
    ) -> Result<Self, FeedError> {
        let base = target.base_url()?;
        let host = base
            .host_str()
            .ok_or_else(|| FeedError::Config(format!("solr.url '{}' has no host", target.url)))?;

        let session = AuthSession::new(security, host, provider)?;
        let http = HttpClient::for_target(target)?;
        debug!(
            url = %base,
            collection = %target.collection,
            auth = session.method_name(),
            "solr client created"
        );

        Ok(Self { http, target: target.clone(), session })
    }

    /// Client for a full configuration with the build's default provider
    pub fn from_config(config: &FeedConfig) -> Result<Self, FeedError> {
        Self::new(&config.solr, &config.security, default_provider())
    }

    pub fn target(&self) -> &TargetConfig {
        &self.target
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn collection_uri(&self, suffix: &str) -> String {
        self.target.collection_uri(suffix)
    }

    /// Authenticate up front. Only Kerberos does any work here; a failure
    /// is returned as is and never retried internally.
    pub async fn login(&self) -> Result<(), FeedError> {
        self.session.login().await
    }

    /// Submit `records` as one JSON array to the `update` endpoint.
    ///
    /// `commit` asks Solr to make the documents searchable immediately.
    pub async fn update(
        &self,
        records: &[Record],
        commit: bool,
    ) -> Result<SolrResponse, FeedError> {
        let body = serde_json::to_vec(records)
            .map_err(|e| FeedError::Internal(format!("failed to encode batch: {e}")))?;
        let mut uri = self.collection_uri("update");
        if commit {
            uri.push_str("?commit=true");
        }
        self.send(Method::POST, &uri, Some(body), true).await
    }

    /// Run a `select` with the given parameters.
    pub async fn query(&self, query: &SolrQuery) -> Result<SolrResponse, FeedError> {
        let mut uri = self.collection_uri("select");
        if !query.is_empty() {
            uri.push('?');
            uri.push_str(&query.encode());
        }
        self.send(Method::POST, &uri, None, false).await
    }

    /// Issue one request and decode the response envelope.
    ///
    /// A Kerberos 401 drops the cached ticket and the request is sent once
    /// more with a fresh login. Any other rejection is returned as is.
    ///
    /// # Errors
    ///
    /// - non-2xx status: mapped by [`status_error`]; 401/403 are
    ///   [`FeedError::Auth`] and never worth a retry
    /// - 2xx with a body that is not a Solr envelope: [`FeedError::Decode`]
    /// - envelope with a non-zero `responseHeader.status`: [`FeedError::Server`]
    #[instrument(
        level = "debug",
        skip(self, body),
        fields(bytes = body.as_ref().map_or(0, Vec::len))
    )]
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Vec<u8>>,
        is_write: bool,
    ) -> Result<SolrResponse, FeedError> {
        let url = Url::parse(uri)
            .map_err(|e| FeedError::Config(format!("invalid request URI '{uri}': {e}")))?;

        match self.exchange(&method, &url, body.as_deref(), is_write).await {
            Ok(envelope) => Ok(envelope),
            Err(Rejected::Other(err)) => Err(err),
            Err(Rejected::Ticket(err)) => {
                debug!(error = %err, "kerberos ticket rejected, sending again after login");
                self.exchange(&method, &url, body.as_deref(), is_write)
                    .await
                    .map_err(Rejected::into_inner)
            }
        }
    }

    async fn exchange(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&[u8]>,
        is_write: bool,
    ) -> Result<SolrResponse, Rejected> {
        let mut request = self.http.request(method.clone(), url.clone()).header(CONTENT_TYPE, JSON);
        if let Some(value) = self.session.authorization_header().await? {
            request = request.header(AUTHORIZATION, value);
        }
        if let Some(body) = body {
            request = request.body(body.to_vec());
        }

        let response = self.http.send(request).await?;
        let status = response.status();
        let payload = response.bytes().await.map_err(|e| FeedError::from(InfraError::from(e)))?;

        if !status.is_success() {
            let err = status_error(status, &String::from_utf8_lossy(&payload));
            warn!(
                status = status.as_u16(),
                category = err.category().as_str(),
                write = is_write,
                "solr request rejected"
            );
            if status == StatusCode::UNAUTHORIZED && self.session.is_kerberos() {
                self.session.invalidate();
                return Err(Rejected::Ticket(err));
            }
            return Err(err.into());
        }

        let envelope: SolrResponse = serde_json::from_slice(&payload).map_err(|e| {
            FeedError::Decode(format!("response from {url} is not a Solr envelope: {e}"))
        })?;

        if let Some(code) = envelope.status().filter(|s| *s != 0) {
            return Err(FeedError::Server {
                status: u16::try_from(code).unwrap_or(500),
                message: format!("Solr reported status {code} for {url}"),
            }
            .into());
        }

        debug!(
            status = status.as_u16(),
            qtime = envelope.header.as_ref().and_then(|h| h.qtime),
            write = is_write,
            "solr request succeeded"
        );
        Ok(envelope)
    }
}

enum Rejected {
    /// 401 on a Kerberos session; the cached ticket is already gone
    Ticket(FeedError),
    Other(FeedError),
}

impl Rejected {
    fn into_inner(self) -> FeedError {
        match self {
            Self::Ticket(err) | Self::Other(err) => err,
        }
    }
}

impl From<FeedError> for Rejected {
    fn from(err: FeedError) -> Self {
        Self::Other(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UnsupportedProvider;

    fn target(url: &str) -> TargetConfig {
        TargetConfig { url: url.into(), ..TargetConfig::default() }
    }

    #[test]
    fn builds_collection_uris() {
        let client = SolrClient::new(
            &target("http://solr.example.com:8983"),
            &SecurityConfig::default(),
            Arc::new(UnsupportedProvider),
        )
        .unwrap();
        assert_eq!(
            client.collection_uri("update"),
            "http://solr.example.com:8983/solr/hadoop_logs/update"
        );
    }

    #[test]
    fn rejects_url_without_http_scheme() {
        let result = SolrClient::new(
            &target("ftp://solr.example.com"),
            &SecurityConfig::default(),
            Arc::new(UnsupportedProvider),
        );
        assert!(matches!(result, Err(FeedError::Config(_))));
    }

    #[tokio::test]
    async fn kerberos_without_provider_fails_login_as_config() {
        let keytab = tempfile::NamedTempFile::new().unwrap();
        let krb5 = tempfile::NamedTempFile::new().unwrap();
        let security = SecurityConfig {
            kerberos: Some(solrfeed_domain::KerberosConfig {
                keytab: keytab.path().to_path_buf(),
                principal: "feeder".into(),
                realm: "EXAMPLE.COM".into(),
                krb5_conf: krb5.path().to_path_buf(),
                service_principal: None,
                ticket_lifetime_secs: 60,
            }),
            basic: None,
        };
        let client = SolrClient::new(
            &target("http://localhost:8983"),
            &security,
            Arc::new(UnsupportedProvider),
        )
        .unwrap();
        assert!(matches!(client.login().await, Err(FeedError::Config(_))));
    }
}
