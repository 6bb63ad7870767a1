use std::path::Path;
use std::time::Duration;

use reqwest::{Certificate, Client as ReqwestClient, Method, RequestBuilder, Response};
use solrfeed_domain::{FeedError, TargetConfig};
use tracing::debug;

use crate::errors::InfraError;

const USER_AGENT: &str = concat!("solrfeed/", env!("CARGO_PKG_VERSION"));

/// Pooled HTTP client with connect/response timeouts.
///
/// Sends exactly once; retries belong to the caller's retry policy.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, FeedError> {
        Self::builder().build()
    }

    /// Client tuned for a target: pool size, timeouts, TLS policy.
    ///
    /// # Errors
    ///
    /// [`FeedError::Config`] if the CA certificate cannot be read or parsed.
    pub fn for_target(target: &TargetConfig) -> Result<Self, FeedError> {
        let mut builder = Self::builder()
            .timeout(target.response_timeout())
            .connect_timeout(target.connect_timeout() + target.tls_handshake_timeout())
            .pool_max_idle_per_host(target.max_idle_connections)
            .pool_idle_timeout(target.idle_connection_timeout())
            .https_only(target.tls_enabled)
            .accept_invalid_certs(target.insecure)
            .use_env_proxy(target.use_env_proxy);

        if let Some(path) = &target.ca_cert {
            builder = builder.root_certificate_pem(read_pem(path)?);
        }

        builder.build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the provided request builder once.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, FeedError> {
        let request = builder.build().map_err(|err| FeedError::from(InfraError::from(err)))?;

        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending HTTP request");

        match self.client.execute(request).await {
            Ok(response) => {
                debug!(%method, %url, status = %response.status(), "received HTTP response");
                Ok(response)
            }
            Err(err) => {
                debug!(%method, %url, error = %err, "HTTP request failed");
                Err(InfraError::from(err).into())
            }
        }
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, FeedError> {
    std::fs::read(path).map_err(|e| {
        FeedError::Config(format!("cannot read CA certificate {}: {e}", path.display()))
    })
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    connect_timeout: Duration,
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Duration,
    accept_invalid_certs: bool,
    https_only: bool,
    use_env_proxy: bool,
    root_certificate_pem: Option<Vec<u8>>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_max_idle_per_host: 100,
            pool_idle_timeout: Duration::from_secs(30),
            accept_invalid_certs: false,
            https_only: false,
            use_env_proxy: false,
            root_certificate_pem: None,
        }
    }
}

impl HttpClientBuilder {
    /// Whole-request budget once the request is sent
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Budget for TCP connect plus TLS handshake
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Skip certificate verification (self-signed test clusters).
    pub fn accept_invalid_certs(mut self, enabled: bool) -> Self {
        self.accept_invalid_certs = enabled;
        self
    }

    pub fn https_only(mut self, enabled: bool) -> Self {
        self.https_only = enabled;
        self
    }

    /// Honor `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY`; off by default
    pub fn use_env_proxy(mut self, enabled: bool) -> Self {
        self.use_env_proxy = enabled;
        self
    }

    pub fn root_certificate_pem(mut self, pem: Vec<u8>) -> Self {
        self.root_certificate_pem = Some(pem);
        self
    }

    pub fn build(self) -> Result<HttpClient, FeedError> {
        let mut builder = ReqwestClient::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .pool_idle_timeout(self.pool_idle_timeout)
            .https_only(self.https_only)
            .user_agent(USER_AGENT);

        if !self.use_env_proxy {
            builder = builder.no_proxy();
        }

        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(pem) = self.root_certificate_pem {
            let cert = Certificate::from_pem(&pem)
                .map_err(|e| FeedError::Config(format!("invalid CA certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder
            .build()
            .map_err(|e| FeedError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(HttpClient { client })
    }
}
