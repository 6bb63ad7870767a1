//! Per-transport authentication state
//!
//! Holds the configured method and, for Kerberos, the cached ticket. Logins
//! are single-flight: concurrent callers that find no ticket wait on one
//! login instead of each hitting the KDC.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parking_lot::RwLock;
use solrfeed_domain::{BasicAuthConfig, FeedError, KerberosConfig, SecurityConfig};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::provider::{CredentialProvider, KerberosTicket};

#[derive(Debug)]
enum AuthMethod {
    None,
    Basic(BasicAuthConfig),
    Kerberos { config: KerberosConfig, service_principal: String },
}

#[derive(Debug, Clone)]
struct CachedTicket {
    ticket: Arc<dyn KerberosTicket>,
    acquired_at: Instant,
}

/// Authentication for one Solr target.
pub struct AuthSession {
    method: AuthMethod,
    provider: Arc<dyn CredentialProvider>,
    ticket: RwLock<Option<CachedTicket>>,
    login_lock: Mutex<()>,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("method", &self.method_name())
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl AuthSession {
    /// Session for `security` against the Solr host `host`.
    ///
    /// # Errors
    ///
    /// [`FeedError::Config`] when both Kerberos and basic auth are set.
    pub fn new(
        security: &SecurityConfig,
        host: &str,
        provider: Arc<dyn CredentialProvider>,
    ) -> Result<Self, FeedError> {
        let method = match (&security.kerberos, &security.basic) {
            (Some(_), Some(_)) => {
                return Err(FeedError::Config(
                    "kerberos and basic authentication are mutually exclusive".into(),
                ))
            }
            (Some(kerberos), None) => AuthMethod::Kerberos {
                service_principal: kerberos.service_principal_for(host),
                config: kerberos.clone(),
            },
            (None, Some(basic)) => AuthMethod::Basic(basic.clone()),
            (None, None) => AuthMethod::None,
        };

        Ok(Self { method, provider, ticket: RwLock::new(None), login_lock: Mutex::new(()) })
    }

    pub fn method_name(&self) -> &'static str {
        match self.method {
            AuthMethod::None => "none",
            AuthMethod::Basic(_) => "basic",
            AuthMethod::Kerberos { .. } => "kerberos",
        }
    }

    pub fn is_kerberos(&self) -> bool {
        matches!(self.method, AuthMethod::Kerberos { .. })
    }

    /// True when no login is needed or a ticket is cached.
    pub fn is_authenticated(&self) -> bool {
        match self.method {
            AuthMethod::Kerberos { .. } => self.ticket.read().is_some(),
            _ => true,
        }
    }

    /// Obtain a Kerberos ticket from the keytab. No-op for other methods.
    ///
    /// # Errors
    ///
    /// [`FeedError::Config`] when the keytab or krb5.conf is unreadable,
    /// [`FeedError::Auth`] when the KDC rejects the login.
    pub async fn login(&self) -> Result<(), FeedError> {
        let AuthMethod::Kerberos { config, service_principal } = &self.method else {
            return Ok(());
        };

        let _guard = self.login_lock.lock().await;
        self.login_locked(config, service_principal).await
    }

    async fn login_locked(
        &self,
        config: &KerberosConfig,
        service_principal: &str,
    ) -> Result<(), FeedError> {
        ensure_readable(&config.keytab, "keytab")?;
        ensure_readable(&config.krb5_conf, "krb5.conf")?;

        let ticket = self.provider.login(config, service_principal).await?;
        info!(principal = ticket.principal(), spn = service_principal, "kerberos ticket acquired");
        *self.ticket.write() = Some(CachedTicket { ticket, acquired_at: Instant::now() });
        Ok(())
    }

    /// Drop the cached ticket so the next request logs in again.
    pub fn invalidate(&self) {
        if self.ticket.write().take().is_some() {
            warn!("kerberos ticket invalidated");
        }
    }

    /// `Authorization` header value for the next request, if any.
    ///
    /// Kerberos logs in lazily when no ticket is cached or the cached one is
    /// older than the configured lifetime.
    pub async fn authorization_header(&self) -> Result<Option<String>, FeedError> {
        match &self.method {
            AuthMethod::None => Ok(None),
            AuthMethod::Basic(basic) => {
                let credentials = format!("{}:{}", basic.username, basic.password);
                Ok(Some(format!("Basic {}", STANDARD.encode(credentials))))
            }
            AuthMethod::Kerberos { config, service_principal } => {
                let ticket = self.current_ticket(config, service_principal).await?;
                let token = ticket.negotiate_token().await?;
                Ok(Some(format!("Negotiate {}", STANDARD.encode(token))))
            }
        }
    }

    async fn current_ticket(
        &self,
        config: &KerberosConfig,
        service_principal: &str,
    ) -> Result<Arc<dyn KerberosTicket>, FeedError> {
        if let Some(ticket) = self.fresh_ticket(config) {
            return Ok(ticket);
        }

        let _guard = self.login_lock.lock().await;
        // Another caller may have logged in while we waited
        if let Some(ticket) = self.fresh_ticket(config) {
            return Ok(ticket);
        }

        debug!("no valid kerberos ticket, logging in");
        self.login_locked(config, service_principal).await?;
        self.ticket
            .read()
            .as_ref()
            .map(|cached| Arc::clone(&cached.ticket))
            .ok_or_else(|| FeedError::Internal("ticket missing after login".into()))
    }

    fn fresh_ticket(&self, config: &KerberosConfig) -> Option<Arc<dyn KerberosTicket>> {
        let guard = self.ticket.read();
        let cached = guard.as_ref()?;
        (cached.acquired_at.elapsed() < config.ticket_lifetime())
            .then(|| Arc::clone(&cached.ticket))
    }
}

fn ensure_readable(path: &Path, what: &str) -> Result<(), FeedError> {
    std::fs::File::open(path)
        .map(|_| ())
        .map_err(|e| FeedError::Config(format!("cannot read {what} {}: {e}", path.display())))
}
