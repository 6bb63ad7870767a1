//! Kerberos credential provider seam
//!
//! The session only ever talks to these traits, so the GSSAPI binding can be
//! compiled out and tests can inject a stub.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use solrfeed_domain::{FeedError, KerberosConfig};

/// An authenticated Kerberos identity able to mint SPNEGO tokens for one
/// service principal.
#[async_trait]
pub trait KerberosTicket: Send + Sync + fmt::Debug {
    /// Client principal the ticket was obtained for
    fn principal(&self) -> &str;

    /// Fresh GSSAPI initial-context token for the `Negotiate` header
    ///
    /// # Errors
    ///
    /// [`FeedError::Auth`] if the KDC or the GSSAPI library rejects the
    /// request.
    async fn negotiate_token(&self) -> Result<Vec<u8>, FeedError>;
}

/// Trait for obtaining Kerberos tickets from static credentials
///
/// This trait allows dependency injection and testing with mock providers.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Authenticate with the keytab and realm configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - keytab, krb5.conf, principal and realm
    /// * `service_principal` - SPN the ticket will produce tokens for
    ///
    /// # Errors
    ///
    /// [`FeedError::Auth`] when the KDC rejects the login.
    async fn login(
        &self,
        config: &KerberosConfig,
        service_principal: &str,
    ) -> Result<Arc<dyn KerberosTicket>, FeedError>;
}

/// Provider used when the crate is built without the `kerberos` feature.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedProvider;

#[async_trait]
impl CredentialProvider for UnsupportedProvider {
    async fn login(
        &self,
        _config: &KerberosConfig,
        _service_principal: &str,
    ) -> Result<Arc<dyn KerberosTicket>, FeedError> {
        Err(FeedError::Config(
            "Kerberos is configured but solrfeed was built without the `kerberos` feature".into(),
        ))
    }
}

/// Point the system Kerberos library at the configured krb5.conf and keytab.
///
/// Writes `KRB5_CONFIG` and `KRB5_CLIENT_KTNAME` into the process
/// environment. Call it once at startup while the process is still
/// single-threaded, before the async runtime exists.
pub fn export_krb5_environment(config: &KerberosConfig) {
    std::env::set_var("KRB5_CONFIG", &config.krb5_conf);
    std::env::set_var("KRB5_CLIENT_KTNAME", &config.keytab);
}

/// The provider this build ships with.
pub fn default_provider() -> Arc<dyn CredentialProvider> {
    #[cfg(feature = "kerberos")]
    {
        Arc::new(super::gssapi::GssapiProvider)
    }
    #[cfg(not(feature = "kerberos"))]
    {
        Arc::new(UnsupportedProvider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_credential_paths() {
        let config = KerberosConfig {
            keytab: "/etc/security/keytabs/feeder.keytab".into(),
            principal: "feeder".into(),
            realm: "EXAMPLE.COM".into(),
            krb5_conf: "/etc/solrfeed/krb5.conf".into(),
            service_principal: None,
            ticket_lifetime_secs: 60,
        };

        export_krb5_environment(&config);

        assert_eq!(std::env::var("KRB5_CONFIG").unwrap(), "/etc/solrfeed/krb5.conf");
        assert_eq!(
            std::env::var("KRB5_CLIENT_KTNAME").unwrap(),
            "/etc/security/keytabs/feeder.keytab"
        );
    }
}
