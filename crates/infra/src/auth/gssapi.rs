//! GSSAPI-backed Kerberos provider (`kerberos` feature)
//!
//! Credentials come from the keytab through the standard MIT/Heimdal
//! environment (`KRB5_CONFIG`, `KRB5_CLIENT_KTNAME`), exported once at
//! startup by [`super::export_krb5_environment`]. The library acquires and
//! caches the TGT and service tickets itself. Every call into GSSAPI blocks,
//! so all of them run on the blocking pool.

use std::sync::Arc;

use async_trait::async_trait;
use cross_krb5::{ClientCtx, InitiateFlags};
use solrfeed_domain::{FeedError, KerberosConfig};
use tracing::{debug, info};

use super::provider::{CredentialProvider, KerberosTicket};

#[derive(Debug, Default, Clone, Copy)]
pub struct GssapiProvider;

#[derive(Debug)]
struct GssapiTicket {
    principal: String,
    service_principal: String,
}

fn initiate(principal: &str, service_principal: &str) -> Result<Vec<u8>, FeedError> {
    let (_pending, token) =
        ClientCtx::new(InitiateFlags::empty(), Some(principal), service_principal, None)
            .map_err(|e| {
                FeedError::Auth(format!(
                    "GSSAPI rejected {principal} for {service_principal}: {e}"
                ))
            })?;
    Ok(token.to_vec())
}

async fn run_blocking<T, F>(f: F) -> Result<T, FeedError>
where
    F: FnOnce() -> Result<T, FeedError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| FeedError::Internal(format!("GSSAPI task failed: {e}")))?
}

#[async_trait]
impl CredentialProvider for GssapiProvider {
    async fn login(
        &self,
        config: &KerberosConfig,
        service_principal: &str,
    ) -> Result<Arc<dyn KerberosTicket>, FeedError> {
        let principal = config.qualified_principal();
        let spn = service_principal.to_string();

        let ticket = run_blocking(move || {
            // First token proves the keytab works against the KDC
            initiate(&principal, &spn)?;
            Ok(GssapiTicket { principal, service_principal: spn })
        })
        .await?;

        info!(
            principal = %ticket.principal,
            spn = %ticket.service_principal,
            "kerberos login succeeded"
        );
        Ok(Arc::new(ticket))
    }
}

#[async_trait]
impl KerberosTicket for GssapiTicket {
    fn principal(&self) -> &str {
        &self.principal
    }

    async fn negotiate_token(&self) -> Result<Vec<u8>, FeedError> {
        let principal = self.principal.clone();
        let spn = self.service_principal.clone();
        let token = run_blocking(move || initiate(&principal, &spn)).await?;
        debug!(bytes = token.len(), "minted SPNEGO token");
        Ok(token)
    }
}
