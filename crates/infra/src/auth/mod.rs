//! Solr authentication: basic credentials or Kerberos/SPNEGO

#[cfg(feature = "kerberos")]
pub mod gssapi;
pub mod provider;
pub mod session;

pub use provider::{
    default_provider, export_krb5_environment, CredentialProvider, KerberosTicket,
    UnsupportedProvider,
};
pub use session::AuthSession;
