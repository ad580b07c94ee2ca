//! Channel setup for talking to the daemon
//!
//! Every call and every stream gets its own channel, dropped when the call or
//! stream ends. Nothing is held idle between unrelated calls.

use crate::{Error, Result};
use std::net::IpAddr;
use std::time::Duration;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};
use tracing::{debug, error, warn};

/// Wire security for a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Plaintext HTTP/2, loopback use only
    #[default]
    Plaintext,
    /// TLS
    Tls,
}

/// Where to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelTarget {
    /// Hostname or IP literal
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Plaintext or TLS
    pub security: Security,
}

impl ChannelTarget {
    /// Plaintext target on `127.0.0.1`
    pub fn loopback(port: u16) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port,
            security: Security::Plaintext,
        }
    }

    /// TLS target
    pub fn tls(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            security: Security::Tls,
        }
    }

    /// Endpoint URI, e.g. `http://127.0.0.1:9332`
    pub fn uri(&self) -> String {
        let scheme = match self.security {
            Security::Plaintext => "http",
            Security::Tls => "https",
        };
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("{}://[{}]:{}", scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}", scheme, self.host, self.port)
        }
    }

    /// Whether the host is this machine
    pub fn is_loopback(&self) -> bool {
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        if host.eq_ignore_ascii_case("localhost") {
            return true;
        }
        host.parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
    }
}

/// TLS configuration for gRPC connection
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Server name for TLS verification (uses target host if None)
    pub server_name: Option<String>,
    /// PEM encoded CA to trust instead of the bundled web PKI roots
    pub ca_certificate_pem: Option<Vec<u8>>,
}

/// Channel options shared by every call
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// TCP + handshake deadline
    pub connect_timeout: Duration,
    /// TLS settings, used when the target is [`Security::Tls`]
    pub tls: TlsConfig,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            tls: TlsConfig::default(),
        }
    }
}

/// Open a channel to `target`.
pub async fn connect(target: &ChannelTarget, options: &TransportOptions) -> Result<Channel> {
    let uri = target.uri();
    debug!("Connecting to {} ({:?})", uri, target.security);

    let mut endpoint = Endpoint::from_shared(uri.clone()).map_err(|e| {
        error!("Failed to parse endpoint URL '{}': {}", uri, e);
        Error::Connection(format!("Invalid endpoint URL '{}': {}", uri, e))
    })?;
    endpoint = endpoint.connect_timeout(options.connect_timeout);

    match target.security {
        Security::Tls => {
            let server_name = options
                .tls
                .server_name
                .clone()
                .unwrap_or_else(|| target.host.clone());
            debug!("Using server name for TLS SNI: {}", server_name);

            let mut tls_config = ClientTlsConfig::new().domain_name(server_name);
            tls_config = match &options.tls.ca_certificate_pem {
                Some(pem) => tls_config.ca_certificate(Certificate::from_pem(pem)),
                None => tls_config.with_enabled_roots(),
            };

            endpoint = endpoint.tls_config(tls_config).map_err(|e| {
                error!("Failed to configure TLS for endpoint '{}': {}", uri, e);
                Error::Connection(format!("TLS configuration failed: {}", e))
            })?;
        }
        Security::Plaintext => {
            if !target.is_loopback() {
                warn!(
                    "Using PLAINTEXT connection to non-loopback host {} - traffic including scan keys is unencrypted!",
                    target.host
                );
            }
        }
    }

    endpoint.connect().await.map_err(|e| {
        let detail = error_chain(&e);
        error!("Connection failed to {}: {}", uri, detail);
        classify_connect_error(&uri, &detail)
    })
}

/// Render an error and all of its sources
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn classify_connect_error(uri: &str, detail: &str) -> Error {
    let cleaned = detail.to_lowercase();
    if cleaned.contains("certificate")
        || cleaned.contains("tls")
        || cleaned.contains("ssl")
        || cleaned.contains("invalidcertificate")
        || cleaned.contains("notvalidforname")
    {
        return Error::Connection(format!(
            "TLS/SSL certificate validation failed for {}: {}",
            uri, detail
        ));
    }
    if cleaned.contains("timeout") || cleaned.contains("timed out") {
        return Error::Connection(format!("Connection timeout to {}: {}", uri, detail));
    }
    if cleaned.contains("refused") {
        return Error::Connection(format!(
            "Connection refused by {}: {}. Is mwebd running?",
            uri, detail
        ));
    }
    if cleaned.contains("dns")
        || cleaned.contains("name resolution")
        || cleaned.contains("failed to lookup")
    {
        return Error::Connection(format!("DNS resolution failed for {}: {}", uri, detail));
    }
    Error::Connection(format!("Transport connection failed to {}: {}", uri, detail))
}
