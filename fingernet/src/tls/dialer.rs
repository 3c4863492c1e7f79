//! The fingerprinted TLS dialer.
//!
//! One dialer struct parameterised by a connector value; direct dials and
//! upstream-proxied dials share the same handshake path.

use std::sync::Arc;
use std::time::Duration;

use tokio_boring::SslStream;
use tracing::debug;

use crate::base::{ProxyError, Result};
use crate::fingerprint::ClientHelloSpec;
use crate::socket::{BoxedSocket, ProxyConnector, UpstreamProxy};
use crate::tls::options::{apply_connect_settings, configure_connector, declared_extension_types};

/// Default handshake timeout.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Dialer configuration: which hello to emit, how long to wait, and an
/// optional upstream proxy for the raw stream.
#[derive(Clone)]
pub struct DialerConfig {
    pub spec: Arc<ClientHelloSpec>,
    pub handshake_timeout: Duration,
    pub upstream: Option<UpstreamProxy>,
}

impl DialerConfig {
    pub fn new(spec: Arc<ClientHelloSpec>) -> Self {
        Self { spec, handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT, upstream: None }
    }

    pub fn with_upstream(mut self, upstream: Option<UpstreamProxy>) -> Self {
        self.upstream = upstream;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

/// A completed fingerprinted TLS connection.
#[derive(Debug)]
pub struct DialedStream {
    pub stream: SslStream<BoxedSocket>,
    /// Negotiated ALPN protocol, if any.
    pub alpn: Option<String>,
}

impl DialedStream {
    pub fn is_h2(&self) -> bool {
        self.alpn.as_deref() == Some("h2")
    }
}

/// Dials `host:port` targets and completes a TLS handshake whose ClientHello
/// follows the configured fingerprint profile.
pub struct FingerprintDialer {
    config: DialerConfig,
    connector: ProxyConnector,
}

impl FingerprintDialer {
    pub fn new(config: DialerConfig) -> Self {
        let connector = ProxyConnector::new(config.upstream.clone());
        Self { config, connector }
    }

    pub fn spec(&self) -> &ClientHelloSpec {
        &self.config.spec
    }

    /// Open a raw stream to `target` and wrap it in a fingerprinted TLS
    /// session. The first bytes on the raw stream are the handshake's
    /// ClientHello; the connector writes nothing after tunnel setup.
    pub async fn dial(&self, target: &str) -> Result<DialedStream> {
        let host = server_name(target);
        debug!(
            target = %target,
            ja3 = %self.config.spec.ja3_hash(),
            extensions = ?declared_extension_types(&self.config.spec),
            "dialing with fingerprint"
        );

        let raw: BoxedSocket = self.connector.connect(target).await?;

        let connector = configure_connector(&self.config.spec)?;
        let mut ssl_config = connector
            .configure()
            .map_err(|e| ProxyError::tls("failed to configure SSL").with_source(e))?;
        apply_connect_settings(&self.config.spec, &mut ssl_config)?;
        // server_name still goes out as SNI; hostname checks stay off.
        ssl_config.set_verify_hostname(false);
        // Per RFC 6066, SNI must not carry a raw IP address.
        if host.parse::<std::net::IpAddr>().is_ok() {
            ssl_config.set_use_server_name_indication(false);
        }

        let handshake = tokio_boring::connect(ssl_config, &host, raw);
        let stream = match tokio::time::timeout(self.config.handshake_timeout, handshake).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(ProxyError::tls(format!("TLS handshake with {host} failed: {e:?}")))
            }
            // Dropping the handshake future drops the raw stream, so any
            // blocked I/O unwinds.
            Err(_) => return Err(ProxyError::tls(format!("TLS handshake with {host} timed out"))),
        };

        let alpn = stream
            .ssl()
            .selected_alpn_protocol()
            .map(|proto| String::from_utf8_lossy(proto).into_owned());
        debug!(target = %target, alpn = alpn.as_deref().unwrap_or("none"), "TLS handshake complete");

        Ok(DialedStream { stream, alpn })
    }
}

/// The SNI payload: the host part of `host:port`.
fn server_name(target: &str) -> String {
    match target.rsplit_once(':') {
        Some((host, _)) => host.trim_start_matches('[').trim_end_matches(']').to_string(),
        None => target.to_string(),
    }
}
