use std::fmt;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Error kinds, matching how failures surface to an operator.
///
/// `Configuration` and `Certificate` (for CA material) are fatal at startup;
/// everything else is per-session and never tears down the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid port, missing CA, bad log level/format.
    Configuration,
    /// CA load, serial generation, signing, encoding.
    Certificate,
    /// Accept, TCP dial, read/write.
    Network,
    /// Upstream CONNECT or SOCKS5 negotiation failure.
    Proxy,
    /// Handshake or fingerprint-profile apply failure.
    Tls,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Certificate => "certificate",
            ErrorKind::Network => "network",
            ErrorKind::Proxy => "proxy",
            ErrorKind::Tls => "tls",
        };
        f.write_str(name)
    }
}

/// A proxy error: kind + human message + optional cause chain.
#[derive(Debug, Error)]
#[error("{kind} error: {message}")]
pub struct ProxyError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProxyError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), source: None }
    }

    /// Attach the underlying cause.
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn certificate(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Certificate, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn proxy(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Proxy, message)
    }

    pub fn tls(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Tls, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl From<boring::error::ErrorStack> for ProxyError {
    fn from(err: boring::error::ErrorStack) -> Self {
        ProxyError::certificate("BoringSSL error").with_source(err)
    }
}
