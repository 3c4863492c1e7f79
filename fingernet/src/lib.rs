//! # fingernet
//!
//! An intercepting HTTPS proxy with a controllable TLS fingerprint.
//!
//! Client applications configure `fingernet` as their HTTP/HTTPS proxy. For
//! each target origin the proxy terminates TLS locally, presenting a leaf
//! certificate minted on demand under a locally trusted root, then opens an
//! independent TLS connection to the true origin whose ClientHello shape
//! (cipher list, extension set and order, key shares, ALPN, signature
//! algorithms, GREASE placement, padding, compression-cert) is dictated by a
//! configurable fingerprint profile instead of the stack's defaults. The
//! proxy bridges HTTP/1.1 or HTTP/2 between the two sides and transparently
//! decodes `Content-Encoding`, so a downstream observer sees plaintext
//! request/response pairs.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fingernet::cert::{CertAuthority, LeafCache};
//! use fingernet::fingerprint::ProfileRegistry;
//! use fingernet::proxy::{ProxyContext, ProxyServer};
//! use fingernet::tls::{DialerConfig, FingerprintDialer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let ca = CertAuthority::from_pem_files("ca.crt", "ca.key").unwrap();
//!     let spec = ProfileRegistry::with_builtins().get("default").unwrap();
//!     let dialer = FingerprintDialer::new(DialerConfig::new(Arc::new(spec)));
//!     let ctx = ProxyContext::new(Arc::new(dialer), Arc::new(LeafCache::new(ca)), None);
//!     let server = ProxyServer::bind(8080, Arc::new(ctx)).await.unwrap();
//!     server.run(tokio::signal::ctrl_c()).await.unwrap();
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error taxonomy shared across the crate
//! - [`config`] - Runtime configuration and validation
//! - [`fingerprint`] - ClientHello spec model, GREASE, named profiles, JA3
//! - [`socket`] - Raw stream abstraction and upstream proxy connectors
//! - [`tls`] - Fingerprinted TLS dialer over BoringSSL
//! - [`cert`] - Root CA handling and the single-flight leaf cache
//! - [`http`] - HTTP/1.1 and HTTP/2 transports over a borrowed stream
//! - [`proxy`] - The MITM engine (listener, CONNECT interception, relay)
//!
//! ## Security
//!
//! This is a research/debugging tool. Origin certificates are deliberately
//! **not** verified, and the minted leaves are only trusted by clients that
//! install the generated root CA.

pub mod base;
pub mod cert;
pub mod config;
pub mod fingerprint;
pub mod http;
pub mod proxy;
pub mod socket;
pub mod tls;
