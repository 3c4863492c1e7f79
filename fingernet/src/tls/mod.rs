//! Fingerprinted TLS client.
//!
//! - [`options`]: applies a [`crate::fingerprint::ClientHelloSpec`] to a
//!   BoringSSL connector (cipher/curve/sigalg order, ALPN, versions, GREASE
//!   on, extension permutation off)
//! - [`dialer`]: the [`dialer::FingerprintDialer`] that obtains a raw stream
//!   from the connector layer, completes the handshake, and reports the
//!   negotiated ALPN

pub mod dialer;
pub mod options;

pub use dialer::{DialedStream, DialerConfig, FingerprintDialer};
