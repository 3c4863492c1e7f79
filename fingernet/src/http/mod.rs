//! HTTP plumbing over already-connected streams.
//!
//! - [`transport`]: HTTP/1.1 or HTTP/2 client legs selected on negotiated
//!   ALPN, plus the plain-HTTP leg
//! - [`h2settings`]: SETTINGS values sent on upstream HTTP/2 connections
//! - [`decode`]: full-body Content-Encoding decoding

pub mod decode;
pub mod h2settings;
pub mod transport;

pub use h2settings::H2Settings;
pub use transport::HttpsSession;
