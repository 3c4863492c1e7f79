//! TLS ClientHello fingerprint model.
//!
//! A fingerprint profile is data, not code: an ordered description of the
//! ClientHello a dial should emit. Origins that fingerprint clients hash the
//! ordered tuple of ciphers, extension types and curves (JA3/JA4) and
//! sometimes extension payloads, so order and payload bytes are load-bearing.
//!
//! - [`grease`]: RFC 8701 GREASE values and placeholder expansion
//! - [`hello`]: the [`hello::ClientHelloSpec`] model and its serializer
//! - [`profiles`]: named profiles (`default`, `http1`, `http2`) and the
//!   [`profiles::ProfileRegistry`]

pub mod grease;
pub mod hello;
pub mod profiles;

pub use grease::{is_grease, GREASE_PLACEHOLDER};
pub use hello::{ClientHelloSpec, Extension, HelloParams, KeyShareEntry};
pub use profiles::ProfileRegistry;
