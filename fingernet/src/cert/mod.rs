//! Certificate authority and leaf cache.
//!
//! - [`authority`]: root CA material (load, generate) and leaf minting
//! - [`cache`]: single-flight per-SNI leaf cache

pub mod authority;
pub mod cache;

pub use authority::{CertAuthority, LeafCert, RootOptions};
pub use cache::LeafCache;
