//! Base types and error handling.
//!
//! Provides the crate-wide error taxonomy:
//! - [`ProxyError`]: error with a [`ErrorKind`] kind, a message, and an
//!   optional cause chain

pub mod error;

pub use error::{ErrorKind, ProxyError, Result};
