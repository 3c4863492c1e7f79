//! The MITM engine.
//!
//! - [`server`]: listener, accept loop, graceful shutdown
//! - [`handler`]: CONNECT interception, TLS termination toward the client,
//!   dispatch through the fingerprinted dialer, response relay

pub mod handler;
pub mod server;

pub use handler::ProxyContext;
pub use server::ProxyServer;
