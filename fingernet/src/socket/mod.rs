//! Raw socket plumbing.
//!
//! - [`stream`]: the [`stream::StreamSocket`] trait and [`stream::BoxedSocket`]
//!   wrapper so TLS can run over plain TCP or an upstream tunnel uniformly
//! - [`proxy`]: parsed upstream-proxy settings (`http` / `socks5`, optional
//!   credentials)
//! - [`connector`]: opens a raw byte stream to `host:port`, optionally
//!   tunnelled through the upstream proxy. No TLS happens here.

pub mod connector;
pub mod proxy;
pub mod stream;

pub use connector::ProxyConnector;
pub use proxy::{UpstreamProxy, UpstreamScheme};
pub use stream::{BoxedSocket, StreamSocket};
