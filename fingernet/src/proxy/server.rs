//! Listener and accept loop.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::base::{ProxyError, Result};
use crate::proxy::handler::{handle_client, ProxyContext};

/// The MITM proxy server. Accepts client connections until shutdown, then
/// stops accepting and drains in-flight sessions.
pub struct ProxyServer {
    listener: TcpListener,
    ctx: Arc<ProxyContext>,
}

impl ProxyServer {
    /// Bind the listen port. Failure here is fatal.
    pub async fn bind(port: u16, ctx: Arc<ProxyContext>) -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ProxyError::network(format!("failed to bind {addr}")).with_source(e))?;
        Ok(Self { listener, ctx })
    }

    /// Bind loopback on an ephemeral port (used by tests).
    pub async fn bind_local(ctx: Arc<ProxyContext>) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(|e| ProxyError::network("failed to bind loopback").with_source(e))?;
        Ok(Self { listener, ctx })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| ProxyError::network("listener has no local address").with_source(e))
    }

    /// Accept until `shutdown` resolves. Accept errors are per-connection
    /// and never stop the loop.
    pub async fn run<F: Future>(self, shutdown: F) -> Result<()> {
        info!(addr = %self.local_addr()?, "proxy listening");

        let mut sessions: JoinSet<()> = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let ctx = self.ctx.clone();
                        sessions.spawn(handle_client(stream, peer, ctx));
                    }
                    Err(e) => warn!(err = %e, "accept failed"),
                },
            }
        }

        info!("shutdown requested, draining sessions");
        drop(self.listener);
        while sessions.join_next().await.is_some() {}
        info!("proxy stopped");
        Ok(())
    }
}
