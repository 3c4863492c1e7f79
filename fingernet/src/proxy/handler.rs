//! Per-connection MITM handling.
//!
//! Session state machine: `Accept -> read first request -> CONNECT?`
//! - yes: send `200 OK`, TLS-terminate with a minted leaf, then loop over
//!   inner requests (`ReadInner -> Dispatch -> Relay`)
//! - no: plain absolute-URI HTTP proxying, then close
//!
//! Per-request failures on the origin leg surface as `500` without tearing
//! down the outer session; client-side protocol violations close it.

use std::sync::Arc;
use std::time::Duration;

use boring::ssl::{SslAcceptor, SslMethod};
use bytes::Bytes;
use http::uri::Authority;
use http::{header, Method, Request, Response, StatusCode, Uri, Version};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::upgrade::Upgraded;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::base::{ProxyError, Result};
use crate::cert::authority::LeafCert;
use crate::cert::LeafCache;
use crate::http::decode::decode_body;
use crate::http::transport::{self, strip_hop_by_hop, HttpsSession};
use crate::http::H2Settings;
use crate::socket::{ProxyConnector, UpstreamProxy};
use crate::tls::FingerprintDialer;

/// Client-side TLS termination timeout.
const TLS_ACCEPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared engine state handed to every session.
pub struct ProxyContext {
    pub dialer: Arc<FingerprintDialer>,
    pub leaves: Arc<LeafCache>,
    /// Connector for the plain-HTTP leg (shares the upstream proxy).
    pub connector: ProxyConnector,
    pub h2_settings: H2Settings,
}

impl ProxyContext {
    pub fn new(
        dialer: Arc<FingerprintDialer>,
        leaves: Arc<LeafCache>,
        upstream: Option<UpstreamProxy>,
    ) -> Self {
        Self {
            dialer,
            leaves,
            connector: ProxyConnector::new(upstream),
            h2_settings: H2Settings::default(),
        }
    }
}

/// Serve one accepted client connection.
pub(crate) async fn handle_client(
    stream: TcpStream,
    peer: std::net::SocketAddr,
    ctx: Arc<ProxyContext>,
) {
    let service_ctx = ctx.clone();
    let service = service_fn(move |request| {
        let ctx = service_ctx.clone();
        async move { dispatch(request, ctx).await }
    });

    if let Err(e) = http1::Builder::new()
        .preserve_header_case(true)
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades()
        .await
    {
        debug!(peer = %peer, err = %e, "client connection ended");
    }
}

async fn dispatch(
    request: Request<Incoming>,
    ctx: Arc<ProxyContext>,
) -> Result<Response<Full<Bytes>>> {
    if request.method() == Method::CONNECT {
        handle_connect(request, ctx)
    } else {
        handle_plain(request, ctx).await
    }
}

/// Reply `200 OK` and take over the tunnel once the client finishes the
/// upgrade.
fn handle_connect(
    request: Request<Incoming>,
    ctx: Arc<ProxyContext>,
) -> Result<Response<Full<Bytes>>> {
    let Some(authority) = request.uri().authority().cloned() else {
        warn!(uri = %request.uri(), "CONNECT without authority");
        return Ok(status_response(StatusCode::BAD_REQUEST));
    };

    info!(target = %authority, "CONNECT accepted, intercepting");
    tokio::spawn(async move {
        match hyper::upgrade::on(request).await {
            Ok(upgraded) => {
                if let Err(e) = serve_mitm(upgraded, authority.clone(), ctx).await {
                    debug!(target = %authority, err = %e, "MITM session ended");
                }
            }
            Err(e) => debug!(target = %authority, err = %e, "CONNECT upgrade failed"),
        }
    });

    Ok(status_response(StatusCode::OK))
}

/// Terminate TLS toward the client with a leaf minted for the CONNECT host,
/// then loop over the inner requests.
async fn serve_mitm(upgraded: Upgraded, authority: Authority, ctx: Arc<ProxyContext>) -> Result<()> {
    // Leaf-signing failure aborts only this session.
    let leaf = ctx.leaves.leaf_for(authority.host()).await?;
    let acceptor = leaf_acceptor(&leaf)?;

    let accept = tokio_boring::accept(&acceptor, TokioIo::new(upgraded));
    let tls = match tokio::time::timeout(TLS_ACCEPT_TIMEOUT, accept).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            return Err(ProxyError::tls(format!("client TLS termination failed: {e:?}")))
        }
        Err(_) => return Err(ProxyError::tls("client TLS termination timed out")),
    };

    let session = Arc::new(MitmSession {
        ctx,
        authority,
        upstream: Mutex::new(None),
    });
    let service = service_fn(move |request| {
        let session = session.clone();
        async move { session.handle(request).await }
    });

    http1::Builder::new()
        .preserve_header_case(true)
        .serve_connection(TokioIo::new(tls), service)
        .await
        .map_err(|e| ProxyError::network("terminated session failed").with_source(e))
}

/// Build a server-side acceptor carrying the minted leaf. The CONNECT target
/// host is known up front, so no SNI callback is needed.
fn leaf_acceptor(leaf: &LeafCert) -> Result<SslAcceptor> {
    let mut builder = SslAcceptor::mozilla_intermediate(SslMethod::tls())
        .map_err(|e| ProxyError::tls("failed to create TLS acceptor").with_source(e))?;
    builder
        .set_certificate(&leaf.cert)
        .map_err(|e| ProxyError::tls("failed to set leaf certificate").with_source(e))?;
    builder
        .set_private_key(&leaf.key)
        .map_err(|e| ProxyError::tls("failed to set leaf key").with_source(e))?;
    Ok(builder.build())
}

/// One intercepted client-side TLS session. The upstream connection is
/// established lazily on the first inner request and reused afterwards;
/// HTTP/2 multiplexes over it, HTTP/1.1 sends one request at a time.
struct MitmSession {
    ctx: Arc<ProxyContext>,
    authority: Authority,
    upstream: Mutex<Option<HttpsSession>>,
}

impl MitmSession {
    async fn handle(self: Arc<Self>, request: Request<Incoming>) -> Result<Response<Full<Bytes>>> {
        let (parts, body) = request.into_parts();
        // A broken inner request is a client-side protocol violation and
        // closes the session.
        let body = body
            .collect()
            .await
            .map_err(|e| ProxyError::network("failed to read client request body").with_source(e))?
            .to_bytes();

        let outbound = self.rebuild_request(parts, body)?;
        let method = outbound.method().clone();
        let uri = outbound.uri().clone();

        match self.forward(outbound).await {
            Ok(response) => {
                info!(method = %method, url = %uri, status = response.status().as_u16(), "relayed");
                Ok(relay_response(response))
            }
            Err(e) => {
                error!(method = %method, url = %uri, err = %e, "origin request failed");
                Ok(internal_error_response())
            }
        }
    }

    /// Clone the inner request into a fresh outbound request with an
    /// absolute `https` URI.
    fn rebuild_request(
        &self,
        parts: http::request::Parts,
        body: Bytes,
    ) -> Result<Request<Bytes>> {
        let path = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let uri: Uri = format!("https://{}{}", self.authority, path)
            .parse()
            .map_err(|e| ProxyError::network("failed to rebuild request URI").with_source(e))?;

        let mut outbound = Request::builder()
            .method(parts.method)
            .uri(uri)
            .version(Version::HTTP_11)
            .body(body)
            .map_err(|e| ProxyError::network("failed to rebuild request").with_source(e))?;
        *outbound.headers_mut() = parts.headers;
        strip_hop_by_hop(outbound.headers_mut());
        Ok(outbound)
    }

    async fn forward(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        let mut upstream = self.upstream.lock().await;
        if upstream.is_none() {
            let target = self.target();
            let dialed = self.ctx.dialer.dial(&target).await?;
            info!(
                target = %target,
                alpn = dialed.alpn.as_deref().unwrap_or("none"),
                "origin connected"
            );
            *upstream = Some(HttpsSession::establish(dialed, self.ctx.h2_settings).await?);
        }

        let session = upstream.as_mut().expect("established above");
        match session.send(request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                // Connection-level failure; the next request redials.
                *upstream = None;
                Err(e)
            }
        }
    }

    fn target(&self) -> String {
        match self.authority.port_u16() {
            Some(port) => format!("{}:{}", self.authority.host(), port),
            None => format!("{}:443", self.authority.host()),
        }
    }
}

/// Plain absolute-URI HTTP proxying.
async fn handle_plain(
    request: Request<Incoming>,
    ctx: Arc<ProxyContext>,
) -> Result<Response<Full<Bytes>>> {
    if request.uri().scheme_str() != Some("http") {
        warn!(uri = %request.uri(), "non-absolute or non-http proxy request");
        return Ok(status_response(StatusCode::BAD_REQUEST));
    }

    let (parts, body) = request.into_parts();
    let body = body
        .collect()
        .await
        .map_err(|e| ProxyError::network("failed to read client request body").with_source(e))?
        .to_bytes();

    let mut outbound = Request::builder()
        .method(parts.method.clone())
        .uri(parts.uri.clone())
        .version(Version::HTTP_11)
        .body(body)
        .map_err(|e| ProxyError::network("failed to rebuild request").with_source(e))?;
    *outbound.headers_mut() = parts.headers;
    strip_hop_by_hop(outbound.headers_mut());

    let method = parts.method;
    let uri = parts.uri;
    match transport::send_plain(&ctx.connector, outbound).await {
        Ok(response) => {
            info!(method = %method, url = %uri, status = response.status().as_u16(), "relayed");
            Ok(relay_response(response))
        }
        Err(e) => {
            error!(method = %method, url = %uri, err = %e, "origin request failed");
            Ok(internal_error_response())
        }
    }
}

/// Decode the body if the Content-Encoding is understood, strip the header,
/// and rewrite Content-Length. Unknown encodings pass through.
fn relay_response(response: Response<Bytes>) -> Response<Full<Bytes>> {
    let (mut parts, body) = response.into_parts();
    parts.version = Version::HTTP_11;
    strip_hop_by_hop(&mut parts.headers);
    parts.headers.remove(header::TRANSFER_ENCODING);

    let body = match parts
        .headers
        .get(header::CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
    {
        Some(encoding) => match decode_body(&encoding, &body) {
            Ok(Some(decoded)) => {
                parts.headers.remove(header::CONTENT_ENCODING);
                decoded
            }
            Ok(None) => body,
            Err(e) => {
                warn!(encoding = %encoding, err = %e, "body decode failed, passing through");
                body
            }
        },
        None => body,
    };

    parts.headers.insert(header::CONTENT_LENGTH, header::HeaderValue::from(body.len()));
    Response::from_parts(parts, Full::new(body))
}

fn status_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

fn internal_error_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(b"Internal Server Error")));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/plain"));
    response
}
