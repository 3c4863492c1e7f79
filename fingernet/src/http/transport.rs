//! HTTP transports over already-connected streams.
//!
//! The HTTPS leg never dials: it drives HTTP/2 or HTTP/1.1 over the single
//! stream the fingerprinted dialer produced, selected on negotiated ALPN.
//! An `h2` session multiplexes streams over that one connection for its
//! whole life; the HTTP/1.1 session sends one request at a time with
//! pipelining disabled.

use bytes::{Bytes, BytesMut};
use http::uri::PathAndQuery;
use http::{header, HeaderMap, Request, Response, Uri, Version};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::debug;

use crate::base::{ProxyError, Result};
use crate::http::h2settings::H2Settings;
use crate::socket::{BoxedSocket, ProxyConnector, UpstreamScheme};
use crate::tls::DialedStream;

/// An upstream HTTPS connection with its protocol decided by ALPN.
pub enum HttpsSession {
    H1(hyper::client::conn::http1::SendRequest<Full<Bytes>>),
    H2(h2::client::SendRequest<Bytes>),
}

impl HttpsSession {
    /// Wrap a dialed TLS stream in the transport its ALPN selected. The
    /// connection driver is spawned; the stream is never redialed.
    pub async fn establish(dialed: DialedStream, settings: H2Settings) -> Result<Self> {
        if dialed.is_h2() {
            let mut builder = h2::client::Builder::new();
            settings.apply(&mut builder);
            let (send_request, connection) = builder
                .handshake::<_, Bytes>(dialed.stream)
                .await
                .map_err(|e| ProxyError::network("HTTP/2 handshake failed").with_source(e))?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    debug!(err = %e, "upstream HTTP/2 connection closed");
                }
            });
            Ok(HttpsSession::H2(send_request))
        } else {
            let (send_request, connection) =
                hyper::client::conn::http1::handshake(TokioIo::new(dialed.stream))
                    .await
                    .map_err(|e| ProxyError::network("HTTP/1.1 handshake failed").with_source(e))?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    debug!(err = %e, "upstream HTTP/1.1 connection closed");
                }
            });
            Ok(HttpsSession::H1(send_request))
        }
    }

    pub fn is_h2(&self) -> bool {
        matches!(self, HttpsSession::H2(_))
    }

    /// Send one request (absolute URI) and collect the full response.
    pub async fn send(&mut self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        match self {
            HttpsSession::H1(sender) => send_h1(sender, request).await,
            HttpsSession::H2(sender) => send_h2(sender, request).await,
        }
    }
}

async fn send_h1(
    sender: &mut hyper::client::conn::http1::SendRequest<Full<Bytes>>,
    request: Request<Bytes>,
) -> Result<Response<Bytes>> {
    let request = into_origin_form(request)?;
    let (parts, body) = request.into_parts();
    let request = Request::from_parts(parts, Full::new(body));

    sender
        .ready()
        .await
        .map_err(|e| ProxyError::network("upstream HTTP/1.1 connection gone").with_source(e))?;
    let response = sender
        .send_request(request)
        .await
        .map_err(|e| ProxyError::network("HTTP/1.1 request failed").with_source(e))?;
    collect_h1_response(response).await
}

async fn send_h2(
    sender: &mut h2::client::SendRequest<Bytes>,
    request: Request<Bytes>,
) -> Result<Response<Bytes>> {
    let (mut parts, body) = request.into_parts();
    parts.version = Version::HTTP_2;
    // :authority comes from the URI; a Host header would be redundant.
    parts.headers.remove(header::HOST);
    let end_of_stream = body.is_empty();
    let request = Request::from_parts(parts, ());

    let mut ready = sender
        .clone()
        .ready()
        .await
        .map_err(|e| ProxyError::network("upstream HTTP/2 connection gone").with_source(e))?;
    let (response, mut send_stream) = ready
        .send_request(request, end_of_stream)
        .map_err(|e| ProxyError::network("HTTP/2 request failed").with_source(e))?;
    if !end_of_stream {
        send_stream
            .send_data(body, true)
            .map_err(|e| ProxyError::network("HTTP/2 body send failed").with_source(e))?;
    }

    let response = response
        .await
        .map_err(|e| ProxyError::network("HTTP/2 response failed").with_source(e))?;
    let (parts, mut recv) = response.into_parts();
    let mut collected = BytesMut::new();
    while let Some(chunk) = recv.data().await {
        let chunk =
            chunk.map_err(|e| ProxyError::network("HTTP/2 body read failed").with_source(e))?;
        let _ = recv.flow_control().release_capacity(chunk.len());
        collected.extend_from_slice(&chunk);
    }
    Ok(Response::from_parts(parts, collected.freeze()))
}

/// Send a plain-HTTP request. Through an HTTP upstream the request stays in
/// absolute form with `Proxy-Authorization` attached; direct and SOCKS5
/// paths tunnel first and send origin-form.
pub async fn send_plain(
    connector: &ProxyConnector,
    request: Request<Bytes>,
) -> Result<Response<Bytes>> {
    let target = plain_target(request.uri())?;

    let via_http_upstream =
        connector.upstream().map(|u| u.scheme() == UpstreamScheme::Http).unwrap_or(false);

    let (socket, request) = if via_http_upstream {
        let upstream = connector.upstream().expect("checked above");
        let stream = TcpStream::connect(upstream.address()).await.map_err(|e| {
            ProxyError::proxy(format!("upstream proxy {} unreachable", upstream.address()))
                .with_source(e)
        })?;
        let mut request = request;
        if let Some(auth) = upstream.basic_auth_header() {
            request.headers_mut().insert(
                header::PROXY_AUTHORIZATION,
                auth.parse().map_err(|_| ProxyError::proxy("invalid proxy credentials"))?,
            );
        }
        (BoxedSocket::new(stream), request)
    } else {
        (connector.connect(&target).await?, into_origin_form(request)?)
    };

    let (parts, body) = request.into_parts();
    let request = Request::from_parts(parts, Full::new(body));

    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(socket))
        .await
        .map_err(|e| ProxyError::network("HTTP/1.1 handshake failed").with_source(e))?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            debug!(err = %e, "plain HTTP connection closed");
        }
    });

    let response = sender
        .send_request(request)
        .await
        .map_err(|e| ProxyError::network("HTTP request failed").with_source(e))?;
    collect_h1_response(response).await
}

async fn collect_h1_response(
    response: Response<hyper::body::Incoming>,
) -> Result<Response<Bytes>> {
    let (parts, body) = response.into_parts();
    let collected = body
        .collect()
        .await
        .map_err(|e| ProxyError::network("failed to read response body").with_source(e))?;
    Ok(Response::from_parts(parts, collected.to_bytes()))
}

/// `host:port` for a plain-HTTP URI (default port 80).
fn plain_target(uri: &Uri) -> Result<String> {
    let host =
        uri.host().ok_or_else(|| ProxyError::network(format!("request URI has no host: {uri}")))?;
    let port = uri.port_u16().unwrap_or(80);
    Ok(format!("{host}:{port}"))
}

/// Rewrite an absolute-URI request to origin-form with a Host header.
fn into_origin_form(request: Request<Bytes>) -> Result<Request<Bytes>> {
    let (mut parts, body) = request.into_parts();

    let host_value = match (parts.uri.host(), parts.uri.port_u16()) {
        (Some(host), Some(port)) => Some(format!("{host}:{port}")),
        (Some(host), None) => Some(host.to_string()),
        (None, _) => None,
    };
    if let Some(host) = host_value {
        if !parts.headers.contains_key(header::HOST) {
            parts.headers.insert(
                header::HOST,
                host.parse().map_err(|_| ProxyError::network("invalid host for Host header"))?,
            );
        }
    }

    let path = parts
        .uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));
    parts.uri = Uri::from(path);
    parts.version = Version::HTTP_11;

    Ok(Request::from_parts(parts, body))
}

/// Drop hop-by-hop headers when rebuilding a request or response.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    const HOP_BY_HOP: [&str; 8] = [
        "connection",
        "proxy-connection",
        "keep-alive",
        "proxy-authenticate",
        "proxy-authorization",
        "te",
        "trailer",
        "upgrade",
    ];
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
