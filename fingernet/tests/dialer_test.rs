//! Fingerprinted dialer tests against in-process TLS origins.
//!
//! Negotiated ALPN decides the outbound wire protocol: `h2` drives HTTP/2
//! framing over the dialed stream, anything else an HTTP/1.1 request.

use std::sync::Arc;

use boring::ssl::{AlpnError, SslAcceptor, SslMethod};
use bytes::Bytes;
use fingernet::cert::{CertAuthority, RootOptions};
use fingernet::fingerprint::profiles;
use fingernet::http::transport::HttpsSession;
use fingernet::http::H2Settings;
use fingernet::tls::{DialerConfig, FingerprintDialer};
use http::Request;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn test_acceptor(alpn_h2: bool) -> SslAcceptor {
    let (cert_pem, key_pem) = CertAuthority::generate_root(&RootOptions::default()).unwrap();
    let ca = CertAuthority::from_pem(&cert_pem, &key_pem).unwrap();
    let leaf = ca.mint_leaf("localhost").unwrap();

    let mut builder = SslAcceptor::mozilla_intermediate(SslMethod::tls()).unwrap();
    builder.set_certificate(&leaf.cert).unwrap();
    builder.set_private_key(&leaf.key).unwrap();
    if alpn_h2 {
        builder.set_alpn_select_callback(|_, protos| {
            boring::ssl::select_next_proto(b"\x02h2", protos).ok_or(AlpnError::NOACK)
        });
    }
    builder.build()
}

fn dialer(profile: fingernet::fingerprint::ClientHelloSpec) -> FingerprintDialer {
    FingerprintDialer::new(DialerConfig::new(Arc::new(profile)))
}

#[tokio::test]
async fn h2_alpn_selects_http2_transport() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let acceptor = test_acceptor(true);

    let origin = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let tls = tokio_boring::accept(&acceptor, stream).await.unwrap();
        assert_eq!(tls.ssl().selected_alpn_protocol(), Some(&b"h2"[..]));

        // Serve one HTTP/2 request over the accepted stream.
        let mut connection = h2::server::handshake(tls).await.unwrap();
        if let Some(result) = connection.accept().await {
            let (request, mut respond) = result.unwrap();
            assert_eq!(request.uri().path(), "/h2-check");
            let response = http::Response::builder().status(200).body(()).unwrap();
            let mut stream = respond.send_response(response, false).unwrap();
            stream.send_data(Bytes::from_static(b"over-h2"), true).unwrap();
        }
    });

    let dialer = dialer(profiles::default_profile());
    let dialed = dialer.dial(&addr.to_string()).await.unwrap();
    assert_eq!(dialed.alpn.as_deref(), Some("h2"));

    let mut session = HttpsSession::establish(dialed, H2Settings::default()).await.unwrap();
    assert!(session.is_h2());

    let request = Request::builder()
        .method("GET")
        .uri(format!("https://{addr}/h2-check"))
        .body(Bytes::new())
        .unwrap();
    let response = session.send(request).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.body().as_ref(), b"over-h2");

    origin.await.unwrap();
}

#[tokio::test]
async fn no_alpn_falls_back_to_http1_transport() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let acceptor = test_acceptor(false);

    let origin = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut tls = tokio_boring::accept(&acceptor, stream).await.unwrap();
        assert_eq!(tls.ssl().selected_alpn_protocol(), None);

        // The outbound wire bytes must be an HTTP/1.1 request line.
        let mut request = Vec::new();
        let mut buf = [0u8; 512];
        loop {
            let n = tls.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
            if request.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }
        let head = String::from_utf8(request).unwrap();
        assert!(head.starts_with("GET /h1-check HTTP/1.1\r\n"), "got: {head}");

        tls.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 7\r\n\r\nover-h1").await.unwrap();
    });

    let dialer = dialer(profiles::http1());
    let dialed = dialer.dial(&addr.to_string()).await.unwrap();
    assert_ne!(dialed.alpn.as_deref(), Some("h2"));

    let mut session = HttpsSession::establish(dialed, H2Settings::default()).await.unwrap();
    assert!(!session.is_h2());

    let request = Request::builder()
        .method("GET")
        .uri(format!("https://{addr}/h1-check"))
        .body(Bytes::new())
        .unwrap();
    let response = session.send(request).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.body().as_ref(), b"over-h1");

    origin.await.unwrap();
}

#[tokio::test]
async fn dial_failure_maps_to_network_error() {
    // A port that nothing listens on: bind then drop to reserve-and-release.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dialer = dialer(profiles::default_profile());
    let err = dialer.dial(&addr.to_string()).await.unwrap_err();
    assert!(err.is_kind(fingernet::base::ErrorKind::Network));
}
