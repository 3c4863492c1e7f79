//! Fetch a URL directly through the fingerprinted dialer (no proxy),
//! printing the negotiated ALPN and the response status.
//!
//! ```sh
//! cargo run --example fetch_with_fingerprint -- tls.peet.ws
//! ```

use std::sync::Arc;

use bytes::Bytes;
use fingernet::fingerprint::profiles;
use fingernet::http::transport::HttpsSession;
use fingernet::http::H2Settings;
use fingernet::tls::{DialerConfig, FingerprintDialer};
use http::Request;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let host = std::env::args().nth(1).unwrap_or_else(|| "example.com".to_string());
    let target = format!("{host}:443");

    let dialer =
        FingerprintDialer::new(DialerConfig::new(Arc::new(profiles::default_profile())));
    let dialed = dialer.dial(&target).await?;
    println!("negotiated ALPN: {}", dialed.alpn.as_deref().unwrap_or("none"));

    let mut session = HttpsSession::establish(dialed, H2Settings::default()).await?;
    let request = Request::builder()
        .method("GET")
        .uri(format!("https://{host}/"))
        .header("user-agent", "fingernet/0.1")
        .body(Bytes::new())?;
    let response = session.send(request).await?;

    println!("status: {}", response.status());
    println!("body bytes: {}", response.body().len());
    Ok(())
}
