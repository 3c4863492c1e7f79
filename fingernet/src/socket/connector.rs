//! Proxy connectors: direct TCP, HTTP CONNECT, SOCKS5.
//!
//! `connect` returns the raw duplex stream the fingerprinted handshake runs
//! over. No TLS happens here, and nothing is written on the returned stream
//! by the connector itself once the tunnel is established.

use std::net::IpAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::base::{ProxyError, Result};
use crate::socket::proxy::{UpstreamProxy, UpstreamScheme};
use crate::socket::stream::{BoxedSocket, PrefixedSocket};

const SOCKS5_VERSION: u8 = 0x05;
const AUTH_NONE: u8 = 0x00;
const AUTH_PASSWORD: u8 = 0x02;
const AUTH_NO_ACCEPTABLE: u8 = 0xff;
const CMD_CONNECT: u8 = 0x01;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

/// Opens raw byte streams to `host:port` targets, optionally through an
/// upstream proxy. Direct is just "open TCP"; there is no dialer hierarchy.
#[derive(Debug, Clone, Default)]
pub struct ProxyConnector {
    upstream: Option<UpstreamProxy>,
}

impl ProxyConnector {
    pub fn direct() -> Self {
        Self { upstream: None }
    }

    pub fn via(upstream: UpstreamProxy) -> Self {
        Self { upstream: Some(upstream) }
    }

    pub fn new(upstream: Option<UpstreamProxy>) -> Self {
        Self { upstream }
    }

    pub fn upstream(&self) -> Option<&UpstreamProxy> {
        self.upstream.as_ref()
    }

    /// Open a raw stream to `target` (`host:port`).
    pub async fn connect(&self, target: &str) -> Result<BoxedSocket> {
        match &self.upstream {
            None => {
                let stream = connect_tcp(target, super::proxy::DEFAULT_CONNECT_TIMEOUT).await?;
                Ok(BoxedSocket::new(stream))
            }
            Some(upstream) => match upstream.scheme() {
                UpstreamScheme::Http => http_connect(upstream, target).await,
                UpstreamScheme::Socks5 => socks5_connect(upstream, target).await,
            },
        }
    }
}

async fn connect_tcp(addr: &str, timeout: Duration) -> Result<TcpStream> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => {
            Err(ProxyError::network(format!("TCP connect to {addr} failed")).with_source(e))
        }
        Err(_) => Err(ProxyError::network(format!("TCP connect to {addr} timed out"))),
    }
}

/// HTTP CONNECT tunnel. Header bytes buffered past the blank line are pushed
/// back in front of the returned stream.
async fn http_connect(upstream: &UpstreamProxy, target: &str) -> Result<BoxedSocket> {
    let mut stream = connect_tcp(&upstream.address(), upstream.connect_timeout)
        .await
        .map_err(|e| ProxyError::proxy("upstream proxy unreachable").with_source(e))?;

    let mut request = format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n");
    if let Some(auth) = upstream.basic_auth_header() {
        request.push_str(&format!("Proxy-Authorization: {auth}\r\n"));
    }
    request.push_str("\r\n");

    debug!(target = %target, upstream = %upstream.address(), "sending CONNECT to upstream");
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(|e| ProxyError::proxy("failed to send CONNECT request").with_source(e))?;

    // Read until the end of the response headers; keep any overshoot.
    let mut response = Vec::with_capacity(256);
    let mut buf = [0u8; 256];
    let header_end = loop {
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| ProxyError::proxy("failed to read CONNECT response").with_source(e))?;
        if n == 0 {
            return Err(ProxyError::proxy("upstream closed during CONNECT"));
        }
        response.extend_from_slice(&buf[..n]);
        if let Some(pos) = find_header_end(&response) {
            break pos;
        }
        if response.len() > 8192 {
            return Err(ProxyError::proxy("CONNECT response headers too large"));
        }
    };

    let head = String::from_utf8_lossy(&response[..header_end]);
    let status_line = head.lines().next().unwrap_or_default();
    if !status_line.contains("200") {
        return Err(ProxyError::proxy(format!("upstream CONNECT refused: {status_line}")));
    }

    let remainder = Bytes::copy_from_slice(&response[header_end..]);
    Ok(BoxedSocket::new(PrefixedSocket::new(remainder, stream)))
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
}

/// SOCKS5 tunnel (RFC 1928), username/password auth per RFC 1929.
async fn socks5_connect(upstream: &UpstreamProxy, target: &str) -> Result<BoxedSocket> {
    let mut stream = connect_tcp(&upstream.address(), upstream.connect_timeout)
        .await
        .map_err(|e| ProxyError::proxy("upstream proxy unreachable").with_source(e))?;

    // Method selection.
    let methods: &[u8] =
        if upstream.requires_auth() { &[AUTH_NONE, AUTH_PASSWORD] } else { &[AUTH_NONE] };
    let mut greeting = Vec::with_capacity(2 + methods.len());
    greeting.push(SOCKS5_VERSION);
    greeting.push(methods.len() as u8);
    greeting.extend_from_slice(methods);
    write_socks(&mut stream, &greeting).await?;

    let mut choice = [0u8; 2];
    read_socks(&mut stream, &mut choice).await?;
    if choice[0] != SOCKS5_VERSION {
        return Err(ProxyError::proxy(format!("unsupported SOCKS version: {}", choice[0])));
    }
    match choice[1] {
        AUTH_NONE => {}
        AUTH_PASSWORD => socks5_authenticate(&mut stream, upstream).await?,
        AUTH_NO_ACCEPTABLE => {
            return Err(ProxyError::proxy("SOCKS5 server accepted no auth method"))
        }
        other => return Err(ProxyError::proxy(format!("unsupported SOCKS5 auth method: {other}"))),
    }

    // CONNECT request.
    let (host, port) = split_host_port(target)?;
    let mut request = vec![SOCKS5_VERSION, CMD_CONNECT, 0x00];
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => {
            request.push(ATYP_IPV4);
            request.extend_from_slice(&ip.octets());
        }
        Ok(IpAddr::V6(ip)) => {
            request.push(ATYP_IPV6);
            request.extend_from_slice(&ip.octets());
        }
        Err(_) => {
            if host.len() > 255 {
                return Err(ProxyError::proxy("SOCKS5 domain name too long"));
            }
            request.push(ATYP_DOMAIN);
            request.push(host.len() as u8);
            request.extend_from_slice(host.as_bytes());
        }
    }
    request.extend_from_slice(&port.to_be_bytes());
    write_socks(&mut stream, &request).await?;

    // Reply: {ver, rep, rsvd, atyp} then the bound address + port.
    let mut reply = [0u8; 4];
    read_socks(&mut stream, &mut reply).await?;
    if reply[0] != SOCKS5_VERSION {
        return Err(ProxyError::proxy(format!("unsupported SOCKS version: {}", reply[0])));
    }
    if reply[1] != 0x00 {
        return Err(ProxyError::proxy(format!("SOCKS5 CONNECT failed: status {}", reply[1])));
    }
    let bound_len = match reply[3] {
        ATYP_IPV4 => 4 + 2,
        ATYP_IPV6 => 16 + 2,
        ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            read_socks(&mut stream, &mut len).await?;
            usize::from(len[0]) + 2
        }
        other => return Err(ProxyError::proxy(format!("unknown SOCKS5 address type: {other}"))),
    };
    // Any short read here is a protocol error.
    let mut bound = vec![0u8; bound_len];
    read_socks(&mut stream, &mut bound).await?;

    debug!(target = %target, upstream = %upstream.address(), "SOCKS5 tunnel established");
    Ok(BoxedSocket::new(stream))
}

async fn socks5_authenticate(stream: &mut TcpStream, upstream: &UpstreamProxy) -> Result<()> {
    let (user, pass) = upstream
        .socks5_auth()
        .ok_or_else(|| ProxyError::proxy("SOCKS5 server requires credentials"))?;
    if user.len() > 255 || pass.len() > 255 {
        return Err(ProxyError::proxy("SOCKS5 credentials too long"));
    }

    let mut request = Vec::with_capacity(3 + user.len() + pass.len());
    request.push(0x01); // auth sub-negotiation version
    request.push(user.len() as u8);
    request.extend_from_slice(user.as_bytes());
    request.push(pass.len() as u8);
    request.extend_from_slice(pass.as_bytes());
    write_socks(stream, &request).await?;

    let mut response = [0u8; 2];
    read_socks(stream, &mut response).await?;
    if response[1] != 0x00 {
        return Err(ProxyError::proxy("SOCKS5 authentication rejected"));
    }
    Ok(())
}

async fn write_socks(stream: &mut TcpStream, data: &[u8]) -> Result<()> {
    stream
        .write_all(data)
        .await
        .map_err(|e| ProxyError::proxy("SOCKS5 write failed").with_source(e))
}

async fn read_socks(stream: &mut TcpStream, buf: &mut [u8]) -> Result<()> {
    stream
        .read_exact(buf)
        .await
        .map_err(|e| ProxyError::proxy("SOCKS5 short read").with_source(e))
        .map(|_| ())
}

fn split_host_port(target: &str) -> Result<(&str, u16)> {
    let (host, port) = target
        .rsplit_once(':')
        .ok_or_else(|| ProxyError::proxy(format!("target missing port: {target}")))?;
    let port: u16 = port
        .parse()
        .map_err(|e| ProxyError::proxy(format!("invalid target port: {target}")).with_source(e))?;
    // Bracketed IPv6 literals keep their brackets in the URI authority.
    Ok((host.trim_start_matches('[').trim_end_matches(']'), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_host_and_port() {
        assert_eq!(split_host_port("example.com:443").unwrap(), ("example.com", 443));
        assert_eq!(split_host_port("[::1]:8443").unwrap(), ("::1", 8443));
        assert!(split_host_port("example.com").is_err());
        assert!(split_host_port("example.com:notaport").is_err());
    }

    #[test]
    fn header_end_detection() {
        assert_eq!(find_header_end(b"HTTP/1.1 200 OK\r\n\r\n"), Some(19));
        assert_eq!(find_header_end(b"HTTP/1.1 200 OK\r\n\r\nextra"), Some(19));
        assert_eq!(find_header_end(b"HTTP/1.1 200 OK\r\n"), None);
    }
}
