//! Mapping a fingerprint profile onto a BoringSSL connector.
//!
//! BoringSSL emits the hello for the live handshake, configured from the
//! profile with GREASE enabled and extension permutation disabled so the
//! declared ordering is what goes on the wire.
//! [`crate::fingerprint::ClientHelloSpec::encode`] remains the canonical
//! byte form used by tests and JA3 computation.

use boring::ssl::{
    ConnectConfiguration, SslConnector, SslConnectorBuilder, SslMethod, SslVerifyMode, SslVersion,
};

use crate::base::{ProxyError, Result};
use crate::fingerprint::grease::is_grease;
use crate::fingerprint::hello::Extension;
use crate::fingerprint::ClientHelloSpec;

/// Build a connector whose hello follows `spec`.
pub fn configure_connector(spec: &ClientHelloSpec) -> Result<SslConnector> {
    let mut builder = SslConnector::builder(SslMethod::tls())
        .map_err(|e| ProxyError::tls("failed to create SSL connector").with_source(e))?;
    apply_to_builder(spec, &mut builder)?;
    Ok(builder.build())
}

/// Apply `spec` to an existing connector builder.
pub fn apply_to_builder(spec: &ClientHelloSpec, builder: &mut SslConnectorBuilder) -> Result<()> {
    // Origin certificates are deliberately not verified.
    builder.set_verify(SslVerifyMode::NONE);

    builder
        .set_min_proto_version(Some(ssl_version(spec.min_version)?))
        .map_err(|e| ProxyError::tls("failed to set min TLS version").with_source(e))?;
    builder
        .set_max_proto_version(Some(ssl_version(spec.max_version)?))
        .map_err(|e| ProxyError::tls("failed to set max TLS version").with_source(e))?;

    let ciphers = cipher_list(spec)?;
    if !ciphers.is_empty() {
        builder
            .set_cipher_list(&ciphers)
            .map_err(|e| ProxyError::tls("failed to set cipher list").with_source(e))?;
    }

    for extension in &spec.extensions {
        match extension {
            Extension::SupportedCurves(curves) => {
                let list = curves_list(curves)?;
                builder
                    .set_curves_list(&list)
                    .map_err(|e| ProxyError::tls("failed to set curves").with_source(e))?;
            }
            Extension::SignatureAlgorithms(schemes) => {
                let list = sigalgs_list(schemes)?;
                builder
                    .set_sigalgs_list(&list)
                    .map_err(|e| ProxyError::tls("failed to set signature algorithms").with_source(e))?;
            }
            Extension::Alpn(protocols) => {
                let wire = alpn_wire_format(protocols);
                builder
                    .set_alpn_protos(&wire)
                    .map_err(|e| ProxyError::tls("failed to set ALPN").with_source(e))?;
            }
            Extension::StatusRequest => builder.enable_ocsp_stapling(),
            Extension::Sct => builder.enable_signed_cert_timestamps(),
            _ => {}
        }
    }

    builder.set_grease_enabled(spec.has_grease());
    // The profile's declared order is the fingerprint.
    builder.set_permute_extensions(false);

    // Every dial builds a fresh connector with an empty session cache, so
    // there is never a ticket to resume; the empty session_ticket extension
    // declared by the profile still goes out on the wire.

    // Certificate compression algorithms declared by the profile still need
    // a CertificateCompressor implementation for the BoringSSL 4.x API.
    // TODO: wire a brotli CertificateCompressor once one is implemented.

    Ok(())
}

/// Apply the settings BoringSSL only exposes per connection: ALPS
/// (`application_settings`) for the profile's declared protocols. The safe
/// API has no surface for this, so it goes through `boring_sys` on the
/// configured `SSL`.
pub fn apply_connect_settings(
    spec: &ClientHelloSpec,
    config: &mut ConnectConfiguration,
) -> Result<()> {
    use foreign_types::ForeignTypeRef;

    for extension in &spec.extensions {
        if let Extension::ApplicationSettings(protocols) = extension {
            for protocol in protocols {
                let ret = unsafe {
                    boring_sys::SSL_add_application_settings(
                        config.as_ptr(),
                        protocol.as_ptr(),
                        protocol.len(),
                        std::ptr::null(),
                        0,
                    )
                };
                if ret != 1 {
                    return Err(ProxyError::tls(format!(
                        "failed to add application settings for {protocol}"
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Encode ALPN protocols in TLS wire format (length-prefixed strings).
pub fn alpn_wire_format(protocols: &[String]) -> Vec<u8> {
    let mut wire = Vec::new();
    for protocol in protocols {
        wire.push(protocol.len() as u8);
        wire.extend_from_slice(protocol.as_bytes());
    }
    wire
}

fn ssl_version(version: u16) -> Result<SslVersion> {
    match version {
        0x0301 => Ok(SslVersion::TLS1),
        0x0302 => Ok(SslVersion::TLS1_1),
        0x0303 => Ok(SslVersion::TLS1_2),
        0x0304 => Ok(SslVersion::TLS1_3),
        other => Err(ProxyError::tls(format!("unsupported TLS version: {other:#06x}"))),
    }
}

fn cipher_list(spec: &ClientHelloSpec) -> Result<String> {
    let mut names = Vec::new();
    for &suite in &spec.cipher_suites {
        if is_grease(suite) {
            continue; // expanded by BoringSSL's own GREASE support
        }
        let name = cipher_suite_name(suite)
            .ok_or_else(|| ProxyError::tls(format!("unsupported cipher suite: {suite:#06x}")))?;
        names.push(name);
    }
    Ok(names.join(":"))
}

fn curves_list(curves: &[u16]) -> Result<String> {
    let mut names = Vec::new();
    for &curve in curves {
        if is_grease(curve) {
            continue;
        }
        let name = curve_name(curve)
            .ok_or_else(|| ProxyError::tls(format!("unsupported curve: {curve}")))?;
        names.push(name);
    }
    Ok(names.join(":"))
}

fn sigalgs_list(schemes: &[u16]) -> Result<String> {
    let mut names = Vec::new();
    for &scheme in schemes {
        let name = sigalg_name(scheme)
            .ok_or_else(|| ProxyError::tls(format!("unsupported signature scheme: {scheme:#06x}")))?;
        names.push(name);
    }
    Ok(names.join(":"))
}

fn cipher_suite_name(id: u16) -> Option<&'static str> {
    Some(match id {
        0x1301 => "TLS_AES_128_GCM_SHA256",
        0x1302 => "TLS_AES_256_GCM_SHA384",
        0x1303 => "TLS_CHACHA20_POLY1305_SHA256",
        0xc02b => "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
        0xc02f => "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
        0xc02c => "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
        0xc030 => "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
        0xcca9 => "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
        0xcca8 => "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
        0xc009 => "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA",
        0xc00a => "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA",
        0xc013 => "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
        0xc014 => "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
        0x009c => "TLS_RSA_WITH_AES_128_GCM_SHA256",
        0x009d => "TLS_RSA_WITH_AES_256_GCM_SHA384",
        0x002f => "TLS_RSA_WITH_AES_128_CBC_SHA",
        0x0035 => "TLS_RSA_WITH_AES_256_CBC_SHA",
        0x000a => "TLS_RSA_WITH_3DES_EDE_CBC_SHA",
        _ => return None,
    })
}

fn curve_name(id: u16) -> Option<&'static str> {
    Some(match id {
        29 => "X25519",
        23 => "P-256",
        24 => "P-384",
        25 => "P-521",
        _ => return None,
    })
}

fn sigalg_name(id: u16) -> Option<&'static str> {
    Some(match id {
        0x0403 => "ecdsa_secp256r1_sha256",
        0x0503 => "ecdsa_secp384r1_sha384",
        0x0603 => "ecdsa_secp521r1_sha512",
        0x0804 => "rsa_pss_rsae_sha256",
        0x0805 => "rsa_pss_rsae_sha384",
        0x0806 => "rsa_pss_rsae_sha512",
        0x0401 => "rsa_pkcs1_sha256",
        0x0501 => "rsa_pkcs1_sha384",
        0x0601 => "rsa_pkcs1_sha512",
        0x0201 => "rsa_pkcs1_sha1",
        0x0203 => "ecdsa_sha1",
        0x0807 => "ed25519",
        _ => return None,
    })
}

/// The extension codepoints BoringSSL will emit for this profile, used for
/// debug logging next to the canonical JA3.
pub fn declared_extension_types(spec: &ClientHelloSpec) -> Vec<u16> {
    spec.extensions.iter().filter_map(Extension::wire_type).collect()
}
