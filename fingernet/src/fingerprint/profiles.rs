//! Named fingerprint profiles.
//!
//! Three profiles ship built in: `default` (HTTP/2-capable, Chrome-like),
//! `http1` (ALPN restricted to `http/1.1`), and `http2` (ALPN restricted to
//! `h2`). Additional profiles register by name on a [`ProfileRegistry`].

use std::sync::Arc;

use dashmap::DashMap;

use crate::fingerprint::grease::GREASE_PLACEHOLDER;
use crate::fingerprint::hello::{
    cert_compression, group, ClientHelloSpec, Extension, KeyShareEntry, PaddingPolicy,
    PskIdentity, RenegotiationMode, VERSION_TLS12, VERSION_TLS13,
};

/// Chrome-like HTTP/2-capable profile.
///
/// Emission order: SNI, extended master secret, renegotiation info, curves,
/// points, session ticket, ALPN, status request, signature algorithms, SCT,
/// key share, PSK modes, supported versions, certificate compression,
/// application settings, padding, two GREASE slots, fake pre-shared key.
pub fn default_profile() -> ClientHelloSpec {
    ClientHelloSpec::builder()
        .min_version(VERSION_TLS12)
        .max_version(VERSION_TLS13)
        .cipher_suites([
            GREASE_PLACEHOLDER,
            0x1301, // TLS_AES_128_GCM_SHA256
            0x1302, // TLS_AES_256_GCM_SHA384
            0x1303, // TLS_CHACHA20_POLY1305_SHA256
            0xc02b, // TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256
            0xc02f, // TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
            0xc02c, // TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384
            0xc030, // TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384
            0xcca9, // TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305
            0xcca8, // TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305
            0xc013, // TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA
            0xc014, // TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA
            0x009c, // TLS_RSA_WITH_AES_128_GCM_SHA256
            0x009d, // TLS_RSA_WITH_AES_256_GCM_SHA384
            0x002f, // TLS_RSA_WITH_AES_128_CBC_SHA
            0x0035, // TLS_RSA_WITH_AES_256_CBC_SHA
        ])
        .compression_methods([0])
        .extensions([
            Extension::ServerName,
            Extension::ExtendedMasterSecret,
            Extension::RenegotiationInfo(RenegotiationMode::OnceAsClient),
            Extension::SupportedCurves(vec![
                GREASE_PLACEHOLDER,
                group::X25519,
                group::P256,
                group::P384,
            ]),
            Extension::SupportedPoints(vec![0]),
            Extension::SessionTicket,
            Extension::Alpn(vec!["h2".into(), "http/1.1".into()]),
            Extension::StatusRequest,
            Extension::SignatureAlgorithms(vec![
                0x0403, // ecdsa_secp256r1_sha256
                0x0804, // rsa_pss_rsae_sha256
                0x0401, // rsa_pkcs1_sha256
                0x0503, // ecdsa_secp384r1_sha384
                0x0805, // rsa_pss_rsae_sha384
                0x0501, // rsa_pkcs1_sha384
                0x0806, // rsa_pss_rsae_sha512
                0x0601, // rsa_pkcs1_sha512
            ]),
            Extension::Sct,
            Extension::KeyShare(vec![
                KeyShareEntry::group(group::X25519),
                KeyShareEntry::group(group::P256),
            ]),
            Extension::PskKeyExchangeModes(vec![1]),
            Extension::SupportedVersions(vec![GREASE_PLACEHOLDER, VERSION_TLS13, VERSION_TLS12]),
            Extension::CertCompression(vec![cert_compression::BROTLI]),
            Extension::ApplicationSettings(vec!["h2".into()]),
            Extension::Padding(PaddingPolicy::Boring),
            Extension::Grease,
            Extension::Grease,
            Extension::FakePreSharedKey {
                identities: vec![PskIdentity {
                    label: b"identity".to_vec(),
                    obfuscated_ticket_age: 0,
                }],
                binders: vec![vec![0u8; 32]],
            },
        ])
        .build()
}

/// HTTP/1.1-only profile: ALPN restricted to `http/1.1`, a reduced cipher
/// list, and a TLS 1.2 hello (no key share or supported versions).
pub fn http1() -> ClientHelloSpec {
    ClientHelloSpec::builder()
        .min_version(VERSION_TLS12)
        .max_version(VERSION_TLS12)
        .cipher_suites([0x1301, 0x1302, 0x1303, 0xc02b, 0xc02f])
        .compression_methods([0])
        .extensions([
            Extension::ServerName,
            Extension::ExtendedMasterSecret,
            Extension::RenegotiationInfo(RenegotiationMode::OnceAsClient),
            Extension::SupportedCurves(vec![group::X25519, group::P256, group::P384]),
            Extension::SupportedPoints(vec![0]),
            Extension::SessionTicket,
            Extension::Alpn(vec!["http/1.1".into()]),
            Extension::StatusRequest,
            Extension::SignatureAlgorithms(vec![0x0403, 0x0804, 0x0401]),
        ])
        .build()
}

/// HTTP/2-only profile: identical shape to [`default_profile`] with ALPN
/// restricted to `h2`.
pub fn http2() -> ClientHelloSpec {
    let mut spec = default_profile();
    for ext in &mut spec.extensions {
        if let Extension::Alpn(protocols) = ext {
            *protocols = vec!["h2".into()];
        }
    }
    spec
}

type SpecFactory = Arc<dyn Fn() -> ClientHelloSpec + Send + Sync>;

/// Named profile registry. `default`, `http1` and `http2` are pre-registered;
/// callers add their own with [`ProfileRegistry::register`].
pub struct ProfileRegistry {
    factories: DashMap<String, SpecFactory>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ProfileRegistry {
    pub fn with_builtins() -> Self {
        let registry = Self { factories: DashMap::new() };
        registry.register("default", default_profile);
        registry.register("http1", http1);
        registry.register("http2", http2);
        registry
    }

    pub fn register<F>(&self, name: &str, factory: F)
    where
        F: Fn() -> ClientHelloSpec + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    pub fn get(&self, name: &str) -> Option<ClientHelloSpec> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.factories.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::hello::ext_type;

    #[test]
    fn default_profile_matches_wire_contract() {
        let spec = default_profile();
        assert_eq!(spec.min_version, VERSION_TLS12);
        assert_eq!(spec.max_version, VERSION_TLS13);
        assert_eq!(
            spec.cipher_suites,
            vec![
                GREASE_PLACEHOLDER,
                4865,
                4866,
                4867,
                49195,
                49199,
                49196,
                49200,
                52393,
                52392,
                49171,
                49172,
                156,
                157,
                47,
                53
            ]
        );
        assert_eq!(spec.compression_methods, vec![0]);
        let types: Vec<Option<u16>> =
            spec.extensions.iter().map(Extension::wire_type).collect();
        assert_eq!(
            types,
            vec![
                Some(ext_type::SERVER_NAME),
                Some(ext_type::EXTENDED_MASTER_SECRET),
                Some(ext_type::RENEGOTIATION_INFO),
                Some(ext_type::SUPPORTED_CURVES),
                Some(ext_type::SUPPORTED_POINTS),
                Some(ext_type::SESSION_TICKET),
                Some(ext_type::ALPN),
                Some(ext_type::STATUS_REQUEST),
                Some(ext_type::SIGNATURE_ALGORITHMS),
                Some(ext_type::SCT),
                Some(ext_type::KEY_SHARE),
                Some(ext_type::PSK_KEY_EXCHANGE_MODES),
                Some(ext_type::SUPPORTED_VERSIONS),
                Some(ext_type::CERT_COMPRESSION),
                Some(ext_type::APPLICATION_SETTINGS),
                Some(ext_type::PADDING),
                None,
                None,
                Some(ext_type::PRE_SHARED_KEY),
            ]
        );
        assert_eq!(spec.alpn_protocols(), vec!["h2".to_string(), "http/1.1".to_string()]);
    }

    #[test]
    fn alpn_restrictions() {
        assert_eq!(http1().alpn_protocols(), vec!["http/1.1".to_string()]);
        assert_eq!(http2().alpn_protocols(), vec!["h2".to_string()]);
        assert_eq!(http1().max_version, VERSION_TLS12);
    }

    #[test]
    fn registry_lookup_and_custom_registration() {
        let registry = ProfileRegistry::with_builtins();
        assert!(registry.get("default").is_some());
        assert!(registry.get("nope").is_none());
        assert_eq!(registry.names(), vec!["default", "http1", "http2"]);

        registry.register("h1-short", || http1());
        let custom = registry.get("h1-short").expect("registered");
        assert_eq!(custom.alpn_protocols(), vec!["http/1.1".to_string()]);
    }

    #[test]
    fn ja3_is_stable_per_profile() {
        // Same profile, same JA3 - GREASE draws never leak into the hash.
        assert_eq!(default_profile().ja3_hash(), default_profile().ja3_hash());
        assert_ne!(default_profile().ja3_hash(), http1().ja3_hash());
    }
}
