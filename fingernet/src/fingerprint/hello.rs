//! ClientHello specification model and serializer.
//!
//! [`ClientHelloSpec`] declares the exact shape of the hello a dial emits:
//! version range, ordered cipher list, compression methods, and an ordered
//! list of tagged extensions. [`ClientHelloSpec::encode`] serializes the
//! declared order exactly; the only dynamic inputs are the SNI hostname,
//! GREASE expansion, ephemeral key shares, and the client random/session id
//! (pinned through [`HelloParams`] so tests can fix them).

use rand::RngCore;

use crate::base::{ProxyError, Result};
use crate::fingerprint::grease::{is_grease, GreaseAllocator, GREASE_PLACEHOLDER};

/// TLS wire versions.
pub const VERSION_TLS12: u16 = 0x0303;
pub const VERSION_TLS13: u16 = 0x0304;

/// Extension type codepoints.
pub mod ext_type {
    pub const SERVER_NAME: u16 = 0;
    pub const STATUS_REQUEST: u16 = 5;
    pub const SUPPORTED_CURVES: u16 = 10;
    pub const SUPPORTED_POINTS: u16 = 11;
    pub const SIGNATURE_ALGORITHMS: u16 = 13;
    pub const ALPN: u16 = 16;
    pub const SCT: u16 = 18;
    pub const PADDING: u16 = 21;
    pub const EXTENDED_MASTER_SECRET: u16 = 23;
    pub const CERT_COMPRESSION: u16 = 27;
    pub const SESSION_TICKET: u16 = 35;
    pub const PRE_SHARED_KEY: u16 = 41;
    pub const SUPPORTED_VERSIONS: u16 = 43;
    pub const PSK_KEY_EXCHANGE_MODES: u16 = 45;
    pub const KEY_SHARE: u16 = 51;
    pub const APPLICATION_SETTINGS: u16 = 17513;
    pub const RENEGOTIATION_INFO: u16 = 0xff01;
}

/// Named group codepoints used by the built-in profiles.
pub mod group {
    pub const X25519: u16 = 29;
    pub const P256: u16 = 23;
    pub const P384: u16 = 24;
}

/// Certificate compression algorithms (RFC 8879).
pub mod cert_compression {
    pub const ZLIB: u16 = 1;
    pub const BROTLI: u16 = 2;
    pub const ZSTD: u16 = 3;
}

/// Renegotiation indication carried by the `renegotiation_info` extension.
/// The initial hello always carries an empty renegotiated-connection field;
/// the mode records the declared client policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenegotiationMode {
    Never,
    OnceAsClient,
}

/// One entry of the `key_share` extension. A `None` key is filled with a
/// fresh ephemeral share of the group's length at emission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyShareEntry {
    pub group: u16,
    pub key: Option<Vec<u8>>,
}

impl KeyShareEntry {
    pub fn group(group: u16) -> Self {
        Self { group, key: None }
    }

    fn share_len(group: u16) -> usize {
        match group {
            group::X25519 => 32,
            group::P256 => 65,
            group::P384 => 97,
            _ => 32,
        }
    }
}

/// A PSK identity inside the `pre_shared_key` extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PskIdentity {
    pub label: Vec<u8>,
    pub obfuscated_ticket_age: u32,
}

/// Padding policy for the `padding` extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingPolicy {
    /// BoringSSL style: pad the hello to 512 bytes when its unpadded length
    /// falls in (255, 511]; otherwise the extension is omitted.
    Boring,
}

/// A tagged ClientHello extension. Serialized in exactly the declared order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    /// SNI; the hostname is filled in at dial time.
    ServerName,
    ExtendedMasterSecret,
    RenegotiationInfo(RenegotiationMode),
    /// Ordered curve ids; may contain [`GREASE_PLACEHOLDER`].
    SupportedCurves(Vec<u16>),
    SupportedPoints(Vec<u8>),
    SessionTicket,
    /// Ordered ALPN protocols; the ordering decides HTTP version preference.
    Alpn(Vec<String>),
    StatusRequest,
    SignatureAlgorithms(Vec<u16>),
    Sct,
    KeyShare(Vec<KeyShareEntry>),
    PskKeyExchangeModes(Vec<u8>),
    /// Ordered versions; may contain [`GREASE_PLACEHOLDER`].
    SupportedVersions(Vec<u16>),
    CertCompression(Vec<u16>),
    ApplicationSettings(Vec<String>),
    Padding(PaddingPolicy),
    /// One distinct GREASE placeholder per occurrence.
    Grease,
    /// Offered identities with precomputed binders; not backed by a real
    /// session, purely a fingerprint artifact. Must be last.
    FakePreSharedKey { identities: Vec<PskIdentity>, binders: Vec<Vec<u8>> },
}

impl Extension {
    /// The wire codepoint, or `None` for GREASE slots (drawn at emission).
    pub fn wire_type(&self) -> Option<u16> {
        use Extension::*;
        Some(match self {
            ServerName => ext_type::SERVER_NAME,
            ExtendedMasterSecret => ext_type::EXTENDED_MASTER_SECRET,
            RenegotiationInfo(_) => ext_type::RENEGOTIATION_INFO,
            SupportedCurves(_) => ext_type::SUPPORTED_CURVES,
            SupportedPoints(_) => ext_type::SUPPORTED_POINTS,
            SessionTicket => ext_type::SESSION_TICKET,
            Alpn(_) => ext_type::ALPN,
            StatusRequest => ext_type::STATUS_REQUEST,
            SignatureAlgorithms(_) => ext_type::SIGNATURE_ALGORITHMS,
            Sct => ext_type::SCT,
            KeyShare(_) => ext_type::KEY_SHARE,
            PskKeyExchangeModes(_) => ext_type::PSK_KEY_EXCHANGE_MODES,
            SupportedVersions(_) => ext_type::SUPPORTED_VERSIONS,
            CertCompression(_) => ext_type::CERT_COMPRESSION,
            ApplicationSettings(_) => ext_type::APPLICATION_SETTINGS,
            Padding(_) => ext_type::PADDING,
            FakePreSharedKey { .. } => ext_type::PRE_SHARED_KEY,
            Grease => return None,
        })
    }
}

/// Dynamic per-hello inputs that are random in production and pinned in
/// tests.
#[derive(Debug, Clone)]
pub struct HelloParams {
    pub client_random: [u8; 32],
    pub session_id: [u8; 32],
}

impl HelloParams {
    pub fn generate(rng: &mut dyn RngCore) -> Self {
        let mut client_random = [0u8; 32];
        let mut session_id = [0u8; 32];
        rng.fill_bytes(&mut client_random);
        rng.fill_bytes(&mut session_id);
        Self { client_random, session_id }
    }

    /// All-zero inputs, for deterministic serialization tests.
    pub fn zeroed() -> Self {
        Self { client_random: [0u8; 32], session_id: [0u8; 32] }
    }
}

/// Declarative description of a ClientHello.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHelloSpec {
    pub min_version: u16,
    pub max_version: u16,
    pub cipher_suites: Vec<u16>,
    pub compression_methods: Vec<u8>,
    pub extensions: Vec<Extension>,
}

impl ClientHelloSpec {
    pub fn builder() -> ClientHelloSpecBuilder {
        ClientHelloSpecBuilder::new()
    }

    /// True if any cipher/curve/version slot or extension is a GREASE
    /// placeholder.
    pub fn has_grease(&self) -> bool {
        if self.cipher_suites.contains(&GREASE_PLACEHOLDER) {
            return true;
        }
        self.extensions.iter().any(|ext| match ext {
            Extension::Grease => true,
            Extension::SupportedCurves(curves) => curves.contains(&GREASE_PLACEHOLDER),
            Extension::SupportedVersions(versions) => versions.contains(&GREASE_PLACEHOLDER),
            _ => false,
        })
    }

    /// The ALPN protocols declared by the profile, in preference order.
    pub fn alpn_protocols(&self) -> Vec<String> {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                Extension::Alpn(protocols) => Some(protocols.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Serialize the ClientHello handshake message (type + length + body)
    /// for `server_name`, preserving the declared field order exactly.
    ///
    /// Emission resolves the dynamic fields: SNI from `server_name`, empty
    /// key shares to fresh ephemerals, and every GREASE placeholder to an
    /// independent value from the RFC 8701 set. Re-invoking (for a
    /// HelloRetryRequest path) re-emits in the same order.
    pub fn encode(
        &self,
        server_name: &str,
        params: &HelloParams,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<u8>> {
        if server_name.is_empty() {
            return Err(ProxyError::tls("ClientHello requires a server name"));
        }
        let mut grease = GreaseAllocator::new();

        let mut body = Vec::with_capacity(512);
        // legacy_version is capped at TLS 1.2; newer versions ride in the
        // supported_versions extension.
        put_u16(&mut body, self.max_version.min(VERSION_TLS12));
        body.extend_from_slice(&params.client_random);
        body.push(params.session_id.len() as u8);
        body.extend_from_slice(&params.session_id);

        put_u16(&mut body, (self.cipher_suites.len() * 2) as u16);
        for &suite in &self.cipher_suites {
            let suite = if suite == GREASE_PLACEHOLDER { grease.value(rng) } else { suite };
            put_u16(&mut body, suite);
        }

        body.push(self.compression_methods.len() as u8);
        body.extend_from_slice(&self.compression_methods);

        // First pass serializes every extension except padding content, so
        // the padding policy can see the unpadded hello length.
        let mut encoded: Vec<(u16, Vec<u8>)> = Vec::with_capacity(self.extensions.len());
        let mut padding_slot: Option<(usize, PaddingPolicy)> = None;
        for ext in &self.extensions {
            match ext {
                Extension::Padding(policy) => {
                    if padding_slot.is_some() {
                        return Err(ProxyError::tls("duplicate padding extension"));
                    }
                    padding_slot = Some((encoded.len(), *policy));
                }
                Extension::Grease => {
                    encoded.push((grease.extension_type(rng), Vec::new()));
                }
                other => encoded.push(self.encode_extension(other, server_name, rng, &mut grease)?),
            }
        }

        let unpadded_ext_len: usize = encoded.iter().map(|(_, data)| 4 + data.len()).sum();
        // 4-byte handshake header + body so far + 2-byte extensions length.
        let unpadded_hello_len = 4 + body.len() + 2 + unpadded_ext_len;
        if let Some((index, PaddingPolicy::Boring)) = padding_slot {
            if let Some(pad_len) = boring_padding_len(unpadded_hello_len) {
                encoded.insert(index, (ext_type::PADDING, vec![0u8; pad_len]));
            }
        }

        let ext_len: usize = encoded.iter().map(|(_, data)| 4 + data.len()).sum();
        put_u16(&mut body, ext_len as u16);
        for (ext_type, data) in encoded {
            put_u16(&mut body, ext_type);
            put_u16(&mut body, data.len() as u16);
            body.extend_from_slice(&data);
        }

        let mut message = Vec::with_capacity(4 + body.len());
        message.push(0x01); // handshake type: client_hello
        message.push(0);
        put_u16(&mut message, body.len() as u16);
        message.extend_from_slice(&body);
        Ok(message)
    }

    fn encode_extension(
        &self,
        ext: &Extension,
        server_name: &str,
        rng: &mut dyn RngCore,
        grease: &mut GreaseAllocator,
    ) -> Result<(u16, Vec<u8>)> {
        let ext_type = ext.wire_type().expect("grease handled by caller");
        let mut data = Vec::new();
        match ext {
            Extension::ServerName => {
                let name = server_name.as_bytes();
                put_u16(&mut data, (name.len() + 3) as u16);
                data.push(0); // name_type: host_name
                put_u16(&mut data, name.len() as u16);
                data.extend_from_slice(name);
            }
            Extension::ExtendedMasterSecret | Extension::SessionTicket | Extension::Sct => {}
            Extension::RenegotiationInfo(_) => {
                data.push(0); // empty renegotiated_connection
            }
            Extension::SupportedCurves(curves) => {
                put_u16(&mut data, (curves.len() * 2) as u16);
                for &curve in curves {
                    let curve =
                        if curve == GREASE_PLACEHOLDER { grease.value(rng) } else { curve };
                    put_u16(&mut data, curve);
                }
            }
            Extension::SupportedPoints(points) => {
                data.push(points.len() as u8);
                data.extend_from_slice(points);
            }
            Extension::Alpn(protocols) => {
                if protocols.is_empty() {
                    return Err(ProxyError::tls("ALPN extension with no protocols"));
                }
                let list_len: usize = protocols.iter().map(|p| 1 + p.len()).sum();
                put_u16(&mut data, list_len as u16);
                for protocol in protocols {
                    data.push(protocol.len() as u8);
                    data.extend_from_slice(protocol.as_bytes());
                }
            }
            Extension::StatusRequest => {
                data.push(1); // status_type: ocsp
                put_u16(&mut data, 0); // responder_id_list
                put_u16(&mut data, 0); // request_extensions
            }
            Extension::SignatureAlgorithms(schemes) => {
                put_u16(&mut data, (schemes.len() * 2) as u16);
                for &scheme in schemes {
                    put_u16(&mut data, scheme);
                }
            }
            Extension::KeyShare(entries) => {
                let mut shares = Vec::new();
                for entry in entries {
                    put_u16(&mut shares, entry.group);
                    match &entry.key {
                        Some(key) => {
                            put_u16(&mut shares, key.len() as u16);
                            shares.extend_from_slice(key);
                        }
                        None => {
                            let len = KeyShareEntry::share_len(entry.group);
                            let mut key = vec![0u8; len];
                            rng.fill_bytes(&mut key);
                            // Uncompressed EC points lead with 0x04.
                            if entry.group != group::X25519 {
                                key[0] = 0x04;
                            }
                            put_u16(&mut shares, key.len() as u16);
                            shares.extend_from_slice(&key);
                        }
                    }
                }
                put_u16(&mut data, shares.len() as u16);
                data.extend_from_slice(&shares);
            }
            Extension::PskKeyExchangeModes(modes) => {
                data.push(modes.len() as u8);
                data.extend_from_slice(modes);
            }
            Extension::SupportedVersions(versions) => {
                data.push((versions.len() * 2) as u8);
                for &version in versions {
                    let version =
                        if version == GREASE_PLACEHOLDER { grease.value(rng) } else { version };
                    put_u16(&mut data, version);
                }
            }
            Extension::CertCompression(algorithms) => {
                data.push((algorithms.len() * 2) as u8);
                for &algorithm in algorithms {
                    put_u16(&mut data, algorithm);
                }
            }
            Extension::ApplicationSettings(protocols) => {
                let list_len: usize = protocols.iter().map(|p| 1 + p.len()).sum();
                put_u16(&mut data, list_len as u16);
                for protocol in protocols {
                    data.push(protocol.len() as u8);
                    data.extend_from_slice(protocol.as_bytes());
                }
            }
            Extension::FakePreSharedKey { identities, binders } => {
                let identities_len: usize = identities.iter().map(|i| 2 + i.label.len() + 4).sum();
                put_u16(&mut data, identities_len as u16);
                for identity in identities {
                    put_u16(&mut data, identity.label.len() as u16);
                    data.extend_from_slice(&identity.label);
                    data.extend_from_slice(&identity.obfuscated_ticket_age.to_be_bytes());
                }
                let binders_len: usize = binders.iter().map(|b| 1 + b.len()).sum();
                put_u16(&mut data, binders_len as u16);
                for binder in binders {
                    data.push(binder.len() as u8);
                    data.extend_from_slice(binder);
                }
            }
            Extension::Padding(_) | Extension::Grease => unreachable!("handled by caller"),
        }
        Ok((ext_type, data))
    }

    /// The JA3 tuple `version,ciphers,extensions,curves,points` with GREASE
    /// values excluded, as fingerprinting origins compute it.
    pub fn ja3_string(&self) -> String {
        let version = u32::from(self.max_version.min(VERSION_TLS12));
        let ciphers = join_ids(self.cipher_suites.iter().copied().filter(|&c| !is_grease(c)));
        let extensions = join_ids(self.extensions.iter().filter_map(Extension::wire_type));
        let mut curves = String::new();
        let mut points = String::new();
        for ext in &self.extensions {
            match ext {
                Extension::SupportedCurves(list) => {
                    curves = join_ids(list.iter().copied().filter(|&c| !is_grease(c)));
                }
                Extension::SupportedPoints(list) => {
                    points = join_ids(list.iter().map(|&p| u16::from(p)));
                }
                _ => {}
            }
        }
        format!("{version},{ciphers},{extensions},{curves},{points}")
    }

    /// MD5 digest of [`ClientHelloSpec::ja3_string`], rendered lowercase hex.
    pub fn ja3_hash(&self) -> String {
        format!("{:x}", md5::compute(self.ja3_string()))
    }
}

/// Incremental construction of a [`ClientHelloSpec`].
#[must_use]
#[derive(Debug, Clone)]
pub struct ClientHelloSpecBuilder {
    spec: ClientHelloSpec,
}

impl Default for ClientHelloSpecBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientHelloSpecBuilder {
    pub fn new() -> Self {
        Self {
            spec: ClientHelloSpec {
                min_version: VERSION_TLS12,
                max_version: VERSION_TLS13,
                cipher_suites: Vec::new(),
                compression_methods: vec![0],
                extensions: Vec::new(),
            },
        }
    }

    pub fn min_version(mut self, version: u16) -> Self {
        self.spec.min_version = version;
        self
    }

    pub fn max_version(mut self, version: u16) -> Self {
        self.spec.max_version = version;
        self
    }

    pub fn cipher_suites<I: IntoIterator<Item = u16>>(mut self, suites: I) -> Self {
        self.spec.cipher_suites = suites.into_iter().collect();
        self
    }

    pub fn compression_methods<I: IntoIterator<Item = u8>>(mut self, methods: I) -> Self {
        self.spec.compression_methods = methods.into_iter().collect();
        self
    }

    pub fn extension(mut self, ext: Extension) -> Self {
        self.spec.extensions.push(ext);
        self
    }

    pub fn extensions<I: IntoIterator<Item = Extension>>(mut self, exts: I) -> Self {
        self.spec.extensions.extend(exts);
        self
    }

    pub fn build(self) -> ClientHelloSpec {
        self.spec
    }
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_be_bytes());
}

fn join_ids<I: IntoIterator<Item = u16>>(ids: I) -> String {
    ids.into_iter().map(|id| id.to_string()).collect::<Vec<_>>().join("-")
}

/// BoringSSL padding rule: pad the hello to 512 bytes when the unpadded
/// message length falls in (255, 511]. Returns the padding data length.
fn boring_padding_len(unpadded_len: usize) -> Option<usize> {
    if unpadded_len > 0xff && unpadded_len < 0x200 {
        let padding = 0x200 - unpadded_len;
        Some(if padding >= 5 { padding - 4 } else { 1 })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn boring_padding_boundaries() {
        assert_eq!(boring_padding_len(0xff), None);
        assert_eq!(boring_padding_len(0x100), Some(0x100 - 4));
        assert_eq!(boring_padding_len(0x1fe), Some(1));
        assert_eq!(boring_padding_len(0x1ff), Some(1));
        assert_eq!(boring_padding_len(0x200), None);
    }

    #[test]
    fn empty_server_name_is_rejected() {
        let spec = ClientHelloSpec::builder()
            .cipher_suites([0x1301])
            .extension(Extension::ServerName)
            .build();
        let mut rng = StepRng::new(0, 0);
        let err = spec.encode("", &HelloParams::zeroed(), &mut rng).unwrap_err();
        assert!(err.is_kind(crate::base::ErrorKind::Tls));
    }

    #[test]
    fn ja3_excludes_grease() {
        let spec = ClientHelloSpec::builder()
            .cipher_suites([GREASE_PLACEHOLDER, 0x1301, 0x1302])
            .extension(Extension::ServerName)
            .extension(Extension::SupportedCurves(vec![GREASE_PLACEHOLDER, 29, 23]))
            .extension(Extension::SupportedPoints(vec![0]))
            .extension(Extension::Grease)
            .build();
        assert_eq!(spec.ja3_string(), "771,4865-4866,0-10-11,29-23,0");
    }
}
