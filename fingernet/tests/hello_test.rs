//! ClientHello serialization tests.
//!
//! Covers byte fidelity with pinned randomness, extension-order
//! preservation across permutations, and GREASE expansion.

use fingernet::fingerprint::grease::is_grease;
use fingernet::fingerprint::hello::{
    ext_type, ClientHelloSpec, Extension, HelloParams, VERSION_TLS12,
};
use fingernet::fingerprint::profiles;
use rand::rngs::mock::StepRng;

/// Minimal ClientHello parser for assertions: returns (cipher_suites,
/// extension types in emission order).
fn parse_hello(hello: &[u8]) -> (Vec<u16>, Vec<u16>) {
    assert_eq!(hello[0], 0x01, "handshake type must be client_hello");
    let body_len = u32::from_be_bytes([0, hello[1], hello[2], hello[3]]) as usize;
    assert_eq!(body_len, hello.len() - 4, "handshake length must cover the body");

    let mut i = 4;
    i += 2; // legacy_version
    i += 32; // random
    let session_id_len = hello[i] as usize;
    i += 1 + session_id_len;

    let cipher_len = u16::from_be_bytes([hello[i], hello[i + 1]]) as usize;
    i += 2;
    let mut ciphers = Vec::new();
    for chunk in hello[i..i + cipher_len].chunks(2) {
        ciphers.push(u16::from_be_bytes([chunk[0], chunk[1]]));
    }
    i += cipher_len;

    let compression_len = hello[i] as usize;
    i += 1 + compression_len;

    let ext_len = u16::from_be_bytes([hello[i], hello[i + 1]]) as usize;
    i += 2;
    let end = i + ext_len;
    assert_eq!(end, hello.len(), "extensions must run to the end of the hello");

    let mut types = Vec::new();
    while i < end {
        let ext = u16::from_be_bytes([hello[i], hello[i + 1]]);
        let len = u16::from_be_bytes([hello[i + 2], hello[i + 3]]) as usize;
        types.push(ext);
        i += 4 + len;
    }
    assert_eq!(i, end, "extension lengths must be self-consistent");
    (ciphers, types)
}

#[test]
fn golden_bytes_for_pinned_inputs() {
    let spec = ClientHelloSpec::builder()
        .min_version(VERSION_TLS12)
        .max_version(VERSION_TLS12)
        .cipher_suites([0x1301, 0x1302])
        .compression_methods([0])
        .extensions([
            Extension::ServerName,
            Extension::SupportedPoints(vec![0]),
            Extension::SessionTicket,
        ])
        .build();

    let mut rng = StepRng::new(0, 0);
    let hello = spec.encode("example.com", &HelloParams::zeroed(), &mut rng).unwrap();

    let mut expected = vec![0x01, 0x00, 0x00, 0x6b]; // client_hello, length 107
    expected.extend_from_slice(&[0x03, 0x03]); // legacy_version
    expected.extend_from_slice(&[0u8; 32]); // client random (pinned)
    expected.push(32);
    expected.extend_from_slice(&[0u8; 32]); // session id (pinned)
    expected.extend_from_slice(&[0x00, 0x04, 0x13, 0x01, 0x13, 0x02]); // ciphers
    expected.extend_from_slice(&[0x01, 0x00]); // compression: null
    expected.extend_from_slice(&[0x00, 0x1e]); // extensions length
    // server_name: example.com
    expected.extend_from_slice(&[0x00, 0x00, 0x00, 0x10, 0x00, 0x0e, 0x00, 0x00, 0x0b]);
    expected.extend_from_slice(b"example.com");
    // ec_point_formats: uncompressed
    expected.extend_from_slice(&[0x00, 0x0b, 0x00, 0x02, 0x01, 0x00]);
    // session_ticket: empty
    expected.extend_from_slice(&[0x00, 0x23, 0x00, 0x00]);

    assert_eq!(hello, expected);
}

#[test]
fn encoding_is_deterministic_with_pinned_randomness() {
    let spec = profiles::default_profile();
    let params = HelloParams::zeroed();
    let a = spec.encode("example.com", &params, &mut StepRng::new(0, 0)).unwrap();
    let b = spec.encode("example.com", &params, &mut StepRng::new(0, 0)).unwrap();
    assert_eq!(a, b);
}

fn permutations(items: &[Extension]) -> Vec<Vec<Extension>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut all = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let mut rest = items.to_vec();
        rest.remove(index);
        for mut tail in permutations(&rest) {
            let mut perm = vec![item.clone()];
            perm.append(&mut tail);
            all.push(perm);
        }
    }
    all
}

#[test]
fn extension_order_is_preserved_for_every_permutation() {
    let extensions = [
        Extension::ExtendedMasterSecret,
        Extension::SupportedPoints(vec![0]),
        Extension::SessionTicket,
        Extension::StatusRequest,
        Extension::Sct,
    ];

    for perm in permutations(&extensions) {
        let declared: Vec<u16> =
            perm.iter().map(|ext| ext.wire_type().unwrap()).collect();
        let spec = ClientHelloSpec::builder()
            .cipher_suites([0x1301])
            .extensions(perm)
            .build();

        let mut rng = StepRng::new(0, 1);
        let hello = spec.encode("example.com", &HelloParams::zeroed(), &mut rng).unwrap();
        let (_, emitted) = parse_hello(&hello);
        assert_eq!(emitted, declared, "emitted extension order must match declaration");
    }
}

#[test]
fn default_profile_emits_declared_sequence_with_grease_expanded() {
    let spec = profiles::default_profile();
    let mut rng = StepRng::new(0, 1);
    let hello = spec.encode("example.com", &HelloParams::zeroed(), &mut rng).unwrap();
    let (ciphers, types) = parse_hello(&hello);

    // Cipher GREASE slot expands in place.
    assert!(is_grease(ciphers[0]), "leading cipher slot must be GREASE");
    assert_eq!(
        &ciphers[1..],
        &[
            4865, 4866, 4867, 49195, 49199, 49196, 49200, 52393, 52392, 49171, 49172, 156, 157,
            47, 53
        ]
    );

    // Fixed-type extensions in declared order, GREASE slots expanded to
    // distinct pattern values, fake PSK last.
    let expected_fixed = [
        ext_type::SERVER_NAME,
        ext_type::EXTENDED_MASTER_SECRET,
        ext_type::RENEGOTIATION_INFO,
        ext_type::SUPPORTED_CURVES,
        ext_type::SUPPORTED_POINTS,
        ext_type::SESSION_TICKET,
        ext_type::ALPN,
        ext_type::STATUS_REQUEST,
        ext_type::SIGNATURE_ALGORITHMS,
        ext_type::SCT,
        ext_type::KEY_SHARE,
        ext_type::PSK_KEY_EXCHANGE_MODES,
        ext_type::SUPPORTED_VERSIONS,
        ext_type::CERT_COMPRESSION,
        ext_type::APPLICATION_SETTINGS,
        ext_type::PADDING,
    ];
    assert_eq!(types.len(), 19);
    assert_eq!(&types[..16], &expected_fixed);
    assert!(is_grease(types[16]) && is_grease(types[17]));
    assert_ne!(types[16], types[17], "GREASE extension types must be distinct");
    assert_eq!(types[18], ext_type::PRE_SHARED_KEY);

    // Boring padding style lands the hello on the 512-byte boundary.
    assert_eq!(hello.len(), 512);
}

#[test]
fn http1_profile_emits_reduced_hello() {
    let spec = profiles::http1();
    let mut rng = StepRng::new(0, 1);
    let hello = spec.encode("example.com", &HelloParams::zeroed(), &mut rng).unwrap();
    let (ciphers, types) = parse_hello(&hello);

    assert_eq!(ciphers, vec![0x1301, 0x1302, 0x1303, 0xc02b, 0xc02f]);
    assert_eq!(
        types,
        vec![
            ext_type::SERVER_NAME,
            ext_type::EXTENDED_MASTER_SECRET,
            ext_type::RENEGOTIATION_INFO,
            ext_type::SUPPORTED_CURVES,
            ext_type::SUPPORTED_POINTS,
            ext_type::SESSION_TICKET,
            ext_type::ALPN,
            ext_type::STATUS_REQUEST,
            ext_type::SIGNATURE_ALGORITHMS,
        ]
    );
}

#[test]
fn http2_profile_differs_only_in_alpn() {
    let default_spec = profiles::default_profile();
    let h2_spec = profiles::http2();

    let mut rng = StepRng::new(0, 1);
    let default_hello =
        default_spec.encode("example.com", &HelloParams::zeroed(), &mut rng).unwrap();
    let mut rng = StepRng::new(0, 1);
    let h2_hello = h2_spec.encode("example.com", &HelloParams::zeroed(), &mut rng).unwrap();

    let (_, default_types) = parse_hello(&default_hello);
    let (_, h2_types) = parse_hello(&h2_hello);
    assert_eq!(default_types, h2_types);
    assert_eq!(h2_spec.alpn_protocols(), vec!["h2".to_string()]);
}

#[test]
fn sni_payload_tracks_the_dialed_host() {
    let spec = ClientHelloSpec::builder()
        .cipher_suites([0x1301])
        .extension(Extension::ServerName)
        .build();
    let mut rng = StepRng::new(0, 0);
    let hello = spec.encode("origin.example.net", &HelloParams::zeroed(), &mut rng).unwrap();
    let needle = b"origin.example.net";
    assert!(
        hello.windows(needle.len()).any(|window| window == needle),
        "SNI hostname must appear in the emitted hello"
    );
}

#[test]
fn key_shares_have_group_appropriate_lengths() {
    use fingernet::fingerprint::KeyShareEntry;
    let spec = ClientHelloSpec::builder()
        .cipher_suites([0x1301])
        .extension(Extension::KeyShare(vec![
            KeyShareEntry::group(29),
            KeyShareEntry::group(23),
        ]))
        .build();
    let mut rng = StepRng::new(0, 1);
    let hello = spec.encode("example.com", &HelloParams::zeroed(), &mut rng).unwrap();

    // key_share is the only extension: locate its payload at the tail.
    let (_, types) = parse_hello(&hello);
    assert_eq!(types, vec![ext_type::KEY_SHARE]);
    // extension data: shares_len(2) + (4 + 32) + (4 + 65)
    let shares_len_offset = hello.len() - ((4 + 32) + (4 + 65)) - 2;
    let shares_len =
        u16::from_be_bytes([hello[shares_len_offset], hello[shares_len_offset + 1]]) as usize;
    assert_eq!(shares_len, 4 + 32 + 4 + 65);
}
