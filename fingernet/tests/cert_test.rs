//! Certificate authority and leaf-cache tests.

use std::sync::Arc;

use fingernet::cert::{CertAuthority, LeafCache, RootOptions};

fn test_cache() -> Arc<LeafCache> {
    let (cert_pem, key_pem) = CertAuthority::generate_root(&RootOptions::default()).unwrap();
    let authority = CertAuthority::from_pem(&cert_pem, &key_pem).unwrap();
    Arc::new(LeafCache::new(authority))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_flight_per_sni() {
    let cache = test_cache();

    let mut handles = Vec::new();
    for _ in 0..100 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move { cache.leaf_for("a.test").await.unwrap() }));
    }

    let mut leaves = Vec::new();
    for handle in handles {
        leaves.push(handle.await.unwrap());
    }

    // Exactly one signing; every caller observes the identical leaf.
    assert_eq!(cache.signed_total(), 1);
    let first = &leaves[0];
    for leaf in &leaves {
        assert!(Arc::ptr_eq(first, leaf));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn distinct_snis_sign_in_parallel() {
    let cache = test_cache();

    let mut handles = Vec::new();
    for index in 0..8 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            cache.leaf_for(&format!("host{index}.test")).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(cache.signed_total(), 8);
    assert!(
        cache.signing_peak() >= 2,
        "distinct SNIs must be able to sign concurrently (peak {})",
        cache.signing_peak()
    );
}

#[tokio::test]
async fn leaf_carries_the_sni_and_verifies_under_the_root() {
    let (cert_pem, key_pem) = CertAuthority::generate_root(&RootOptions::default()).unwrap();
    let authority = CertAuthority::from_pem(&cert_pem, &key_pem).unwrap();
    let cache = LeafCache::new(authority);

    let leaf = cache.leaf_for("site.example").await.unwrap();

    let root = boring::x509::X509::from_pem(&cert_pem).unwrap();
    assert!(leaf.cert.verify(&root.public_key().unwrap()).unwrap());

    let san: Vec<String> = leaf
        .cert
        .subject_alt_names()
        .map(|names| {
            names.iter().filter_map(|name| name.dnsname().map(str::to_string)).collect()
        })
        .unwrap_or_default();
    assert_eq!(san, vec!["site.example".to_string()]);
}

#[test]
fn root_has_ca_constraints() {
    let options = RootOptions {
        organization: "Test Org".into(),
        country: "US".into(),
        common_name: "Test Root".into(),
        valid_years: 2,
    };
    let (cert_pem, _) = CertAuthority::generate_root(&options).unwrap();
    let root = boring::x509::X509::from_pem(&cert_pem).unwrap();

    let subject: Vec<String> = root
        .subject_name()
        .entries()
        .map(|entry| entry.data().as_utf8().unwrap().to_string())
        .collect();
    assert!(subject.contains(&"Test Org".to_string()));
    assert!(subject.contains(&"Test Root".to_string()));

    // Self-signed root must verify under its own key.
    assert!(root.verify(&root.public_key().unwrap()).unwrap());
}
