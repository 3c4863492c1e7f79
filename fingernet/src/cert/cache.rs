//! Single-flight leaf cache.
//!
//! Keyed by lowercased SNI. Concurrent requests for the same SNI coalesce on
//! one signing; distinct SNIs sign in parallel. A leaf is only observable
//! once its signature is complete, and entries live for the process lifetime
//! (an expired `not_after` triggers a fresh signing).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::base::{ProxyError, Result};
use crate::cert::authority::{CertAuthority, LeafCert};

type LeafCell = Arc<OnceCell<Arc<LeafCert>>>;

/// Concurrent map `SNI -> pending-or-done leaf`.
pub struct LeafCache {
    authority: Arc<CertAuthority>,
    cells: DashMap<String, LeafCell>,
    signed_total: AtomicU64,
    signing_now: AtomicU64,
    signing_peak: AtomicU64,
}

impl LeafCache {
    pub fn new(authority: CertAuthority) -> Self {
        Self {
            authority: Arc::new(authority),
            cells: DashMap::new(),
            signed_total: AtomicU64::new(0),
            signing_now: AtomicU64::new(0),
            signing_peak: AtomicU64::new(0),
        }
    }

    pub fn authority(&self) -> &CertAuthority {
        &self.authority
    }

    /// The leaf for `sni`, minting it on first demand.
    pub async fn leaf_for(&self, sni: &str) -> Result<Arc<LeafCert>> {
        let key = sni.to_ascii_lowercase();
        loop {
            let cell: LeafCell =
                self.cells.entry(key.clone()).or_insert_with(Default::default).clone();

            let leaf = cell
                .get_or_try_init(|| self.sign(key.clone()))
                .await?
                .clone();

            if leaf.not_after > SystemTime::now() {
                return Ok(leaf);
            }
            // Expired entry: drop the cell (only if it is still the one we
            // resolved) and mint again.
            debug!(sni = %key, "cached leaf expired, re-signing");
            self.cells.remove_if(&key, |_, current| Arc::ptr_eq(current, &cell));
        }
    }

    async fn sign(&self, sni: String) -> Result<Arc<LeafCert>> {
        let in_flight = self.signing_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.signing_peak.fetch_max(in_flight, Ordering::SeqCst);

        // RSA keygen + signing is CPU-bound; keep it off the I/O workers.
        let authority = self.authority.clone();
        let result = tokio::task::spawn_blocking(move || authority.mint_leaf(&sni))
            .await
            .map_err(|e| ProxyError::certificate("leaf signing task failed").with_source(e))
            .and_then(|leaf| leaf);

        self.signing_now.fetch_sub(1, Ordering::SeqCst);
        let leaf = result?;
        self.signed_total.fetch_add(1, Ordering::SeqCst);
        debug!(total = self.signed_total.load(Ordering::SeqCst), "leaf signed");
        Ok(Arc::new(leaf))
    }

    /// Number of completed signings since startup.
    pub fn signed_total(&self) -> u64 {
        self.signed_total.load(Ordering::SeqCst)
    }

    /// Highest number of signings observed in flight at once.
    pub fn signing_peak(&self) -> u64 {
        self.signing_peak.load(Ordering::SeqCst)
    }

    /// Number of cached SNIs.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
