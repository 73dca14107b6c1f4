use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use x509_parser::prelude::X509Certificate;

use crate::cache::CrlCache;
use crate::errors::{FetchError, RevocationFetchError};
use crate::fetcher::CrlFetcher;
use crate::parser::extract_crl_distribution_points;
use crate::types::Crl;

/// Supplies the CRLs applicable to a certificate.
#[async_trait]
pub trait CrlSource: Send + Sync {
    /// Returns one CRL per reachable distribution point of `cert`.
    ///
    /// A certificate without distribution points yields an empty set. As
    /// long as at least one point delivers a CRL, failures of the others
    /// are logged and dropped; only when every point fails does the
    /// aggregate error surface.
    async fn fetch(
        &self,
        cert: &X509Certificate<'_>,
    ) -> Result<Vec<Arc<Crl>>, RevocationFetchError>;
}

/// [`CrlSource`] that resolves distribution points from the certificate
/// itself and serves them through a shared [`CrlCache`].
pub struct DistributionPointSource<F> {
    cache: CrlCache<F>,
}

impl<F: CrlFetcher> DistributionPointSource<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            cache: CrlCache::new(fetcher),
        }
    }

    /// Builds the source on top of an existing cache, so several sources
    /// can share fetched CRLs.
    pub fn with_cache(cache: CrlCache<F>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &CrlCache<F> {
        &self.cache
    }
}

#[async_trait]
impl<F: CrlFetcher> CrlSource for DistributionPointSource<F> {
    async fn fetch(
        &self,
        cert: &X509Certificate<'_>,
    ) -> Result<Vec<Arc<Crl>>, RevocationFetchError> {
        let distribution_points = extract_crl_distribution_points(cert);
        if distribution_points.is_empty() {
            debug!("Certificate carries no CRL distribution points");
            return Ok(Vec::new());
        }

        let mut crls = Vec::with_capacity(distribution_points.len());
        let mut failures: Vec<Arc<FetchError>> = Vec::new();

        for dp in &distribution_points {
            match self.cache.get(dp).await {
                Ok(crl) => crls.push(crl),
                Err(err) => {
                    warn!("Failed to fetch CRL from {}: {}", dp, err);
                    failures.push(err);
                }
            }
        }

        if !crls.is_empty() {
            if !failures.is_empty() {
                debug!(
                    "Proceeding with {} CRL(s), {} distribution point(s) failed",
                    crls.len(),
                    failures.len()
                );
            }
            return Ok(crls);
        }

        let mut failures = failures.into_iter();
        match failures.next() {
            Some(primary) => Err(RevocationFetchError::new(primary, failures.collect())),
            // Unreachable while distribution_points is non-empty
            None => Ok(crls),
        }
    }
}
