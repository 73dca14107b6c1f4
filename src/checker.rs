use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};
use x509_parser::prelude::X509Certificate;

use crate::errors::RevocationError;
use crate::source::CrlSource;

/// Critical CRL entry extensions the checker understands: CRL distribution
/// points and certificate issuer
const RECOGNIZED_ENTRY_EXTENSIONS: [&str; 2] = ["2.5.29.31", "2.5.29.29"];

/// Source of "now" for revocation date comparisons
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock in UTC
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// One check applied to every certificate of a certification path.
///
/// Paths are walked from the trust anchor towards the target certificate,
/// so `init` must be called with `forward` set to `false`.
#[async_trait]
pub trait CertPathCheck {
    /// Resets the check for a new validation run
    fn init(&mut self, forward: bool) -> Result<(), RevocationError>;

    /// Checks a single certificate of the path
    async fn check(&mut self, cert: &X509Certificate<'_>) -> Result<(), RevocationError>;
}

/// CRL-based revocation check for certification path validation.
///
/// For every certificate it retrieves the applicable CRLs through the
/// configured [`CrlSource`] and rejects certificates with an effective
/// revocation entry. In soft-fail mode, CRL unavailability is recorded in
/// [`soft_failures`](Self::soft_failures) and the run continues; an entry
/// that actually revokes the certificate still fails either way.
pub struct RevocationChecker<S, C = SystemClock> {
    source: S,
    clock: C,
    soft_fail: bool,
    soft_failures: Vec<RevocationError>,
}

impl<S> RevocationChecker<S>
where
    S: CrlSource,
{
    /// Hard-fail checker on the system clock
    pub fn new(source: S) -> Self {
        Self {
            source,
            clock: SystemClock,
            soft_fail: false,
            soft_failures: Vec::new(),
        }
    }
}

impl<S, C> RevocationChecker<S, C>
where
    S: CrlSource,
    C: Clock,
{
    /// Tolerate CRL unavailability instead of failing the run
    pub fn with_soft_fail(mut self, soft_fail: bool) -> Self {
        self.soft_fail = soft_fail;
        self
    }

    /// Replaces the clock used for revocation date comparisons
    pub fn with_clock<T: Clock>(self, clock: T) -> RevocationChecker<S, T> {
        RevocationChecker {
            source: self.source,
            clock,
            soft_fail: self.soft_fail,
            soft_failures: self.soft_failures,
        }
    }

    /// Failures tolerated so far in the current run, in occurrence order
    pub fn soft_failures(&self) -> &[RevocationError] {
        &self.soft_failures
    }
}

#[async_trait]
impl<S, C> CertPathCheck for RevocationChecker<S, C>
where
    S: CrlSource,
    C: Clock,
{
    fn init(&mut self, forward: bool) -> Result<(), RevocationError> {
        if forward {
            return Err(RevocationError::ForwardCheckingUnsupported);
        }
        self.soft_failures.clear();
        Ok(())
    }

    #[instrument(skip_all, fields(serial = %hex::encode(cert.tbs_certificate.raw_serial())))]
    async fn check(&mut self, cert: &X509Certificate<'_>) -> Result<(), RevocationError> {
        let serial = cert.tbs_certificate.raw_serial();

        let crls = match self.source.fetch(cert).await {
            Ok(crls) => crls,
            Err(err) => {
                let undetermined = RevocationError::Undetermined {
                    context: "could not retrieve CRLs".to_string(),
                    source: Some(err),
                };
                if self.soft_fail {
                    warn!(
                        "CRL retrieval failed, continuing in soft-fail mode: {}",
                        undetermined
                    );
                    self.soft_failures.push(undetermined);
                    return Ok(());
                }
                return Err(undetermined);
            }
        };

        // An empty CRL set proves nothing; only soft-fail accepts it
        if crls.is_empty() && !self.soft_fail {
            return Err(RevocationError::Undetermined {
                context: "no valid CRLs found".to_string(),
                source: None,
            });
        }

        for crl in &crls {
            let Some(entry) = crl.find_entry(serial) else {
                continue;
            };

            let unrecognized: Vec<String> = entry
                .critical_extensions
                .iter()
                .filter(|oid| !RECOGNIZED_ENTRY_EXTENSIONS.contains(&oid.as_str()))
                .cloned()
                .collect();
            if !unrecognized.is_empty() {
                return Err(RevocationError::UnrecognizedCriticalExtension {
                    serial: hex::encode(serial),
                    oids: unrecognized,
                });
            }

            // Strictly before now: a revocation dated in the future is not
            // yet effective
            if entry.revocation_date < self.clock.now() {
                warn!(
                    "Certificate {} revoked on {} ({})",
                    hex::encode(serial),
                    entry.revocation_date,
                    entry.reason
                );
                return Err(RevocationError::Revoked {
                    serial: hex::encode(serial),
                    date: entry.revocation_date,
                    reason: entry.reason,
                    issuer: crl.issuer().to_string(),
                });
            }

            debug!(
                "Revocation listed in CRL from {} only takes effect on {}",
                crl.url(),
                entry.revocation_date
            );
        }

        Ok(())
    }
}
