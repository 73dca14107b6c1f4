use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use x509_parser::prelude::X509Error;

use crate::types::RevocationReason;

/// Errors raised while retrieving a single CRL from one distribution point
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid CRL URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {source}")]
    Client {
        #[source]
        source: reqwest::Error,
    },

    #[error("timeout while fetching CRL from {url}")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP request failed for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status}: failed to fetch CRL from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("CRL parsing failed for {url}: {source}")]
    Malformed {
        url: String,
        #[source]
        source: X509Error,
    },
}

/// Aggregate failure raised when no CRL could be retrieved from any of a
/// certificate's distribution points.
///
/// The first failure observed is the primary cause; failures from the
/// remaining distribution points are kept in order as suppressed detail so
/// diagnostics are never lost.
#[derive(Error, Debug)]
#[error("could not fetch any CRL: {} distribution point(s) failed", .suppressed.len() + 1)]
pub struct RevocationFetchError {
    #[source]
    primary: Arc<FetchError>,
    suppressed: Vec<Arc<FetchError>>,
}

impl RevocationFetchError {
    pub(crate) fn new(primary: Arc<FetchError>, suppressed: Vec<Arc<FetchError>>) -> Self {
        Self {
            primary,
            suppressed,
        }
    }

    /// The first per-distribution-point failure
    pub fn primary(&self) -> &FetchError {
        &self.primary
    }

    /// Failures from the remaining distribution points, in the order the
    /// points were tried
    pub fn suppressed(&self) -> &[Arc<FetchError>] {
        &self.suppressed
    }

    /// Total number of distribution points that failed
    pub fn failure_count(&self) -> usize {
        1 + self.suppressed.len()
    }
}

/// Outcome of a failed revocation check
#[derive(Error, Debug)]
pub enum RevocationError {
    #[error("certificate {serial} was revoked on {date} (reason: {reason}, CRL issuer: {issuer})")]
    Revoked {
        serial: String,
        date: OffsetDateTime,
        reason: RevocationReason,
        issuer: String,
    },

    #[error("revocation status could not be determined: {context}")]
    Undetermined {
        context: String,
        #[source]
        source: Option<RevocationFetchError>,
    },

    #[error("unrecognized critical extension(s) in CRL entry for {serial}: {}", .oids.join(", "))]
    UnrecognizedCriticalExtension { serial: String, oids: Vec<String> },

    #[error("forward checking is not supported")]
    ForwardCheckingUnsupported,
}
