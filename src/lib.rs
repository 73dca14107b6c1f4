//! CRL-based certificate revocation checking
//!
//! This crate decides, per RFC 5280 §6.3, whether the certificates of a
//! certification path have been revoked, fetching CRLs on demand from the
//! distribution points each certificate advertises.
//!
//! # Features
//! - CRL retrieval over HTTP(S) with environment-configured timeouts
//! - 30 second CRL cache with a single shared fetch per URL
//! - Partial tolerance: one reachable distribution point is enough
//! - Hard-fail or soft-fail policy towards unavailable CRLs

pub mod cache;
pub mod checker;
pub mod config;
pub mod errors;
pub mod fetcher;
pub mod parser;
pub mod source;
pub mod telemetry;
pub mod types;

// Re-export public types
pub use cache::{CRL_CACHE_TTL, CrlCache};
pub use checker::{CertPathCheck, Clock, RevocationChecker, SystemClock};
pub use errors::{FetchError, RevocationError, RevocationFetchError};
pub use fetcher::{CrlFetcher, HttpCrlFetcher};
pub use source::{CrlSource, DistributionPointSource};
pub use types::{Crl, RevocationEntry, RevocationReason};
