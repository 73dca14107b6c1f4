use std::fmt;

use ::time::OffsetDateTime;
use tracing::warn;
use x509_parser::prelude::*;

/// A CRL fetched from a distribution point, stored as validated DER.
///
/// The raw bytes were parsed once at construction; lookups re-parse on
/// demand so the type stays free of self-referential borrows.
#[derive(Debug, Clone)]
pub struct Crl {
    der: Vec<u8>,
    url: String,
    issuer: String,
    entry_count: usize,
}

impl Crl {
    /// Validates `der` as a CRL and captures its issuer for diagnostics.
    pub fn from_der(der: Vec<u8>, url: String) -> Result<Self, X509Error> {
        let (_, crl) = CertificateRevocationList::from_der(&der)?;
        let issuer = crl.tbs_cert_list.issuer.to_string();
        let entry_count = crl.iter_revoked_certificates().count();

        Ok(Self {
            der,
            url,
            issuer,
            entry_count,
        })
    }

    /// The distribution point this CRL was fetched from
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Distinguished name of the CRL issuer
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Number of revoked-certificate entries
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Raw DER bytes
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Looks up the entry for `serial` (raw big-endian bytes), returning a
    /// snapshot of its date, reason and critical extensions.
    pub fn find_entry(&self, serial: &[u8]) -> Option<RevocationEntry> {
        let crl = match self.parse() {
            Ok(crl) => crl,
            Err(err) => {
                // Cannot happen for bytes validated in from_der
                warn!("failed to re-parse CRL from {}: {err}", self.url);
                return None;
            }
        };

        let revoked = crl
            .iter_revoked_certificates()
            .find(|entry| entry.raw_serial() == serial)?;

        let reason = revoked
            .reason_code()
            .and_then(|(_, code)| RevocationReason::from_code(code.0))
            .unwrap_or(RevocationReason::Unspecified);

        let critical_extensions = revoked
            .extensions()
            .iter()
            .filter(|ext| ext.critical)
            .map(|ext| ext.oid.to_id_string())
            .collect();

        Some(RevocationEntry {
            serial: serial.to_vec(),
            revocation_date: revoked.revocation_date.to_datetime(),
            reason,
            critical_extensions,
        })
    }

    fn parse(&self) -> Result<CertificateRevocationList<'_>, X509Error> {
        let (_, crl) = CertificateRevocationList::from_der(&self.der)?;
        Ok(crl)
    }
}

/// Snapshot of one revoked-certificate entry
#[derive(Debug, Clone)]
pub struct RevocationEntry {
    /// Raw serial number bytes of the revoked certificate
    pub serial: Vec<u8>,
    /// When the revocation takes effect
    pub revocation_date: OffsetDateTime,
    /// Reason given by the CA, `Unspecified` when the entry carries none
    pub reason: RevocationReason,
    /// OIDs of extensions marked critical on this entry, in dotted form
    pub critical_extensions: Vec<String>,
}

/// CRL reason codes from RFC 5280 §5.3.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationReason {
    Unspecified,
    KeyCompromise,
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    RemoveFromCrl,
    PrivilegeWithdrawn,
    AaCompromise,
}

impl RevocationReason {
    /// Maps a raw CRLReason value to its variant. Code 7 is unassigned.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Unspecified),
            1 => Some(Self::KeyCompromise),
            2 => Some(Self::CaCompromise),
            3 => Some(Self::AffiliationChanged),
            4 => Some(Self::Superseded),
            5 => Some(Self::CessationOfOperation),
            6 => Some(Self::CertificateHold),
            8 => Some(Self::RemoveFromCrl),
            9 => Some(Self::PrivilegeWithdrawn),
            10 => Some(Self::AaCompromise),
            _ => None,
        }
    }
}

impl fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unspecified => "unspecified",
            Self::KeyCompromise => "keyCompromise",
            Self::CaCompromise => "cACompromise",
            Self::AffiliationChanged => "affiliationChanged",
            Self::Superseded => "superseded",
            Self::CessationOfOperation => "cessationOfOperation",
            Self::CertificateHold => "certificateHold",
            Self::RemoveFromCrl => "removeFromCRL",
            Self::PrivilegeWithdrawn => "privilegeWithdrawn",
            Self::AaCompromise => "aACompromise",
        };
        f.write_str(name)
    }
}
