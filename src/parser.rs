use std::collections::HashSet;

use oid_registry::OID_X509_EXT_CRL_DISTRIBUTION_POINTS;
use tracing::{debug, warn};
use url::Url;
use x509_parser::prelude::*;

/// Extracts CRL distribution point URLs from a certificate.
///
/// URLs come back in extension order with duplicates removed. Points that
/// name no full-name URI, or whose URI is not a usable http(s) URL, are
/// skipped.
pub fn extract_crl_distribution_points(cert: &X509Certificate<'_>) -> Vec<String> {
    let mut urls = Vec::new();

    for ext in cert.tbs_certificate.extensions() {
        if ext.oid != OID_X509_EXT_CRL_DISTRIBUTION_POINTS {
            continue;
        }
        let ParsedExtension::CRLDistributionPoints(points) = ext.parsed_extension() else {
            warn!("CRL distribution points extension did not parse");
            continue;
        };
        for point in points.points.iter() {
            let Some(DistributionPointName::FullName(names)) = &point.distribution_point else {
                continue;
            };
            for name in names {
                let GeneralName::URI(uri) = name else {
                    continue;
                };
                if is_valid_crl_url(uri) {
                    urls.push(uri.to_string());
                } else {
                    warn!("skipping unsupported CRL distribution point: {uri}");
                }
            }
        }
    }

    // Dedupe while preserving the order points were listed in
    let mut seen = HashSet::new();
    urls.retain(|url| seen.insert(url.clone()));

    debug!("extracted {} CRL distribution point(s)", urls.len());
    urls
}

/// A usable distribution point URL: http or https with a host component
pub fn is_valid_crl_url(url: &str) -> bool {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return false;
    }

    match Url::parse(url) {
        Ok(parsed) => parsed.host().is_some(),
        Err(_) => false,
    }
}
