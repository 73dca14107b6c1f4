use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::body::Bytes;
use axum::http::StatusCode;
use axum::routing::get;
use rcgen::{
    BasicConstraints, CertificateParams, CertificateRevocationListParams, CrlDistributionPoint,
    DnType, IsCa, Issuer, KeyIdMethod, KeyPair, RevokedCertParams, SerialNumber,
};
use time::OffsetDateTime;

/// A throwaway CA that issues leaf certificates and CRLs for one test
pub struct TestCa {
    issuer: Issuer<'static, KeyPair>,
}

impl TestCa {
    pub fn new() -> Self {
        let key_pair = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        params
            .distinguished_name
            .push(DnType::CommonName, "Revocation Test CA");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);

        Self {
            issuer: Issuer::new(params, key_pair),
        }
    }

    /// DER certificate with the given serial and CRL distribution points
    pub fn issue_leaf(&self, serial: &[u8], distribution_points: &[String]) -> Vec<u8> {
        let key_pair = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        params
            .distinguished_name
            .push(DnType::CommonName, "Revocation Test Leaf");
        params.serial_number = Some(SerialNumber::from_slice(serial));
        if !distribution_points.is_empty() {
            params.crl_distribution_points = vec![CrlDistributionPoint {
                uris: distribution_points.to_vec(),
            }];
        }

        params
            .signed_by(&key_pair, &self.issuer)
            .unwrap()
            .der()
            .to_vec()
    }

    /// DER CRL containing the given revoked entries
    pub fn issue_crl(&self, revoked: Vec<RevokedCertParams>) -> Vec<u8> {
        let now = OffsetDateTime::now_utc();
        let params = CertificateRevocationListParams {
            this_update: now,
            next_update: now + time::Duration::days(1),
            crl_number: SerialNumber::from(1u64),
            issuing_distribution_point: None,
            revoked_certs: revoked,
            key_identifier_method: KeyIdMethod::Sha256,
        };

        params.signed_by(&self.issuer).unwrap().der().to_vec()
    }
}

pub fn revoked_entry(
    serial: &[u8],
    when: OffsetDateTime,
    reason: Option<rcgen::RevocationReason>,
) -> RevokedCertParams {
    RevokedCertParams {
        serial_number: SerialNumber::from_slice(serial),
        revocation_time: when,
        reason_code: reason,
        invalidity_date: None,
    }
}

/// Hit counter for one served CRL route
#[derive(Clone)]
pub struct ServedRoute {
    hits: Arc<AtomicUsize>,
}

impl ServedRoute {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Spawns an HTTP server on a random port serving the given routes.
/// Returns the base URL and one hit counter per route, in route order.
pub async fn spawn_crl_server(
    routes: Vec<(&str, StatusCode, Vec<u8>)>,
) -> (String, Vec<ServedRoute>) {
    x509_revocation::telemetry::init_tracing();

    let mut router = Router::new();
    let mut counters = Vec::new();
    for (path, status, body) in routes {
        let hits = Arc::new(AtomicUsize::new(0));
        counters.push(ServedRoute { hits: hits.clone() });
        let body = Bytes::from(body);
        router = router.route(
            path,
            get(move || {
                let hits = hits.clone();
                let body = body.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (status, body)
                }
            }),
        );
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test server");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server failed");
    });

    (format!("http://{addr}"), counters)
}

// Minimal DER encoding, enough to hand-build CRL fixtures with entry
// extensions, which rcgen cannot emit.

fn der_len(len: usize) -> Vec<u8> {
    if len < 0x80 {
        vec![len as u8]
    } else if len <= 0xff {
        vec![0x81, len as u8]
    } else {
        vec![0x82, (len >> 8) as u8, (len & 0xff) as u8]
    }
}

fn der_tlv(tag: u8, content: Vec<u8>) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend(der_len(content.len()));
    out.extend(content);
    out
}

fn der_seq(parts: &[Vec<u8>]) -> Vec<u8> {
    der_tlv(0x30, parts.concat())
}

fn der_set(parts: &[Vec<u8>]) -> Vec<u8> {
    der_tlv(0x31, parts.concat())
}

fn der_int(bytes: &[u8]) -> Vec<u8> {
    // Positive INTEGER, zero-prefixed when the high bit is set
    let mut content = Vec::new();
    if bytes.is_empty() || bytes[0] & 0x80 != 0 {
        content.push(0);
    }
    content.extend_from_slice(bytes);
    der_tlv(0x02, content)
}

fn der_base128(mut value: u64) -> Vec<u8> {
    let mut out = vec![(value & 0x7f) as u8];
    value >>= 7;
    while value > 0 {
        out.insert(0, (value & 0x7f) as u8 | 0x80);
        value >>= 7;
    }
    out
}

fn der_oid(oid: &str) -> Vec<u8> {
    let mut arcs = oid.split('.').map(|arc| arc.parse::<u64>().unwrap());
    let first = arcs.next().unwrap();
    let second = arcs.next().unwrap();
    let mut content = vec![(first * 40 + second) as u8];
    for arc in arcs {
        content.extend(der_base128(arc));
    }
    der_tlv(0x06, content)
}

fn der_utctime(dt: OffsetDateTime) -> Vec<u8> {
    let formatted = format!(
        "{:02}{:02}{:02}{:02}{:02}{:02}Z",
        dt.year() % 100,
        u8::from(dt.month()),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second()
    );
    der_tlv(0x17, formatted.into_bytes())
}

fn der_bool_true() -> Vec<u8> {
    der_tlv(0x01, vec![0xff])
}

fn der_octet_string(content: Vec<u8>) -> Vec<u8> {
    der_tlv(0x04, content)
}

fn der_bit_string(content: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0x00];
    bytes.extend_from_slice(content);
    der_tlv(0x03, bytes)
}

fn der_utf8(text: &str) -> Vec<u8> {
    der_tlv(0x0c, text.as_bytes().to_vec())
}

fn der_common_name(name: &str) -> Vec<u8> {
    // RDNSequence with a single CN attribute (OID 2.5.4.3)
    der_seq(&[der_set(&[der_seq(&[der_oid("2.5.4.3"), der_utf8(name)])])])
}

fn der_algorithm_ecdsa_sha256() -> Vec<u8> {
    der_seq(&[der_oid("1.2.840.10045.4.3.2")])
}

/// One CRL entry extension: OID in dotted form, criticality, and the DER
/// content of its extnValue
pub struct EntryExtension {
    pub oid: String,
    pub critical: bool,
    pub value: Vec<u8>,
}

/// extnValue content for a certificateIssuer extension: GeneralNames with
/// a single directoryName
pub fn certificate_issuer_value(common_name: &str) -> Vec<u8> {
    der_seq(&[der_tlv(0xa4, der_common_name(common_name))])
}

/// Hand-built v2 CRL whose single entry revokes `serial` at `revoked_at`
/// and carries the given entry extensions. The signature is a dummy; the
/// checker never verifies CRL signatures.
pub fn crl_with_entry_extensions(
    serial: &[u8],
    revoked_at: OffsetDateTime,
    extensions: &[EntryExtension],
) -> Vec<u8> {
    let now = OffsetDateTime::now_utc();

    let mut entry = vec![der_int(serial), der_utctime(revoked_at)];
    if !extensions.is_empty() {
        let encoded: Vec<Vec<u8>> = extensions
            .iter()
            .map(|ext| {
                let mut parts = vec![der_oid(&ext.oid)];
                if ext.critical {
                    parts.push(der_bool_true());
                }
                parts.push(der_octet_string(ext.value.clone()));
                der_seq(&parts)
            })
            .collect();
        entry.push(der_seq(&encoded));
    }

    let tbs = der_seq(&[
        der_int(&[0x01]), // v2
        der_algorithm_ecdsa_sha256(),
        der_common_name("Handmade Test CA"),
        der_utctime(now),
        der_utctime(now + time::Duration::days(1)),
        der_seq(&[der_seq(&entry)]),
    ]);

    der_seq(&[tbs, der_algorithm_ecdsa_sha256(), der_bit_string(&[0x00])])
}
