use async_trait::async_trait;
use reqwest::Client;
use tracing::info;
use url::Url;

use crate::config::FetchTimeouts;
use crate::errors::FetchError;
use crate::types::Crl;

/// Retrieves a single CRL from a distribution point URL.
///
/// Implementations are shared across concurrent lookups, so they must not
/// keep per-call state.
#[async_trait]
pub trait CrlFetcher: Send + Sync + 'static {
    async fn retrieve(&self, url: &str) -> Result<Crl, FetchError>;
}

/// Fetches CRLs over HTTP(S) with timeouts taken from the environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpCrlFetcher;

impl HttpCrlFetcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CrlFetcher for HttpCrlFetcher {
    async fn retrieve(&self, url: &str) -> Result<Crl, FetchError> {
        info!("Fetching CRL from: {}", url);

        // Validate URL
        let _ = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        // Timeouts are re-read on every fetch so environment changes apply
        // without a restart
        let timeouts = FetchTimeouts::load().unwrap_or_default();
        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .build()
            .map_err(|source| FetchError::Client { source })?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|source| transport_error(url, source))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }

        // Buffer the entire body so a mid-read failure keeps its transport
        // cause instead of surfacing as a parse error
        let crl_data = response
            .bytes()
            .await
            .map_err(|source| transport_error(url, source))?
            .to_vec();

        let crl =
            Crl::from_der(crl_data, url.to_string()).map_err(|source| FetchError::Malformed {
                url: url.to_string(),
                source,
            })?;

        info!(
            "Successfully fetched CRL from {} ({} revoked entries, issuer: {})",
            url,
            crl.entry_count(),
            crl.issuer()
        );
        Ok(crl)
    }
}

fn transport_error(url: &str, source: reqwest::Error) -> FetchError {
    if source.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            source,
        }
    } else {
        FetchError::Http {
            url: url.to_string(),
            source,
        }
    }
}
