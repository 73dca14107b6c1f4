use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::time::Instant;
use tracing::debug;

use crate::errors::FetchError;
use crate::fetcher::CrlFetcher;
use crate::types::Crl;

/// How long a fetched CRL is served from the cache before a lookup
/// triggers a refetch
pub const CRL_CACHE_TTL: Duration = Duration::from_secs(30);

type CrlFlight = Shared<BoxFuture<'static, Result<Arc<Crl>, Arc<FetchError>>>>;

enum Slot {
    /// A fetch for this URL is running; later lookups join it
    InFlight { id: u64, flight: CrlFlight },
    /// A successfully fetched CRL and the time the fetch completed
    Ready { crl: Arc<Crl>, fetched_at: Instant },
}

/// Concurrent CRL cache keyed by distribution point URL.
///
/// A lookup either returns a fresh cached CRL, joins a fetch that is
/// already running for the same URL, or starts a new fetch. At most one
/// fetch per URL is in flight at a time, and every concurrent caller gets
/// the outcome of that single fetch. Only successes are stored; a failed
/// fetch clears its slot so the next lookup retries.
///
/// Cloning is cheap and all clones share the same entries.
pub struct CrlCache<F> {
    fetcher: Arc<F>,
    slots: Arc<DashMap<String, Slot>>,
    next_flight: Arc<AtomicU64>,
}

impl<F> Clone for CrlCache<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            slots: Arc::clone(&self.slots),
            next_flight: Arc::clone(&self.next_flight),
        }
    }
}

impl<F: CrlFetcher> CrlCache<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            slots: Arc::new(DashMap::new()),
            next_flight: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the CRL for `url`, fetching it if the cache holds nothing
    /// fresh. Concurrent callers for the same URL share one fetch and one
    /// outcome.
    pub async fn get(&self, url: &str) -> Result<Arc<Crl>, Arc<FetchError>> {
        // The map guard must not be held across an await; decide what to
        // do under the entry lock, then await outside it.
        let flight = match self.slots.entry(url.to_string()) {
            Entry::Occupied(mut occupied) => match occupied.get() {
                Slot::Ready { crl, fetched_at } if fetched_at.elapsed() < CRL_CACHE_TTL => {
                    debug!("Using cached CRL from {}", url);
                    return Ok(Arc::clone(crl));
                }
                Slot::InFlight { flight, .. } => {
                    debug!("Joining in-flight CRL fetch for {}", url);
                    flight.clone()
                }
                Slot::Ready { .. } => {
                    debug!("Cached CRL from {} expired, refetching", url);
                    let (id, flight) = self.start_flight(url);
                    occupied.insert(Slot::InFlight {
                        id,
                        flight: flight.clone(),
                    });
                    flight
                }
            },
            Entry::Vacant(vacant) => {
                let (id, flight) = self.start_flight(url);
                vacant.insert(Slot::InFlight {
                    id,
                    flight: flight.clone(),
                });
                flight
            }
        };

        flight.await
    }

    /// Number of URLs with a cached or in-flight CRL
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Builds the shared fetch future for `url`. The future is inert until
    /// first polled, which happens only after the slot guard is released.
    fn start_flight(&self, url: &str) -> (u64, CrlFlight) {
        let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
        let fetcher = Arc::clone(&self.fetcher);
        let slots = Arc::clone(&self.slots);
        let url = url.to_string();

        let flight = async move {
            match fetcher.retrieve(&url).await {
                Ok(crl) => {
                    let crl = Arc::new(crl);
                    slots.insert(
                        url,
                        Slot::Ready {
                            crl: Arc::clone(&crl),
                            fetched_at: Instant::now(),
                        },
                    );
                    Ok(crl)
                }
                Err(err) => {
                    // Failures are never cached. Clear the slot so the next
                    // lookup retries, but only if it still belongs to this
                    // flight.
                    slots.remove_if(&url, |_, slot| {
                        matches!(slot, Slot::InFlight { id: slot_id, .. } if *slot_id == id)
                    });
                    Err(Arc::new(err))
                }
            }
        }
        .boxed()
        .shared();

        (id, flight)
    }
}
