//! Single-flight execution keyed by address.
//!
//! Concurrent callers asking for the same key await one shared task instead of
//! starting duplicates. The work runs on its own Tokio task, so it finishes
//! even if every caller goes away, and it deregisters itself when done.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;

/// The shared task panicked or was cancelled by the runtime.
#[derive(Debug, Clone, Error)]
#[error("in-flight task aborted: {0}")]
pub struct FlightAborted(pub String);

type Flight<T> = Shared<BoxFuture<'static, Result<T, FlightAborted>>>;
type Registry<T> = Arc<Mutex<HashMap<String, Flight<T>>>>;

/// Removes the key when the task ends, panics included.
struct Deregister<T: Clone> {
    registry: Registry<T>,
    key: String,
}

impl<T: Clone> Drop for Deregister<T> {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

pub struct SingleFlight<T: Clone> {
    flights: Registry<T>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Is a task for `key` currently running?
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.flights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key.to_ascii_lowercase())
    }

    /// Number of running tasks.
    pub fn len(&self) -> usize {
        self.flights.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `work` for `key`, or join the task already running for it.
    ///
    /// When joining, `work` is dropped without being polled.
    pub async fn run<F>(&self, key: &str, work: F) -> Result<T, FlightAborted>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let key = key.to_ascii_lowercase();
        let flight = {
            let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = flights.get(&key) {
                tracing::debug!(key = %key, "joining in-flight task");
                existing.clone()
            } else {
                let guard = Deregister {
                    registry: Arc::clone(&self.flights),
                    key: key.clone(),
                };
                let handle = tokio::spawn(async move {
                    let _guard = guard;
                    work.await
                });
                let flight: Flight<T> = async move {
                    handle.await.map_err(|e| FlightAborted(e.to_string()))
                }
                .boxed()
                .shared();
                flights.insert(key, flight.clone());
                flight
            }
        };
        flight.await
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
