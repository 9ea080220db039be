use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::destination::Destination;
use crate::error::EtlResult;
use crate::merge::{BatchResult, WriteBatch};
use crate::types::Record;

#[derive(Debug, Default)]
struct Counters {
    write_calls: AtomicUsize,
    read_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Test wrapper for [`Destination`] implementations that tracks the calls reaching them.
///
/// Besides counting calls, the wrapper records how many batch writes were in flight at the same
/// time. An optional delay keeps each write busy long enough for concurrency to show up.
#[derive(Debug, Clone)]
pub struct TestDestinationWrapper<D> {
    wrapped_destination: D,
    write_delay: Option<Duration>,
    counters: Arc<Counters>,
}

impl<D> TestDestinationWrapper<D> {
    pub fn wrap(destination: D) -> Self {
        Self {
            wrapped_destination: destination,
            write_delay: None,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Delays every batch write by `delay` before forwarding it.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    pub fn inner(&self) -> &D {
        &self.wrapped_destination
    }

    pub fn write_calls(&self) -> usize {
        self.counters.write_calls.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> usize {
        self.counters.read_calls.load(Ordering::SeqCst)
    }

    /// Returns the highest number of batch writes observed in flight at once.
    pub fn max_concurrent_writes(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }
}

impl<D> Destination for TestDestinationWrapper<D>
where
    D: Destination + Send + Sync,
{
    fn name() -> &'static str {
        D::name()
    }

    fn identity(&self) -> String {
        self.wrapped_destination.identity()
    }

    async fn read_existing(&self, key_columns: &[String]) -> EtlResult<Vec<Record>> {
        self.counters.read_calls.fetch_add(1, Ordering::SeqCst);
        self.wrapped_destination.read_existing(key_columns).await
    }

    async fn write_batch(&self, batch: &WriteBatch) -> EtlResult<BatchResult> {
        self.counters.write_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters
            .max_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }

        let result = self.wrapped_destination.write_batch(batch).await;
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);

        result
    }
}
