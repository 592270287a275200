//! Bulkhead: bounds how many requests the manager dispatches concurrently.

use crate::error::{ConnectorError, ErrorCode};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Clone)]
pub struct BulkheadPolicy {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl BulkheadPolicy {
    pub fn new(max_concurrent: usize) -> Self {
        Self { semaphore: Arc::new(Semaphore::new(max_concurrent)), max_concurrent }
    }

    pub fn unlimited() -> Self {
        // Semaphore::MAX_PERMITS is approximately usize::MAX / 4.
        Self::new(1_000_000_000)
    }

    pub async fn execute<T, Fut, Op>(&self, mut operation: Op) -> Result<T, ConnectorError>
    where
        Fut: Future<Output = Result<T, ConnectorError>>,
        Op: FnMut() -> Fut,
    {
        let available = self.semaphore.available_permits();
        let in_flight = self.max_concurrent.saturating_sub(available);

        let permit = self.semaphore.try_acquire().map_err(|_| {
            ConnectorError::new(
                ErrorCode::ServiceUnavailable,
                format!("too many concurrent requests ({in_flight} in flight, max {})", self.max_concurrent),
            )
            .with_retryable(true)
        })?;

        let result = operation().await;
        drop(permit);
        result
    }
}
