//! Bounded concurrency for shared generation clients.

use super::{Generation, GenerationClient, GenerationRequest};
use crate::errors::{ClientError, GenerationError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Wraps a client so that at most `limit` requests are in flight at once.
///
/// Runs sharing one wrapped client queue for a permit instead of failing.
#[derive(Debug)]
pub struct ConcurrencyLimitedClient<C> {
    inner: C,
    permits: Arc<Semaphore>,
    limit: usize,
}

impl<C: GenerationClient> ConcurrencyLimitedClient<C> {
    /// Creates a new limited client. A limit of zero is raised to one.
    #[must_use]
    pub fn new(inner: C, limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            inner,
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Returns the configured limit.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the number of permits currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl<C: GenerationClient> GenerationClient for ConcurrencyLimitedClient<C> {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ClientError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| GenerationError::unreachable("client concurrency limiter closed"))?;
        debug!(stage = %request.stage, available = self.available(), "Acquired generation permit");
        self.inner.generate(request).await
    }

    fn model_id(&self) -> String {
        self.inner.model_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageId;
    use crate::generation::OutputSchema;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct SlowClient {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl GenerationClient for SlowClient {
        async fn generate(&self, _request: &GenerationRequest) -> Result<Generation, ClientError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(Generation::new(serde_json::json!({}), 1))
        }

        fn model_id(&self) -> String {
            "slow".to_string()
        }
    }

    #[tokio::test]
    async fn test_limits_in_flight_requests() {
        let client = Arc::new(ConcurrencyLimitedClient::new(SlowClient::default(), 2));
        let request = GenerationRequest::new(StageId::Strategist, "p", OutputSchema::new("s"), 0.0);

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let client = client.clone();
                let request = request.clone();
                tokio::spawn(async move { client.generate(&request).await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(client.inner.peak.load(Ordering::SeqCst), 2);
        assert_eq!(client.available(), 2);
        assert_eq!(client.model_id(), "slow");
    }

    #[test]
    fn test_zero_limit_raised_to_one() {
        let client = ConcurrencyLimitedClient::new(SlowClient::default(), 0);
        assert_eq!(client.limit(), 1);
    }
}
