use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, Stream, StreamExt};
use tracing::{debug, info_span, Instrument};

use super::config::RetryPolicy;
use super::error::IndexingSubmissionError;
use crate::services::{Indexer, IndexingAck};

/// Final result of submitting to one collaborator, after any retries.
#[derive(Debug)]
pub struct SubmissionOutcome {
    pub collaborator: String,
    pub attempts: u32,
    pub result: Result<IndexingAck, IndexingSubmissionError>,
}

/// Submits the canonical URL to every configured indexer concurrently.
pub struct IndexingStage {
    indexers: Vec<Arc<dyn Indexer>>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl IndexingStage {
    pub fn new(indexers: Vec<Arc<dyn Indexer>>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            indexers,
            timeout,
            retry,
        }
    }

    pub fn collaborators(&self) -> Vec<String> {
        self.indexers.iter().map(|i| i.name().to_string()).collect()
    }

    /// Yields one outcome per indexer, in completion order.
    pub fn submit_all<'a>(&'a self, url: &'a str) -> impl Stream<Item = SubmissionOutcome> + 'a {
        let width = self.indexers.len().max(1);
        stream::iter(self.indexers.iter().cloned())
            .map(move |indexer| {
                let span = info_span!("submission", collaborator = %indexer.name());
                submit_with_retry(indexer, url, self.timeout, self.retry).instrument(span)
            })
            .buffer_unordered(width)
    }
}

async fn submit_once(
    indexer: &dyn Indexer,
    url: &str,
    timeout: Duration,
) -> Result<IndexingAck, IndexingSubmissionError> {
    match tokio::time::timeout(timeout, indexer.submit(url)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(IndexingSubmissionError::Timeout(timeout)),
    }
}

async fn submit_with_retry(
    indexer: Arc<dyn Indexer>,
    url: &str,
    timeout: Duration,
    retry: RetryPolicy,
) -> SubmissionOutcome {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let result = submit_once(indexer.as_ref(), url, timeout).await;
        match result {
            Err(e) if attempts < retry.max_attempts => {
                let delay = retry.delay_after(attempts);
                debug!(
                    "Indexer {} attempt {} failed ({}), retrying in {:?}",
                    indexer.name(),
                    attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            result => {
                return SubmissionOutcome {
                    collaborator: indexer.name().to_string(),
                    attempts,
                    result,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ServiceError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls, then acknowledges.
    struct FlakyIndexer {
        name: &'static str,
        failures: u32,
        calls: AtomicU32,
        stall: bool,
    }

    impl FlakyIndexer {
        fn new(name: &'static str, failures: u32) -> Arc<Self> {
            Arc::new(Self {
                name,
                failures,
                calls: AtomicU32::new(0),
                stall: false,
            })
        }
    }

    #[async_trait]
    impl Indexer for FlakyIndexer {
        fn name(&self) -> &str {
            self.name
        }

        async fn submit(&self, _url: &str) -> Result<IndexingAck, ServiceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.stall {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if call <= self.failures {
                return Err(ServiceError::Rejected(format!("attempt {}", call)));
            }
            Ok(IndexingAck { status: 200 })
        }
    }

    async fn run(stage: &IndexingStage) -> Vec<SubmissionOutcome> {
        let mut outcomes: Vec<SubmissionOutcome> = stage
            .submit_all("https://blog.example.com/articles/x")
            .collect()
            .await;
        outcomes.sort_by(|a, b| a.collaborator.cmp(&b.collaborator));
        outcomes
    }

    #[tokio::test]
    async fn test_one_shot_policy_records_failures() {
        let indexers: Vec<Arc<dyn Indexer>> =
            vec![FlakyIndexer::new("a", 0), FlakyIndexer::new("b", 1)];
        let stage = IndexingStage::new(
            indexers,
            Duration::from_secs(5),
            RetryPolicy::once(),
        );
        let outcomes = run(&stage).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].result.is_ok());
        assert_eq!(outcomes[1].attempts, 1);
        assert!(outcomes[1].result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_with_backoff_until_success() {
        let flaky = FlakyIndexer::new("flaky", 2);
        let indexers: Vec<Arc<dyn Indexer>> = vec![flaky.clone()];
        let stage = IndexingStage::new(
            indexers,
            Duration::from_secs(5),
            RetryPolicy {
                max_attempts: 3,
                backoff: Duration::from_millis(100),
            },
        );
        let started = tokio::time::Instant::now();
        let outcomes = run(&stage).await;
        assert_eq!(outcomes[0].attempts, 3);
        assert!(outcomes[0].result.is_ok());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted() {
        let indexers: Vec<Arc<dyn Indexer>> = vec![FlakyIndexer::new("down", 10)];
        let stage = IndexingStage::new(
            indexers,
            Duration::from_secs(5),
            RetryPolicy {
                max_attempts: 2,
                backoff: Duration::from_millis(10),
            },
        );
        let outcomes = run(&stage).await;
        assert_eq!(outcomes[0].attempts, 2);
        assert_eq!(
            outcomes[0].result.as_ref().unwrap_err().to_string(),
            "attempt 2"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_per_submission() {
        let stalled = Arc::new(FlakyIndexer {
            name: "slow",
            failures: 0,
            calls: AtomicU32::new(0),
            stall: true,
        });
        let indexers: Vec<Arc<dyn Indexer>> = vec![stalled, FlakyIndexer::new("fast", 0)];
        let stage = IndexingStage::new(
            indexers,
            Duration::from_secs(15),
            RetryPolicy::once(),
        );
        let outcomes = run(&stage).await;
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(IndexingSubmissionError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_no_indexers() {
        let stage = IndexingStage::new(Vec::new(), Duration::from_secs(1), RetryPolicy::once());
        assert!(run(&stage).await.is_empty());
        assert!(stage.collaborators().is_empty());
    }
}
