//! Bridges the blocking scrape pipeline onto a bounded worker pool.
//!
//! Each query runs the full synchronous Session-Manager → Pagination
//! pipeline on a dedicated blocking worker; the service's event loop only
//! ever awaits the handle. The semaphore bounds live Chrome processes;
//! every running job is a full browser, so the bound is the memory/CPU
//! ceiling. Excess submissions queue on the semaphore; there is no
//! cancellation and no ordering between jobs.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::crawler::{self, SearchResult};
use crate::error::ScrapeError;

/// Ceiling on concurrent live browser sessions. Each one is a full Chrome
/// process at roughly 100-300 MB, so size this to the host, not the traffic.
pub const MAX_CONCURRENT_SESSIONS: usize = 4;

pub struct Dispatcher {
    permits: Arc<Semaphore>,
}

/// Non-blocking handle to a submitted query; resolves to the job's result.
pub struct JobHandle {
    id: Uuid,
    inner: JoinHandle<Result<SearchResult, ScrapeError>>,
}

impl JobHandle {
    pub async fn wait(self) -> Result<SearchResult, ScrapeError> {
        match self.inner.await {
            Ok(result) => result,
            Err(e) => {
                error!("💥 job {} worker crashed: {e}", self.id);
                Err(ScrapeError::Internal(format!("scrape worker crashed: {e}")))
            }
        }
    }
}

impl Dispatcher {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_sessions)),
        }
    }

    /// Submit a query. Returns immediately; the pipeline starts once a
    /// browser slot frees up and runs to completion on a blocking worker.
    pub fn submit(&self, query: String) -> JobHandle {
        self.submit_job(move || crawler::search_products(&query))
    }

    fn submit_job<F>(&self, job: F) -> JobHandle
    where
        F: FnOnce() -> Result<SearchResult, ScrapeError> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let id = Uuid::new_v4();
        info!("📥 job {id} queued");

        let inner = tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| ScrapeError::Internal("worker pool is shut down".to_string()))?;
            info!("👷 job {id} picked up");

            match tokio::task::spawn_blocking(job).await {
                Ok(result) => result,
                Err(e) => Err(ScrapeError::Internal(format!(
                    "scrape worker crashed: {e}"
                ))),
            }
        });

        JobHandle { id, inner }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(MAX_CONCURRENT_SESSIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn empty_result() -> SearchResult {
        SearchResult {
            query: "test".to_string(),
            results: Vec::new(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_bound_caps_concurrent_jobs() {
        let dispatcher = Dispatcher::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<JobHandle> = (0..6)
            .map(|_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                dispatcher.submit_job(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(50));
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(empty_result())
                })
            })
            .collect();

        for handle in handles {
            handle.wait().await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_results_pass_through_unchanged() {
        let dispatcher = Dispatcher::default();
        let handle = dispatcher.submit_job(|| {
            Ok(SearchResult {
                query: "aspirin".to_string(),
                results: Vec::new(),
            })
        });

        let result = handle.wait().await.unwrap();
        assert_eq!(result.query, "aspirin");
        assert!(result.results.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pipeline_errors_surface_to_the_caller() {
        let dispatcher = Dispatcher::default();
        let handle =
            dispatcher.submit_job(|| Err(ScrapeError::SessionInit("no chrome binary".to_string())));

        match handle.wait().await {
            Err(ScrapeError::SessionInit(msg)) => assert!(msg.contains("no chrome binary")),
            other => panic!("expected session init error, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_worker_panic_maps_to_internal_error() {
        let dispatcher = Dispatcher::default();
        let handle = dispatcher.submit_job(|| panic!("browser exploded"));

        match handle.wait().await {
            Err(ScrapeError::Internal(msg)) => assert!(msg.contains("crashed")),
            other => panic!("expected internal error, got {other:?}"),
        }
    }
}
