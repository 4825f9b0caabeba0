//! Dedicated pager task fed by a bounded queue.
//!
//! Page requests leave the message loop through an mpsc channel so a slow
//! or hung pager endpoint never delays an acknowledgment.
//!
//! # Architecture
//!
//! ```text
//! Dispatcher ─► PagerHandle ─► mpsc::Sender<PageRequest> ─► Pager Task ─► Notifier
//! ```
//!
//! Each call to the notifier is bounded by `call_timeout`. Failures are
//! logged and counted; they never reach the dispatcher.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::Notifier;
use crate::error::{ClientError, Result};

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default timeout for a single page request.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Default time to wait for queue space before giving up.
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(1);

/// A queued page for one patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub mrn: String,
}

/// Configuration for the pager task.
#[derive(Debug, Clone)]
pub struct PagerConfig {
    /// Channel capacity for queued pages.
    pub queue_capacity: usize,
    /// Upper bound on one notifier call.
    pub call_timeout: Duration,
    /// How long `page` waits when the queue is full.
    pub enqueue_timeout: Duration,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
        }
    }
}

/// Delivery counters shared with the pager task.
#[derive(Debug, Default)]
pub struct PagerStats {
    delivered: AtomicUsize,
    failed: AtomicUsize,
}

impl PagerStats {
    /// Pages acknowledged by the notifier.
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::Acquire)
    }

    /// Pages that errored or timed out.
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Acquire)
    }
}

/// Handle for queueing pages. Cheap to clone.
#[derive(Clone)]
pub struct PagerHandle {
    tx: mpsc::Sender<PageRequest>,
    stats: Arc<PagerStats>,
    enqueue_timeout: Duration,
}

impl PagerHandle {
    /// Queue a page for `mrn` without waiting for delivery.
    ///
    /// # Errors
    ///
    /// `ClientError::Notifier` if the pager task has stopped or the queue
    /// stayed full for longer than the enqueue timeout.
    pub async fn page(&self, mrn: &str) -> Result<()> {
        let request = PageRequest {
            mrn: mrn.to_string(),
        };

        match tokio::time::timeout(self.enqueue_timeout, self.tx.send(request)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(ClientError::Notifier("pager task stopped".into())),
            Err(_) => Err(ClientError::Notifier(format!(
                "pager queue full for {:?}",
                self.enqueue_timeout
            ))),
        }
    }

    /// Delivery counters.
    pub fn stats(&self) -> Arc<PagerStats> {
        self.stats.clone()
    }
}

/// Spawn the pager task and return a handle for queueing pages.
///
/// The task exits once every `PagerHandle` has been dropped and the queue
/// has drained.
pub fn spawn_pager_task<N>(notifier: N, config: PagerConfig) -> (PagerHandle, JoinHandle<()>)
where
    N: Notifier,
{
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
    let stats = Arc::new(PagerStats::default());

    let handle = PagerHandle {
        tx,
        stats: stats.clone(),
        enqueue_timeout: config.enqueue_timeout,
    };

    let task = tokio::spawn(pager_loop(rx, notifier, stats, config.call_timeout));

    (handle, task)
}

/// Spawn the pager task with default configuration.
pub fn spawn_pager_task_default<N>(notifier: N) -> (PagerHandle, JoinHandle<()>)
where
    N: Notifier,
{
    spawn_pager_task(notifier, PagerConfig::default())
}

async fn pager_loop<N: Notifier>(
    mut rx: mpsc::Receiver<PageRequest>,
    notifier: N,
    stats: Arc<PagerStats>,
    call_timeout: Duration,
) {
    while let Some(request) = rx.recv().await {
        match tokio::time::timeout(call_timeout, notifier.page(&request.mrn)).await {
            Ok(Ok(())) => {
                stats.delivered.fetch_add(1, Ordering::AcqRel);
                info!(mrn = %request.mrn, "Page delivered");
            }
            Ok(Err(e)) => {
                stats.failed.fetch_add(1, Ordering::AcqRel);
                warn!(mrn = %request.mrn, "Page failed: {}", e);
            }
            Err(_) => {
                stats.failed.fetch_add(1, Ordering::AcqRel);
                warn!(mrn = %request.mrn, "Page timed out after {:?}", call_timeout);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::BoxFuture;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Recorder {
        paged: Arc<Mutex<Vec<String>>>,
    }

    impl Notifier for Recorder {
        fn page(&self, mrn: &str) -> BoxFuture<'static, Result<()>> {
            self.paged.lock().unwrap().push(mrn.to_string());
            Box::pin(async { Ok::<(), ClientError>(()) })
        }
    }

    struct Failing;

    impl Notifier for Failing {
        fn page(&self, _mrn: &str) -> BoxFuture<'static, Result<()>> {
            Box::pin(async { Err::<(), ClientError>(ClientError::Notifier("503".into())) })
        }
    }

    struct Hanging;

    impl Notifier for Hanging {
        fn page(&self, _mrn: &str) -> BoxFuture<'static, Result<()>> {
            Box::pin(std::future::pending::<Result<()>>())
        }
    }

    #[test]
    fn test_pager_config_default() {
        let config = PagerConfig::default();
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.call_timeout, DEFAULT_CALL_TIMEOUT);
        assert_eq!(config.enqueue_timeout, DEFAULT_ENQUEUE_TIMEOUT);
    }

    #[tokio::test]
    async fn test_pages_delivered_in_order() {
        let recorder = Recorder::default();
        let (handle, task) = spawn_pager_task_default(recorder.clone());

        handle.page("1").await.unwrap();
        handle.page("2").await.unwrap();
        let stats = handle.stats();
        drop(handle);
        task.await.unwrap();

        assert_eq!(*recorder.paged.lock().unwrap(), vec!["1", "2"]);
        assert_eq!(stats.delivered(), 2);
        assert_eq!(stats.failed(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_counted_not_propagated() {
        let (handle, task) = spawn_pager_task_default(Failing);

        assert!(handle.page("1").await.is_ok());
        let stats = handle.stats();
        drop(handle);
        task.await.unwrap();

        assert_eq!(stats.failed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_notifier_times_out() {
        let config = PagerConfig {
            call_timeout: Duration::from_millis(50),
            ..PagerConfig::default()
        };
        let (handle, task) = spawn_pager_task(Hanging, config);

        handle.page("1").await.unwrap();
        let stats = handle.stats();
        drop(handle);
        task.await.unwrap();

        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.delivered(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_times_out() {
        let config = PagerConfig {
            queue_capacity: 1,
            call_timeout: Duration::from_secs(3600),
            enqueue_timeout: Duration::from_millis(10),
        };
        let (handle, _task) = spawn_pager_task(Hanging, config);

        // The task holds at most one hung request and the queue one more.
        let mut outcome = Ok(());
        for mrn in ["1", "2", "3"] {
            outcome = handle.page(mrn).await;
            if outcome.is_err() {
                break;
            }
        }

        let err = outcome.unwrap_err();
        assert!(err.to_string().contains("queue full"));
    }

    #[tokio::test]
    async fn test_stopped_task_is_error() {
        let (handle, task) = spawn_pager_task_default(Recorder::default());
        task.abort();
        let _ = task.await;

        let err = handle.page("1").await.unwrap_err();
        assert!(err.to_string().contains("stopped"));
    }
}
