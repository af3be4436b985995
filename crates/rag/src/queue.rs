//! FIFO admission queue in front of the generation provider.
//!
//! Every generation request goes through one background worker that
//! dispatches tasks in submission order, one at a time, keeping a minimum
//! gap between dispatch starts. A caller waits on its own result handle for
//! a bounded time; when that expires it gets a timeout fallback while a task
//! already in flight still runs to completion. Tasks whose caller has gone
//! are skipped before dispatch.

use crate::generator::GenerationService;
use crate::types::{FallbackKind, GenerationRequest, GenerationResult};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use uuid::Uuid;
use veritas_core::settings::QueueSettings;

struct QueuedTask {
    id: Uuid,
    request: GenerationRequest,
    responder: oneshot::Sender<GenerationResult>,
    enqueued_at: Instant,
}

#[derive(Debug, Default)]
struct QueueCounters {
    submitted: AtomicU64,
    processed: AtomicU64,
    skipped: AtomicU64,
    timed_out: AtomicU64,
    pending: AtomicU64,
    total_wait_ms: AtomicU64,
}

/// Queue counters at a point in time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub submitted: u64,
    pub processed: u64,
    pub skipped: u64,
    pub timed_out: u64,
    pub pending: u64,
    pub average_wait_ms: u64,
}

/// Handle to the admission queue. Dropping every handle stops the worker
/// once the remaining tasks are drained.
#[derive(Clone)]
pub struct AdmissionQueue {
    sender: mpsc::UnboundedSender<QueuedTask>,
    counters: Arc<QueueCounters>,
    wait_timeout: Duration,
}

impl AdmissionQueue {
    /// Spawn the worker. Must be called from within a tokio runtime.
    pub fn start(service: Arc<dyn GenerationService>, settings: &QueueSettings) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let counters = Arc::new(QueueCounters::default());
        let min_interval = Duration::from_millis(settings.min_interval_ms());

        tracing::info!(
            "Admission queue started: min interval {}ms, wait timeout {}s",
            min_interval.as_millis(),
            settings.wait_timeout_secs
        );

        tokio::spawn(run_worker(receiver, service, counters.clone(), min_interval));

        Self {
            sender,
            counters,
            wait_timeout: Duration::from_secs(settings.wait_timeout_secs),
        }
    }

    /// Submit a request and wait for its result, at most the wait timeout.
    pub async fn enqueue(&self, request: GenerationRequest) -> GenerationResult {
        let (responder, receiver) = oneshot::channel();
        let task = QueuedTask {
            id: Uuid::new_v4(),
            request,
            responder,
            enqueued_at: Instant::now(),
        };
        let id = task.id;

        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        self.counters.pending.fetch_add(1, Ordering::Relaxed);

        if self.sender.send(task).is_err() {
            self.counters.pending.fetch_sub(1, Ordering::Relaxed);
            tracing::error!("Admission queue worker is not running");
            return GenerationResult::fallback(FallbackKind::Generic, "admission queue closed");
        }

        tracing::debug!("Task {} queued ({} pending)", id, self.pending());

        match tokio::time::timeout(self.wait_timeout, receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                tracing::error!("Task {} dropped without a result", id);
                GenerationResult::fallback(FallbackKind::Generic, "task dropped by queue worker")
            }
            Err(_) => {
                self.counters.timed_out.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    "Task {} timed out after {}s in the admission queue",
                    id,
                    self.wait_timeout.as_secs()
                );
                GenerationResult::fallback(
                    FallbackKind::QueueTimeout,
                    format!("waited {}s for a dispatch slot", self.wait_timeout.as_secs()),
                )
            }
        }
    }

    pub fn pending(&self) -> u64 {
        self.counters.pending.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> QueueStats {
        let c = &self.counters;
        let processed = c.processed.load(Ordering::Relaxed);
        let total_wait = c.total_wait_ms.load(Ordering::Relaxed);
        QueueStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            processed,
            skipped: c.skipped.load(Ordering::Relaxed),
            timed_out: c.timed_out.load(Ordering::Relaxed),
            pending: c.pending.load(Ordering::Relaxed),
            average_wait_ms: if processed > 0 { total_wait / processed } else { 0 },
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<QueuedTask>,
    service: Arc<dyn GenerationService>,
    counters: Arc<QueueCounters>,
    min_interval: Duration,
) {
    let mut last_dispatch: Option<Instant> = None;

    while let Some(task) = receiver.recv().await {
        counters.pending.fetch_sub(1, Ordering::Relaxed);

        if task.responder.is_closed() {
            counters.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Skipping task {}: caller gone", task.id);
            continue;
        }

        if let Some(last) = last_dispatch {
            let since = last.elapsed();
            if since < min_interval {
                tokio::time::sleep(min_interval - since).await;
            }
        }

        if task.responder.is_closed() {
            counters.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Skipping task {}: caller gone", task.id);
            continue;
        }

        let waited = task.enqueued_at.elapsed();
        counters
            .total_wait_ms
            .fetch_add(waited.as_millis() as u64, Ordering::Relaxed);
        tracing::debug!("Dispatching task {} after {}ms in queue", task.id, waited.as_millis());

        last_dispatch = Some(Instant::now());
        let result = service.generate(task.request).await;
        counters.processed.fetch_add(1, Ordering::Relaxed);

        // The caller may have timed out while the call was in flight.
        let _ = task.responder.send(result);
    }

    tracing::debug!("Admission queue worker stopped");
}
