use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::error::QueueError;
use crate::job::{JobStatus, RetryPolicy, SendJob};
use crate::transport::WebhookTransport;

/// Where a queued job should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueTarget {
    /// Queue connection; `None` lets the queue pick its default.
    pub connection: Option<String>,
    pub queue: String,
}

impl QueueTarget {
    pub fn new(queue: impl Into<String>) -> Self {
        QueueTarget { connection: None, queue: queue.into() }
    }

    pub fn on_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }
}

impl fmt::Display for QueueTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.connection {
            Some(conn) => write!(f, "{}/{}", conn, self.queue),
            None => f.write_str(&self.queue),
        }
    }
}

/// Asynchronous execution system for [`SendJob`]s.
///
/// `push` must only enqueue and return; running the job, retrying it
/// according to `policy` and giving up are the queue's business.
pub trait JobQueue: Send + Sync {
    fn push(&self, target: &QueueTarget, job: SendJob, policy: RetryPolicy) -> Result<(), QueueError>;
}

struct QueuedJob {
    target: QueueTarget,
    job: SendJob,
    policy: RetryPolicy,
}

/// In-process [`JobQueue`] running jobs on a Tokio task.
///
/// Jobs are taken from a bounded channel in FIFO order. A failed job is
/// rescheduled after the policy delay without holding up the jobs
/// behind it, until its attempts are used up.
pub struct LocalQueue {
    sender: mpsc::Sender<QueuedJob>,
    /// Jobs accepted into the channel.
    pub enqueued_jobs: Arc<AtomicU64>,
    /// Jobs rejected because the channel was full.
    pub dropped_jobs: Arc<AtomicU64>,
    /// Jobs abandoned after their last failed attempt.
    pub failed_jobs: Arc<AtomicU64>,
}

impl LocalQueue {
    /// Create a queue and spawn its worker task.
    ///
    /// Must be called from within a Tokio runtime. `buffer` is raised to
    /// at least 16.
    pub fn spawn(transport: Arc<dyn WebhookTransport>, buffer: usize) -> (Self, JoinHandle<()>) {
        let buffer = buffer.max(16);
        let (tx, mut rx) = mpsc::channel::<QueuedJob>(buffer);

        let enqueued_jobs = Arc::new(AtomicU64::new(0));
        let dropped_jobs = Arc::new(AtomicU64::new(0));
        let failed_jobs = Arc::new(AtomicU64::new(0));

        let failed_jobs_bg = Arc::clone(&failed_jobs);

        let handle = tokio::spawn(async move {
            while let Some(queued) = rx.recv().await {
                let status = queued.job.execute(&*transport).await;
                if status.is_failed() {
                    retry_later(Arc::clone(&transport), queued, Arc::clone(&failed_jobs_bg));
                }
            }
        });

        (Self { sender: tx, enqueued_jobs, dropped_jobs, failed_jobs }, handle)
    }
}

fn retry_later(transport: Arc<dyn WebhookTransport>, queued: QueuedJob, failed_jobs: Arc<AtomicU64>) {
    let QueuedJob { target, job, policy } = queued;
    if policy.max_attempts <= 1 {
        give_up(&target, &failed_jobs, 1);
        return;
    }

    tokio::spawn(async move {
        let mut attempt = 1;
        while attempt < policy.max_attempts {
            tracing::debug!(
                target: "rocketchat_log_sink",
                queue = %target,
                attempt,
                delay = ?policy.delay,
                "retrying webhook delivery"
            );
            sleep(policy.delay).await;
            attempt += 1;
            if let JobStatus::Completed = job.execute(&*transport).await {
                return;
            }
        }
        give_up(&target, &failed_jobs, attempt);
    });
}

fn give_up(target: &QueueTarget, failed_jobs: &AtomicU64, attempts: u32) {
    failed_jobs.fetch_add(1, Ordering::Relaxed);
    tracing::warn!(
        target: "rocketchat_log_sink",
        queue = %target,
        attempts,
        "giving up on webhook delivery"
    );
}

impl JobQueue for LocalQueue {
    fn push(&self, target: &QueueTarget, job: SendJob, policy: RetryPolicy) -> Result<(), QueueError> {
        let queued = QueuedJob { target: target.clone(), job, policy };
        match self.sender.try_send(queued) {
            Ok(()) => {
                self.enqueued_jobs.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped_jobs.fetch_add(1, Ordering::Relaxed);
                Err(QueueError::Full { queue: target.to_string() })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(QueueError::Closed { queue: target.to_string() }),
        }
    }
}
