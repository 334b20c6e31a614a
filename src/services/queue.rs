use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::job::Job;
use crate::services::pipeline::Pipeline;

/// Job payload handed to the worker pool.
#[derive(Debug)]
pub struct QueuedJob {
    pub job_id: Uuid,
    pub url: String,
    /// Receives the terminal record once the job finishes.
    pub notify: Option<oneshot::Sender<Option<Job>>>,
}

impl QueuedJob {
    pub fn new(job_id: Uuid, url: impl Into<String>) -> Self {
        Self {
            job_id,
            url: url.into(),
            notify: None,
        }
    }

    /// Attach a completion channel, returning the receiving end.
    pub fn with_notify(mut self) -> (Self, oneshot::Receiver<Option<Job>>) {
        let (tx, rx) = oneshot::channel();
        self.notify = Some(tx);
        (self, rx)
    }
}

/// Bounded in-process job queue drained by a fixed pool of workers.
///
/// At most `capacity` jobs wait for a worker; beyond that `enqueue` fails
/// with [`QueueError::Full`] instead of buffering without limit.
pub struct JobQueue {
    sender: mpsc::Sender<QueuedJob>,
    in_flight: Arc<AtomicUsize>,
    worker_count: usize,
    workers: Vec<JoinHandle<()>>,
}

impl JobQueue {
    /// Spawn `worker_count` workers on the current runtime.
    pub fn start(pipeline: Pipeline, worker_count: usize, capacity: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (sender, receiver) = mpsc::channel::<QueuedJob>(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let in_flight = Arc::new(AtomicUsize::new(0));

        let workers = (0..worker_count)
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let in_flight = Arc::clone(&in_flight);
                let pipeline = pipeline.clone();
                let depth_sender = sender.downgrade();
                tokio::spawn(async move {
                    run_worker(worker_id, receiver, in_flight, pipeline, depth_sender).await;
                })
            })
            .collect();

        tracing::info!(worker_count, capacity, "Started download workers");

        Self {
            sender,
            in_flight,
            worker_count,
            workers,
        }
    }

    /// Queue a job without waiting for room.
    pub fn enqueue(&self, job: QueuedJob) -> Result<(), QueueError> {
        let job_id = job.job_id;
        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })?;

        metrics::counter!("download_jobs_total").increment(1);
        metrics::gauge!("download_queue_depth").set(self.queue_depth() as f64);
        tracing::debug!(job_id = %job_id, depth = self.queue_depth(), "Job enqueued");
        Ok(())
    }

    /// Jobs waiting for a worker.
    pub fn queue_depth(&self) -> usize {
        queue_depth(&self.sender)
    }

    /// Jobs currently being processed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Stop accepting jobs and wait for queued and running ones to finish.
    pub async fn shutdown(self) {
        tracing::info!(depth = self.queue_depth(), in_flight = self.in_flight(), "Draining download queue");
        drop(self.sender);
        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                tracing::error!(worker_id = i, error = %e, "Worker panicked");
            }
        }
        tracing::info!("All download workers stopped");
    }
}

fn queue_depth(sender: &mpsc::Sender<QueuedJob>) -> usize {
    sender.max_capacity() - sender.capacity()
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    in_flight: Arc<AtomicUsize>,
    pipeline: Pipeline,
    depth_sender: mpsc::WeakSender<QueuedJob>,
) {
    tracing::debug!(worker_id, "Worker started");

    loop {
        let next = receiver.lock().await.recv().await;
        let Some(job) = next else {
            break;
        };

        if let Some(sender) = depth_sender.upgrade() {
            metrics::gauge!("download_queue_depth").set(queue_depth(&sender) as f64);
        }
        let running = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::gauge!("download_jobs_in_flight").set(running as f64);

        let record = pipeline.run(job.job_id, &job.url).await;

        let running = in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::gauge!("download_jobs_in_flight").set(running as f64);

        if let Some(notify) = job.notify {
            // the submitter may have gone away; nothing to do then
            let _ = notify.send(record);
        }
    }

    tracing::debug!(worker_id, "Worker stopped");
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Download queue is full, try again later")]
    Full,

    #[error("Download queue is shut down")]
    Closed,
}
