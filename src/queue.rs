use std::{
    collections::VecDeque,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::Utc;
use futures::FutureExt;
use tokio::runtime::Handle;
use tracing::{error, info, warn};

use crate::{
    models::{Job, QueueStatus, SigningOutcome},
    signing::Signer,
};

#[derive(Default)]
struct QueueState {
    waiting: VecDeque<Job>,
    active: bool,
}

/// FIFO of signing jobs with a single execution slot.
///
/// `submit` never blocks. The job at the head of the queue starts as soon as
/// the slot is free; when it finishes the slot is released and the next job
/// is started on a fresh task, so a long backlog never deepens the stack.
pub struct SignQueue {
    state: Mutex<QueueState>,
    signer: Arc<dyn Signer>,
    runtime: Handle,
}

impl SignQueue {
    /// # Panics
    ///
    /// When called outside of a Tokio runtime.
    pub fn new(signer: Arc<dyn Signer>) -> Arc<Self> {
        Arc::new(SignQueue {
            state: Mutex::new(QueueState::default()),
            signer,
            runtime: Handle::current(),
        })
    }

    /// Appends the job and returns how many jobs are waiting ahead of it.
    /// 0 means it runs next (or is already running).
    pub fn submit(self: &Arc<Self>, job: Job) -> usize {
        let job_id = job.id.clone();
        let position = {
            let mut state = self.lock();
            state.waiting.push_back(job);
            state.waiting.len() - 1
        };
        info!("Queued job {} at position {}", &job_id, position);
        self.drain();
        position
    }

    pub fn len(&self) -> usize {
        self.lock().waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.lock();
        QueueStatus {
            waiting: state.waiting.len(),
            active: state.active,
        }
    }

    /// Starts the head job if the slot is free. No-op otherwise.
    fn drain(self: &Arc<Self>) {
        let job = {
            let mut state = self.lock();
            if state.active {
                return;
            }
            match state.waiting.pop_front() {
                Some(job) => {
                    state.active = true;
                    job
                }
                None => return,
            }
        };
        let queue = Arc::clone(self);
        self.runtime.spawn(async move {
            let _slot = ActiveSlot { queue: Arc::clone(&queue) };
            queue.execute(job).await;
        });
    }

    fn release(self: &Arc<Self>) {
        self.lock().active = false;
        self.drain();
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[tracing::instrument(skip(self, job), fields(job_id = %job.id, name = %job.original_name))]
    async fn execute(&self, job: Job) {
        let Job {
            id,
            input,
            original_name,
            enqueued_at,
            result_sink,
        } = job;
        let started = Utc::now();
        info!("Starting job after waiting {} ms", (started - enqueued_at).num_milliseconds());

        let outcome = match AssertUnwindSafe(self.signer.sign(input.path(), &original_name)).catch_unwind().await {
            Ok(result) => SigningOutcome::from(result),
            Err(_) => {
                error!("Signing task panicked");
                SigningOutcome::Failed("signing task panicked".to_string())
            }
        };
        let duration = (Utc::now() - started).num_milliseconds();
        match &outcome {
            SigningOutcome::Signed(bytes) => info!("Finished job in {} ms, {} KiB signed", duration, bytes.len() / 1024),
            SigningOutcome::Failed(reason) => warn!("Job failed after {} ms: {}", duration, reason),
        }

        if result_sink.send(outcome).is_err() {
            warn!("Result of job {} was dropped, the client is gone", &id);
        }
        input.remove().await;
    }
}

/// Holds the execution slot. Dropping it, also while unwinding, frees the
/// slot and starts the next job.
///
/// Only created once the task is first polled. A task the runtime drops
/// unpolled during shutdown keeps the slot taken, so the backlog is
/// abandoned instead of being popped one nested `drain` at a time.
struct ActiveSlot {
    queue: Arc<SignQueue>,
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        self.queue.release();
    }
}
