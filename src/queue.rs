use crossbeam::channel as cbchan;
use std::sync::Arc;
use std::thread;
use std::thread::ThreadId;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Task queue backed by dedicated worker threads.
///
/// `serial` spawns one worker, so jobs run in submission order with no
/// overlap; `concurrent` spawns several workers sharing one channel, which
/// trades ordering for parallelism (effect-queue use only). Handles are
/// cheap clones; dropping the last one closes the channel and the workers
/// drain what is left and exit.
pub struct WorkQueue {
    core: Arc<QueueCore>,
}

struct QueueCore {
    label: String,
    tx: cbchan::Sender<Job>,
    workers: Vec<ThreadId>,
}

impl WorkQueue {
    /// One worker thread; total order of jobs is the submission order.
    pub fn serial(label: &str) -> Self {
        Self::with_workers(label, 1)
    }

    /// `workers` threads sharing one job channel. Jobs may interleave;
    /// each job still runs exactly once.
    pub fn concurrent(label: &str, workers: usize) -> Self {
        Self::with_workers(label, workers.max(1))
    }

    fn with_workers(label: &str, count: usize) -> Self {
        let (tx, rx) = cbchan::unbounded::<Job>();
        let mut workers = Vec::with_capacity(count);

        for i in 0..count {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("{label}-{i}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        job();
                    }
                })
                .expect("failed to spawn work queue thread");
            workers.push(handle.thread().id());
        }

        Self {
            core: Arc::new(QueueCore {
                label: label.to_string(),
                tx,
                workers,
            }),
        }
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.core.label
    }

    #[inline]
    pub fn is_serial(&self) -> bool {
        self.core.workers.len() == 1
    }

    /// True when the calling thread is one of this queue's workers.
    #[inline]
    pub fn on_queue(&self) -> bool {
        self.core.workers.contains(&thread::current().id())
    }

    /// Enqueue a job and return immediately.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        if self.core.tx.send(Box::new(job)).is_err() {
            tracing::warn!("[WorkQueue:{}] submit after shutdown, job dropped", self.core.label);
        }
    }

    /// Run a job on the queue and block for its result.
    ///
    /// When called from one of this queue's own workers the job runs
    /// inline, which preserves serialisation and avoids self-deadlock.
    pub fn submit_wait<R: Send + 'static>(&self, job: impl FnOnce() -> R + Send + 'static) -> R {
        if self.on_queue() {
            return job();
        }

        let (done_tx, done_rx) = cbchan::bounded(1);
        self.submit(move || {
            let _ = done_tx.send(job());
        });
        // The channel cannot close while this handle keeps the queue alive.
        done_rx
            .recv()
            .expect("work queue shut down while waiting for a job")
    }
}

impl Clone for WorkQueue {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Synchronized;

    #[test]
    fn serial_queue_preserves_submission_order() {
        let queue = WorkQueue::serial("test-serial");
        let log = Arc::new(Synchronized::new(Vec::new()));

        for i in 0..32 {
            let log = log.clone();
            queue.submit(move || log.with_lock(|l| l.push(i)));
        }
        // Barrier: runs after everything submitted above.
        let seen = queue.submit_wait({
            let log = log.clone();
            move || log.with_lock(|l| l.clone())
        });

        assert_eq!(seen, (0..32).collect::<Vec<_>>());
    }

    #[test]
    fn submit_wait_runs_inline_on_own_worker() {
        let queue = WorkQueue::serial("test-inline");
        let inner = queue.clone();
        let nested = queue.submit_wait(move || inner.submit_wait(|| 7));
        assert_eq!(nested, 7);
    }

    #[test]
    fn on_queue_distinguishes_threads() {
        let queue = WorkQueue::serial("test-onq");
        assert!(!queue.on_queue());
        let inner = queue.clone();
        assert!(queue.submit_wait(move || inner.on_queue()));
    }

    #[test]
    fn concurrent_queue_runs_every_job_once() {
        let queue = WorkQueue::concurrent("test-conc", 4);
        let log = Arc::new(Synchronized::new(Vec::new()));
        for i in 0..64 {
            let log = log.clone();
            queue.submit(move || log.with_lock(|l| l.push(i)));
        }
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while log.with_lock(|l| l.len()) < 64 {
            assert!(std::time::Instant::now() < deadline, "jobs did not finish");
            thread::yield_now();
        }
        let mut seen = log.with_lock(|l| l.clone());
        seen.sort_unstable();
        assert_eq!(seen, (0..64).collect::<Vec<_>>());
    }
}
