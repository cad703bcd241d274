//! Serialized foreground context.
//!
//! Completion work is posted here from background tasks and runs only when
//! the owning thread drains the queue, so callbacks never run on a
//! background thread.

use tokio::sync::mpsc;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Receiving side of the foreground queue, owned by the main thread.
pub struct Foreground {
    rx: mpsc::UnboundedReceiver<Job>,
}

/// Cloneable posting side of the foreground queue.
#[derive(Clone)]
pub struct ForegroundHandle {
    tx: mpsc::UnboundedSender<Job>,
}

impl Foreground {
    /// Creates a foreground queue and its first posting handle.
    pub fn new() -> (Self, ForegroundHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, ForegroundHandle { tx })
    }

    /// Runs every job already queued without waiting. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Waits for the next job and runs it.
    ///
    /// Returns `false` once every [`ForegroundHandle`] is gone and the queue
    /// is empty.
    pub async fn run_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Runs jobs until every handle is dropped and the queue drains.
    pub async fn run_until_closed(&mut self) -> usize {
        let mut ran = 0;
        while self.run_next().await {
            ran += 1;
        }
        ran
    }
}

impl ForegroundHandle {
    /// Queues `job` for the foreground. Returns `false` if the foreground is gone.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send(Box::new(job)).is_ok()
    }

    /// Returns true if the foreground has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
