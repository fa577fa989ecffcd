//! Thread-backed pool on top of a dedicated rayon pool.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam::channel::{unbounded, Receiver, Sender};

use super::WorkerPool;
use crate::error::{panic_message, Error, Result};

/// A unit of work for [`ThreadPool`].
pub type Job<O> = Box<dyn FnOnce() -> O + Send + 'static>;

type Completion<O> = (usize, thread::Result<O>);

pub struct ThreadPool<O> {
    pool: Option<rayon::ThreadPool>,
    result_tx: Sender<Completion<O>>,
    result_rx: Receiver<Completion<O>>,
    worker_count: usize,
    in_flight: usize,
}

impl<O: Send + 'static> ThreadPool<O> {
    pub fn new(worker_count: usize) -> Result<Self> {
        let worker_count = worker_count.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .thread_name(|i| format!("parmap-worker-{}", i))
            .build()?;
        let (result_tx, result_rx) = unbounded();
        tracing::debug!(workers = worker_count, "thread pool started");
        Ok(Self {
            pool: Some(pool),
            result_tx,
            result_rx,
            worker_count,
            in_flight: 0,
        })
    }
}

impl<O: Send + 'static> WorkerPool for ThreadPool<O> {
    type Job = Job<O>;
    type Output = O;

    fn workers(&self) -> usize {
        self.worker_count
    }

    fn submit(&mut self, index: usize, job: Job<O>) -> Result<()> {
        let pool = self.pool.as_ref().ok_or(Error::PoolClosed)?;
        let result_tx = self.result_tx.clone();
        pool.spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(job));
            let _ = result_tx.send((index, outcome));
        });
        self.in_flight += 1;
        Ok(())
    }

    fn wait_any(&mut self) -> Result<Option<(usize, O)>> {
        if self.in_flight == 0 {
            return Ok(None);
        }
        let (index, outcome) = self.result_rx.recv().map_err(|_| Error::PoolClosed)?;
        self.in_flight -= 1;
        match outcome {
            Ok(output) => Ok(Some((index, output))),
            Err(payload) => Err(Error::Task {
                index,
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    fn in_flight(&self) -> usize {
        self.in_flight
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.pool.is_none() {
            return Ok(());
        }
        // Every spawned job sends exactly once, panics included.
        while self.in_flight > 0 {
            if self.result_rx.recv().is_err() {
                break;
            }
            self.in_flight -= 1;
        }
        self.pool = None;
        tracing::debug!(workers = self.worker_count, "thread pool shut down");
        Ok(())
    }
}

impl<O> Drop for ThreadPool<O> {
    fn drop(&mut self) {
        while self.pool.is_some() && self.in_flight > 0 {
            if self.result_rx.recv().is_err() {
                break;
            }
            self.in_flight -= 1;
        }
    }
}
