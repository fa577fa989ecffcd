//! Streaming driver: results in completion order, bounded in-flight window.

use std::iter::FusedIterator;

use crate::error::Result;
use crate::pool::WorkerPool;
use crate::progress::Progress;

/// Lazy, single-pass sequence of results in completion order.
///
/// Input is pulled only to keep at most `window` tasks in flight, so an
/// unbounded input is fine as long as the consumer stops. After a failure the
/// error is yielded once and the stream ends. Dropping the stream drains the
/// tasks still running and shuts the pool down.
pub struct ParallelStream<'a, P: WorkerPool, V> {
    pool: P,
    jobs: Box<dyn Iterator<Item = Result<P::Job>> + 'a>,
    settle: Box<dyn FnMut(usize, P::Output) -> Result<V> + 'a>,
    progress: Progress,
    window: usize,
    submitted: usize,
    input_done: bool,
    finished: bool,
}

impl<'a, P: WorkerPool, V> ParallelStream<'a, P, V> {
    pub(crate) fn new(
        pool: P,
        jobs: Box<dyn Iterator<Item = Result<P::Job>> + 'a>,
        settle: Box<dyn FnMut(usize, P::Output) -> Result<V> + 'a>,
        window: usize,
        progress: Progress,
    ) -> Self {
        tracing::debug!(window, workers = pool.workers(), "stream started");
        Self {
            pool,
            jobs,
            settle,
            progress,
            window: window.max(1),
            submitted: 0,
            input_done: false,
            finished: false,
        }
    }

    /// Tasks submitted so far.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Tasks running or finished but not yet yielded.
    pub fn in_flight(&self) -> usize {
        self.pool.in_flight()
    }

    fn refill(&mut self) -> Result<()> {
        while !self.input_done && self.pool.in_flight() < self.window {
            match self.jobs.next() {
                Some(job) => {
                    self.pool.submit(self.submitted, job?)?;
                    self.submitted += 1;
                }
                None => {
                    self.input_done = true;
                    tracing::debug!(tasks = self.submitted, "stream input exhausted");
                }
            }
        }
        Ok(())
    }

    fn close(&mut self, complete: bool) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Err(e) = self.pool.shutdown() {
            tracing::warn!(error = %e, "worker pool shutdown failed");
        }
        if complete {
            self.progress.finish();
        } else {
            self.progress.abandon();
        }
    }
}

impl<'a, P: WorkerPool, V> Iterator for ParallelStream<'a, P, V> {
    type Item = Result<V>;

    fn next(&mut self) -> Option<Result<V>> {
        if self.finished {
            return None;
        }
        if let Err(e) = self.refill() {
            self.close(false);
            return Some(Err(e));
        }
        match self.pool.wait_any() {
            Ok(Some((index, output))) => {
                self.progress.inc();
                match (self.settle)(index, output) {
                    Ok(value) => Some(Ok(value)),
                    Err(e) => {
                        self.close(false);
                        Some(Err(e))
                    }
                }
            }
            Ok(None) => {
                self.close(true);
                None
            }
            Err(e) => {
                self.close(false);
                Some(Err(e))
            }
        }
    }
}

impl<'a, P: WorkerPool, V> FusedIterator for ParallelStream<'a, P, V> {}

impl<'a, P: WorkerPool, V> Drop for ParallelStream<'a, P, V> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(submitted = self.submitted, "stream dropped early");
            self.close(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::pool::{Job, ThreadPool};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn stream_of<'a, I>(workers: usize, window: usize, jobs: I) -> ParallelStream<'a, ThreadPool<u64>, u64>
    where
        I: Iterator<Item = Job<u64>> + 'a,
    {
        ParallelStream::new(
            ThreadPool::new(workers).unwrap(),
            Box::new(jobs.map(Ok::<_, Error>)),
            Box::new(|_, v| Ok(v)),
            window,
            Progress::disabled(),
        )
    }

    #[test]
    fn yields_every_result() {
        let jobs = (0..20_u64).map(|i| Box::new(move || i * i) as Job<u64>);
        let mut out: Vec<u64> = stream_of(3, 4, jobs).map(|r| r.unwrap()).collect();
        out.sort_unstable();
        assert_eq!(out, (0..20).map(|i| i * i).collect::<Vec<_>>());
    }

    #[test]
    fn fast_result_is_not_held_behind_slow_one() {
        let jobs = vec![
            Box::new(|| {
                std::thread::sleep(Duration::from_millis(300));
                1_u64
            }) as Job<u64>,
            Box::new(|| 2_u64) as Job<u64>,
        ];
        let out: Vec<u64> = stream_of(2, 2, jobs.into_iter()).map(|r| r.unwrap()).collect();
        assert_eq!(out, vec![2, 1]);
    }

    #[test]
    fn window_bounds_submission_of_infinite_input() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulled);
        let jobs = (0_u64..).map(move |i| {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::new(move || i) as Job<u64>
        });
        let mut stream = stream_of(2, 3, jobs);
        let first: Vec<u64> = stream.by_ref().take(5).map(|r| r.unwrap()).collect();
        assert_eq!(first.len(), 5);
        assert!(stream.submitted() <= 5 + 3);
        drop(stream);
        assert!(pulled.load(Ordering::SeqCst) <= 8);
    }

    #[test]
    fn in_flight_stays_within_window() {
        let jobs = (0..10_u64).map(|i| Box::new(move || i) as Job<u64>);
        let mut stream = stream_of(2, 3, jobs);
        assert_eq!(stream.in_flight(), 0);
        assert!(stream.next().is_some());
        assert!(stream.in_flight() <= 2);
        assert_eq!(stream.submitted(), 3);
        let rest = stream.by_ref().count();
        assert_eq!(rest, 9);
        assert_eq!(stream.in_flight(), 0);
    }

    #[test]
    fn failure_is_yielded_once_then_stream_ends() {
        let jobs = (0..10_u64).map(|i| {
            Box::new(move || {
                if i == 0 {
                    panic!("first task fails");
                }
                i
            }) as Job<u64>
        });
        let mut stream = stream_of(1, 1, jobs);
        match stream.next() {
            Some(Err(Error::Task { index: 0, message })) => {
                assert_eq!(message, "panicked: first task fails")
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
        assert_eq!(stream.submitted(), 1);
    }

    #[test]
    fn empty_input_ends_immediately() {
        let mut stream = stream_of(2, 2, std::iter::empty());
        assert!(stream.next().is_none());
        assert_eq!(stream.submitted(), 0);
    }
}
