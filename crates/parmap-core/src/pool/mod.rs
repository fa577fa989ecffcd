//! Worker pools: submit tasks, wait for whichever finishes first.
//!
//! Runners only talk to a pool through [`WorkerPool`]; scheduling inside the
//! pool belongs to rayon (threads) or to the OS (processes).

mod process;
mod registry_pool;
mod thread;

pub use process::{ProcessPool, WorkerCommand};
pub use registry_pool::{Call, RegistryPool};
pub use thread::{Job, ThreadPool};

use crate::error::Result;

pub trait WorkerPool {
    type Job;
    type Output;

    /// Number of workers the pool was started with.
    fn workers(&self) -> usize;

    /// Queue one task. `index` comes back with its completion.
    fn submit(&mut self, index: usize, job: Self::Job) -> Result<()>;

    /// Block until any submitted task completes. `Ok(None)` once nothing is in flight.
    fn wait_any(&mut self) -> Result<Option<(usize, Self::Output)>>;

    /// Tasks submitted but not yet returned by `wait_any`.
    fn in_flight(&self) -> usize;

    /// Drain in-flight tasks and release the workers. Idempotent.
    fn shutdown(&mut self) -> Result<()>;
}
