//! A pool of either kind that runs named registry functions.

use std::sync::Arc;

use serde_json::Value;

use super::{ProcessPool, ThreadPool, WorkerCommand, WorkerPool};
use crate::backend::Backend;
use crate::error::Result;
use crate::registry::Registry;

/// A task for a named function: the name plus one input item.
#[derive(Clone, Debug)]
pub struct Call {
    pub func: Arc<str>,
    pub args: Value,
}

type Outcome = std::result::Result<Value, String>;

pub enum RegistryPool {
    Thread {
        pool: ThreadPool<Outcome>,
        registry: Arc<Registry>,
    },
    Process(ProcessPool),
}

impl RegistryPool {
    /// In-process workers calling straight into `registry`.
    pub fn threads(workers: usize, registry: &Arc<Registry>) -> Result<Self> {
        Ok(RegistryPool::Thread {
            pool: ThreadPool::new(workers)?,
            registry: Arc::clone(registry),
        })
    }

    /// Worker processes launched from `command`.
    pub fn processes(workers: usize, command: &WorkerCommand) -> Result<Self> {
        Ok(RegistryPool::Process(ProcessPool::new(workers, command)?))
    }

    pub fn backend(&self) -> Backend {
        match self {
            RegistryPool::Thread { .. } => Backend::Thread,
            RegistryPool::Process(_) => Backend::Process,
        }
    }
}

impl WorkerPool for RegistryPool {
    type Job = Call;
    type Output = Outcome;

    fn workers(&self) -> usize {
        match self {
            RegistryPool::Thread { pool, .. } => pool.workers(),
            RegistryPool::Process(pool) => pool.workers(),
        }
    }

    fn submit(&mut self, index: usize, job: Call) -> Result<()> {
        match self {
            RegistryPool::Thread { pool, registry } => {
                let registry = Arc::clone(registry);
                pool.submit(index, Box::new(move || registry.call(&job.func, job.args)))
            }
            RegistryPool::Process(pool) => pool.submit(index, job),
        }
    }

    fn wait_any(&mut self) -> Result<Option<(usize, Outcome)>> {
        match self {
            RegistryPool::Thread { pool, .. } => pool.wait_any(),
            RegistryPool::Process(pool) => pool.wait_any(),
        }
    }

    fn in_flight(&self) -> usize {
        match self {
            RegistryPool::Thread { pool, .. } => pool.in_flight(),
            RegistryPool::Process(pool) => pool.in_flight(),
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        match self {
            RegistryPool::Thread { pool, .. } => pool.shutdown(),
            RegistryPool::Process(pool) => pool.shutdown(),
        }
    }
}
