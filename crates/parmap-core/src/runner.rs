//! Runner for named functions on either backend.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::backend::Backend;
use crate::config::{RunOptions, LIST_LABEL, STREAM_LABEL};
use crate::error::{Error, Result};
use crate::exec::collect_ordered;
use crate::map::exact_len;
use crate::pool::{Call, RegistryPool, WorkerCommand};
use crate::progress::Progress;
use crate::registry::Registry;
use crate::stream::ParallelStream;

/// Stream of results from a [`Runner`].
pub type RunnerStream<'a, R> = ParallelStream<'a, RegistryPool, R>;

/// Runs functions from a [`Registry`] by name.
///
/// Items are serialized to JSON, unpacked into positional arguments and
/// handed to the function on a worker thread or in a worker process. For the
/// process backend every worker runs [`WorkerCommand`], which must serve the
/// same registry (see [`worker`](crate::worker)); by default that is the
/// current executable.
#[derive(Clone, Debug)]
pub struct Runner {
    registry: Arc<Registry>,
    worker: Option<WorkerCommand>,
}

impl Runner {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
            worker: None,
        }
    }

    /// Program to launch as a worker process instead of the current executable.
    pub fn with_worker(mut self, command: WorkerCommand) -> Self {
        self.worker = Some(command);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Apply the function `func` to every item, results in input order.
    pub fn run_parallel_list<T, R, I>(&self, func: &str, data: I, options: &RunOptions) -> Result<Vec<R>>
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
        R: DeserializeOwned,
    {
        let name: Arc<str> = Arc::from(func);
        let jobs = data
            .into_iter()
            .map(|item| to_call(&name, item))
            .collect::<Result<Vec<_>>>()?;
        let pool = self.start_pool(func, options)?;
        let progress = Progress::new(
            options.progress,
            Some(jobs.len() as u64),
            options.label_or(LIST_LABEL),
        );
        collect_ordered(pool, jobs, progress, settle::<R>)
    }

    /// Apply the function `func` to every item, results in completion order.
    pub fn run_parallel_stream<'a, T, R, I>(
        &self,
        func: &str,
        data: I,
        options: &RunOptions,
    ) -> Result<RunnerStream<'a, R>>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: 'a,
        T: Serialize,
        R: DeserializeOwned + 'a,
    {
        let pool = self.start_pool(func, options)?;
        let name: Arc<str> = Arc::from(func);
        let items = data.into_iter();
        let progress = Progress::new(
            options.progress,
            exact_len(&items),
            options.label_or(STREAM_LABEL),
        );
        let jobs = items.map(move |item| to_call(&name, item));
        Ok(ParallelStream::new(
            pool,
            Box::new(jobs),
            Box::new(settle::<R>),
            options.resolved_in_flight(),
            progress,
        ))
    }

    fn start_pool(&self, func: &str, options: &RunOptions) -> Result<RegistryPool> {
        let workers = options.resolved_workers();
        tracing::debug!(func, backend = %options.backend, workers, "starting pool");
        match options.backend {
            Backend::Thread => {
                // Worker processes may serve functions this side lacks, so the
                // name is only checked up front in-process.
                if !self.registry.contains(func) {
                    return Err(Error::UnknownFunction(func.to_string()));
                }
                RegistryPool::threads(workers, &self.registry)
            }
            Backend::Process => {
                let command = match &self.worker {
                    Some(command) => command.clone(),
                    None => WorkerCommand::current_exe()?,
                };
                RegistryPool::processes(workers, &command)
            }
        }
    }
}

fn to_call<T: Serialize>(name: &Arc<str>, item: T) -> Result<Call> {
    Ok(Call {
        func: Arc::clone(name),
        args: serde_json::to_value(item)?,
    })
}

fn settle<R: DeserializeOwned>(index: usize, outcome: std::result::Result<Value, String>) -> Result<R> {
    let value = outcome.map_err(|message| Error::Task { index, message })?;
    serde_json::from_value(value).map_err(|e| Error::Task {
        index,
        message: format!("unexpected result: {}", e),
    })
}
