//! Typed in-process runners over closures and function items.
//!
//! These run on the thread backend only: a closure cannot be sent to another
//! process. Use [`Runner`](crate::Runner) with a [`Registry`](crate::Registry)
//! to run named functions on either backend.

use std::fmt::Display;
use std::sync::Arc;

use crate::args::{IntoArgs, TaskFn};
use crate::backend::Backend;
use crate::config::{RunOptions, LIST_LABEL, STREAM_LABEL};
use crate::error::{Error, Result};
use crate::exec::collect_ordered;
use crate::pool::{Job, ThreadPool};
use crate::progress::Progress;
use crate::stream::ParallelStream;

/// Stream of results from a typed runner.
pub type TypedStream<'a, O, V> = ParallelStream<'a, ThreadPool<O>, V>;

/// Apply `func` to every item of `data` and return the results in input order.
///
/// Each item is unpacked into the function's parameters: a plain value is the
/// only argument, a tuple is spread across the parameters. Blocks until every
/// task has finished. A panicking task fails the whole call with
/// [`Error::Task`] carrying the input index.
///
/// ```
/// use parmap_core::{run_parallel_list, RunOptions};
///
/// let opts = RunOptions::new().workers(2);
/// let squares = run_parallel_list(|x: i32| x * x, vec![1, 2, 3, 4], &opts).unwrap();
/// assert_eq!(squares, vec![1, 4, 9, 16]);
///
/// let sums = run_parallel_list(|a: i32, b: i32| a + b, vec![(1, 2), (3, 4)], &opts).unwrap();
/// assert_eq!(sums, vec![3, 7]);
/// ```
pub fn run_parallel_list<F, Args, T, I>(func: F, data: I, options: &RunOptions) -> Result<Vec<F::Output>>
where
    F: TaskFn<Args>,
    F::Output: Send + 'static,
    Args: Send + 'static,
    I: IntoIterator<Item = T>,
    T: IntoArgs<Args>,
{
    ordered(func, data, options, |_, output| Ok(output))
}

/// [`run_parallel_list`] for functions returning `Result`: the first `Err`
/// (lowest completion, not lowest index) fails the call.
pub fn try_run_parallel_list<F, Args, T, I, V, E>(func: F, data: I, options: &RunOptions) -> Result<Vec<V>>
where
    F: TaskFn<Args, Output = std::result::Result<V, E>>,
    V: Send + 'static,
    E: Display + Send + 'static,
    Args: Send + 'static,
    I: IntoIterator<Item = T>,
    T: IntoArgs<Args>,
{
    ordered(func, data, options, settle_fallible)
}

/// Apply `func` to every item of `data`, yielding results as they complete.
///
/// Input is consumed lazily, keeping at most
/// [`resolved_in_flight`](RunOptions::resolved_in_flight) tasks submitted at a
/// time, so `data` may be unbounded.
///
/// ```
/// use parmap_core::{run_parallel_stream, RunOptions};
///
/// let opts = RunOptions::new().workers(2);
/// let mut out: Vec<u64> = run_parallel_stream(|x: u64| x + 1, 0..5, &opts)
///     .unwrap()
///     .map(|r| r.unwrap())
///     .collect();
/// out.sort();
/// assert_eq!(out, vec![1, 2, 3, 4, 5]);
/// ```
pub fn run_parallel_stream<'a, F, Args, T, I>(
    func: F,
    data: I,
    options: &RunOptions,
) -> Result<TypedStream<'a, F::Output, F::Output>>
where
    F: TaskFn<Args>,
    F::Output: Send + 'static,
    Args: Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: 'a,
    T: IntoArgs<Args>,
{
    streaming(func, data, options, |_, output| Ok(output))
}

/// [`run_parallel_stream`] for functions returning `Result`.
pub fn try_run_parallel_stream<'a, F, Args, T, I, V, E>(
    func: F,
    data: I,
    options: &RunOptions,
) -> Result<TypedStream<'a, std::result::Result<V, E>, V>>
where
    F: TaskFn<Args, Output = std::result::Result<V, E>>,
    V: Send + 'static,
    E: Display + Send + 'static,
    Args: Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: 'a,
    T: IntoArgs<Args>,
{
    streaming(func, data, options, settle_fallible)
}

fn ordered<F, Args, T, I, V, S>(func: F, data: I, options: &RunOptions, settle: S) -> Result<Vec<V>>
where
    F: TaskFn<Args>,
    F::Output: Send + 'static,
    Args: Send + 'static,
    I: IntoIterator<Item = T>,
    T: IntoArgs<Args>,
    S: FnMut(usize, F::Output) -> Result<V>,
{
    let pool = thread_pool::<F::Output>(options)?;
    let func = Arc::new(func);
    let jobs: Vec<Job<F::Output>> = data
        .into_iter()
        .map(|item| into_job(&func, item.into_args()))
        .collect();
    let progress = Progress::new(
        options.progress,
        Some(jobs.len() as u64),
        options.label_or(LIST_LABEL),
    );
    collect_ordered(pool, jobs, progress, settle)
}

fn streaming<'a, F, Args, T, I, V, S>(
    func: F,
    data: I,
    options: &RunOptions,
    settle: S,
) -> Result<TypedStream<'a, F::Output, V>>
where
    F: TaskFn<Args>,
    F::Output: Send + 'static,
    Args: Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: 'a,
    T: IntoArgs<Args>,
    S: FnMut(usize, F::Output) -> Result<V> + 'a,
{
    let pool = thread_pool::<F::Output>(options)?;
    let func = Arc::new(func);
    let items = data.into_iter();
    let progress = Progress::new(
        options.progress,
        exact_len(&items),
        options.label_or(STREAM_LABEL),
    );
    let jobs = items.map(move |item| -> Result<Job<F::Output>> {
        Ok(into_job(&func, item.into_args()))
    });
    Ok(ParallelStream::new(
        pool,
        Box::new(jobs),
        Box::new(settle),
        options.resolved_in_flight(),
        progress,
    ))
}

fn thread_pool<O: Send + 'static>(options: &RunOptions) -> Result<ThreadPool<O>> {
    match options.backend {
        Backend::Thread => ThreadPool::new(options.resolved_workers()),
        Backend::Process => Err(Error::UnsupportedBackend(Backend::Process)),
    }
}

fn into_job<F, Args>(func: &Arc<F>, args: Args) -> Job<F::Output>
where
    F: TaskFn<Args>,
    F::Output: Send + 'static,
    Args: Send + 'static,
{
    let func = Arc::clone(func);
    Box::new(move || func.call(args))
}

fn settle_fallible<V, E: Display>(index: usize, output: std::result::Result<V, E>) -> Result<V> {
    output.map_err(|e| Error::Task {
        index,
        message: e.to_string(),
    })
}

/// Task count for the progress bar when the input knows it exactly.
pub(crate) fn exact_len<I: Iterator>(items: &I) -> Option<u64> {
    match items.size_hint() {
        (lower, Some(upper)) if lower == upper => Some(lower as u64),
        _ => None,
    }
}
