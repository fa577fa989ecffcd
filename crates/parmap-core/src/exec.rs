//! Batch driver: submit everything, write each completion into its slot.

use crate::error::{Error, Result};
use crate::pool::WorkerPool;
use crate::progress::Progress;

/// Run `jobs` on `pool` and return outputs in submission order.
///
/// `settle` turns a raw pool output into the caller's value and may reject it;
/// the first error (from the pool or from `settle`) wins. The pool is shut
/// down on every path before returning.
pub(crate) fn collect_ordered<P, V, S>(
    mut pool: P,
    jobs: Vec<P::Job>,
    progress: Progress,
    mut settle: S,
) -> Result<Vec<V>>
where
    P: WorkerPool,
    S: FnMut(usize, P::Output) -> Result<V>,
{
    let outcome = fill_slots(&mut pool, jobs, &progress, &mut settle);
    let closed = pool.shutdown();
    match &outcome {
        Ok(_) => progress.finish(),
        Err(e) => {
            progress.abandon();
            tracing::debug!(error = %e, "batch failed");
        }
    }
    let values = outcome?;
    closed?;
    Ok(values)
}

fn fill_slots<P, V, S>(
    pool: &mut P,
    jobs: Vec<P::Job>,
    progress: &Progress,
    settle: &mut S,
) -> Result<Vec<V>>
where
    P: WorkerPool,
    S: FnMut(usize, P::Output) -> Result<V>,
{
    let total = jobs.len();
    let mut slots: Vec<Option<V>> = (0..total).map(|_| None).collect();

    for (index, job) in jobs.into_iter().enumerate() {
        pool.submit(index, job)?;
    }
    tracing::debug!(tasks = total, workers = pool.workers(), "batch submitted");

    while let Some((index, output)) = pool.wait_any()? {
        let value = settle(index, output)?;
        match slots.get_mut(index) {
            Some(slot) => *slot = Some(value),
            None => return Err(Error::MissingResult(index)),
        }
        progress.inc();
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| slot.ok_or(Error::MissingResult(index)))
        .collect()
}
