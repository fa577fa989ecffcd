//! Process-backed pool: N worker processes, one dispatcher thread per worker.
//!
//! Dispatchers pull tasks from a shared queue, write a request line to their
//! worker's stdin and wait for the matching response on its stdout.

use std::ffi::OsString;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, Receiver, Sender};
use serde_json::Value;

use super::registry_pool::Call;
use super::WorkerPool;
use crate::error::{Error, Result};
use crate::wire::{read_line, write_line, Request, Response};
use crate::worker::{is_worker, WORKER_ENV};

/// How to launch a worker process.
#[derive(Clone, Debug)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    /// Re-launch the running executable; it is expected to check
    /// [`worker::is_worker`](crate::worker::is_worker) on startup.
    pub fn current_exe() -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn spawn(&self) -> std::io::Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .env(WORKER_ENV, "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
    }
}

type Outcome = std::result::Result<Value, String>;
type Completion = (usize, Result<Outcome>);

pub struct ProcessPool {
    task_tx: Option<Sender<(usize, Call)>>,
    result_rx: Receiver<Completion>,
    handles: Vec<JoinHandle<()>>,
    worker_count: usize,
    in_flight: usize,
}

impl ProcessPool {
    /// Spawn `worker_count` workers. Refused inside a worker process, where
    /// every child would start a pool of its own.
    pub fn new(worker_count: usize, command: &WorkerCommand) -> Result<Self> {
        refuse_nested(is_worker())?;
        let worker_count = worker_count.max(1);
        let (task_tx, task_rx) = unbounded::<(usize, Call)>();
        let (result_tx, result_rx) = unbounded::<Completion>();

        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let mut child = match command.spawn() {
                Ok(child) => child,
                Err(e) => {
                    // Already-started dispatchers exit once the queue closes.
                    drop(task_tx);
                    join_all(handles);
                    return Err(Error::Worker {
                        worker: worker_id,
                        message: format!("failed to start {}: {}", command.program.display(), e),
                    });
                }
            };
            let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
                (Some(stdin), Some(stdout)) => (stdin, stdout),
                _ => {
                    let _ = child.kill();
                    let _ = child.wait();
                    drop(task_tx);
                    join_all(handles);
                    return Err(Error::Worker {
                        worker: worker_id,
                        message: "worker stdio is not piped".to_string(),
                    });
                }
            };
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("parmap-dispatch-{}", worker_id))
                .spawn(move || dispatch(worker_id, child, stdin, stdout, task_rx, result_tx))?;
            handles.push(handle);
        }
        tracing::debug!(
            workers = worker_count,
            program = %command.program.display(),
            "process pool started"
        );

        Ok(Self {
            task_tx: Some(task_tx),
            result_rx,
            handles,
            worker_count,
            in_flight: 0,
        })
    }
}

/// Dispatcher loop for one worker process.
fn dispatch(
    worker_id: usize,
    mut child: Child,
    mut stdin: ChildStdin,
    stdout: ChildStdout,
    task_rx: Receiver<(usize, Call)>,
    result_tx: Sender<Completion>,
) {
    let mut stdout = BufReader::new(stdout);

    for (index, call) in task_rx.iter() {
        match exchange(&mut stdin, &mut stdout, index, call) {
            Ok(outcome) => {
                let _ = result_tx.send((index, Ok(outcome)));
            }
            Err(message) => {
                tracing::warn!(worker = worker_id, task = index, "{}", message);
                let _ = result_tx.send((
                    index,
                    Err(Error::Worker {
                        worker: worker_id,
                        message,
                    }),
                ));
                break;
            }
        }
    }

    // Closing stdin ends the worker's serve loop.
    drop(stdin);
    match child.wait() {
        Ok(status) if status.success() => {
            tracing::debug!(worker = worker_id, "worker exited");
        }
        Ok(status) => {
            tracing::warn!(worker = worker_id, %status, "worker exited abnormally");
        }
        Err(e) => {
            tracing::warn!(worker = worker_id, error = %e, "failed to reap worker");
        }
    }
}

fn exchange(
    stdin: &mut ChildStdin,
    stdout: &mut BufReader<ChildStdout>,
    index: usize,
    call: Call,
) -> std::result::Result<Outcome, String> {
    let request = Request {
        id: index,
        func: call.func.to_string(),
        args: call.args,
    };
    write_line(stdin, &request).map_err(|e| format!("failed to send task {}: {}", index, e))?;
    let response: Response = read_line(stdout)
        .map_err(|e| format!("bad reply to task {}: {}", index, e))?
        .ok_or_else(|| format!("worker exited while running task {}", index))?;
    if response.id != index {
        return Err(format!(
            "reply for task {} while waiting on task {}",
            response.id, index
        ));
    }
    Ok(response.into_outcome())
}

fn refuse_nested(in_worker: bool) -> Result<()> {
    if in_worker {
        return Err(Error::Config(format!(
            "process pool started inside a worker ({} is set)",
            WORKER_ENV
        )));
    }
    Ok(())
}

fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if handle.join().is_err() {
            tracing::warn!("dispatcher thread panicked");
        }
    }
}

impl WorkerPool for ProcessPool {
    type Job = Call;
    type Output = Outcome;

    fn workers(&self) -> usize {
        self.worker_count
    }

    fn submit(&mut self, index: usize, job: Call) -> Result<()> {
        let task_tx = self.task_tx.as_ref().ok_or(Error::PoolClosed)?;
        task_tx.send((index, job)).map_err(|_| Error::PoolClosed)?;
        self.in_flight += 1;
        Ok(())
    }

    fn wait_any(&mut self) -> Result<Option<(usize, Outcome)>> {
        if self.in_flight == 0 {
            return Ok(None);
        }
        // Disconnected means every dispatcher has exited.
        let (index, outcome) = self.result_rx.recv().map_err(|_| Error::PoolClosed)?;
        self.in_flight -= 1;
        outcome.map(|o| Some((index, o)))
    }

    fn in_flight(&self) -> usize {
        self.in_flight
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(task_tx) = self.task_tx.take() else {
            return Ok(());
        };
        drop(task_tx);
        while self.in_flight > 0 {
            if self.result_rx.recv().is_err() {
                break;
            }
            self.in_flight -= 1;
        }
        self.in_flight = 0;
        join_all(std::mem::take(&mut self.handles));
        tracing::debug!(workers = self.worker_count, "process pool shut down");
        Ok(())
    }
}

impl Drop for ProcessPool {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(error = %e, "process pool shutdown failed");
        }
    }
}
