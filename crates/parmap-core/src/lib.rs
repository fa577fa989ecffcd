//! Core library for parmap: apply a function to every item of a collection on
//! a pool of workers, either collecting results in input order or streaming
//! them as they complete.
//!
//! Closures and function items run on worker threads through
//! [`run_parallel_list`] and [`run_parallel_stream`]. Functions that must also
//! run in worker processes are registered by name in a [`Registry`] and run
//! through a [`Runner`].
//!
//! ```
//! use parmap_core::{run_parallel_list, Registry, RunOptions, Runner};
//!
//! let opts = RunOptions::new().workers(4);
//! let out = run_parallel_list(|a: i32, b: i32| a * b, vec![(2, 3), (4, 5)], &opts).unwrap();
//! assert_eq!(out, vec![6, 20]);
//!
//! let mut registry = Registry::new();
//! registry.register("square", |x: i64| x * x);
//! let runner = Runner::new(registry);
//! let out: Vec<i64> = runner.run_parallel_list("square", vec![1, 2, 3], &opts).unwrap();
//! assert_eq!(out, vec![1, 4, 9]);
//! ```

pub mod args;
pub mod backend;
pub mod config;
pub mod error;
mod exec;
mod map;
pub mod pool;
pub mod progress;
pub mod registry;
mod runner;
mod stream;
pub mod wire;
pub mod worker;

pub use args::{unpack, IntoArgs, TaskFn};
pub use backend::{default_workers, Backend};
pub use config::{load_config, parse_config, FileConfig, RunOptions};
pub use error::{Error, Result};
pub use map::{
    run_parallel_list, run_parallel_stream, try_run_parallel_list, try_run_parallel_stream,
    TypedStream,
};
pub use pool::{Call, Job, ProcessPool, RegistryPool, ThreadPool, WorkerCommand, WorkerPool};
pub use progress::Progress;
pub use registry::Registry;
pub use runner::{Runner, RunnerStream};
pub use stream::ParallelStream;
