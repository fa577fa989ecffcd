//! Worker side of the process backend.
//!
//! A binary that wants to act as its own worker checks [`is_worker`] first
//! thing in `main` and hands its registry to [`serve_stdio`]:
//!
//! ```no_run
//! let mut registry = parmap_core::Registry::new();
//! registry.register("square", |x: i64| x * x);
//! if parmap_core::worker::is_worker() {
//!     parmap_core::worker::serve_stdio(&registry).expect("worker failed");
//!     return;
//! }
//! ```
//!
//! Stdout carries the protocol, so registered functions must not print to it.

use std::io::{self, BufRead, Write};
use std::panic::{self, AssertUnwindSafe};

use crate::error::{panic_message, Result};
use crate::registry::Registry;
use crate::wire::{read_line, write_line, Request, Response};

/// Set in the environment of every spawned worker process.
pub const WORKER_ENV: &str = "PARMAP_WORKER";

/// True when this process was launched by a [`ProcessPool`](crate::ProcessPool).
pub fn is_worker() -> bool {
    std::env::var(WORKER_ENV)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Answer requests until the input closes. Returns the number of requests served.
pub fn serve<R: BufRead, W: Write>(registry: &Registry, mut input: R, mut output: W) -> Result<usize> {
    let mut served = 0;
    while let Some(request) = read_line::<_, Request>(&mut input)? {
        let Request { id, func, args } = request;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| registry.call(&func, args)))
            .unwrap_or_else(|payload| Err(panic_message(payload.as_ref())));
        write_line(&mut output, &Response::from_outcome(id, outcome))?;
        served += 1;
    }
    tracing::debug!(served, "worker input closed");
    Ok(served)
}

/// [`serve`] bound to this process's stdin and stdout.
pub fn serve_stdio(registry: &Registry) -> Result<usize> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(registry, stdin.lock(), stdout.lock())
}
