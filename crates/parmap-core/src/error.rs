use thiserror::Error;

use crate::Backend;

#[derive(Error, Debug)]
pub enum Error {
    /// The user function failed: returned `Err`, panicked, or rejected its arguments.
    #[error("Task {index} failed: {message}")]
    Task { index: usize, message: String },

    #[error("Worker {worker} failed: {message}")]
    Worker { worker: usize, message: String },

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Backend `{0}` cannot run closures; register the function and use a Runner")]
    UnsupportedBackend(Backend),

    #[error("Invalid backend: {0} (expected `thread` or `process`)")]
    InvalidBackend(String),

    #[error("Worker pool is closed")]
    PoolClosed,

    #[error("No result recorded for task {0}")]
    MissingResult(usize),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serde JSON error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
