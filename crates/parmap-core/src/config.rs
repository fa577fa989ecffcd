//! Run options, plus optional defaults from .parmaprc (JSON) and PARMAP_* env.
//! Precedence: explicit builder calls > env > rc file > built-in defaults.

use std::path::Path;

use serde::Deserialize;

use crate::backend::{default_workers, Backend};
use crate::error::{Error, Result};

pub const RC_FILE: &str = ".parmaprc";

pub const LIST_LABEL: &str = "Parallel (list)";
pub const STREAM_LABEL: &str = "Parallel (stream)";

/// Options shared by the batch and streaming runners.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunOptions {
    /// Worker count; `None` means hardware concurrency at call time.
    pub workers: Option<usize>,
    pub backend: Backend,
    pub progress: bool,
    /// Streaming only: how many tasks may be submitted and not yet yielded.
    pub in_flight: Option<usize>,
    /// Progress label; defaults per runner.
    pub label: Option<String>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults from `.parmaprc` in `dir` (or home), then PARMAP_* env.
    pub fn from_env_and_config(dir: &Path) -> Self {
        Self::from_config(&load_config(dir)).with_env()
    }

    pub fn from_config(cfg: &FileConfig) -> Self {
        Self {
            workers: cfg.workers.map(|n| n.max(1)),
            backend: cfg.backend.unwrap_or_default(),
            progress: cfg.progress.unwrap_or(false),
            in_flight: cfg.in_flight.map(|n| n.max(1)),
            label: None,
        }
    }

    /// Apply PARMAP_WORKERS, PARMAP_BACKEND, PARMAP_PROGRESS, PARMAP_IN_FLIGHT.
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Same as [`with_env`](Self::with_env) with a custom variable lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PARMAP_WORKERS") {
            match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.workers = Some(n),
                _ => tracing::warn!(value = %v, "ignoring invalid PARMAP_WORKERS"),
            }
        }
        if let Some(v) = lookup("PARMAP_BACKEND") {
            match v.parse::<Backend>() {
                Ok(b) => self.backend = b,
                Err(e) => tracing::warn!(error = %e, "ignoring PARMAP_BACKEND"),
            }
        }
        if let Some(v) = lookup("PARMAP_PROGRESS") {
            match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.progress = true,
                "0" | "false" | "no" | "off" | "" => self.progress = false,
                _ => tracing::warn!(value = %v, "ignoring invalid PARMAP_PROGRESS"),
            }
        }
        if let Some(v) = lookup("PARMAP_IN_FLIGHT") {
            match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.in_flight = Some(n),
                _ => tracing::warn!(value = %v, "ignoring invalid PARMAP_IN_FLIGHT"),
            }
        }
        self
    }

    /// Set number of workers
    pub fn workers(mut self, count: usize) -> Self {
        self.workers = Some(count.max(1));
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    pub fn in_flight(mut self, limit: usize) -> Self {
        self.in_flight = Some(limit.max(1));
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Explicit worker count, else hardware concurrency; at least 1.
    pub fn resolved_workers(&self) -> usize {
        self.workers.unwrap_or_else(default_workers).max(1)
    }

    /// Streaming window: explicit limit, else twice the worker count.
    pub fn resolved_in_flight(&self) -> usize {
        self.in_flight
            .unwrap_or_else(|| self.resolved_workers().saturating_mul(2))
            .max(1)
    }

    pub(crate) fn label_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.label.as_deref().unwrap_or(default)
    }
}

/// Contents of a `.parmaprc` file. Unknown keys are ignored.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    pub workers: Option<usize>,
    pub backend: Option<Backend>,
    pub progress: Option<bool>,
    pub in_flight: Option<usize>,
}

/// Load `.parmaprc` from `dir`, falling back to the home directory.
/// Missing file = defaults; invalid file = defaults plus a warning.
pub fn load_config(dir: &Path) -> FileConfig {
    let candidates = [Some(dir.join(RC_FILE)), dirs::home_dir().map(|h| h.join(RC_FILE))];
    for path in candidates.iter().flatten() {
        if path.is_file() {
            return read_config(path);
        }
    }
    FileConfig::default()
}

fn read_config(path: &Path) -> FileConfig {
    match parse_config(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "using default config");
            FileConfig::default()
        }
    }
}

/// Strict read of one rc file.
pub fn parse_config(path: &Path) -> Result<FileConfig> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}
