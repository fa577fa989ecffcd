//! Backend selection: shared-memory threads or isolated worker processes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Which kind of worker runs the tasks.
///
/// Defaults to [`Backend::Thread`], so closures run without any setup.
/// [`Backend::Process`] needs named functions in a
/// [`Registry`](crate::Registry) served by the worker program.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Thread,
    Process,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Thread => "thread",
            Backend::Process => "process",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thread" | "threads" => Ok(Backend::Thread),
            "process" | "processes" => Ok(Backend::Process),
            _ => Err(Error::InvalidBackend(s.to_string())),
        }
    }
}

/// Hardware concurrency, recomputed on every call. Never below 1.
pub fn default_workers() -> usize {
    num_cpus::get().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_names() {
        assert_eq!("thread".parse::<Backend>().unwrap(), Backend::Thread);
        assert_eq!(" Process ".parse::<Backend>().unwrap(), Backend::Process);
        assert_eq!("processes".parse::<Backend>().unwrap(), Backend::Process);
        assert!(matches!(
            "fiber".parse::<Backend>(),
            Err(Error::InvalidBackend(s)) if s == "fiber"
        ));
    }

    #[test]
    fn backend_serde_is_lowercase() {
        let json = serde_json::to_string(&Backend::Process).unwrap();
        assert_eq!(json, "\"process\"");
        let back: Backend = serde_json::from_str("\"thread\"").unwrap();
        assert_eq!(back, Backend::Thread);
    }

    #[test]
    fn default_workers_is_positive() {
        assert!(default_workers() >= 1);
    }
}
