//! Optional progress display.
//!
//! With the `progress` feature, an indicatif bar is drawn on stderr (and hidden
//! automatically when stderr is not a terminal). Without it, every method is a
//! no-op, so runners can call into [`Progress`] unconditionally.

#[cfg(feature = "progress")]
pub use self::bar::Progress;

#[cfg(not(feature = "progress"))]
pub use self::fallback::Progress;

/// Whether this build can draw progress bars at all.
pub fn available() -> bool {
    cfg!(feature = "progress")
}

#[cfg(feature = "progress")]
mod bar {
    use indicatif::{ProgressBar, ProgressStyle};

    pub struct Progress {
        bar: Option<ProgressBar>,
    }

    impl Progress {
        /// `len` is the task count when known up front.
        pub fn new(enabled: bool, len: Option<u64>, label: &str) -> Self {
            if !enabled {
                return Self::disabled();
            }
            let bar = match len {
                Some(len) => {
                    let bar = ProgressBar::new(len);
                    if let Ok(style) = ProgressStyle::with_template(
                        "{msg} {bar:40.cyan/blue} {pos}/{len} task [{elapsed_precise}<{eta_precise}]",
                    ) {
                        bar.set_style(style);
                    }
                    bar
                }
                None => {
                    let bar = ProgressBar::new_spinner();
                    if let Ok(style) =
                        ProgressStyle::with_template("{spinner:.dim} {msg} {pos} task [{elapsed_precise}]")
                    {
                        bar.set_style(style);
                    }
                    bar
                }
            };
            bar.set_message(label.to_string());
            Self { bar: Some(bar) }
        }

        pub fn disabled() -> Self {
            Self { bar: None }
        }

        pub fn is_enabled(&self) -> bool {
            self.bar.is_some()
        }

        pub fn inc(&self) {
            if let Some(bar) = &self.bar {
                bar.inc(1);
            }
        }

        pub fn finish(&self) {
            if let Some(bar) = &self.bar {
                bar.finish();
            }
        }

        /// Stop drawing, leaving the bar where it stopped.
        pub fn abandon(&self) {
            if let Some(bar) = &self.bar {
                bar.abandon();
            }
        }
    }
}

#[cfg(not(feature = "progress"))]
mod fallback {
    pub struct Progress;

    impl Progress {
        pub fn new(_enabled: bool, _len: Option<u64>, _label: &str) -> Self {
            Progress
        }

        pub fn disabled() -> Self {
            Progress
        }

        pub fn is_enabled(&self) -> bool {
            false
        }

        pub fn inc(&self) {}

        pub fn finish(&self) {}

        pub fn abandon(&self) {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_progress_is_inert() {
        let progress = Progress::new(false, Some(3), "Parallel (list)");
        assert!(!progress.is_enabled());
        progress.inc();
        progress.finish();
    }

    #[test]
    fn enabled_progress_never_fails() {
        let progress = Progress::new(true, None, "Parallel (stream)");
        assert_eq!(progress.is_enabled(), available());
        for _ in 0..5 {
            progress.inc();
        }
        progress.abandon();
        progress.finish();
    }
}
