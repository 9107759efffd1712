//! User-facing terminal reporter.
//!
//! Stage progress prints as `Doing the thing...` with a dot appended every
//! half second until the stage completes. Distinct from diagnostic logging,
//! which goes to stderr via `tracing`.

use std::io::Write;
use std::time::Duration;

use colored::{ColoredString, Colorize};
use tokio::task::JoinHandle;

const DOT_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Default)]
pub struct Reporter {
    progress: Option<JoinHandle<()>>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print a line of output.
    pub fn log(&self, msg: &str) {
        println!("{msg}");
    }

    /// Print without a trailing newline.
    pub fn log_inline(&self, msg: &str) {
        print!("{msg}");
        let _ = std::io::stdout().flush();
    }

    /// Start a long-running stage: prints `msg...` and keeps appending dots
    /// until the stage ends.
    pub fn progress_start(&mut self, msg: &str) {
        self.stop_dots();
        self.log_inline(&format!("{msg}..."));
        self.progress = Some(tokio::spawn(async {
            let mut ticker = tokio::time::interval(DOT_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                print!(".");
                let _ = std::io::stdout().flush();
            }
        }));
    }

    /// End the current stage with `Done.`.
    pub fn progress_end(&mut self) {
        self.progress_end_with("Done.");
    }

    /// End the current stage with a custom message.
    pub fn progress_end_with(&mut self, msg: &str) {
        self.stop_dots();
        println!(" {msg}");
    }

    /// Abort an in-flight stage marker, if any, before reporting an error.
    pub fn progress_abort(&mut self) {
        if self.progress.is_some() {
            self.stop_dots();
            println!(" ERROR.");
        }
    }

    fn stop_dots(&mut self) {
        if let Some(handle) = self.progress.take() {
            handle.abort();
        }
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        self.stop_dots();
    }
}

/// Color a remote status label the way operators expect to read it.
pub fn colored_status(status: &str) -> ColoredString {
    match status {
        "ACTIVE" => status.green(),
        "INACTIVE" => status.red(),
        "DRAINING" | "PRIMARY" => status.blue(),
        other => other.normal(),
    }
}
