//! Progress reporting towards the caller.
//!
//! The GUI layer supplies a plain-text sink; every human-readable progress
//! line of a run goes through it. Structured state only ever travels via the
//! run outcome, never through log lines.

use std::sync::Arc;

/// Callback accepting one plain text line per call.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Cloneable handle around the caller-supplied sink.
///
/// Lines are mirrored to the `log` crate at debug level so `RUST_LOG`
/// diagnostics capture the same trail.
#[derive(Clone)]
pub struct Logger {
    sink: LogSink,
}

impl Logger {
    pub fn new(sink: LogSink) -> Self {
        Self { sink }
    }

    /// Default sink printing to stdout, for CLI use.
    pub fn stdout() -> Self {
        Self::new(Arc::new(|line| println!("{line}")))
    }

    pub fn line(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        log::debug!("{message}");
        (self.sink)(message);
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn lines_reach_the_sink_in_order() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink_capture = captured.clone();
        let logger = Logger::new(Arc::new(move |line| {
            sink_capture.lock().unwrap().push(line.to_string());
        }));

        logger.line("first");
        logger.line(String::from("second"));

        let lines = captured.lock().unwrap();
        assert_eq!(*lines, vec!["first", "second"]);
    }
}
