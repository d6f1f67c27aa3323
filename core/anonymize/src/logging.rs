//! Per-engine log sinks over `tracing`.
//!
//! Each engine owns a [`LogSink`]; sessions capture its dispatcher when
//! they are created, so independent engines never interfere with each
//! other's logging and there is no process-wide logger state.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::Dispatch;

use crate::error::Error;

/// Log verbosity, lowest to highest severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Finest-grained diagnostics.
    Trace,
    /// Debugging detail.
    Debug,
    /// Normal operational messages.
    Info,
    /// Recoverable problems.
    Warn,
    /// Failures.
    Error,
    /// Unrecoverable failures; mapped to `tracing`'s error level.
    Fatal,
}

impl LogLevel {
    fn as_tracing(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error | LogLevel::Fatal => tracing::Level::ERROR,
        }
    }
}

enum SinkTarget {
    Stderr,
    File(std::fs::File),
}

/// Cheap clone-per-event writer over the swappable target.
#[derive(Clone)]
struct SharedWriter(Arc<Mutex<SinkTarget>>);

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *guard {
            SinkTarget::Stderr => io::stderr().write(buf),
            SinkTarget::File(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *guard {
            SinkTarget::Stderr => io::stderr().flush(),
            SinkTarget::File(file) => file.flush(),
        }
    }
}

/// A replaceable log destination plus the dispatcher that writes to it.
pub struct LogSink {
    target: Arc<Mutex<SinkTarget>>,
    dispatch: Dispatch,
}

impl LogSink {
    /// A sink writing to standard error at the given level.
    pub fn stderr(level: LogLevel) -> Self {
        let target = Arc::new(Mutex::new(SinkTarget::Stderr));
        let dispatch = build_dispatch(target.clone(), level);
        Self { target, dispatch }
    }

    /// Point the sink at an append-mode log file.
    ///
    /// The destination is redirected to stderr before the previous file
    /// handle is dropped, so no event can land on a closing file. An empty
    /// path selects stderr. If the file cannot be opened the sink stays on
    /// stderr and the call fails with [`Error::LoadLog`]; logging itself
    /// keeps working either way.
    pub fn set_file(&mut self, path: &Path, level: LogLevel) -> Result<(), Error> {
        {
            let mut guard = self.target.lock().unwrap_or_else(|e| e.into_inner());
            let previous = std::mem::replace(&mut *guard, SinkTarget::Stderr);
            drop(guard);
            drop(previous);
        }
        self.dispatch = build_dispatch(self.target.clone(), level);

        if path.as_os_str().is_empty() {
            tracing::dispatcher::with_default(&self.dispatch, || {
                tracing::warn!("log path is empty, logging to stderr");
            });
            return Ok(());
        }

        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                let mut guard = self.target.lock().unwrap_or_else(|e| e.into_inner());
                *guard = SinkTarget::File(file);
                drop(guard);
                tracing::dispatcher::with_default(&self.dispatch, || {
                    tracing::info!(path = %path.display(), "log file initialized");
                });
                Ok(())
            }
            Err(e) => {
                tracing::dispatcher::with_default(&self.dispatch, || {
                    tracing::error!(
                        path = %path.display(),
                        "failed to open log file, logging to stderr: {e}"
                    );
                });
                Err(Error::LoadLog(format!(
                    "{}: {e}",
                    path.display()
                )))
            }
        }
    }

    /// The dispatcher sessions capture at creation time.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }
}

fn build_dispatch(target: Arc<Mutex<SinkTarget>>, level: LogLevel) -> Dispatch {
    let writer = SharedWriter(target);
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level.as_tracing())
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    Dispatch::new(subscriber)
}
