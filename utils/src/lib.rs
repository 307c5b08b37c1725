use core::fmt::Display;
use std::io::BufWriter;
use std::io::Cursor;
use std::io::Write;

mod source;

pub use source::{LineIndex, Location};

#[cfg(test)]
mod emitter_tests;

/// Where the text written to a [`DiagnosticEmitter`] channel ends up. Tests
/// capture it in memory, tools stream it to stdout/stderr.
enum Sink {
    Capture(Cursor<Vec<u8>>),
    Stream(BufWriter<Box<dyn Write>>),
}

impl Sink {
    fn write_str(&mut self, msg: &str) {
        // Diagnostics are best effort, a closed pipe must not abort the tool.
        let _ = match self {
            Sink::Capture(inner) => inner.write_all(msg.as_bytes()),
            Sink::Stream(inner) => inner.write_all(msg.as_bytes()),
        };
    }

    fn flush(&mut self) {
        if let Sink::Stream(inner) = self {
            let _ = inner.flush();
        }
    }

    fn captured(&self) -> Option<String> {
        match self {
            Sink::Capture(inner) => Some(String::from_utf8_lossy(inner.get_ref()).into_owned()),
            Sink::Stream(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Severity::Warning => write!(f, "Warning"),
            Severity::Error => write!(f, "Error"),
        }
    }
}

/// Two output channels: results go to `out`, diagnostics to `err`. Every
/// diagnostic is prefixed with the line it refers to.
pub struct DiagnosticEmitter {
    out: Sink,
    err: Sink,
    errors: usize,
    warnings: usize,
}

impl DiagnosticEmitter {
    pub fn new(out: Box<dyn Write>, err: Box<dyn Write>) -> Self {
        Self {
            out: Sink::Stream(BufWriter::new(out)),
            err: Sink::Stream(BufWriter::new(err)),
            errors: 0,
            warnings: 0,
        }
    }

    pub fn log_to_buffer() -> Self {
        Self {
            out: Sink::Capture(Cursor::new(Vec::new())),
            err: Sink::Capture(Cursor::new(Vec::new())),
            errors: 0,
            warnings: 0,
        }
    }

    pub fn out(&mut self, msg: &str) {
        self.out.write_str(msg);
    }

    pub fn out_ln(&mut self, msg: &str) {
        self.out(msg);
        self.out("\n");
    }

    pub fn err(&mut self, msg: &str) {
        self.err.write_str(msg);
    }

    pub fn err_ln(&mut self, msg: &str) {
        self.err(msg);
        self.err("\n");
    }

    pub fn out_buffer(&self) -> Option<String> {
        self.out.captured()
    }

    pub fn err_buffer(&self) -> Option<String> {
        self.err.captured()
    }

    pub fn error(&mut self, line: u32, message: &str) {
        self.report(line, "", message);
    }

    /// Reports an error about `item` found on `line`.
    pub fn report(&mut self, line: u32, item: &str, message: &str) {
        self.report_with(Severity::Error, line, item, message);
    }

    pub fn warn(&mut self, line: u32, item: &str, message: &str) {
        self.report_with(Severity::Warning, line, item, message);
    }

    pub fn report_with(&mut self, severity: Severity, line: u32, item: &str, message: &str) {
        match severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
        }
        let item = if item.is_empty() {
            String::new()
        } else {
            format!(" {item}")
        };
        self.err
            .write_str(&format!("[line {line}] {severity}{item}: {message}\n"));
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn flush(&mut self) {
        self.out.flush();
        self.err.flush();
    }
}

impl Drop for DiagnosticEmitter {
    fn drop(&mut self) {
        self.flush();
    }
}
