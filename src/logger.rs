//! Logging contract (spec.md §6 `Logger`).
//!
//! `wayfarer` ships a default implementation over the `log` facade so the
//! crate behaves like any other `log`-instrumented library out of the box;
//! callers who want structured fields routed to something else (a metrics
//! pipeline, a JSON sink) can supply their own [`Logger`] via
//! `ClientOptions::logger`.

use std::fmt;

/// A single structured field attached to a log line.
#[derive(Debug, Clone)]
pub struct Field {
    pub key: &'static str,
    pub value: String,
}

impl Field {
    pub fn new(key: &'static str, value: impl fmt::Display) -> Self {
        Field {
            key,
            value: value.to_string(),
        }
    }
}

/// `debug/info/warn/error(fields, message)` contract from spec.md §6.
pub trait Logger: Send + Sync + 'static {
    fn debug(&self, fields: &[Field], message: &str);
    fn info(&self, fields: &[Field], message: &str);
    fn warn(&self, fields: &[Field], message: &str);
    fn error(&self, fields: &[Field], message: &str);
}

fn render(fields: &[Field], message: &str) -> String {
    if fields.is_empty() {
        return message.to_owned();
    }
    let mut out = String::from(message);
    out.push(' ');
    for (i, f) in fields.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{}={}", f.key, f.value));
    }
    out
}

/// Forwards to the `log` crate's module-level macros at the configured
/// `target`.
pub struct LogFacadeLogger {
    target: &'static str,
}

impl LogFacadeLogger {
    pub fn new(target: &'static str) -> Self {
        LogFacadeLogger { target }
    }
}

impl Default for LogFacadeLogger {
    fn default() -> Self {
        LogFacadeLogger::new("wayfarer")
    }
}

impl Logger for LogFacadeLogger {
    fn debug(&self, fields: &[Field], message: &str) {
        log::debug!(target: self.target, "{}", render(fields, message));
    }

    fn info(&self, fields: &[Field], message: &str) {
        log::info!(target: self.target, "{}", render(fields, message));
    }

    fn warn(&self, fields: &[Field], message: &str) {
        log::warn!(target: self.target, "{}", render(fields, message));
    }

    fn error(&self, fields: &[Field], message: &str) {
        log::error!(target: self.target, "{}", render(fields, message));
    }
}

/// A logger that discards everything; used when `ClientOptions::debug` is
/// `false` and no custom logger is supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn debug(&self, _fields: &[Field], _message: &str) {}
    fn info(&self, _fields: &[Field], _message: &str) {}
    fn warn(&self, _fields: &[Field], _message: &str) {}
    fn error(&self, _fields: &[Field], _message: &str) {}
}
