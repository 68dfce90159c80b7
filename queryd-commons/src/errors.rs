//! Error formatting and reporting traits.
//!
//! The query router never surfaces a raw [`anyhow::Error`] to the end user
//! (see spec §7): every user-visible error is a single sentence. These
//! traits let the core pipeline produce that text without depending on a
//! concrete presentation layer.

use std::borrow::Cow;

use anyhow::{Error, Result};

/// Render an error into a single user-facing sentence.
pub trait ErrorFormatter: Send + Sync {
    fn format_error(&self, error: &Error) -> Cow<'_, str>;
}

/// Reports non-fatal errors to an observability backend.
pub trait ErrorReporter: Send + Sync {
    fn capture(&self, error: &Error) -> Result<()>;

    fn capture_message(&self, message: impl Into<Cow<'static, str>>) -> Result<()> {
        let message: Cow<'static, str> = message.into();
        self.capture(&Error::msg(message))
    }
}

/// Drops every event. Used by default and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopErrorReporter;

impl ErrorReporter for NoopErrorReporter {
    fn capture(&self, _error: &Error) -> Result<()> {
        Ok(())
    }
}

/// Prefixes the error's display output with a warning emoji, matching the
/// "single sentence prefixed with an emoji" rule from spec §7.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisplayErrorFormatter;

impl ErrorFormatter for DisplayErrorFormatter {
    fn format_error(&self, error: &Error) -> Cow<'_, str> {
        Cow::Owned(format!("⚠️ {error}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatter_prefixes_emoji() {
        let formatter = DisplayErrorFormatter;
        let error = Error::msg("boom");
        assert_eq!(formatter.format_error(&error), "⚠️ boom");
    }

    #[test]
    fn noop_reporter_drops_errors() {
        let reporter = NoopErrorReporter;
        assert!(reporter.capture(&Error::msg("x")).is_ok());
        assert!(reporter.capture_message("y").is_ok());
    }
}
