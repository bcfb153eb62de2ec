//! Error and failure formatting with actionable suggestions.

use super::colors::ColorSupport;
use pommel_core::{PommelError, ResolutionFailure};
use std::error::Error;

/// Error formatter with suggestions
pub struct ErrorFormatter {
    colors: ColorSupport,
}

impl ErrorFormatter {
    pub fn new() -> Self {
        Self {
            colors: ColorSupport::detect(),
        }
    }

    #[cfg(test)]
    pub fn plain() -> Self {
        Self {
            colors: ColorSupport::disabled(),
        }
    }

    /// Format a fatal error with its suggestion and source chain
    pub fn format_error(&self, error: &PommelError) -> String {
        let mut output = self.format_simple(&error.to_string());

        if let Some(suggestion) = error.suggestion() {
            output.push_str("\n\n");
            output.push_str(&self.colors.dim("help"));
            output.push_str(": ");
            output.push_str(suggestion);
        }

        let mut source = error.source();
        while let Some(err) = source {
            output.push('\n');
            output.push_str(&self.colors.dim("caused by"));
            output.push_str(": ");
            output.push_str(&err.to_string());
            source = err.source();
        }

        output
    }

    pub fn format_simple(&self, message: &str) -> String {
        format!("{}: {}", self.colors.red("error"), message)
    }

    pub fn format_warning(&self, message: &str) -> String {
        format!("{}: {}", self.colors.yellow("warning"), message)
    }

    /// A recorded resolution failure, one line per repository attempt
    pub fn format_failure(&self, failure: &ResolutionFailure) -> String {
        let mut output = self.format_warning(&format!("{}: {}", failure.subject(), failure.kind));
        if let Some(context) = &failure.context {
            output.push_str(&self.colors.dim(&format!(" (in {})", context)));
        }
        for attempt in &failure.attempts {
            output.push_str(&format!(
                "\n  {} {} {}: {}",
                self.colors.dim("-->"),
                attempt.repository_id,
                attempt.uri,
                attempt.outcome
            ));
        }
        output
    }
}

impl Default for ErrorFormatter {
    fn default() -> Self {
        Self::new()
    }
}
