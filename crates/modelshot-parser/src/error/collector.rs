//! Collector for accumulating diagnostics during validation.

use crate::error::{Diagnostic, ParseError};

/// Accumulates diagnostics so a payload reports all of its problems at once
/// instead of stopping at the first.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
    has_errors: bool,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a diagnostic to this collector.
    pub fn emit(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity().is_error() {
            self.has_errors = true;
        }
        self.diagnostics.push(diagnostic);
    }

    /// Returns `Err` with every diagnostic if any error was emitted.
    ///
    /// Warnings alone are logged and discarded.
    pub fn finish(self) -> Result<(), ParseError> {
        if self.has_errors {
            return Err(ParseError::new(self.diagnostics));
        }
        for warning in &self.diagnostics {
            log::warn!(warning:% = warning; "Payload accepted with warning");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_collector_new_finish_ok() {
        assert!(DiagnosticCollector::new().finish().is_ok());
    }

    #[test]
    fn test_collector_warning_only_is_ok() {
        let mut collector = DiagnosticCollector::new();
        collector.emit(Diagnostic::warning("suspicious"));
        assert!(collector.finish().is_ok());
    }

    #[test]
    fn test_collector_keeps_all_diagnostics() {
        let mut collector = DiagnosticCollector::new();
        collector.emit(Diagnostic::error("a").with_code(ErrorCode::E201));
        collector.emit(Diagnostic::warning("b"));
        collector.emit(Diagnostic::error("c").with_code(ErrorCode::E203));

        let err = collector.finish().unwrap_err();
        assert_eq!(err.diagnostics().len(), 3);
        assert_eq!(
            err.codes().collect::<Vec<_>>(),
            vec![ErrorCode::E201, ErrorCode::E203]
        );
    }
}
