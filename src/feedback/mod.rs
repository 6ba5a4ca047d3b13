//! Structured Feedback Module
//!
//! Turns compiler errors into caller-facing diagnostics:
//! - `Diagnostic` values with a stable code, kind and position
//! - Fix hints for the common findings
//! - A JSON report for tooling

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::{Error, ErrorKind, Position, Span};

// ==================== Diagnostic ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single error or warning, as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: ErrorKind,
    /// Error code (e.g., "E0003")
    pub code: String,
    pub message: String,
    pub position: Position,
    /// Suggested fix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic from a compiler error
    pub fn from_error(error: &Error) -> Self {
        Self::with_severity(error, Severity::Error)
    }

    /// Create a warning diagnostic from a non-fatal finding
    pub fn warning(error: &Error) -> Self {
        Self::with_severity(error, Severity::Warning)
    }

    fn with_severity(error: &Error, severity: Severity) -> Self {
        let kind = error.kind();
        Self {
            severity,
            kind,
            code: kind.code().to_string(),
            message: error.to_string(),
            position: error.span().unwrap_or_else(Span::dummy).position(),
            hint: hint_for(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn line(&self) -> usize {
        self.position.line
    }

    pub fn column(&self) -> usize {
        self.position.column
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.kind, self.position, self.message)
    }
}

impl std::error::Error for Diagnostic {}

impl From<Error> for Diagnostic {
    fn from(error: Error) -> Self {
        Diagnostic::from_error(&error)
    }
}

/// Fix hints for findings with an obvious remedy
fn hint_for(error: &Error) -> Option<String> {
    let hint = match error {
        Error::UnterminatedString { .. } => "close the string with a matching quote".to_string(),
        Error::UnterminatedComment { .. } => "close the comment with `*/`".to_string(),
        Error::UnterminatedRegex { .. } => {
            "close the pattern with `/`, or escape a `/` inside it as `\\/`".to_string()
        }
        Error::MissingConstInitializer { name, .. } => {
            format!("give `{}` a value, or declare it with `let`", name)
        }
        Error::MissingHandler { .. } => "add a `catch` or `finally` clause".to_string(),
        Error::UndefinedVariable { name, .. } => {
            format!("declare `{}` with `let` or `const` before using it", name)
        }
        Error::DuplicateDefinition { name, .. } => {
            format!("rename one of the declarations of `{}`", name)
        }
        Error::AssignToConstant { name, .. } => {
            format!("declare `{}` with `let` if it needs to change", name)
        }
        Error::UndefinedLabel { name, .. } => {
            format!("label an enclosing statement with `{}:`", name)
        }
        Error::UseBeforeDeclaration { name, .. } => {
            format!("move the declaration of `{}` above this use", name)
        }
        Error::UnusedBinding { name, .. } => {
            format!("remove `{}`, or prefix it with `_`", name)
        }
        Error::DiscouragedVar { .. } => "use `let` or `const`".to_string(),
        Error::MissingSemicolon { .. } => "add a `;`".to_string(),
        Error::NestingTooDeep { .. } => "split the construct into smaller functions".to_string(),
        _ => return None,
    };
    Some(hint)
}

// ==================== Compilation Report ====================

/// Machine-readable summary of one compilation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub success: bool,
    /// Errors and warnings, in source order
    pub diagnostics: Vec<Diagnostic>,
    pub stats: CompilationStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompilationStats {
    /// Lines of source text
    pub source_lines: usize,
    /// Size of the emitted artifact
    pub output_bytes: usize,
}

impl Report {
    pub fn success(warnings: Vec<Diagnostic>, stats: CompilationStats) -> Self {
        Self {
            success: true,
            diagnostics: warnings,
            stats,
        }
    }

    pub fn failure(error: Diagnostic, stats: CompilationStats) -> Self {
        Self {
            success: false,
            diagnostics: vec![error],
            stats,
        }
    }

    /// Output as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_from_error() {
        let error = Error::UndefinedVariable {
            name: "y".into(),
            span: Span::new(8, 9, 1, 9),
        };
        let diag = Diagnostic::from_error(&error);
        assert!(diag.is_error());
        assert_eq!(diag.kind, ErrorKind::NameResolutionError);
        assert_eq!(diag.code, "E0003");
        assert_eq!((diag.line(), diag.column()), (1, 9));
        assert_eq!(diag.position.offset, 8);
        assert_eq!(diag.to_string(), "NameResolutionError at 1:9: Undefined variable: y");
        assert!(diag.hint.unwrap().contains("`y`"));
    }

    #[test]
    fn test_label_hint() {
        let error = Error::UndefinedLabel {
            name: "outer".into(),
            span: Span::new(6, 11, 1, 7),
        };
        let diag = Diagnostic::from_error(&error);
        assert_eq!(diag.kind, ErrorKind::SyntaxError);
        assert_eq!(diag.hint.as_deref(), Some("label an enclosing statement with `outer:`"));
    }

    #[test]
    fn test_internal_error_has_default_position() {
        let diag = Diagnostic::from_error(&Error::Internal("bad span".into()));
        assert_eq!(diag.kind, ErrorKind::InternalInvariantViolation);
        assert_eq!(diag.position.offset, 0);
        assert_eq!(diag.hint, None);
    }

    #[test]
    fn test_report_json() {
        let warning = Diagnostic::warning(&Error::DiscouragedVar { span: Span::new(0, 3, 1, 1) });
        let report = Report::success(
            vec![warning],
            CompilationStats { source_lines: 1, output_bytes: 10 },
        );
        let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["diagnostics"][0]["severity"], "warning");
        assert_eq!(json["diagnostics"][0]["kind"], "StrictModeViolation");
        assert_eq!(json["diagnostics"][0]["position"]["line"], 1);
        assert_eq!(json["stats"]["output_bytes"], 10);
    }
}
