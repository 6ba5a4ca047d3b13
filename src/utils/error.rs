//! Error handling for cylang

use crate::utils::Span;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Fixed diagnostic taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    LexicalError,
    SyntaxError,
    NameResolutionError,
    TypeError,
    StrictModeViolation,
    InternalInvariantViolation,
}

impl ErrorKind {
    /// Stable error code used in reports
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::LexicalError => "E0001",
            ErrorKind::SyntaxError => "E0002",
            ErrorKind::NameResolutionError => "E0003",
            ErrorKind::TypeError => "E0004",
            ErrorKind::StrictModeViolation => "E0005",
            ErrorKind::InternalInvariantViolation => "E9999",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::LexicalError => "LexicalError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::NameResolutionError => "NameResolutionError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::StrictModeViolation => "StrictModeViolation",
            ErrorKind::InternalInvariantViolation => "InternalInvariantViolation",
        };
        f.write_str(name)
    }
}

/// Compiler error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ==================== Lexer Errors ====================

    #[error("Unexpected character {ch:?}")]
    UnexpectedChar { ch: char, span: Span },

    #[error("Unterminated string literal")]
    UnterminatedString { span: Span },

    #[error("Unterminated block comment")]
    UnterminatedComment { span: Span },

    #[error("Malformed number literal: {reason}")]
    InvalidNumber { reason: String, span: Span },

    #[error("Invalid escape sequence in string literal")]
    InvalidEscape { span: Span },

    #[error("Unterminated regular expression literal")]
    UnterminatedRegex { span: Span },

    #[error("Invalid regular expression flags: {flags}")]
    InvalidRegexFlags { flags: String, span: Span },

    // ==================== Parser Errors ====================

    #[error("Expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("Invalid assignment target")]
    InvalidAssignmentTarget { span: Span },

    #[error("Missing initializer in const declaration of {name}")]
    MissingConstInitializer { name: String, span: Span },

    #[error("Missing catch or finally after try")]
    MissingHandler { span: Span },

    #[error("More than one default clause in switch statement")]
    DuplicateDefault { span: Span },

    #[error("Nesting too deep (limit is {limit})")]
    NestingTooDeep { limit: usize, span: Span },

    #[error("Invalid arrow function parameter list")]
    InvalidArrowParameters { span: Span },

    #[error("Illegal {keyword} statement: {reason}")]
    IllegalStatement {
        keyword: &'static str,
        reason: &'static str,
        span: Span,
    },

    // ==================== Semantic Errors ====================

    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String, span: Span },

    #[error("Duplicate definition: {name}")]
    DuplicateDefinition { name: String, span: Span },

    #[error("Assignment to constant binding: {name}")]
    AssignToConstant { name: String, span: Span },

    #[error("Undefined label: {name}")]
    UndefinedLabel { name: String, span: Span },

    #[error("Label {name} is already declared")]
    DuplicateLabel { name: String, span: Span },

    // ==================== Strict Mode Findings ====================

    #[error("Use of {name} before its declaration")]
    UseBeforeDeclaration { name: String, span: Span },

    #[error("Implicit coercion between {left} and {right} in `{op}`")]
    ImplicitCoercion {
        op: &'static str,
        left: String,
        right: String,
        span: Span,
    },

    #[error("Unused binding: {name}")]
    UnusedBinding { name: String, span: Span },

    #[error("`var` declarations are discouraged; use let or const")]
    DiscouragedVar { span: Span },

    #[error("Missing semicolon (automatically inserted)")]
    MissingSemicolon { span: Span },

    // ==================== Defects ====================

    #[error("Internal compiler error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the span associated with this error
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::UnexpectedChar { span, .. } => Some(*span),
            Self::UnterminatedString { span } => Some(*span),
            Self::UnterminatedComment { span } => Some(*span),
            Self::InvalidNumber { span, .. } => Some(*span),
            Self::InvalidEscape { span } => Some(*span),
            Self::UnterminatedRegex { span } => Some(*span),
            Self::InvalidRegexFlags { span, .. } => Some(*span),
            Self::UnexpectedToken { span, .. } => Some(*span),
            Self::InvalidAssignmentTarget { span } => Some(*span),
            Self::MissingConstInitializer { span, .. } => Some(*span),
            Self::MissingHandler { span } => Some(*span),
            Self::DuplicateDefault { span } => Some(*span),
            Self::NestingTooDeep { span, .. } => Some(*span),
            Self::InvalidArrowParameters { span } => Some(*span),
            Self::IllegalStatement { span, .. } => Some(*span),
            Self::UndefinedVariable { span, .. } => Some(*span),
            Self::DuplicateDefinition { span, .. } => Some(*span),
            Self::AssignToConstant { span, .. } => Some(*span),
            Self::UndefinedLabel { span, .. } => Some(*span),
            Self::DuplicateLabel { span, .. } => Some(*span),
            Self::UseBeforeDeclaration { span, .. } => Some(*span),
            Self::ImplicitCoercion { span, .. } => Some(*span),
            Self::UnusedBinding { span, .. } => Some(*span),
            Self::DiscouragedVar { span } => Some(*span),
            Self::MissingSemicolon { span } => Some(*span),
            Self::Internal(_) => None,
        }
    }

    /// Classify this error into the diagnostic taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnexpectedChar { .. }
            | Self::UnterminatedString { .. }
            | Self::UnterminatedComment { .. }
            | Self::InvalidNumber { .. }
            | Self::InvalidEscape { .. }
            | Self::UnterminatedRegex { .. }
            | Self::InvalidRegexFlags { .. } => ErrorKind::LexicalError,

            Self::UnexpectedToken { .. }
            | Self::InvalidAssignmentTarget { .. }
            | Self::MissingConstInitializer { .. }
            | Self::MissingHandler { .. }
            | Self::DuplicateDefault { .. }
            | Self::NestingTooDeep { .. }
            | Self::InvalidArrowParameters { .. }
            | Self::IllegalStatement { .. }
            | Self::UndefinedLabel { .. }
            | Self::DuplicateLabel { .. } => ErrorKind::SyntaxError,

            Self::UndefinedVariable { .. } | Self::DuplicateDefinition { .. } => {
                ErrorKind::NameResolutionError
            }

            Self::AssignToConstant { .. } => ErrorKind::TypeError,

            Self::UseBeforeDeclaration { .. }
            | Self::ImplicitCoercion { .. }
            | Self::UnusedBinding { .. }
            | Self::DiscouragedVar { .. }
            | Self::MissingSemicolon { .. } => ErrorKind::StrictModeViolation,

            Self::Internal(_) => ErrorKind::InternalInvariantViolation,
        }
    }

    /// Start offset used to order findings; errors without a span sort last
    pub(crate) fn offset(&self) -> usize {
        self.span().map_or(usize::MAX, |s| s.start)
    }
}
