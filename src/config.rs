//! Compilation options

use serde::{Deserialize, Serialize};

/// Default limit on statement and expression nesting
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Stack reserved for each level of nesting. Parsing, analysis, emission
/// and dropping the tree each recurse once per level, and unoptimized
/// builds use far larger frames than release builds.
const STACK_PER_LEVEL: usize = 128 * 1024;
const BASE_STACK: usize = 2 * 1024 * 1024;
/// Upper bound on the reservation, also used when nesting is unlimited
const MAX_STACK: usize = 1024 * 1024 * 1024;

/// Validation rule set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Validation {
    /// Strict-mode findings are reported as warnings
    #[default]
    Standard,
    /// Strict-mode findings are hard errors
    Strict,
}

/// Output formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitMode {
    #[default]
    Compact,
    Pretty,
}

/// Options recognized by the compiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    pub validation: Validation,
    pub emit: EmitMode,
    /// Deepest allowed nesting; `None` disables the check
    pub max_depth: Option<usize>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            validation: Validation::Standard,
            emit: EmitMode::Compact,
            max_depth: Some(DEFAULT_MAX_DEPTH),
        }
    }
}

impl CompileOptions {
    /// Build options from the two boolean mode flags
    pub fn from_flags(strict: bool, pretty: bool) -> Self {
        Self {
            validation: if strict { Validation::Strict } else { Validation::Standard },
            emit: if pretty { EmitMode::Pretty } else { EmitMode::Compact },
            ..Self::default()
        }
    }

    pub fn is_strict(&self) -> bool {
        self.validation == Validation::Strict
    }

    pub fn is_pretty(&self) -> bool {
        self.emit == EmitMode::Pretty
    }

    /// Stack size for the thread that runs a compilation, enough for
    /// `max_depth` levels of nesting
    pub fn stack_size(&self) -> usize {
        match self.max_depth {
            Some(depth) => depth
                .saturating_mul(STACK_PER_LEVEL)
                .saturating_add(BASE_STACK)
                .min(MAX_STACK),
            None => MAX_STACK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        let options = CompileOptions::from_flags(true, false);
        assert!(options.is_strict());
        assert!(!options.is_pretty());
        assert_eq!(options.max_depth, Some(DEFAULT_MAX_DEPTH));
        assert_eq!(CompileOptions::from_flags(false, false), CompileOptions::default());
    }

    #[test]
    fn test_stack_size_follows_depth() {
        let default = CompileOptions::default().stack_size();
        assert_eq!(default, 34 * 1024 * 1024);

        let shallow = CompileOptions {
            max_depth: Some(8),
            ..CompileOptions::default()
        };
        assert!(shallow.stack_size() < default);

        let huge = CompileOptions {
            max_depth: Some(usize::MAX),
            ..CompileOptions::default()
        };
        assert_eq!(huge.stack_size(), MAX_STACK);

        let unlimited = CompileOptions {
            max_depth: None,
            ..CompileOptions::default()
        };
        assert_eq!(unlimited.stack_size(), MAX_STACK);
    }

    #[test]
    fn test_serde_defaults() {
        let options: CompileOptions = serde_json::from_str(r#"{"emit": "pretty"}"#).unwrap();
        assert_eq!(options.emit, EmitMode::Pretty);
        assert_eq!(options.validation, Validation::Standard);
        assert_eq!(options.max_depth, Some(DEFAULT_MAX_DEPTH));

        let json = serde_json::to_string(&CompileOptions::from_flags(true, true)).unwrap();
        assert!(json.contains(r#""validation":"strict""#));
    }
}
