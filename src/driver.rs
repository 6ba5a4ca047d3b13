//! Compile orchestrator
//!
//! Runs lexing/parsing, semantic analysis and emission in order and
//! converts the first failure of any stage into a single `Diagnostic`.
//!
//! Every stage recurses over the tree, so the pipeline runs on its own
//! thread with a stack sized from the nesting limit. The caller's stack
//! size does not matter.

use std::thread;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::backend;
use crate::config::{CompileOptions, EmitMode, Validation};
use crate::feedback::Diagnostic;
use crate::frontend::{self, ast, SemanticAnalyzer};
use crate::utils::Error;

/// Output of a successful compilation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    /// Emitted source text
    pub code: String,
    pub validation: Validation,
    pub emit: EmitMode,
    /// Strict-mode findings reported as warnings
    pub warnings: Vec<Diagnostic>,
}

/// Compile `source` with the two mode flags
pub fn compile(source: &str, strict: bool, pretty: bool) -> Result<CompiledArtifact, Diagnostic> {
    compile_with(source, &CompileOptions::from_flags(strict, pretty))
}

/// Compile `source` with explicit options
pub fn compile_with(source: &str, options: &CompileOptions) -> Result<CompiledArtifact, Diagnostic> {
    on_compile_thread(options, || run(source, options)).map_err(|err| {
        debug!("compilation failed: {}", err);
        Diagnostic::from_error(&err)
    })
}

/// Lex, parse and analyze without emitting; returns the warnings
pub fn check(source: &str, options: &CompileOptions) -> Result<Vec<Diagnostic>, Diagnostic> {
    on_compile_thread(options, || {
        let program = frontend::parse(source, options.max_depth)?;
        verify_spans(&program)?;
        let analysis = SemanticAnalyzer::new(options.validation).analyze(&program)?;
        Ok(analysis.warnings.iter().map(Diagnostic::warning).collect())
    })
    .map_err(Diagnostic::from)
}

/// Run `f` on a scoped thread whose stack fits the configured nesting
fn on_compile_thread<T: Send>(
    options: &CompileOptions,
    f: impl FnOnce() -> Result<T, Error> + Send,
) -> Result<T, Error> {
    let stack_size = options.stack_size();
    debug!("compiling on a worker thread with {} KiB of stack", stack_size / 1024);

    thread::scope(|scope| {
        let handle = thread::Builder::new()
            .name("cylang-compile".to_string())
            .stack_size(stack_size)
            .spawn_scoped(scope, f)
            .map_err(|err| Error::Internal(format!("failed to start compiler thread: {}", err)))?;
        handle
            .join()
            .unwrap_or_else(|_| Err(Error::Internal("compiler thread panicked".to_string())))
    })
}

fn run(source: &str, options: &CompileOptions) -> Result<CompiledArtifact, Error> {
    debug!(
        "compiling {} chars ({:?}, {:?})",
        source.chars().count(),
        options.validation,
        options.emit
    );

    let program = frontend::parse(source, options.max_depth)?;
    debug!("parsed {} top-level statements", program.body.len());
    verify_spans(&program)?;

    let analysis = SemanticAnalyzer::new(options.validation).analyze(&program)?;
    debug!(
        "analysis passed with {} warnings, {} references",
        analysis.warnings.len(),
        analysis.references.len()
    );

    let code = backend::emit(&program, options.emit);
    debug!("emitted {} bytes", code.len());

    Ok(CompiledArtifact {
        code,
        validation: options.validation,
        emit: options.emit,
        warnings: analysis.warnings.iter().map(Diagnostic::warning).collect(),
    })
}

/// Re-check the node containment invariant in debug builds
fn verify_spans(program: &ast::Program) -> Result<(), Error> {
    if cfg!(debug_assertions) {
        if let Some(span) = ast::find_span_violation(program) {
            return Err(Error::Internal(format!(
                "node at offset {} escapes its parent",
                span.start
            )));
        }
    }
    Ok(())
}
