//! cylang compiler
//!
//! Compiles cylang source text into an artifact: the same program
//! re-emitted either compactly or pretty-printed. The pipeline is
//!
//!   source
//!     -> lexer    (tokens, pulled on demand)
//!     -> parser   (AST)
//!     -> semantic (scopes, name resolution, strict-mode findings)
//!     -> emitter  (compact or pretty text)
//!
//! Each call to [`compile`] is independent; no state is shared between
//! calls.

pub mod backend;
pub mod config;
pub mod driver;
pub mod feedback;
pub mod frontend;
pub mod utils;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use config::{CompileOptions, EmitMode, Validation};
pub use driver::{check, compile, compile_with, CompiledArtifact};
pub use feedback::{Diagnostic, Report, Severity};
pub use utils::{ErrorKind, Position};
