//! Frontend module - Lexer, Parser, Semantic Analysis

pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod semantic;

pub use ast::Program;
pub use lexer::Lexer;
pub use parser::Parser;
pub use semantic::{Analysis, SemanticAnalyzer};

use crate::utils::Result;

/// Parse source text into a program, limiting nesting to `max_depth`
pub fn parse(source: &str, max_depth: Option<usize>) -> Result<Program> {
    let mut parser = Parser::new(Lexer::new(source))?.with_max_depth(max_depth);
    parser.parse_program()
}
