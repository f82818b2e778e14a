//! Crate root: wires together the compilation pipeline.
//!
//! The stages run strictly one after another:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` resolves names, derives types and desugars pointer arithmetic
//!   while building the `ast::Program`.
//! - `codegen` lowers the finished program into x86-64 AT&T assembly.
//! - `diagnostics` collects every issue in the order it was found; the driver
//!   checks it after lexing and after parsing.

pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod error;
pub mod parser;
pub mod tokenizer;
pub mod ty;

use log::debug;

pub use diagnostics::{Diagnostic, Diagnostics, IssueKind};
pub use error::{CompileError, CompileResult};

/// Outcome of one run over a translation unit.
#[derive(Debug)]
pub struct Compilation {
  /// Present only when no fatal diagnostic was recorded.
  pub assembly: Option<String>,
  pub diagnostics: Diagnostics,
}

impl Compilation {
  pub fn succeeded(&self) -> bool {
    self.assembly.is_some()
  }

  /// Process exit status for this outcome.
  pub fn exit_code(&self) -> i32 {
    if self.succeeded() { 0 } else { 1 }
  }
}

/// Compile a source string, collecting diagnostics instead of stopping at
/// the first one.
pub fn compile(source: &str) -> Compilation {
  let mut diagnostics = Diagnostics::new();

  let tokens = tokenizer::tokenize(source, &mut diagnostics);
  debug!("tokenized {} token(s)", tokens.len());
  if diagnostics.has_errors() {
    return Compilation {
      assembly: None,
      diagnostics,
    };
  }

  let program = parser::parse(tokens, &mut diagnostics);
  if diagnostics.has_errors() {
    debug!("parsing failed with {} error(s)", diagnostics.error_count());
    return Compilation {
      assembly: None,
      diagnostics,
    };
  }

  Compilation {
    assembly: Some(codegen::generate(&program)),
    diagnostics,
  }
}

/// Compile a source string into AT&T assembly, discarding warnings.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  let compilation = compile(source);
  match compilation.assembly {
    Some(asm) => Ok(asm),
    None => Err(CompileError::aborted(compilation.diagnostics.error_count())),
  }
}
