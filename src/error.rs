//! Shared error type used across the compilation pipeline.
//!
//! Parse routines return `CompileResult` and never stop the pass on their
//! own: the caller turns an `Err` into a diagnostic and resynchronises.

use snafu::Snafu;

use crate::diagnostics::{Diagnostic, IssueKind};
use crate::tokenizer::Loc;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
pub enum CompileError {
  /// Missing token, bad expression start, assignment to a non-lvalue.
  #[snafu(display("{loc}: {message}"))]
  Syntax { loc: Loc, message: String },

  /// Undeclared names, redefinitions, invalid pointer use, arity errors.
  #[snafu(display("{loc}: {message}"))]
  Semantic { loc: Loc, message: String },

  #[snafu(display("compilation aborted with {errors} error(s)"))]
  Aborted { errors: usize },
}

impl CompileError {
  pub fn syntax(loc: Loc, message: impl Into<String>) -> Self {
    SyntaxSnafu {
      loc,
      message: message.into(),
    }
    .build()
  }

  pub fn semantic(loc: Loc, message: impl Into<String>) -> Self {
    SemanticSnafu {
      loc,
      message: message.into(),
    }
    .build()
  }

  pub fn aborted(errors: usize) -> Self {
    AbortedSnafu { errors }.build()
  }

  /// Collector entry for this error.
  pub fn to_diagnostic(&self) -> Diagnostic {
    match self {
      Self::Syntax { loc, message } => Diagnostic::new(IssueKind::Syntax, *loc, message.clone()),
      Self::Semantic { loc, message } => {
        Diagnostic::new(IssueKind::Semantic, *loc, message.clone())
      }
      Self::Aborted { .. } => Diagnostic::new(IssueKind::Semantic, Loc::default(), self.to_string()),
    }
  }
}
