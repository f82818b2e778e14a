//! Ordered collector shared by every stage of the pipeline.
//!
//! Stages append issues as they find them and keep going; only the driver
//! asks whether anything fatal was recorded. Rendering follows the familiar
//! `row:col: error: message` layout with the offending line and a caret.

use std::fmt;

use crate::tokenizer::Loc;

const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Where an issue came from. Everything except `Warning` blocks codegen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
  Lexical,
  Syntax,
  Semantic,
  Warning,
}

impl IssueKind {
  pub fn is_fatal(self) -> bool {
    !matches!(self, IssueKind::Warning)
  }

  fn label(self) -> &'static str {
    if self.is_fatal() { "error" } else { "warning" }
  }

  fn color(self) -> &'static str {
    if self.is_fatal() { RED } else { YELLOW }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
  pub kind: IssueKind,
  pub loc: Loc,
  pub message: String,
}

impl Diagnostic {
  pub fn new(kind: IssueKind, loc: Loc, message: impl Into<String>) -> Self {
    Self {
      kind,
      loc,
      message: message.into(),
    }
  }

  pub fn is_fatal(&self) -> bool {
    self.kind.is_fatal()
  }

  /// Header, source line and caret. `source` is the whole translation unit.
  pub fn render(&self, source: &str, color: bool) -> String {
    let line = source
      .lines()
      .nth(self.loc.row.saturating_sub(1))
      .unwrap_or_default();
    let pad = " ".repeat(self.loc.col.saturating_sub(1) + 4);
    if color {
      let tint = self.kind.color();
      format!(
        "{BOLD}{}: {tint}{}:{RESET} {}\n    {line}\n{pad}{BOLD}{tint}^{RESET}\n",
        self.loc,
        self.kind.label(),
        self.message
      )
    } else {
      format!("{self}\n    {line}\n{pad}^\n")
    }
  }
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}: {}", self.loc, self.kind.label(), self.message)
  }
}

/// Append-only list of diagnostics in the order they were encountered.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
  issues: Vec<Diagnostic>,
}

impl Diagnostics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, kind: IssueKind, loc: Loc, message: impl Into<String>) {
    self.issues.push(Diagnostic::new(kind, loc, message));
  }

  pub fn warning(&mut self, loc: Loc, message: impl Into<String>) {
    self.push(IssueKind::Warning, loc, message);
  }

  pub fn add(&mut self, diagnostic: Diagnostic) {
    self.issues.push(diagnostic);
  }

  /// True once any fatal issue has been recorded.
  pub fn has_errors(&self) -> bool {
    self.issues.iter().any(Diagnostic::is_fatal)
  }

  pub fn error_count(&self) -> usize {
    self.issues.iter().filter(|d| d.is_fatal()).count()
  }

  pub fn warning_count(&self) -> usize {
    self.issues.len() - self.error_count()
  }

  pub fn is_empty(&self) -> bool {
    self.issues.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
    self.issues.iter()
  }

  pub fn render(&self, source: &str, color: bool) -> String {
    self
      .issues
      .iter()
      .map(|issue| issue.render(source, color))
      .collect()
  }
}
