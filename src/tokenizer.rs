//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The tokenizer knows nothing about semantics beyond recognising
//! punctuators, keywords, identifiers and numeric literals. Multi-character
//! punctuators are matched before single-character ones to avoid ambiguity.
//! Unexpected characters are reported to the shared collector and skipped so
//! a single run surfaces every lexical problem.

use std::fmt;

use crate::diagnostics::{Diagnostics, IssueKind};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Punctuator,
  Keyword,
  Ident,
  Num,
  Eof,
}

/// 1-based source position of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Loc {
  pub row: usize,
  pub col: usize,
}

impl Loc {
  pub fn new(row: usize, col: usize) -> Self {
    Self { row, col }
  }
}

impl fmt::Display for Loc {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.row, self.col)
  }
}

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub lexeme: String,
  pub value: Option<i64>,
  pub loc: Loc,
}

impl Token {
  /// Convenience constructor to keep the `tokenize` loop readable.
  pub fn new(kind: TokenKind, lexeme: impl Into<String>, value: Option<i64>, loc: Loc) -> Self {
    Self {
      kind,
      lexeme: lexeme.into(),
      value,
      loc,
    }
  }

  /// True for punctuators and keywords spelled exactly `text`.
  pub fn is(&self, text: &str) -> bool {
    matches!(self.kind, TokenKind::Punctuator | TokenKind::Keyword) && self.lexeme == text
  }
}

const KEYWORDS: [&str; 7] = ["int", "if", "else", "for", "while", "return", "sizeof"];

const TWO_CHAR_PUNCTUATORS: [&str; 4] = ["==", "!=", "<=", ">="];

const ONE_CHAR_PUNCTUATORS: &[u8] = b"+-*/()<>;={}&,[]";

/// Byte cursor that keeps row/column bookkeeping in one place.
struct Cursor<'a> {
  input: &'a str,
  pos: usize,
  row: usize,
  line_start: usize,
}

impl<'a> Cursor<'a> {
  fn new(input: &'a str) -> Self {
    Self {
      input,
      pos: 0,
      row: 1,
      line_start: 0,
    }
  }

  fn rest(&self) -> &'a str {
    &self.input[self.pos..]
  }

  fn peek(&self) -> Option<u8> {
    self.input.as_bytes().get(self.pos).copied()
  }

  fn loc(&self) -> Loc {
    Loc::new(self.row, self.input[self.line_start..self.pos].chars().count() + 1)
  }

  /// Advance by `len` bytes, tracking newlines.
  fn bump(&mut self, len: usize) {
    let end = (self.pos + len).min(self.input.len());
    for (offset, byte) in self.input.as_bytes()[self.pos..end].iter().enumerate() {
      if *byte == b'\n' {
        self.row += 1;
        self.line_start = self.pos + offset + 1;
      }
    }
    self.pos = end;
  }

  fn bump_while(&mut self, pred: impl Fn(u8) -> bool) {
    while let Some(c) = self.peek()
      && pred(c)
    {
      self.bump(1);
    }
  }
}

/// Lex the input into a flat vector of tokens terminated by an `Eof` marker.
///
/// Lexical errors are appended to `diagnostics`; the returned stream always
/// ends with exactly one `Eof` token.
pub fn tokenize(input: &str, diagnostics: &mut Diagnostics) -> Vec<Token> {
  let mut tokens = Vec::new();
  let mut cur = Cursor::new(input);

  while let Some(c) = cur.peek() {
    if c.is_ascii_whitespace() {
      cur.bump(1);
      continue;
    }

    if cur.rest().starts_with("//") {
      cur.bump_while(|c| c != b'\n');
      continue;
    }

    if cur.rest().starts_with("/*") {
      let loc = cur.loc();
      match cur.rest()[2..].find("*/") {
        Some(end) => cur.bump(end + 4),
        None => {
          diagnostics.push(IssueKind::Lexical, loc, "unterminated block comment");
          cur.bump(cur.rest().len());
        }
      }
      continue;
    }

    let loc = cur.loc();
    let start = cur.pos;

    if c.is_ascii_digit() {
      cur.bump_while(|c| c.is_ascii_digit());
      let text = &input[start..cur.pos];
      match text.parse::<i64>() {
        Ok(value) => tokens.push(Token::new(TokenKind::Num, text, Some(value), loc)),
        Err(err) => diagnostics.push(IssueKind::Lexical, loc, format!("invalid number: {err}")),
      }
      continue;
    }

    if c.is_ascii_alphabetic() || c == b'_' {
      cur.bump_while(|c| c.is_ascii_alphanumeric() || c == b'_');
      let text = &input[start..cur.pos];
      let kind = if KEYWORDS.contains(&text) {
        TokenKind::Keyword
      } else {
        TokenKind::Ident
      };
      tokens.push(Token::new(kind, text, None, loc));
      continue;
    }

    if let Some(op) = TWO_CHAR_PUNCTUATORS
      .into_iter()
      .find(|op| cur.rest().starts_with(op))
    {
      cur.bump(op.len());
      tokens.push(Token::new(TokenKind::Punctuator, op, None, loc));
      continue;
    }

    if ONE_CHAR_PUNCTUATORS.contains(&c) {
      cur.bump(1);
      tokens.push(Token::new(TokenKind::Punctuator, &input[start..cur.pos], None, loc));
      continue;
    }

    let invalid_char = cur.rest().chars().next().unwrap_or('\0');
    diagnostics.push(
      IssueKind::Lexical,
      loc,
      format!("Unexpected character '{invalid_char}'"),
    );
    cur.bump(invalid_char.len_utf8());
  }

  tokens.push(Token::new(TokenKind::Eof, "", None, cur.loc()));
  tokens
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: &Token) -> String {
  match token.kind {
    TokenKind::Eof => "EOF".to_string(),
    _ => token.lexeme.clone(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn lex(src: &str) -> (Vec<Token>, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let tokens = tokenize(src, &mut diagnostics);
    (tokens, diagnostics)
  }

  #[test]
  fn splits_keywords_identifiers_and_punctuators() {
    let (tokens, diagnostics) = lex("int main() { return a1 >= 10; }");
    assert!(diagnostics.is_empty());
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
      kinds,
      vec![
        TokenKind::Keyword,
        TokenKind::Ident,
        TokenKind::Punctuator,
        TokenKind::Punctuator,
        TokenKind::Punctuator,
        TokenKind::Keyword,
        TokenKind::Ident,
        TokenKind::Punctuator,
        TokenKind::Num,
        TokenKind::Punctuator,
        TokenKind::Punctuator,
        TokenKind::Eof,
      ]
    );
    assert_eq!(tokens[7].lexeme, ">=");
    assert_eq!(tokens[8].value, Some(10));
  }

  #[test]
  fn tracks_rows_and_columns() {
    let (tokens, _) = lex("int x;\n  x = 3;");
    let x = &tokens[3];
    assert_eq!(x.lexeme, "x");
    assert_eq!(x.loc, Loc::new(2, 3));
    assert_eq!(tokens[5].loc, Loc::new(2, 7));
  }

  #[test]
  fn records_unexpected_characters_and_keeps_going() {
    let (tokens, diagnostics) = lex("1 @ 2 $ 3");
    assert_eq!(diagnostics.error_count(), 2);
    let nums: Vec<_> = tokens.iter().filter_map(|t| t.value).collect();
    assert_eq!(nums, vec![1, 2, 3]);
    let first = diagnostics.iter().next().unwrap();
    assert_eq!(first.loc, Loc::new(1, 3));
    assert_eq!(first.message, "Unexpected character '@'");
  }

  #[test]
  fn skips_comments() {
    let (tokens, diagnostics) = lex("1 // two\n/* three */ 4");
    assert!(diagnostics.is_empty());
    let nums: Vec<_> = tokens.iter().filter_map(|t| t.value).collect();
    assert_eq!(nums, vec![1, 4]);
  }

  #[test]
  fn unterminated_comment_is_an_error() {
    let (tokens, diagnostics) = lex("1 /* never closed");
    assert_eq!(diagnostics.error_count(), 1);
    assert_eq!(tokens.len(), 2);
  }

  #[test]
  fn always_ends_with_single_eof() {
    let (tokens, _) = lex("");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, TokenKind::Eof);
    assert_eq!(describe_token(&tokens[0]), "EOF");
  }
}
