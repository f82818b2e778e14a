//! Recursive-descent parser and type checker producing a `Program`.
//!
//! The parser mirrors the classic chibicc structure: a precedence-climbing
//! set of helpers for expressions, a thin statement layer on top, and
//! declarations that allocate stack slots as they are seen. Names are
//! resolved and pointer arithmetic is desugared while the tree is built.
//!
//! A failing parse routine returns `Err`; the enclosing block (or the
//! top-level loop) records it and resynchronises, so one run reports as many
//! independent errors as possible.

use std::collections::HashMap;

use log::debug;

use crate::ast::{
  BinaryOp, Expr, ExprKind, Function, GlobalVar, LocalVar, Object, Program, Stmt, UnaryOp, Var,
};
use crate::diagnostics::Diagnostics;
use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Loc, Token, TokenKind, describe_token};
use crate::ty::Type;

/// Number of integer argument registers in the calling convention.
pub const MAX_ARGS: usize = 6;

/// Frame offsets must fit a signed 32-bit displacement.
const MAX_FRAME_SIZE: i64 = i32::MAX as i64 - 15;

const STMT_STARTERS: [&str; 6] = ["if", "for", "while", "return", "int", "{"];

/// Parameter types of a function known by name.
#[derive(Debug, Clone)]
struct Signature {
  params: Vec<Type>,
  defined: bool,
}

/// Call to a function that was not known yet when the call was parsed.
#[derive(Debug)]
struct PendingCall {
  name: String,
  args: Vec<(Type, Loc)>,
  loc: Loc,
}

/// Local table and frame bookkeeping of the function being parsed.
#[derive(Debug, Default)]
struct Scope {
  locals: HashMap<String, LocalVar>,
  stack_offset: i64,
}

/// Parse a whole translation unit. Problems go to `diagnostics`; the returned
/// program holds every object that parsed cleanly.
pub fn parse(tokens: Vec<Token>, diagnostics: &mut Diagnostics) -> Program {
  let mut parser = Parser::new(tokens, diagnostics);
  parser.program();
  parser.resolve_pending_calls();
  debug!(
    "parsed {} object(s), {} signature(s)",
    parser.program.objects.len(),
    parser.signatures.len()
  );
  parser.program
}

struct Parser<'a> {
  tokens: Vec<Token>,
  pos: usize,
  diagnostics: &'a mut Diagnostics,
  program: Program,
  signatures: HashMap<String, Signature>,
  pending: Vec<PendingCall>,
  scope: Scope,
}

impl<'a> Parser<'a> {
  fn new(mut tokens: Vec<Token>, diagnostics: &'a mut Diagnostics) -> Self {
    if tokens.last().is_none_or(|token| token.kind != TokenKind::Eof) {
      let loc = tokens.last().map(|token| token.loc).unwrap_or_default();
      tokens.push(Token::new(TokenKind::Eof, "", None, loc));
    }
    Self {
      tokens,
      pos: 0,
      diagnostics,
      program: Program::default(),
      signatures: HashMap::new(),
      pending: Vec::new(),
      scope: Scope::default(),
    }
  }

  fn report(&mut self, err: CompileError) {
    self.diagnostics.add(err.to_diagnostic());
  }

  // program = (function | global-declaration)*
  fn program(&mut self) {
    while !self.is_eof() {
      let start = self.pos;
      self.scope = Scope::default();

      if self.is_function_ahead() {
        if let Err(err) = self.function() {
          self.report(err);
          self.skip_function(start);
        }
      } else if let Err(err) = self.global_variables() {
        self.report(err);
        self.sync_top_level(start);
      }
    }
  }

  /// `int *...name(` starts a function definition or prototype.
  fn is_function_ahead(&self) -> bool {
    let mut i = self.pos + 1;
    while self.tokens.get(i).is_some_and(|token| token.is("*")) {
      i += 1;
    }
    self.peek().is("int")
      && self
        .tokens
        .get(i)
        .is_some_and(|token| token.kind == TokenKind::Ident)
      && self.tokens.get(i + 1).is_some_and(|token| token.is("("))
  }

  // function = "int" "*"* ident "(" params? ")" ("{" compound-stmt | ";")
  fn function(&mut self) -> CompileResult<()> {
    let base = self.declspec()?;
    let ret = self.pointers(base);
    let (name, loc) = self.get_ident()?;
    self.skip("(")?;

    let mut params = Vec::new();
    if !self.equal(")") {
      loop {
        let base = self.declspec()?;
        let (ty, param_name, param_loc) = self.declarator(base)?;
        params.push(self.declare_local(param_name, ty.decay(), param_loc)?);
        if self.equal(")") {
          break;
        }
        self.skip(",")?;
      }
    }
    if params.len() > MAX_ARGS {
      return Err(CompileError::semantic(
        loc,
        format!("too many parameters in '{name}' (at most {MAX_ARGS} are supported)"),
      ));
    }

    let param_types: Vec<Type> = params.iter().map(|param| param.ty.clone()).collect();

    if self.equal(";") {
      if self.is_variable_name(&name) {
        return Err(CompileError::semantic(loc, format!("redefinition of '{name}'")));
      }
      self
        .signatures
        .entry(name)
        .or_insert(Signature {
          params: param_types,
          defined: false,
        });
      return Ok(());
    }

    let already_defined = self
      .signatures
      .get(&name)
      .is_some_and(|signature| signature.defined);
    if already_defined || self.is_variable_name(&name) {
      return Err(CompileError::semantic(loc, format!("redefinition of '{name}'")));
    }
    // Registered before the body so recursive calls are checked in place.
    self.signatures.insert(
      name.clone(),
      Signature {
        params: param_types,
        defined: true,
      },
    );

    self.skip("{")?;
    let body = self.compound_stmt()?;
    let scope = std::mem::take(&mut self.scope);

    self.program.objects.push(Object::Function(Function {
      name,
      params,
      ty: Type::func(ret),
      locals: scope.locals,
      body,
      stack_size: scope.stack_offset,
    }));
    Ok(())
  }

  // global-declaration = "int" (declarator ("," declarator)*)? ";"
  fn global_variables(&mut self) -> CompileResult<()> {
    let base = self.declspec()?;
    let mut first = true;

    while !self.equal(";") {
      if !first {
        self.skip(",")?;
      }
      first = false;

      let (ty, name, loc) = self.declarator(base.clone())?;
      if self.peek().is("=") {
        return Err(CompileError::semantic(
          self.peek().loc,
          "initializers for global variables are not supported",
        ));
      }
      if self.is_variable_name(&name) || self.signatures.contains_key(&name) {
        return Err(CompileError::semantic(loc, format!("redefinition of '{name}'")));
      }
      self
        .program
        .objects
        .push(Object::Global(GlobalVar { name, ty }));
    }
    Ok(())
  }

  fn is_variable_name(&self, name: &str) -> bool {
    self.program.globals().any(|global| global.name == name)
  }

  /// Discard tokens through the closing brace of the function that failed.
  fn skip_function(&mut self, start: usize) {
    let consumed = &self.tokens[start..self.pos];
    let mut opened = consumed.iter().any(|token| token.is("{"));
    let mut depth = consumed.iter().filter(|token| token.is("{")).count() as i64
      - consumed.iter().filter(|token| token.is("}")).count() as i64;

    while !self.is_eof() {
      let token = self.advance();
      if token.is("{") {
        depth += 1;
        opened = true;
      } else if token.is("}") {
        depth -= 1;
        if opened && depth <= 0 {
          break;
        }
      } else if !opened && token.is(";") {
        // A prototype that failed has no body to skip.
        break;
      }
    }
  }

  /// Resume at the next top-level declaration.
  fn sync_top_level(&mut self, start: usize) {
    if self.pos == start {
      self.advance();
    }
    while !self.is_eof() {
      if self.previous().is_some_and(|token| token.is(";") || token.is("}")) {
        break;
      }
      if self.peek().is("int") {
        break;
      }
      self.advance();
    }
  }

  /// Resume at a statement boundary inside a block.
  fn synchronize(&mut self, start: usize) {
    if self.pos == start {
      self.advance();
    }
    while !self.is_eof() {
      if self.previous().is_some_and(|token| token.is(";") || token.is("}")) {
        break;
      }
      let next = self.peek();
      if STMT_STARTERS.iter().any(|kw| next.is(kw)) || next.is("}") {
        break;
      }
      self.advance();
    }
  }

  fn declspec(&mut self) -> CompileResult<Type> {
    self.skip("int")?;
    Ok(Type::Int)
  }

  fn pointers(&mut self, mut ty: Type) -> Type {
    while self.equal("*") {
      ty = Type::pointer_to(ty);
    }
    ty
  }

  // declarator = "*"* ident type-suffix
  fn declarator(&mut self, base: Type) -> CompileResult<(Type, String, Loc)> {
    let ty = self.pointers(base);
    let (name, loc) = self.get_ident()?;
    let ty = self.type_suffix(ty)?;
    Ok((ty, name, loc))
  }

  // type-suffix = ("[" num "]" type-suffix)?
  fn type_suffix(&mut self, ty: Type) -> CompileResult<Type> {
    if self.equal("[") {
      let loc = self.peek().loc;
      let len = self.get_number()?;
      self.skip("]")?;
      let ty = self.type_suffix(ty)?;
      if ty.size().checked_mul(len).is_none() {
        return Err(CompileError::semantic(loc, "array is too large"));
      }
      return Ok(Type::array_of(ty, len));
    }
    Ok(ty)
  }

  /// Allocate a frame slot for a new local.
  fn declare_local(&mut self, name: String, ty: Type, loc: Loc) -> CompileResult<LocalVar> {
    if self.scope.locals.contains_key(&name) {
      return Err(CompileError::semantic(loc, format!("redefinition of '{name}'")));
    }
    self.scope.stack_offset = self
      .scope
      .stack_offset
      .checked_add(ty.size())
      .filter(|&offset| offset <= MAX_FRAME_SIZE)
      .ok_or_else(|| CompileError::semantic(loc, "array is too large"))?;
    let var = LocalVar {
      name: name.clone(),
      ty,
      offset: -self.scope.stack_offset,
    };
    self.scope.locals.insert(name, var.clone());
    Ok(var)
  }

  // compound-stmt = (declaration | stmt)* "}"
  fn compound_stmt(&mut self) -> CompileResult<Stmt> {
    let mut stmts = Vec::new();

    loop {
      if self.equal("}") {
        break;
      }
      if self.is_eof() {
        return Err(CompileError::syntax(
          self.peek().loc,
          "expected \"}\", but got \"EOF\"",
        ));
      }

      let start = self.pos;
      let item = if self.peek().is("int") {
        self.declaration()
      } else {
        self.stmt()
      };
      match item {
        Ok(stmt) => stmts.push(stmt),
        Err(err) => {
          self.report(err);
          self.synchronize(start);
        }
      }
    }

    Ok(Stmt::Block(stmts))
  }

  // declaration = "int" (declarator ("=" assign)? ("," declarator ("=" assign)?)*)? ";"
  fn declaration(&mut self) -> CompileResult<Stmt> {
    let base = self.declspec()?;
    let mut stmts = Vec::new();
    let mut first = true;

    while !self.equal(";") {
      if !first {
        self.skip(",")?;
      }
      first = false;

      let (ty, name, loc) = self.declarator(base.clone())?;
      let var = self.declare_local(name, ty, loc)?;

      let eq_loc = self.peek().loc;
      if self.equal("=") {
        let lhs = Expr::var(Var::Local(var), loc);
        let rhs = self.assign()?;
        stmts.push(Stmt::Expr(Some(Expr::assign(lhs, rhs, eq_loc)?)));
      }
    }

    Ok(Stmt::Block(stmts))
  }

  // stmt = "return" expr? ";"
  //      | "if" "(" expr ")" stmt ("else" stmt)?
  //      | "for" "(" (declaration | expr-stmt) expr? ";" expr? ")" stmt
  //      | "while" "(" expr ")" stmt
  //      | "{" compound-stmt
  //      | expr-stmt
  fn stmt(&mut self) -> CompileResult<Stmt> {
    if self.equal("return") {
      if self.equal(";") {
        return Ok(Stmt::Return(None));
      }
      let value = self.expr()?;
      self.skip(";")?;
      return Ok(Stmt::Return(Some(value)));
    }

    if self.equal("if") {
      self.skip("(")?;
      let cond = self.expr()?;
      self.skip(")")?;
      let then = Box::new(self.stmt()?);
      let els = if self.equal("else") {
        Some(Box::new(self.stmt()?))
      } else {
        None
      };
      return Ok(Stmt::If { cond, then, els });
    }

    if self.equal("for") {
      self.skip("(")?;
      let init = if self.peek().is("int") {
        self.declaration()?
      } else {
        self.expr_stmt()?
      };
      let cond = if self.peek().is(";") {
        None
      } else {
        Some(self.expr()?)
      };
      self.skip(";")?;
      let inc = if self.peek().is(")") {
        None
      } else {
        Some(self.expr()?)
      };
      self.skip(")")?;
      let body = Box::new(self.stmt()?);
      return Ok(Stmt::For {
        init: Some(Box::new(init)),
        cond,
        inc,
        body,
      });
    }

    if self.equal("while") {
      self.skip("(")?;
      let cond = self.expr()?;
      self.skip(")")?;
      let body = Box::new(self.stmt()?);
      return Ok(Stmt::For {
        init: None,
        cond: Some(cond),
        inc: None,
        body,
      });
    }

    if self.equal("{") {
      return self.compound_stmt();
    }

    self.expr_stmt()
  }

  // expr-stmt = expr? ";"
  fn expr_stmt(&mut self) -> CompileResult<Stmt> {
    if self.equal(";") {
      return Ok(Stmt::Expr(None));
    }
    let expr = self.expr()?;
    self.skip(";")?;
    Ok(Stmt::Expr(Some(expr)))
  }

  fn expr(&mut self) -> CompileResult<Expr> {
    self.assign()
  }

  // assign = equality ("=" assign)?
  fn assign(&mut self) -> CompileResult<Expr> {
    let node = self.equality()?;

    let loc = self.peek().loc;
    if self.equal("=") {
      if !node.is_lvalue() {
        return Err(CompileError::syntax(node.loc, "not an lvalue"));
      }
      let rhs = self.assign()?;
      return Expr::assign(node, rhs, loc);
    }

    Ok(node)
  }

  // equality = relational ("==" relational | "!=" relational)*
  fn equality(&mut self) -> CompileResult<Expr> {
    let mut node = self.relational()?;

    loop {
      let loc = self.peek().loc;
      let op = match self.peek_operator(&["==", "!="]) {
        Some("==") => BinaryOp::Eq,
        Some("!=") => BinaryOp::Ne,
        _ => break,
      };
      self.advance();
      let rhs = self.relational()?;
      node = Expr::binary(op, node, rhs, loc)?;
    }

    Ok(node)
  }

  // relational = add ("<" add | "<=" add | ">" add | ">=" add)*
  fn relational(&mut self) -> CompileResult<Expr> {
    let mut node = self.add()?;

    loop {
      let loc = self.peek().loc;
      let Some(symbol) = self.peek_operator(&["<", "<=", ">", ">="]) else {
        break;
      };
      self.advance();
      let rhs = self.add()?;
      // Only `<` and `<=` exist past this point.
      node = match symbol {
        "<" => Expr::binary(BinaryOp::Lt, node, rhs, loc)?,
        "<=" => Expr::binary(BinaryOp::Le, node, rhs, loc)?,
        ">" => Expr::binary(BinaryOp::Lt, rhs, node, loc)?,
        _ => Expr::binary(BinaryOp::Le, rhs, node, loc)?,
      };
    }

    Ok(node)
  }

  // add = mul ("+" mul | "-" mul)*
  fn add(&mut self) -> CompileResult<Expr> {
    let mut node = self.mul()?;

    loop {
      let loc = self.peek().loc;
      match self.peek_operator(&["+", "-"]) {
        Some("+") => {
          self.advance();
          let rhs = self.mul()?;
          node = new_add(node, rhs, loc)?;
        }
        Some(_) => {
          self.advance();
          let rhs = self.mul()?;
          node = new_sub(node, rhs, loc)?;
        }
        None => break,
      }
    }

    Ok(node)
  }

  // mul = unary ("*" unary | "/" unary)*
  fn mul(&mut self) -> CompileResult<Expr> {
    let mut node = self.unary()?;

    loop {
      let loc = self.peek().loc;
      let op = match self.peek_operator(&["*", "/"]) {
        Some("*") => BinaryOp::Mul,
        Some("/") => BinaryOp::Div,
        _ => break,
      };
      self.advance();
      let rhs = self.unary()?;
      node = Expr::binary(op, node, rhs, loc)?;
    }

    Ok(node)
  }

  // unary = ("+" | "-" | "&" | "*") unary | postfix
  fn unary(&mut self) -> CompileResult<Expr> {
    let loc = self.peek().loc;

    if self.equal("+") {
      return self.unary();
    }

    if self.equal("-") {
      let operand = self.unary()?;
      return Expr::unary(UnaryOp::Neg, operand, loc);
    }

    if self.equal("&") {
      let operand = self.unary()?;
      if !operand.is_lvalue() {
        return Err(CompileError::syntax(operand.loc, "not an lvalue"));
      }
      return Expr::unary(UnaryOp::Addr, operand, loc);
    }

    if self.equal("*") {
      let operand = self.unary()?;
      return Expr::unary(UnaryOp::Deref, operand, loc);
    }

    self.postfix()
  }

  // postfix = primary ("[" expr "]")*
  fn postfix(&mut self) -> CompileResult<Expr> {
    let mut node = self.primary()?;

    loop {
      let loc = self.peek().loc;
      if !self.equal("[") {
        break;
      }
      let index = self.expr()?;
      self.skip("]")?;
      let address = new_add(node, index, loc)?;
      node = Expr::unary(UnaryOp::Deref, address, loc)?;
    }

    Ok(node)
  }

  // primary = "(" expr ")" | "sizeof" unary | ident ("(" args ")")? | num
  fn primary(&mut self) -> CompileResult<Expr> {
    let token = self.peek().clone();

    if self.equal("(") {
      let node = self.expr()?;
      self.skip(")")?;
      return Ok(node);
    }

    if self.equal("sizeof") {
      let node = self.unary()?;
      return Ok(Expr::num(node.ty.size(), token.loc));
    }

    match token.kind {
      TokenKind::Ident => {
        self.advance();
        if self.peek().is("(") {
          return self.call(token.lexeme, token.loc);
        }
        let var = self
          .find_var(&token.lexeme)
          .ok_or_else(|| CompileError::semantic(token.loc, format!("{} undeclared", token.lexeme)))?;
        Ok(Expr::var(var, token.loc))
      }
      TokenKind::Num => {
        let value = self.get_number()?;
        Ok(Expr::num(value, token.loc))
      }
      _ => Err(CompileError::syntax(
        token.loc,
        format!("expected an expression, but got \"{}\"", describe_token(&token)),
      )),
    }
  }

  // call = ident "(" (assign ("," assign)*)? ")"
  fn call(&mut self, name: String, loc: Loc) -> CompileResult<Expr> {
    self.skip("(")?;

    let mut args = Vec::new();
    if !self.equal(")") {
      loop {
        args.push(self.assign()?);
        if self.equal(")") {
          break;
        }
        self.skip(",")?;
      }
    }

    if args.len() > MAX_ARGS {
      return Err(CompileError::semantic(
        loc,
        format!("too many arguments to function '{name}' (at most {MAX_ARGS} are supported)"),
      ));
    }

    let arg_types: Vec<(Type, Loc)> = args.iter().map(|arg| (arg.ty.clone(), arg.loc)).collect();
    match self.signatures.get(&name) {
      Some(signature) => {
        check_call(self.diagnostics, &name, &signature.params, &arg_types, loc)?;
      }
      None => self.pending.push(PendingCall {
        name: name.clone(),
        args: arg_types,
        loc,
      }),
    }

    Ok(Expr::call(name, args, loc))
  }

  /// Locals shadow globals; globals must be declared before use.
  fn find_var(&self, name: &str) -> Option<Var> {
    if let Some(local) = self.scope.locals.get(name) {
      return Some(Var::Local(local.clone()));
    }
    self
      .program
      .globals()
      .find(|global| global.name == name)
      .cloned()
      .map(Var::Global)
  }

  /// Check calls whose callee was defined later in the file.
  fn resolve_pending_calls(&mut self) {
    for call in std::mem::take(&mut self.pending) {
      match self.signatures.get(&call.name) {
        Some(signature) => {
          if let Err(err) = check_call(
            self.diagnostics,
            &call.name,
            &signature.params,
            &call.args,
            call.loc,
          ) {
            self.diagnostics.add(err.to_diagnostic());
          }
        }
        None => self.diagnostics.warning(
          call.loc,
          format!("implicit declaration of function '{}'", call.name),
        ),
      }
    }
  }

  fn peek(&self) -> &Token {
    &self.tokens[self.pos]
  }

  fn previous(&self) -> Option<&Token> {
    self.pos.checked_sub(1).map(|i| &self.tokens[i])
  }

  /// Move past the current token; `Eof` is never consumed.
  fn advance(&mut self) -> Token {
    let token = self.peek().clone();
    if !self.is_eof() {
      self.pos += 1;
    }
    token
  }

  fn peek_operator(&self, ops: &[&'static str]) -> Option<&'static str> {
    let token = self.peek();
    ops.iter().copied().find(|op| token.is(op))
  }

  /// Consume the current token if it matches the provided punctuator or keyword.
  fn equal(&mut self, op: &str) -> bool {
    if self.peek().is(op) {
      self.advance();
      return true;
    }
    false
  }

  fn skip(&mut self, op: &str) -> CompileResult<()> {
    if self.equal(op) {
      return Ok(());
    }
    let token = self.peek();
    Err(CompileError::syntax(
      token.loc,
      format!("expected \"{op}\", but got \"{}\"", describe_token(token)),
    ))
  }

  fn get_number(&mut self) -> CompileResult<i64> {
    let token = self.peek();
    if token.kind == TokenKind::Num {
      let value = token.value.ok_or_else(|| {
        CompileError::syntax(token.loc, "internal error: numeric token missing value")
      })?;
      self.advance();
      return Ok(value);
    }
    Err(CompileError::syntax(
      token.loc,
      format!("expected a number, but got \"{}\"", describe_token(token)),
    ))
  }

  fn get_ident(&mut self) -> CompileResult<(String, Loc)> {
    let token = self.peek();
    if token.kind == TokenKind::Ident {
      let ident = (token.lexeme.clone(), token.loc);
      self.advance();
      return Ok(ident);
    }
    Err(CompileError::syntax(
      token.loc,
      format!("expected an identifier, but got \"{}\"", describe_token(token)),
    ))
  }

  fn is_eof(&self) -> bool {
    self.peek().kind == TokenKind::Eof
  }
}

/// Compare call arguments against a known signature. Type mismatches are
/// warnings (all of them are reported); a wrong count is fatal.
fn check_call(
  diagnostics: &mut Diagnostics,
  name: &str,
  params: &[Type],
  args: &[(Type, Loc)],
  loc: Loc,
) -> CompileResult<()> {
  for (i, ((arg, arg_loc), param)) in args.iter().zip(params).enumerate() {
    if arg != param {
      diagnostics.warning(
        *arg_loc,
        format!(
          "incompatible type for argument {} of '{name}': expected '{param}', found '{arg}'",
          i + 1
        ),
      );
    }
  }

  if args.len() < params.len() {
    return Err(CompileError::semantic(
      loc,
      format!("too few arguments to function '{name}'"),
    ));
  }
  if args.len() > params.len() {
    return Err(CompileError::semantic(
      loc,
      format!("too many arguments to function '{name}'"),
    ));
  }
  Ok(())
}

/// `index * sizeof(*pointer)`.
fn scale(index: Expr, pointer: &Type, loc: Loc) -> CompileResult<Expr> {
  let size = pointer.base().map_or(1, Type::size);
  Expr::binary(BinaryOp::Mul, index, Expr::num(size, loc), loc)
}

/// `+` with pointer arithmetic: `ptr + n` advances by `n` elements.
fn new_add(lhs: Expr, rhs: Expr, loc: Loc) -> CompileResult<Expr> {
  match (lhs.ty.is_pointer(), rhs.ty.is_pointer()) {
    (false, false) => Expr::binary(BinaryOp::Add, lhs, rhs, loc),
    (true, true) => Err(CompileError::semantic(loc, "invalid operands to binary '+'")),
    (false, true) => new_add(rhs, lhs, loc),
    (true, false) => {
      let offset = scale(rhs, &lhs.ty, loc)?;
      Expr::binary(BinaryOp::Add, lhs, offset, loc)
    }
  }
}

/// `-` with pointer arithmetic: `ptr - n` and `ptr - ptr` (element count).
fn new_sub(lhs: Expr, rhs: Expr, loc: Loc) -> CompileResult<Expr> {
  match (lhs.ty.is_pointer(), rhs.ty.is_pointer()) {
    (false, false) => Expr::binary(BinaryOp::Sub, lhs, rhs, loc),
    (true, false) => {
      let offset = scale(rhs, &lhs.ty, loc)?;
      Expr::binary(BinaryOp::Sub, lhs, offset, loc)
    }
    (true, true) => {
      let size = lhs.ty.base().map_or(1, Type::size);
      let bytes = Expr::typed(
        ExprKind::Binary {
          op: BinaryOp::Sub,
          lhs: Box::new(lhs),
          rhs: Box::new(rhs),
        },
        Type::Int,
        loc,
      );
      Expr::binary(BinaryOp::Div, bytes, Expr::num(size, loc), loc)
    }
    (false, true) => Err(CompileError::semantic(loc, "invalid operands to binary '-'")),
  }
}
