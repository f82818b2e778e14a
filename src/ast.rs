//! Syntax tree, declared objects and the type rules that bind them.
//!
//! Every `Expr` is typed when it is constructed, so the code generator can
//! walk the finished `Program` without any further analysis.

use std::collections::HashMap;

use crate::error::{CompileError, CompileResult};
use crate::tokenizer::Loc;
use crate::ty::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Neg,
  Addr,
  Deref,
}

/// Binary operators as seen by the code generator. `>` and `>=` are folded
/// into `Lt`/`Le` with swapped operands while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Eq,
  Ne,
  Lt,
  Le,
}

impl BinaryOp {
  pub fn is_relational(self) -> bool {
    matches!(self, BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le)
  }
}

/// Function-local storage; `offset` is a negative displacement from `%rbp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVar {
  pub name: String,
  pub ty: Type,
  pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalVar {
  pub name: String,
  pub ty: Type,
}

/// Resolved target of a variable reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Var {
  Local(LocalVar),
  Global(GlobalVar),
}

impl Var {
  pub fn ty(&self) -> &Type {
    match self {
      Var::Local(local) => &local.ty,
      Var::Global(global) => &global.ty,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
  Num(i64),
  Var(Var),
  Unary {
    op: UnaryOp,
    operand: Box<Expr>,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Assign {
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Call {
    name: String,
    args: Vec<Expr>,
  },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
  pub kind: ExprKind,
  pub ty: Type,
  pub loc: Loc,
}

impl Expr {
  /// Build a node and derive its type from the already-typed children.
  pub fn new(kind: ExprKind, loc: Loc) -> CompileResult<Self> {
    let ty = add_type(&kind, loc)?;
    Ok(Self { kind, ty, loc })
  }

  /// Build a node whose type was decided by a desugaring rule.
  pub fn typed(kind: ExprKind, ty: Type, loc: Loc) -> Self {
    Self { kind, ty, loc }
  }

  pub fn num(value: i64, loc: Loc) -> Self {
    Self::typed(ExprKind::Num(value), Type::Int, loc)
  }

  pub fn var(var: Var, loc: Loc) -> Self {
    let ty = var.ty().clone();
    Self::typed(ExprKind::Var(var), ty, loc)
  }

  pub fn unary(op: UnaryOp, operand: Expr, loc: Loc) -> CompileResult<Self> {
    Self::new(
      ExprKind::Unary {
        op,
        operand: Box::new(operand),
      },
      loc,
    )
  }

  pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, loc: Loc) -> CompileResult<Self> {
    Self::new(
      ExprKind::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
      },
      loc,
    )
  }

  pub fn assign(lhs: Expr, rhs: Expr, loc: Loc) -> CompileResult<Self> {
    Self::new(
      ExprKind::Assign {
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
      },
      loc,
    )
  }

  pub fn call(name: impl Into<String>, args: Vec<Expr>, loc: Loc) -> Self {
    Self::typed(
      ExprKind::Call {
        name: name.into(),
        args,
      },
      Type::Int,
      loc,
    )
  }

  /// Variables and dereferences denote storage.
  pub fn is_lvalue(&self) -> bool {
    matches!(
      self.kind,
      ExprKind::Var(_)
        | ExprKind::Unary {
          op: UnaryOp::Deref,
          ..
        }
    )
  }
}

/// Type of a node given its typed children.
fn add_type(kind: &ExprKind, loc: Loc) -> CompileResult<Type> {
  let ty = match kind {
    ExprKind::Num(_) | ExprKind::Call { .. } => Type::Int,
    ExprKind::Var(var) => var.ty().clone(),
    ExprKind::Binary { op, lhs, .. } => {
      if op.is_relational() {
        Type::Int
      } else {
        lhs.ty.decay()
      }
    }
    ExprKind::Assign { lhs, .. } => {
      if lhs.ty.is_array() {
        return Err(CompileError::syntax(lhs.loc, "not an lvalue"));
      }
      lhs.ty.clone()
    }
    ExprKind::Unary { op, operand } => match op {
      UnaryOp::Neg => operand.ty.clone(),
      UnaryOp::Addr => match &operand.ty {
        Type::Array { base, .. } => Type::Ptr(base.clone()),
        other => Type::pointer_to(other.clone()),
      },
      UnaryOp::Deref => match operand.ty.base() {
        Some(base) => base.clone(),
        None => return Err(CompileError::semantic(loc, "invalid pointer dereference")),
      },
    },
  };
  Ok(ty)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
  Expr(Option<Expr>),
  Return(Option<Expr>),
  Block(Vec<Stmt>),
  If {
    cond: Expr,
    then: Box<Stmt>,
    els: Option<Box<Stmt>>,
  },
  /// `while (c) s` is a `For` without init and increment.
  For {
    init: Option<Box<Stmt>>,
    cond: Option<Expr>,
    inc: Option<Expr>,
    body: Box<Stmt>,
  },
}

#[derive(Debug, Clone)]
pub struct Function {
  pub name: String,
  pub params: Vec<LocalVar>,
  pub ty: Type,
  pub locals: HashMap<String, LocalVar>,
  pub body: Stmt,
  /// Running total of local sizes; aligned when the frame is emitted.
  pub stack_size: i64,
}

impl Function {
  pub fn arity(&self) -> usize {
    self.params.len()
  }
}

#[derive(Debug, Clone)]
pub enum Object {
  Global(GlobalVar),
  Function(Function),
}

/// Top-level objects in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Program {
  pub objects: Vec<Object>,
}

impl Program {
  pub fn globals(&self) -> impl Iterator<Item = &GlobalVar> {
    self.objects.iter().filter_map(|obj| match obj {
      Object::Global(global) => Some(global),
      Object::Function(_) => None,
    })
  }

  pub fn functions(&self) -> impl Iterator<Item = &Function> {
    self.objects.iter().filter_map(|obj| match obj {
      Object::Function(function) => Some(function),
      Object::Global(_) => None,
    })
  }

  pub fn function(&self, name: &str) -> Option<&Function> {
    self.functions().find(|function| function.name == name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn local(name: &str, ty: Type, offset: i64) -> Expr {
    Expr::var(
      Var::Local(LocalVar {
        name: name.to_string(),
        ty,
        offset,
      }),
      Loc::default(),
    )
  }

  #[test]
  fn address_of_array_decays_to_element_pointer() {
    let arr = local("a", Type::array_of(Type::Int, 4), -32);
    let addr = Expr::unary(UnaryOp::Addr, arr, Loc::default()).unwrap();
    assert_eq!(addr.ty, Type::pointer_to(Type::Int));
    assert!(!addr.ty.is_array());
  }

  #[test]
  fn dereferencing_an_int_is_rejected() {
    let x = local("x", Type::Int, -8);
    let err = Expr::unary(UnaryOp::Deref, x, Loc::new(1, 5)).unwrap_err();
    assert!(matches!(err, CompileError::Semantic { ref message, .. } if message == "invalid pointer dereference"));
  }

  #[test]
  fn assigning_to_an_array_is_rejected() {
    let arr = local("a", Type::array_of(Type::Int, 2), -16);
    let err = Expr::assign(arr, Expr::num(1, Loc::default()), Loc::default()).unwrap_err();
    assert!(matches!(err, CompileError::Syntax { ref message, .. } if message == "not an lvalue"));
  }

  #[test]
  fn relational_yields_int_and_arithmetic_inherits_left() {
    let p = local("p", Type::pointer_to(Type::Int), -8);
    let one = Expr::num(1, Loc::default());
    let sum = Expr::binary(BinaryOp::Add, p.clone(), one.clone(), Loc::default()).unwrap();
    assert_eq!(sum.ty, Type::pointer_to(Type::Int));
    let cmp = Expr::binary(BinaryOp::Lt, p, one, Loc::default()).unwrap();
    assert_eq!(cmp.ty, Type::Int);
  }

  #[test]
  fn only_variables_and_derefs_are_lvalues() {
    let p = local("p", Type::pointer_to(Type::Int), -8);
    assert!(p.is_lvalue());
    let deref = Expr::unary(UnaryOp::Deref, p, Loc::default()).unwrap();
    assert!(deref.is_lvalue());
    assert!(!Expr::num(3, Loc::default()).is_lvalue());
  }
}
