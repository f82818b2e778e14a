//! Data types of the language.
//!
//! `int` is uniformly eight bytes wide. Arrays behave as pointers to their
//! element type for arithmetic, comparison and argument passing, but keep
//! their full size for storage.

use std::fmt;

#[derive(Debug, Clone, Eq)]
pub enum Type {
  Int,
  Ptr(Box<Type>),
  Array { base: Box<Type>, len: i64 },
  Func { ret: Box<Type> },
}

impl Type {
  pub fn pointer_to(base: Type) -> Self {
    Self::Ptr(Box::new(base))
  }

  pub fn array_of(base: Type, len: i64) -> Self {
    Self::Array {
      base: Box::new(base),
      len,
    }
  }

  pub fn func(ret: Type) -> Self {
    Self::Func { ret: Box::new(ret) }
  }

  /// Pointers and arrays both qualify.
  pub fn is_pointer(&self) -> bool {
    matches!(self, Type::Ptr(_) | Type::Array { .. })
  }

  pub fn is_array(&self) -> bool {
    matches!(self, Type::Array { .. })
  }

  /// Pointee of a pointer or element of an array.
  pub fn base(&self) -> Option<&Type> {
    match self {
      Type::Ptr(base) | Type::Array { base, .. } => Some(&**base),
      Type::Int | Type::Func { .. } => None,
    }
  }

  /// `T[n]` becomes `T*`; everything else is unchanged.
  pub fn decay(&self) -> Type {
    match self {
      Type::Array { base, .. } => Type::Ptr(base.clone()),
      other => other.clone(),
    }
  }

  pub fn size(&self) -> i64 {
    match self {
      Type::Int => 8,
      Type::Ptr(_) => 8,
      Type::Array { base, len } => base.size() * len,
      Type::Func { .. } => 0,
    }
  }
}

impl PartialEq for Type {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Type::Int, Type::Int) => true,
      (Type::Func { .. }, Type::Func { .. }) => true,
      (a, b) if a.is_pointer() && b.is_pointer() => a.base() == b.base(),
      _ => false,
    }
  }
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Type::Int => write!(f, "int"),
      Type::Ptr(base) => write!(f, "{base}*"),
      Type::Array { base, len } => write!(f, "{base}[{len}]"),
      Type::Func { ret } => write!(f, "{ret}()"),
    }
  }
}
