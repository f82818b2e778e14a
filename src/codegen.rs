//! Code generation: lower the parsed program into AT&T x86-64 assembly.
//!
//! The emitter is a single-accumulator stack machine: every expression
//! leaves its value in `%rax`, and binary operators spill the right operand
//! to the stack while the left one is computed. Locals live in the frame and
//! are addressed relative to `%rbp`; globals are addressed RIP-relative.
//!
//! The program handed to `generate` has already been checked, so anything
//! unexpected here is a bug in an earlier stage and panics.

use log::{debug, trace};

use crate::ast::{BinaryOp, Expr, ExprKind, Function, Program, Stmt, UnaryOp, Var};

const ARG_REGS: [&str; 6] = ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];

/// Round `n` up to the nearest multiple of `align`.
pub fn align_to(n: i64, align: i64) -> i64 {
  (n + align - 1) / align * align
}

/// Emit assembly for a whole program.
pub fn generate(program: &Program) -> String {
  let mut generator = Generator::default();
  generator.emit_data(program);
  generator.emit_text(program);
  debug!(
    "emitted {} bytes of assembly, {} label(s)",
    generator.asm.len(),
    generator.label_count
  );
  generator.asm
}

#[derive(Default)]
struct Generator {
  asm: String,
  /// Values currently pushed by the operand stack.
  depth: i64,
  /// Shared by every function so labels never collide.
  label_count: usize,
  /// Function whose body is being emitted; names the return label.
  current: String,
}

impl Generator {
  fn emit_data(&mut self, program: &Program) {
    let mut globals = program.globals().peekable();
    if globals.peek().is_none() {
      return;
    }

    self.asm.push_str("    .data\n");
    for global in globals {
      self.asm.push_str(&format!("    .globl {}\n", global.name));
      self.asm.push_str(&format!("{}:\n", global.name));
      self.asm.push_str(&format!("    .zero {}\n", global.ty.size()));
    }
  }

  fn emit_text(&mut self, program: &Program) {
    self.asm.push_str("    .text\n");
    for function in program.functions() {
      self.emit_function(function);
    }
  }

  fn emit_function(&mut self, func: &Function) {
    trace!(
      "function {}: {} param(s), {} byte frame",
      func.name,
      func.arity(),
      func.stack_size
    );
    self.current = func.name.clone();

    self.asm.push_str(&format!("    .globl {}\n", func.name));
    self.asm.push_str(&format!("{}:\n", func.name));

    // Prologue
    self.asm.push_str("    push %rbp\n");
    self.asm.push_str("    mov %rsp, %rbp\n");
    let frame = align_to(func.stack_size, 16);
    if frame > 0 {
      self.asm.push_str(&format!("    sub ${frame}, %rsp\n"));
    }

    for (param, reg) in func.params.iter().zip(ARG_REGS) {
      self
        .asm
        .push_str(&format!("    mov {reg}, {}(%rbp)\n", param.offset));
    }

    self.emit_stmt(&func.body);

    // Epilogue
    self.asm.push_str(&format!(".L.return.{}:\n", func.name));
    self.asm.push_str("    mov %rbp, %rsp\n");
    self.asm.push_str("    pop %rbp\n");
    self.asm.push_str("    ret\n");
  }

  fn next_label(&mut self) -> usize {
    self.label_count += 1;
    self.label_count
  }

  fn push(&mut self) {
    self.asm.push_str("    push %rax\n");
    self.depth += 1;
  }

  fn pop(&mut self, reg: &str) {
    self.asm.push_str(&format!("    pop {reg}\n"));
    self.depth -= 1;
  }

  fn emit_stmt(&mut self, stmt: &Stmt) {
    assert_eq!(self.depth, 0, "internal error: unbalanced stack before statement");

    match stmt {
      Stmt::Expr(expr) => {
        if let Some(expr) = expr {
          self.emit_expr(expr);
        }
      }
      Stmt::Return(value) => {
        if let Some(value) = value {
          self.emit_expr(value);
        }
        self
          .asm
          .push_str(&format!("    jmp .L.return.{}\n", self.current));
      }
      Stmt::Block(stmts) => {
        for stmt in stmts {
          self.emit_stmt(stmt);
        }
      }
      Stmt::If { cond, then, els } => {
        let label = self.next_label();
        self.emit_expr(cond);
        self.asm.push_str("    cmp $0, %rax\n");
        self.asm.push_str(&format!("    je .L.else.{label}\n"));
        self.emit_stmt(then);
        self.asm.push_str(&format!("    jmp .L.end.{label}\n"));
        self.asm.push_str(&format!(".L.else.{label}:\n"));
        if let Some(els) = els {
          self.emit_stmt(els);
        }
        self.asm.push_str(&format!(".L.end.{label}:\n"));
      }
      Stmt::For {
        init,
        cond,
        inc,
        body,
      } => {
        let label = self.next_label();
        if let Some(init) = init {
          self.emit_stmt(init);
        }
        self.asm.push_str(&format!(".L.begin.{label}:\n"));
        if let Some(cond) = cond {
          self.emit_expr(cond);
          self.asm.push_str("    cmp $0, %rax\n");
          self.asm.push_str(&format!("    je .L.end.{label}\n"));
        }
        self.emit_stmt(body);
        if let Some(inc) = inc {
          self.emit_expr(inc);
        }
        self.asm.push_str(&format!("    jmp .L.begin.{label}\n"));
        self.asm.push_str(&format!(".L.end.{label}:\n"));
      }
    }

    assert_eq!(self.depth, 0, "internal error: unbalanced stack after statement");
  }

  /// Compute the address of an lvalue into `%rax`.
  fn emit_addr(&mut self, node: &Expr) {
    match &node.kind {
      ExprKind::Var(Var::Local(local)) => {
        self
          .asm
          .push_str(&format!("    lea {}(%rbp), %rax\n", local.offset));
      }
      ExprKind::Var(Var::Global(global)) => {
        self
          .asm
          .push_str(&format!("    lea {}(%rip), %rax\n", global.name));
      }
      ExprKind::Unary {
        op: UnaryOp::Deref,
        operand,
      } => self.emit_expr(operand),
      _ => panic!("internal error: not an lvalue"),
    }
  }

  /// Load the value at `%rax` unless it is an array, whose address is its value.
  fn load(&mut self, node: &Expr) {
    if node.ty.is_array() {
      return;
    }
    self.asm.push_str("    mov (%rax), %rax\n");
  }

  fn emit_expr(&mut self, node: &Expr) {
    match &node.kind {
      ExprKind::Num(value) => {
        self.asm.push_str(&format!("    mov ${value}, %rax\n"));
      }
      ExprKind::Var(_) => {
        self.emit_addr(node);
        self.load(node);
      }
      ExprKind::Unary { op, operand } => match op {
        UnaryOp::Neg => {
          self.emit_expr(operand);
          self.asm.push_str("    neg %rax\n");
        }
        UnaryOp::Addr => self.emit_addr(operand),
        UnaryOp::Deref => {
          self.emit_expr(operand);
          self.load(node);
        }
      },
      ExprKind::Assign { lhs, rhs } => {
        self.emit_addr(lhs);
        self.push();
        self.emit_expr(rhs);
        self.pop("%rdi");
        self.asm.push_str("    mov %rax, (%rdi)\n");
      }
      ExprKind::Call { name, args } => {
        for arg in args {
          self.emit_expr(arg);
          self.push();
        }
        for reg in ARG_REGS[..args.len()].iter().rev() {
          self.pop(reg);
        }
        // An odd number of pending pushes leaves %rsp 8 bytes off a 16-byte boundary.
        let misaligned = self.depth % 2 == 1;
        if misaligned {
          self.asm.push_str("    sub $8, %rsp\n");
        }
        self.asm.push_str("    mov $0, %rax\n");
        self.asm.push_str(&format!("    call {name}\n"));
        if misaligned {
          self.asm.push_str("    add $8, %rsp\n");
        }
      }
      ExprKind::Binary { op, lhs, rhs } => {
        self.emit_expr(rhs);
        self.push();
        self.emit_expr(lhs);
        self.pop("%rdi");
        self.emit_binary(*op);
      }
    }
  }

  fn emit_binary(&mut self, op: BinaryOp) {
    match op {
      BinaryOp::Add => self.asm.push_str("    add %rdi, %rax\n"),
      BinaryOp::Sub => self.asm.push_str("    sub %rdi, %rax\n"),
      BinaryOp::Mul => self.asm.push_str("    imul %rdi, %rax\n"),
      BinaryOp::Div => {
        self.asm.push_str("    cqo\n");
        self.asm.push_str("    idiv %rdi\n");
      }
      BinaryOp::Eq => self.emit_compare("sete"),
      BinaryOp::Ne => self.emit_compare("setne"),
      BinaryOp::Lt => self.emit_compare("setl"),
      BinaryOp::Le => self.emit_compare("setle"),
    }
  }

  fn emit_compare(&mut self, set: &str) {
    self.asm.push_str("    cmp %rdi, %rax\n");
    self.asm.push_str(&format!("    {set} %al\n"));
    self.asm.push_str("    movzbl %al, %eax\n");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::diagnostics::Diagnostics;
  use crate::parser::parse;
  use crate::tokenizer::tokenize;

  fn compile(src: &str) -> String {
    let mut diagnostics = Diagnostics::new();
    let tokens = tokenize(src, &mut diagnostics);
    let program = parse(tokens, &mut diagnostics);
    assert!(!diagnostics.has_errors(), "{diagnostics:?}");
    generate(&program)
  }

  fn lines(asm: &str) -> Vec<&str> {
    asm.lines().map(str::trim).collect()
  }

  #[test]
  fn align_to_rounds_up_to_multiples() {
    assert_eq!(align_to(11, 16), 16);
    assert_eq!(align_to(32, 16), 32);
    assert_eq!(align_to(0, 16), 0);
    assert_eq!(align_to(11, 8), 16);
    for n in [0, 16, 48, 160] {
      assert_eq!(align_to(n, 16), n);
      assert_eq!(align_to(align_to(n + 5, 16), 16), align_to(n + 5, 16));
    }
  }

  #[test]
  fn emits_prologue_and_epilogue() {
    let asm = compile("int main() { return 42; }");
    assert_eq!(
      lines(&asm),
      vec![
        ".text",
        ".globl main",
        "main:",
        "push %rbp",
        "mov %rsp, %rbp",
        "mov $42, %rax",
        "jmp .L.return.main",
        ".L.return.main:",
        "mov %rbp, %rsp",
        "pop %rbp",
        "ret",
      ]
    );
  }

  #[test]
  fn evaluates_right_operand_first() {
    let asm = compile("int main() { return 1+2*3; }");
    let body: Vec<_> = lines(&asm)
      .into_iter()
      .skip_while(|l| *l != "mov %rsp, %rbp")
      .skip(1)
      .take_while(|l| !l.starts_with("jmp"))
      .collect();
    assert_eq!(
      body,
      vec![
        "mov $3, %rax",
        "push %rax",
        "mov $2, %rax",
        "pop %rdi",
        "imul %rdi, %rax",
        "push %rax",
        "mov $1, %rax",
        "pop %rdi",
        "add %rdi, %rax",
      ]
    );
  }

  #[test]
  fn frame_is_aligned_and_params_are_spilled() {
    let asm = compile("int f(int a, int b, int c) { return a; }");
    let lines = lines(&asm);
    assert!(lines.contains(&"sub $32, %rsp"));
    assert!(lines.contains(&"mov %rdi, -8(%rbp)"));
    assert!(lines.contains(&"mov %rsi, -16(%rbp)"));
    assert!(lines.contains(&"mov %rdx, -24(%rbp)"));
  }

  #[test]
  fn pointer_step_is_scaled_by_eight() {
    let asm = compile("int main() { int *p; int x; p = &x; return *(p+1); }");
    let lines = lines(&asm);
    let scale = lines.iter().position(|l| *l == "mov $8, %rax").expect("scale");
    assert_eq!(lines[scale + 1], "push %rax");
    assert_eq!(lines[scale + 2], "mov $1, %rax");
    assert_eq!(lines[scale + 4], "imul %rdi, %rax");
  }

  #[test]
  fn arrays_are_not_loaded() {
    let asm = compile("int main() { int a[2]; return a; }");
    let lines = lines(&asm);
    assert!(lines.contains(&"lea -16(%rbp), %rax"));
    assert!(!lines.contains(&"mov (%rax), %rax"));
  }

  #[test]
  fn labels_are_unique_across_functions() {
    let asm = compile(
      "int f() { if (1) return 1; return 0; }\nint main() { if (1) return 1; while (0) 1; return 0; }",
    );
    let lines = lines(&asm);
    assert!(lines.contains(&".L.else.1:"));
    assert!(lines.contains(&".L.else.2:"));
    assert!(lines.contains(&".L.begin.3:"));
    assert_eq!(lines.iter().filter(|l| **l == ".L.end.1:").count(), 1);
  }

  #[test]
  fn call_arguments_land_in_positional_registers() {
    let asm = compile("int add(int a, int b) { return a + b; }\nint main() { return add(1, 2); }");
    let lines = lines(&asm);
    let call = lines.iter().position(|l| *l == "call add").expect("call");
    assert_eq!(
      &lines[call - 7..=call],
      &[
        "mov $1, %rax",
        "push %rax",
        "mov $2, %rax",
        "push %rax",
        "pop %rsi",
        "pop %rdi",
        "mov $0, %rax",
        "call add",
      ]
    );
  }

  #[test]
  fn call_under_pending_push_realigns_stack() {
    let asm = compile("int foo() { return 1; }\nint main() { return foo() + 1; }");
    let lines = lines(&asm);
    let call = lines.iter().position(|l| *l == "call foo").expect("call");
    assert_eq!(
      &lines[call - 4..=call + 2],
      &[
        "mov $1, %rax",
        "push %rax",
        "sub $8, %rsp",
        "mov $0, %rax",
        "call foo",
        "add $8, %rsp",
        "pop %rdi",
      ]
    );
  }

  #[test]
  fn globals_live_in_data_and_use_rip_addressing() {
    let asm = compile("int g, arr[3];\nint main() { g = 5; return g; }");
    let lines = lines(&asm);
    assert_eq!(&lines[..7], &[".data", ".globl g", "g:", ".zero 8", ".globl arr", "arr:", ".zero 24"]);
    assert!(lines.contains(&"lea g(%rip), %rax"));
  }

  #[test]
  fn comparisons_materialise_zero_or_one() {
    let asm = compile("int main() { return 2 >= 1; }");
    let lines = lines(&asm);
    let cmp = lines.iter().position(|l| *l == "cmp %rdi, %rax").expect("cmp");
    assert_eq!(lines[cmp + 1], "setle %al");
    assert_eq!(lines[cmp + 2], "movzbl %al, %eax");
  }
}
