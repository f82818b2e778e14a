use minic::{CompileError, IssueKind, compile, generate_assembly};

fn errors(src: &str) -> Vec<(usize, usize, String)> {
  compile(src)
    .diagnostics
    .iter()
    .filter(|d| d.is_fatal())
    .map(|d| (d.loc.row, d.loc.col, d.message.clone()))
    .collect()
}

#[test]
fn simple_program_compiles() {
  let compilation = compile("int main() { return 1+2*3; }");
  assert!(compilation.succeeded());
  assert_eq!(compilation.exit_code(), 0);
  assert!(compilation.diagnostics.is_empty());
  let asm = compilation.assembly.unwrap();
  assert!(asm.contains(".globl main\nmain:\n"));
  assert!(asm.contains("imul %rdi, %rax"));
}

#[test]
fn undeclared_variable_blocks_codegen() {
  let compilation = compile("int main(){ return x; }");
  assert!(compilation.assembly.is_none());
  assert_eq!(compilation.exit_code(), 1);
  assert_eq!(errors("int main(){ return x; }"), vec![(1, 20, "x undeclared".to_string())]);
}

#[test]
fn lexical_errors_stop_before_parsing() {
  let compilation = compile("int main() { return 1 @ 2 # ; }");
  assert_eq!(compilation.exit_code(), 1);
  let kinds: Vec<_> = compilation.diagnostics.iter().map(|d| d.kind).collect();
  assert_eq!(kinds, vec![IssueKind::Lexical, IssueKind::Lexical]);
}

#[test]
fn implicit_declaration_still_emits_the_call() {
  let compilation = compile("int main() { return foo(); }");
  assert_eq!(compilation.exit_code(), 0);
  assert_eq!(compilation.diagnostics.warning_count(), 1);
  let warning = compilation.diagnostics.iter().next().unwrap();
  assert_eq!(warning.kind, IssueKind::Warning);
  assert_eq!(warning.message, "implicit declaration of function 'foo'");
  assert!(compilation.assembly.unwrap().contains("call foo"));
}

#[test]
fn wrong_arity_is_fatal() {
  let two = "int add(int a, int b) { return a + b; }\n";
  for call in ["add(1)", "add(1, 2, 3)"] {
    let src = format!("{two}int main() {{ return {call}; }}");
    let compilation = compile(&src);
    assert!(compilation.assembly.is_none(), "{call} should not compile");
    assert_eq!(compilation.diagnostics.error_count(), 1);
  }
}

#[test]
fn aborted_error_counts_fatal_diagnostics() {
  let err = generate_assembly("int main() { a = 1; return b; }").unwrap_err();
  assert!(matches!(err, CompileError::Aborted { errors: 2 }));
  assert_eq!(err.to_string(), "compilation aborted with 2 error(s)");
}

#[test]
fn identical_ifs_get_distinct_labels() {
  let asm = generate_assembly("int main() { if (1) 2; if (1) 2; return 0; }").unwrap();
  assert!(asm.contains(".L.else.1:"));
  assert!(asm.contains(".L.else.2:"));
  assert_eq!(asm.matches(".L.end.1:").count(), 1);
  assert_eq!(asm.matches(".L.end.2:").count(), 1);
}

#[test]
fn every_push_has_a_matching_pop() {
  let src = "int g;
int sum(int *a, int n) { int s = 0; for (int i = 0; i < n; i = i + 1) s = s + a[i]; return s; }
int main() {
  int a[4];
  int *p = a;
  *p = 1; *(p + 1) = 2; a[2] = 3; a[3] = g = 4;
  while (a[0] > 10) a[0] = a[0] - 1;
  if (sum(a, 4) == 10) return &a[3] - &a[0]; else return -1;
}";
  let asm = generate_assembly(src).unwrap();
  let pushes = asm.lines().filter(|l| l.trim() == "push %rax").count();
  let pops = asm
    .lines()
    .filter(|l| l.trim_start().starts_with("pop ") && l.trim() != "pop %rbp")
    .count();
  assert_eq!(pushes, pops);
}

#[test]
fn diagnostics_render_with_source_line_and_caret() {
  let src = "int main() {\n  return x;\n}";
  let rendered = compile(src).diagnostics.render(src, false);
  assert_eq!(rendered, "2:10: error: x undeclared\n      return x;\n             ^\n");
}

#[test]
fn many_errors_are_reported_in_one_run() {
  let src = "int f(int a) { return a }\nint main() {\n  int x;\n  y = 1;\n  x = *x;\n  return f(x, x);\n}";
  let found: Vec<_> = errors(src).into_iter().map(|(row, _, message)| (row, message)).collect();
  assert_eq!(
    found,
    vec![
      (1, "expected \";\", but got \"}\"".to_string()),
      (4, "y undeclared".to_string()),
      (5, "invalid pointer dereference".to_string()),
      (6, "too many arguments to function 'f'".to_string()),
    ]
  );
}
