use std::env;
use std::io::{self, IsTerminal};
use std::process;

/// Exit status for a malformed command line (`EX_USAGE`).
const EXIT_USAGE: i32 = 64;

fn main() {
  env_logger::init();

  let args: Vec<String> = env::args().collect();
  if args.len() != 2 {
    let program = args.first().map(String::as_str).unwrap_or("minic");
    eprintln!("{program}: invalid number of arguments");
    eprintln!("usage: {program} <source>");
    process::exit(EXIT_USAGE);
  }

  let source = &args[1];
  let compilation = minic::compile(source);

  let color = io::stderr().is_terminal() && env::var_os("NO_COLOR").is_none();
  eprint!("{}", compilation.diagnostics.render(source, color));

  match compilation.assembly {
    Some(asm) => print!("{asm}"),
    None => process::exit(compilation.exit_code()),
  }
}
