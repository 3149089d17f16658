use std::fs;
use std::io::{self, ErrorKind};
use std::path::PathBuf;
use std::process;

use clap::Parser;

use emulator::program::Program;
use emulator::vm::{Error, Vm};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Arguments {
  /// Path to the program file to execute
  program_file: PathBuf,
}

fn main() {
  env_logger::init();

  let args = match Arguments::try_parse() {
    Ok(args) => args,
    Err(err) => {
      let _ = err.print();
      process::exit(if err.use_stderr() { 1 } else { 0 });
    }
  };

  let source = match fs::read_to_string(&args.program_file) {
    Ok(source) => source,
    Err(err) if err.kind() == ErrorKind::NotFound => {
      eprintln!("file not found: {}", args.program_file.display());
      process::exit(2);
    }
    Err(err) => {
      eprintln!("failed to read {}: {err}", args.program_file.display());
      process::exit(2);
    }
  };

  let program: Program = match source.parse() {
    Ok(program) => program,
    Err(err) => {
      eprintln!("{}: {err}", args.program_file.display());
      process::exit(1);
    }
  };

  let mut vm = Vm::new();
  if let Err(err) = vm.load(&program) {
    eprintln!("{err}");
    process::exit(1);
  }

  let mut stdout = io::stdout().lock();
  if let Err(err) = vm.run(&mut stdout) {
    eprintln!("{err}");
    if matches!(err, Error::InvalidInstruction { .. }) {
      eprintln!("{}", vm.trace());
    }
    process::exit(1);
  }
}
