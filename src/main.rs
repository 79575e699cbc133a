use colored::Colorize;
use pythowon::bytecode;
use pythowon::pipeline::CompilationPipeline;
use pythowon::reporter::CliReporter;
use rustyline::Editor;
use std::{env, fs, path::PathBuf, process};

const HELP_MSG: &str = "Usage: pythowon [options] [file]

Options:
  -r, --run <file>      Run a PythOwOn source or compiled file
  -c, --compile <file>  Compile a PythOwOn file into bytecode
  -o, --output <file>   Output file for compiled bytecode
  -i, --interpret       Start PythOwOn in interactive mode
  -h, --help            Print usage
  -v, --version         Display the version of PythOwOn
";

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Run,
    Compile,
    Repl,
}

enum Action {
    Run(PathBuf),
    Compile { input: PathBuf, output: PathBuf },
    Repl,
    Help,
    Version,
}

fn parse_args() -> Result<Action, String> {
    let mut args = env::args().skip(1);
    let mut mode = None;
    let mut file = None;
    let mut output = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Action::Help),
            "-v" | "--version" => return Ok(Action::Version),
            "-i" | "--interpret" => mode = Some(Mode::Repl),
            "-r" | "--run" => {
                mode = Some(Mode::Run);
                if let Some(path) = args.next() {
                    file = Some(PathBuf::from(path));
                }
            }
            "-c" | "--compile" => {
                mode = Some(Mode::Compile);
                if let Some(path) = args.next() {
                    file = Some(PathBuf::from(path));
                }
            }
            "-o" | "--output" => match args.next() {
                Some(path) => output = Some(PathBuf::from(path)),
                None => return Err("Expected a path after '--output'.".to_string()),
            },
            setting if setting.starts_with('-') => {
                return Err(format!("Unknown option '{setting}'."));
            }
            path => {
                if file.is_some() {
                    return Err(format!("Unexpected extra argument '{path}'."));
                }
                file = Some(PathBuf::from(path));
            }
        }
    }

    match mode {
        Some(Mode::Repl) => Ok(Action::Repl),
        Some(Mode::Run) => match file {
            Some(path) => Ok(Action::Run(path)),
            None => Err("You must provide a file to run.".to_string()),
        },
        Some(Mode::Compile) => match (file, output) {
            (Some(input), Some(output)) => Ok(Action::Compile { input, output }),
            (None, _) => Err("You must provide a file to compile.".to_string()),
            (_, None) => Err("You must provide an output file.".to_string()),
        },
        // a bare file argument runs it; nothing at all prints usage
        None => match file {
            Some(path) => Ok(Action::Run(path)),
            None => Ok(Action::Help),
        },
    }
}

fn main() {
    process::exit(run_cli());
}

fn run_cli() -> i32 {
    match parse_args() {
        Ok(Action::Help) => {
            println!("{HELP_MSG}");
            exitcode::OK
        }
        Ok(Action::Version) => {
            println!("PythOwOn {}", env!("CARGO_PKG_VERSION"));
            exitcode::OK
        }
        Ok(Action::Repl) => repl(),
        Ok(Action::Run(path)) => run_file(&path),
        Ok(Action::Compile { input, output }) => compile_file(&input, &output),
        Err(message) => {
            eprintln!("{}", message.bright_red());
            eprintln!("Use '--help' to see the available options.");
            1
        }
    }
}

fn run_file(path: &PathBuf) -> i32 {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(_) => {
            eprintln!(
                "{}",
                format!("Could not open file \"{}\".", path.display()).bright_red()
            );
            return exitcode::IOERR;
        }
    };

    if bytes.starts_with(bytecode::MAGIC) {
        return run_compiled_file(path, &bytes);
    }

    let source = match String::from_utf8(bytes) {
        Ok(source) => source,
        Err(_) => {
            eprintln!(
                "{}",
                format!("File \"{}\" is not valid UTF-8.", path.display()).bright_red()
            );
            return exitcode::IOERR;
        }
    };

    let mut pipeline = CompilationPipeline::new();
    let mut reporter = CliReporter::new();
    pipeline.interpret(&source, &mut reporter).exit_code()
}

fn run_compiled_file(path: &PathBuf, bytes: &[u8]) -> i32 {
    let mut pipeline = CompilationPipeline::new();
    let chunk = match bytecode::read_chunk(bytes, pipeline.heap_mut()) {
        Ok(chunk) => chunk,
        Err(_) => {
            eprintln!(
                "{}",
                format!(
                    "File \"{}\" is not a valid PythOwOn compiled file.",
                    path.display()
                )
                .bright_red()
            );
            return exitcode::IOERR;
        }
    };

    let mut reporter = CliReporter::new();
    pipeline.run_compiled(&chunk, &mut reporter).exit_code()
}

fn compile_file(input: &PathBuf, output: &PathBuf) -> i32 {
    let source = match fs::read_to_string(input) {
        Ok(source) => source,
        Err(_) => {
            eprintln!(
                "{}",
                format!("Could not open file \"{}\".", input.display()).bright_red()
            );
            return exitcode::IOERR;
        }
    };

    let mut pipeline = CompilationPipeline::new();
    let mut reporter = CliReporter::new();
    let (result, chunk) = pipeline.compile(&source, &mut reporter);
    if result.is_error() {
        return result.exit_code();
    }

    let mut out = match fs::File::create(output) {
        Ok(file) => file,
        Err(_) => {
            eprintln!(
                "{}",
                format!("Could not open file \"{}\".", output.display()).bright_red()
            );
            return exitcode::IOERR;
        }
    };

    match bytecode::write_chunk(&chunk, pipeline.heap(), &mut out) {
        Ok(()) => exitcode::OK,
        Err(err) => {
            eprintln!(
                "{}",
                format!("Could not write \"{}\": {err}", output.display()).bright_red()
            );
            exitcode::IOERR
        }
    }
}

/// A line with unbalanced brackets or an open triple-quoted string keeps
/// the REPL reading continuation lines.
fn is_incomplete(line: &str) -> bool {
    let bytes = line.as_bytes();

    let mut open_triple = false;
    let mut i = 0;
    while bytes.len() >= 3 && i <= bytes.len() - 3 {
        if bytes[i] == b'"' && bytes[i + 1] == b'"' && bytes[i + 2] == b'"' {
            open_triple = !open_triple;
            i += 3;
        } else {
            i += 1;
        }
    }
    if open_triple {
        return true;
    }

    let mut brackets = 0i32;
    let mut parens = 0i32;
    let mut braces = 0i32;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'#' => break,
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'[' => brackets += 1,
            b']' => brackets -= 1,
            b'(' => parens += 1,
            b')' => parens -= 1,
            b'{' => braces += 1,
            b'}' => braces -= 1,
            _ => {}
        }
        i += 1;
    }

    brackets > 0 || parens > 0 || braces > 0
}

fn repl() -> i32 {
    let mut rl = Editor::<()>::new();
    let mut pipeline = CompilationPipeline::new();
    let mut reporter = CliReporter::new();

    loop {
        match rl.readline("PythOwOn <<< ") {
            Ok(mut line) => {
                while is_incomplete(&line) {
                    match rl.readline("         ... ") {
                        Ok(next) => {
                            line.push('\n');
                            line += &next;
                        }
                        Err(_) => break,
                    }
                }
                if line.trim().is_empty() {
                    continue;
                }
                rl.add_history_entry(line.as_str());
                pipeline.interpret(&line, &mut reporter);
            }
            Err(_) => break,
        }
    }

    exitcode::OK
}
