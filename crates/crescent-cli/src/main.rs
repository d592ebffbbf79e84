use std::{env, process::ExitCode};

use crescent::{compile_file, dump_file};

const USAGE: &str = "Usage: crescent <input_path> [output_path] [--dump-ast]";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut dump_ast = false;
    let mut paths: Vec<&str> = Vec::new();
    for arg in &args {
        if arg == "--dump-ast" {
            dump_ast = true;
        } else if arg.starts_with("--") {
            eprintln!("unknown option {arg}\n{USAGE}");
            return ExitCode::FAILURE;
        } else {
            paths.push(arg.as_str());
        }
    }

    let (input_path, output_path) = match paths.as_slice() {
        [input] => (*input, "out.jsfx"),
        [input, output] => (*input, *output),
        _ => {
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    if dump_ast {
        return match dump_file(input_path) {
            Ok(dump) => {
                print!("{dump}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("ERROR: {err}");
                ExitCode::FAILURE
            }
        };
    }

    match compile_file(input_path, output_path) {
        Ok(()) => {
            println!("fully compiled to output file");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("ERROR: {err}");
            ExitCode::FAILURE
        }
    }
}
