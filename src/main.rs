use std::fs::read_to_string;
use std::io::Read;
use std::path::Path;
use std::process::exit;
use std::{env, io};

use thiserror::Error;

use loxparse::parse;
use loxparse::resolver::Resolver;
use loxparse::token::Position;

#[derive(Debug, Error)]
enum CLIError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("file does not seem to exist {0}")]
    FileDoesNotExist(String),
}

/// Prints the syntax tree of a script (or of stdin), one top-level declaration per line.
fn main() -> Result<(), color_eyre::eyre::Error> {
    color_eyre::install()?;

    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        eprintln!("Too many arguments received ({})", args.len());
        eprintln!("Usage: loxparse [script]");
        exit(64);
    }
    let source = match args.get(1) {
        Some(file_path) => read_file(file_path)?,
        None => read_stdin()?,
    };
    if !run(&source) {
        exit(65);
    }
    Ok(())
}

fn read_file(path_string: &str) -> Result<String, CLIError> {
    let path = Path::new(path_string);
    if !path.try_exists()? {
        return Err(CLIError::FileDoesNotExist(path_string.to_string()));
    }
    Ok(read_to_string(path)?)
}

fn read_stdin() -> Result<String, CLIError> {
    let mut source = String::new();
    io::stdin().read_to_string(&mut source)?;
    Ok(source)
}

/// false if anything was reported.
fn run(source: &str) -> bool {
    let program = match parse(source) {
        Ok(program) => program,
        Err(errors) => {
            for error in errors {
                report(error.position(), &format!("{error}"));
            }
            return false;
        }
    };

    if let Err(error) = Resolver::new().resolve_program(&program) {
        eprintln!("{error}");
        return false;
    }

    println!("{program}");
    true
}

fn report(position: Position, message: &str) {
    eprintln!("[line {position}] Error: {message}")
}
