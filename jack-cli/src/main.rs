//! Entrypoint for CLI
mod error;

use std::{
    env,
    error::Error,
    fs,
    path::{Path, PathBuf},
    process,
};

use jack::{constants::*, prelude::*, IMPL_VERSION};
use log::{error, info, warn, LevelFilter};
use simple_logger::SimpleLogger;

use crate::error::{AppError, ErrorKind};

static USAGE: &str = r#"
usage: jackc CMD PATH

commands:
    build   Compile a .jack file, or every .jack file in a directory,
            into .vm files written beside the sources
    tokens  Print the tokens of the target .jack file

examples:
    jackc build Main.jack
    jackc build Pong/
    jackc tokens Main.jack
"#;

fn run_build(path: impl AsRef<Path>) -> Result<(), AppError> {
    let units = find_units(path.as_ref())?;

    if units.is_empty() {
        warn!("no .{SOURCE_EXT} files in {}", path.as_ref().display());
        return Ok(());
    }

    info!("compiling {} unit(s)", units.len());

    let mut failed = 0;
    for unit in &units {
        match compile_unit(unit) {
            Ok(outpath) => info!("{} -> {}", unit.display(), outpath.display()),
            Err(err) => {
                error!("{}: {err}", unit.display());
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(AppError {
            kind: ErrorKind::Failed(failed),
        });
    }

    Ok(())
}

/// Compilation units named by the path, in name order.
fn find_units(path: &Path) -> Result<Vec<PathBuf>, AppError> {
    if path.is_dir() {
        let mut units = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry_path = entry?.path();
            if entry_path.is_file() && is_source_file(&entry_path) {
                units.push(entry_path);
            }
        }
        units.sort();
        Ok(units)
    } else if is_source_file(path) {
        Ok(vec![path.to_path_buf()])
    } else {
        Err(AppError::invalid_path(path))
    }
}

fn is_source_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(SOURCE_EXT)
}

/// Compile one source file, and only write the output file on success.
fn compile_unit(path: &Path) -> Result<PathBuf, AppError> {
    let source_code = fs::read_to_string(path)?;

    let code = jack::compile_str(&source_code).map_err(|err| {
        print_source_error(&source_code, &err);
        err
    })?;

    let outpath = path.with_extension(OUTPUT_EXT);
    fs::write(&outpath, code)?;

    Ok(outpath)
}

/// Print the line that caused the error, with the offending fragment underlined.
fn print_source_error(source_code: &str, err: &JackError) {
    if let Some(span) = err.span() {
        let line_number = span.line_number(source_code);
        let (line, line_span) = span.surrounding_line(source_code);
        let column = (span.index - line_span.index) as usize;
        let underline = "^".repeat(span.size.max(1) as usize);

        eprintln!("{line_number:5} | {}", line.trim_end());
        eprintln!("      | {:column$}{underline}", "");
    }
}

fn run_tokens(filepath: impl AsRef<Path>) -> Result<(), AppError> {
    info!("dumping tokens");

    let source_code = fs::read_to_string(filepath.as_ref())?;
    let mut lexer = Lexer::new(source_code.as_str());

    println!("offset | len | token                | fragment ");
    loop {
        let token = match lexer.next_token() {
            Ok(Some(token)) => token,
            Ok(None) => break,
            Err(err) => {
                print_source_error(&source_code, &err);
                return Err(err.into());
            }
        };

        let offset = token.span.index;
        let len = token.span.size;
        let kind = match token.kind {
            TokenKind::Keyword(keyword) => format!("Keyword({keyword:?})"),
            TokenKind::Symbol(symbol) => format!("Symbol({symbol:?})"),
            TokenKind::Ident => "Ident".to_string(),
            TokenKind::IntConst(_) => "IntConst".to_string(),
            TokenKind::StrConst => "StrConst".to_string(),
        };
        let fragment = token.span.fragment(lexer.source_code());
        println!("{offset:7}:{len: <3} {kind: <22} {fragment}");
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()?;

    let result = match parse_args() {
        Some(Cmd::Build { path }) => run_build(path),
        Some(Cmd::Tokens { filepath }) => run_tokens(filepath),
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            process::exit(64)
        }
    };

    if let Err(err) = result {
        error!("{err}");
        process::exit(1);
    }

    Ok(())
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    match args.next()?.as_str() {
        "build" => Some(Cmd::Build {
            path: consume_arg(args)?,
        }),
        "tokens" => Some(Cmd::Tokens {
            filepath: consume_arg(args)?,
        }),
        _ => None,
    }
}

/// Consumes the next argument, or `None` when it doesn't exist.
fn consume_arg(mut args: impl Iterator<Item = String>) -> Option<String> {
    args.next()
}

fn print_usage() {
    println!("jackc v{IMPL_VERSION}");
    println!("{USAGE}");
}

enum Cmd {
    /// Compile a file or directory
    Build { path: String },
    /// Dump tokens
    Tokens { filepath: String },
}
