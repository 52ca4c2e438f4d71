//! Command-line surface (spec §D): `noxy <file>` runs a script once;
//! `noxy` with no file starts a line-buffered REPL over stdin.
//!
//! Grounded on the teacher's `run_cli` in
//! `examples/Brahmastra-Labs-logicaffeine/src/cli.rs` — a `clap::Parser`
//! struct dispatched from a single free function, with each mode split into
//! its own helper. The teacher's surface is a package-manager subcommand
//! tree (`new`/`build`/`publish`/...); Noxy has no project manifest or
//! registry, so this collapses to the two modes a script interpreter
//! actually needs.

use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use crate::ast::Program;
use crate::error::NoxyError;
use crate::lexer::Lexer;
use crate::parser::{parse_program, ParseError};
use crate::project::{source_for_report, Loader};

#[derive(Parser)]
#[command(name = "noxy")]
#[command(about = "Tree-walking interpreter for the Noxy programming language", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Script to run. Omitted to start a REPL reading from stdin.
    pub file: Option<PathBuf>,

    /// Dump tokens and the parsed AST to stderr before evaluating.
    #[arg(long)]
    pub debug: bool,

    /// Skip the static analyzer; type errors surface as runtime errors
    /// instead. Applies to the entry script only — imported modules are
    /// always checked (spec §4.5 "module idempotence" already requires
    /// each module to fully resolve before its declarations are shared).
    #[arg(long)]
    pub no_typecheck: bool,
}

/// Entry point called by `main`.
pub fn run_cli() -> ExitCode {
    let cli = Cli::parse();
    match &cli.file {
        Some(path) => run_file(&cli, path),
        None => run_repl(&cli),
    }
}

fn run_file(cli: &Cli, path: &PathBuf) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: failed to read '{}': {e}", path.display());
            return ExitCode::FAILURE;
        }
    };

    let program = match parse_program(&source) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", NoxyError::from(e).report(&source));
            return ExitCode::FAILURE;
        }
    };

    if cli.debug {
        debug_dump(&source, &program);
    }

    let root = path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    let mut loader = Loader::new(root);
    let result = loader.run_entry(&program, !cli.no_typecheck);

    for line in &loader.output {
        println!("{line}");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let report_source = source_for_report(&loader, path, &source);
            eprintln!("{}", e.report(report_source));
            ExitCode::FAILURE
        }
    }
}

/// True when a parse failed solely because the input ran out of tokens
/// mid-construct (e.g. an unclosed `func ... end`), rather than because the
/// input actually contains a syntax error — the REPL keeps reading lines in
/// the former case and reports the latter immediately.
fn is_incomplete(err: &ParseError) -> bool {
    err.message.ends_with("'Eof'")
}

fn run_repl(cli: &Cli) -> ExitCode {
    let stdin = io::stdin();
    let mut loader = Loader::new(PathBuf::from("."));
    let mut buffer = String::new();
    let mut printed = 0usize;

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if !buffer.is_empty() {
            buffer.push('\n');
        }
        buffer.push_str(&line);

        let program = match parse_program(&buffer) {
            Ok(p) => p,
            Err(e) if is_incomplete(&e) => continue,
            Err(e) => {
                eprintln!("{}", NoxyError::from(e).report(&buffer));
                buffer.clear();
                continue;
            }
        };
        let chunk_source = std::mem::take(&mut buffer);

        if cli.debug {
            debug_dump(&chunk_source, &program);
        }

        if let Err(e) = loader.run_entry(&program, !cli.no_typecheck) {
            for l in &loader.output[printed..] {
                println!("{l}");
            }
            printed = loader.output.len();
            eprintln!("{}", e.report(&chunk_source));
            continue;
        }

        for l in &loader.output[printed..] {
            println!("{l}");
        }
        printed = loader.output.len();
    }

    ExitCode::SUCCESS
}

fn debug_dump(source: &str, program: &Program) {
    match Lexer::new(source).tokenize() {
        Ok(tokens) => eprintln!("-- tokens --\n{tokens:#?}"),
        Err(e) => eprintln!("-- tokens --\n<lex error: {}>", e.message),
    }
    eprintln!("-- ast --\n{program:#?}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_detects_truncated_block() {
        let err = parse_program("func f(a:int) -> int\nreturn a").unwrap_err();
        assert!(is_incomplete(&err));
    }

    #[test]
    fn incomplete_is_false_for_a_genuine_syntax_error() {
        let err = parse_program("let x int = 1").unwrap_err();
        assert!(!is_incomplete(&err));
    }
}
