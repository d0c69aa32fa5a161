use std::process::ExitCode;

use anyhow::{bail, Context};
use axc::print::{render_error, render_theorem};
use axc::scope::Symbol;
use axc::Project;

const USAGE: &str = "\
Usage: axc [OPTIONS] <FILE>...

Compiles the files in the given order. Each file sees the declarations of the files before it.

Options:
      --trace      Print the proof trace of every theorem
  -h, --help       Print help
  -v, --version    Print version
";

struct Options {
    trace: bool,
    files: Vec<String>,
}

enum Action {
    Help,
    Version,
    Run(Options),
}

fn parse_args(args: impl Iterator<Item = String>) -> anyhow::Result<Action> {
    let mut options = Options {
        trace: false,
        files: vec![],
    };
    for arg in args {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Action::Help),
            "-v" | "--version" => return Ok(Action::Version),
            "--trace" => options.trace = true,
            flag if flag.starts_with('-') => bail!("unknown option `{flag}`\n\n{USAGE}"),
            _ => options.files.push(arg),
        }
    }
    if options.files.is_empty() {
        bail!("no input files\n\n{USAGE}");
    }
    Ok(Action::Run(options))
}

/// Returns whether every file compiled without diagnostics.
fn run(options: Options) -> anyhow::Result<bool> {
    let mut sources = Vec::with_capacity(options.files.len());
    for path in &options.files {
        let source =
            std::fs::read_to_string(path).with_context(|| format!("failed to read `{path}`"))?;
        sources.push(source);
    }

    let mut project = Project::new();
    project.set_dependency_order(options.files.iter().cloned());
    let mut clean = true;
    for (path, source) in options.files.iter().zip(sources) {
        let unit = project.compile_source(path, source);
        for err in &unit.parse_errors {
            eprintln!("{err}");
        }
        for err in &unit.errors {
            eprintln!("{}", render_error(err));
        }
        clean &= unit.is_clean();
        if options.trace {
            for symbol in unit.table.symbols() {
                if let Symbol::Thm(thm) = symbol {
                    println!("{}\n", render_theorem(thm));
                }
            }
        }
    }
    Ok(clean)
}

fn main() -> ExitCode {
    env_logger::init();

    let action = match parse_args(std::env::args().skip(1)) {
        Ok(action) => action,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };
    match action {
        Action::Help => {
            print!("{USAGE}");
            ExitCode::SUCCESS
        }
        Action::Version => {
            println!("axc {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Action::Run(options) => match run(options) {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::FAILURE,
            Err(err) => {
                eprintln!("Error: {err:?}");
                ExitCode::FAILURE
            }
        },
    }
}
