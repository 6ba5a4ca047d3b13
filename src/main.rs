//! cylang Compiler
//!
//! Command-line front end: reads a script, compiles it and writes the
//! artifact or the diagnostics.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::debug;

use cylang::config::DEFAULT_MAX_DEPTH;
use cylang::feedback::CompilationStats;
use cylang::{CompileOptions, Diagnostic, EmitMode, Report, Validation};

/// cylang Compiler
#[derive(Parser, Debug)]
#[command(name = "cylc")]
#[command(version)]
#[command(about = "cylang compiler - validates cylang scripts and emits compact or pretty output")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input source file; `-` or nothing reads stdin
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    #[command(flatten)]
    mode: ModeArgs,
}

#[derive(Args, Debug)]
struct ModeArgs {
    /// Treat strict-mode findings as errors
    #[arg(long, global = true)]
    strict: bool,

    /// Pretty-print the output
    #[arg(long, global = true)]
    pretty: bool,

    /// Print a JSON report on stdout; the artifact is only written with -o
    #[arg(long, global = true)]
    json: bool,

    /// Maximum nesting depth (0 disables the limit)
    #[arg(long, value_name = "N", global = true)]
    max_depth: Option<usize>,
}

impl ModeArgs {
    fn options(&self) -> CompileOptions {
        CompileOptions {
            validation: if self.strict { Validation::Strict } else { Validation::Standard },
            emit: if self.pretty { EmitMode::Pretty } else { EmitMode::Compact },
            max_depth: match self.max_depth {
                Some(0) => None,
                Some(n) => Some(n),
                None => Some(DEFAULT_MAX_DEPTH),
            },
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a source file
    Build {
        /// Input source file
        input: Option<PathBuf>,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a source file for errors
    Check {
        /// Input source file
        input: Option<PathBuf>,
    },
    /// Print version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            eprintln!("error: {:#}", err);
            process::exit(1);
        }
    }
}

/// Returns whether the command succeeded
fn run(cli: Cli) -> Result<bool> {
    let options = cli.mode.options();
    debug!("options: {:?}", options);

    match cli.command {
        Some(Commands::Build { input, output }) => {
            let output = output.or(cli.output);
            build(input.as_deref(), output.as_deref(), &options, cli.mode.json)
        }
        Some(Commands::Check { input }) => check_file(input.as_deref(), &options, cli.mode.json),
        Some(Commands::Version) => {
            println!("cylc {}", env!("CARGO_PKG_VERSION"));
            println!("cylang compiler");
            println!("License: Apache-2.0");
            Ok(true)
        }
        None => build(cli.input.as_deref(), cli.output.as_deref(), &options, cli.mode.json),
    }
}

/// Compile a source file (or stdin)
fn build(input: Option<&Path>, output: Option<&Path>, options: &CompileOptions, json: bool) -> Result<bool> {
    let source = read_source(input)?;
    let mut stats = CompilationStats {
        source_lines: source.lines().count(),
        output_bytes: 0,
    };

    let artifact = match cylang::compile_with(&source, options) {
        Ok(artifact) => artifact,
        Err(diag) => {
            report_failure(diag, stats, json);
            return Ok(false);
        }
    };
    stats.output_bytes = artifact.code.len();

    if let Some(path) = output {
        fs::write(path, &artifact.code)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    if json {
        println!("{}", Report::success(artifact.warnings, stats).to_json());
        return Ok(true);
    }

    print_diagnostics(&artifact.warnings);
    if output.is_none() {
        let mut stdout = io::stdout().lock();
        stdout
            .write_all(artifact.code.as_bytes())
            .context("failed to write to stdout")?;
        if options.emit == EmitMode::Compact && !artifact.code.is_empty() {
            writeln!(stdout).context("failed to write to stdout")?;
        }
    }
    Ok(true)
}

/// Check a source file for errors without emitting code
fn check_file(input: Option<&Path>, options: &CompileOptions, json: bool) -> Result<bool> {
    let source = read_source(input)?;
    let stats = CompilationStats {
        source_lines: source.lines().count(),
        output_bytes: 0,
    };

    match cylang::check(&source, options) {
        Ok(warnings) => {
            if json {
                println!("{}", Report::success(warnings, stats).to_json());
            } else {
                print_diagnostics(&warnings);
                println!("No errors found ({} warnings)", warnings.len());
            }
            Ok(true)
        }
        Err(diag) => {
            report_failure(diag, stats, json);
            Ok(false)
        }
    }
}

fn read_source(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .context("failed to read stdin")?;
            Ok(source)
        }
    }
}

fn report_failure(diag: Diagnostic, stats: CompilationStats, json: bool) {
    if json {
        println!("{}", Report::failure(diag, stats).to_json());
    } else {
        print_diagnostics(std::slice::from_ref(&diag));
    }
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diag in diagnostics {
        let label = if diag.is_error() { "error" } else { "warning" };
        eprintln!("{}: {}", label, diag);
        if let Some(hint) = &diag.hint {
            eprintln!("  hint: {}", hint);
        }
    }
}
