use std::fs::File;
use std::io::{self, prelude::*, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use gif2bmp::{convert, Diagnostics};
use log::info;

/// Simple GIF to BMP conversion tool
#[derive(Parser, Debug)]
#[command(name = "gif2bmp", disable_help_flag = true)]
struct Cli {
    /// Use FILE as input instead of standard input
    #[arg(short = 'i', value_name = "FILE")]
    input: Option<PathBuf>,

    /// Use FILE as output instead of standard output
    #[arg(short = 'o', value_name = "FILE", conflicts_with = "extract")]
    output: Option<PathBuf>,

    /// Write conversion statistics to FILE
    #[arg(short = 'l', value_name = "FILE")]
    log: Option<PathBuf>,

    /// Extract every image to 0001.bmp, 0002.bmp, ... in the current directory
    #[arg(short = 'e')]
    extract: bool,

    /// Print this help
    #[arg(short = 'h')]
    help: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if cli.help {
        if let Err(err) = Cli::command().print_help() {
            eprintln!("error: failed to print help: {err}");
        }
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut input: Box<dyn Read> = match &cli.input {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(io::stdin().lock()),
    };

    let mut diagnostics = Diagnostics::new();
    let stats = if cli.extract {
        convert::extract_all(&mut input, Path::new("."), &mut diagnostics)?
    } else {
        let mut output: Box<dyn Write> = match &cli.output {
            Some(path) => {
                let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
                Box::new(BufWriter::new(file))
            }
            None => Box::new(io::stdout().lock()),
        };
        convert::convert_first(&mut input, &mut output, &mut diagnostics)?
    };

    info!(
        "wrote {} bytes of BMP from {} bytes of GIF, {} warnings",
        stats.bmp_size,
        stats.gif_size,
        diagnostics.warnings().count()
    );

    if let Some(path) = &cli.log {
        let mut log_file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        stats
            .write_log(&mut log_file)
            .context("failed to write statistics log")?;
    }

    Ok(())
}
