use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::error;

use nxextract::Result;
use nxextract::decoder::Decode;
use nxextract::extract::{ExtractOptions, extract_path};
use nxextract::registry;

#[derive(Parser)]
#[command(name = "nxextract", about = "Recursive extractor for Nintendo asset files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the objects in each file
    List {
        #[arg(required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },
    /// Extract each file recursively
    Extract {
        /// Directory to extract into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        /// Walk and report without writing anything
        #[arg(long)]
        dry_run: bool,
        /// Only unpack the outermost format
        #[arg(long)]
        no_recurse: bool,
        #[arg(required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },
}

fn list(path: &Path) -> Result<()> {
    let file = BufReader::new(File::open(path)?);
    let mut decoder = registry::open(file, None)?;
    println!("{}: {}", path.display(), decoder.codec());
    decoder.print_list(&mut io::stdout().lock())
}

fn extract(path: &Path, output: &Path, options: &ExtractOptions) -> Result<()> {
    let report = extract_path(path, output, options)?;
    println!("{}:", path.display());
    report.print_listing(&mut io::stdout().lock())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut failed = 0usize;
    match Cli::parse().command {
        Commands::List { input } => {
            for path in &input {
                if let Err(e) = list(path) {
                    error!("{}: {e}", path.display());
                    failed += 1;
                }
            }
        }
        Commands::Extract {
            output,
            dry_run,
            no_recurse,
            input,
        } => {
            let options = ExtractOptions {
                dry_run,
                recurse: !no_recurse,
                ..ExtractOptions::default()
            };
            for path in &input {
                if let Err(e) = extract(path, &output, &options) {
                    error!("{}: {e}", path.display());
                    failed += 1;
                }
            }
        }
    }

    if failed > 0 {
        error!("{failed} file(s) failed");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
