//! Command-line wrapper around the extraction engine.
//!
//! Exits 0 on success and 1 on any error; a failure result is still written
//! to the output file so downstream tooling always has well-formed JSON to
//! read.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;
use secex::Extractor;

#[derive(Debug, Parser)]
#[command(name = "secex", about = "Extract security holdings from financial PDF statements")]
struct Args {
    /// Path to the PDF statement.
    #[arg(long)]
    pdf: String,

    /// Write the JSON result to this file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    /// Additional reference-data JSON file, loaded over the bundled seed set.
    #[arg(long = "ref-db")]
    ref_db: Option<PathBuf>,

    /// Write logs to this file instead of stderr.
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,
}

fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(if args.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    if let Some(path) = &args.log_file {
        match File::create(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("cannot open log file {}: {e}", path.display()),
        }
    }
    builder.init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    let mut extractor = Extractor::new();
    if let Some(path) = &args.ref_db {
        match extractor.load_reference(path) {
            Ok(count) => log::info!("loaded {count} reference entries"),
            Err(e) => log::warn!("could not load reference data: {e}"),
        }
    }

    let result = extractor.extract(&args.pdf);
    let json = match serde_json::to_string_pretty(&result) {
        Ok(json) => json,
        Err(e) => {
            log::error!("could not serialize result: {e}");
            return ExitCode::FAILURE;
        }
    };

    match &args.output {
        Some(path) => {
            if let Err(e) = File::create(path).and_then(|mut f| f.write_all(json.as_bytes())) {
                log::error!("could not write output to {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        }
        None => println!("{json}"),
    }

    if result.error.is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
