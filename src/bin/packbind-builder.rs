//! Carrier builder binary

use clap::Parser;
use packbind::{BuildOptions, build_carrier, exit_codes::*};
use std::{env, panic, path::PathBuf, process};

const VERSION: &str = packbind::version::VERSION;

#[derive(Parser, Debug)]
#[command(version = VERSION, about = "Build self-extracting carrier executables")]
struct Args {
    /// Path to the JSON build plan
    #[arg(short, long)]
    plan: PathBuf,

    /// Output path for the carrier executable
    #[arg(short, long)]
    output: PathBuf,

    /// Path to the stub binary used as the carrier template
    #[arg(long)]
    stub_bin: Option<PathBuf>,

    /// Extra directory to search for the stub binary (repeatable)
    #[arg(long = "search-dir")]
    search_dirs: Vec<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() {
    // Set up panic handler to return specific exit code
    panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {}", panic_info);
        process::exit(EXIT_PANIC);
    }));

    // Wrap main logic in catch_unwind for extra safety
    let result = panic::catch_unwind(run);

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(_) => {
            eprintln!("Fatal: Unhandled panic in builder");
            process::exit(EXIT_PANIC);
        }
    }
}

fn run() -> i32 {
    // Handle --version before clap
    if env::args().nth(1).as_deref() == Some("--version") {
        println!("packbind-builder {}", packbind::version::full_version());
        return EXIT_SUCCESS;
    }

    let args = Args::parse();

    // Initialize logging with level if provided
    if let Some(ref level) = args.log_level {
        packbind::logger::JsonLogger::init_with_level(level, "CLI --log-level");
    } else {
        packbind::logger::JsonLogger::init();
    }

    let options = BuildOptions {
        stub_bin: args.stub_bin,
        search_dirs: args.search_dirs,
    };

    match build_carrier(&args.plan, &args.output, options) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Build error: {}", e);
            match e.to_string() {
                s if s.contains("Build input") || s.contains("JSON") => EXIT_CONFIG_ERROR,
                s if s.contains("Format") => EXIT_FORMAT_ERROR,
                s if s.contains("IO error") => EXIT_IO_ERROR,
                _ => EXIT_BUILD_ERROR,
            }
        }
    }
}
