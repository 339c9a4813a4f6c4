//! Carrier stub binary: the runtime half of the carrier executable

use packbind::{RunOptions, exit_codes::*, run_carrier};
use std::{env, panic, process};

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
            eprintln!("Fatal: Unhandled panic in stub");
            process::exit(EXIT_PANIC);
        }
    }
}

fn run() -> i32 {
    // Initialize logging as early as possible for debugging
    if let Ok(level) = env::var("PACKBIND_STUB_LOG_LEVEL") {
        packbind::logger::JsonLogger::init_with_level(&level, "PACKBIND_STUB_LOG_LEVEL");
    } else if let Ok(level) = env::var("PACKBIND_LOG_LEVEL") {
        packbind::logger::JsonLogger::init_with_level(&level, "PACKBIND_LOG_LEVEL");
    } else {
        packbind::logger::JsonLogger::init();
    }

    log::debug!("Stub process started");

    let args: Vec<String> = env::args().collect();
    log::trace!("Arguments: {:?}", args);

    // The stub never interprets its command line during normal execution:
    // a packed payload chain runs the same way no matter what arguments the
    // carrier receives. Only PACKBIND_STUB_CLI=1 switches to CLI mode.
    let cli_mode = packbind::utils::is_env_true("PACKBIND_STUB_CLI");

    if cli_mode {
        let exe_path = match env::current_exe() {
            Ok(path) => path,
            Err(e) => {
                log::error!("Failed to get executable path: {}", e);
                return EXIT_IO_ERROR;
            }
        };

        let command_args = &args[1..];
        // Default to 'info' when no command is given in CLI mode
        let command = if command_args.is_empty() {
            "info"
        } else {
            command_args[0].as_str()
        };

        let exit_code = match command {
            "info" => packbind::format_v2::cli::show_info(&exe_path),
            "list" => packbind::format_v2::cli::list_entries(&exe_path),
            "extract" => {
                if command_args.len() < 3 {
                    eprintln!("Usage: {} extract <order> <output_dir>", args[0]);
                    EXIT_INVALID_ARGS
                } else {
                    match packbind::format_v2::cli::extract_entry(
                        &exe_path,
                        &command_args[1],
                        &command_args[2],
                    ) {
                        0 => 0,
                        _ => EXIT_EXTRACTION_ERROR,
                    }
                }
            }
            "help" | "--help" => {
                println!("Carrier Stub - CLI Mode");
                println!();
                println!("Available commands:");
                println!("  info              Show carrier information (default)");
                println!("  list              List payload entries in execution order");
                println!("  extract ORDER DIR Extract one payload to a directory");
                println!("  help              Show this help message");
                println!();
                println!("Usage:");
                println!("  PACKBIND_STUB_CLI=1 ./carrier <command>");
                0
            }
            _ => {
                eprintln!("Error: Unknown command '{}'", command);
                eprintln!("Available commands: info, list, extract, help");
                EXIT_INVALID_ARGS
            }
        };
        return exit_code;
    }

    // Standard execution: locate the appended container and run the chain.
    // An unpacked stub has nothing appended and exits silently.
    match run_carrier(RunOptions::default()) {
        Ok(code) => code,
        Err(e) => {
            log::error!("Carrier error: {}", e);
            eprintln!("Failed to run carrier: {}", e);
            match e.to_string() {
                s if s.contains("Format") => EXIT_FORMAT_ERROR,
                s if s.contains("Extraction") => EXIT_EXTRACTION_ERROR,
                s if s.contains("Launch") => EXIT_EXECUTION_ERROR,
                s if s.contains("IO error") => EXIT_IO_ERROR,
                _ => EXIT_ERROR,
            }
        }
    }
}
