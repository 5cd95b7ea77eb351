//! listvault CLI entry point.

use clap::Parser;
use listvault::cli::commands;
use listvault::cli::{Cli, Commands};
use listvault::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli) -> Result<(), Error> {
    let config = cli.store_config()?;
    let json = cli.json;

    match &cli.command {
        Commands::Init => commands::init::execute(&config, json),
        Commands::Add(args) => commands::add::execute(&config, &args.entity, &args.set, json),
        Commands::List { entity } => commands::list::execute(&config, entity, json),
        Commands::Count { entity } => commands::count::execute(&config, entity, json),
        Commands::Import {
            entity,
            file,
            batch_size,
        } => commands::import::execute(&config, entity, file, *batch_size, json),
        Commands::Info => commands::info::execute(&config, json),
        Commands::Watch => commands::watch::execute(&config, json),
    }
}
