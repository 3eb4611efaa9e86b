//! entigraph CLI
//!
//! Command-line demo harness for the entigraph-core library surface.

use clap::{Parser, Subcommand};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "entigraph")]
#[command(about = "entigraph - entity-component storage demo", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Register a sample entity, edit it, and show the resulting fork
    Fork(commands::fork::ForkArgs),
    /// Resolve an address against a small sample registry
    Resolve(commands::resolve::ResolveArgs),
    /// Register and call a sample function against borrowed fields
    Call(commands::call::CallArgs),
    /// List registered functions and their declared signatures
    Functions(commands::functions::FunctionsArgs),
}

fn main() {
    entigraph_core::logging_facility::init(entigraph_core::logging_facility::Profile::Development);

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fork(args) => commands::fork::execute(args),
        Commands::Resolve(args) => commands::resolve::execute(args),
        Commands::Call(args) => commands::call::execute(args),
        Commands::Functions(args) => commands::functions::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
