//! Arbor CLI - inspect, run and export node networks.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arbor")]
#[command(author, version, about = "Arbor node network CLI", long_about = None)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the node types the factory can create
    Nodes(commands::nodes::NodesArgs),

    /// Print the topology of a network file
    Tree(commands::tree::TreeArgs),

    /// Check a network file for dangling connections and bad identifiers
    Validate(commands::validate::ValidateArgs),

    /// Run a test signal through a network
    Process(commands::process::ProcessArgs),

    /// Print the exported class for a network
    Export(commands::export::ExportArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Nodes(args) => commands::nodes::run(args),
        Commands::Tree(args) => commands::tree::run(args),
        Commands::Validate(args) => commands::validate::run(args),
        Commands::Process(args) => commands::process::run(args),
        Commands::Export(args) => commands::export::run(args),
    }
}
