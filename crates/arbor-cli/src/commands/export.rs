//! Class export command.

use std::path::PathBuf;

use clap::Args;

use super::common::{class_name, load_network};

#[derive(Args)]
pub struct ExportArgs {
    /// Network description (TOML)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Class name (defaults to the network name)
    #[arg(short, long)]
    name: Option<String>,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub fn run(args: ExportArgs) -> anyhow::Result<()> {
    let (config, network) = load_network(&args.file)?;
    let name = class_name(args.name.as_deref().unwrap_or(&config.name));
    let code = network.create_cpp_class(&name);

    match &args.output {
        Some(path) => {
            std::fs::write(path, &code)?;
            tracing::info!(file = %path.display(), bytes = code.len(), "class written");
        }
        None => print!("{code}"),
    }
    Ok(())
}
