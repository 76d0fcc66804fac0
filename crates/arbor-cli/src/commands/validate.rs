//! Description validation command.

use std::path::PathBuf;

use arbor_config::{NetworkConfig, ValidationError, validate_network_with};
use clap::Args;

#[derive(Args)]
pub struct ValidateArgs {
    /// Network description (TOML)
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

pub fn run(args: ValidateArgs) -> anyhow::Result<()> {
    let config = NetworkConfig::load(&args.file)?;
    match validate_network_with(&config, &arbor_nodes::default_factory()) {
        Ok(()) => {
            println!("{}: ok ({} nodes)", args.file.display(), config.num_nodes());
            Ok(())
        }
        Err(ValidationError::Multiple(errors)) => {
            for error in &errors {
                println!("  {error}");
            }
            anyhow::bail!("{} problems in {}", errors.len(), args.file.display())
        }
        Err(error) => {
            println!("  {error}");
            anyhow::bail!("1 problem in {}", args.file.display())
        }
    }
}
