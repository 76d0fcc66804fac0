//! Factory listing command.

#![allow(clippy::print_literal)] // Table headers use literal strings

use clap::Args;

#[derive(Args)]
pub struct NodesArgs {
    /// Only list paths starting with this prefix (e.g. "container", "math")
    #[arg(value_name = "PREFIX")]
    prefix: Option<String>,
}

pub fn run(args: NodesArgs) -> anyhow::Result<()> {
    let factory = arbor_nodes::default_factory();
    let entries: Vec<_> = factory
        .entries()
        .iter()
        .filter(|e| args.prefix.as_deref().is_none_or(|p| e.path().starts_with(p)))
        .collect();

    if entries.is_empty() {
        anyhow::bail!(
            "No node types match '{}'",
            args.prefix.as_deref().unwrap_or_default()
        );
    }

    println!("Available Nodes");
    println!("===============");
    println!();
    println!("  {:20}  {}", "Path", "Description");
    println!("  {:20}  {}", "----", "-----------");
    for entry in entries {
        println!("  {:20}  {}", entry.path(), entry.description());
    }
    Ok(())
}
