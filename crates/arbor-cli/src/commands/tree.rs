//! Topology printing command.

use std::path::PathBuf;

use arbor_core::{Network, Node, NodeRef};
use clap::Args;

use super::common::load_network;

#[derive(Args)]
pub struct TreeArgs {
    /// Network description (TOML)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Also list parameter values
    #[arg(short, long)]
    params: bool,
}

pub fn run(args: TreeArgs) -> anyhow::Result<()> {
    let (config, network) = load_network(&args.file)?;
    println!("{}", config.name);
    if let Some(description) = &config.description {
        println!("{description}");
    }
    println!();
    print!("{}", render(&network, args.params));
    Ok(())
}

/// Renders the node hierarchy with channel counts.
pub fn render(network: &Network, params: bool) -> String {
    let root: NodeRef = network.root().clone();
    let mut out = String::new();
    write_node(&mut out, &root, "", "", params);
    out
}

fn write_node(out: &mut String, node: &NodeRef, lead: &str, indent: &str, params: bool) {
    out.push_str(&format!(
        "{lead}{} [{}] ch={}",
        node.id(),
        node.base().factory_path(),
        node.base().num_channels()
    ));
    if node.is_bypassed() {
        out.push_str(" (bypassed)");
    }
    out.push('\n');

    let children = node.as_container().map(|c| c.nodes()).unwrap_or_default();
    let child_indent = if children.is_empty() {
        format!("{indent}  ")
    } else {
        format!("{indent}│ ")
    };
    if params {
        for p in node.parameters() {
            out.push_str(&format!("{child_indent}  {} = {}\n", p.id(), p.value()));
        }
    }

    let last = children.len().saturating_sub(1);
    for (i, child) in children.iter().enumerate() {
        let (branch, next) = if i == last { ("└── ", "    ") } else { ("├── ", "│   ") };
        write_node(
            out,
            child,
            &format!("{indent}{branch}"),
            &format!("{indent}{next}"),
            params,
        );
    }
}
