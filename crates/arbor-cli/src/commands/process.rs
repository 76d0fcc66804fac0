//! Test-signal processing command.

use std::path::PathBuf;

use arbor_core::{AudioBuffer, Network, Node};
use clap::{Args, ValueEnum};

use super::common::load_network;

#[derive(Args)]
pub struct ProcessArgs {
    /// Network description (TOML)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Parameter values: a root macro ("Depth=0.5") or a node parameter
    /// ("gain.Gain=-6")
    #[arg(long = "set", value_parser = parse_key_val, number_of_values = 1)]
    set: Vec<(String, f64)>,

    /// Number of blocks to process
    #[arg(long, default_value = "16")]
    blocks: usize,

    /// Override the block size of the description
    #[arg(long)]
    block_size: Option<usize>,

    /// Override the sample rate of the description
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Test signal fed into every channel
    #[arg(long, value_enum, default_value = "sine")]
    signal: Signal,

    /// Test signal amplitude
    #[arg(long, default_value = "1.0")]
    level: f32,
}

/// Test signal shapes.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Signal {
    /// 440 Hz sine
    Sine,
    /// Constant level
    Dc,
}

fn parse_key_val(s: &str) -> Result<(String, f64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid parameter format: '{s}' (expected key=value)"))?;
    let value = value
        .trim()
        .parse()
        .map_err(|_| format!("Invalid value for '{key}': '{value}'"))?;
    Ok((key.trim().to_string(), value))
}

pub fn run(args: ProcessArgs) -> anyhow::Result<()> {
    let (config, network) = load_network(&args.file)?;
    let sample_rate = args.sample_rate.unwrap_or(config.sample_rate);
    let block_size = args.block_size.unwrap_or(config.block_size);
    if block_size == 0 {
        anyhow::bail!("block size must be greater than zero");
    }

    for (key, value) in &args.set {
        apply(&network, key, *value)?;
    }

    network.prepare(f64::from(sample_rate), block_size);
    let channels = network.num_channels();
    let mut buffer = AudioBuffer::new(channels, block_size);
    let mut peaks = vec![0.0f32; channels];
    let mut position = 0usize;
    for _ in 0..args.blocks {
        fill(&mut buffer, args.signal, args.level, sample_rate, position);
        network.process(&mut buffer.as_process_data());
        for (c, peak) in peaks.iter_mut().enumerate() {
            *peak = peak.max(buffer.channel_peak(c));
        }
        position += block_size;
    }
    let flushed = network.flush_pending_values();
    tracing::debug!(flushed, "pending parameter values stored");

    println!(
        "Processed {} blocks of {} samples at {} Hz ({} channels)",
        args.blocks, block_size, sample_rate, channels
    );
    println!();
    println!("Peaks:");
    for (c, peak) in peaks.iter().enumerate() {
        println!("  ch {c}: {peak:.4}");
    }

    let sources: Vec<_> = network
        .nodes()
        .into_iter()
        .filter_map(|n| n.handle_modulation().map(|v| (n.id().to_string(), v)))
        .collect();
    if !sources.is_empty() {
        println!();
        println!("Modulation:");
        for (id, value) in sources {
            println!("  {id}: {value:.4}");
        }
    }
    Ok(())
}

/// Sets a root macro parameter or a `node.parameter` value.
fn apply(network: &Network, key: &str, value: f64) -> anyhow::Result<()> {
    if let Some(m) = network.root().macro_parameter(key) {
        tracing::debug!(parameter = key, value, connections = m.connections().len(), "macro set");
        m.parameter().set_value(value);
        return Ok(());
    }
    let (node_id, parameter_id) = key
        .split_once('.')
        .ok_or_else(|| anyhow::anyhow!("Unknown macro parameter: {key}"))?;
    let node = network
        .get(node_id)
        .ok_or_else(|| anyhow::anyhow!("Unknown node: {node_id}"))?;
    let parameter = node
        .parameter(parameter_id)
        .ok_or_else(|| anyhow::anyhow!("Node '{node_id}' has no parameter '{parameter_id}'"))?;
    parameter.set_value(value);
    Ok(())
}

fn fill(buffer: &mut AudioBuffer, signal: Signal, level: f32, sample_rate: u32, start: usize) {
    match signal {
        Signal::Dc => buffer.fill(level),
        Signal::Sine => {
            let w = core::f64::consts::TAU * 440.0 / f64::from(sample_rate.max(1));
            for c in 0..buffer.num_channels() {
                for (i, s) in buffer.channel_mut(c).iter_mut().enumerate() {
                    *s = level * ((start + i) as f64 * w).sin() as f32;
                }
            }
        }
    }
}
