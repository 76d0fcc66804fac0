//! Arbor Nodes - leaf processors for arbor networks
//!
//! Every processor implements [`arbor_core::Processor`] and is registered in
//! [`default_factory`] under a dotted factory path:
//!
//! | path               | processor            | parameters                   |
//! |--------------------|----------------------|------------------------------|
//! | `core.pass`        | [`Pass`]             |                              |
//! | `core.stereo_pass` | [`StereoPass`]       | (fixed two channels)         |
//! | `core.gain`        | [`Gain`]             | `Gain` (dB), `Smoothing` (ms) |
//! | `core.oscillator`  | [`Oscillator`]       | `Frequency`, `Gain`          |
//! | `core.ramp`        | [`Ramp`]             | `PeriodTime` (ms)            |
//! | `core.peak`        | [`Peak`]             |                              |
//! | `math.mul`         | [`MathOp`]           | `Value`                      |
//! | `math.add`         | [`MathOp`]           | `Value`                      |
//! | `math.clear`       | [`MathOp`]           |                              |
//!
//! # Example
//!
//! ```rust
//! use arbor_core::{AudioBuffer, Network};
//!
//! let network = Network::with_root("root", "container.chain", arbor_nodes::default_factory())?;
//! let gain = network.create_node_tree("gain", "core.gain");
//! network.root().nodes_tree().add_child(gain, None)?;
//! network.get("gain").unwrap().parameter("Gain").unwrap().set_value(-6.0);
//!
//! network.prepare(48000.0, 256);
//! let mut buffer = AudioBuffer::new(2, 256);
//! buffer.fill(1.0);
//! network.process(&mut buffer.as_process_data());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod gain;
pub mod math;
pub mod oscillator;
pub mod peak;
pub mod ramp;
pub mod registry;
pub mod routing;

pub use gain::Gain;
pub use math::{MathKind, MathOp};
pub use oscillator::Oscillator;
pub use peak::Peak;
pub use ramp::Ramp;
pub use registry::{default_factory, register_all};
pub use routing::{Pass, StereoPass};
