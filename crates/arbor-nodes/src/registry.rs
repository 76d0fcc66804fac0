//! Factory registration for the bundled processors.

use arbor_core::NodeFactory;

use crate::gain::Gain;
use crate::math::{MathKind, MathOp};
use crate::oscillator::Oscillator;
use crate::peak::Peak;
use crate::ramp::Ramp;
use crate::routing::{Pass, StereoPass};

/// Registers every bundled processor in `factory`.
///
/// Paths already present are replaced.
pub fn register_all(factory: &mut NodeFactory) {
    factory.register_processor("core.pass", "Passes the signal through", || Pass);
    factory.register_processor("core.stereo_pass", "Stereo pass-through", || StereoPass);
    factory.register_processor("core.gain", "Smoothed gain in decibels", Gain::new);
    factory.register_processor("core.oscillator", "Sine oscillator", Oscillator::new);
    factory.register_processor("core.ramp", "Looping 0 to 1 ramp", Ramp::new);
    factory.register_processor("core.peak", "Absolute block peak", Peak::default);
    factory.register_processor("math.mul", "Multiplies by a value", || MathOp::new(MathKind::Mul));
    factory.register_processor("math.add", "Adds a value", || MathOp::new(MathKind::Add));
    factory.register_processor("math.clear", "Clears the signal", || MathOp::new(MathKind::Clear));

    #[cfg(feature = "tracing")]
    tracing::debug!(paths = factory.entries().len(), "bundled processors registered");
}

/// Container kinds plus every bundled processor.
pub fn default_factory() -> NodeFactory {
    let mut factory = NodeFactory::new();
    register_all(&mut factory);
    factory
}
