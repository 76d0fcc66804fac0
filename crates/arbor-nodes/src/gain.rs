//! Smoothed gain in decibels.

use arbor_core::math::db_to_gain;
use arbor_core::{ParamSpec, ParameterRange, PrepareSpec, ProcessData, Processor, SmoothedValue};

/// Parameter index of `Gain`.
pub const GAIN: usize = 0;
/// Parameter index of `Smoothing`.
pub const SMOOTHING: usize = 1;

const PARAMS: [ParamSpec; 2] = [
    ParamSpec::new("Gain", -100.0, 0.0, 0.0)
        .with_range(ParameterRange::new(-100.0, 0.0).with_step(0.1).with_skew(5.42)),
    ParamSpec::new("Smoothing", 0.0, 1000.0, 20.0),
];

/// Applies a gain given in decibels, smoothed per sample.
///
/// `-100 dB` and below is silence.
///
/// # Example
///
/// ```rust
/// use arbor_core::{PrepareSpec, Processor};
/// use arbor_nodes::Gain;
///
/// let mut gain = Gain::new();
/// gain.set_param(arbor_nodes::gain::SMOOTHING, 0.0);
/// gain.set_param(arbor_nodes::gain::GAIN, -100.0);
/// gain.prepare(PrepareSpec::new(48000.0, 64, 1));
///
/// let mut frame = [1.0f32];
/// gain.process_frame(&mut frame);
/// assert_eq!(frame[0], 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct Gain {
    gain: SmoothedValue,
    smoothing_ms: f32,
}

impl Gain {
    /// Unity gain with 20 ms smoothing.
    pub fn new() -> Self {
        Self {
            gain: SmoothedValue::with_time(1.0, 44100.0, 20.0),
            smoothing_ms: 20.0,
        }
    }

    /// Current linear gain.
    pub fn linear_gain(&self) -> f32 {
        self.gain.get()
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for Gain {
    fn params(&self) -> &[ParamSpec] {
        &PARAMS
    }

    fn set_param(&mut self, index: usize, value: f64) {
        match index {
            GAIN => self.gain.set_target(db_to_gain(value) as f32),
            SMOOTHING => {
                self.smoothing_ms = value.max(0.0) as f32;
                self.gain.set_time_ms(self.smoothing_ms);
            }
            _ => {}
        }
    }

    fn prepare(&mut self, spec: PrepareSpec) {
        self.gain.prepare(spec.sample_rate as f32);
        self.reset();
    }

    fn reset(&mut self) {
        let target = self.gain.target();
        self.gain.reset(target);
    }

    fn process(&mut self, data: &mut ProcessData<'_>) {
        let ns = data.num_samples();
        let nc = data.num_channels();
        if self.gain.is_settled() {
            let g = self.gain.target();
            data.as_mut_slice().iter_mut().for_each(|s| *s *= g);
            return;
        }
        let out = data.as_mut_slice();
        for i in 0..ns {
            let g = self.gain.advance();
            for c in 0..nc {
                out[c * ns + i] *= g;
            }
        }
    }

    fn process_frame(&mut self, frame: &mut [f32]) {
        let g = self.gain.advance();
        frame.iter_mut().for_each(|s| *s *= g);
    }
}
