//! Looping control ramp.

use arbor_core::{ParamSpec, ParameterRange, PrepareSpec, ProcessData, Processor};

const PARAMS: [ParamSpec; 1] = [ParamSpec::new("PeriodTime", 0.1, 10000.0, 500.0)
    .with_range(ParameterRange::new(0.1, 10000.0).with_step(0.1).with_skew(0.2))];

/// Writes a ramp from 0 to 1 that restarts every `PeriodTime` milliseconds.
///
/// The block is overwritten, so the ramp is usually placed in a modulation
/// chain.
#[derive(Debug, Clone)]
pub struct Ramp {
    period_ms: f64,
    sample_rate: f64,
    value: f64,
    increment: f64,
}

impl Ramp {
    /// A 500 ms ramp.
    pub fn new() -> Self {
        let mut ramp = Self {
            period_ms: 500.0,
            sample_rate: 44100.0,
            value: 0.0,
            increment: 0.0,
        };
        ramp.update_increment();
        ramp
    }

    /// Ramp position in `[0, 1)`.
    pub fn value(&self) -> f64 {
        self.value
    }

    fn update_increment(&mut self) {
        let period_samples = self.period_ms * 0.001 * self.sample_rate;
        self.increment = if period_samples > 0.0 { 1.0 / period_samples } else { 0.0 };
    }

    #[inline]
    fn tick(&mut self) -> f32 {
        let v = self.value as f32;
        self.value += self.increment;
        if self.value >= 1.0 {
            self.value = self.value.fract();
        }
        v
    }
}

impl Default for Ramp {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for Ramp {
    fn params(&self) -> &[ParamSpec] {
        &PARAMS
    }

    fn set_param(&mut self, index: usize, value: f64) {
        if index == 0 {
            self.period_ms = value;
            self.update_increment();
        }
    }

    fn prepare(&mut self, spec: PrepareSpec) {
        self.sample_rate = spec.sample_rate;
        self.update_increment();
        self.reset();
    }

    fn reset(&mut self) {
        self.value = 0.0;
    }

    fn process(&mut self, data: &mut ProcessData<'_>) {
        let ns = data.num_samples();
        let nc = data.num_channels();
        let out = data.as_mut_slice();
        for i in 0..ns {
            let v = self.tick();
            for c in 0..nc {
                out[c * ns + i] = v;
            }
        }
    }

    fn process_frame(&mut self, frame: &mut [f32]) {
        let v = self.tick();
        frame.fill(v);
    }
}
