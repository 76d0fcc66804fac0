//! Sine oscillator.

use arbor_core::{ParamSpec, ParameterRange, PrepareSpec, ProcessData, Processor};

const TAU: f64 = core::f64::consts::TAU;

const PARAMS: [ParamSpec; 2] = [
    ParamSpec::new("Frequency", 20.0, 20000.0, 220.0)
        .with_range(ParameterRange::new(20.0, 20000.0).with_step(0.1).with_skew(0.2299)),
    ParamSpec::new("Gain", 0.0, 1.0, 1.0),
];

/// Adds a sine wave to every channel.
///
/// The phase is shared by all channels, so a stereo block receives the same
/// wave on both sides. Inside a modulation chain it acts as an LFO.
#[derive(Debug, Clone)]
pub struct Oscillator {
    frequency: f64,
    gain: f32,
    phase: f64,
    increment: f64,
    sample_rate: f64,
}

impl Oscillator {
    /// 220 Hz at full gain.
    pub fn new() -> Self {
        let mut osc = Self {
            frequency: 220.0,
            gain: 1.0,
            phase: 0.0,
            increment: 0.0,
            sample_rate: 44100.0,
        };
        osc.update_increment();
        osc
    }

    /// Current phase in radians, in `[0, 2π)`.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    fn update_increment(&mut self) {
        self.increment = if self.sample_rate > 0.0 {
            TAU * self.frequency / self.sample_rate
        } else {
            0.0
        };
    }

    // Modulation chains prepare at an eighth of the audio rate.
    #[cfg(feature = "tracing")]
    fn warn_if_aliasing(&self) {
        if self.frequency * 2.0 > self.sample_rate {
            tracing::warn!(
                frequency = self.frequency,
                sample_rate = self.sample_rate,
                "oscillator frequency above Nyquist, output aliases"
            );
        }
    }

    #[inline]
    fn tick(&mut self) -> f32 {
        let value = libm::sin(self.phase) as f32 * self.gain;
        self.phase += self.increment;
        if self.phase >= TAU {
            self.phase %= TAU;
        }
        value
    }
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for Oscillator {
    fn params(&self) -> &[ParamSpec] {
        &PARAMS
    }

    fn set_param(&mut self, index: usize, value: f64) {
        match index {
            0 => {
                self.frequency = value.max(0.0);
                self.update_increment();
            }
            1 => self.gain = value as f32,
            _ => {}
        }
    }

    fn prepare(&mut self, spec: PrepareSpec) {
        self.sample_rate = spec.sample_rate;
        self.update_increment();
        self.reset();

        #[cfg(feature = "tracing")]
        self.warn_if_aliasing();
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }

    fn process(&mut self, data: &mut ProcessData<'_>) {
        let ns = data.num_samples();
        let nc = data.num_channels();
        let out = data.as_mut_slice();
        for i in 0..ns {
            let v = self.tick();
            for c in 0..nc {
                out[c * ns + i] += v;
            }
        }
    }

    fn process_frame(&mut self, frame: &mut [f32]) {
        let v = self.tick();
        frame.iter_mut().for_each(|s| *s += v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_period_reaches_peak() {
        let mut osc = Oscillator::new();
        osc.set_param(0, 250.0);
        osc.prepare(PrepareSpec::new(1000.0, 8, 1));

        let mut raw = [0.0f32; 4];
        osc.process(&mut ProcessData::new(&mut raw, 1));
        assert!(raw[0].abs() < 1e-6);
        assert!((raw[1] - 1.0).abs() < 1e-6);
        assert!(raw[2].abs() < 1e-5);
        assert!((raw[3] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn adds_to_signal_with_gain() {
        let mut osc = Oscillator::new();
        osc.set_param(0, 250.0);
        osc.set_param(1, 0.5);
        osc.prepare(PrepareSpec::new(1000.0, 8, 2));

        osc.process_frame(&mut [0.0, 0.0]);
        let mut frame = [1.0f32, 1.0];
        osc.process_frame(&mut frame);
        assert!((frame[0] - 1.5).abs() < 1e-6);
        assert_eq!(frame[0], frame[1]);
    }

    #[test]
    fn phase_wraps() {
        let mut osc = Oscillator::new();
        osc.set_param(0, 300.0);
        osc.prepare(PrepareSpec::new(1000.0, 8, 1));
        for _ in 0..100 {
            osc.process_frame(&mut [0.0]);
            assert!((0.0..TAU).contains(&osc.phase()));
        }
    }

    #[test]
    fn phase_wraps_above_the_sample_rate() {
        let mut osc = Oscillator::new();
        osc.set_param(0, 20000.0);
        osc.prepare(PrepareSpec::new(1000.0, 8, 1));
        for _ in 0..10 {
            osc.process_frame(&mut [0.0]);
            assert!((0.0..TAU).contains(&osc.phase()));
        }
    }
}
