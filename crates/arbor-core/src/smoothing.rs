//! Per-sample value smoothing for click-free parameter and bypass changes.
//!
//! - [`SmoothedValue`]: one-pole exponential approach, used by processors for
//!   gain-like parameters.
//! - [`LinearRamp`]: constant-rate ramp with an exact duration, used by the
//!   chain bypass crossfade.
//!
//! Both are configured with [`prepare`](LinearRamp::prepare) once the sample
//! rate is known and advanced once per sample on the audio thread.

use libm::expf;

/// Exponentially smoothed value.
#[derive(Debug, Clone)]
pub struct SmoothedValue {
    current: f32,
    target: f32,
    coeff: f32,
    sample_rate: f32,
    time_ms: f32,
}

impl SmoothedValue {
    /// Creates a value that jumps instantly until a smoothing time is set.
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            coeff: 1.0,
            sample_rate: 44100.0,
            time_ms: 0.0,
        }
    }

    /// Creates a value smoothed over `time_ms` at `sample_rate`.
    pub fn with_time(initial: f32, sample_rate: f32, time_ms: f32) -> Self {
        let mut value = Self::new(initial);
        value.sample_rate = sample_rate;
        value.time_ms = time_ms;
        value.update_coeff();
        value
    }

    /// Updates the sample rate, keeping the smoothing time.
    pub fn prepare(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_coeff();
    }

    /// Sets the time constant in milliseconds (0 = instant).
    pub fn set_time_ms(&mut self, time_ms: f32) {
        self.time_ms = time_ms;
        self.update_coeff();
    }

    /// Sets the value to approach.
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Jumps to `value` with no smoothing.
    #[inline]
    pub fn reset(&mut self, value: f32) {
        self.current = value;
        self.target = value;
    }

    /// Advances one sample and returns the new value.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        self.current += self.coeff * (self.target - self.current);
        self.current
    }

    /// Current value.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Target value.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// True once the value is within 1e-6 of the target.
    #[inline]
    pub fn is_settled(&self) -> bool {
        (self.current - self.target).abs() < 1e-6
    }

    // coeff = 1 - exp(-1 / (tau * fs)), one time constant reaches ~63%.
    fn update_coeff(&mut self) {
        self.coeff = if self.time_ms <= 0.0 || self.sample_rate <= 0.0 {
            1.0
        } else {
            1.0 - expf(-1.0 / (self.time_ms / 1000.0 * self.sample_rate))
        };
    }
}

impl Default for SmoothedValue {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Linear ramp that reaches its target in exactly the configured time.
#[derive(Debug, Clone)]
pub struct LinearRamp {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
    sample_rate: f32,
    time_ms: f32,
}

impl LinearRamp {
    /// Creates a settled ramp at `initial` with a 20 ms default ramp time.
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            step: 0.0,
            remaining: 0,
            sample_rate: 44100.0,
            time_ms: 20.0,
        }
    }

    /// Sets the sample rate used for subsequent ramps.
    pub fn prepare(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    /// Sets the ramp duration in milliseconds.
    pub fn set_time_ms(&mut self, time_ms: f32) {
        self.time_ms = time_ms.max(0.0);
    }

    /// Ramp duration in milliseconds.
    pub fn time_ms(&self) -> f32 {
        self.time_ms
    }

    /// Starts a ramp towards `target` from the current value.
    pub fn set_target(&mut self, target: f32) {
        if (target - self.target).abs() < 1e-9 {
            return;
        }
        self.target = target;
        let samples = (self.time_ms * self.sample_rate / 1000.0) as u32;
        if samples == 0 {
            self.reset(target);
        } else {
            self.step = (target - self.current) / samples as f32;
            self.remaining = samples;
        }
    }

    /// Jumps to `value` and stops any ramp in progress.
    pub fn reset(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.step = 0.0;
        self.remaining = 0;
    }

    /// Advances one sample and returns the new value.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        if self.remaining > 0 {
            self.current += self.step;
            self.remaining -= 1;
            if self.remaining == 0 {
                self.current = self.target;
            }
        }
        self.current
    }

    /// Current value.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Target value.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// True when no ramp is in progress.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.remaining == 0
    }
}

impl Default for LinearRamp {
    fn default() -> Self {
        Self::new(0.0)
    }
}
