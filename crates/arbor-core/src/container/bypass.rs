//! Click-free bypass for serial chains.
//!
//! While the bypass flag is settled the chain either runs normally or does
//! nothing. During a transition the handler keeps the dry block, runs the
//! chain, and crossfades dry to wet (or back) over the ramp time.

use crate::buffer::ProcessData;
use crate::math::wet_dry_mix;
use crate::smoothing::LinearRamp;

use super::process::MAX_FRAME_CHANNELS;

/// Default bypass crossfade length.
pub const DEFAULT_BYPASS_RAMP_MS: f64 = 20.0;

#[derive(Debug, Default)]
pub(crate) struct BypassHandler {
    /// 1.0 = active (wet), 0.0 = bypassed (dry).
    fade: LinearRamp,
    dry: Vec<f32>,
}

impl BypassHandler {
    pub(crate) fn prepare(&mut self, sample_rate: f64, max_len: usize, ramp_ms: f64, bypassed: bool) {
        self.fade.prepare(sample_rate as f32);
        self.fade.set_time_ms(ramp_ms as f32);
        self.fade.reset(if bypassed { 0.0 } else { 1.0 });
        self.dry.resize(max_len, 0.0);
    }

    /// Applies to the next transition; a ramp in progress keeps its step.
    pub(crate) fn set_ramp_ms(&mut self, ramp_ms: f64) {
        self.fade.set_time_ms(ramp_ms as f32);
    }

    pub(crate) fn process(
        &mut self,
        bypassed: bool,
        data: &mut ProcessData<'_>,
        wet: impl FnOnce(&mut ProcessData<'_>),
    ) {
        self.fade.set_target(if bypassed { 0.0 } else { 1.0 });

        if self.fade.is_settled() {
            if !bypassed {
                wet(data);
            }
            return;
        }

        // Scratch smaller than the block: switch hard.
        if !data.copy_to(&mut self.dry) {
            self.fade.reset(self.fade.target());
            if !bypassed {
                wet(data);
            }
            return;
        }

        wet(data);

        let ns = data.num_samples();
        let nc = data.num_channels();
        let out = data.as_mut_slice();
        for i in 0..ns {
            let fade = self.fade.advance();
            for c in 0..nc {
                let idx = c * ns + i;
                out[idx] = wet_dry_mix(self.dry[idx], out[idx], fade);
            }
        }
    }

    /// Per-frame variant of [`process`](Self::process).
    pub(crate) fn process_frame(
        &mut self,
        bypassed: bool,
        frame: &mut [f32],
        wet: impl FnOnce(&mut [f32]),
    ) {
        self.fade.set_target(if bypassed { 0.0 } else { 1.0 });

        if self.fade.is_settled() || frame.len() > MAX_FRAME_CHANNELS {
            self.fade.reset(self.fade.target());
            if !bypassed {
                wet(frame);
            }
            return;
        }

        let mut dry = [0.0f32; MAX_FRAME_CHANNELS];
        dry[..frame.len()].copy_from_slice(frame);
        wet(frame);

        let fade = self.fade.advance();
        for (out, dry) in frame.iter_mut().zip(dry) {
            *out = wet_dry_mix(dry, *out, fade);
        }
    }

    #[cfg(test)]
    pub(crate) fn is_ramping(&self) -> bool {
        !self.fade.is_settled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn double(data: &mut ProcessData<'_>) {
        data.as_mut_slice().iter_mut().for_each(|s| *s *= 2.0);
    }

    fn handler(ramp_ms: f64) -> BypassHandler {
        let mut h = BypassHandler::default();
        // 1 kHz so that 4 ms == 4 samples.
        h.prepare(1000.0, 16, ramp_ms, false);
        h
    }

    #[test]
    fn settled_active_runs_chain() {
        let mut h = handler(4.0);
        let mut raw = [1.0f32; 4];
        h.process(false, &mut ProcessData::new(&mut raw, 1), double);
        assert_eq!(raw, [2.0; 4]);
    }

    #[test]
    fn bypass_ramps_then_passes_dry() {
        let mut h = handler(4.0);
        let mut raw = [1.0f32; 4];
        h.process(true, &mut ProcessData::new(&mut raw, 1), double);
        // Fade 1 -> 0 over 4 samples: 0.75, 0.5, 0.25, 0.0 of the wet signal.
        assert_eq!(raw, [1.75, 1.5, 1.25, 1.0]);
        assert!(!h.is_ramping());

        let mut raw = [1.0f32; 4];
        h.process(true, &mut ProcessData::new(&mut raw, 1), double);
        assert_eq!(raw, [1.0; 4]);
    }

    #[test]
    fn ramp_applies_per_frame_across_channels() {
        let mut h = handler(2.0);
        let mut raw = [1.0f32, 1.0, 1.0, 1.0];
        h.process(true, &mut ProcessData::new(&mut raw, 2), double);
        assert_eq!(raw, [1.5, 1.0, 1.5, 1.0]);
    }

    #[test]
    fn frames_ramp_like_blocks() {
        let mut h = handler(4.0);
        let mut out = Vec::new();
        for _ in 0..5 {
            let mut frame = [1.0f32, 1.0];
            h.process_frame(true, &mut frame, |f| f.iter_mut().for_each(|s| *s *= 2.0));
            assert_eq!(frame[0], frame[1]);
            out.push(frame[0]);
        }
        assert_eq!(out, [1.75, 1.5, 1.25, 1.0, 1.0]);
    }

    #[test]
    fn new_ramp_time_applies_to_the_next_transition() {
        let mut h = handler(4.0);
        h.set_ramp_ms(2.0);
        let mut raw = [1.0f32; 4];
        h.process(true, &mut ProcessData::new(&mut raw, 1), double);
        assert_eq!(raw, [1.5, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn small_scratch_switches_hard() {
        let mut h = BypassHandler::default();
        h.prepare(1000.0, 2, 4.0, false);
        let mut raw = [1.0f32; 4];
        h.process(true, &mut ProcessData::new(&mut raw, 1), double);
        assert_eq!(raw, [1.0; 4]);
        assert!(!h.is_ramping());
    }
}
