//! Block peak detector.

use arbor_core::{ProcessData, Processor};

/// Replaces every channel with its absolute peak.
///
/// Turns an audio branch into a control signal; inside a modulation chain the
/// chain forwards this peak to its targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct Peak {
    last: f32,
}

impl Peak {
    /// Peak of the most recent block or frame.
    pub fn last(&self) -> f32 {
        self.last
    }
}

impl Processor for Peak {
    fn reset(&mut self) {
        self.last = 0.0;
    }

    fn process(&mut self, data: &mut ProcessData<'_>) {
        let mut overall = 0.0f32;
        for c in 0..data.num_channels() {
            let channel = data.channel_mut(c);
            let peak = channel.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            channel.fill(peak);
            overall = overall.max(peak);
        }
        self.last = overall;
    }

    fn process_frame(&mut self, frame: &mut [f32]) {
        frame.iter_mut().for_each(|s| *s = s.abs());
        self.last = frame.iter().fold(0.0f32, |m, s| m.max(*s));
    }
}
