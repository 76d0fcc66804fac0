//! Pass-through processors.

use arbor_core::{ProcessData, Processor};

/// Leaves the signal untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pass;

impl Processor for Pass {
    fn process(&mut self, _data: &mut ProcessData<'_>) {}

    fn process_frame(&mut self, _frame: &mut [f32]) {}
}

/// Pass-through that always claims two channels.
///
/// Useful inside a multi-channel container to reserve a stereo pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct StereoPass;

impl Processor for StereoPass {
    fn fixed_channels(&self) -> Option<usize> {
        Some(2)
    }

    fn process(&mut self, _data: &mut ProcessData<'_>) {}

    fn process_frame(&mut self, _frame: &mut [f32]) {}
}
