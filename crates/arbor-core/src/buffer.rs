//! Planar multi-channel audio blocks.
//!
//! [`ProcessData`] is the borrowed view every node processes: `num_channels`
//! channels of `num_samples` samples stored back to back in one slice.
//! Containers carve it into channel sub-ranges ([`ProcessData::sub_channels`])
//! or copy it into scratch storage ([`ProcessData::copy_to`]) without
//! allocating. [`AudioBuffer`] owns storage of the same layout.

use core::ops::Range;

/// Borrowed planar block: channel `c` is `data[c * num_samples..(c + 1) * num_samples]`.
#[derive(Debug)]
pub struct ProcessData<'a> {
    data: &'a mut [f32],
    num_channels: usize,
    num_samples: usize,
}

impl<'a> ProcessData<'a> {
    /// Wraps `data` as `num_channels` equal-length channels.
    ///
    /// Trailing samples that do not fill a whole channel are ignored.
    pub fn new(data: &'a mut [f32], num_channels: usize) -> Self {
        let num_samples = data.len().checked_div(num_channels).unwrap_or(0);
        let used = num_samples * num_channels;
        Self {
            data: &mut data[..used],
            num_channels,
            num_samples,
        }
    }

    /// Number of channels in the view.
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Number of samples per channel.
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Total sample count over all channels.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the view holds no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The whole block as one slice.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &*self.data
    }

    /// The whole block as one mutable slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut *self.data
    }

    /// Channel `index`, or an empty slice if out of range.
    pub fn channel(&self, index: usize) -> &[f32] {
        if index >= self.num_channels {
            return &[];
        }
        &self.data[index * self.num_samples..(index + 1) * self.num_samples]
    }

    /// Mutable channel `index`, or an empty slice if out of range.
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        if index >= self.num_channels {
            return &mut [];
        }
        &mut self.data[index * self.num_samples..(index + 1) * self.num_samples]
    }

    /// Iterates over mutable channels.
    pub fn channels_mut(&mut self) -> core::slice::ChunksExactMut<'_, f32> {
        self.data.chunks_exact_mut(self.num_samples.max(1))
    }

    /// View of the channels in `range`, clamped to the available channels.
    pub fn sub_channels(&mut self, range: Range<usize>) -> ProcessData<'_> {
        let end = range.end.min(self.num_channels);
        let start = range.start.min(end);
        ProcessData {
            data: &mut self.data[start * self.num_samples..end * self.num_samples],
            num_channels: end - start,
            num_samples: self.num_samples,
        }
    }

    /// Reborrows the block with a shorter lifetime.
    pub fn reborrow(&mut self) -> ProcessData<'_> {
        ProcessData {
            data: &mut *self.data,
            num_channels: self.num_channels,
            num_samples: self.num_samples,
        }
    }

    /// Copies the block into the front of `dst`. Returns false (and copies
    /// nothing) if `dst` is too short.
    pub fn copy_to(&self, dst: &mut [f32]) -> bool {
        match dst.get_mut(..self.data.len()) {
            Some(dst) => {
                dst.copy_from_slice(&*self.data);
                true
            }
            None => false,
        }
    }

    /// Overwrites the block from the front of `src`, as far as it reaches.
    pub fn copy_from(&mut self, src: &[f32]) {
        let n = src.len().min(self.data.len());
        self.data[..n].copy_from_slice(&src[..n]);
    }

    /// Adds `src` sample by sample, as far as it reaches.
    pub fn add_from(&mut self, src: &[f32]) {
        for (dst, s) in self.data.iter_mut().zip(src) {
            *dst += *s;
        }
    }

    /// Fills the block with zeros.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Largest absolute sample value over all channels.
    pub fn peak(&self) -> f32 {
        self.data.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }
}

/// Owned planar block with the [`ProcessData`] layout.
#[derive(Debug, Clone, Default)]
pub struct AudioBuffer {
    data: Vec<f32>,
    num_channels: usize,
    num_samples: usize,
}

impl AudioBuffer {
    /// Creates a zeroed buffer.
    pub fn new(num_channels: usize, num_samples: usize) -> Self {
        Self {
            data: vec![0.0; num_channels * num_samples],
            num_channels,
            num_samples,
        }
    }

    /// Resizes and zeroes the buffer.
    pub fn resize(&mut self, num_channels: usize, num_samples: usize) {
        self.num_channels = num_channels;
        self.num_samples = num_samples;
        self.data.clear();
        self.data.resize(num_channels * num_samples, 0.0);
    }

    /// Number of channels.
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Number of samples per channel.
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Borrows the buffer for processing.
    pub fn as_process_data(&mut self) -> ProcessData<'_> {
        ProcessData {
            data: &mut self.data,
            num_channels: self.num_channels,
            num_samples: self.num_samples,
        }
    }

    /// Channel `index`, or an empty slice if out of range.
    pub fn channel(&self, index: usize) -> &[f32] {
        if index >= self.num_channels {
            return &[];
        }
        &self.data[index * self.num_samples..(index + 1) * self.num_samples]
    }

    /// Mutable channel `index`, or an empty slice if out of range.
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        if index >= self.num_channels {
            return &mut [];
        }
        &mut self.data[index * self.num_samples..(index + 1) * self.num_samples]
    }

    /// Largest absolute sample of channel `index`.
    pub fn channel_peak(&self, index: usize) -> f32 {
        self.channel(index)
            .iter()
            .fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Fills every channel with `value`.
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }
}
