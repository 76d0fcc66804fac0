//! Per-variant processing of a container's children.
//!
//! These run on the audio path: no allocation, no tree access.

use crate::buffer::ProcessData;
use crate::node::{Node, NodeRef};

use super::layout::channel_ranges;

/// Largest frame a split processes per sample; extra channels are left as is.
pub const MAX_FRAME_CHANNELS: usize = 16;

/// Children in list order, each on its leading channels of the block.
pub(super) fn serial(nodes: &[NodeRef], data: &mut ProcessData<'_>) {
    for node in nodes {
        node.process(&mut data.sub_channels(0..node.num_channels_to_process()));
    }
}

pub(super) fn serial_frame(nodes: &[NodeRef], frame: &mut [f32]) {
    for node in nodes {
        let n = node.num_channels_to_process().min(frame.len());
        node.process_single(&mut frame[..n]);
    }
}

/// The first child runs on the live block; every other child runs on a fresh
/// copy of the input and its output is summed into the block.
///
/// `scratch` needs room for two copies of the block; if it is shorter nothing
/// is processed.
pub(super) fn split(nodes: &[NodeRef], scratch: &mut [f32], data: &mut ProcessData<'_>) {
    let len = data.len();
    if nodes.is_empty() || scratch.len() < 2 * len {
        return;
    }
    let (original, rest) = scratch.split_at_mut(len);
    let work = &mut rest[..len];
    data.copy_to(original);

    let num_channels = data.num_channels();
    for (index, node) in nodes.iter().enumerate() {
        let channels = 0..node.num_channels_to_process();
        if index == 0 {
            node.process(&mut data.sub_channels(channels));
        } else {
            work.copy_from_slice(original);
            let mut copy = ProcessData::new(&mut *work, num_channels);
            node.process(&mut copy.sub_channels(channels));
            data.add_from(copy.as_slice());
        }
    }
}

pub(super) fn split_frame(nodes: &[NodeRef], frame: &mut [f32]) {
    let nc = frame.len().min(MAX_FRAME_CHANNELS);
    let mut original = [0.0f32; MAX_FRAME_CHANNELS];
    let mut work = [0.0f32; MAX_FRAME_CHANNELS];
    original[..nc].copy_from_slice(&frame[..nc]);

    for (index, node) in nodes.iter().enumerate() {
        let n = node.num_channels_to_process().min(nc);
        if index == 0 {
            node.process_single(&mut frame[..n]);
        } else {
            work[..nc].copy_from_slice(&original[..nc]);
            node.process_single(&mut work[..n]);
            for (out, w) in frame[..nc].iter_mut().zip(&work[..nc]) {
                *out += *w;
            }
        }
    }
}

/// Children on disjoint, consecutive channel ranges.
pub(super) fn multi(nodes: &[NodeRef], data: &mut ProcessData<'_>) {
    let ranges = channel_ranges(
        nodes.iter().map(|n| n.num_channels_to_process()),
        data.num_channels(),
    );
    for (node, range) in nodes.iter().zip(ranges) {
        node.process(&mut data.sub_channels(range));
    }
}

pub(super) fn multi_frame(nodes: &[NodeRef], frame: &mut [f32]) {
    let ranges = channel_ranges(
        nodes.iter().map(|n| n.num_channels_to_process()),
        frame.len(),
    );
    for (node, range) in nodes.iter().zip(ranges) {
        node.process_single(&mut frame[range]);
    }
}

/// Runs the children on a cleared mono control block and returns its peak.
pub(super) fn modulation(nodes: &[NodeRef], block: &mut [f32]) -> f32 {
    block.fill(0.0);
    let mut control = ProcessData::new(block, 1);
    for node in nodes {
        node.process(&mut control);
    }
    control.peak()
}

/// Per-frame variant of [`modulation`] on a single control sample.
pub(super) fn modulation_frame(nodes: &[NodeRef]) -> f32 {
    let mut value = [0.0f32];
    for node in nodes {
        node.process_single(&mut value);
    }
    value[0]
}
