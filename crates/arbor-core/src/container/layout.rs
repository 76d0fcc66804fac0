//! Channel layout algorithms.
//!
//! Each function takes the channel budget of a container and a description of
//! its children in list order, and returns the channel count every child ends
//! up with. Fixed children and the child that caused the recompute keep their
//! current count.

use core::ops::Range;

/// Layout-relevant state of one child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildChannels {
    /// Current channel count.
    pub current: usize,
    /// The child declares a fixed channel requirement.
    pub fixed: bool,
    /// The child caused the recompute; its count is authoritative.
    pub is_cause: bool,
    /// Channels the child processes whatever its count, if that differs
    /// from the count (a modulation chain always processes one).
    pub processes: Option<usize>,
}

impl ChildChannels {
    /// A flexible child that did not cause the recompute.
    pub const fn flexible(current: usize) -> Self {
        Self {
            current,
            fixed: false,
            is_cause: false,
            processes: None,
        }
    }

    /// A fixed-channel child.
    pub const fn fixed(current: usize) -> Self {
        Self {
            current,
            fixed: true,
            is_cause: false,
            processes: None,
        }
    }

    /// Marks the child as the cause of the recompute.
    pub const fn cause(mut self) -> Self {
        self.is_cause = true;
        self
    }

    /// Pins the number of channels the child processes.
    pub const fn processing(mut self, channels: usize) -> Self {
        self.processes = Some(channels);
        self
    }

    /// Channels the child takes from a shared pool when it holds `count`.
    pub fn consumed(&self, count: usize) -> usize {
        self.processes.unwrap_or(count)
    }

    fn keeps_count(&self) -> bool {
        self.fixed || self.is_cause
    }
}

/// Every flexible child gets the full budget (serial and parallel layouts).
pub fn uniform(available: usize, children: &[ChildChannels]) -> Vec<usize> {
    children
        .iter()
        .map(|c| if c.keeps_count() { c.current } else { available })
        .collect()
}

/// Distributes the budget over disjoint channel ranges.
///
/// Fixed children are served first. The rest is divided evenly among the
/// flexible children in list order; each share is clamped into what is left,
/// and the pool shrinks by the channels the child actually processes with
/// the count it holds afterwards. Integer-division remainders stay
/// unassigned.
pub fn multi_channel(available: usize, children: &[ChildChannels]) -> Vec<usize> {
    let mut remaining = available as i64;
    let mut flexible = children.len() as i64;
    for child in children.iter().filter(|c| c.fixed) {
        remaining -= child.consumed(child.current) as i64;
        flexible -= 1;
    }

    if flexible <= 0 {
        return children.iter().map(|c| c.current).collect();
    }

    let per_child = remaining / flexible;
    children
        .iter()
        .map(|child| {
            if child.fixed {
                return child.current;
            }
            let share = per_child.min(remaining).max(0) as usize;
            let count = if child.is_cause { child.current } else { share };
            remaining -= child.consumed(count) as i64;
            count
        })
        .collect()
}

/// Channel ranges of children laid side by side, truncated to `available`.
pub fn channel_ranges(
    counts: impl IntoIterator<Item = usize>,
    available: usize,
) -> impl Iterator<Item = Range<usize>> {
    counts.into_iter().scan(0usize, move |offset, count| {
        let start = (*offset).min(available);
        let end = (*offset + count).min(available);
        *offset += count;
        Some(start..end)
    })
}
