//! Sample-wise arithmetic.

use arbor_core::{ParamSpec, ProcessData, Processor};

/// Operation of a [`MathOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathKind {
    /// `x * Value`
    Mul,
    /// `x + Value`
    Add,
    /// `0`
    Clear,
}

const MUL_PARAMS: [ParamSpec; 1] = [ParamSpec::new("Value", 0.0, 1.0, 1.0)];
const ADD_PARAMS: [ParamSpec; 1] = [ParamSpec::new("Value", -1.0, 1.0, 0.0)];

/// Applies one arithmetic operation to every sample.
#[derive(Debug, Clone, Copy)]
pub struct MathOp {
    kind: MathKind,
    value: f32,
}

impl MathOp {
    /// Operation with its default operand (1 for `Mul`, 0 otherwise).
    pub fn new(kind: MathKind) -> Self {
        let value = match kind {
            MathKind::Mul => 1.0,
            MathKind::Add | MathKind::Clear => 0.0,
        };
        Self { kind, value }
    }

    /// The operation.
    pub fn kind(&self) -> MathKind {
        self.kind
    }

    #[inline]
    fn apply(&self, s: f32) -> f32 {
        match self.kind {
            MathKind::Mul => s * self.value,
            MathKind::Add => s + self.value,
            MathKind::Clear => 0.0,
        }
    }
}

impl Processor for MathOp {
    fn params(&self) -> &[ParamSpec] {
        match self.kind {
            MathKind::Mul => &MUL_PARAMS,
            MathKind::Add => &ADD_PARAMS,
            MathKind::Clear => &[],
        }
    }

    fn set_param(&mut self, index: usize, value: f64) {
        if index == 0 {
            self.value = value as f32;
        }
    }

    fn process(&mut self, data: &mut ProcessData<'_>) {
        if self.kind == MathKind::Clear {
            data.clear();
            return;
        }
        data.as_mut_slice().iter_mut().for_each(|s| *s = self.apply(*s));
    }

    fn process_frame(&mut self, frame: &mut [f32]) {
        frame.iter_mut().for_each(|s| *s = self.apply(*s));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations() {
        let mut mul = MathOp::new(MathKind::Mul);
        mul.set_param(0, 0.5);
        let mut add = MathOp::new(MathKind::Add);
        add.set_param(0, 0.25);
        let mut clear = MathOp::new(MathKind::Clear);

        let mut frame = [1.0f32, -1.0];
        mul.process_frame(&mut frame);
        assert_eq!(frame, [0.5, -0.5]);
        add.process_frame(&mut frame);
        assert_eq!(frame, [0.75, -0.25]);
        clear.process(&mut ProcessData::new(&mut frame, 2));
        assert_eq!(frame, [0.0, 0.0]);
    }

    #[test]
    fn clear_has_no_parameters() {
        assert!(MathOp::new(MathKind::Clear).params().is_empty());
        assert_eq!(MathOp::new(MathKind::Mul).params()[0].default, 1.0);
        assert_eq!(MathOp::new(MathKind::Add).params()[0].range.min, -1.0);
    }
}
