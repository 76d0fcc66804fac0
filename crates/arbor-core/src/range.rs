//! Numeric ranges, value converters, and connection operators.

use core::fmt;
use core::str::FromStr;

use libm::{exp, floor, log, pow};

use crate::ids::props;
use crate::math::{db_to_gain, freq_to_ms, gain_to_db, ms_to_freq};
use crate::tree::ValueTree;

/// A `[min, max]` range with optional step quantisation and skew.
///
/// Normalisation follows the usual audio-plugin convention: a normalised
/// value `p` in `[0, 1]` maps to `min + (max - min) * p^(1 / skew)`, then
/// snaps to the nearest step when `step > 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterRange {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
    /// Quantisation step, `0` for continuous.
    pub step: f64,
    /// Skew factor, `1` for linear.
    pub skew: f64,
}

impl Default for ParameterRange {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ParameterRange {
    /// The continuous linear `[0, 1]` range.
    pub const IDENTITY: Self = Self {
        min: 0.0,
        max: 1.0,
        step: 0.0,
        skew: 1.0,
    };

    /// A continuous linear range.
    pub const fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            step: 0.0,
            skew: 1.0,
        }
    }

    /// Returns the range with a step size.
    pub const fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Returns the range with a skew factor.
    pub const fn with_skew(mut self, skew: f64) -> Self {
        self.skew = skew;
        self
    }

    /// Reads `MinValue`, `MaxValue`, `StepSize`, `SkewFactor` from `tree`,
    /// defaulting to the identity range. Non-finite properties take their
    /// default.
    pub fn from_tree(tree: &ValueTree) -> Self {
        let read = |name, default: f64| {
            let v = tree.property_f64(name, default);
            if v.is_finite() { v } else { default }
        };
        let skew = read(props::SKEW_FACTOR, 1.0);
        Self {
            min: read(props::MIN_VALUE, 0.0),
            max: read(props::MAX_VALUE, 1.0),
            step: read(props::STEP_SIZE, 0.0).max(0.0),
            skew: if skew > 0.0 { skew } else { 1.0 },
        }
    }

    /// Writes the range properties to `tree`.
    pub fn store(&self, tree: &ValueTree) {
        tree.set_property(props::MIN_VALUE, self.min);
        tree.set_property(props::MAX_VALUE, self.max);
        tree.set_property(props::STEP_SIZE, self.step);
        tree.set_property(props::SKEW_FACTOR, self.skew);
    }

    /// Writes only the range properties `tree` does not have yet, silently.
    pub fn store_defaults(&self, tree: &ValueTree) {
        tree.set_default(props::MIN_VALUE, self.min);
        tree.set_default(props::MAX_VALUE, self.max);
        tree.set_default(props::STEP_SIZE, self.step);
        tree.set_default(props::SKEW_FACTOR, self.skew);
    }

    /// True for the continuous linear `[0, 1]` range.
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// True if `min > max`.
    pub fn is_inverted(&self) -> bool {
        self.min > self.max
    }

    /// Width of the range.
    pub fn length(&self) -> f64 {
        self.max - self.min
    }

    /// Maps `value` into `[0, 1]`, clamping outside values.
    pub fn to_normalised(&self, value: f64) -> f64 {
        let len = self.length();
        if len == 0.0 {
            return 0.0;
        }
        let p = ((value - self.min) / len).clamp(0.0, 1.0);
        if self.skew == 1.0 { p } else { pow(p, self.skew) }
    }

    /// Maps a normalised value back into the range, snapping to the step.
    pub fn from_normalised(&self, normalised: f64) -> f64 {
        let mut p = normalised.clamp(0.0, 1.0);
        if self.skew != 1.0 && p > 0.0 {
            p = exp(log(p) / self.skew);
        }
        self.snap(self.min + self.length() * p)
    }

    /// Snaps to the nearest step and clamps into the range.
    pub fn snap(&self, value: f64) -> f64 {
        let v = if self.step > 0.0 {
            self.min + self.step * floor((value - self.min) / self.step + 0.5)
        } else {
            value
        };
        self.clamp(v)
    }

    /// Clamps into `[min, max]` regardless of orientation.
    pub fn clamp(&self, value: f64) -> f64 {
        let (lo, hi) = self.bounds();
        // NaN bounds are ignored instead of panicking like `f64::clamp`.
        value.max(lo).min(hi)
    }

    /// Closed-interval membership test.
    pub fn contains(&self, value: f64) -> bool {
        let (lo, hi) = self.bounds();
        value >= lo && value <= hi
    }

    fn bounds(&self) -> (f64, f64) {
        if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        }
    }
}

/// Nonlinear remap applied after a connection's range mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    /// `db2gain`
    DecibelToGain,
    /// `gain2db`
    GainToDecibel,
    /// `1-x`
    SubtractFromOne,
    /// `ms2freq`
    MillisecondsToFrequency,
    /// `freq2ms`
    FrequencyToMilliseconds,
}

impl Converter {
    /// All converters, for listings and validation.
    pub const ALL: [Converter; 5] = [
        Converter::DecibelToGain,
        Converter::GainToDecibel,
        Converter::SubtractFromOne,
        Converter::MillisecondsToFrequency,
        Converter::FrequencyToMilliseconds,
    ];

    /// Identifier stored in the `Converter` property.
    pub fn id(self) -> &'static str {
        match self {
            Converter::DecibelToGain => "db2gain",
            Converter::GainToDecibel => "gain2db",
            Converter::SubtractFromOne => "1-x",
            Converter::MillisecondsToFrequency => "ms2freq",
            Converter::FrequencyToMilliseconds => "freq2ms",
        }
    }

    /// Applies the conversion.
    #[inline]
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Converter::DecibelToGain => db_to_gain(value),
            Converter::GainToDecibel => gain_to_db(value),
            Converter::SubtractFromOne => 1.0 - value,
            Converter::MillisecondsToFrequency => ms_to_freq(value),
            Converter::FrequencyToMilliseconds => freq_to_ms(value),
        }
    }
}

impl FromStr for Converter {
    type Err = UnknownId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Converter::ALL
            .into_iter()
            .find(|c| c.id() == s)
            .ok_or_else(|| UnknownId(s.to_string()))
    }
}

impl fmt::Display for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// How a connection applies its value to the target parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperatorType {
    /// Replace the base value and store it in the tree.
    #[default]
    SetValue,
    /// Set the additive modulation term.
    Add,
    /// Set the multiplicative modulation term.
    Multiply,
}

impl OperatorType {
    /// All operators, for listings and validation.
    pub const ALL: [OperatorType; 3] = [
        OperatorType::SetValue,
        OperatorType::Add,
        OperatorType::Multiply,
    ];

    /// Identifier stored in the `OpType` property.
    pub fn id(self) -> &'static str {
        match self {
            OperatorType::SetValue => "SetValue",
            OperatorType::Add => "Add",
            OperatorType::Multiply => "Multiply",
        }
    }
}

impl FromStr for OperatorType {
    type Err = UnknownId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperatorType::ALL
            .into_iter()
            .find(|op| op.id() == s)
            .ok_or_else(|| UnknownId(s.to_string()))
    }
}

impl fmt::Display for OperatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// An identifier that names no known converter or operator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown identifier '{0}'")]
pub struct UnknownId(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_normalisation() {
        let r = ParameterRange::new(20.0, 220.0);
        assert_eq!(r.to_normalised(120.0), 0.5);
        assert_eq!(r.from_normalised(0.25), 70.0);
        assert_eq!(r.to_normalised(-5.0), 0.0);
        assert_eq!(r.from_normalised(1.5), 220.0);
    }

    #[test]
    fn skewed_normalisation_inverts() {
        let r = ParameterRange::new(20.0, 20000.0).with_skew(0.3);
        for p in [0.1, 0.5, 0.9] {
            let v = r.from_normalised(p);
            assert!((r.to_normalised(v) - p).abs() < 1e-9);
        }
        assert!(r.from_normalised(0.5) < 10010.0);
    }

    #[test]
    fn step_snaps_to_grid() {
        let r = ParameterRange::new(0.0, 10.0).with_step(1.0);
        assert_eq!(r.from_normalised(0.33), 3.0);
        assert_eq!(r.from_normalised(0.36), 4.0);
    }

    #[test]
    fn identity_detection() {
        assert!(ParameterRange::IDENTITY.is_identity());
        assert!(!ParameterRange::new(0.0, 2.0).is_identity());
        assert!(!ParameterRange::IDENTITY.with_step(0.5).is_identity());
    }

    #[test]
    fn contains_is_closed_interval() {
        let r = ParameterRange::new(0.5, 1.0);
        assert!(r.contains(0.5));
        assert!(r.contains(1.0));
        assert!(!r.contains(0.4999));
    }

    #[test]
    fn range_reads_from_tree_with_defaults() {
        let tree = ValueTree::new("Parameter").with_property(props::MAX_VALUE, 4.0);
        let r = ParameterRange::from_tree(&tree);
        assert_eq!(r, ParameterRange::new(0.0, 4.0));
    }

    #[test]
    fn converter_ids_round_trip() {
        for c in Converter::ALL {
            assert_eq!(c.id().parse::<Converter>(), Ok(c));
        }
        assert!("nope".parse::<Converter>().is_err());
        assert_eq!(Converter::SubtractFromOne.apply(0.25), 0.75);
    }

    #[test]
    fn non_finite_tree_bounds_fall_back() {
        let tree = ValueTree::new("Parameter")
            .with_property(props::MIN_VALUE, f64::NAN)
            .with_property(props::MAX_VALUE, f64::INFINITY)
            .with_property(props::STEP_SIZE, f64::NAN);
        let r = ParameterRange::from_tree(&tree);
        assert_eq!(r, ParameterRange::IDENTITY);
        assert_eq!(r.clamp(0.5), 0.5);
    }

    #[test]
    fn clamp_survives_nan_bounds() {
        let r = ParameterRange::new(f64::NAN, 1.0);
        assert!(r.clamp(0.5).is_finite());
        assert_eq!(ParameterRange::new(0.0, 1.0).clamp(3.0), 1.0);
        assert_eq!(ParameterRange::new(1.0, 0.0).clamp(-3.0), 0.0);
    }

    #[test]
    fn operator_ids() {
        assert_eq!("Add".parse::<OperatorType>(), Ok(OperatorType::Add));
        assert_eq!(OperatorType::default(), OperatorType::SetValue);
        assert_eq!(
            "Divide".parse::<OperatorType>(),
            Err(UnknownId("Divide".into()))
        );
    }
}
