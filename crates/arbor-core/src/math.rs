//! Level, time, and mixing helpers shared by converters and processors.

use libm::{exp, expf, log10};

/// Gain below this level in decibels is treated as silence.
pub const MINUS_INFINITY_DB: f64 = -100.0;

/// Convert decibels to linear gain (f32, audio path).
///
/// ```rust
/// use arbor_core::math::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 1e-6);
/// assert!((db_to_linear(-6.02) - 0.5).abs() < 0.01);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert decibels to gain, mapping anything at or below
/// [`MINUS_INFINITY_DB`] to zero.
#[inline]
pub fn db_to_gain(db: f64) -> f64 {
    if db > MINUS_INFINITY_DB {
        exp(db * core::f64::consts::LN_10 / 20.0)
    } else {
        0.0
    }
}

/// Convert gain to decibels, floored at [`MINUS_INFINITY_DB`].
#[inline]
pub fn gain_to_db(gain: f64) -> f64 {
    if gain > 0.0 {
        (20.0 * log10(gain)).max(MINUS_INFINITY_DB)
    } else {
        MINUS_INFINITY_DB
    }
}

/// Convert a period in milliseconds to a frequency in Hz. Zero maps to zero.
#[inline]
pub fn ms_to_freq(ms: f64) -> f64 {
    if ms == 0.0 { 0.0 } else { 1000.0 / ms }
}

/// Convert a frequency in Hz to a period in milliseconds. Zero maps to zero.
#[inline]
pub fn freq_to_ms(freq: f64) -> f64 {
    if freq == 0.0 { 0.0 } else { 1000.0 / freq }
}

/// Crossfade between dry and wet: `mix = 0` is dry, `mix = 1` is wet.
#[inline]
pub fn wet_dry_mix(dry: f32, wet: f32, mix: f32) -> f32 {
    dry + (wet - dry) * mix
}
