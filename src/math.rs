//! Math utilities shared by the conversion stages.

use crate::common::Sample;

/// Linear interpolation between two samples.
///
/// The result should be equivalent to
/// `first * (1 - numerator / denominator) + second * numerator / denominator`.
///
/// To avoid numeric overflows pick smaller numerator.
#[inline]
pub fn lerp(first: &Sample, second: &Sample, numerator: u64, denominator: u64) -> Sample {
    first + (second - first) * numerator as Sample / denominator as Sample
}

/// Normalized sinc function, `sin(pi x) / (pi x)`.
#[inline]
pub(crate) fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let x = std::f64::consts::PI * x;
        x.sin() / x
    }
}

/// Creates a `NonZero` constant, failing to compile on zero.
#[macro_export]
macro_rules! nz {
    ($n:literal) => {
        const { core::num::NonZero::new($n).unwrap() }
    };
}

pub use crate::nz;
