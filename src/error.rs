use std::fmt;

use crate::common::assert_error_traits;

/// Which end of the conversion a configuration problem refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The frames handed to the converter.
    Input,
    /// The frames produced by the converter.
    Output,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Input => f.write_str("input"),
            Side::Output => f.write_str("output"),
        }
    }
}

/// A [`ConverterConfig`](crate::ConverterConfig) value that can not be turned into a converter.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The sample format is `Unknown`.
    #[error("The {0} sample format is unknown")]
    UnknownFormat(Side),
    /// A channel count of zero was requested.
    #[error("The {0} channel count must be at least 1")]
    ZeroChannels(Side),
    /// A sample rate of zero was requested.
    #[error("The {0} sample rate must be at least 1 Hz")]
    ZeroSampleRate(Side),
    /// The linear resampler's low-pass filter order is not supported.
    #[error("Low-pass filter order {order} is above the supported maximum of {max}")]
    LpfOrder { order: u32, max: u32 },
    /// The sinc resampler's filter length is not supported.
    #[error("Sinc length {len} must be even and between 2 and {max}")]
    SincLen { len: usize, max: usize },
    /// The sinc resampler's oversampling factor is not supported.
    #[error("Oversampling factor {factor} must be between 1 and {max}")]
    OversamplingFactor { factor: usize, max: usize },
    /// A custom channel matrix does not match the channel counts.
    #[error(
        "Custom channel matrix is {rows}x{columns}, expected {expected_rows}x{expected_columns}"
    )]
    MatrixDimensions {
        rows: usize,
        columns: usize,
        expected_rows: usize,
        expected_columns: usize,
    },
    /// A custom channel matrix contains NaN or an infinite weight.
    #[error("Custom channel matrix has a non-finite weight at [{row}][{column}]")]
    NonFiniteWeight { row: usize, column: usize },
}
assert_error_traits! {ConfigError}

/// Errors reported by the converter and its stages.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The configuration was rejected before any state was allocated.
    #[error("Invalid converter configuration")]
    InvalidConfiguration(#[from] ConfigError),
    /// The converter state could not be allocated.
    #[error("Could not allocate the converter state")]
    OutOfMemory,
    /// An invariant inside a stage was violated, for example a frame count overflowed.
    #[error("Internal converter fault: {0}")]
    InternalFault(&'static str),
    /// The converter was used after [`Converter::close`](crate::Converter::close).
    #[error("The converter has been closed")]
    Closed,
}
assert_error_traits! {Error}
