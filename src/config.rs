//! Converter configuration.
//!
//! A [`ConverterConfig`] is built once, handed to [`Converter::new`](crate::Converter::new) and
//! never changes afterwards. Build a new converter to change any of it.
//!
//! ```rust
//! use pcmconv::{ChannelMixMode, ConverterConfig, DitherMode, SampleFormat};
//! use pcmconv::config::ResampleConfig;
//!
//! let config = ConverterConfig::new(SampleFormat::F32, SampleFormat::S16, 2, 1, 48_000, 44_100)
//!     .with_dither(DitherMode::Triangular)
//!     .with_channel_mix(ChannelMixMode::Simple)
//!     .with_resampling(ResampleConfig::linear().lpf_order(8));
//! ```

use std::num::NonZero;

use crate::common::{ChannelCount, Sample, SampleRate};
use crate::conversions::SampleFormat;
use crate::error::{ConfigError, Side};

/// Default order of the linear resampler's low-pass filter.
pub const DEFAULT_LPF_ORDER: u32 = 4;
/// Highest supported order of the linear resampler's low-pass filter.
pub const MAX_LPF_ORDER: u32 = 8;
/// Longest supported sinc filter, in taps.
pub const MAX_SINC_LEN: usize = 512;
/// Highest supported number of table points between two sinc taps.
pub const MAX_OVERSAMPLING_FACTOR: usize = 4096;

/// Seed of the dither noise generator unless configured otherwise.
pub const DEFAULT_DITHER_SEED: u64 = 0x5eed_d17e_0000_0001;

/// Noise added before quantizing to a narrower integer format.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DitherMode {
    /// Round to the nearest value, no noise.
    #[default]
    None,

    /// RPDF (Rectangular PDF) - uniform noise of ±0.5 LSB.
    Rectangular,

    /// TPDF (Triangular PDF) - the sum of two uniform ±0.5 LSB sources.
    ///
    /// Removes the correlation between the signal and the quantization error that
    /// rectangular dither leaves behind at low levels.
    Triangular,
}

/// How input channels are mapped onto output channels.
#[derive(Debug, Default, Clone, PartialEq)]
pub enum ChannelMixMode {
    /// Map matching speaker positions, fold missing ones into their neighbours, silence the
    /// rest. See [`ChannelMixer`](crate::conversions::ChannelMixer) for the exact rules.
    #[default]
    Simple,

    /// Explicit weights, one row per output channel with one weight per input channel.
    Custom(Vec<Vec<Sample>>),
}

/// Window applied to the sinc filter.
///
/// The window trades transition bandwidth against stopband attenuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowFunction {
    /// Hann window: ~44 dB stopband attenuation.
    Hann,

    /// Blackman window: ~75 dB stopband attenuation.
    Blackman,

    /// Blackman-Harris window: ~92 dB stopband attenuation, widest transition band.
    #[default]
    BlackmanHarris,
}

/// Sample rate conversion algorithm and its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResampleConfig {
    /// Linear interpolation followed (upsampling) or preceded (downsampling) by a
    /// Butterworth low-pass filter.
    Linear {
        /// Filter order, `0` disables the filter.
        lpf_order: u32,
    },
    /// Windowed sinc interpolation (high quality, anti-aliasing).
    Sinc {
        /// Number of input frames the filter spans.
        sinc_len: usize,
        /// Number of precomputed filter points between two taps.
        oversampling_factor: usize,
        /// Window function to use.
        window: WindowFunction,
    },
}

impl ResampleConfig {
    /// Create a linear resampling configuration builder.
    pub fn linear() -> LinearConfigBuilder {
        LinearConfigBuilder::default()
    }

    /// Create a sinc resampling configuration builder.
    pub fn sinc() -> SincConfigBuilder {
        SincConfigBuilder::default()
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            ResampleConfig::Linear { lpf_order } => {
                if lpf_order > MAX_LPF_ORDER {
                    return Err(ConfigError::LpfOrder {
                        order: lpf_order,
                        max: MAX_LPF_ORDER,
                    });
                }
            }
            ResampleConfig::Sinc {
                sinc_len,
                oversampling_factor,
                ..
            } => {
                if sinc_len < 2 || sinc_len > MAX_SINC_LEN || sinc_len % 2 != 0 {
                    return Err(ConfigError::SincLen {
                        len: sinc_len,
                        max: MAX_SINC_LEN,
                    });
                }
                if oversampling_factor == 0 || oversampling_factor > MAX_OVERSAMPLING_FACTOR {
                    return Err(ConfigError::OversamplingFactor {
                        factor: oversampling_factor,
                        max: MAX_OVERSAMPLING_FACTOR,
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self::Linear {
            lpf_order: DEFAULT_LPF_ORDER,
        }
    }
}

/// Builder for the linear resampling configuration.
#[derive(Debug, Clone)]
pub struct LinearConfigBuilder {
    lpf_order: u32,
}

impl Default for LinearConfigBuilder {
    fn default() -> Self {
        Self {
            lpf_order: DEFAULT_LPF_ORDER,
        }
    }
}

impl LinearConfigBuilder {
    /// Set the low-pass filter order (0 to [`MAX_LPF_ORDER`]).
    ///
    /// Higher orders attenuate aliasing more steeply at the cost of group delay. The value is
    /// validated when the converter is built.
    pub fn lpf_order(mut self, order: u32) -> Self {
        self.lpf_order = order;
        self
    }

    /// Build the final [`ResampleConfig`].
    pub fn build(self) -> ResampleConfig {
        ResampleConfig::Linear {
            lpf_order: self.lpf_order,
        }
    }
}

impl From<LinearConfigBuilder> for ResampleConfig {
    fn from(builder: LinearConfigBuilder) -> Self {
        builder.build()
    }
}

/// Builder for the sinc resampling configuration.
#[derive(Debug, Clone)]
pub struct SincConfigBuilder {
    sinc_len: usize,
    oversampling_factor: usize,
    window: WindowFunction,
}

impl Default for SincConfigBuilder {
    fn default() -> Self {
        Self {
            sinc_len: 64,
            oversampling_factor: 256,
            window: WindowFunction::default(),
        }
    }
}

impl SincConfigBuilder {
    /// Set the length of the sinc filter in taps (even, at most [`MAX_SINC_LEN`]).
    ///
    /// Longer filters provide better quality but use more CPU and add latency.
    pub fn sinc_len(mut self, len: NonZero<usize>) -> Self {
        self.sinc_len = len.get();
        self
    }

    /// Set oversampling factor (typical range: 64-4096).
    ///
    /// Higher values improve interpolation accuracy but increase memory usage.
    pub fn oversampling_factor(mut self, factor: NonZero<usize>) -> Self {
        self.oversampling_factor = factor.get();
        self
    }

    /// Set window function.
    pub fn window(mut self, window: WindowFunction) -> Self {
        self.window = window;
        self
    }

    /// Build the final [`ResampleConfig`].
    pub fn build(self) -> ResampleConfig {
        ResampleConfig::Sinc {
            sinc_len: self.sinc_len,
            oversampling_factor: self.oversampling_factor,
            window: self.window,
        }
    }
}

impl From<SincConfigBuilder> for ResampleConfig {
    fn from(builder: SincConfigBuilder) -> Self {
        builder.build()
    }
}

/// Everything a [`Converter`](crate::Converter) needs to know up front.
#[derive(Debug, Clone, PartialEq)]
pub struct ConverterConfig {
    /// Encoding of the input frames.
    pub format_in: SampleFormat,
    /// Encoding of the output frames.
    pub format_out: SampleFormat,
    /// Channels per input frame.
    pub channels_in: ChannelCount,
    /// Channels per output frame.
    pub channels_out: ChannelCount,
    /// Input frames per second.
    pub sample_rate_in: SampleRate,
    /// Output frames per second.
    pub sample_rate_out: SampleRate,
    /// Dither used when the output format is narrower than the input format.
    pub dither_mode: DitherMode,
    /// Seed of the dither noise, so the same configuration always yields the same output.
    pub dither_seed: u64,
    /// Channel mapping policy.
    pub channel_mix_mode: ChannelMixMode,
    /// Resampling algorithm, used only when the sample rates differ.
    pub resampling: ResampleConfig,
}

impl ConverterConfig {
    /// Creates a configuration without dither, with the simple channel mix and the default
    /// linear resampler.
    pub fn new(
        format_in: SampleFormat,
        format_out: SampleFormat,
        channels_in: ChannelCount,
        channels_out: ChannelCount,
        sample_rate_in: SampleRate,
        sample_rate_out: SampleRate,
    ) -> Self {
        Self {
            format_in,
            format_out,
            channels_in,
            channels_out,
            sample_rate_in,
            sample_rate_out,
            dither_mode: DitherMode::default(),
            dither_seed: DEFAULT_DITHER_SEED,
            channel_mix_mode: ChannelMixMode::default(),
            resampling: ResampleConfig::default(),
        }
    }

    /// Set the dither mode.
    pub fn with_dither(mut self, mode: DitherMode) -> Self {
        self.dither_mode = mode;
        self
    }

    /// Set the seed of the dither noise generator.
    pub fn with_dither_seed(mut self, seed: u64) -> Self {
        self.dither_seed = seed;
        self
    }

    /// Set the channel mix policy.
    pub fn with_channel_mix(mut self, mode: ChannelMixMode) -> Self {
        self.channel_mix_mode = mode;
        self
    }

    /// Set the resampling algorithm.
    pub fn with_resampling(mut self, resampling: impl Into<ResampleConfig>) -> Self {
        self.resampling = resampling.into();
        self
    }

    /// Checks every field, reporting the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.format_in == SampleFormat::Unknown {
            return Err(ConfigError::UnknownFormat(Side::Input));
        }
        if self.format_out == SampleFormat::Unknown {
            return Err(ConfigError::UnknownFormat(Side::Output));
        }
        if self.channels_in == 0 {
            return Err(ConfigError::ZeroChannels(Side::Input));
        }
        if self.channels_out == 0 {
            return Err(ConfigError::ZeroChannels(Side::Output));
        }
        if self.sample_rate_in == 0 {
            return Err(ConfigError::ZeroSampleRate(Side::Input));
        }
        if self.sample_rate_out == 0 {
            return Err(ConfigError::ZeroSampleRate(Side::Output));
        }
        if let ChannelMixMode::Custom(weights) = &self.channel_mix_mode {
            validate_matrix(weights, self.channels_in, self.channels_out)?;
        }
        self.resampling.validate()
    }
}

pub(crate) fn validate_matrix(
    weights: &[Vec<Sample>],
    channels_in: ChannelCount,
    channels_out: ChannelCount,
) -> Result<(), ConfigError> {
    let expected_rows = usize::from(channels_out);
    let expected_columns = usize::from(channels_in);
    let mismatch = |rows: usize, columns: usize| ConfigError::MatrixDimensions {
        rows,
        columns,
        expected_rows,
        expected_columns,
    };

    if weights.len() != expected_rows {
        let columns = weights.first().map_or(0, Vec::len);
        return Err(mismatch(weights.len(), columns));
    }
    for (row, row_weights) in weights.iter().enumerate() {
        if row_weights.len() != expected_columns {
            return Err(mismatch(weights.len(), row_weights.len()));
        }
        if let Some(column) = row_weights.iter().position(|w| !w.is_finite()) {
            return Err(ConfigError::NonFiniteWeight { row, column });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nz;

    fn stereo_to_mono() -> ConverterConfig {
        ConverterConfig::new(SampleFormat::S16, SampleFormat::F32, 2, 1, 44_100, 48_000)
    }

    #[test]
    fn defaults() {
        let config = stereo_to_mono();
        assert_eq!(config.dither_mode, DitherMode::None);
        assert_eq!(config.channel_mix_mode, ChannelMixMode::Simple);
        assert_eq!(
            config.resampling,
            ResampleConfig::Linear {
                lpf_order: DEFAULT_LPF_ORDER
            }
        );
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_unknown_formats_and_zeroes() {
        let mut config = stereo_to_mono();
        config.format_out = SampleFormat::Unknown;
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownFormat(Side::Output))
        );

        let mut config = stereo_to_mono();
        config.channels_in = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroChannels(Side::Input)));

        let mut config = stereo_to_mono();
        config.sample_rate_out = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroSampleRate(Side::Output))
        );
    }

    #[test]
    fn rejects_out_of_range_resamplers() {
        let config = stereo_to_mono().with_resampling(ResampleConfig::linear().lpf_order(9));
        assert_eq!(
            config.validate(),
            Err(ConfigError::LpfOrder { order: 9, max: 8 })
        );

        let config = stereo_to_mono().with_resampling(ResampleConfig::sinc().sinc_len(nz!(7)));
        assert_eq!(
            config.validate(),
            Err(ConfigError::SincLen { len: 7, max: MAX_SINC_LEN })
        );

        let config = stereo_to_mono()
            .with_resampling(ResampleConfig::sinc().oversampling_factor(nz!(100_000)));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OversamplingFactor { factor: 100_000, .. })
        ));
    }

    #[test]
    fn rejects_mismatched_matrices() {
        let config = stereo_to_mono().with_channel_mix(ChannelMixMode::Custom(vec![vec![1.0]]));
        assert_eq!(
            config.validate(),
            Err(ConfigError::MatrixDimensions {
                rows: 1,
                columns: 1,
                expected_rows: 1,
                expected_columns: 2,
            })
        );

        let config = stereo_to_mono()
            .with_channel_mix(ChannelMixMode::Custom(vec![vec![0.5, Sample::NAN]]));
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonFiniteWeight { row: 0, column: 1 })
        );

        let config =
            stereo_to_mono().with_channel_mix(ChannelMixMode::Custom(vec![vec![0.25, 0.75]]));
        assert_eq!(config.validate(), Ok(()));
    }
}
