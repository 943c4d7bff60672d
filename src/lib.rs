//! Streaming conversion of interleaved PCM frames.
//!
//! A [`Converter`] adapts audio between three independent properties of a stream:
//!
//! - the sample encoding ([`SampleFormat`]): unsigned 8-bit, signed 16, 24 and 32-bit
//!   integers and 32-bit floats, with optional dither when precision is reduced,
//! - the channel layout: any channel count to any other through a weight matrix, either
//!   derived from speaker positions or supplied by the caller ([`ChannelMixMode`]),
//! - the sample rate: linear interpolation with a Butterworth low-pass filter, or windowed
//!   sinc interpolation ([`config::ResampleConfig`]).
//!
//! The converter is fed caller-owned byte buffers of any size, keeps its resampling phase
//! and filter history between calls, and never allocates after construction, so it can be
//! driven from a real-time audio callback. Two queries,
//! [`Converter::required_input_frame_count`] and [`Converter::expected_output_frame_count`],
//! tell exactly how many frames the next call needs and produces.
//!
//! ```rust
//! use pcmconv::{Converter, ConverterConfig, DitherMode, FramesIn, FramesOut, SampleFormat};
//!
//! // 48 kHz float stereo to 44.1 kHz 16-bit mono.
//! let config = ConverterConfig::new(SampleFormat::F32, SampleFormat::S16, 2, 1, 48_000, 44_100)
//!     .with_dither(DitherMode::Triangular);
//! let mut converter = Converter::new(config)?;
//!
//! let input = vec![0u8; 480 * 2 * 4];
//! let mut output = vec![0u8; 441 * 2];
//! let processed =
//!     converter.process_frames(FramesIn::Buffer(&input), 480, FramesOut::Buffer(&mut output), 441)?;
//! assert!(processed.frames_out <= 441);
//!
//! // Push the frames still held by the resampler out with silence.
//! let latency = converter.output_latency()?;
//! converter.process_frames(FramesIn::Silence, u64::MAX, FramesOut::Discard, latency)?;
//! converter.close()?;
//! # Ok::<(), pcmconv::Error>(())
//! ```
//!
//! The individual stages are available in [`conversions`] for callers that assemble their own
//! pipeline; they all implement [`conversions::FrameProcessor`].
//!
//! # Features
//!
//! - `tracing`: log converter construction, teardown and short buffers with `tracing`.
//! - `64bit`: process with 64-bit floats instead of 32-bit ones.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod common;
mod converter;
mod error;

pub mod config;
pub mod conversions;
pub mod math;

pub use crate::common::{ChannelCount, Sample, SampleRate};
pub use crate::config::{ChannelMixMode, ConverterConfig, DitherMode};
pub use crate::conversions::SampleFormat;
pub use crate::converter::{Converter, FramesIn, FramesOut, ProcessedFrames};
pub use crate::error::{ConfigError, Error, Side};
