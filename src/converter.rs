//! The streaming converter chaining the conversion stages.

use crate::common::{zeroed, ChannelCount, Sample};
use crate::config::{ConverterConfig, DitherMode};
use crate::conversions::{
    ChannelMixer, FormatConverter, FormatReader, FormatWriter, FrameProcessor, Resampler,
    SampleFormat,
};
use crate::{Error, Side};

/// Frames moved through the working buffers per iteration.
const CHUNK_FRAMES: usize = 1024;

/// Where [`Converter::process_frames`] takes its input from.
#[derive(Debug)]
pub enum FramesIn<'a> {
    /// Interleaved frames in the input format.
    Buffer(&'a [u8]),
    /// An endless source of silence, for flushing the resampler at the end of a stream.
    Silence,
}

/// Where [`Converter::process_frames`] writes its output to.
#[derive(Debug)]
pub enum FramesOut<'a> {
    /// Room for interleaved frames in the output format.
    Buffer(&'a mut [u8]),
    /// Advance through the input without writing anything, for seeking.
    Discard,
}

/// Frame counts of one [`Converter::process_frames`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessedFrames {
    /// Input frames consumed.
    pub frames_in: u64,
    /// Output frames produced, or skipped when discarding.
    pub frames_out: u64,
}

/// Input side of one call, read in chunks.
enum Source<'a> {
    Buffer(&'a [u8]),
    /// Encoded silence, one chunk long, handed out again and again.
    Silence(&'a [u8]),
}

impl Source<'_> {
    /// `frames` frames starting at frame `offset`.
    fn frames(&self, offset: u64, frames: usize, frame_bytes: usize) -> &[u8] {
        match self {
            Source::Buffer(buffer) => {
                // Offsets never exceed the frames held by the buffer.
                let start = offset as usize * frame_bytes;
                &buffer[start..start + frames * frame_bytes]
            }
            Source::Silence(silence) => &silence[..frames * frame_bytes],
        }
    }
}

/// Output side of one call, written in chunks.
enum Sink<'a> {
    Buffer(&'a mut [u8]),
    Discard,
}

impl Sink<'_> {
    fn frames(&mut self, offset: u64, frames: usize, frame_bytes: usize) -> Option<&mut [u8]> {
        match self {
            Sink::Buffer(buffer) => {
                let start = offset as usize * frame_bytes;
                Some(&mut buffer[start..start + frames * frame_bytes])
            }
            Sink::Discard => None,
        }
    }

    fn is_discard(&self) -> bool {
        matches!(self, Sink::Discard)
    }
}

/// Channel mixing and resampling between decoding and encoding.
struct Chain {
    reader: FormatReader,
    writer: FormatWriter,
    mixer: Option<ChannelMixer>,
    resampler: Option<Resampler>,
    /// Mix before resampling, so the resampler handles the fewer channels.
    mix_first: bool,
    channels_in: usize,
    channels_out: usize,
    /// Decoded input, then the final output of each chunk.
    front: Box<[Sample]>,
    /// Output of the first stage.
    back: Box<[Sample]>,
}

impl Chain {
    /// Runs one chunk of `staged` decoded input frames, producing at most `capacity` frames.
    ///
    /// Returns the frames consumed and produced, and whether the result is in `front`.
    fn transform(&mut self, staged: usize, capacity: usize) -> (usize, usize, bool) {
        let (ci, co) = (self.channels_in, self.channels_out);
        match (&mut self.mixer, &mut self.resampler) {
            (Some(mixer), Some(resampler)) if self.mix_first => {
                mixer.process_frames(&self.front[..staged * ci], &mut self.back[..staged * co]);
                let (consumed, produced) = resampler
                    .process_frames(&self.back[..staged * co], &mut self.front[..capacity * co]);
                (consumed, produced, true)
            }
            (Some(mixer), Some(resampler)) => {
                let (consumed, produced) = resampler
                    .process_frames(&self.front[..staged * ci], &mut self.back[..capacity * ci]);
                mixer.process_frames(&self.back[..produced * ci], &mut self.front[..produced * co]);
                (consumed, produced, true)
            }
            (Some(mixer), None) => {
                let (consumed, produced) = mixer
                    .process_frames(&self.front[..staged * ci], &mut self.back[..staged * co]);
                (consumed, produced, false)
            }
            (None, Some(resampler)) => {
                let (consumed, produced) = resampler
                    .process_frames(&self.front[..staged * ci], &mut self.back[..capacity * ci]);
                (consumed, produced, false)
            }
            (None, None) => {
                self.back[..staged * ci].copy_from_slice(&self.front[..staged * ci]);
                (staged, staged, false)
            }
        }
    }

    fn run(
        &mut self,
        source: &Source<'_>,
        sink: &mut Sink<'_>,
        limit_in: u64,
        limit_out: u64,
        frame_bytes: (usize, usize),
    ) -> Result<(u64, u64), Error> {
        let (in_bytes, out_bytes) = frame_bytes;
        let (mut consumed, mut produced) = (0u64, 0u64);

        loop {
            let capacity = (limit_out - produced).min(CHUNK_FRAMES as u64);
            let mut staged = (limit_in - consumed).min(CHUNK_FRAMES as u64);
            staged = match &self.resampler {
                // Also stage what the frame after the last one needs, the resampler loads it
                // before noticing the output is full.
                Some(resampler) => staged.min(resampler.required_input(capacity + 1)?),
                None => staged.min(capacity),
            };
            // Both are at most `CHUNK_FRAMES` now.
            let (staged, capacity) = (staged as usize, capacity as usize);

            let input = source.frames(consumed, staged, in_bytes);
            self.reader
                .process_frames(input, &mut self.front[..staged * self.channels_in]);

            let (c, p, in_front) = self.transform(staged, capacity);
            if let Some(output) = sink.frames(produced, p, out_bytes) {
                let result = if in_front { &self.front } else { &self.back };
                self.writer
                    .process_frames(&result[..p * self.channels_out], output);
            }

            consumed += c as u64;
            produced += p as u64;
            if c == 0 && p == 0 {
                break;
            }
        }
        Ok((consumed, produced))
    }
}

/// The stages a converter needs, fixed at construction.
enum Pipeline {
    /// Only the sample format changes, or nothing does.
    Format(FormatConverter),
    /// Channels or sample rate change.
    Full(Box<Chain>),
}

/// Live state of an open converter.
struct Inner {
    pipeline: Pipeline,
    /// One chunk of silence in the input format.
    silence: Box<[u8]>,
    in_frame_bytes: usize,
    out_frame_bytes: usize,
}

/// Converts a stream of PCM frames between sample formats, channel layouts and sample rates.
///
/// The converter is built once from a [`ConverterConfig`] and then fed buffers of any size
/// through [`Converter::process_frames`]. All state is allocated up front; processing never
/// allocates, locks or blocks, so it can run inside an audio callback.
///
/// Only the stages the configuration calls for are built. Input is decoded to working
/// precision first and encoded to the output format last. When both the channel count and
/// the sample rate change, the channel mixer runs before the resampler if it reduces the
/// channel count and after it otherwise, so the resampler always handles the smaller
/// number of channels.
///
/// # Example
///
/// ```rust
/// use pcmconv::{Converter, ConverterConfig, FramesIn, FramesOut, SampleFormat};
///
/// let config = ConverterConfig::new(SampleFormat::S16, SampleFormat::F32, 2, 1, 44_100, 48_000);
/// let mut converter = Converter::new(config)?;
///
/// let input = vec![0u8; 1000 * 4];
/// let frames_out = converter.expected_output_frame_count(1000)?;
/// let mut output = vec![0u8; frames_out as usize * 4];
///
/// let processed = converter.process_frames(
///     FramesIn::Buffer(&input),
///     1000,
///     FramesOut::Buffer(&mut output),
///     frames_out,
/// )?;
/// assert_eq!(processed.frames_in, 1000);
/// assert_eq!(processed.frames_out, frames_out);
/// # Ok::<(), pcmconv::Error>(())
/// ```
pub struct Converter {
    config: ConverterConfig,
    inner: Option<Inner>,
    frames_consumed: u64,
    frames_produced: u64,
}

impl Converter {
    /// Validates `config` and allocates every stage it needs.
    pub fn new(config: ConverterConfig) -> Result<Self, Error> {
        config.validate()?;

        let dither_mode = if config.format_in.narrows_to(config.format_out) {
            config.dither_mode
        } else {
            DitherMode::None
        };
        let needs_resampler = config.sample_rate_in != config.sample_rate_out;
        let mixer = ChannelMixer::new(
            config.channels_in,
            config.channels_out,
            &config.channel_mix_mode,
        )?;
        let needs_mixer = !mixer.is_identity();

        let pipeline = if !needs_mixer && !needs_resampler {
            Pipeline::Format(FormatConverter::new(
                config.format_in,
                config.format_out,
                config.channels_in,
                dither_mode,
                config.dither_seed,
            )?)
        } else {
            let mix_first = config.channels_out < config.channels_in;
            let resampler_channels = if needs_mixer && mix_first {
                config.channels_out
            } else {
                config.channels_in
            };
            let resampler = if needs_resampler {
                Some(Resampler::new(
                    config.sample_rate_in,
                    config.sample_rate_out,
                    resampler_channels,
                    &config.resampling,
                )?)
            } else {
                None
            };
            let width = usize::from(config.channels_in.max(config.channels_out));
            Pipeline::Full(Box::new(Chain {
                reader: FormatReader::new(config.format_in, config.channels_in),
                writer: FormatWriter::new(
                    config.format_out,
                    config.channels_out,
                    dither_mode,
                    config.dither_seed,
                )?,
                mixer: needs_mixer.then_some(mixer),
                resampler,
                mix_first,
                channels_in: usize::from(config.channels_in),
                channels_out: usize::from(config.channels_out),
                front: zeroed(CHUNK_FRAMES * width)?,
                back: zeroed(CHUNK_FRAMES * width)?,
            }))
        };
        let in_frame_bytes = config.format_in.bytes_per_frame(config.channels_in);
        let out_frame_bytes = config.format_out.bytes_per_frame(config.channels_out);
        let mut silence = zeroed(CHUNK_FRAMES * in_frame_bytes)?;
        encode_silence(config.format_in, config.channels_in, &mut silence)?;

        #[cfg(feature = "tracing")]
        match &pipeline {
            Pipeline::Format(_) => tracing::debug!(
                "converter ready: {:?} -> {:?}, format conversion only",
                config.format_in,
                config.format_out
            ),
            Pipeline::Full(chain) => tracing::debug!(
                "converter ready: {:?} {}ch {}Hz -> {:?} {}ch {}Hz, mixer: {}, resampler: {}, mix first: {}",
                config.format_in,
                config.channels_in,
                config.sample_rate_in,
                config.format_out,
                config.channels_out,
                config.sample_rate_out,
                chain.mixer.is_some(),
                chain.resampler.is_some(),
                chain.mix_first
            ),
        }

        Ok(Self {
            config,
            inner: Some(Inner {
                pipeline,
                silence,
                in_frame_bytes,
                out_frame_bytes,
            }),
            frames_consumed: 0,
            frames_produced: 0,
        })
    }

    fn inner(&self) -> Result<&Inner, Error> {
        self.inner.as_ref().ok_or(Error::Closed)
    }

    fn resampler(&self) -> Result<Option<&Resampler>, Error> {
        Ok(match &self.inner()?.pipeline {
            Pipeline::Full(chain) => chain.resampler.as_ref(),
            Pipeline::Format(_) => None,
        })
    }

    /// Input frames needed to produce `frame_count_out` output frames from the current state.
    ///
    /// Equal sample rates make this the identity. Does not change any state.
    pub fn required_input_frame_count(&self, frame_count_out: u64) -> Result<u64, Error> {
        match self.resampler()? {
            Some(resampler) => resampler.required_input(frame_count_out),
            None => Ok(frame_count_out),
        }
    }

    /// Output frames produced from exactly `frame_count_in` input frames, given enough room.
    ///
    /// Equal sample rates make this the identity. Does not change any state.
    pub fn expected_output_frame_count(&self, frame_count_in: u64) -> Result<u64, Error> {
        match self.resampler()? {
            Some(resampler) => resampler.expected_output(frame_count_in),
            None => Ok(frame_count_in),
        }
    }

    /// Converts up to `frame_count_in` input frames into up to `frame_count_out` output frames.
    ///
    /// Stops at whichever limit is reached first and reports how many frames were consumed
    /// and produced. A buffer shorter than its frame count is treated as holding only the
    /// whole frames it contains. If either count is 0 nothing happens.
    ///
    /// [`FramesIn::Silence`] feeds zeros, still limited by `frame_count_in`; pass
    /// `u64::MAX` for no limit. [`FramesOut::Discard`] advances all state as if the output had
    /// been written, without touching the dither sequence. Silence into discarded output
    /// with both counts at `u64::MAX` has no end and does nothing.
    ///
    /// Input the next output frame needs is consumed as soon as the current one is written,
    /// so `frames_in` can run past what the produced frames alone required. Downsampling by
    /// a large factor with a small `frame_count_out` consumes up to one ratio's worth of
    /// extra input.
    pub fn process_frames(
        &mut self,
        input: FramesIn<'_>,
        frame_count_in: u64,
        output: FramesOut<'_>,
        frame_count_out: u64,
    ) -> Result<ProcessedFrames, Error> {
        let inner = self.inner.as_mut().ok_or(Error::Closed)?;
        if frame_count_in == 0 || frame_count_out == 0 {
            return Ok(ProcessedFrames::default());
        }
        if matches!((&input, &output), (FramesIn::Silence, FramesOut::Discard))
            && frame_count_in == u64::MAX
            && frame_count_out == u64::MAX
        {
            #[cfg(feature = "tracing")]
            tracing::warn!("unbounded silence into discarded output, nothing to do");
            return Ok(ProcessedFrames::default());
        }
        let (in_bytes, out_bytes) = (inner.in_frame_bytes, inner.out_frame_bytes);

        let (source, limit_in) = match input {
            FramesIn::Buffer(buffer) => {
                let limit = clamp_to_buffer(frame_count_in, buffer.len(), in_bytes, Side::Input);
                (Source::Buffer(buffer), limit)
            }
            FramesIn::Silence => (Source::Silence(&inner.silence), frame_count_in),
        };
        let (mut sink, limit_out) = match output {
            FramesOut::Buffer(buffer) => {
                let limit = clamp_to_buffer(frame_count_out, buffer.len(), out_bytes, Side::Output);
                (Sink::Buffer(buffer), limit)
            }
            FramesOut::Discard => (Sink::Discard, frame_count_out),
        };
        if limit_in == 0 || limit_out == 0 {
            return Ok(ProcessedFrames::default());
        }

        let (frames_in, frames_out) = match &mut inner.pipeline {
            Pipeline::Format(converter) => {
                let total = limit_in.min(limit_out);
                if !sink.is_discard() {
                    let mut done = 0;
                    while done < total {
                        let frames = (total - done).min(CHUNK_FRAMES as u64) as usize;
                        let input = source.frames(done, frames, in_bytes);
                        if let Some(output) = sink.frames(done, frames, out_bytes) {
                            converter.process_frames(input, output);
                        }
                        done += frames as u64;
                    }
                }
                (total, total)
            }
            Pipeline::Full(chain) => {
                chain.run(&source, &mut sink, limit_in, limit_out, (in_bytes, out_bytes))?
            }
        };

        self.frames_consumed = self.frames_consumed.saturating_add(frames_in);
        self.frames_produced = self.frames_produced.saturating_add(frames_out);
        Ok(ProcessedFrames {
            frames_in,
            frames_out,
        })
    }

    /// Releases all conversion state.
    ///
    /// Every later call, including another `close`, returns [`Error::Closed`]. Dropping the
    /// converter releases the state as well.
    pub fn close(&mut self) -> Result<(), Error> {
        self.inner.take().ok_or(Error::Closed)?;
        #[cfg(feature = "tracing")]
        tracing::trace!(
            "converter closed after {} frames in, {} frames out",
            self.frames_consumed,
            self.frames_produced
        );
        Ok(())
    }

    /// Whether [`Converter::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// The configuration the converter was built from.
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Total input frames consumed so far.
    pub fn frames_consumed(&self) -> u64 {
        self.frames_consumed
    }

    /// Total output frames produced (or discarded) so far.
    pub fn frames_produced(&self) -> u64 {
        self.frames_produced
    }

    /// Input frames the output trails behind, 0 without resampling.
    pub fn input_latency(&self) -> Result<u64, Error> {
        Ok(self.resampler()?.map_or(0, Resampler::input_latency))
    }

    /// [`Converter::input_latency`] in output frames.
    pub fn output_latency(&self) -> Result<u64, Error> {
        Ok(self.resampler()?.map_or(0, Resampler::output_latency))
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .field("frames_consumed", &self.frames_consumed)
            .field("frames_produced", &self.frames_produced)
            .finish_non_exhaustive()
    }
}

/// Limits `frames` to the whole frames `len` bytes hold.
fn clamp_to_buffer(
    frames: u64,
    len: usize,
    frame_bytes: usize,
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))] side: Side,
) -> u64 {
    let held = (len / frame_bytes) as u64;
    if held < frames {
        #[cfg(feature = "tracing")]
        tracing::warn!("{side} buffer holds {held} frames, fewer than the {frames} requested");
        return held;
    }
    frames
}

/// Fills `buffer` with silent frames of `format`.
fn encode_silence(
    format: SampleFormat,
    channels: ChannelCount,
    buffer: &mut [u8],
) -> Result<(), Error> {
    let zeros: Box<[Sample]> = zeroed(CHUNK_FRAMES * usize::from(channels))?;
    let mut writer = FormatWriter::new(format, channels, DitherMode::None, 0)?;
    writer.process_frames(&zeros, buffer);
    Ok(())
}
