//! Sample rate conversion of interleaved frames.

use num_rational::Ratio;

use super::FrameProcessor;
use crate::common::{ChannelCount, Sample, SampleRate};
use crate::config::ResampleConfig;
use crate::Error;

mod linear;
mod lowpass;
mod sinc;


use linear::LinearKernel;
use sinc::SincKernel;

#[derive(Clone, Debug)]
enum Kernel {
    Linear(LinearKernel),
    Sinc(SincKernel),
}

impl Kernel {
    #[inline]
    fn load(&mut self, frame: &[Sample]) {
        match self {
            Kernel::Linear(kernel) => kernel.load(frame),
            Kernel::Sinc(kernel) => kernel.load(frame),
        }
    }

    #[inline]
    fn interpolate(&mut self, numerator: u64, denominator: u64, output: &mut [Sample]) {
        match self {
            Kernel::Linear(kernel) => kernel.interpolate(numerator, denominator, output),
            Kernel::Sinc(kernel) => kernel.interpolate(numerator, denominator, output),
        }
    }

    fn input_latency(&self) -> u64 {
        match self {
            Kernel::Linear(kernel) => kernel.input_latency(),
            Kernel::Sinc(kernel) => kernel.input_latency(),
        }
    }
}

/// Converts interleaved frames from one sample rate to another.
///
/// Output frames are produced on a fixed grid: output frame `k` sits at input position
/// `k * from / to`, where `from / to` is the ratio of the input to the output rate reduced
/// to lowest terms. The position is tracked exactly as an integer part and a fraction of
/// `to`, so arbitrarily long streams never drift.
///
/// The resampler is a streaming stage: input frames it consumed but did not yet need are
/// kept in its history, and calls can hand it any number of frames. The frame count
/// queries [`Resampler::required_input`] and [`Resampler::expected_output`] predict
/// exactly what the next [`FrameProcessor::process_frames`] call does.
///
/// Input is loaded before output room is checked, so a call keeps consuming the frames the
/// next output needs after the output slice is full.
#[derive(Clone, Debug)]
pub struct Resampler {
    channels: usize,
    /// We convert chunks of `from` input frames into chunks of `to` output frames.
    from: u32,
    /// We convert chunks of `from` input frames into chunks of `to` output frames.
    to: u32,
    /// Whole input frames to load before the next output frame.
    time_int: u64,
    /// Position of the next output frame between the two newest loaded frames, in `1 / to`.
    time_frac: u64,
    advance_int: u64,
    advance_frac: u64,
    kernel: Kernel,
}

impl Resampler {
    /// Resampler from `from` to `to` Hz for frames of `channels` channels.
    ///
    /// # Panic
    ///
    /// Panics if `from`, `to` or `channels` are 0.
    pub fn new(
        from: SampleRate,
        to: SampleRate,
        channels: ChannelCount,
        config: &ResampleConfig,
    ) -> Result<Self, Error> {
        assert!(channels >= 1);
        assert!(from >= 1);
        assert!(to >= 1);
        config.validate()?;

        // Reducing to keep the phase arithmetic small.
        let (to, from) = Ratio::new(to, from).into_raw();
        let channels = usize::from(channels);

        let kernel = match *config {
            ResampleConfig::Linear { lpf_order } => {
                Kernel::Linear(LinearKernel::new(channels, from, to, lpf_order)?)
            }
            ResampleConfig::Sinc {
                sinc_len,
                oversampling_factor,
                window,
            } => Kernel::Sinc(SincKernel::new(
                channels,
                from,
                to,
                sinc_len,
                oversampling_factor,
                window,
            )?),
        };

        Ok(Self {
            channels,
            from,
            to,
            time_int: 1,
            time_frac: 0,
            advance_int: u64::from(from / to),
            advance_frac: u64::from(from % to),
            kernel,
        })
    }

    /// The conversion ratio as reduced `(input, output)` frame counts.
    pub fn ratio(&self) -> (u32, u32) {
        (self.from, self.to)
    }

    /// Position of the next output frame, in `1 / to` input frames, counted from the frame
    /// before the next one to load.
    fn phase(&self) -> u128 {
        u128::from(self.time_int) * u128::from(self.to) + u128::from(self.time_frac)
    }

    /// Input frames the next call needs to produce `output_frames` frames.
    ///
    /// Returns at least 1 for a non-zero request, so a caller staging input always feeds
    /// the resampler.
    pub fn required_input(&self, output_frames: u64) -> Result<u64, Error> {
        if output_frames == 0 {
            return Ok(0);
        }
        let last = self.phase() + u128::from(output_frames - 1) * u128::from(self.from);
        let frames = last / u128::from(self.to);
        u64::try_from(frames.max(1))
            .map_err(|_| Error::InternalFault("required input frame count overflows u64"))
    }

    /// Output frames the next call produces from `input_frames` frames, given enough room.
    pub fn expected_output(&self, input_frames: u64) -> Result<u64, Error> {
        if input_frames == 0 {
            return Ok(0);
        }
        let end = (u128::from(input_frames) + 1) * u128::from(self.to);
        let phase = self.phase();
        if end <= phase {
            return Ok(0);
        }
        let frames = (end - phase).div_ceil(u128::from(self.from));
        u64::try_from(frames)
            .map_err(|_| Error::InternalFault("expected output frame count overflows u64"))
    }

    /// Input frames the output trails behind.
    pub fn input_latency(&self) -> u64 {
        self.kernel.input_latency()
    }

    /// [`Resampler::input_latency`] in output frames, rounded up.
    pub fn output_latency(&self) -> u64 {
        (self.input_latency() * u64::from(self.to)).div_ceil(u64::from(self.from))
    }

    #[inline]
    fn advance(&mut self) {
        self.time_int += self.advance_int;
        self.time_frac += self.advance_frac;
        if self.time_frac >= u64::from(self.to) {
            self.time_frac -= u64::from(self.to);
            self.time_int += 1;
        }
    }
}

impl FrameProcessor for Resampler {
    type Input = Sample;
    type Output = Sample;

    fn process_frames(&mut self, input: &[Sample], output: &mut [Sample]) -> (usize, usize) {
        let mut frames_in = input.chunks_exact(self.channels);
        let mut frames_out = output.chunks_exact_mut(self.channels);
        let (mut consumed, mut produced) = (0, 0);

        loop {
            // Input for the next output frame is taken even when there is no room left for
            // it, so a call never leaves input behind that the next output already needs.
            while self.time_int > 0 {
                let Some(frame) = frames_in.next() else {
                    return (consumed, produced);
                };
                self.kernel.load(frame);
                self.time_int -= 1;
                consumed += 1;
            }
            let Some(out) = frames_out.next() else {
                return (consumed, produced);
            };
            self.kernel.interpolate(self.time_frac, u64::from(self.to), out);
            self.advance();
            produced += 1;
        }
    }
}
