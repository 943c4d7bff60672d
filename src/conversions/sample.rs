//! Sample encodings and the conversions between packed PCM bytes and working samples.
//!
//! Integer formats are normalized to full scale: a signed 16-bit `-32768` becomes `-1.0` and
//! `32767` becomes `32767 / 32768`. Unsigned 8-bit audio is centered on `128`. Going back to an
//! integer format rounds to the nearest value and clips everything outside the representable
//! range. All formats are little-endian and tightly packed (24-bit samples take 3 bytes).

use dasp_sample::types::i24;

use super::dither::Dither;
use super::FrameProcessor;
use crate::common::{zeroed, ChannelCount, Sample};
use crate::config::DitherMode;
use crate::Error;

/// Number of frames [`FormatConverter`] moves through its working buffer at once.
const CHUNK_FRAMES: usize = 512;

/// Encoding of a single PCM sample.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// Not a usable format, rejected when a converter is built.
    #[default]
    Unknown,
    /// Unsigned 8-bit integer, silence at 128.
    U8,
    /// Signed 16-bit integer.
    S16,
    /// Signed 24-bit integer packed in 3 bytes.
    S24,
    /// Signed 32-bit integer.
    S32,
    /// 32-bit IEEE float, full scale at ±1.0.
    F32,
}

impl SampleFormat {
    /// Size of one sample in bytes, 0 for [`SampleFormat::Unknown`].
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::Unknown => 0,
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S24 => 3,
            SampleFormat::S32 | SampleFormat::F32 => 4,
        }
    }

    /// Size of one interleaved frame in bytes.
    pub const fn bytes_per_frame(self, channels: ChannelCount) -> usize {
        self.bytes_per_sample() * channels as usize
    }

    /// The integer PCM format with the given bit depth, [`SampleFormat::Unknown`] for
    /// anything else.
    pub const fn from_bits(bits: u16) -> Self {
        match bits {
            8 => SampleFormat::U8,
            16 => SampleFormat::S16,
            24 => SampleFormat::S24,
            32 => SampleFormat::S32,
            _ => SampleFormat::Unknown,
        }
    }

    /// Whether samples are stored as floating point numbers.
    pub const fn is_float(self) -> bool {
        matches!(self, SampleFormat::F32)
    }

    /// Bits of precision used to decide whether a conversion narrows the signal.
    pub(crate) const fn precision_bits(self) -> u32 {
        match self {
            SampleFormat::Unknown => 0,
            SampleFormat::U8 => 8,
            SampleFormat::S16 => 16,
            SampleFormat::S24 => 24,
            SampleFormat::S32 | SampleFormat::F32 => 32,
        }
    }

    /// Whether converting from `self` to `target` loses integer precision and should be
    /// dithered.
    pub(crate) const fn narrows_to(self, target: SampleFormat) -> bool {
        !target.is_float() && target.precision_bits() < self.precision_bits()
    }

    /// Value a full scale working sample maps to, for integer formats.
    const fn full_scale(self) -> f64 {
        match self {
            SampleFormat::U8 => 128.0,
            SampleFormat::S16 => 32_768.0,
            SampleFormat::S24 => 8_388_608.0,
            SampleFormat::S32 => 2_147_483_648.0,
            SampleFormat::Unknown | SampleFormat::F32 => 1.0,
        }
    }
}

#[inline]
fn read_i24(bytes: &[u8]) -> i32 {
    // Sign extension through the top byte.
    i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8
}

/// Decodes interleaved samples of `format` from `input` into `output`.
///
/// Converts as many whole samples as both slices hold and returns that count.
fn decode(format: SampleFormat, input: &[u8], output: &mut [Sample]) -> usize {
    let width = format.bytes_per_sample();
    if width == 0 {
        return 0;
    }
    let count = (input.len() / width).min(output.len());
    let samples = input.chunks_exact(width).zip(output[..count].iter_mut());

    match format {
        SampleFormat::Unknown => {}
        SampleFormat::U8 => {
            for (bytes, out) in samples {
                *out = (bytes[0] as Sample - 128.0) / 128.0;
            }
        }
        SampleFormat::S16 => {
            for (bytes, out) in samples {
                *out = i16::from_le_bytes([bytes[0], bytes[1]]) as Sample / 32_768.0;
            }
        }
        SampleFormat::S24 => {
            for (bytes, out) in samples {
                *out = read_i24(bytes) as Sample / 8_388_608.0;
            }
        }
        SampleFormat::S32 => {
            for (bytes, out) in samples {
                let value = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                *out = (value as f64 / 2_147_483_648.0) as Sample;
            }
        }
        SampleFormat::F32 => {
            for (bytes, out) in samples {
                *out = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as Sample;
            }
        }
    }
    count
}

/// Scales, dithers, rounds and clips one working sample to an integer of `format`.
#[inline]
fn quantize(sample: Sample, format: SampleFormat, noise: Sample, min: f64, max: f64) -> i32 {
    let scaled = sample as f64 * format.full_scale() + noise as f64;
    // NaN becomes silence instead of the saturated minimum.
    if scaled.is_nan() {
        return 0;
    }
    scaled.round().clamp(min, max) as i32
}

/// Encodes interleaved working samples from `input` into `format` bytes in `output`.
///
/// Converts as many whole samples as both slices hold and returns that count.
fn encode(
    format: SampleFormat,
    input: &[Sample],
    output: &mut [u8],
    mut dither: Option<&mut Dither>,
) -> usize {
    let width = format.bytes_per_sample();
    if width == 0 {
        return 0;
    }
    let count = (output.len() / width).min(input.len());
    let mut noise = || dither.as_mut().map_or(0.0, |d| d.next_noise());
    let samples = input[..count].iter().zip(output.chunks_exact_mut(width));

    match format {
        SampleFormat::Unknown => {}
        SampleFormat::U8 => {
            for (&sample, bytes) in samples {
                let value = quantize(sample, format, noise(), -128.0, 127.0);
                bytes[0] = (value + 128) as u8;
            }
        }
        SampleFormat::S16 => {
            for (&sample, bytes) in samples {
                let value = quantize(sample, format, noise(), -32_768.0, 32_767.0);
                bytes.copy_from_slice(&(value as i16).to_le_bytes());
            }
        }
        SampleFormat::S24 => {
            let (min, max) = (i24::MIN.inner() as f64, i24::MAX.inner() as f64);
            for (&sample, bytes) in samples {
                let value = quantize(sample, format, noise(), min, max);
                bytes.copy_from_slice(&value.to_le_bytes()[..3]);
            }
        }
        SampleFormat::S32 => {
            let (min, max) = (i32::MIN as f64, i32::MAX as f64);
            for (&sample, bytes) in samples {
                let value = quantize(sample, format, noise(), min, max);
                bytes.copy_from_slice(&value.to_le_bytes());
            }
        }
        SampleFormat::F32 => {
            for (&sample, bytes) in samples {
                bytes.copy_from_slice(&(sample as f32).to_le_bytes());
            }
        }
    }
    count
}

/// Reads packed PCM frames into working samples.
#[derive(Debug, Clone)]
pub struct FormatReader {
    format: SampleFormat,
    channels: usize,
}

impl FormatReader {
    /// Reader for interleaved `format` frames with `channels` channels.
    ///
    /// # Panic
    ///
    /// Panics if `channels` is 0.
    pub fn new(format: SampleFormat, channels: ChannelCount) -> Self {
        assert!(channels >= 1);
        Self {
            format,
            channels: usize::from(channels),
        }
    }

    /// Encoding of the frames this reader accepts.
    #[inline]
    pub fn format(&self) -> SampleFormat {
        self.format
    }
}

impl FrameProcessor for FormatReader {
    type Input = u8;
    type Output = Sample;

    fn process_frames(&mut self, input: &[u8], output: &mut [Sample]) -> (usize, usize) {
        let frame_bytes = self.format.bytes_per_sample() * self.channels;
        if frame_bytes == 0 {
            return (0, 0);
        }
        let frames = (input.len() / frame_bytes).min(output.len() / self.channels);
        decode(
            self.format,
            &input[..frames * frame_bytes],
            &mut output[..frames * self.channels],
        );
        (frames, frames)
    }
}

/// Writes working samples as packed PCM frames, dithering if configured to.
#[derive(Debug, Clone)]
pub struct FormatWriter {
    format: SampleFormat,
    channels: usize,
    dither: Option<Dither>,
}

impl FormatWriter {
    /// Writer producing interleaved `format` frames with `channels` channels.
    ///
    /// Dither only applies to integer formats; it is ignored for [`SampleFormat::F32`]. The
    /// noise sequence is fully determined by `dither_seed`.
    ///
    /// # Panic
    ///
    /// Panics if `channels` is 0.
    pub fn new(
        format: SampleFormat,
        channels: ChannelCount,
        dither_mode: DitherMode,
        dither_seed: u64,
    ) -> Result<Self, Error> {
        assert!(channels >= 1);
        let dither = if format.is_float() {
            None
        } else {
            Dither::new(dither_mode, dither_seed)?
        };
        Ok(Self {
            format,
            channels: usize::from(channels),
            dither,
        })
    }

    /// Encoding of the frames this writer produces.
    #[inline]
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// The dither actually applied.
    pub fn dither_mode(&self) -> DitherMode {
        self.dither.as_ref().map_or(DitherMode::None, Dither::mode)
    }
}

impl FrameProcessor for FormatWriter {
    type Input = Sample;
    type Output = u8;

    fn process_frames(&mut self, input: &[Sample], output: &mut [u8]) -> (usize, usize) {
        let frame_bytes = self.format.bytes_per_sample() * self.channels;
        if frame_bytes == 0 {
            return (0, 0);
        }
        let frames = (input.len() / self.channels).min(output.len() / frame_bytes);
        encode(
            self.format,
            &input[..frames * self.channels],
            &mut output[..frames * frame_bytes],
            self.dither.as_mut(),
        );
        (frames, frames)
    }
}

/// Converts packed frames from one sample format to another, keeping the channel count.
///
/// Dither is applied only when the target format has less integer precision than the
/// source, so widening conversions are lossless and round trips through a wider format
/// reproduce the input exactly.
#[derive(Debug)]
pub struct FormatConverter {
    reader: FormatReader,
    writer: FormatWriter,
    channels: usize,
    in_frame: usize,
    out_frame: usize,
    /// Identical formats are copied byte for byte.
    passthrough: bool,
    working: Box<[Sample]>,
}

impl FormatConverter {
    /// Converter from `from` to `to` frames with `channels` channels.
    ///
    /// # Panic
    ///
    /// Panics if `channels` is 0.
    pub fn new(
        from: SampleFormat,
        to: SampleFormat,
        channels: ChannelCount,
        dither_mode: DitherMode,
        dither_seed: u64,
    ) -> Result<Self, Error> {
        let dither_mode = if from.narrows_to(to) {
            dither_mode
        } else {
            DitherMode::None
        };
        Ok(Self {
            reader: FormatReader::new(from, channels),
            writer: FormatWriter::new(to, channels, dither_mode, dither_seed)?,
            channels: usize::from(channels),
            in_frame: from.bytes_per_frame(channels),
            out_frame: to.bytes_per_frame(channels),
            passthrough: from == to,
            working: zeroed(CHUNK_FRAMES * usize::from(channels))?,
        })
    }

    /// The dither actually applied.
    pub fn dither_mode(&self) -> DitherMode {
        self.writer.dither_mode()
    }
}

impl FrameProcessor for FormatConverter {
    type Input = u8;
    type Output = u8;

    fn process_frames(&mut self, input: &[u8], output: &mut [u8]) -> (usize, usize) {
        let (in_frame, out_frame) = (self.in_frame, self.out_frame);
        if in_frame == 0 || out_frame == 0 {
            return (0, 0);
        }
        let frames = (input.len() / in_frame).min(output.len() / out_frame);
        if self.passthrough {
            output[..frames * out_frame].copy_from_slice(&input[..frames * in_frame]);
            return (frames, frames);
        }

        let mut done = 0;
        while done < frames {
            let chunk = (frames - done).min(CHUNK_FRAMES);
            let working = &mut self.working[..chunk * self.channels];
            self.reader.process_frames(
                &input[done * in_frame..(done + chunk) * in_frame],
                working,
            );
            self.writer.process_frames(
                working,
                &mut output[done * out_frame..(done + chunk) * out_frame],
            );
            done += chunk;
        }
        (frames, frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    fn convert(from: SampleFormat, to: SampleFormat, input: &[u8], dither: DitherMode) -> Vec<u8> {
        let frames = input.len() / from.bytes_per_sample();
        let mut output = vec![0u8; frames * to.bytes_per_sample()];
        let mut converter = FormatConverter::new(from, to, 1, dither, 1).unwrap();
        assert_eq!(converter.process_frames(input, &mut output), (frames, frames));
        output
    }

    fn s16_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn f32_values(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    #[rstest]
    #[case(SampleFormat::Unknown, 0)]
    #[case(SampleFormat::U8, 1)]
    #[case(SampleFormat::S16, 2)]
    #[case(SampleFormat::S24, 3)]
    #[case(SampleFormat::S32, 4)]
    #[case(SampleFormat::F32, 4)]
    fn widths(#[case] format: SampleFormat, #[case] bytes: usize) {
        assert_eq!(format.bytes_per_sample(), bytes);
        assert_eq!(format.bytes_per_frame(6), bytes * 6);
    }

    #[test]
    fn from_bits() {
        assert_eq!(SampleFormat::from_bits(8), SampleFormat::U8);
        assert_eq!(SampleFormat::from_bits(16), SampleFormat::S16);
        assert_eq!(SampleFormat::from_bits(24), SampleFormat::S24);
        assert_eq!(SampleFormat::from_bits(32), SampleFormat::S32);
        assert_eq!(SampleFormat::from_bits(12), SampleFormat::Unknown);
    }

    #[test]
    fn s16_full_scale_maps_to_unit_float() {
        let input = s16_bytes(&[i16::MIN, -16_384, 0, 16_384, i16::MAX]);
        let output = f32_values(&convert(
            SampleFormat::S16,
            SampleFormat::F32,
            &input,
            DitherMode::None,
        ));
        assert_eq!(output[..4], [-1.0, -0.5, 0.0, 0.5]);
        assert_abs_diff_eq!(output[4], 32_767.0 / 32_768.0);
    }

    #[test]
    fn float_to_integer_clips() {
        let input: Vec<u8> = [2.0f32, -2.0, 1.0, f32::NAN]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let output = convert(SampleFormat::F32, SampleFormat::S16, &input, DitherMode::None);
        assert_eq!(output, s16_bytes(&[i16::MAX, i16::MIN, i16::MAX, 0]));

        let output = convert(SampleFormat::F32, SampleFormat::U8, &input, DitherMode::None);
        assert_eq!(output, [255, 0, 255, 128]);
    }

    #[test]
    fn u8_is_centered() {
        let output = f32_values(&convert(
            SampleFormat::U8,
            SampleFormat::F32,
            &[0, 64, 128, 192, 255],
            DitherMode::None,
        ));
        assert_eq!(output, [-1.0, -0.5, 0.0, 0.5, 127.0 / 128.0]);
    }

    #[test]
    fn s24_sign_extends() {
        let input = [0xff, 0xff, 0xff, 0x00, 0x00, 0x80, 0xff, 0xff, 0x7f];
        let output = f32_values(&convert(
            SampleFormat::S24,
            SampleFormat::F32,
            &input,
            DitherMode::None,
        ));
        assert_eq!(output[0], -1.0 / 8_388_608.0);
        assert_eq!(output[1], -1.0);
        assert_abs_diff_eq!(output[2], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn float_to_s24_clips_at_the_24_bit_range() {
        let input: Vec<u8> = [2.0f32, -2.0, 0.5]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let output = convert(SampleFormat::F32, SampleFormat::S24, &input, DitherMode::None);
        assert_eq!(output, [0xff, 0xff, 0x7f, 0x00, 0x00, 0x80, 0x00, 0x00, 0x40]);
    }

    #[rstest]
    #[case(SampleFormat::S16)]
    #[case(SampleFormat::S24)]
    #[case(SampleFormat::S32)]
    #[case(SampleFormat::F32)]
    fn widening_round_trips_are_exact(#[case] wide: SampleFormat) {
        let input = s16_bytes(&[i16::MIN, -12_345, -1, 0, 1, 777, i16::MAX]);
        let there = convert(SampleFormat::S16, wide, &input, DitherMode::Triangular);
        let back = convert(wide, SampleFormat::S16, &there, DitherMode::None);
        assert_eq!(back, input);
    }

    #[test]
    fn dither_only_when_narrowing() {
        let converter = FormatConverter::new(
            SampleFormat::S16,
            SampleFormat::S32,
            2,
            DitherMode::Triangular,
            0,
        )
        .unwrap();
        assert_eq!(converter.dither_mode(), DitherMode::None);

        let converter = FormatConverter::new(
            SampleFormat::F32,
            SampleFormat::S16,
            2,
            DitherMode::Rectangular,
            0,
        )
        .unwrap();
        assert_eq!(converter.dither_mode(), DitherMode::Rectangular);
    }

    #[test]
    fn dither_stays_within_one_lsb() {
        let values: Vec<f32> = (0..2000).map(|i| (i as f32 * 0.01).sin() * 0.8).collect();
        let input: Vec<u8> = values.iter().flat_map(|s| s.to_le_bytes()).collect();
        let output = convert(SampleFormat::F32, SampleFormat::S16, &input, DitherMode::Triangular);
        for (value, bytes) in values.iter().zip(output.chunks_exact(2)) {
            let quantized = i16::from_le_bytes([bytes[0], bytes[1]]) as f32;
            assert!((quantized - value * 32_768.0).abs() <= 1.5);
        }
    }

    #[test]
    fn partial_frames_are_ignored() {
        let mut reader = FormatReader::new(SampleFormat::S16, 2);
        let mut output = [0.0; 8];
        // Three bytes short of the third frame.
        assert_eq!(reader.process_frames(&[0u8; 9], &mut output), (2, 2));
    }
}
