#![allow(dead_code)]
/// in separate folder so its not ran as integration test
use std::f32::consts::PI;

use dasp_sample::Sample as _;
use pcmconv::{Converter, ConverterConfig, FramesIn, FramesOut, ProcessedFrames, SampleFormat};

/// Interleaved sine wave with the same signal on every channel.
pub fn sine(frequency: f32, sample_rate: u32, frames: usize, channels: u16, amplitude: f32) -> Vec<f32> {
    (0..frames)
        .flat_map(|n| {
            let value = amplitude * (2.0 * PI * frequency * n as f32 / sample_rate as f32).sin();
            std::iter::repeat_n(value, usize::from(channels))
        })
        .collect()
}

pub fn encode_s16(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|s| s.to_sample::<i16>().to_le_bytes())
        .collect()
}

pub fn decode_s16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

pub fn encode_f32(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

pub fn decode_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Bytes of one output frame of `config`.
pub fn output_frame_bytes(config: &ConverterConfig) -> usize {
    config.format_out.bytes_per_frame(config.channels_out)
}

/// Bytes of one input frame of `config`.
pub fn input_frame_bytes(config: &ConverterConfig) -> usize {
    config.format_in.bytes_per_frame(config.channels_in)
}

/// Converts all of `input` in one call, sizing the output with the frame count query.
pub fn convert_all(converter: &mut Converter, input: &[u8]) -> (Vec<u8>, ProcessedFrames) {
    let config = converter.config().clone();
    let frames_in = (input.len() / input_frame_bytes(&config)) as u64;
    let frames_out = converter.expected_output_frame_count(frames_in).unwrap();
    let mut output = vec![0u8; frames_out as usize * output_frame_bytes(&config)];
    let processed = converter
        .process_frames(
            FramesIn::Buffer(input),
            frames_in,
            FramesOut::Buffer(&mut output),
            frames_out,
        )
        .unwrap();
    output.truncate(processed.frames_out as usize * output_frame_bytes(&config));
    (output, processed)
}

/// Converts `input` in pieces of at most `chunk` input frames.
pub fn convert_in_chunks(converter: &mut Converter, input: &[u8], chunk: usize) -> Vec<u8> {
    let config = converter.config().clone();
    let frame_bytes = input_frame_bytes(&config);
    let mut output = Vec::new();
    for piece in input.chunks(chunk * frame_bytes) {
        let (converted, processed) = convert_all(converter, piece);
        assert_eq!(processed.frames_in as usize * frame_bytes, piece.len());
        output.extend_from_slice(&converted);
    }
    output
}

/// Root mean square of `samples`.
pub fn rms(samples: &[f32]) -> f32 {
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// A config converting between formats only.
pub fn format_only(from: SampleFormat, to: SampleFormat, channels: u16) -> ConverterConfig {
    ConverterConfig::new(from, to, channels, channels, 48_000, 48_000)
}
