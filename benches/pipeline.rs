use divan::Bencher;
use pcmconv::config::ResampleConfig;
use pcmconv::{Converter, ConverterConfig, DitherMode, FramesIn, FramesOut, SampleFormat};

use shared::{music_bytes, CHANNELS, FRAMES, SAMPLE_RATE};

fn main() {
    divan::main();
}

/// Feeds `input` through `converter` the way an audio callback would, 512 frames at a time.
fn stream(mut converter: Converter, input: Vec<u8>) {
    let frame_bytes = converter.config().format_in.bytes_per_frame(CHANNELS);
    let out_frame_bytes = converter
        .config()
        .format_out
        .bytes_per_frame(converter.config().channels_out);
    let mut output = vec![0u8; 1024 * out_frame_bytes];
    for piece in input.chunks(512 * frame_bytes) {
        let frames_in = (piece.len() / frame_bytes) as u64;
        let processed = converter
            .process_frames(FramesIn::Buffer(piece), frames_in, FramesOut::Buffer(&mut output), 1024)
            .unwrap();
        divan::black_box(processed);
    }
}

#[divan::bench]
fn format_only(bencher: Bencher) {
    bencher
        .with_inputs(|| {
            let config = ConverterConfig::new(
                SampleFormat::S16,
                SampleFormat::F32,
                CHANNELS,
                CHANNELS,
                SAMPLE_RATE,
                SAMPLE_RATE,
            );
            (Converter::new(config).unwrap(), music_bytes(SampleFormat::S16))
        })
        .bench_values(|(converter, input)| stream(converter, input))
}

#[divan::bench]
fn playback(bencher: Bencher) {
    bencher
        .with_inputs(|| {
            let config = ConverterConfig::new(
                SampleFormat::S16,
                SampleFormat::F32,
                CHANNELS,
                CHANNELS,
                SAMPLE_RATE,
                48_000,
            );
            (Converter::new(config).unwrap(), music_bytes(SampleFormat::S16))
        })
        .bench_values(|(converter, input)| stream(converter, input))
}

#[divan::bench]
fn voice_capture(bencher: Bencher) {
    bencher
        .with_inputs(|| {
            let config = ConverterConfig::new(
                SampleFormat::F32,
                SampleFormat::S16,
                CHANNELS,
                1,
                SAMPLE_RATE,
                16_000,
            )
            .with_dither(DitherMode::Triangular)
            .with_resampling(ResampleConfig::sinc().build());
            (Converter::new(config).unwrap(), music_bytes(SampleFormat::F32))
        })
        .bench_values(|(converter, input)| stream(converter, input))
}

#[divan::bench]
fn seek(bencher: Bencher) {
    bencher
        .with_inputs(|| {
            let config = ConverterConfig::new(
                SampleFormat::S16,
                SampleFormat::S16,
                CHANNELS,
                CHANNELS,
                SAMPLE_RATE,
                48_000,
            );
            (Converter::new(config).unwrap(), music_bytes(SampleFormat::S16))
        })
        .bench_values(|(mut converter, input)| {
            converter
                .process_frames(
                    FramesIn::Buffer(&input),
                    FRAMES as u64,
                    FramesOut::Discard,
                    u64::MAX,
                )
                .unwrap()
        })
}
