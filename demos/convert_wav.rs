//! Converts a WAV file to 48 kHz mono 32-bit PCM, reading and writing in small blocks.
//!
//! This example does not use any audio devices.

use std::error::Error;
use std::fs::File;
use std::io::{BufReader, Read};

use pcmconv::config::ResampleConfig;
use pcmconv::{Converter, ConverterConfig, DitherMode, FramesIn, FramesOut, SampleFormat};

const BLOCK_FRAMES: u64 = 1000;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <input.wav> [output.wav] [linear|sinc]", args[0]);
        std::process::exit(1);
    }
    let output_path = args.get(2).map_or("converted.wav", String::as_str);
    let resampling = match args.get(3).map(String::as_str) {
        None | Some("linear") => ResampleConfig::default(),
        Some("sinc") => ResampleConfig::sinc().build(),
        Some(other) => return Err(format!("Unknown resampling method '{other}'").into()),
    };

    let reader = hound::WavReader::new(BufReader::new(File::open(&args[1])?))?;
    let spec = reader.spec();
    let format_in = match spec.sample_format {
        hound::SampleFormat::Float => SampleFormat::F32,
        hound::SampleFormat::Int => SampleFormat::from_bits(spec.bits_per_sample),
    };
    let total_frames = u64::from(reader.duration());
    // The reader stops right at the start of the sample data.
    let mut data = reader.into_inner();

    let out_spec = hound::WavSpec {
        channels: 1,
        sample_rate: 48_000,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Int,
    };
    let config = ConverterConfig::new(
        format_in,
        SampleFormat::S32,
        spec.channels,
        out_spec.channels,
        spec.sample_rate,
        out_spec.sample_rate,
    )
    .with_dither(DitherMode::Triangular)
    .with_resampling(resampling);
    println!("Converting {format_in:?} {}ch {} Hz to {out_spec:?}", spec.channels, spec.sample_rate);
    let mut converter = Converter::new(config)?;

    let in_frame = format_in.bytes_per_frame(spec.channels);
    let out_frame = SampleFormat::S32.bytes_per_frame(out_spec.channels);
    let mut input = vec![0u8; BLOCK_FRAMES as usize * in_frame];
    let mut output = Vec::new();

    let mut writer = hound::WavWriter::create(output_path, out_spec)?;
    let mut write = |bytes: &[u8]| -> Result<(), hound::Error> {
        for sample in bytes.chunks_exact(4) {
            writer.write_sample(i32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]))?;
        }
        Ok(())
    };

    let mut remaining = total_frames;
    while remaining > 0 {
        let frames = remaining.min(BLOCK_FRAMES);
        let bytes = &mut input[..frames as usize * in_frame];
        data.read_exact(bytes)?;
        remaining -= frames;

        // Depends on the phase the previous block left behind.
        let room = converter.expected_output_frame_count(frames)?;
        output.resize(room as usize * out_frame, 0);
        let processed = converter.process_frames(
            FramesIn::Buffer(bytes),
            frames,
            FramesOut::Buffer(&mut output),
            room,
        )?;
        write(&output[..processed.frames_out as usize * out_frame])?;
    }

    // The tail still inside the resampler comes out with silence pushed behind it.
    let latency = converter.output_latency()?;
    let mut flushed = 0;
    while flushed < latency {
        let frames = (latency - flushed).min(BLOCK_FRAMES);
        output.resize(frames as usize * out_frame, 0);
        let processed = converter.process_frames(
            FramesIn::Silence,
            u64::MAX,
            FramesOut::Buffer(&mut output),
            frames,
        )?;
        write(&output[..processed.frames_out as usize * out_frame])?;
        flushed += processed.frames_out;
    }
    converter.close()?;
    drop(write);
    writer.finalize()?;

    println!("Wrote {} frames to {output_path}", converter.frames_produced());
    Ok(())
}
