/*!
This module contains the stages that convert PCM frames from one layout to another.

This includes conversion between sample formats, channel counts and sample rates. Every
stage implements [`FrameProcessor`]; the [`Converter`](crate::Converter) chains them.
*/

pub use self::channels::{ChannelMixer, ChannelPosition};
pub use self::sample::{FormatConverter, FormatReader, FormatWriter, SampleFormat};
pub use self::sample_rate::Resampler;

mod channels;
mod dither;
mod sample;
mod sample_rate;

/// A streaming stage that turns input frames into output frames.
///
/// Frame counts are taken from the slice lengths: a slice holds as many frames as fit in it
/// whole. A call processes as much as both slices allow and returns the number of input
/// frames consumed and output frames produced, in that order. Stateful stages carry their
/// history across calls, so splitting a stream into arbitrary pieces gives the same result
/// as processing it at once.
pub trait FrameProcessor {
    /// Element type of the input slice.
    type Input;
    /// Element type of the output slice.
    type Output;

    /// Converts frames from `input` into `output`, returning `(consumed, produced)`.
    fn process_frames(&mut self, input: &[Self::Input], output: &mut [Self::Output])
        -> (usize, usize);
}
