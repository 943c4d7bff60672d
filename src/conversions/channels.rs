//! Channel layout conversion through a weight matrix.

use std::f64::consts::FRAC_1_SQRT_2;

use super::FrameProcessor;
use crate::common::{zeroed, ChannelCount, Sample};
use crate::config::{validate_matrix, ChannelMixMode};
use crate::Error;

/// Speaker a channel is assumed to feed, derived from its index and the channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelPosition {
    /// The single channel of a mono stream.
    Mono,
    FrontLeft,
    FrontRight,
    FrontCenter,
    LowFrequency,
    BackLeft,
    BackRight,
    BackCenter,
    SideLeft,
    SideRight,
    /// A channel past the eighth, mapped only onto the same index.
    Aux(ChannelCount),
}

impl ChannelPosition {
    /// Position of channel `index` in a stream of `channels` channels.
    ///
    /// | channels | layout                          |
    /// |----------|---------------------------------|
    /// | 1        | Mono                            |
    /// | 2        | FL FR                           |
    /// | 3        | FL FR FC                        |
    /// | 4        | FL FR BL BR                     |
    /// | 5        | FL FR FC BL BR                  |
    /// | 6        | FL FR FC LFE BL BR              |
    /// | 7        | FL FR FC LFE BC SL SR           |
    /// | 8+       | FL FR FC LFE BL BR SL SR Aux... |
    pub fn of(index: ChannelCount, channels: ChannelCount) -> Self {
        use ChannelPosition::*;
        const STEREO: &[ChannelPosition] = &[FrontLeft, FrontRight];
        const THREE: &[ChannelPosition] = &[FrontLeft, FrontRight, FrontCenter];
        const QUAD: &[ChannelPosition] = &[FrontLeft, FrontRight, BackLeft, BackRight];
        const FIVE: &[ChannelPosition] = &[FrontLeft, FrontRight, FrontCenter, BackLeft, BackRight];
        const SIX: &[ChannelPosition] = &[
            FrontLeft,
            FrontRight,
            FrontCenter,
            LowFrequency,
            BackLeft,
            BackRight,
        ];
        const SEVEN: &[ChannelPosition] = &[
            FrontLeft,
            FrontRight,
            FrontCenter,
            LowFrequency,
            BackCenter,
            SideLeft,
            SideRight,
        ];
        const EIGHT: &[ChannelPosition] = &[
            FrontLeft,
            FrontRight,
            FrontCenter,
            LowFrequency,
            BackLeft,
            BackRight,
            SideLeft,
            SideRight,
        ];

        let layout = match channels {
            0 | 1 => return Mono,
            2 => STEREO,
            3 => THREE,
            4 => QUAD,
            5 => FIVE,
            6 => SIX,
            7 => SEVEN,
            _ => EIGHT,
        };
        layout
            .get(usize::from(index))
            .copied()
            .unwrap_or(Aux(index))
    }
}

fn layout(channels: ChannelCount) -> Vec<ChannelPosition> {
    (0..channels)
        .map(|index| ChannelPosition::of(index, channels))
        .collect()
}

/// Fills `weights` (row-major, one row per output) with the default downmix/upmix.
fn simple_weights(channels_in: ChannelCount, channels_out: ChannelCount, weights: &mut [Sample]) {
    use ChannelPosition::*;

    let inputs = layout(channels_in);
    let outputs = layout(channels_out);
    let columns = inputs.len();
    let position = |wanted: ChannelPosition| outputs.iter().position(|&p| p == wanted);
    let mut set = |out: usize, input: usize, weight: f64| {
        weights[out * columns + input] += weight as Sample;
    };

    if channels_in == 1 {
        for (out, &pos) in outputs.iter().enumerate() {
            if pos != LowFrequency {
                set(out, 0, 1.0);
            }
        }
        return;
    }

    if channels_out == 1 {
        let audible: Vec<usize> = (0..columns)
            .filter(|&input| inputs[input] != LowFrequency)
            .collect();
        for &input in &audible {
            set(0, input, 1.0 / audible.len() as f64);
        }
        return;
    }

    // Both sides have at least front left and front right from here on.
    let (Some(fl), Some(fr)) = (position(FrontLeft), position(FrontRight)) else {
        return;
    };
    for (input, &pos) in inputs.iter().enumerate() {
        if let Some(out) = position(pos) {
            set(out, input, 1.0);
            continue;
        }
        match pos {
            FrontCenter => {
                set(fl, input, FRAC_1_SQRT_2);
                set(fr, input, FRAC_1_SQRT_2);
            }
            SideLeft | SideRight | BackLeft | BackRight => {
                let (twin, front) = match pos {
                    SideLeft => (BackLeft, fl),
                    SideRight => (BackRight, fr),
                    BackLeft => (SideLeft, fl),
                    _ => (SideRight, fr),
                };
                match position(twin) {
                    Some(out) => set(out, input, 1.0),
                    None => set(front, input, FRAC_1_SQRT_2),
                }
            }
            BackCenter => {
                let pair = [(BackLeft, BackRight), (SideLeft, SideRight)]
                    .into_iter()
                    .find_map(|(left, right)| position(left).zip(position(right)));
                match pair {
                    Some((left, right)) => {
                        set(left, input, FRAC_1_SQRT_2);
                        set(right, input, FRAC_1_SQRT_2);
                    }
                    None => {
                        set(fl, input, 0.5);
                        set(fr, input, 0.5);
                    }
                }
            }
            // Dropped when the output has no such channel.
            Mono | FrontLeft | FrontRight | LowFrequency | Aux(_) => {}
        }
    }
}

/// Maps frames of `channels_in` channels onto `channels_out` channels.
///
/// Every output sample is the weighted sum of the input samples of the same frame:
/// `out[o] = sum(weight(o, i) * in[i])`.
///
/// With [`ChannelMixMode::Simple`] the weights are derived from the speaker positions given
/// by [`ChannelPosition::of`]:
///
/// - a mono input feeds every output channel except the low-frequency one,
/// - a mono output is the average of every input except the low-frequency one,
/// - otherwise channels at the same position are copied, and positions the output lacks are
///   folded in: front center into front left and right at -3 dB, side channels into the
///   matching back channels (or the fronts at -3 dB), back channels into the matching side
///   channels (or the fronts at -3 dB), back center into the back or side pair at -3 dB or
///   the fronts at -6 dB. Low frequency and auxiliary channels are dropped.
///
/// Equal channel counts with the simple mode therefore copy every channel unchanged.
#[derive(Debug, Clone)]
pub struct ChannelMixer {
    channels_in: usize,
    channels_out: usize,
    weights: Box<[Sample]>,
}

impl ChannelMixer {
    /// Builds the weight matrix for the given mode.
    ///
    /// # Panic
    ///
    /// Panics if `channels_in` or `channels_out` is 0.
    pub fn new(
        channels_in: ChannelCount,
        channels_out: ChannelCount,
        mode: &ChannelMixMode,
    ) -> Result<Self, Error> {
        assert!(channels_in >= 1);
        assert!(channels_out >= 1);

        let mut weights: Box<[Sample]> = zeroed(usize::from(channels_in) * usize::from(channels_out))?;
        match mode {
            ChannelMixMode::Simple => simple_weights(channels_in, channels_out, &mut weights),
            ChannelMixMode::Custom(rows) => {
                validate_matrix(rows, channels_in, channels_out)?;
                for (target, &weight) in weights.iter_mut().zip(rows.iter().flatten()) {
                    *target = weight;
                }
            }
        }

        Ok(Self {
            channels_in: usize::from(channels_in),
            channels_out: usize::from(channels_out),
            weights,
        })
    }

    /// Weight of input channel `input` in output channel `output`.
    ///
    /// # Panic
    ///
    /// Panics if either index is out of range.
    #[inline]
    pub fn weight(&self, output: usize, input: usize) -> Sample {
        assert!(input < self.channels_in);
        self.weights[output * self.channels_in + input]
    }

    /// Number of channels in each input frame.
    #[inline]
    pub fn channels_in(&self) -> usize {
        self.channels_in
    }

    /// Number of channels in each output frame.
    #[inline]
    pub fn channels_out(&self) -> usize {
        self.channels_out
    }

    /// Whether the matrix copies every channel unchanged.
    pub fn is_identity(&self) -> bool {
        self.channels_in == self.channels_out
            && self.weights.chunks_exact(self.channels_in).enumerate().all(|(out, row)| {
                row.iter()
                    .enumerate()
                    .all(|(input, &w)| w == if input == out { 1.0 } else { 0.0 })
            })
    }
}

impl FrameProcessor for ChannelMixer {
    type Input = Sample;
    type Output = Sample;

    fn process_frames(&mut self, input: &[Sample], output: &mut [Sample]) -> (usize, usize) {
        let frames = (input.len() / self.channels_in).min(output.len() / self.channels_out);

        let in_frames = input.chunks_exact(self.channels_in);
        let out_frames = output.chunks_exact_mut(self.channels_out);
        for (in_frame, out_frame) in in_frames.zip(out_frames).take(frames) {
            for (out, row) in out_frame
                .iter_mut()
                .zip(self.weights.chunks_exact(self.channels_in))
            {
                *out = row.iter().zip(in_frame).map(|(w, s)| w * s).sum();
            }
        }
        (frames, frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    fn mix(channels_in: ChannelCount, channels_out: ChannelCount, input: &[Sample]) -> Vec<Sample> {
        let mut mixer = ChannelMixer::new(channels_in, channels_out, &ChannelMixMode::Simple).unwrap();
        let frames = input.len() / usize::from(channels_in);
        let mut output = vec![0.0; frames * usize::from(channels_out)];
        assert_eq!(mixer.process_frames(input, &mut output), (frames, frames));
        output
    }

    #[test]
    fn positions() {
        use ChannelPosition::*;
        assert_eq!(ChannelPosition::of(0, 1), Mono);
        assert_eq!(ChannelPosition::of(2, 4), BackLeft);
        assert_eq!(ChannelPosition::of(3, 6), LowFrequency);
        assert_eq!(ChannelPosition::of(4, 7), BackCenter);
        assert_eq!(ChannelPosition::of(7, 8), SideRight);
        assert_eq!(ChannelPosition::of(9, 12), Aux(9));
    }

    #[test]
    fn stereo_to_mono_averages() {
        assert_eq!(mix(2, 1, &[1.0, -1.0, 0.5, 0.25]), [0.0, 0.375]);
    }

    #[test]
    fn mono_to_stereo_duplicates() {
        assert_eq!(mix(1, 2, &[0.5, -0.25]), [0.5, 0.5, -0.25, -0.25]);
    }

    #[test]
    fn mono_to_surround_skips_lfe() {
        assert_eq!(mix(1, 6, &[0.5]), [0.5, 0.5, 0.5, 0.0, 0.5, 0.5]);
    }

    #[test]
    fn surround_to_mono_skips_lfe() {
        let output = mix(6, 1, &[0.1, 0.2, 0.3, 1.0, 0.4, 0.5]);
        assert_abs_diff_eq!(output[0], 0.3, epsilon = 1e-6);
    }

    #[test]
    fn surround_to_stereo_folds_center_and_back() {
        let mixer = ChannelMixer::new(6, 2, &ChannelMixMode::Simple).unwrap();
        let half_power = FRAC_1_SQRT_2 as Sample;
        // FL FR FC LFE BL BR
        let expected_left = [1.0, 0.0, half_power, 0.0, half_power, 0.0];
        let expected_right = [0.0, 1.0, half_power, 0.0, 0.0, half_power];
        for input in 0..6 {
            assert_eq!(mixer.weight(0, input), expected_left[input]);
            assert_eq!(mixer.weight(1, input), expected_right[input]);
        }
    }

    #[test]
    fn seven_to_eight_moves_back_center() {
        let mixer = ChannelMixer::new(7, 8, &ChannelMixMode::Simple).unwrap();
        let half_power = FRAC_1_SQRT_2 as Sample;
        // Input 4 is back center, outputs 4 and 5 are back left and right.
        assert_eq!(mixer.weight(4, 4), half_power);
        assert_eq!(mixer.weight(5, 4), half_power);
        // Sides keep their place.
        assert_eq!(mixer.weight(6, 5), 1.0);
        assert_eq!(mixer.weight(7, 6), 1.0);
    }

    #[test]
    fn quad_to_seven_moves_back_to_side() {
        let mixer = ChannelMixer::new(4, 7, &ChannelMixMode::Simple).unwrap();
        assert_eq!(mixer.weight(5, 2), 1.0);
        assert_eq!(mixer.weight(6, 3), 1.0);
        assert_eq!(mixer.weight(0, 2), 0.0);
    }

    #[rstest]
    fn equal_counts_are_identity(#[values(1, 2, 3, 6, 8, 10)] channels: ChannelCount) {
        let mixer = ChannelMixer::new(channels, channels, &ChannelMixMode::Simple).unwrap();
        assert!(mixer.is_identity());
    }

    #[test]
    fn custom_matrix() {
        let mode = ChannelMixMode::Custom(vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.5, 0.5]]);
        let mut mixer = ChannelMixer::new(2, 3, &mode).unwrap();
        assert!(!mixer.is_identity());
        let mut output = [0.0; 3];
        mixer.process_frames(&[0.2, 0.6], &mut output);
        assert_abs_diff_eq!(output.as_slice(), [0.6, 0.2, 0.4].as_slice(), epsilon = 1e-6);
    }

    #[test]
    fn custom_matrix_is_validated() {
        let mode = ChannelMixMode::Custom(vec![vec![1.0, 0.0]]);
        assert!(matches!(
            ChannelMixer::new(2, 2, &mode),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}
