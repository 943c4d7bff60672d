use std::f64::consts::PI;

use crate::common::{zeroed, Sample};
use crate::config::WindowFunction;
use crate::math::sinc;
use crate::Error;

/// Sums of weights below this are left unnormalized.
const MIN_WEIGHT_SUM: Sample = 1e-6;

/// Value of `window` at `x`, zero outside `[-1, 1]`.
fn window_at(window: WindowFunction, x: f64) -> f64 {
    if x.abs() > 1.0 {
        return 0.0;
    }
    let p = PI * x;
    match window {
        WindowFunction::Hann => 0.5 + 0.5 * p.cos(),
        WindowFunction::Blackman => 0.42 + 0.5 * p.cos() + 0.08 * (2.0 * p).cos(),
        WindowFunction::BlackmanHarris => {
            0.35875 + 0.48829 * p.cos() + 0.14128 * (2.0 * p).cos() + 0.01168 * (3.0 * p).cos()
        }
    }
}

/// Windowed sinc interpolation over the last `sinc_len` input frames.
///
/// The filter is sampled `oversampling_factor` times per input frame into a table and read
/// back with linear interpolation, so no transcendental functions run per output frame.
#[derive(Clone, Debug)]
pub(super) struct SincKernel {
    channels: usize,
    half: usize,
    oversampling: usize,
    /// `kernel(j / oversampling)` for `j` in `0..half * oversampling + 2`.
    table: Box<[Sample]>,
    /// Per channel, the history written twice so the latest `sinc_len` frames are always
    /// contiguous at `position..position + sinc_len`.
    history: Box<[Sample]>,
    position: usize,
    /// Tap weights of the output frame being computed.
    weights: Box<[Sample]>,
}

impl SincKernel {
    pub(super) fn new(
        channels: usize,
        from: u32,
        to: u32,
        sinc_len: usize,
        oversampling: usize,
        window: WindowFunction,
    ) -> Result<Self, Error> {
        let half = sinc_len / 2;
        // Band-limit to the lower Nyquist frequency with some headroom for the transition.
        let cutoff = 0.95 * (f64::from(to) / f64::from(from)).min(1.0);

        let mut table: Box<[Sample]> = zeroed(half * oversampling + 2)?;
        for (j, entry) in table.iter_mut().enumerate() {
            let d = j as f64 / oversampling as f64;
            *entry = (cutoff * sinc(cutoff * d) * window_at(window, d / half as f64)) as Sample;
        }

        Ok(Self {
            channels,
            half,
            oversampling,
            table,
            history: zeroed(channels * 2 * sinc_len)?,
            position: 0,
            weights: zeroed(sinc_len)?,
        })
    }

    /// Input frames the output trails behind.
    pub(super) fn input_latency(&self) -> u64 {
        self.half as u64
    }

    fn len(&self) -> usize {
        self.half * 2
    }

    #[inline]
    fn kernel(&self, distance: Sample) -> Sample {
        let scaled = distance.abs() * self.oversampling as Sample;
        let index = scaled as usize;
        match (self.table.get(index), self.table.get(index + 1)) {
            (Some(&a), Some(&b)) => a + (b - a) * (scaled - index as Sample),
            _ => 0.0,
        }
    }

    #[inline]
    pub(super) fn load(&mut self, frame: &[Sample]) {
        let len = self.len();
        for (channel, &sample) in frame.iter().enumerate() {
            let history = &mut self.history[channel * 2 * len..][..2 * len];
            history[self.position] = sample;
            history[self.position + len] = sample;
        }
        self.position = (self.position + 1) % len;
    }

    #[inline]
    pub(super) fn interpolate(&mut self, numerator: u64, denominator: u64, output: &mut [Sample]) {
        let len = self.len();
        let fraction = numerator as Sample / denominator as Sample;
        // The output point lies between taps `half - 1` and `half`.
        let center = (self.half - 1) as Sample + fraction;

        let mut sum: Sample = 0.0;
        for tap in 0..len {
            let weight = self.kernel(tap as Sample - center);
            self.weights[tap] = weight;
            sum += weight;
        }
        let norm = if sum.abs() < MIN_WEIGHT_SUM { 1.0 } else { 1.0 / sum };

        for (channel, out) in output.iter_mut().enumerate().take(self.channels) {
            let history = &self.history[channel * 2 * len..][self.position..][..len];
            let acc: Sample = history.iter().zip(self.weights.iter()).map(|(s, w)| s * w).sum();
            *out = acc * norm;
        }
    }
}
