use std::mem;

use super::lowpass::Lowpass;
use crate::common::{zeroed, Sample};
use crate::math;
use crate::Error;

/// Interpolates linearly between the two most recent input frames.
///
/// The low-pass filter runs on the input side when downsampling, so content above the
/// output Nyquist frequency is removed before it can alias, and on the output side when
/// upsampling, where it smooths the interpolation images.
#[derive(Clone, Debug)]
pub(super) struct LinearKernel {
    /// The frame before `next_frame`.
    current_frame: Box<[Sample]>,
    /// The most recently loaded frame.
    next_frame: Box<[Sample]>,
    lowpass: Option<Lowpass>,
    filter_input: bool,
}

impl LinearKernel {
    pub(super) fn new(channels: usize, from: u32, to: u32, lpf_order: u32) -> Result<Self, Error> {
        // Cutoff at the lower Nyquist frequency, relative to the higher rate.
        let cutoff = f64::from(from.min(to)) / f64::from(from.max(to)) / 2.0;
        Ok(Self {
            current_frame: zeroed(channels)?,
            next_frame: zeroed(channels)?,
            lowpass: Lowpass::new(lpf_order, cutoff, channels)?,
            filter_input: from > to,
        })
    }

    /// Input frames the output trails behind.
    pub(super) fn input_latency(&self) -> u64 {
        1 + self.lowpass.as_ref().map_or(0, |f| u64::from(f.order()))
    }

    #[inline]
    pub(super) fn load(&mut self, frame: &[Sample]) {
        mem::swap(&mut self.current_frame, &mut self.next_frame);
        self.next_frame.copy_from_slice(frame);
        if self.filter_input {
            if let Some(lowpass) = &mut self.lowpass {
                lowpass.process_frame(&mut self.next_frame);
            }
        }
    }

    #[inline]
    pub(super) fn interpolate(&mut self, numerator: u64, denominator: u64, output: &mut [Sample]) {
        for ((out, current), next) in output
            .iter_mut()
            .zip(self.current_frame.iter())
            .zip(self.next_frame.iter())
        {
            *out = math::lerp(current, next, numerator, denominator);
        }
        if !self.filter_input {
            if let Some(lowpass) = &mut self.lowpass {
                lowpass.process_frame(output);
            }
        }
    }
}
