//! Butterworth low-pass filter built from cascaded bilinear-transform sections.

use std::f64::consts::PI;

use crate::common::{zeroed, Sample};
use crate::Error;

/// Direct form I coefficients, normalized by `a0`.
#[derive(Clone, Debug)]
struct BltApplier {
    b0: Sample,
    b1: Sample,
    b2: Sample,
    a1: Sample,
    a2: Sample,
}

impl BltApplier {
    /// Second order low-pass section with quality factor `q`.
    fn second_order(w0: f64, q: f64) -> Self {
        let alpha = w0.sin() / (2.0 * q);
        let b1 = 1.0 - w0.cos();
        let b0 = b1 / 2.0;
        let b2 = b0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * w0.cos();
        let a2 = 1.0 - alpha;

        BltApplier {
            b0: (b0 / a0) as Sample,
            b1: (b1 / a0) as Sample,
            b2: (b2 / a0) as Sample,
            a1: (a1 / a0) as Sample,
            a2: (a2 / a0) as Sample,
        }
    }

    /// First order low-pass section, completing odd filter orders.
    fn first_order(w0: f64) -> Self {
        let k = (w0 / 2.0).tan();
        let b0 = k / (1.0 + k);

        BltApplier {
            b0: b0 as Sample,
            b1: b0 as Sample,
            b2: 0.0,
            a1: ((k - 1.0) / (k + 1.0)) as Sample,
            a2: 0.0,
        }
    }

    #[inline]
    fn apply(&self, x_n: Sample, x_n1: Sample, x_n2: Sample, y_n1: Sample, y_n2: Sample) -> Sample {
        self.b0 * x_n + self.b1 * x_n1 + self.b2 * x_n2 - self.a1 * y_n1 - self.a2 * y_n2
    }
}

/// Filter history of one channel in one section.
const STATE_LEN: usize = 4;

#[derive(Clone, Debug)]
struct Section {
    applier: BltApplier,
    /// `[x_n1, x_n2, y_n1, y_n2]` for every channel.
    state: Box<[Sample]>,
}

/// Low-pass filter of a configurable order applied to interleaved frames in place.
#[derive(Clone, Debug)]
pub(super) struct Lowpass {
    order: u32,
    sections: Vec<Section>,
}

impl Lowpass {
    /// Filter of `order` with its cutoff at `cutoff` times the sampling frequency.
    ///
    /// `cutoff` must lie in `(0, 0.5)`. Returns `None` for order 0.
    pub(super) fn new(order: u32, cutoff: f64, channels: usize) -> Result<Option<Self>, Error> {
        if order == 0 {
            return Ok(None);
        }
        let w0 = 2.0 * PI * cutoff;
        let n = f64::from(order);

        let mut appliers = Vec::new();
        if order % 2 == 0 {
            for k in 0..order / 2 {
                let q = 1.0 / (2.0 * (PI * f64::from(2 * k + 1) / (2.0 * n)).cos());
                appliers.push(BltApplier::second_order(w0, q));
            }
        } else {
            for k in 1..=(order - 1) / 2 {
                let q = 1.0 / (2.0 * (PI * f64::from(k) / n).cos());
                appliers.push(BltApplier::second_order(w0, q));
            }
            appliers.push(BltApplier::first_order(w0));
        }

        let mut sections = Vec::new();
        sections
            .try_reserve_exact(appliers.len())
            .map_err(|_| Error::OutOfMemory)?;
        for applier in appliers {
            sections.push(Section {
                applier,
                state: zeroed(channels * STATE_LEN)?,
            });
        }
        Ok(Some(Self { order, sections }))
    }

    /// Filters one interleaved frame in place.
    #[inline]
    pub(super) fn process_frame(&mut self, frame: &mut [Sample]) {
        for section in &mut self.sections {
            for (sample, state) in frame.iter_mut().zip(section.state.chunks_exact_mut(STATE_LEN)) {
                let [x_n1, x_n2, y_n1, y_n2] = [state[0], state[1], state[2], state[3]];
                let result = section.applier.apply(*sample, x_n1, x_n2, y_n1, y_n2);
                state.copy_from_slice(&[*sample, x_n1, result, y_n1]);
                *sample = result;
            }
        }
    }

    pub(super) fn order(&self) -> u32 {
        self.order
    }
}
