//! Dither noise for requantization.
//!
//! The noise is expressed in LSBs of the target format, so the caller scales its signal to
//! the integer range, adds [`Dither::next_noise`] and rounds.

use rand::{distr::Uniform, rngs::SmallRng, RngExt, SeedableRng};
use rand_distr::Triangular;

use crate::common::Sample;
use crate::config::DitherMode;
use crate::Error;

#[derive(Clone, Debug)]
#[allow(clippy::upper_case_acronyms)]
enum NoiseGenerator {
    /// Uniform in [-0.5, 0.5] LSB.
    RPDF(Uniform<Sample>),
    /// Triangular in [-1, 1] LSB, the distribution of the sum of two RPDF sources.
    TPDF(Triangular<Sample>),
}

/// Seeded dither noise source.
#[derive(Clone, Debug)]
pub(crate) struct Dither {
    rng: SmallRng,
    noise: NoiseGenerator,
}

impl Dither {
    /// Returns `None` for [`DitherMode::None`].
    pub(crate) fn new(mode: DitherMode, seed: u64) -> Result<Option<Self>, Error> {
        let noise = match mode {
            DitherMode::None => return Ok(None),
            DitherMode::Rectangular => NoiseGenerator::RPDF(
                Uniform::new_inclusive(-0.5, 0.5)
                    .map_err(|_| Error::InternalFault("rectangular dither distribution"))?,
            ),
            DitherMode::Triangular => NoiseGenerator::TPDF(
                Triangular::new(-1.0, 1.0, 0.0)
                    .map_err(|_| Error::InternalFault("triangular dither distribution"))?,
            ),
        };
        Ok(Some(Self {
            rng: SmallRng::seed_from_u64(seed),
            noise,
        }))
    }

    /// Next noise value in LSBs.
    #[inline]
    pub(crate) fn next_noise(&mut self) -> Sample {
        match &self.noise {
            NoiseGenerator::RPDF(distribution) => self.rng.sample(distribution),
            NoiseGenerator::TPDF(distribution) => self.rng.sample(distribution),
        }
    }

    pub(crate) fn mode(&self) -> DitherMode {
        match self.noise {
            NoiseGenerator::RPDF(_) => DitherMode::Rectangular,
            NoiseGenerator::TPDF(_) => DitherMode::Triangular,
        }
    }
}
