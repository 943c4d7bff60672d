/// Stream sample rate (frames per second).
pub type SampleRate = u32;

/// Number of channels in a stream.
pub type ChannelCount = u16;

/// Precision every stage between the input and output format conversion works in.
#[cfg(not(feature = "64bit"))]
pub type Sample = f32;
/// Precision every stage between the input and output format conversion works in.
#[cfg(feature = "64bit")]
pub type Sample = f64;

use crate::Error;

/// Allocates a zeroed block, reporting allocation failure instead of aborting.
pub(crate) fn zeroed<T: Clone + Default>(len: usize) -> Result<Box<[T]>, Error> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| Error::OutOfMemory)?;
    buffer.resize(len, T::default());
    Ok(buffer.into_boxed_slice())
}

macro_rules! assert_error_traits {
    ($to_test:path) => {
        const _: () = { $crate::common::check_error_traits::<$to_test>() };
    };
}

pub(crate) use assert_error_traits;

#[allow(dead_code)]
pub(crate) const fn check_error_traits<
    T: Send + Sync + std::fmt::Debug + std::fmt::Display + Clone + std::error::Error + 'static,
>() {
}
