//! Chirp signal generation
//!
//! A chirp is a signal whose instantaneous frequency sweeps linearly across
//! the bandwidth in one symbol time:
//!
//! ```text
//! Frequency                 Frequency
//!     ^                         ^
//! fmax|        ___/         fmax|\_
//!     |     __/                 |  \__
//!     |  __/                    |     \__
//! fmin|_/                   fmin|        \___
//!     +----------> Time         +----------> Time
//!       Upchirp                   Downchirp
//! ```
//!
//! A symbol `s` is an upchirp whose starting frequency is offset by `s/N`
//! of the bandwidth; the sweep wraps around inside the band. Multiplying a
//! received upchirp by a downchirp replica collapses it to a tone whose FFT
//! bin index is the symbol value.
//!
//! The phase accumulator is carried across calls so consecutive chirps are
//! phase-continuous, and is reduced modulo 2π on exit.

use std::f32::consts::PI;

use crate::types::IQSample;

/// Generate one chirp into `samps[..nn]`.
///
/// * `n` - samples per chirp without oversampling (2^SF)
/// * `ovs` - oversampling ratio
/// * `nn` - number of samples to generate (N*OVS, or N*OVS/4 for the
///   quarter chirp)
/// * `f0` - frequency offset in radians/sample (the transmit symbol)
/// * `down` - true for a downchirp
/// * `ampl` - amplitude
/// * `phase_accum` - running phase, updated in place and left in [0, 2π)
///
/// Returns the number of samples generated.
pub fn gen_chirp(
    samps: &mut [IQSample],
    n: usize,
    ovs: usize,
    nn: usize,
    f0: f32,
    down: bool,
    ampl: f32,
    phase_accum: &mut f32,
) -> usize {
    let f_min = -PI / ovs as f32;
    let f_max = PI / ovs as f32;
    let f_step = (2.0 * PI) / (n as f32 * (ovs * ovs) as f32);

    let mut f = f_min + f0;
    let mut phase = *phase_accum;
    for samp in samps.iter_mut().take(nn) {
        f += f_step;
        if f > f_max {
            f -= f_max - f_min;
        }
        if down {
            phase -= f;
        } else {
            phase += f;
        }
        *samp = IQSample::from_polar(ampl, phase);
    }
    phase -= (phase / (2.0 * PI)).floor() * (2.0 * PI);
    *phase_accum = phase;
    nn
}

/// Generate a full upchirp or downchirp of `n` samples at unit amplitude.
///
/// Convenience for building receiver replica tables.
pub fn base_chirp(n: usize, down: bool) -> Vec<IQSample> {
    let mut samps = vec![IQSample::new(0.0, 0.0); n];
    let mut phase = 0.0f32;
    gen_chirp(&mut samps, n, 1, n, 0.0, down, 1.0, &mut phase);
    samps
}
