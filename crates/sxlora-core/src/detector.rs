//! FFT-based symbol detection
//!
//! Dechirping a received symbol (multiplying by the conjugate replica)
//! turns it into a tone; the FFT bin with the most energy is the symbol
//! value:
//!
//! ```text
//!     │ Received     │ Replica        │ Result:
//!     │   Chirp      │  Downchirp     │  Single Tone
//! f   │      /       │  \             │     |
//!     │    /         │    \           │     |
//!     │  /           │      \    =    │     |
//!     │/             │        \       │     |
//!     └──────────    └──────────      └─────┴───── f
//!                                          ^
//!                                     symbol bin
//! ```
//!
//! Alongside the argmax the detector estimates the peak power, the noise
//! floor (total energy minus the peak), and a fractional bin offset from
//! three-bin interpolation used for fine frequency tracking.

use rustfft::{Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

use crate::types::IQSample;

/// Result of one [`SymbolDetector::detect`] call.
#[derive(Debug, Clone, Copy)]
pub struct Detection {
    /// Peak bin index; equals the symbol value for a dechirped input.
    pub max_index: usize,
    /// Peak power in dB, scaled so a full-amplitude tone sits near 0 dB.
    pub power: f32,
    /// Noise floor estimate in dB on the same scale.
    pub power_avg: f32,
    /// Fractional bin offset of the peak in [-0.5, 0.5].
    pub f_index: f32,
}

impl Detection {
    /// Peak power over the noise floor.
    pub fn snr(&self) -> f32 {
        self.power - self.power_avg
    }
}

/// Symbol detector over an N-point input buffer.
pub struct SymbolDetector {
    n: usize,
    power_scale: f32,
    fft: Arc<dyn Fft<f32>>,
    input: Vec<IQSample>,
    output: Vec<IQSample>,
    scratch: Vec<IQSample>,
}

impl fmt::Debug for SymbolDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolDetector").field("n", &self.n).finish()
    }
}

impl SymbolDetector {
    /// Create a detector for N-sample symbols. The FFT plan is built once
    /// and reused for every work cycle.
    pub fn new(n: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n);
        let scratch = vec![IQSample::new(0.0, 0.0); fft.get_outofplace_scratch_len()];

        Self {
            n,
            power_scale: 20.0 * (n as f32).log10(),
            fft,
            input: vec![IQSample::new(0.0, 0.0); n],
            output: vec![IQSample::new(0.0, 0.0); n],
            scratch,
        }
    }

    /// Input buffer size.
    pub fn size(&self) -> usize {
        self.n
    }

    /// Set input sample `i`.
    #[inline]
    pub fn feed(&mut self, i: usize, samp: IQSample) {
        self.input[i] = samp;
    }

    /// Compute `argmax |FFT(input)|²` with power and fractional-bin
    /// estimates over the currently fed buffer.
    pub fn detect(&mut self) -> Detection {
        self.fft.process_outofplace_with_scratch(
            &mut self.input,
            &mut self.output,
            &mut self.scratch,
        );

        let mut max_index = 0usize;
        let mut max_value = 0.0f32;
        let mut total = 0.0f64;
        for (i, bin) in self.output.iter().enumerate() {
            let mag2 = bin.re * bin.re + bin.im * bin.im;
            total += mag2 as f64;
            if mag2 > max_value {
                max_index = i;
                max_value = mag2;
            }
        }

        let noise = ((total - max_value as f64) as f32).sqrt();
        let fundamental = max_value.sqrt();

        let power = 20.0 * fundamental.log10() - self.power_scale;
        let power_avg = 20.0 * noise.log10() - self.power_scale;

        let left = self.output[if max_index > 0 { max_index - 1 } else { self.n - 1 }].norm();
        let right = self.output[if max_index < self.n - 1 { max_index + 1 } else { 0 }].norm();

        let denom = 2.0 * fundamental - right - left;
        let f_index = if denom == 0.0 {
            0.0
        } else {
            0.5 * (right - left) / denom
        };

        Detection {
            max_index,
            power,
            power_avg,
            f_index,
        }
    }
}
