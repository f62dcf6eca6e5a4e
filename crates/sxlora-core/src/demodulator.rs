//! LoRa demodulator: sample stream to symbol packets
//!
//! The receiver walks a fixed state machine over the sample stream, one
//! symbol window (N samples) per work cycle:
//!
//! ```text
//!          ┌────────────────────────────────────────────┐
//!          ▼                                            │
//! ┌─────────────┐  preamble + sync word                 │
//! │  FRAMESYNC  │──────────────┐                        │
//! └─────────────┘              ▼                        │
//!                    ┌────────────┐   ┌────────────┐    │
//!                    │ DOWNCHIRP0 │──▶│ DOWNCHIRP1 │    │
//!                    └────────────┘   └─────┬──────┘    │
//!                                           ▼           │
//!                    ┌──────────────┐  ┌─────────────┐  │ MTU or
//!                    │ QUARTERCHIRP │─▶│ DATASYMBOLS │──┘ squelch
//!                    └──────────────┘  └─────────────┘
//! ```
//!
//! Every window is down-multiplied against a conjugated local chirp (an
//! upchirp replica in FRAMESYNC and DATASYMBOLS, a downchirp replica in
//! the downchirp states) and handed to the FFT detector.
//!
//! * **FRAMESYNC** hunts for the preamble: a peak quantized by `(v+4)/8`
//!   to 0 with sufficient SNR. Off-peak windows are realigned by consuming
//!   `N − v` samples, and the fractional bin offset accumulates into the
//!   fine frequency error. A preamble hit followed by the two sync-word
//!   nibbles advances to the downchirps.
//! * **DOWNCHIRP0/1** each measure a residual offset in `[-N/2, N/2)`; the
//!   average is the coarse frequency error.
//! * **QUARTERCHIRP** re-aligns by consuming `N/4 + freqError/2` samples
//!   and folds `freqError/2` into the fine tracker.
//! * **DATASYMBOLS** captures one symbol per window until `mtu` symbols
//!   are collected or the SNR falls below the threshold, then emits the
//!   packet and returns to FRAMESYNC.
//!
//! The fine-frequency tracker rotates each input sample by a table-lookup
//! complex exponential; the chirp replicas and the rotation table are
//! built once at construction and never reallocated.

use crate::chirp::base_chirp;
use crate::detector::{Detection, SymbolDetector};
use crate::params::PhyParams;
use crate::types::{IQSample, Symbol};
use std::f64::consts::PI;
use std::fmt;

/// Granularity of the fine-tune rotation table, in steps per FFT bin.
const FINE_STEPS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DemodState {
    FrameSync,
    Downchirp0,
    Downchirp1,
    QuarterChirp,
    DataSymbols,
}

/// Result of one demodulator work cycle.
#[derive(Debug, Clone, Default)]
pub struct DemodOutcome {
    /// Samples consumed from the input.
    pub consumed: usize,
    /// A completed symbol packet, when one was emitted this cycle.
    pub packet: Option<Vec<Symbol>>,
}

/// LoRa demodulator block.
///
/// Consumes the stream at the chip rate (N samples per symbol); decimation
/// from an oversampled front end happens upstream.
pub struct Demodulator {
    n: usize,
    sync_word: u8,
    mtu: usize,
    thresh_db: f32,

    detector: SymbolDetector,
    /// Conjugated upchirp replica: multiplying dechirps upchirp symbols.
    up_table: Vec<IQSample>,
    /// Conjugated downchirp replica for the downchirp states.
    down_table: Vec<IQSample>,
    /// Rotation table of size N * FINE_STEPS covering one full turn.
    fine_table: Vec<IQSample>,

    state: DemodState,
    preamble_seen: bool,
    down_offset: i32,
    freq_error: i32,
    fine_freq_error: f32,
    fine_accum: f64,
    symbols: Vec<Symbol>,

    power: f32,
    snr: f32,
}

impl fmt::Debug for Demodulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Demodulator")
            .field("n", &self.n)
            .field("state", &self.state)
            .finish()
    }
}

impl Demodulator {
    pub fn new(params: PhyParams) -> Self {
        let n = params.n();

        let up_table: Vec<IQSample> = base_chirp(n, false).iter().map(|c| c.conj()).collect();
        let down_table: Vec<IQSample> = base_chirp(n, true).iter().map(|c| c.conj()).collect();

        let table_len = n * FINE_STEPS;
        let fine_table: Vec<IQSample> = (0..table_len)
            .map(|i| {
                let phase = 2.0 * PI * i as f64 / table_len as f64;
                IQSample::new(phase.cos() as f32, phase.sin() as f32)
            })
            .collect();

        Self {
            n,
            sync_word: params.sync_word,
            mtu: params.mtu,
            thresh_db: params.thresh_db,
            detector: SymbolDetector::new(n),
            up_table,
            down_table,
            fine_table,
            state: DemodState::FrameSync,
            preamble_seen: false,
            down_offset: 0,
            freq_error: 0,
            fine_freq_error: 0.0,
            fine_accum: 0.0,
            symbols: Vec::new(),
            power: f32::NEG_INFINITY,
            snr: f32::NEG_INFINITY,
        }
    }

    /// Peak power of the last detected window, in dB.
    pub fn power(&self) -> f32 {
        self.power
    }

    /// SNR estimate of the last detected window, in dB.
    pub fn snr(&self) -> f32 {
        self.snr
    }

    /// Re-enter the initial state, clearing all tracking.
    pub fn reset(&mut self) {
        self.state = DemodState::FrameSync;
        self.preamble_seen = false;
        self.down_offset = 0;
        self.freq_error = 0;
        self.fine_freq_error = 0.0;
        self.fine_accum = 0.0;
        self.symbols.clear();
    }

    /// Rotate, dechirp and detect one N-sample window starting at
    /// `input[start]`.
    fn detect_window(&mut self, input: &[IQSample], start: usize, down: bool) -> Detection {
        let table_len = self.fine_table.len() as f64;
        let step = -(self.fine_freq_error as f64) * FINE_STEPS as f64;
        for i in 0..self.n {
            self.fine_accum = (self.fine_accum + step).rem_euclid(table_len);
            let rot = self.fine_table[self.fine_accum as usize];
            let replica = if down {
                self.down_table[i]
            } else {
                self.up_table[i]
            };
            let decd = input[start + i] * rot * replica;
            self.detector.feed(i, decd);
        }
        let detection = self.detector.detect();
        self.power = detection.power;
        self.snr = detection.snr();
        detection
    }

    /// Advance the fine-tune phase over `count` skipped samples.
    fn advance_fine(&mut self, count: usize) {
        let table_len = self.fine_table.len() as f64;
        let step = -(self.fine_freq_error as f64) * FINE_STEPS as f64;
        self.fine_accum = (self.fine_accum + step * count as f64).rem_euclid(table_len);
    }

    /// Run one work cycle over the input window.
    ///
    /// Suspends (consumes nothing) until at least `2N` samples are
    /// available; FRAMESYNC needs the second window for sync-word
    /// lookahead.
    pub fn work(&mut self, input: &[IQSample]) -> DemodOutcome {
        let n = self.n;
        if input.len() < 2 * n {
            return DemodOutcome::default();
        }

        let mut outcome = DemodOutcome {
            consumed: n,
            packet: None,
        };

        match self.state {
            DemodState::FrameSync => {
                let det = self.detect_window(input, 0, false);
                let v = det.max_index;

                // The negated comparison also parks on the NaN SNR of an
                // all-zero window.
                if !(det.snr() > self.thresh_db) {
                    self.preamble_seen = false;
                    self.fine_freq_error = 0.0;
                    return outcome;
                }

                let quantized = (v + 4) / 8;
                if self.preamble_seen && quantized == (self.sync_word >> 4) as usize {
                    let det2 = self.detect_window(input, n, false);
                    let quantized2 = (det2.max_index + 4) / 8;
                    if det2.snr() > self.thresh_db
                        && quantized2 == (self.sync_word & 0xf) as usize
                    {
                        self.state = DemodState::Downchirp0;
                        outcome.consumed = 2 * n;
                        return outcome;
                    }
                }

                if quantized == 0 {
                    self.preamble_seen = true;
                } else {
                    self.preamble_seen = false;
                }
                // Time-align the next window to the detected peak and fold
                // the fractional bin into the fine frequency error.
                self.fine_freq_error += det.f_index;
                outcome.consumed = n - v;
            }

            DemodState::Downchirp0 => {
                let det = self.detect_window(input, 0, true);
                self.down_offset = signed_offset(det.max_index, n);
                self.state = DemodState::Downchirp1;
            }

            DemodState::Downchirp1 => {
                let det = self.detect_window(input, 0, true);
                let second = signed_offset(det.max_index, n);
                self.freq_error = (self.down_offset + second) / 2;
                self.state = DemodState::QuarterChirp;
            }

            DemodState::QuarterChirp => {
                let skip = (n as i32 / 4 + self.freq_error / 2).max(0) as usize;
                self.advance_fine(skip);
                self.fine_freq_error += self.freq_error as f32 / 2.0;
                self.symbols.clear();
                self.state = DemodState::DataSymbols;
                outcome.consumed = skip;
            }

            DemodState::DataSymbols => {
                let det = self.detect_window(input, 0, false);
                if !(det.snr() > self.thresh_db) {
                    // Squelch: the packet ended before the MTU filled.
                    outcome.packet = Some(std::mem::take(&mut self.symbols));
                    self.enter_frame_sync();
                    return outcome;
                }

                self.symbols.push(det.max_index as Symbol);
                if self.symbols.len() >= self.mtu {
                    outcome.packet = Some(std::mem::take(&mut self.symbols));
                    self.enter_frame_sync();
                }
            }
        }

        outcome
    }

    fn enter_frame_sync(&mut self) {
        self.state = DemodState::FrameSync;
        self.preamble_seen = false;
        self.freq_error = 0;
        self.fine_freq_error = 0.0;
        self.fine_accum = 0.0;
    }

    /// Drive the state machine over a whole buffer, collecting every packet
    /// emitted along the way.
    pub fn demodulate(&mut self, samples: &[IQSample]) -> Vec<Vec<Symbol>> {
        let mut packets = Vec::new();
        let mut pos = 0usize;
        while samples.len() - pos >= 2 * self.n {
            // A cycle may legitimately consume zero samples (quarter-chirp
            // with a large negative frequency error); the state machine
            // still advances, so the loop cannot stall.
            let outcome = self.work(&samples[pos..]);
            pos += outcome.consumed;
            if let Some(packet) = outcome.packet {
                packets.push(packet);
            }
        }
        packets
    }
}

/// Map a detector bin to a residual offset in `[-N/2, N/2)`.
fn signed_offset(bin: usize, n: usize) -> i32 {
    if bin >= n / 2 {
        bin as i32 - n as i32
    } else {
        bin as i32
    }
}
