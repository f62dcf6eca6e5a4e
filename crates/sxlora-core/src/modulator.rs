//! LoRa modulator: symbols to a complex baseband sample stream
//!
//! The transmit frame is a fixed chirp sequence around the data:
//!
//! ```text
//! ┌──────────────┬───────┬───────┬──────────┬──────┬─────────┬─────────┐
//! │ 10 upchirps  │ sync0 │ sync1 │ 2 down-  │ 1/4  │  data   │ zero    │
//! │   (f0 = 0)   │       │       │  chirps  │ down │ chirps  │ padding │
//! └──────────────┴───────┴───────┴──────────┴──────┴─────────┴─────────┘
//! ```
//!
//! The sync word is sent as two upchirps offset by `nibble × 8` bins. Each
//! work cycle produces one symbol duration of samples (`N·OVS`, or a
//! quarter of that for the quarter chirp). The phase accumulator is shared
//! by every state so the waveform is phase-continuous across the packet.
//!
//! String labels mark the state boundaries on the sample stream (`SYNC`,
//! `DC`, `QC`, `S<n>`, and `txEnd` at the last payload-adjacent sample);
//! external tooling uses them for alignment and plotting.

use std::collections::VecDeque;
use std::f32::consts::PI;

use crate::chirp::gen_chirp;
use crate::params::PhyParams;
use crate::types::{IQSample, Symbol};

/// A marker attached to an offset in a produced sample block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLabel {
    pub id: String,
    pub offset: usize,
}

/// Samples produced by one modulator work cycle.
#[derive(Debug, Clone, Default)]
pub struct ModOutput {
    pub samples: Vec<IQSample>,
    pub labels: Vec<StreamLabel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModState {
    WaitInput,
    FrameSync,
    SyncWord0,
    SyncWord1,
    Downchirp0,
    Downchirp1,
    QuarterChirp,
    DataSymbols,
    PadSymbols,
}

/// LoRa modulator block.
#[derive(Debug, Clone)]
pub struct Modulator {
    params: PhyParams,
    n: usize,
    state: ModState,
    counter: usize,
    payload: Vec<Symbol>,
    queue: VecDeque<Vec<Symbol>>,
    phase_accum: f32,
}

impl Modulator {
    pub fn new(params: PhyParams) -> Self {
        let n = params.n();
        Self {
            params,
            n,
            state: ModState::WaitInput,
            counter: 0,
            payload: Vec::new(),
            queue: VecDeque::new(),
            phase_accum: 0.0,
        }
    }

    pub fn params(&self) -> &PhyParams {
        &self.params
    }

    /// Queue a packet of symbols for transmission.
    pub fn push_packet(&mut self, symbols: Vec<Symbol>) {
        self.queue.push_back(symbols);
    }

    /// Run one work cycle, producing up to one symbol duration of samples.
    ///
    /// Returns `None` while waiting for input (the suspension point of the
    /// state machine).
    pub fn work(&mut self) -> Option<ModOutput> {
        let n = self.n;
        let ovs = self.params.ovs;
        let nn = self.params.nn();
        let ampl = self.params.ampl;
        let sync = self.params.sync_word;

        let mut out = ModOutput::default();
        let mut id = String::new();

        match self.state {
            ModState::WaitInput => {
                let packet = self.queue.pop_front()?;
                self.payload = packet;
                self.state = ModState::FrameSync;
                self.counter = 10;
                self.phase_accum = 0.0;
                return Some(out); // empty cycle: input latched
            }

            ModState::FrameSync => {
                self.counter -= 1;
                out.samples.resize(nn, IQSample::new(0.0, 0.0));
                gen_chirp(&mut out.samples, n, ovs, nn, 0.0, false, ampl, &mut self.phase_accum);
                if self.counter == 0 {
                    self.state = ModState::SyncWord0;
                }
            }

            ModState::SyncWord0 => {
                let sw0 = ((sync >> 4) as usize * 8) as f32;
                let freq = (2.0 * PI * sw0) / nn as f32;
                out.samples.resize(nn, IQSample::new(0.0, 0.0));
                gen_chirp(&mut out.samples, n, ovs, nn, freq, false, ampl, &mut self.phase_accum);
                self.state = ModState::SyncWord1;
                id = "SYNC".to_string();
            }

            ModState::SyncWord1 => {
                let sw1 = ((sync & 0xf) as usize * 8) as f32;
                let freq = (2.0 * PI * sw1) / nn as f32;
                out.samples.resize(nn, IQSample::new(0.0, 0.0));
                gen_chirp(&mut out.samples, n, ovs, nn, freq, false, ampl, &mut self.phase_accum);
                self.state = ModState::Downchirp0;
            }

            ModState::Downchirp0 => {
                out.samples.resize(nn, IQSample::new(0.0, 0.0));
                gen_chirp(&mut out.samples, n, ovs, nn, 0.0, true, ampl, &mut self.phase_accum);
                self.state = ModState::Downchirp1;
                id = "DC".to_string();
            }

            ModState::Downchirp1 => {
                out.samples.resize(nn, IQSample::new(0.0, 0.0));
                gen_chirp(&mut out.samples, n, ovs, nn, 0.0, true, ampl, &mut self.phase_accum);
                self.state = ModState::QuarterChirp;
            }

            ModState::QuarterChirp => {
                out.samples.resize(nn / 4, IQSample::new(0.0, 0.0));
                gen_chirp(&mut out.samples, n, ovs, nn / 4, 0.0, true, ampl, &mut self.phase_accum);
                self.state = ModState::DataSymbols;
                self.counter = 0;
                id = "QC".to_string();
            }

            ModState::DataSymbols => {
                let sym = self.payload[self.counter];
                self.counter += 1;
                let freq = (2.0 * PI * sym as f32) / nn as f32;
                out.samples.resize(nn, IQSample::new(0.0, 0.0));
                gen_chirp(&mut out.samples, n, ovs, nn, freq, false, ampl, &mut self.phase_accum);
                id = format!("S{}", self.counter);

                if self.counter >= self.payload.len() {
                    self.state = ModState::PadSymbols;
                    self.counter = 0;
                }
            }

            ModState::PadSymbols => {
                self.counter += 1;
                out.samples.resize(nn, IQSample::new(0.0, 0.0));
                if self.counter >= self.params.padding {
                    self.state = ModState::WaitInput;
                    out.labels.push(StreamLabel {
                        id: "txEnd".to_string(),
                        offset: n - 1,
                    });
                }
            }
        }

        if !id.is_empty() {
            out.labels.push(StreamLabel { id, offset: 0 });
        }
        Some(out)
    }

    /// Drive the state machine through one whole packet and collect the
    /// sample stream with labels at absolute offsets.
    pub fn modulate(&mut self, symbols: &[Symbol]) -> ModOutput {
        self.push_packet(symbols.to_vec());
        let mut stream = ModOutput::default();
        loop {
            let Some(cycle) = self.work() else { break };
            for label in cycle.labels {
                stream.labels.push(StreamLabel {
                    id: label.id,
                    offset: stream.samples.len() + label.offset,
                });
            }
            stream.samples.extend_from_slice(&cycle.samples);
            if self.state == ModState::WaitInput {
                break;
            }
        }
        stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params(sf: u8, padding: usize, ovs: usize) -> PhyParams {
        PhyParams::builder()
            .spreading_factor(sf)
            .amplitude(1.0)
            .padding(padding)
            .oversampling(ovs)
            .build()
            .unwrap()
    }

    #[test]
    fn packet_sample_count() {
        let mut modulator = Modulator::new(params(7, 2, 1));
        let n = 128;
        let symbols = vec![5u16, 99, 17];
        let out = modulator.modulate(&symbols);

        // 10 preamble + 2 sync + 2 downchirps + quarter + data + padding
        let expected = (10 + 2 + 2) * n + n / 4 + symbols.len() * n + 2 * n;
        assert_eq!(out.samples.len(), expected);
    }

    #[test]
    fn oversampled_packet_scales() {
        let mut modulator = Modulator::new(params(7, 1, 4));
        let nn = 128 * 4;
        let out = modulator.modulate(&[1u16]);
        let expected = (10 + 2 + 2) * nn + nn / 4 + nn + nn;
        assert_eq!(out.samples.len(), expected);
    }

    #[test]
    fn chirp_amplitude_is_constant() {
        let mut modulator = Modulator::new(params(7, 1, 1));
        let out = modulator.modulate(&[42u16]);
        // All but the trailing pad symbols are unit chirp samples.
        let chirped = out.samples.len() - 128;
        for s in &out.samples[..chirped] {
            assert_relative_eq!(s.norm(), 1.0, epsilon = 1e-4);
        }
        for s in &out.samples[chirped..] {
            assert_eq!(s.norm(), 0.0);
        }
    }

    #[test]
    fn labels_mark_state_boundaries() {
        let mut modulator = Modulator::new(params(7, 1, 1));
        let out = modulator.modulate(&[1u16, 2]);
        let n = 128;

        let ids: Vec<&str> = out.labels.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, ["SYNC", "DC", "QC", "S1", "S2", "txEnd"]);

        let sync = &out.labels[0];
        assert_eq!(sync.offset, 10 * n);
        let dc = &out.labels[1];
        assert_eq!(dc.offset, 12 * n);
        let qc = &out.labels[2];
        assert_eq!(qc.offset, 14 * n);
    }

    #[test]
    fn suspends_without_input() {
        let mut modulator = Modulator::new(params(8, 1, 1));
        assert!(modulator.work().is_none());

        modulator.push_packet(vec![7u16]);
        assert!(modulator.work().is_some());
    }

    #[test]
    fn back_to_back_packets() {
        let mut modulator = Modulator::new(params(7, 1, 1));
        let a = modulator.modulate(&[3u16]);
        let b = modulator.modulate(&[3u16]);
        assert_eq!(a.samples.len(), b.samples.len());
        assert!(modulator.work().is_none());
    }
}
