//! # sxlora-core
//!
//! Software-defined-radio LoRa PHY transceiver core, wire-compatible with
//! Semtech SX127x emission. The crate converts payload bytes into a complex
//! baseband sample stream and back, covering synchronization, FFT symbol
//! detection, coding, interleaving, whitening, framing and CRC.
//!
//! ## Signal flow
//!
//! ```text
//! TX: bytes → Encoder → symbols → Modulator → I/Q samples
//!             (CRC, header, FEC,   (preamble, sync word,
//!              whiten, interleave,  downchirps, data chirps)
//!              Gray⁻¹)
//!
//! RX: I/Q → Demodulator → symbols → Decoder → bytes
//!           (preamble lock, sync    (Gray, deinterleave,
//!            match, freq tracking,   dewhiten, FEC, header,
//!            FFT detection)          CRC)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use sxlora_core::{Decoder, Demodulator, Encoder, Modulator, PhyParams};
//!
//! let params = PhyParams::builder()
//!     .spreading_factor(10)
//!     .coding_rate("4/8")
//!     .amplitude(1.0)
//!     .padding(4)
//!     .build()
//!     .unwrap();
//!
//! let encoder = Encoder::new(params.clone());
//! let mut modulator = Modulator::new(params.clone());
//! let mut demodulator = Demodulator::new(params.clone());
//! let mut decoder = Decoder::new(params);
//!
//! let stream = modulator.modulate(&encoder.encode(b"Hello LoRa"));
//! let packets = demodulator.demodulate(&stream.samples);
//! let payload = decoder.decode(&packets[0]).unwrap();
//! assert_eq!(payload, b"Hello LoRa");
//! ```

pub mod chirp;
pub mod coding;
pub mod crc;
pub mod decoder;
pub mod demodulator;
pub mod detector;
pub mod encoder;
pub mod modulator;
pub mod noise;
pub mod packet;
pub mod params;
pub mod types;
pub mod whitening;

pub use decoder::Decoder;
pub use demodulator::{DemodOutcome, Demodulator};
pub use detector::{Detection, SymbolDetector};
pub use encoder::Encoder;
pub use modulator::{ModOutput, Modulator, StreamLabel};
pub use noise::NoiseGenerator;
pub use packet::PacketHeader;
pub use params::{CodingRate, PhyParams, SpreadingFactor};
pub use types::{IQBuffer, IQSample, PhyError, PhyResult, Symbol};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::decoder::Decoder;
    pub use crate::demodulator::Demodulator;
    pub use crate::encoder::Encoder;
    pub use crate::modulator::Modulator;
    pub use crate::params::{CodingRate, PhyParams, SpreadingFactor};
    pub use crate::types::{IQSample, Symbol};
}
