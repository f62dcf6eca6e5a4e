//! Core types for the LoRa PHY
//!
//! Signals are complex baseband I/Q streams:
//!
//! ```text
//!            Q (Imaginary)
//!            ^
//!            |     * (I=0.7, Q=0.7)
//!            |    /
//!            |   / magnitude = 1.0
//!            |  /  phase = 45°
//!            | /
//!   ---------+---------> I (Real)
//!            |
//! ```
//!
//! Samples are stored as two 32-bit floats per sample (I, Q) at a rate of
//! `BW * OVS`. Symbols are integers in `[0, 2^PPM)` kept in 16-bit storage,
//! which fits every spreading factor from 7 to 12.

use num_complex::Complex32;

/// A single I/Q sample point.
pub type IQSample = Complex32;

/// A buffer of I/Q samples.
pub type IQBuffer = Vec<IQSample>;

/// A LoRa modulation symbol.
///
/// Symbols are integers from 0 to 2^PPM - 1. A 16-bit value holds all
/// symbol sizes from SF7 through SF12.
pub type Symbol = u16;

/// Result type for PHY operations.
pub type PhyResult<T> = Result<T, PhyError>;

/// Errors raised by invalid configuration.
///
/// These halt work. Recoverable receive conditions (noise, corrupt packets)
/// are not errors: they increment the decoder's `dropped` counter instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PhyError {
    #[error("invalid spreading factor: {0}. Must be between 7 and 12")]
    InvalidSpreadingFactor(u8),

    #[error("unknown coding rate: {0:?}")]
    InvalidCodingRate(String),

    #[error("invalid oversampling ratio: {0}. Must be between 1 and 256")]
    InvalidOversampling(usize),

    #[error("symbol size {ppm} exceeds spreading factor {sf}")]
    SymbolSizeTooLarge { ppm: u8, sf: u8 },

    #[error("invalid symbol size: {0}. Must be 0 (full set) or at least 7")]
    SymbolSizeTooSmall(u8),
}
