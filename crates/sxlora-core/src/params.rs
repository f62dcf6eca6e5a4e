//! LoRa PHY parameters and configuration
//!
//! ## Spreading Factor (SF)
//!
//! The spreading factor sets the bits per symbol; each symbol occupies
//! `2^SF` samples at the chip rate.
//!
//! | SF | Samples/Symbol | Bits/Symbol |
//! |----|----------------|-------------|
//! | 7  | 128            | 7           |
//! | 8  | 256            | 8           |
//! | 9  | 512            | 9           |
//! | 10 | 1024           | 10          |
//! | 11 | 2048           | 11          |
//! | 12 | 4096           | 12          |
//!
//! ## Symbol size (PPM)
//!
//! A reduced symbol set can be selected with `PPM < SF`; the encoder pads
//! symbols out to SF bits and the decoder strips the padding with rounding.
//! The special value 0 selects the full set (`PPM == SF`).
//!
//! ## Coding Rate (CR)
//!
//! Forward error correction adds RDD redundancy bits per data nibble:
//!
//! - 4/4: none (raw nibbles)
//! - 4/5: single parity bit
//! - 4/6: two parity bits
//! - 4/7: Hamming(7,4) sx variant, single-bit correction
//! - 4/8: Hamming(8,4) sx variant, single-bit correction + double detection

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{PhyError, PhyResult};

/// Number of Hamming(8,4)sx codewords carrying the explicit header.
pub const N_HEADER_CODEWORDS: usize = 5;

/// Number of symbols in the first interleaver row (always coded at RDD 4).
pub const N_HEADER_SYMBOLS: usize = 8;

/// Redundancy of the header row.
pub const HEADER_RDD: usize = 4;

/// Spreading factor for LoRa modulation (bits per symbol).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpreadingFactor {
    SF7 = 7,
    SF8 = 8,
    SF9 = 9,
    SF10 = 10,
    SF11 = 11,
    SF12 = 12,
}

impl SpreadingFactor {
    /// Create a spreading factor from a raw value.
    pub fn from_u8(value: u8) -> PhyResult<Self> {
        match value {
            7 => Ok(Self::SF7),
            8 => Ok(Self::SF8),
            9 => Ok(Self::SF9),
            10 => Ok(Self::SF10),
            11 => Ok(Self::SF11),
            12 => Ok(Self::SF12),
            _ => Err(PhyError::InvalidSpreadingFactor(value)),
        }
    }

    /// Get the raw value.
    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Samples per symbol at the chip rate. This is 2^SF.
    pub fn samples_per_symbol(&self) -> usize {
        1 << self.value()
    }
}

impl fmt::Display for SpreadingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SF{}", self.value())
    }
}

impl Default for SpreadingFactor {
    fn default() -> Self {
        Self::SF10
    }
}

/// Coding rate for forward error correction.
///
/// The discriminant is the redundancy RDD: the code maps 4 data bits to
/// 4+RDD bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodingRate {
    /// 4/4 - raw nibbles, no redundancy
    CR4_4 = 0,
    /// 4/5 - one parity bit
    CR4_5 = 1,
    /// 4/6 - two parity bits
    CR4_6 = 2,
    /// 4/7 - Hamming(7,4) sx
    CR4_7 = 3,
    /// 4/8 - Hamming(8,4) sx
    CR4_8 = 4,
}

impl CodingRate {
    /// Create from the raw redundancy value.
    pub fn from_u8(rdd: u8) -> PhyResult<Self> {
        match rdd {
            0 => Ok(Self::CR4_4),
            1 => Ok(Self::CR4_5),
            2 => Ok(Self::CR4_6),
            3 => Ok(Self::CR4_7),
            4 => Ok(Self::CR4_8),
            _ => Err(PhyError::InvalidCodingRate(format!("rdd={}", rdd))),
        }
    }

    /// Parse the configuration string form, e.g. `"4/8"`.
    pub fn from_str_form(cr: &str) -> PhyResult<Self> {
        match cr {
            "4/4" => Ok(Self::CR4_4),
            "4/5" => Ok(Self::CR4_5),
            "4/6" => Ok(Self::CR4_6),
            "4/7" => Ok(Self::CR4_7),
            "4/8" => Ok(Self::CR4_8),
            _ => Err(PhyError::InvalidCodingRate(cr.to_string())),
        }
    }

    /// Redundancy bits per data nibble (RDD).
    pub fn rdd(&self) -> usize {
        *self as usize
    }

    /// Codeword width: 4 data bits plus RDD parity bits.
    pub fn codeword_bits(&self) -> usize {
        4 + self.rdd()
    }
}

impl fmt::Display for CodingRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "4/{}", 4 + self.rdd())
    }
}

impl Default for CodingRate {
    fn default() -> Self {
        Self::CR4_8
    }
}

/// Complete PHY parameter set shared by the encoder, decoder, modulator and
/// demodulator blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhyParams {
    /// Spreading factor (7-12).
    pub sf: SpreadingFactor,
    /// Symbol set size in bits; 0 selects the full set (PPM == SF).
    pub ppm: u8,
    /// Coding rate for the payload.
    pub cr: CodingRate,
    /// Sync word: one byte, transmitted as two nibble symbols.
    pub sync_word: u8,
    /// Enable explicit header mode.
    pub explicit_header: bool,
    /// Append/verify a CRC-16 trailer.
    pub crc: bool,
    /// Check the CRC on decode (the trailer is scrubbed either way).
    pub crc_check: bool,
    /// Whiten codewords with the SX1272 LFSR sequence.
    pub whitening: bool,
    /// Deinterleave on decode; off emits raw Gray-mapped symbols.
    pub interleaving: bool,
    /// Drop packets on header/FEC/CRC failures.
    pub error_check: bool,
    /// Include the header bytes and scrubbed CRC in the decoder output.
    pub header_output: bool,
    /// Payload length for implicit-header mode.
    pub data_length: usize,
    /// Transmit amplitude.
    pub ampl: f32,
    /// Trailing zero padding after each packet, in symbol durations.
    pub padding: usize,
    /// Oversampling ratio (1-256), modulator output rate = BW * OVS.
    pub ovs: usize,
    /// Maximum symbols captured per packet by the demodulator.
    pub mtu: usize,
    /// Detection threshold in dB over the noise floor estimate.
    pub thresh_db: f32,
}

impl Default for PhyParams {
    fn default() -> Self {
        Self {
            sf: SpreadingFactor::default(),
            ppm: 0,
            cr: CodingRate::default(),
            sync_word: 0x12,
            explicit_header: true,
            crc: true,
            crc_check: false,
            whitening: true,
            interleaving: true,
            error_check: true,
            header_output: false,
            data_length: 8,
            ampl: 0.3,
            padding: 1,
            ovs: 1,
            mtu: 256,
            thresh_db: 6.0,
        }
    }
}

impl PhyParams {
    /// Create a new builder.
    pub fn builder() -> PhyParamsBuilder {
        PhyParamsBuilder::default()
    }

    /// Effective symbol size: `ppm`, or SF when the full set is selected.
    pub fn effective_ppm(&self) -> usize {
        if self.ppm == 0 {
            self.sf.value() as usize
        } else {
            self.ppm as usize
        }
    }

    /// Samples per symbol at the chip rate (2^SF).
    pub fn n(&self) -> usize {
        self.sf.samples_per_symbol()
    }

    /// Samples per symbol at the output rate (2^SF * OVS).
    pub fn nn(&self) -> usize {
        self.n() * self.ovs
    }
}

/// Builder for [`PhyParams`]; `build()` validates the combination.
#[derive(Default)]
pub struct PhyParamsBuilder {
    params: PhyParams,
    error: Option<PhyError>,
}

impl PhyParamsBuilder {
    pub fn spreading_factor(mut self, sf: u8) -> Self {
        match SpreadingFactor::from_u8(sf) {
            Ok(sf) => self.params.sf = sf,
            Err(e) => self.error = Some(e),
        }
        self
    }

    pub fn symbol_size(mut self, ppm: u8) -> Self {
        self.params.ppm = ppm;
        self
    }

    /// Coding rate in string form, e.g. `"4/7"`.
    pub fn coding_rate(mut self, cr: &str) -> Self {
        match CodingRate::from_str_form(cr) {
            Ok(cr) => self.params.cr = cr,
            Err(e) => self.error = Some(e),
        }
        self
    }

    pub fn sync_word(mut self, sync: u8) -> Self {
        self.params.sync_word = sync;
        self
    }

    pub fn explicit_header(mut self, explicit: bool) -> Self {
        self.params.explicit_header = explicit;
        self
    }

    pub fn crc(mut self, crc: bool) -> Self {
        self.params.crc = crc;
        self
    }

    pub fn crc_check(mut self, check: bool) -> Self {
        self.params.crc_check = check;
        self
    }

    pub fn whitening(mut self, whitening: bool) -> Self {
        self.params.whitening = whitening;
        self
    }

    pub fn interleaving(mut self, interleaving: bool) -> Self {
        self.params.interleaving = interleaving;
        self
    }

    pub fn error_check(mut self, check: bool) -> Self {
        self.params.error_check = check;
        self
    }

    pub fn header_output(mut self, hdr: bool) -> Self {
        self.params.header_output = hdr;
        self
    }

    pub fn data_length(mut self, len: usize) -> Self {
        self.params.data_length = len;
        self
    }

    pub fn amplitude(mut self, ampl: f32) -> Self {
        self.params.ampl = ampl;
        self
    }

    pub fn padding(mut self, padding: usize) -> Self {
        self.params.padding = padding;
        self
    }

    pub fn oversampling(mut self, ovs: usize) -> Self {
        self.params.ovs = ovs;
        self
    }

    pub fn mtu(mut self, mtu: usize) -> Self {
        self.params.mtu = mtu;
        self
    }

    pub fn threshold_db(mut self, thresh: f32) -> Self {
        self.params.thresh_db = thresh;
        self
    }

    /// Validate and produce the parameter set.
    pub fn build(self) -> PhyResult<PhyParams> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let p = self.params;
        if p.ppm > p.sf.value() {
            return Err(PhyError::SymbolSizeTooLarge {
                ppm: p.ppm,
                sf: p.sf.value(),
            });
        }
        if p.ppm != 0 && p.ppm < 7 {
            return Err(PhyError::SymbolSizeTooSmall(p.ppm));
        }
        if p.ovs < 1 || p.ovs > 256 {
            return Err(PhyError::InvalidOversampling(p.ovs));
        }
        Ok(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_per_symbol() {
        assert_eq!(SpreadingFactor::SF7.samples_per_symbol(), 128);
        assert_eq!(SpreadingFactor::SF10.samples_per_symbol(), 1024);
        assert_eq!(SpreadingFactor::SF12.samples_per_symbol(), 4096);
    }

    #[test]
    fn coding_rate_parse() {
        assert_eq!(CodingRate::from_str_form("4/4").unwrap().rdd(), 0);
        assert_eq!(CodingRate::from_str_form("4/8").unwrap().rdd(), 4);
        assert!(matches!(
            CodingRate::from_str_form("4/9"),
            Err(PhyError::InvalidCodingRate(_))
        ));
    }

    #[test]
    fn builder_validates() {
        assert!(PhyParams::builder()
            .spreading_factor(10)
            .coding_rate("4/7")
            .build()
            .is_ok());

        assert!(matches!(
            PhyParams::builder().spreading_factor(6).build(),
            Err(PhyError::InvalidSpreadingFactor(6))
        ));

        assert!(matches!(
            PhyParams::builder()
                .spreading_factor(8)
                .symbol_size(9)
                .build(),
            Err(PhyError::SymbolSizeTooLarge { ppm: 9, sf: 8 })
        ));

        assert!(matches!(
            PhyParams::builder().oversampling(0).build(),
            Err(PhyError::InvalidOversampling(0))
        ));
        assert!(matches!(
            PhyParams::builder().oversampling(257).build(),
            Err(PhyError::InvalidOversampling(257))
        ));
    }

    #[test]
    fn effective_ppm_full_set() {
        let p = PhyParams::builder().spreading_factor(11).build().unwrap();
        assert_eq!(p.effective_ppm(), 11);

        let p = PhyParams::builder()
            .spreading_factor(11)
            .symbol_size(8)
            .build()
            .unwrap();
        assert_eq!(p.effective_ppm(), 8);
    }
}
