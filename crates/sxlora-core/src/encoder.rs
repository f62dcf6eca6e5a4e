//! LoRa encoder: payload bytes to modulation symbols
//!
//! ```text
//! Payload bytes
//!    │
//!    ▼
//! ┌──────────────┐
//! │  CRC-16      │  optional little-endian trailer
//! └──────────────┘
//!    │
//!    ▼
//! ┌──────────────┐
//! │ Header + FEC │  5 header codewords, Hamming(8,4)sx first row,
//! └──────────────┘  RDD-selected code for the rest
//!    │
//!    ▼
//! ┌──────────────┐
//! │  Whitening   │  SX1272 LFSR, header region skipped via bit offset
//! └──────────────┘
//!    │
//!    ▼
//! ┌──────────────┐
//! │ Interleave   │  diagonal, per PPM-codeword block
//! └──────────────┘
//!    │
//!    ▼
//! ┌──────────────┐
//! │   Gray⁻¹     │  inverse Gray, pad LSBs out to SF bits
//! └──────────────┘
//!    │
//!    ▼
//! Symbols (u16)
//! ```
//!
//! The first PPM codewords always form 8 symbols coded at RDD 4; remaining
//! blocks of PPM codewords form 4+RDD symbols each.

use crate::coding::{
    diagonal_interleave_sx, encode_hamming74sx, encode_hamming84sx, encode_parity54,
    encode_parity64, gray_to_binary16, round_up,
};
use crate::crc::sx127x_data_checksum;
use crate::packet::PacketHeader;
use crate::params::{PhyParams, HEADER_RDD, N_HEADER_CODEWORDS, N_HEADER_SYMBOLS};
use crate::types::Symbol;
use crate::whitening::sx1272_whiten_lfsr;

/// LoRa encoder block.
///
/// A pure function over one packet: no state is carried between calls.
#[derive(Debug, Clone)]
pub struct Encoder {
    params: PhyParams,
}

impl Encoder {
    pub fn new(params: PhyParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PhyParams {
        &self.params
    }

    /// Encode one payload into PPM-padded modulation symbols.
    pub fn encode(&self, payload: &[u8]) -> Vec<Symbol> {
        let ppm = self.params.effective_ppm();
        let sf = self.params.sf.value() as usize;
        let rdd = self.params.cr.rdd();
        let explicit = self.params.explicit_header;

        let mut bytes = payload.to_vec();
        if self.params.crc {
            let crc = sx127x_data_checksum(payload);
            bytes.push(crc as u8);
            bytes.push((crc >> 8) as u8);
        }

        let hdr_cws = if explicit { N_HEADER_CODEWORDS } else { 0 };
        let num_codewords = round_up(bytes.len() * 2 + hdr_cws, ppm);
        let num_symbols = N_HEADER_SYMBOLS + (num_codewords / ppm - 1) * (4 + rdd);

        // Round-up slack is encoded from zero pad nibbles.
        bytes.resize((num_codewords - hdr_cws + 1) / 2, 0);

        let mut codewords = vec![0u8; num_codewords];
        let mut c_ofs = 0usize;
        let mut d_ofs = 0usize;

        if explicit {
            let hdr = PacketHeader {
                length: payload.len() as u8,
                rdd: rdd as u8,
                crc_enabled: self.params.crc,
            }
            .to_bytes();
            codewords[0] = encode_hamming84sx(hdr[0] >> 4);
            codewords[1] = encode_hamming84sx(hdr[0] & 0xf);
            codewords[2] = encode_hamming84sx(hdr[1] & 0xf);
            codewords[3] = encode_hamming84sx(hdr[2] >> 4);
            codewords[4] = encode_hamming84sx(hdr[2] & 0xf);
            c_ofs = N_HEADER_CODEWORDS;
        }

        // First row is always coded at the header redundancy.
        let c_ofs1 = c_ofs;
        let count = ppm - c_ofs;
        encode_fec(
            &mut codewords,
            HEADER_RDD,
            &mut c_ofs,
            &mut d_ofs,
            &bytes,
            count,
        );
        if self.params.whitening {
            sx1272_whiten_lfsr(&mut codewords[c_ofs1..ppm], 0, HEADER_RDD);
        }

        if num_codewords > ppm {
            let c_ofs2 = c_ofs;
            let count = num_codewords - ppm;
            encode_fec(&mut codewords, rdd, &mut c_ofs, &mut d_ofs, &bytes, count);
            if self.params.whitening {
                sx1272_whiten_lfsr(&mut codewords[c_ofs2..], ppm - c_ofs1, rdd);
            }
        }

        let mut symbols = vec![0 as Symbol; num_symbols];
        diagonal_interleave_sx(
            &codewords[..ppm],
            &mut symbols[..N_HEADER_SYMBOLS],
            ppm,
            HEADER_RDD,
        );
        if num_codewords > ppm {
            diagonal_interleave_sx(
                &codewords[ppm..],
                &mut symbols[N_HEADER_SYMBOLS..],
                ppm,
                rdd,
            );
        }

        // Inverse Gray; when SF > PPM, pad out the LSBs.
        for sym in &mut symbols {
            *sym = gray_to_binary16(*sym) << (sf - ppm);
        }

        symbols
    }
}

/// Encode `count` nibbles with the code selected by `rdd`, low nibble of
/// each byte first.
fn encode_fec(
    codewords: &mut [u8],
    rdd: usize,
    c_ofs: &mut usize,
    d_ofs: &mut usize,
    bytes: &[u8],
    count: usize,
) {
    for _ in 0..count {
        let nibble = if *d_ofs & 1 == 1 {
            bytes[*d_ofs >> 1] >> 4
        } else {
            bytes[*d_ofs >> 1] & 0xf
        };
        codewords[*c_ofs] = match rdd {
            0 => nibble,
            1 => encode_parity54(nibble),
            2 => encode_parity64(nibble),
            3 => encode_hamming74sx(nibble),
            _ => encode_hamming84sx(nibble),
        };
        *c_ofs += 1;
        *d_ofs += 1;
    }
}
