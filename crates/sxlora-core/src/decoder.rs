//! LoRa decoder: modulation symbols to payload bytes
//!
//! Inverse of the encoder pipeline:
//!
//! ```text
//! Symbols → Gray → deinterleave → dewhiten → FEC decode → header → CRC → bytes
//! ```
//!
//! The decoder converts measurement error into bit errors by applying the
//! Gray map, deinterleaves the header row (always RDD 4) and the payload
//! blocks, dewhitens, decodes the FEC, parses the explicit header when
//! present, and verifies the checksums.
//!
//! ## Drop semantics
//!
//! Corrupt packets are discarded silently: the `dropped` counter increments
//! and no payload is emitted. With `error_check` enabled the fatal
//! conditions are an uncorrectable FEC outcome, a header checksum mismatch
//! and a payload length that overflows the symbol budget; a header RDD
//! field above 4 always drops. A CRC mismatch drops when CRC checking is
//! enabled and the packet carries a CRC. Corrected single-bit Hamming
//! errors are not fatal.

use crate::coding::{
    binary_to_gray16, check_parity54, check_parity64, decode_hamming74sx,
    decode_hamming84sx, diagonal_deinterleave_sx, header_checksum, round_up,
};
use crate::crc::sx127x_data_checksum;
use crate::packet::PacketHeader;
use crate::params::{PhyParams, HEADER_RDD, N_HEADER_CODEWORDS, N_HEADER_SYMBOLS};
use crate::types::Symbol;
use crate::whitening::sx1272_whiten_lfsr;

/// LoRa decoder block.
#[derive(Debug, Clone)]
pub struct Decoder {
    params: PhyParams,
    dropped: u64,
    last_error: bool,
}

impl Decoder {
    pub fn new(params: PhyParams) -> Self {
        Self {
            params,
            dropped: 0,
            last_error: false,
        }
    }

    pub fn params(&self) -> &PhyParams {
        &self.params
    }

    /// Packets discarded since construction or [`reset`](Self::reset).
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Whether the last decoded packet had any FEC error, corrected or not.
    pub fn last_error(&self) -> bool {
        self.last_error
    }

    /// Clear the telemetry counters.
    pub fn reset(&mut self) {
        self.dropped = 0;
        self.last_error = false;
    }

    fn drop_packet(&mut self) -> Option<Vec<u8>> {
        self.dropped += 1;
        None
    }

    /// Decode a symbol vector into payload bytes.
    ///
    /// Returns `None` when the input is shorter than a header row (not a
    /// drop) or when the packet is discarded (counted in [`dropped`](Self::dropped)).
    pub fn decode(&mut self, input: &[Symbol]) -> Option<Vec<u8>> {
        let ppm = self.params.effective_ppm();
        let sf = self.params.sf.value() as usize;
        let explicit = self.params.explicit_header;

        if input.len() < N_HEADER_SYMBOLS {
            return None; // need at least a header row
        }

        let mut rdd = self.params.cr.rdd();
        let num_symbols = round_up(input.len(), 4 + rdd);
        let num_codewords = (num_symbols / (4 + rdd)) * ppm;
        let mut symbols = vec![0 as Symbol; num_symbols];
        symbols[..input.len()].copy_from_slice(input);

        // Gray encode; when SF > PPM, depad the LSBs with rounding. The
        // mask keeps the rounded value inside the symbol set (wraps to 0).
        let shift = sf - ppm;
        let half = ((1usize << shift) / 2) as Symbol;
        let mask = ((1u32 << ppm) - 1) as Symbol;
        for sym in symbols.iter_mut() {
            let v = sym.wrapping_add(half) >> shift;
            *sym = binary_to_gray16(v & mask);
        }

        if !self.params.interleaving {
            // Debug path: emit the Gray-mapped symbols as 16-bit LE.
            let mut out = Vec::with_capacity(2 * num_symbols);
            for sym in &symbols {
                out.extend_from_slice(&sym.to_le_bytes());
            }
            return Some(out);
        }

        // Deinterleave and dewhiten into codewords. The header row spans 8
        // symbols at RDD 4; when the payload redundancy matches, the whole
        // stream is one uniform pass.
        let mut codewords = vec![0u8; num_codewords];
        if rdd != HEADER_RDD {
            diagonal_deinterleave_sx(
                &symbols[..N_HEADER_SYMBOLS],
                &mut codewords[..ppm],
                ppm,
                HEADER_RDD,
            );
            if self.params.whitening {
                if explicit {
                    sx1272_whiten_lfsr(
                        &mut codewords[N_HEADER_CODEWORDS..ppm],
                        0,
                        HEADER_RDD,
                    );
                } else {
                    sx1272_whiten_lfsr(&mut codewords[..ppm], 0, HEADER_RDD);
                }
            }
            if num_symbols > N_HEADER_SYMBOLS {
                diagonal_deinterleave_sx(
                    &symbols[N_HEADER_SYMBOLS..],
                    &mut codewords[ppm..],
                    ppm,
                    rdd,
                );
                if self.params.whitening {
                    let bit_ofs = if explicit { ppm - N_HEADER_CODEWORDS } else { ppm };
                    sx1272_whiten_lfsr(&mut codewords[ppm..], bit_ofs, rdd);
                }
            }
        } else {
            diagonal_deinterleave_sx(&symbols, &mut codewords, ppm, rdd);
            if self.params.whitening {
                if explicit {
                    sx1272_whiten_lfsr(&mut codewords[N_HEADER_CODEWORDS..], 0, rdd);
                } else {
                    sx1272_whiten_lfsr(&mut codewords, 0, rdd);
                }
            }
        }

        let mut error = false;
        let mut bad = false;
        let mut bytes = vec![0u8; (num_codewords + 1) / 2];
        let mut c_ofs = 0usize;
        let mut d_ofs = 0usize;

        let packet_length;
        let mut data_length;
        let mut check_crc = self.params.crc_check;
        let mut crc_present = false;

        if explicit {
            let mut hdr = [0u8; 3];
            hdr[0] = decode_hamming84sx(codewords[1], &mut error, &mut bad) & 0xf;
            hdr[0] |= decode_hamming84sx(codewords[0], &mut error, &mut bad) << 4;
            hdr[1] = decode_hamming84sx(codewords[2], &mut error, &mut bad) & 0xf;
            hdr[2] = decode_hamming84sx(codewords[4], &mut error, &mut bad) & 0xf;
            hdr[2] |= decode_hamming84sx(codewords[3], &mut error, &mut bad) << 4;

            let (header, checksum_ok) = PacketHeader::from_bytes(&hdr);
            if (bad || !checksum_ok) && self.params.error_check {
                return self.drop_packet();
            }
            if header.rdd > 4 {
                return self.drop_packet();
            }

            crc_present = header.crc_enabled;
            if !crc_present {
                check_crc = false;
            }
            rdd = header.rdd as usize;
            packet_length = header.length as usize;
            data_length = packet_length + if crc_present { 5 } else { 3 };

            bytes[0] = hdr[0];
            bytes[1] = hdr[1];
            // Scrubbed checksum byte: zero when the header verified.
            bytes[2] = hdr[2] ^ header_checksum(&hdr[..2]);

            c_ofs = N_HEADER_CODEWORDS;
            d_ofs = 6;
        } else {
            packet_length = self.params.data_length;
            data_length = packet_length + if check_crc { 2 } else { 0 };
        }

        if data_length > bytes.len() {
            return self.drop_packet();
        }

        // Rest of the first row: always Hamming(8,4)sx.
        while c_ofs < ppm {
            let nibble = decode_hamming84sx(codewords[c_ofs], &mut error, &mut bad);
            if d_ofs & 1 == 1 {
                bytes[d_ofs >> 1] |= nibble << 4;
            } else {
                bytes[d_ofs >> 1] = nibble & 0xf;
            }
            c_ofs += 1;
            d_ofs += 1;
        }

        // The first row can end mid-byte; bridge with one payload-rate
        // codeword so the pair loop below starts byte-aligned.
        if d_ofs & 1 == 1 && c_ofs < num_codewords {
            let nibble = decode_fec(codewords[c_ofs], rdd, &mut error, &mut bad);
            bytes[d_ofs >> 1] |= nibble << 4;
            c_ofs += 1;
            d_ofs += 1;
        }
        let byte_ofs = d_ofs >> 1;

        if bad && self.params.error_check {
            self.last_error = true;
            return self.drop_packet();
        }

        for i in byte_ofs..data_length {
            if c_ofs + 2 > num_codewords {
                break;
            }
            let lo = decode_fec(codewords[c_ofs], rdd, &mut error, &mut bad);
            let hi = decode_fec(codewords[c_ofs + 1], rdd, &mut error, &mut bad);
            c_ofs += 2;
            bytes[i] = (lo & 0xf) | (hi << 4);
        }

        self.last_error = error;
        if bad && self.params.error_check {
            return self.drop_packet();
        }

        let mut out_ofs = 0usize;
        if explicit {
            if crc_present {
                // Always scrub the trailer; only drop when checking.
                let crc = sx127x_data_checksum(&bytes[3..3 + packet_length]);
                let packet_crc = bytes[3 + packet_length] as u16
                    | (bytes[4 + packet_length] as u16) << 8;
                if crc != packet_crc && check_crc {
                    return self.drop_packet();
                }
                bytes[3 + packet_length] ^= crc as u8;
                bytes[4 + packet_length] ^= (crc >> 8) as u8;
            }
            if !self.params.header_output {
                out_ofs = 3;
                data_length = packet_length;
            }
        } else if check_crc {
            let crc = sx127x_data_checksum(&bytes[..packet_length]);
            let packet_crc =
                bytes[packet_length] as u16 | (bytes[packet_length + 1] as u16) << 8;
            if crc != packet_crc {
                return self.drop_packet();
            }
            data_length = packet_length;
        }

        Some(bytes[out_ofs..out_ofs + data_length].to_vec())
    }
}

/// Decode one codeword with the code selected by `rdd`.
///
/// Parity mismatches are uncorrectable and set `bad`; Hamming(7,4)sx
/// corrects every single flip so it only reports `error`.
fn decode_fec(cw: u8, rdd: usize, error: &mut bool, bad: &mut bool) -> u8 {
    match rdd {
        0 => cw & 0xf,
        1 => {
            let mut mismatch = false;
            let nibble = check_parity54(cw, &mut mismatch);
            if mismatch {
                *error = true;
                *bad = true;
            }
            nibble
        }
        2 => {
            let mut mismatch = false;
            let nibble = check_parity64(cw, &mut mismatch);
            if mismatch {
                *error = true;
                *bad = true;
            }
            nibble
        }
        3 => decode_hamming74sx(cw, error),
        _ => decode_hamming84sx(cw, error, bad),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;
    use crate::params::PhyParams;

    fn params(sf: u8, cr: &str) -> PhyParams {
        PhyParams::builder()
            .spreading_factor(sf)
            .coding_rate(cr)
            .crc_check(true)
            .build()
            .unwrap()
    }

    fn xorshift_bytes(len: usize, mut seed: u64) -> Vec<u8> {
        (0..len)
            .map(|_| {
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                seed as u8
            })
            .collect()
    }

    #[test]
    fn roundtrip_single_zero_byte() {
        let p = params(7, "4/5");
        let encoder = Encoder::new(p.clone());
        let mut decoder = Decoder::new(p);

        let symbols = encoder.encode(&[0x00]);
        assert_eq!(decoder.decode(&symbols).unwrap(), vec![0x00]);
        assert_eq!(decoder.dropped(), 0);
    }

    #[test]
    fn roundtrip_all_ones() {
        let p = params(8, "4/8");
        let encoder = Encoder::new(p.clone());
        let mut decoder = Decoder::new(p);

        let payload = [0xFFu8; 4];
        assert_eq!(decoder.decode(&encoder.encode(&payload)).unwrap(), payload);
    }

    #[test]
    fn roundtrip_counting_pattern() {
        let p = params(10, "4/7");
        let encoder = Encoder::new(p.clone());
        let mut decoder = Decoder::new(p);

        let payload: Vec<u8> = (0x00..0x80).collect();
        assert_eq!(decoder.decode(&encoder.encode(&payload)).unwrap(), payload);
    }

    #[test]
    fn roundtrip_text_sf12() {
        let p = params(12, "4/8");
        let encoder = Encoder::new(p.clone());
        let mut decoder = Decoder::new(p);

        let payload = b"Hello LoRa";
        assert_eq!(decoder.decode(&encoder.encode(payload)).unwrap(), payload);
    }

    #[test]
    fn roundtrip_all_rates() {
        for sf in 7..=12u8 {
            for cr in ["4/4", "4/5", "4/6", "4/7", "4/8"] {
                let p = params(sf, cr);
                let encoder = Encoder::new(p.clone());
                let mut decoder = Decoder::new(p);

                for len in [1usize, 2, 16, 31, 100] {
                    let payload = xorshift_bytes(len, (sf as u64) << 8 | len as u64);
                    let decoded = decoder.decode(&encoder.encode(&payload));
                    assert_eq!(
                        decoded.as_deref(),
                        Some(&payload[..]),
                        "SF{} CR {} len {}",
                        sf,
                        cr,
                        len
                    );
                }
                assert_eq!(decoder.dropped(), 0, "SF{} CR {}", sf, cr);
            }
        }
    }

    #[test]
    fn roundtrip_reduced_symbol_set() {
        let p = PhyParams::builder()
            .spreading_factor(10)
            .symbol_size(8)
            .coding_rate("4/8")
            .crc_check(true)
            .build()
            .unwrap();
        let encoder = Encoder::new(p.clone());
        let mut decoder = Decoder::new(p);

        let payload = xorshift_bytes(40, 0xBEEF);
        assert_eq!(decoder.decode(&encoder.encode(&payload)).unwrap(), payload);
    }

    #[test]
    fn roundtrip_without_whitening_or_crc() {
        let p = PhyParams::builder()
            .spreading_factor(9)
            .coding_rate("4/6")
            .crc(false)
            .whitening(false)
            .build()
            .unwrap();
        let encoder = Encoder::new(p.clone());
        let mut decoder = Decoder::new(p);

        let payload = xorshift_bytes(21, 7);
        assert_eq!(decoder.decode(&encoder.encode(&payload)).unwrap(), payload);
    }

    #[test]
    fn roundtrip_implicit_mode() {
        for crc in [false, true] {
            let p = PhyParams::builder()
                .spreading_factor(8)
                .coding_rate("4/8")
                .explicit_header(false)
                .crc(crc)
                .crc_check(crc)
                .data_length(16)
                .build()
                .unwrap();
            let encoder = Encoder::new(p.clone());
            let mut decoder = Decoder::new(p);

            let payload = xorshift_bytes(16, 0x1234);
            assert_eq!(
                decoder.decode(&encoder.encode(&payload)).unwrap(),
                payload,
                "crc={}",
                crc
            );
            assert_eq!(decoder.dropped(), 0);
        }
    }

    #[test]
    fn header_output_includes_frame_fields() {
        let p = PhyParams::builder()
            .spreading_factor(9)
            .coding_rate("4/8")
            .crc_check(true)
            .header_output(true)
            .build()
            .unwrap();
        let encoder = Encoder::new(p.clone());
        let mut decoder = Decoder::new(p);

        let payload = [0x11u8, 0x22, 0x33];
        let out = decoder.decode(&encoder.encode(&payload)).unwrap();

        // length byte, flags (crc | rdd<<1), scrubbed checksum, payload,
        // scrubbed CRC trailer.
        assert_eq!(out.len(), 3 + payload.len() + 2);
        assert_eq!(out[0], payload.len() as u8);
        assert_eq!(out[1], 1 | (4 << 1));
        assert_eq!(out[2], 0);
        assert_eq!(&out[3..6], &payload);
        assert_eq!(&out[6..], &[0, 0]);
    }

    /// A single flipped codeword bit is corrected by Hamming(8,4)sx and the
    /// packet survives even with error checking on.
    #[test]
    fn corrects_single_bit_error() {
        let p = params(10, "4/8");
        let encoder = Encoder::new(p.clone());
        let mut decoder = Decoder::new(p);

        let payload = xorshift_bytes(128, 0xD00D);
        let mut symbols = encoder.encode(&payload);

        // Bit 0 of a data symbol maps through the Gray step to a single
        // codeword bit in the first payload block.
        symbols[8] ^= 1;

        assert_eq!(decoder.decode(&symbols).unwrap(), payload);
        assert_eq!(decoder.dropped(), 0);
        assert!(decoder.last_error());
    }

    /// Two flips landing in the same codeword are uncorrectable: the packet
    /// drops when error checking is on.
    #[test]
    fn drops_double_bit_error() {
        let p = params(10, "4/8");
        let encoder = Encoder::new(p.clone());
        let mut decoder = Decoder::new(p);

        let payload = xorshift_bytes(128, 0xFACE);
        let mut symbols = encoder.encode(&payload);

        // Symbol 8 bit 1 hits codewords 0 and 1 of the first payload block;
        // symbol 9 bit 0 hits codeword 1 again. Codeword 1 takes two hits.
        symbols[8] ^= 2;
        symbols[9] ^= 1;

        assert_eq!(decoder.decode(&symbols), None);
        assert_eq!(decoder.dropped(), 1);
    }

    #[test]
    fn corrupt_payload_fails_crc_check() {
        // With FEC error checking off, an uncorrectable codeword slips
        // through to the payload; the CRC stage still rejects the packet.
        let mut p = params(9, "4/8");
        p.error_check = false;
        let encoder = Encoder::new(p.clone());
        let mut decoder = Decoder::new(p);

        let payload = xorshift_bytes(24, 0xC0FFEE);
        let mut symbols = encoder.encode(&payload);
        symbols[8] ^= 2;
        symbols[9] ^= 1;

        assert_eq!(decoder.decode(&symbols), None);
        assert_eq!(decoder.dropped(), 1);
    }

    #[test]
    fn short_input_is_not_a_drop() {
        let p = params(7, "4/8");
        let mut decoder = Decoder::new(p);
        assert_eq!(decoder.decode(&[0, 1, 2]), None);
        assert_eq!(decoder.dropped(), 0);
    }

    #[test]
    fn interleaving_bypass_emits_raw_symbols() {
        let p = PhyParams::builder()
            .spreading_factor(7)
            .coding_rate("4/8")
            .interleaving(false)
            .build()
            .unwrap();
        let mut decoder = Decoder::new(p);
        let out = decoder.decode(&[0u16; 8]).unwrap();
        assert_eq!(out.len(), 16);
    }
}
