//! Full transmit/receive loopback over a noisy channel
//!
//! Run with: cargo run --example loopback -p sxlora-core

use sxlora_core::{Decoder, Demodulator, Encoder, Modulator, NoiseGenerator, PhyParams};

fn main() {
    let params = PhyParams::builder()
        .spreading_factor(10)
        .coding_rate("4/8")
        .amplitude(1.0)
        .padding(64)
        .threshold_db(-18.0)
        .crc_check(true)
        .build()
        .expect("valid parameters");

    let encoder = Encoder::new(params.clone());
    let mut modulator = Modulator::new(params.clone());
    let mut demodulator = Demodulator::new(params.clone());
    let mut decoder = Decoder::new(params);

    let mut noise = NoiseGenerator::new(0xC0DE);
    noise.set_amplitude(4.0);

    let messages: Vec<&[u8]> = vec![
        b"Hello LoRa",
        b"chirp spread spectrum at four times the noise amplitude",
        b"the quick brown fox jumps over the lazy dog",
    ];

    for message in &messages {
        let symbols = encoder.encode(message);
        println!(
            "tx: {:3} bytes -> {:3} symbols",
            message.len(),
            symbols.len()
        );

        let mut stream = modulator.modulate(&symbols).samples;
        for samp in stream.iter_mut() {
            *samp += noise.sample_iq();
        }

        for packet in demodulator.demodulate(&stream) {
            println!(
                "rx: {:3} symbols, snr {:6.1} dB",
                packet.len(),
                demodulator.snr()
            );
            match decoder.decode(&packet) {
                Some(payload) => {
                    println!("    payload: {:?}", String::from_utf8_lossy(&payload));
                    assert_eq!(&payload, message);
                }
                None => println!("    dropped (total {})", decoder.dropped()),
            }
        }
    }

    println!("\ndropped packets: {}", decoder.dropped());
}
