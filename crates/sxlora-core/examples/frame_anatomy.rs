//! Dissect the modulated frame of a single packet
//!
//! Prints the encoded symbol values and the stream labels marking each
//! section of the transmit waveform.
//!
//! Run with: cargo run --example frame_anatomy -p sxlora-core

use sxlora_core::{Encoder, Modulator, PhyParams};

fn main() {
    let params = PhyParams::builder()
        .spreading_factor(8)
        .coding_rate("4/7")
        .amplitude(0.5)
        .padding(2)
        .build()
        .expect("valid parameters");

    let n = params.n();
    let encoder = Encoder::new(params.clone());
    let mut modulator = Modulator::new(params);

    let payload = b"anatomy";
    let symbols = encoder.encode(payload);

    println!("payload: {} bytes -> {} symbols (N = {})", payload.len(), symbols.len(), n);
    for (i, chunk) in symbols.chunks(8).enumerate() {
        println!("  symbols[{:2}..]: {:?}", i * 8, chunk);
    }

    let stream = modulator.modulate(&symbols);
    println!("\nwaveform: {} samples", stream.samples.len());
    println!("  {:>8}  label", "offset");
    for label in &stream.labels {
        println!("  {:>8}  {}  (symbol boundary {})", label.offset, label.id, label.offset / n);
    }
}
