//! Run a ROM headless for a number of frames and print a digest of each
//! framebuffer, plus any serial output. Useful for regression-checking test
//! ROMs without a frontend.

use std::env;
use std::fs;

use dotmatrix_core::GameBoy;

const DEFAULT_FRAMES: u32 = 60;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let rom_path = args
        .next()
        .ok_or("expected <rom> [--frames=N] [--inputs=HEXMASK]")?;

    let mut frames = DEFAULT_FRAMES;
    let mut inputs = 0u8;
    for arg in args {
        if let Some(value) = arg.strip_prefix("--frames=") {
            frames = value.parse()?;
        } else if let Some(value) = arg.strip_prefix("--inputs=") {
            inputs = u8::from_str_radix(value, 16)?;
        } else {
            return Err(format!("unrecognised flag: {arg}").into());
        }
    }

    let rom = fs::read(&rom_path)?;
    let mut gb = GameBoy::from_rom(rom);
    println!(
        "mode: {}",
        if gb.is_cgb() { "CGB" } else { "DMG" }
    );

    for frame in 0..frames {
        gb.set_inputs(inputs);
        let framebuffer = gb.simulate_one_frame();
        println!("frame {:5}  digest {:016x}", frame, digest(framebuffer));
        if gb.is_breaking() {
            println!("breakpoint hit at {}", gb.cpu.debug_state());
            break;
        }
    }

    let serial = gb.take_serial();
    if !serial.is_empty() {
        println!("serial: {}", String::from_utf8_lossy(&serial));
    }
    Ok(())
}

/// FNV-1a over the framebuffer words.
fn digest(pixels: &[u32]) -> u64 {
    let mut hash = 0xCBF2_9CE4_8422_2325u64;
    for px in pixels {
        for byte in px.to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
        }
    }
    hash
}
