use once_cell::sync::Lazy;

use dotmatrix_core::GameBoy;

/// Header-complete 32KB NOP-sled image shared by the tests that only need
/// a valid cartridge behind the machine.
#[allow(dead_code)]
static BASE_ROM: Lazy<Vec<u8>> = Lazy::new(|| build_rom(0x00, &[]));

/// A 32KB ROM image with a valid header checksum, the given cartridge type
/// byte, and `code` placed at the 0x0100 entry point.
#[allow(dead_code)]
pub fn build_rom(cart_type: u8, code: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[0x0147] = cart_type;
    rom[0x0100..0x0100 + code.len()].copy_from_slice(code);
    let mut checksum = 0u8;
    for addr in 0x0134..=0x014C {
        checksum = checksum.wrapping_sub(rom[addr]).wrapping_sub(1);
    }
    rom[0x014D] = checksum;
    rom
}

/// Machine with `program` placed in work RAM and PC parked on it, so tests
/// can execute arbitrary bytes without building them into a ROM.
#[allow(dead_code)]
pub fn machine_with_wram_program(program: &[u8]) -> GameBoy {
    let mut gb = GameBoy::from_rom(BASE_ROM.clone());
    for (i, byte) in program.iter().enumerate() {
        gb.mmu.write8(0xC000 + i as u16, *byte);
    }
    gb.cpu.pc = 0xC000;
    gb
}
