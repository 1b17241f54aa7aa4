mod common;

use common::build_rom;
use dotmatrix_core::GameBoy;

/// A program that keeps mutating VRAM so successive frames differ.
fn vram_writer_rom() -> Vec<u8> {
    build_rom(
        0x01, // MBC1, to exercise mapper state in the snapshot
        &[
            0x21, 0x00, 0x80, // LD HL,0x8000
            0x3E, 0x00, // LD A,0
            0x22, // LD (HL+),A
            0x3C, // INC A
            0x18, 0xFC, // JR -4
        ],
    )
}

#[test]
fn restored_machine_replays_identical_frames() {
    let mut original = GameBoy::from_rom(vram_writer_rom());
    for _ in 0..3 {
        original.simulate_one_frame();
    }

    let mut state = Vec::new();
    original.serialize_state(&mut state);

    let mut restored = GameBoy::from_rom(vram_writer_rom());
    restored.restore_state(&state).expect("restore");

    // The same inputs at the same frame indices must produce bit-identical
    // framebuffers from here on.
    let inputs = [0x00u8, 0x04, 0x40, 0x00];
    for (frame, mask) in inputs.iter().enumerate() {
        original.set_inputs(*mask);
        restored.set_inputs(*mask);
        let a = original.simulate_one_frame().to_vec();
        let b = restored.simulate_one_frame().to_vec();
        assert_eq!(a, b, "frame {frame} diverged after restore");
        assert_eq!(original.cpu.cycles, restored.cpu.cycles);
    }
}

#[test]
fn snapshot_is_stable_across_save_restore_save() {
    let mut gb = GameBoy::from_rom(vram_writer_rom());
    for _ in 0..2 {
        gb.simulate_one_frame();
    }

    let mut first = Vec::new();
    gb.serialize_state(&mut first);

    let mut copy = GameBoy::from_rom(vram_writer_rom());
    copy.restore_state(&first).expect("restore");
    let mut second = Vec::new();
    copy.serialize_state(&mut second);

    assert_eq!(first, second);
}

#[test]
fn battery_ram_travels_with_the_snapshot() {
    let mut rom = build_rom(0x03, &[]); // MBC1+RAM+BATTERY
    rom[0x0149] = 0x02; // 8KB RAM
    // Recompute the checksum after editing the header.
    let mut checksum = 0u8;
    for addr in 0x0134..=0x014C {
        checksum = checksum.wrapping_sub(rom[addr]).wrapping_sub(1);
    }
    rom[0x014D] = checksum;

    let mut gb = GameBoy::from_rom(rom.clone());
    gb.mmu.write8(0x0000, 0x0A); // enable cartridge RAM
    gb.mmu.write8(0xA010, 0x5A);

    let mut state = Vec::new();
    gb.serialize_state(&mut state);

    let mut other = GameBoy::from_rom(rom);
    other.restore_state(&state).expect("restore");
    assert_eq!(other.mmu.read8(0xA010), 0x5A);
}
