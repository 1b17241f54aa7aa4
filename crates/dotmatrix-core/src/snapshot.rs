//! Byte-stream snapshots of the whole machine.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! [8-byte magic "GBSTATE1"]
//! [u32 version]
//! [cpu: 10 register bytes | u16 PC | u16 SP | u64 cycles | flags byte]
//! [memory: WRAM (8K, or 32K CGB) | VRAM (8K, or 16K CGB) | OAM | HRAM]
//! [io: 128 bytes $FF00-$FF7F | IE]
//! [cgb palettes: 64 + 64 bytes]
//! [mbc: type byte | bank state | external RAM]
//! [gpu: scanline u8 | mode u8 | mode clock u64 | frame count u64]
//! [hardware internals: timer | joypad | serial | DMA engines]
//! ```
//!
//! `restore` parses and validates the whole stream before touching the
//! machine, so a failed restore leaves it in its pre-call state. It returns
//! the number of bytes consumed; hosts append their own state after that
//! offset.

use thiserror::Error;

use crate::cartridge::Cartridge;
use crate::gameboy::GameBoy;
use crate::mmu::Mmu;
use crate::timer::Timer;

pub const MAGIC: [u8; 8] = *b"GBSTATE1";
pub const VERSION: u32 = 1;

const WRAM_BANK: usize = 0x1000;
const VRAM_BANK: usize = 0x2000;
const OAM_LEN: usize = 0xA0;
const HRAM_LEN: usize = 0x7F;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("not a machine snapshot (bad magic)")]
    BadMagic,
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("snapshot truncated at offset {offset}")]
    Truncated { offset: usize },
    #[error("snapshot does not fit this machine: {0}")]
    Mismatch(&'static str),
}

// --- Write helpers ---

fn write_u16(out: &mut Vec<u8>, val: u16) {
    out.extend_from_slice(&val.to_le_bytes());
}

fn write_u32(out: &mut Vec<u8>, val: u32) {
    out.extend_from_slice(&val.to_le_bytes());
}

fn write_u64(out: &mut Vec<u8>, val: u64) {
    out.extend_from_slice(&val.to_le_bytes());
}

// --- Checked reader ---

struct Reader<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], SnapshotError> {
        let end = self.cursor.checked_add(len).ok_or(SnapshotError::Truncated {
            offset: self.cursor,
        })?;
        if end > self.data.len() {
            return Err(SnapshotError::Truncated {
                offset: self.cursor,
            });
        }
        let slice = &self.data[self.cursor..end];
        self.cursor = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, SnapshotError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, SnapshotError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self) -> Result<u32, SnapshotError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn u64(&mut self) -> Result<u64, SnapshotError> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }
}

fn cpu_flags_byte(gb: &GameBoy) -> u8 {
    let cpu = &gb.cpu;
    (cpu.ime as u8)
        | (cpu.halted as u8) << 1
        | (cpu.stopped as u8) << 2
        | (cpu.halt_bug as u8) << 3
        | (cpu.double_speed as u8) << 4
        | (cpu.ime_pending & 0x03) << 5
        | (gb.is_cgb() as u8) << 7
}

/// Append the full machine state to `out`.
pub fn save(gb: &GameBoy, out: &mut Vec<u8>) {
    let cgb = gb.is_cgb();
    out.extend_from_slice(&MAGIC);
    write_u32(out, VERSION);

    // cpu
    let cpu = &gb.cpu;
    out.extend_from_slice(&[
        cpu.a,
        cpu.f,
        cpu.b,
        cpu.c,
        cpu.d,
        cpu.e,
        cpu.h,
        cpu.l,
        cpu.current_opcode,
        cpu.last_flags,
    ]);
    write_u16(out, cpu.pc);
    write_u16(out, cpu.sp);
    write_u64(out, cpu.cycles);
    out.push(cpu_flags_byte(gb));

    // memory
    let mmu = &gb.mmu;
    let wram_banks = if cgb { 8 } else { 2 };
    for bank in mmu.wram.iter().take(wram_banks) {
        out.extend_from_slice(bank);
    }
    let vram_banks = if cgb { 2 } else { 1 };
    for bank in mmu.ppu.vram.iter().take(vram_banks) {
        out.extend_from_slice(bank);
    }
    out.extend_from_slice(&mmu.ppu.oam);
    out.extend_from_slice(&mmu.hram);

    // io
    out.extend_from_slice(&mmu.io_snapshot());

    // cgb palettes
    out.extend_from_slice(&mmu.ppu.bgpd);
    out.extend_from_slice(&mmu.ppu.obpd);

    // mbc
    match &mmu.cart {
        Some(cart) => cart.save_state(out),
        None => out.push(0xFF),
    }

    // gpu
    out.push(mmu.ppu.ly());
    out.push(mmu.ppu.mode);
    write_u64(out, mmu.ppu.mode_clock as u64);
    write_u64(out, mmu.ppu.frames());

    // hardware internals
    mmu.timer.save_state(out);
    mmu.joypad.save_state(out);
    mmu.serial.save_state(out);
    mmu.hdma_save_state(out);
}

/// Restore a snapshot into `gb`. Returns the bytes consumed. Validation
/// happens before any mutation; on `Err` the machine is untouched.
pub fn restore(gb: &mut GameBoy, data: &[u8]) -> Result<usize, SnapshotError> {
    let cgb = gb.is_cgb();
    let mut r = Reader::new(data);

    if r.take(8)? != MAGIC {
        return Err(SnapshotError::BadMagic);
    }
    let version = r.u32()?;
    if version != VERSION {
        return Err(SnapshotError::UnsupportedVersion(version));
    }

    // cpu
    let regs = r.take(10)?;
    let pc = r.u16()?;
    let sp = r.u16()?;
    let cycles = r.u64()?;
    let flags = r.u8()?;
    if (flags & 0x80 != 0) != cgb {
        return Err(SnapshotError::Mismatch("hardware mode"));
    }

    // memory
    let wram_banks = if cgb { 8 } else { 2 };
    let wram = r.take(wram_banks * WRAM_BANK)?;
    let vram_banks = if cgb { 2 } else { 1 };
    let vram = r.take(vram_banks * VRAM_BANK)?;
    let oam = r.take(OAM_LEN)?;
    let hram = r.take(HRAM_LEN)?;

    // io
    let io = r.take(129)?;

    // cgb palettes
    let bgpd = r.take(64)?;
    let obpd = r.take(64)?;

    // mbc
    let tag = r.u8()?;
    let mbc_state = match &gb.mmu.cart {
        Some(cart) => {
            if tag != cart.kind.tag() {
                return Err(SnapshotError::Mismatch("mapper type"));
            }
            let state_len = Cartridge::mapper_state_len(cart.kind);
            let mapper = r.take(state_len)?;
            let ram_len_pos = r.cursor;
            let ram_len = r.u32()? as usize;
            if ram_len != cart.ram.len() {
                return Err(SnapshotError::Mismatch("external RAM size"));
            }
            let _ram = r.take(ram_len)?;
            // Re-slice the whole mapper+ram region for Cartridge::load_state.
            Some(&data[ram_len_pos - state_len..r.cursor])
        }
        None => {
            if tag != 0xFF {
                return Err(SnapshotError::Mismatch("cartridge presence"));
            }
            None
        }
    };

    // gpu
    let gpu_ly = r.u8()?;
    let gpu_mode = r.u8()?;
    let gpu_mode_clock = r.u64()?;
    let gpu_frames = r.u64()?;

    // hardware internals
    let timer_state = r.take(Timer::STATE_LEN)?;
    let joypad_state = r.take(crate::joypad::Joypad::STATE_LEN)?;
    let serial_state = r.take(crate::serial::Serial::STATE_LEN)?;
    let hdma_state = r.take(Mmu::HDMA_STATE_LEN)?;

    // Everything parsed and validated; commit.
    let cpu = &mut gb.cpu;
    cpu.a = regs[0];
    cpu.f = regs[1] & 0xF0;
    cpu.b = regs[2];
    cpu.c = regs[3];
    cpu.d = regs[4];
    cpu.e = regs[5];
    cpu.h = regs[6];
    cpu.l = regs[7];
    cpu.current_opcode = regs[8];
    cpu.last_flags = regs[9];
    cpu.pc = pc;
    cpu.sp = sp;
    cpu.cycles = cycles;
    cpu.ime = flags & 0x01 != 0;
    cpu.halted = flags & 0x02 != 0;
    cpu.stopped = flags & 0x04 != 0;
    cpu.halt_bug = flags & 0x08 != 0;
    cpu.double_speed = flags & 0x10 != 0;
    cpu.ime_pending = (flags >> 5) & 0x03;

    let mmu = &mut gb.mmu;
    for (bank, chunk) in mmu
        .wram
        .iter_mut()
        .take(wram_banks)
        .zip(wram.chunks_exact(WRAM_BANK))
    {
        bank.copy_from_slice(chunk);
    }
    for (bank, chunk) in mmu
        .ppu
        .vram
        .iter_mut()
        .take(vram_banks)
        .zip(vram.chunks_exact(VRAM_BANK))
    {
        bank.copy_from_slice(chunk);
    }
    mmu.ppu.oam.copy_from_slice(oam);
    mmu.hram.copy_from_slice(hram);

    let mut io_buf = [0u8; 129];
    io_buf.copy_from_slice(io);
    mmu.restore_io(&io_buf);

    mmu.ppu.bgpd.copy_from_slice(bgpd);
    mmu.ppu.obpd.copy_from_slice(obpd);

    if let (Some(cart), Some(state)) = (mmu.cart.as_mut(), mbc_state) {
        cart.load_state(state);
    }

    mmu.ppu.ly = gpu_ly.min(153);
    mmu.ppu.mode = gpu_mode & 0x03;
    mmu.ppu.mode_clock = gpu_mode_clock as u32;
    mmu.ppu.frame_counter = gpu_frames;

    mmu.timer.load_state(timer_state);
    mmu.joypad.load_state(joypad_state);
    mmu.serial.load_state(serial_state);
    mmu.hdma_load_state(hdma_state);

    mmu.ppu.post_restore();

    Ok(r.cursor)
}
