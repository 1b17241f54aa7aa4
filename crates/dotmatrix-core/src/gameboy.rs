use log::info;

use crate::breakpoints::{BreakpointCallback, BreakpointEngine};
use crate::cartridge::Cartridge;
use crate::cpu::Cpu;
use crate::mmu::{ApuHook, Mmu};
use crate::opcodes;
use crate::ppu::{PaletteHook, PixelMode};
use crate::serial::LinkPort;
use crate::snapshot::{self, SnapshotError};

/// The five interrupt sources, in IE/IF bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank,
    LcdStat,
    Timer,
    Serial,
    Joypad,
}

impl Interrupt {
    pub fn bit(self) -> u8 {
        match self {
            Interrupt::VBlank => 0,
            Interrupt::LcdStat => 1,
            Interrupt::Timer => 2,
            Interrupt::Serial => 3,
            Interrupt::Joypad => 4,
        }
    }

    pub fn mask(self) -> u8 {
        1 << self.bit()
    }

    pub fn vector(self) -> u16 {
        0x0040 + 8 * self.bit() as u16
    }

    fn from_bit(bit: u8) -> Option<Self> {
        match bit {
            0 => Some(Interrupt::VBlank),
            1 => Some(Interrupt::LcdStat),
            2 => Some(Interrupt::Timer),
            3 => Some(Interrupt::Serial),
            4 => Some(Interrupt::Joypad),
            _ => None,
        }
    }
}

/// What to do when the CPU executes one of the eleven undefined opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UndefinedPolicy {
    /// Log and continue as if it were a NOP.
    #[default]
    Nop,
    /// Log and pause for inspection.
    Break,
}

/// Host listener for a serviced interrupt, invoked at the instruction
/// boundary right after the CPU dispatched to the vector.
pub type InterruptListener = fn(&mut GameBoy, Interrupt);

pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
    cgb: bool,
    breakpoints: BreakpointEngine,
    listeners: [Option<InterruptListener>; 5],
    undefined_policy: UndefinedPolicy,
}

impl GameBoy {
    pub fn new() -> Self {
        Self::new_with_mode(false)
    }

    /// Empty machine in post-boot state; load a cartridge before stepping.
    pub fn new_with_mode(cgb: bool) -> Self {
        Self {
            cpu: Cpu::new_with_mode(cgb),
            mmu: Mmu::new_with_mode(cgb),
            cgb,
            breakpoints: BreakpointEngine::new(),
            listeners: [None; 5],
            undefined_policy: UndefinedPolicy::default(),
        }
    }

    /// Machine built from a ROM image, selecting CGB mode from the header.
    /// Header problems degrade rather than fail; see
    /// [`Cartridge::degradations`].
    pub fn from_rom(rom: Vec<u8>) -> Self {
        let cart = Cartridge::load(rom);
        let mut gb = Self::new_with_mode(cart.cgb);
        gb.mmu.load_cart(cart);
        gb
    }

    /// Machine at true power-on with a boot ROM mapped over the low
    /// addresses; execution starts at 0x0000 inside the boot ROM.
    pub fn from_rom_with_boot(rom: Vec<u8>, boot_rom: Vec<u8>) -> Self {
        let cart = Cartridge::load(rom);
        let mut gb = Self::new_with_mode(cart.cgb);
        gb.cpu = Cpu::new_power_on(gb.cgb);
        gb.mmu.load_cart(cart);
        gb.mmu.load_boot_rom(boot_rom);
        gb
    }

    pub fn is_cgb(&self) -> bool {
        self.cgb
    }

    /// Current T-cycle time.
    pub fn now(&self) -> u64 {
        self.cpu.cycles
    }

    /// Reset to the initial post-boot state, preserving the loaded
    /// cartridge and boot ROM.
    pub fn reset(&mut self) {
        let cart = self.mmu.cart.take();
        let boot = self.mmu.boot_rom.take();
        self.cpu = Cpu::new_with_mode(self.cgb);
        self.mmu = Mmu::new_with_mode(self.cgb);
        if let Some(cart) = cart {
            self.mmu.load_cart(cart);
        }
        if let Some(boot) = boot {
            self.mmu.load_boot_rom(boot);
        }
    }

    /// Execute one CPU step (instruction, interrupt dispatch, or idle
    /// halt/stop cycle), delivering breakpoint and interrupt callbacks.
    pub fn step(&mut self) {
        if !self.breakpoints.is_empty() {
            self.breakpoints.note_step();
            let pc = self.cpu.pc;
            if let Some(mut callback) = self.breakpoints.take(pc) {
                let opcode = self.mmu.read8(pc);
                callback(self, opcode);
                self.breakpoints.put_back(pc, callback);
            }
        }

        self.cpu.step(&mut self.mmu);

        if self.cpu.take_undefined() && self.undefined_policy == UndefinedPolicy::Break {
            self.breakpoints.break_now();
        }

        if let Some(bit) = self.cpu.take_dispatched() {
            if let (Some(interrupt), Some(listener)) =
                (Interrupt::from_bit(bit), self.listeners[bit as usize])
            {
                listener(self, interrupt);
            }
        }
    }

    /// Run until the PPU completes a frame (or a breakpoint fires) and
    /// return the framebuffer. With the LCD disabled, a frame's worth of
    /// cycles is simulated instead.
    pub fn simulate_one_frame(&mut self) -> &[u32] {
        const FRAME_CYCLES: u64 = 70224;
        self.mmu.ppu.clear_frame_flag();
        let start = self.cpu.cycles;
        while !self.mmu.ppu.frame_ready() && !self.is_breaking() {
            self.step();
            if !self.mmu.ppu.lcd_enabled() && self.cpu.cycles.wrapping_sub(start) >= FRAME_CYCLES
            {
                break;
            }
        }
        self.mmu.ppu.clear_frame_flag();
        &self.mmu.ppu.framebuffer()[..]
    }

    /// Atomic joypad update; raises JOYPAD on a press of a selected row.
    /// Apply between frames from the host input queue.
    pub fn set_inputs(&mut self, mask: u8) {
        self.mmu.set_inputs(mask);
    }

    pub fn set_undefined_policy(&mut self, policy: UndefinedPolicy) {
        self.undefined_policy = policy;
    }

    pub fn set_interrupt_handler(&mut self, interrupt: Interrupt, listener: InterruptListener) {
        self.listeners[interrupt.bit() as usize] = Some(listener);
    }

    pub fn clear_interrupt_handler(&mut self, interrupt: Interrupt) {
        self.listeners[interrupt.bit() as usize] = None;
    }

    pub fn set_pixel_mode(&mut self, mode: PixelMode) {
        self.mmu.ppu.set_pixel_mode(mode);
    }

    /// Register the CGB palette-change hook (see [`crate::ppu::Ppu::on_palchange`]).
    pub fn on_palchange(&mut self, hook: PaletteHook) {
        self.mmu.ppu.on_palchange(hook);
    }

    pub fn set_apu_hook(&mut self, hook: ApuHook) {
        self.mmu.set_apu_hook(hook);
    }

    pub fn set_link_port(&mut self, port: Box<dyn LinkPort + Send>) {
        self.mmu.serial.set_link_port(port);
    }

    /// Drain serial output captured since the last call.
    pub fn take_serial(&mut self) -> Vec<u8> {
        self.mmu.take_serial()
    }

    // ---------------------------------------------------------------------
    // Debugging

    /// Register a callback fired whenever PC reaches `addr`, before the
    /// instruction there executes.
    pub fn breakpoint(&mut self, addr: u16, callback: BreakpointCallback) {
        self.breakpoints.install(addr, callback);
    }

    /// Install a print-and-pause breakpoint.
    pub fn default_pausepoint(&mut self, addr: u16) {
        self.breakpoint(
            addr,
            Box::new(|gb, opcode| {
                let pc = gb.cpu.pc;
                let bytes = [
                    opcode,
                    gb.mmu.read8(pc.wrapping_add(1)),
                    gb.mmu.read8(pc.wrapping_add(2)),
                ];
                let (text, _) = opcodes::disassemble(&bytes);
                info!("pause at {:04X}: {}  {}", pc, text, gb.cpu.debug_state());
                gb.break_now();
            }),
        );
    }

    pub fn remove_breakpoint(&mut self, addr: u16) -> bool {
        self.breakpoints.remove(addr)
    }

    /// Disassemble `count` instructions starting at `addr`, reading through
    /// the current memory map. Tracing aid; reads have no side effects.
    pub fn disassemble_at(&self, addr: u16, count: usize) -> Vec<(u16, String)> {
        let mut out = Vec::with_capacity(count);
        let mut pc = addr;
        for _ in 0..count {
            let bytes = [
                self.mmu.read8(pc),
                self.mmu.read8(pc.wrapping_add(1)),
                self.mmu.read8(pc.wrapping_add(2)),
            ];
            let (text, len) = opcodes::disassemble(&bytes);
            out.push((pc, text));
            pc = pc.wrapping_add(len as u16);
        }
        out
    }

    /// Force a break after `steps` further instructions.
    pub fn break_on_steps(&mut self, steps: u32) {
        self.breakpoints.break_on_steps(steps);
    }

    /// Cooperative cancellation: the frame loop stops at the next
    /// instruction boundary.
    pub fn break_now(&mut self) {
        self.breakpoints.break_now();
    }

    pub fn clear_break(&mut self) {
        self.breakpoints.clear_break();
    }

    pub fn is_breaking(&self) -> bool {
        self.breakpoints.is_breaking()
    }

    // ---------------------------------------------------------------------
    // Snapshots

    /// Append a snapshot of the entire observable machine state to `out`.
    /// Call only between `simulate_one_frame` calls.
    pub fn serialize_state(&self, out: &mut Vec<u8>) {
        snapshot::save(self, out);
    }

    /// Restore a snapshot previously produced by `serialize_state` on a
    /// machine with the same ROM. Returns the number of bytes consumed so
    /// callers can append their own trailing state. On error the machine is
    /// left untouched.
    pub fn restore_state(&mut self, data: &[u8]) -> Result<usize, SnapshotError> {
        snapshot::restore(self, data)
    }
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new()
    }
}
