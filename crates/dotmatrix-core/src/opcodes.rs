//! Dense opcode tables for the LR35902.
//!
//! Dispatch is a plain 256-entry array lookup (plus a second table behind
//! the $CB prefix). Each entry carries the mnemonic for tracing, the number
//! of immediate operand bytes, and a semantic handler. A handler runs with
//! PC already past the opcode; it consumes immediates through the CPU's
//! ticking fetch helpers, performs its ticking memory traffic, and returns
//! the total T-cycle cost of the instruction including the opcode fetch.

use log::warn;

use crate::cpu::{Cpu, FLAG_C, FLAG_H, FLAG_N, FLAG_Z};
use crate::mmu::Mmu;

pub type Handler = fn(&mut Cpu, &mut Mmu, u8) -> u32;

pub struct Instruction {
    pub mnemonic: &'static str,
    /// Immediate operand bytes following the opcode (0, 1 or 2).
    pub operands: u8,
    pub handler: Handler,
}

macro_rules! op {
    ($mnemonic:expr, $operands:expr, $handler:expr) => {
        Instruction {
            mnemonic: $mnemonic,
            operands: $operands,
            handler: $handler,
        }
    };
}

// ---------------------------------------------------------------------------
// Shared decode helpers

/// 16-bit register pair from opcode bits 4-5, SP variant.
fn pair_sp(cpu: &Cpu, index: u8) -> u16 {
    match index & 0x03 {
        0 => cpu.bc(),
        1 => cpu.de(),
        2 => cpu.hl(),
        _ => cpu.sp,
    }
}

fn set_pair_sp(cpu: &mut Cpu, index: u8, val: u16) {
    match index & 0x03 {
        0 => cpu.set_bc(val),
        1 => cpu.set_de(val),
        2 => cpu.set_hl(val),
        _ => cpu.sp = val,
    }
}

/// Branch condition from opcode bits 3-4: NZ, Z, NC, C.
fn condition(cpu: &Cpu, index: u8) -> bool {
    match index & 0x03 {
        0 => cpu.f & FLAG_Z == 0,
        1 => cpu.f & FLAG_Z != 0,
        2 => cpu.f & FLAG_C == 0,
        _ => cpu.f & FLAG_C != 0,
    }
}

/// Extra memory cycles when a register index denotes (HL).
fn mem_cost(index: u8) -> u32 {
    if index == 6 {
        4
    } else {
        0
    }
}

// ---------------------------------------------------------------------------
// Misc / control

fn nop(_cpu: &mut Cpu, _mmu: &mut Mmu, _opcode: u8) -> u32 {
    4
}

fn undefined(cpu: &mut Cpu, _mmu: &mut Mmu, opcode: u8) -> u32 {
    warn!(
        "undefined opcode {:02X} at {:04X}",
        opcode,
        cpu.pc.wrapping_sub(1)
    );
    cpu.note_undefined();
    4
}

fn halt(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let pending = mmu.ie_reg & mmu.if_reg & 0x1F;
    if cpu.ime || pending == 0 {
        cpu.halted = true;
    } else {
        // IME clear with an interrupt already pending: the CPU fails to
        // halt and the following opcode byte is fetched twice.
        cpu.halt_bug = true;
    }
    4
}

fn stop(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let _skipped = cpu.fetch8(mmu);
    mmu.reset_div();
    if mmu.is_cgb() && mmu.key1 & 0x01 != 0 {
        cpu.speed_switch(mmu);
        8 + 128
    } else {
        cpu.stopped = true;
        8
    }
}

fn di(cpu: &mut Cpu, _mmu: &mut Mmu, _opcode: u8) -> u32 {
    cpu.ime = false;
    cpu.ime_pending = 0;
    4
}

fn ei(cpu: &mut Cpu, _mmu: &mut Mmu, _opcode: u8) -> u32 {
    cpu.ime_pending = 2;
    4
}

fn scf(cpu: &mut Cpu, _mmu: &mut Mmu, _opcode: u8) -> u32 {
    cpu.f = (cpu.f & FLAG_Z) | FLAG_C;
    4
}

fn ccf(cpu: &mut Cpu, _mmu: &mut Mmu, _opcode: u8) -> u32 {
    cpu.f = (cpu.f & FLAG_Z) | ((cpu.f ^ FLAG_C) & FLAG_C);
    4
}

fn cpl(cpu: &mut Cpu, _mmu: &mut Mmu, _opcode: u8) -> u32 {
    cpu.a = !cpu.a;
    cpu.f |= FLAG_N | FLAG_H;
    4
}

fn daa(cpu: &mut Cpu, _mmu: &mut Mmu, _opcode: u8) -> u32 {
    let mut adjust = 0u8;
    if cpu.f & FLAG_H != 0 {
        adjust |= 0x06;
    }
    if cpu.f & FLAG_C != 0 {
        adjust |= 0x60;
    }
    if cpu.f & FLAG_N == 0 {
        if cpu.a & 0x0F > 0x09 {
            adjust |= 0x06;
        }
        if cpu.a > 0x99 {
            adjust |= 0x60;
        }
        cpu.a = cpu.a.wrapping_add(adjust);
    } else {
        cpu.a = cpu.a.wrapping_sub(adjust);
    }
    cpu.f = (cpu.f & FLAG_N)
        | if cpu.a == 0 { FLAG_Z } else { 0 }
        | if adjust & 0x60 != 0 { FLAG_C } else { 0 };
    4
}

// ---------------------------------------------------------------------------
// 8-bit loads

fn ld_r_r(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    let src = opcode & 0x07;
    let dst = (opcode >> 3) & 0x07;
    let val = cpu.read_reg(mmu, src);
    cpu.write_reg(mmu, dst, val);
    4 + mem_cost(src) + mem_cost(dst)
}

fn ld_r_d8(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    let dst = (opcode >> 3) & 0x07;
    let val = cpu.fetch8(mmu);
    cpu.write_reg(mmu, dst, val);
    8 + mem_cost(dst)
}

fn ld_at_bc_a(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let addr = cpu.bc();
    cpu.write8(mmu, addr, cpu.a);
    8
}

fn ld_at_de_a(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let addr = cpu.de();
    cpu.write8(mmu, addr, cpu.a);
    8
}

fn ld_a_at_bc(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let addr = cpu.bc();
    cpu.a = cpu.read8(mmu, addr);
    8
}

fn ld_a_at_de(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let addr = cpu.de();
    cpu.a = cpu.read8(mmu, addr);
    8
}

fn ld_at_hli_a(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let addr = cpu.hl();
    cpu.write8(mmu, addr, cpu.a);
    cpu.set_hl(addr.wrapping_add(1));
    8
}

fn ld_at_hld_a(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let addr = cpu.hl();
    cpu.write8(mmu, addr, cpu.a);
    cpu.set_hl(addr.wrapping_sub(1));
    8
}

fn ld_a_at_hli(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let addr = cpu.hl();
    cpu.a = cpu.read8(mmu, addr);
    cpu.set_hl(addr.wrapping_add(1));
    8
}

fn ld_a_at_hld(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let addr = cpu.hl();
    cpu.a = cpu.read8(mmu, addr);
    cpu.set_hl(addr.wrapping_sub(1));
    8
}

fn ldh_a8_a(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let offset = cpu.fetch8(mmu);
    cpu.write8(mmu, 0xFF00 | offset as u16, cpu.a);
    12
}

fn ldh_a_a8(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let offset = cpu.fetch8(mmu);
    cpu.a = cpu.read8(mmu, 0xFF00 | offset as u16);
    12
}

fn ldh_c_a(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let addr = 0xFF00 | cpu.c as u16;
    cpu.write8(mmu, addr, cpu.a);
    8
}

fn ldh_a_c(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let addr = 0xFF00 | cpu.c as u16;
    cpu.a = cpu.read8(mmu, addr);
    8
}

fn ld_a16_a(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let addr = cpu.fetch16(mmu);
    cpu.write8(mmu, addr, cpu.a);
    16
}

fn ld_a_a16(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let addr = cpu.fetch16(mmu);
    cpu.a = cpu.read8(mmu, addr);
    16
}

// ---------------------------------------------------------------------------
// 16-bit loads and stack

fn ld_rr_d16(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    let val = cpu.fetch16(mmu);
    set_pair_sp(cpu, opcode >> 4, val);
    12
}

fn ld_a16_sp(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let addr = cpu.fetch16(mmu);
    cpu.write8(mmu, addr, cpu.sp as u8);
    cpu.write8(mmu, addr.wrapping_add(1), (cpu.sp >> 8) as u8);
    20
}

fn ld_sp_hl(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    cpu.sp = cpu.hl();
    cpu.tick(mmu, 1);
    8
}

fn ld_hl_sp_r8(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let offset = cpu.fetch8(mmu) as i8 as i16 as u16;
    let sp = cpu.sp;
    cpu.f = if (sp & 0x0F) + (offset & 0x0F) > 0x0F {
        FLAG_H
    } else {
        0
    } | if (sp & 0xFF) + (offset & 0xFF) > 0xFF {
        FLAG_C
    } else {
        0
    };
    cpu.set_hl(sp.wrapping_add(offset));
    cpu.tick(mmu, 1);
    12
}

fn add_sp_r8(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let offset = cpu.fetch8(mmu) as i8 as i16 as u16;
    let sp = cpu.sp;
    cpu.f = if (sp & 0x0F) + (offset & 0x0F) > 0x0F {
        FLAG_H
    } else {
        0
    } | if (sp & 0xFF) + (offset & 0xFF) > 0xFF {
        FLAG_C
    } else {
        0
    };
    cpu.sp = sp.wrapping_add(offset);
    cpu.tick(mmu, 2);
    16
}

fn push_rr(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    let val = match (opcode >> 4) & 0x03 {
        0 => cpu.bc(),
        1 => cpu.de(),
        2 => cpu.hl(),
        _ => cpu.af(),
    };
    cpu.tick(mmu, 1);
    cpu.push_stack(mmu, val);
    16
}

fn pop_rr(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    let val = cpu.pop_stack(mmu);
    match (opcode >> 4) & 0x03 {
        0 => cpu.set_bc(val),
        1 => cpu.set_de(val),
        2 => cpu.set_hl(val),
        _ => cpu.set_af(val),
    }
    12
}

// ---------------------------------------------------------------------------
// 8-bit arithmetic

/// The eight accumulator operations, selected by opcode bits 3-5:
/// ADD, ADC, SUB, SBC, AND, XOR, OR, CP.
fn alu(cpu: &mut Cpu, which: u8, val: u8) {
    match which {
        0 => {
            let (res, carry) = cpu.a.overflowing_add(val);
            cpu.f = if res == 0 { FLAG_Z } else { 0 }
                | if (cpu.a & 0x0F) + (val & 0x0F) > 0x0F {
                    FLAG_H
                } else {
                    0
                }
                | if carry { FLAG_C } else { 0 };
            cpu.a = res;
        }
        1 => {
            let carry_in = (cpu.f & FLAG_C != 0) as u8;
            let res = cpu.a.wrapping_add(val).wrapping_add(carry_in);
            cpu.f = if res == 0 { FLAG_Z } else { 0 }
                | if (cpu.a & 0x0F) + (val & 0x0F) + carry_in > 0x0F {
                    FLAG_H
                } else {
                    0
                }
                | if (cpu.a as u16) + (val as u16) + (carry_in as u16) > 0xFF {
                    FLAG_C
                } else {
                    0
                };
            cpu.a = res;
        }
        2 => {
            let res = cpu.a.wrapping_sub(val);
            cpu.f = FLAG_N
                | if res == 0 { FLAG_Z } else { 0 }
                | if cpu.a & 0x0F < val & 0x0F { FLAG_H } else { 0 }
                | if cpu.a < val { FLAG_C } else { 0 };
            cpu.a = res;
        }
        3 => {
            let carry_in = (cpu.f & FLAG_C != 0) as u8;
            let res = cpu.a.wrapping_sub(val).wrapping_sub(carry_in);
            cpu.f = FLAG_N
                | if res == 0 { FLAG_Z } else { 0 }
                | if (cpu.a & 0x0F) < (val & 0x0F) + carry_in {
                    FLAG_H
                } else {
                    0
                }
                | if (cpu.a as u16) < (val as u16) + (carry_in as u16) {
                    FLAG_C
                } else {
                    0
                };
            cpu.a = res;
        }
        4 => {
            cpu.a &= val;
            cpu.f = if cpu.a == 0 { FLAG_Z } else { 0 } | FLAG_H;
        }
        5 => {
            cpu.a ^= val;
            cpu.f = if cpu.a == 0 { FLAG_Z } else { 0 };
        }
        6 => {
            cpu.a |= val;
            cpu.f = if cpu.a == 0 { FLAG_Z } else { 0 };
        }
        _ => {
            let res = cpu.a.wrapping_sub(val);
            cpu.f = FLAG_N
                | if res == 0 { FLAG_Z } else { 0 }
                | if cpu.a & 0x0F < val & 0x0F { FLAG_H } else { 0 }
                | if cpu.a < val { FLAG_C } else { 0 };
        }
    }
}

fn alu_a_r(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    let src = opcode & 0x07;
    let val = cpu.read_reg(mmu, src);
    alu(cpu, (opcode >> 3) & 0x07, val);
    4 + mem_cost(src)
}

fn alu_a_d8(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    let val = cpu.fetch8(mmu);
    alu(cpu, (opcode >> 3) & 0x07, val);
    8
}

fn inc_r(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    let index = (opcode >> 3) & 0x07;
    let val = cpu.read_reg(mmu, index);
    let res = val.wrapping_add(1);
    cpu.f = (cpu.f & FLAG_C)
        | if res == 0 { FLAG_Z } else { 0 }
        | if val & 0x0F == 0x0F { FLAG_H } else { 0 };
    cpu.write_reg(mmu, index, res);
    4 + 2 * mem_cost(index)
}

fn dec_r(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    let index = (opcode >> 3) & 0x07;
    let val = cpu.read_reg(mmu, index);
    let res = val.wrapping_sub(1);
    cpu.f = (cpu.f & FLAG_C)
        | FLAG_N
        | if res == 0 { FLAG_Z } else { 0 }
        | if val & 0x0F == 0 { FLAG_H } else { 0 };
    cpu.write_reg(mmu, index, res);
    4 + 2 * mem_cost(index)
}

// ---------------------------------------------------------------------------
// 16-bit arithmetic

fn inc_rr(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    let index = opcode >> 4;
    let val = pair_sp(cpu, index).wrapping_add(1);
    set_pair_sp(cpu, index, val);
    cpu.tick(mmu, 1);
    8
}

fn dec_rr(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    let index = opcode >> 4;
    let val = pair_sp(cpu, index).wrapping_sub(1);
    set_pair_sp(cpu, index, val);
    cpu.tick(mmu, 1);
    8
}

fn add_hl_rr(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    let hl = cpu.hl();
    let val = pair_sp(cpu, opcode >> 4);
    let res = hl.wrapping_add(val);
    cpu.f = (cpu.f & FLAG_Z)
        | if (hl & 0x0FFF) + (val & 0x0FFF) > 0x0FFF {
            FLAG_H
        } else {
            0
        }
        | if (hl as u32) + (val as u32) > 0xFFFF {
            FLAG_C
        } else {
            0
        };
    cpu.set_hl(res);
    cpu.tick(mmu, 1);
    8
}

// ---------------------------------------------------------------------------
// Accumulator rotates

fn rlca(cpu: &mut Cpu, _mmu: &mut Mmu, _opcode: u8) -> u32 {
    let carry = cpu.a & 0x80 != 0;
    cpu.a = cpu.a.rotate_left(1);
    cpu.f = if carry { FLAG_C } else { 0 };
    4
}

fn rrca(cpu: &mut Cpu, _mmu: &mut Mmu, _opcode: u8) -> u32 {
    let carry = cpu.a & 0x01 != 0;
    cpu.a = cpu.a.rotate_right(1);
    cpu.f = if carry { FLAG_C } else { 0 };
    4
}

fn rla(cpu: &mut Cpu, _mmu: &mut Mmu, _opcode: u8) -> u32 {
    let carry_in = (cpu.f & FLAG_C != 0) as u8;
    let carry = cpu.a & 0x80 != 0;
    cpu.a = (cpu.a << 1) | carry_in;
    cpu.f = if carry { FLAG_C } else { 0 };
    4
}

fn rra(cpu: &mut Cpu, _mmu: &mut Mmu, _opcode: u8) -> u32 {
    let carry_in = (cpu.f & FLAG_C != 0) as u8;
    let carry = cpu.a & 0x01 != 0;
    cpu.a = (cpu.a >> 1) | (carry_in << 7);
    cpu.f = if carry { FLAG_C } else { 0 };
    4
}

// ---------------------------------------------------------------------------
// Jumps and calls

fn jr_r8(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let offset = cpu.fetch8(mmu) as i8;
    cpu.pc = cpu.pc.wrapping_add(offset as u16);
    cpu.tick(mmu, 1);
    12
}

fn jr_cc_r8(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    let offset = cpu.fetch8(mmu) as i8;
    if condition(cpu, opcode >> 3) {
        cpu.pc = cpu.pc.wrapping_add(offset as u16);
        cpu.tick(mmu, 1);
        12
    } else {
        8
    }
}

fn jp_a16(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let addr = cpu.fetch16(mmu);
    cpu.pc = addr;
    cpu.tick(mmu, 1);
    16
}

fn jp_cc_a16(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    let addr = cpu.fetch16(mmu);
    if condition(cpu, opcode >> 3) {
        cpu.pc = addr;
        cpu.tick(mmu, 1);
        16
    } else {
        12
    }
}

fn jp_hl(cpu: &mut Cpu, _mmu: &mut Mmu, _opcode: u8) -> u32 {
    cpu.pc = cpu.hl();
    4
}

fn call_a16(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let addr = cpu.fetch16(mmu);
    cpu.tick(mmu, 1);
    cpu.push_stack(mmu, cpu.pc);
    cpu.pc = addr;
    24
}

fn call_cc_a16(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    let addr = cpu.fetch16(mmu);
    if condition(cpu, opcode >> 3) {
        cpu.tick(mmu, 1);
        cpu.push_stack(mmu, cpu.pc);
        cpu.pc = addr;
        24
    } else {
        12
    }
}

fn ret(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    cpu.pc = cpu.pop_stack(mmu);
    cpu.tick(mmu, 1);
    16
}

fn ret_cc(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    cpu.tick(mmu, 1);
    if condition(cpu, opcode >> 3) {
        cpu.pc = cpu.pop_stack(mmu);
        cpu.tick(mmu, 1);
        20
    } else {
        8
    }
}

fn reti(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    cpu.pc = cpu.pop_stack(mmu);
    cpu.tick(mmu, 1);
    // Unlike EI there is no enable delay.
    cpu.ime = true;
    16
}

fn rst(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    cpu.tick(mmu, 1);
    cpu.push_stack(mmu, cpu.pc);
    cpu.pc = (opcode & 0x38) as u16;
    16
}

// ---------------------------------------------------------------------------
// CB prefix

fn prefix_cb(cpu: &mut Cpu, mmu: &mut Mmu, _opcode: u8) -> u32 {
    let cb = cpu.fetch8(mmu);
    let instr = &EXTENDED[cb as usize];
    (instr.handler)(cpu, mmu, cb)
}

/// The eight rotate/shift operations of rows $00-$3F, selected by opcode
/// bits 3-5: RLC, RRC, RL, RR, SLA, SRA, SWAP, SRL.
fn cb_rotate(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    let index = opcode & 0x07;
    let val = cpu.read_reg(mmu, index);
    let carry_in = (cpu.f & FLAG_C != 0) as u8;
    let (res, carry) = match (opcode >> 3) & 0x07 {
        0 => (val.rotate_left(1), val & 0x80 != 0),
        1 => (val.rotate_right(1), val & 0x01 != 0),
        2 => ((val << 1) | carry_in, val & 0x80 != 0),
        3 => ((val >> 1) | (carry_in << 7), val & 0x01 != 0),
        4 => (val << 1, val & 0x80 != 0),
        5 => ((val >> 1) | (val & 0x80), val & 0x01 != 0),
        6 => (val.rotate_left(4), false),
        _ => (val >> 1, val & 0x01 != 0),
    };
    cpu.write_reg(mmu, index, res);
    cpu.f = if res == 0 { FLAG_Z } else { 0 } | if carry { FLAG_C } else { 0 };
    8 + 2 * mem_cost(index)
}

fn cb_bit(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    let index = opcode & 0x07;
    let bit = (opcode >> 3) & 0x07;
    let val = cpu.read_reg(mmu, index);
    cpu.f = (cpu.f & FLAG_C)
        | FLAG_H
        | if val & (1 << bit) == 0 { FLAG_Z } else { 0 };
    8 + mem_cost(index)
}

fn cb_res(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    let index = opcode & 0x07;
    let bit = (opcode >> 3) & 0x07;
    let val = cpu.read_reg(mmu, index) & !(1 << bit);
    cpu.write_reg(mmu, index, val);
    8 + 2 * mem_cost(index)
}

fn cb_set(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) -> u32 {
    let index = opcode & 0x07;
    let bit = (opcode >> 3) & 0x07;
    let val = cpu.read_reg(mmu, index) | (1 << bit);
    cpu.write_reg(mmu, index, val);
    8 + 2 * mem_cost(index)
}

// ---------------------------------------------------------------------------
// Tables

pub static PRIMARY: [Instruction; 256] = [
    op!("NOP", 0, nop),
    op!("LD BC,d16", 2, ld_rr_d16),
    op!("LD (BC),A", 0, ld_at_bc_a),
    op!("INC BC", 0, inc_rr),
    op!("INC B", 0, inc_r),
    op!("DEC B", 0, dec_r),
    op!("LD B,d8", 1, ld_r_d8),
    op!("RLCA", 0, rlca),
    op!("LD (a16),SP", 2, ld_a16_sp),
    op!("ADD HL,BC", 0, add_hl_rr),
    op!("LD A,(BC)", 0, ld_a_at_bc),
    op!("DEC BC", 0, dec_rr),
    op!("INC C", 0, inc_r),
    op!("DEC C", 0, dec_r),
    op!("LD C,d8", 1, ld_r_d8),
    op!("RRCA", 0, rrca),
    op!("STOP", 1, stop),
    op!("LD DE,d16", 2, ld_rr_d16),
    op!("LD (DE),A", 0, ld_at_de_a),
    op!("INC DE", 0, inc_rr),
    op!("INC D", 0, inc_r),
    op!("DEC D", 0, dec_r),
    op!("LD D,d8", 1, ld_r_d8),
    op!("RLA", 0, rla),
    op!("JR r8", 1, jr_r8),
    op!("ADD HL,DE", 0, add_hl_rr),
    op!("LD A,(DE)", 0, ld_a_at_de),
    op!("DEC DE", 0, dec_rr),
    op!("INC E", 0, inc_r),
    op!("DEC E", 0, dec_r),
    op!("LD E,d8", 1, ld_r_d8),
    op!("RRA", 0, rra),
    op!("JR NZ,r8", 1, jr_cc_r8),
    op!("LD HL,d16", 2, ld_rr_d16),
    op!("LD (HL+),A", 0, ld_at_hli_a),
    op!("INC HL", 0, inc_rr),
    op!("INC H", 0, inc_r),
    op!("DEC H", 0, dec_r),
    op!("LD H,d8", 1, ld_r_d8),
    op!("DAA", 0, daa),
    op!("JR Z,r8", 1, jr_cc_r8),
    op!("ADD HL,HL", 0, add_hl_rr),
    op!("LD A,(HL+)", 0, ld_a_at_hli),
    op!("DEC HL", 0, dec_rr),
    op!("INC L", 0, inc_r),
    op!("DEC L", 0, dec_r),
    op!("LD L,d8", 1, ld_r_d8),
    op!("CPL", 0, cpl),
    op!("JR NC,r8", 1, jr_cc_r8),
    op!("LD SP,d16", 2, ld_rr_d16),
    op!("LD (HL-),A", 0, ld_at_hld_a),
    op!("INC SP", 0, inc_rr),
    op!("INC (HL)", 0, inc_r),
    op!("DEC (HL)", 0, dec_r),
    op!("LD (HL),d8", 1, ld_r_d8),
    op!("SCF", 0, scf),
    op!("JR C,r8", 1, jr_cc_r8),
    op!("ADD HL,SP", 0, add_hl_rr),
    op!("LD A,(HL-)", 0, ld_a_at_hld),
    op!("DEC SP", 0, dec_rr),
    op!("INC A", 0, inc_r),
    op!("DEC A", 0, dec_r),
    op!("LD A,d8", 1, ld_r_d8),
    op!("CCF", 0, ccf),
    op!("LD B,B", 0, ld_r_r),
    op!("LD B,C", 0, ld_r_r),
    op!("LD B,D", 0, ld_r_r),
    op!("LD B,E", 0, ld_r_r),
    op!("LD B,H", 0, ld_r_r),
    op!("LD B,L", 0, ld_r_r),
    op!("LD B,(HL)", 0, ld_r_r),
    op!("LD B,A", 0, ld_r_r),
    op!("LD C,B", 0, ld_r_r),
    op!("LD C,C", 0, ld_r_r),
    op!("LD C,D", 0, ld_r_r),
    op!("LD C,E", 0, ld_r_r),
    op!("LD C,H", 0, ld_r_r),
    op!("LD C,L", 0, ld_r_r),
    op!("LD C,(HL)", 0, ld_r_r),
    op!("LD C,A", 0, ld_r_r),
    op!("LD D,B", 0, ld_r_r),
    op!("LD D,C", 0, ld_r_r),
    op!("LD D,D", 0, ld_r_r),
    op!("LD D,E", 0, ld_r_r),
    op!("LD D,H", 0, ld_r_r),
    op!("LD D,L", 0, ld_r_r),
    op!("LD D,(HL)", 0, ld_r_r),
    op!("LD D,A", 0, ld_r_r),
    op!("LD E,B", 0, ld_r_r),
    op!("LD E,C", 0, ld_r_r),
    op!("LD E,D", 0, ld_r_r),
    op!("LD E,E", 0, ld_r_r),
    op!("LD E,H", 0, ld_r_r),
    op!("LD E,L", 0, ld_r_r),
    op!("LD E,(HL)", 0, ld_r_r),
    op!("LD E,A", 0, ld_r_r),
    op!("LD H,B", 0, ld_r_r),
    op!("LD H,C", 0, ld_r_r),
    op!("LD H,D", 0, ld_r_r),
    op!("LD H,E", 0, ld_r_r),
    op!("LD H,H", 0, ld_r_r),
    op!("LD H,L", 0, ld_r_r),
    op!("LD H,(HL)", 0, ld_r_r),
    op!("LD H,A", 0, ld_r_r),
    op!("LD L,B", 0, ld_r_r),
    op!("LD L,C", 0, ld_r_r),
    op!("LD L,D", 0, ld_r_r),
    op!("LD L,E", 0, ld_r_r),
    op!("LD L,H", 0, ld_r_r),
    op!("LD L,L", 0, ld_r_r),
    op!("LD L,(HL)", 0, ld_r_r),
    op!("LD L,A", 0, ld_r_r),
    op!("LD (HL),B", 0, ld_r_r),
    op!("LD (HL),C", 0, ld_r_r),
    op!("LD (HL),D", 0, ld_r_r),
    op!("LD (HL),E", 0, ld_r_r),
    op!("LD (HL),H", 0, ld_r_r),
    op!("LD (HL),L", 0, ld_r_r),
    op!("HALT", 0, halt),
    op!("LD (HL),A", 0, ld_r_r),
    op!("LD A,B", 0, ld_r_r),
    op!("LD A,C", 0, ld_r_r),
    op!("LD A,D", 0, ld_r_r),
    op!("LD A,E", 0, ld_r_r),
    op!("LD A,H", 0, ld_r_r),
    op!("LD A,L", 0, ld_r_r),
    op!("LD A,(HL)", 0, ld_r_r),
    op!("LD A,A", 0, ld_r_r),
    op!("ADD A,B", 0, alu_a_r),
    op!("ADD A,C", 0, alu_a_r),
    op!("ADD A,D", 0, alu_a_r),
    op!("ADD A,E", 0, alu_a_r),
    op!("ADD A,H", 0, alu_a_r),
    op!("ADD A,L", 0, alu_a_r),
    op!("ADD A,(HL)", 0, alu_a_r),
    op!("ADD A,A", 0, alu_a_r),
    op!("ADC A,B", 0, alu_a_r),
    op!("ADC A,C", 0, alu_a_r),
    op!("ADC A,D", 0, alu_a_r),
    op!("ADC A,E", 0, alu_a_r),
    op!("ADC A,H", 0, alu_a_r),
    op!("ADC A,L", 0, alu_a_r),
    op!("ADC A,(HL)", 0, alu_a_r),
    op!("ADC A,A", 0, alu_a_r),
    op!("SUB B", 0, alu_a_r),
    op!("SUB C", 0, alu_a_r),
    op!("SUB D", 0, alu_a_r),
    op!("SUB E", 0, alu_a_r),
    op!("SUB H", 0, alu_a_r),
    op!("SUB L", 0, alu_a_r),
    op!("SUB (HL)", 0, alu_a_r),
    op!("SUB A", 0, alu_a_r),
    op!("SBC A,B", 0, alu_a_r),
    op!("SBC A,C", 0, alu_a_r),
    op!("SBC A,D", 0, alu_a_r),
    op!("SBC A,E", 0, alu_a_r),
    op!("SBC A,H", 0, alu_a_r),
    op!("SBC A,L", 0, alu_a_r),
    op!("SBC A,(HL)", 0, alu_a_r),
    op!("SBC A,A", 0, alu_a_r),
    op!("AND B", 0, alu_a_r),
    op!("AND C", 0, alu_a_r),
    op!("AND D", 0, alu_a_r),
    op!("AND E", 0, alu_a_r),
    op!("AND H", 0, alu_a_r),
    op!("AND L", 0, alu_a_r),
    op!("AND (HL)", 0, alu_a_r),
    op!("AND A", 0, alu_a_r),
    op!("XOR B", 0, alu_a_r),
    op!("XOR C", 0, alu_a_r),
    op!("XOR D", 0, alu_a_r),
    op!("XOR E", 0, alu_a_r),
    op!("XOR H", 0, alu_a_r),
    op!("XOR L", 0, alu_a_r),
    op!("XOR (HL)", 0, alu_a_r),
    op!("XOR A", 0, alu_a_r),
    op!("OR B", 0, alu_a_r),
    op!("OR C", 0, alu_a_r),
    op!("OR D", 0, alu_a_r),
    op!("OR E", 0, alu_a_r),
    op!("OR H", 0, alu_a_r),
    op!("OR L", 0, alu_a_r),
    op!("OR (HL)", 0, alu_a_r),
    op!("OR A", 0, alu_a_r),
    op!("CP B", 0, alu_a_r),
    op!("CP C", 0, alu_a_r),
    op!("CP D", 0, alu_a_r),
    op!("CP E", 0, alu_a_r),
    op!("CP H", 0, alu_a_r),
    op!("CP L", 0, alu_a_r),
    op!("CP (HL)", 0, alu_a_r),
    op!("CP A", 0, alu_a_r),
    op!("RET NZ", 0, ret_cc),
    op!("POP BC", 0, pop_rr),
    op!("JP NZ,a16", 2, jp_cc_a16),
    op!("JP a16", 2, jp_a16),
    op!("CALL NZ,a16", 2, call_cc_a16),
    op!("PUSH BC", 0, push_rr),
    op!("ADD A,d8", 1, alu_a_d8),
    op!("RST 00H", 0, rst),
    op!("RET Z", 0, ret_cc),
    op!("RET", 0, ret),
    op!("JP Z,a16", 2, jp_cc_a16),
    op!("PREFIX CB", 1, prefix_cb),
    op!("CALL Z,a16", 2, call_cc_a16),
    op!("CALL a16", 2, call_a16),
    op!("ADC A,d8", 1, alu_a_d8),
    op!("RST 08H", 0, rst),
    op!("RET NC", 0, ret_cc),
    op!("POP DE", 0, pop_rr),
    op!("JP NC,a16", 2, jp_cc_a16),
    op!("DB D3H", 0, undefined),
    op!("CALL NC,a16", 2, call_cc_a16),
    op!("PUSH DE", 0, push_rr),
    op!("SUB d8", 1, alu_a_d8),
    op!("RST 10H", 0, rst),
    op!("RET C", 0, ret_cc),
    op!("RETI", 0, reti),
    op!("JP C,a16", 2, jp_cc_a16),
    op!("DB DBH", 0, undefined),
    op!("CALL C,a16", 2, call_cc_a16),
    op!("DB DDH", 0, undefined),
    op!("SBC A,d8", 1, alu_a_d8),
    op!("RST 18H", 0, rst),
    op!("LDH (a8),A", 1, ldh_a8_a),
    op!("POP HL", 0, pop_rr),
    op!("LD (C),A", 0, ldh_c_a),
    op!("DB E3H", 0, undefined),
    op!("DB E4H", 0, undefined),
    op!("PUSH HL", 0, push_rr),
    op!("AND d8", 1, alu_a_d8),
    op!("RST 20H", 0, rst),
    op!("ADD SP,r8", 1, add_sp_r8),
    op!("JP (HL)", 0, jp_hl),
    op!("LD (a16),A", 2, ld_a16_a),
    op!("DB EBH", 0, undefined),
    op!("DB ECH", 0, undefined),
    op!("DB EDH", 0, undefined),
    op!("XOR d8", 1, alu_a_d8),
    op!("RST 28H", 0, rst),
    op!("LDH A,(a8)", 1, ldh_a_a8),
    op!("POP AF", 0, pop_rr),
    op!("LD A,(C)", 0, ldh_a_c),
    op!("DI", 0, di),
    op!("DB F4H", 0, undefined),
    op!("PUSH AF", 0, push_rr),
    op!("OR d8", 1, alu_a_d8),
    op!("RST 30H", 0, rst),
    op!("LD HL,SP+r8", 1, ld_hl_sp_r8),
    op!("LD SP,HL", 0, ld_sp_hl),
    op!("LD A,(a16)", 2, ld_a_a16),
    op!("EI", 0, ei),
    op!("DB FCH", 0, undefined),
    op!("DB FDH", 0, undefined),
    op!("CP d8", 1, alu_a_d8),
    op!("RST 38H", 0, rst),
];

pub static EXTENDED: [Instruction; 256] = [
    op!("RLC B", 0, cb_rotate),
    op!("RLC C", 0, cb_rotate),
    op!("RLC D", 0, cb_rotate),
    op!("RLC E", 0, cb_rotate),
    op!("RLC H", 0, cb_rotate),
    op!("RLC L", 0, cb_rotate),
    op!("RLC (HL)", 0, cb_rotate),
    op!("RLC A", 0, cb_rotate),
    op!("RRC B", 0, cb_rotate),
    op!("RRC C", 0, cb_rotate),
    op!("RRC D", 0, cb_rotate),
    op!("RRC E", 0, cb_rotate),
    op!("RRC H", 0, cb_rotate),
    op!("RRC L", 0, cb_rotate),
    op!("RRC (HL)", 0, cb_rotate),
    op!("RRC A", 0, cb_rotate),
    op!("RL B", 0, cb_rotate),
    op!("RL C", 0, cb_rotate),
    op!("RL D", 0, cb_rotate),
    op!("RL E", 0, cb_rotate),
    op!("RL H", 0, cb_rotate),
    op!("RL L", 0, cb_rotate),
    op!("RL (HL)", 0, cb_rotate),
    op!("RL A", 0, cb_rotate),
    op!("RR B", 0, cb_rotate),
    op!("RR C", 0, cb_rotate),
    op!("RR D", 0, cb_rotate),
    op!("RR E", 0, cb_rotate),
    op!("RR H", 0, cb_rotate),
    op!("RR L", 0, cb_rotate),
    op!("RR (HL)", 0, cb_rotate),
    op!("RR A", 0, cb_rotate),
    op!("SLA B", 0, cb_rotate),
    op!("SLA C", 0, cb_rotate),
    op!("SLA D", 0, cb_rotate),
    op!("SLA E", 0, cb_rotate),
    op!("SLA H", 0, cb_rotate),
    op!("SLA L", 0, cb_rotate),
    op!("SLA (HL)", 0, cb_rotate),
    op!("SLA A", 0, cb_rotate),
    op!("SRA B", 0, cb_rotate),
    op!("SRA C", 0, cb_rotate),
    op!("SRA D", 0, cb_rotate),
    op!("SRA E", 0, cb_rotate),
    op!("SRA H", 0, cb_rotate),
    op!("SRA L", 0, cb_rotate),
    op!("SRA (HL)", 0, cb_rotate),
    op!("SRA A", 0, cb_rotate),
    op!("SWAP B", 0, cb_rotate),
    op!("SWAP C", 0, cb_rotate),
    op!("SWAP D", 0, cb_rotate),
    op!("SWAP E", 0, cb_rotate),
    op!("SWAP H", 0, cb_rotate),
    op!("SWAP L", 0, cb_rotate),
    op!("SWAP (HL)", 0, cb_rotate),
    op!("SWAP A", 0, cb_rotate),
    op!("SRL B", 0, cb_rotate),
    op!("SRL C", 0, cb_rotate),
    op!("SRL D", 0, cb_rotate),
    op!("SRL E", 0, cb_rotate),
    op!("SRL H", 0, cb_rotate),
    op!("SRL L", 0, cb_rotate),
    op!("SRL (HL)", 0, cb_rotate),
    op!("SRL A", 0, cb_rotate),
    op!("BIT 0,B", 0, cb_bit),
    op!("BIT 0,C", 0, cb_bit),
    op!("BIT 0,D", 0, cb_bit),
    op!("BIT 0,E", 0, cb_bit),
    op!("BIT 0,H", 0, cb_bit),
    op!("BIT 0,L", 0, cb_bit),
    op!("BIT 0,(HL)", 0, cb_bit),
    op!("BIT 0,A", 0, cb_bit),
    op!("BIT 1,B", 0, cb_bit),
    op!("BIT 1,C", 0, cb_bit),
    op!("BIT 1,D", 0, cb_bit),
    op!("BIT 1,E", 0, cb_bit),
    op!("BIT 1,H", 0, cb_bit),
    op!("BIT 1,L", 0, cb_bit),
    op!("BIT 1,(HL)", 0, cb_bit),
    op!("BIT 1,A", 0, cb_bit),
    op!("BIT 2,B", 0, cb_bit),
    op!("BIT 2,C", 0, cb_bit),
    op!("BIT 2,D", 0, cb_bit),
    op!("BIT 2,E", 0, cb_bit),
    op!("BIT 2,H", 0, cb_bit),
    op!("BIT 2,L", 0, cb_bit),
    op!("BIT 2,(HL)", 0, cb_bit),
    op!("BIT 2,A", 0, cb_bit),
    op!("BIT 3,B", 0, cb_bit),
    op!("BIT 3,C", 0, cb_bit),
    op!("BIT 3,D", 0, cb_bit),
    op!("BIT 3,E", 0, cb_bit),
    op!("BIT 3,H", 0, cb_bit),
    op!("BIT 3,L", 0, cb_bit),
    op!("BIT 3,(HL)", 0, cb_bit),
    op!("BIT 3,A", 0, cb_bit),
    op!("BIT 4,B", 0, cb_bit),
    op!("BIT 4,C", 0, cb_bit),
    op!("BIT 4,D", 0, cb_bit),
    op!("BIT 4,E", 0, cb_bit),
    op!("BIT 4,H", 0, cb_bit),
    op!("BIT 4,L", 0, cb_bit),
    op!("BIT 4,(HL)", 0, cb_bit),
    op!("BIT 4,A", 0, cb_bit),
    op!("BIT 5,B", 0, cb_bit),
    op!("BIT 5,C", 0, cb_bit),
    op!("BIT 5,D", 0, cb_bit),
    op!("BIT 5,E", 0, cb_bit),
    op!("BIT 5,H", 0, cb_bit),
    op!("BIT 5,L", 0, cb_bit),
    op!("BIT 5,(HL)", 0, cb_bit),
    op!("BIT 5,A", 0, cb_bit),
    op!("BIT 6,B", 0, cb_bit),
    op!("BIT 6,C", 0, cb_bit),
    op!("BIT 6,D", 0, cb_bit),
    op!("BIT 6,E", 0, cb_bit),
    op!("BIT 6,H", 0, cb_bit),
    op!("BIT 6,L", 0, cb_bit),
    op!("BIT 6,(HL)", 0, cb_bit),
    op!("BIT 6,A", 0, cb_bit),
    op!("BIT 7,B", 0, cb_bit),
    op!("BIT 7,C", 0, cb_bit),
    op!("BIT 7,D", 0, cb_bit),
    op!("BIT 7,E", 0, cb_bit),
    op!("BIT 7,H", 0, cb_bit),
    op!("BIT 7,L", 0, cb_bit),
    op!("BIT 7,(HL)", 0, cb_bit),
    op!("BIT 7,A", 0, cb_bit),
    op!("RES 0,B", 0, cb_res),
    op!("RES 0,C", 0, cb_res),
    op!("RES 0,D", 0, cb_res),
    op!("RES 0,E", 0, cb_res),
    op!("RES 0,H", 0, cb_res),
    op!("RES 0,L", 0, cb_res),
    op!("RES 0,(HL)", 0, cb_res),
    op!("RES 0,A", 0, cb_res),
    op!("RES 1,B", 0, cb_res),
    op!("RES 1,C", 0, cb_res),
    op!("RES 1,D", 0, cb_res),
    op!("RES 1,E", 0, cb_res),
    op!("RES 1,H", 0, cb_res),
    op!("RES 1,L", 0, cb_res),
    op!("RES 1,(HL)", 0, cb_res),
    op!("RES 1,A", 0, cb_res),
    op!("RES 2,B", 0, cb_res),
    op!("RES 2,C", 0, cb_res),
    op!("RES 2,D", 0, cb_res),
    op!("RES 2,E", 0, cb_res),
    op!("RES 2,H", 0, cb_res),
    op!("RES 2,L", 0, cb_res),
    op!("RES 2,(HL)", 0, cb_res),
    op!("RES 2,A", 0, cb_res),
    op!("RES 3,B", 0, cb_res),
    op!("RES 3,C", 0, cb_res),
    op!("RES 3,D", 0, cb_res),
    op!("RES 3,E", 0, cb_res),
    op!("RES 3,H", 0, cb_res),
    op!("RES 3,L", 0, cb_res),
    op!("RES 3,(HL)", 0, cb_res),
    op!("RES 3,A", 0, cb_res),
    op!("RES 4,B", 0, cb_res),
    op!("RES 4,C", 0, cb_res),
    op!("RES 4,D", 0, cb_res),
    op!("RES 4,E", 0, cb_res),
    op!("RES 4,H", 0, cb_res),
    op!("RES 4,L", 0, cb_res),
    op!("RES 4,(HL)", 0, cb_res),
    op!("RES 4,A", 0, cb_res),
    op!("RES 5,B", 0, cb_res),
    op!("RES 5,C", 0, cb_res),
    op!("RES 5,D", 0, cb_res),
    op!("RES 5,E", 0, cb_res),
    op!("RES 5,H", 0, cb_res),
    op!("RES 5,L", 0, cb_res),
    op!("RES 5,(HL)", 0, cb_res),
    op!("RES 5,A", 0, cb_res),
    op!("RES 6,B", 0, cb_res),
    op!("RES 6,C", 0, cb_res),
    op!("RES 6,D", 0, cb_res),
    op!("RES 6,E", 0, cb_res),
    op!("RES 6,H", 0, cb_res),
    op!("RES 6,L", 0, cb_res),
    op!("RES 6,(HL)", 0, cb_res),
    op!("RES 6,A", 0, cb_res),
    op!("RES 7,B", 0, cb_res),
    op!("RES 7,C", 0, cb_res),
    op!("RES 7,D", 0, cb_res),
    op!("RES 7,E", 0, cb_res),
    op!("RES 7,H", 0, cb_res),
    op!("RES 7,L", 0, cb_res),
    op!("RES 7,(HL)", 0, cb_res),
    op!("RES 7,A", 0, cb_res),
    op!("SET 0,B", 0, cb_set),
    op!("SET 0,C", 0, cb_set),
    op!("SET 0,D", 0, cb_set),
    op!("SET 0,E", 0, cb_set),
    op!("SET 0,H", 0, cb_set),
    op!("SET 0,L", 0, cb_set),
    op!("SET 0,(HL)", 0, cb_set),
    op!("SET 0,A", 0, cb_set),
    op!("SET 1,B", 0, cb_set),
    op!("SET 1,C", 0, cb_set),
    op!("SET 1,D", 0, cb_set),
    op!("SET 1,E", 0, cb_set),
    op!("SET 1,H", 0, cb_set),
    op!("SET 1,L", 0, cb_set),
    op!("SET 1,(HL)", 0, cb_set),
    op!("SET 1,A", 0, cb_set),
    op!("SET 2,B", 0, cb_set),
    op!("SET 2,C", 0, cb_set),
    op!("SET 2,D", 0, cb_set),
    op!("SET 2,E", 0, cb_set),
    op!("SET 2,H", 0, cb_set),
    op!("SET 2,L", 0, cb_set),
    op!("SET 2,(HL)", 0, cb_set),
    op!("SET 2,A", 0, cb_set),
    op!("SET 3,B", 0, cb_set),
    op!("SET 3,C", 0, cb_set),
    op!("SET 3,D", 0, cb_set),
    op!("SET 3,E", 0, cb_set),
    op!("SET 3,H", 0, cb_set),
    op!("SET 3,L", 0, cb_set),
    op!("SET 3,(HL)", 0, cb_set),
    op!("SET 3,A", 0, cb_set),
    op!("SET 4,B", 0, cb_set),
    op!("SET 4,C", 0, cb_set),
    op!("SET 4,D", 0, cb_set),
    op!("SET 4,E", 0, cb_set),
    op!("SET 4,H", 0, cb_set),
    op!("SET 4,L", 0, cb_set),
    op!("SET 4,(HL)", 0, cb_set),
    op!("SET 4,A", 0, cb_set),
    op!("SET 5,B", 0, cb_set),
    op!("SET 5,C", 0, cb_set),
    op!("SET 5,D", 0, cb_set),
    op!("SET 5,E", 0, cb_set),
    op!("SET 5,H", 0, cb_set),
    op!("SET 5,L", 0, cb_set),
    op!("SET 5,(HL)", 0, cb_set),
    op!("SET 5,A", 0, cb_set),
    op!("SET 6,B", 0, cb_set),
    op!("SET 6,C", 0, cb_set),
    op!("SET 6,D", 0, cb_set),
    op!("SET 6,E", 0, cb_set),
    op!("SET 6,H", 0, cb_set),
    op!("SET 6,L", 0, cb_set),
    op!("SET 6,(HL)", 0, cb_set),
    op!("SET 6,A", 0, cb_set),
    op!("SET 7,B", 0, cb_set),
    op!("SET 7,C", 0, cb_set),
    op!("SET 7,D", 0, cb_set),
    op!("SET 7,E", 0, cb_set),
    op!("SET 7,H", 0, cb_set),
    op!("SET 7,L", 0, cb_set),
    op!("SET 7,(HL)", 0, cb_set),
    op!("SET 7,A", 0, cb_set),
];

/// Render the instruction starting at `bytes[0]` as text, substituting
/// immediate operands into the mnemonic. Returns the text and the encoded
/// length. Tracing aid; unknown bytes render as data.
pub fn disassemble(bytes: &[u8]) -> (String, usize) {
    if bytes.is_empty() {
        return (String::from("<eof>"), 0);
    }
    let opcode = bytes[0];
    if opcode == 0xCB {
        if bytes.len() < 2 {
            return (String::from("PREFIX CB <eof>"), 1);
        }
        return (EXTENDED[bytes[1] as usize].mnemonic.to_string(), 2);
    }
    let instr = &PRIMARY[opcode as usize];
    let len = 1 + instr.operands as usize;
    if bytes.len() < len {
        return (format!("{} <eof>", instr.mnemonic), bytes.len());
    }
    let text = match instr.operands {
        1 => {
            let value = bytes[1];
            let m = instr.mnemonic;
            if m.contains("r8") {
                m.replace("r8", &format!("{:+}", value as i8))
            } else if m.contains("a8") {
                m.replace("a8", &format!("FF{:02X}H", value))
            } else {
                m.replace("d8", &format!("{:02X}H", value))
            }
        }
        2 => {
            let value = u16::from_le_bytes([bytes[1], bytes[2]]);
            instr
                .mnemonic
                .replace("d16", &format!("{:04X}H", value))
                .replace("a16", &format!("{:04X}H", value))
        }
        _ => instr.mnemonic.to_string(),
    };
    (text, len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Cpu;
    use crate::mmu::Mmu;

    /// CPU parked at 0xC000 with a program in work RAM.
    fn setup(program: &[u8]) -> (Cpu, Mmu) {
        let mut mmu = Mmu::new();
        for (i, byte) in program.iter().enumerate() {
            mmu.write8(0xC000 + i as u16, *byte);
        }
        let mut cpu = Cpu::new();
        cpu.pc = 0xC000;
        (cpu, mmu)
    }

    fn step_cycles(cpu: &mut Cpu, mmu: &mut Mmu) -> u64 {
        let before = cpu.cycles;
        cpu.step(mmu);
        cpu.cycles - before
    }

    #[test]
    fn add_hl_bc_sets_half_carry() {
        let (mut cpu, mut mmu) = setup(&[0x09]);
        cpu.set_hl(0x8A23);
        cpu.set_bc(0x0605);
        cpu.f = 0x80;
        let cycles = step_cycles(&mut cpu, &mut mmu);
        assert_eq!(cpu.hl(), 0x9028);
        assert_eq!(cycles, 8);
        assert_ne!(cpu.f & FLAG_H, 0);
        assert_eq!(cpu.f & FLAG_C, 0);
        assert_eq!(cpu.f & FLAG_N, 0);
        assert_ne!(cpu.f & FLAG_Z, 0, "Z is untouched");
    }

    #[test]
    fn daa_after_add_adjusts_bcd() {
        let (mut cpu, mut mmu) = setup(&[0x80, 0x27]);
        cpu.a = 0x45;
        cpu.b = 0x38;
        cpu.step(&mut mmu);
        assert_eq!(cpu.a, 0x7D);
        cpu.step(&mut mmu);
        assert_eq!(cpu.a, 0x83);
        assert_eq!(cpu.f & FLAG_C, 0);
    }

    #[test]
    fn sub_sets_borrow_flags() {
        let (mut cpu, mut mmu) = setup(&[0x90]);
        cpu.a = 0x10;
        cpu.b = 0x01;
        cpu.step(&mut mmu);
        assert_eq!(cpu.a, 0x0F);
        assert_ne!(cpu.f & FLAG_N, 0);
        assert_ne!(cpu.f & FLAG_H, 0);
        assert_eq!(cpu.f & FLAG_C, 0);
    }

    #[test]
    fn adc_uses_incoming_carry() {
        let (mut cpu, mut mmu) = setup(&[0x88]);
        cpu.a = 0xFF;
        cpu.b = 0x00;
        cpu.f = FLAG_C;
        cpu.step(&mut mmu);
        assert_eq!(cpu.a, 0x00);
        assert_ne!(cpu.f & FLAG_Z, 0);
        assert_ne!(cpu.f & FLAG_C, 0);
        assert_ne!(cpu.f & FLAG_H, 0);
    }

    #[test]
    fn sbc_borrows_through_carry() {
        let (mut cpu, mut mmu) = setup(&[0x98]);
        cpu.a = 0x00;
        cpu.b = 0x00;
        cpu.f = FLAG_C;
        cpu.step(&mut mmu);
        assert_eq!(cpu.a, 0xFF);
        assert_ne!(cpu.f & FLAG_C, 0);
    }

    #[test]
    fn inc_preserves_carry() {
        let (mut cpu, mut mmu) = setup(&[0x3C]);
        cpu.a = 0xFF;
        cpu.f = FLAG_C;
        cpu.step(&mut mmu);
        assert_eq!(cpu.a, 0x00);
        assert_ne!(cpu.f & FLAG_Z, 0);
        assert_ne!(cpu.f & FLAG_H, 0);
        assert_ne!(cpu.f & FLAG_C, 0);
    }

    #[test]
    fn ld_r_r_and_hl_cost() {
        let (mut cpu, mut mmu) = setup(&[0x41, 0x46]);
        cpu.c = 0x99;
        cpu.set_hl(0xC100);
        mmu.write8(0xC100, 0x55);
        assert_eq!(step_cycles(&mut cpu, &mut mmu), 4);
        assert_eq!(cpu.b, 0x99);
        assert_eq!(step_cycles(&mut cpu, &mut mmu), 8);
        assert_eq!(cpu.b, 0x55);
    }

    #[test]
    fn conditional_jr_timing() {
        // JR NZ,+2 with Z set: not taken, 8 cycles.
        let (mut cpu, mut mmu) = setup(&[0x20, 0x02, 0x00, 0x00]);
        cpu.f = FLAG_Z;
        assert_eq!(step_cycles(&mut cpu, &mut mmu), 8);
        assert_eq!(cpu.pc, 0xC002);

        // Taken: 12 cycles, lands past the skipped bytes.
        let (mut cpu, mut mmu) = setup(&[0x20, 0x02, 0x00, 0x00]);
        cpu.f = 0;
        assert_eq!(step_cycles(&mut cpu, &mut mmu), 12);
        assert_eq!(cpu.pc, 0xC004);
    }

    #[test]
    fn call_and_ret_round_trip() {
        let mut program = vec![0xCD, 0x10, 0xC1]; // CALL 0xC110
        program.resize(0x110, 0x00);
        program.push(0xC9); // RET at 0xC110
        let (mut cpu, mut mmu) = setup(&program);
        cpu.sp = 0xDFFE;
        assert_eq!(step_cycles(&mut cpu, &mut mmu), 24);
        assert_eq!(cpu.pc, 0xC110);
        assert_eq!(cpu.sp, 0xDFFC);
        assert_eq!(mmu.read16(0xDFFC), 0xC003);
        assert_eq!(step_cycles(&mut cpu, &mut mmu), 16);
        assert_eq!(cpu.pc, 0xC003);
        assert_eq!(cpu.sp, 0xDFFE);
    }

    #[test]
    fn rst_vectors_to_fixed_address() {
        let (mut cpu, mut mmu) = setup(&[0xEF]); // RST 28H
        cpu.sp = 0xDFFE;
        assert_eq!(step_cycles(&mut cpu, &mut mmu), 16);
        assert_eq!(cpu.pc, 0x0028);
        assert_eq!(mmu.read16(0xDFFC), 0xC001);
    }

    #[test]
    fn pop_af_clears_flag_low_nibble() {
        let (mut cpu, mut mmu) = setup(&[0xF1]);
        cpu.sp = 0xDFF0;
        mmu.write16(0xDFF0, 0x12FF);
        cpu.step(&mut mmu);
        assert_eq!(cpu.a, 0x12);
        assert_eq!(cpu.f, 0xF0);
    }

    #[test]
    fn cb_bit_and_set_on_hl() {
        let (mut cpu, mut mmu) = setup(&[0xCB, 0x46, 0xCB, 0xC6]); // BIT 0,(HL); SET 0,(HL)
        cpu.set_hl(0xC200);
        mmu.write8(0xC200, 0xFE);
        assert_eq!(step_cycles(&mut cpu, &mut mmu), 12);
        assert_ne!(cpu.f & FLAG_Z, 0);
        assert_eq!(step_cycles(&mut cpu, &mut mmu), 16);
        assert_eq!(mmu.read8(0xC200), 0xFF);
    }

    #[test]
    fn cb_swap_rotates_nibbles() {
        let (mut cpu, mut mmu) = setup(&[0xCB, 0x37]); // SWAP A
        cpu.a = 0xF1;
        cpu.f = 0xF0;
        assert_eq!(step_cycles(&mut cpu, &mut mmu), 8);
        assert_eq!(cpu.a, 0x1F);
        assert_eq!(cpu.f, 0x00);
    }

    #[test]
    fn cb_sra_keeps_sign_bit() {
        let (mut cpu, mut mmu) = setup(&[0xCB, 0x2F]); // SRA A
        cpu.a = 0x81;
        cpu.step(&mut mmu);
        assert_eq!(cpu.a, 0xC0);
        assert_ne!(cpu.f & FLAG_C, 0);
    }

    #[test]
    fn add_sp_r8_flags_from_low_byte() {
        let (mut cpu, mut mmu) = setup(&[0xE8, 0x01]); // ADD SP,+1
        cpu.sp = 0xFFFF;
        assert_eq!(step_cycles(&mut cpu, &mut mmu), 16);
        assert_eq!(cpu.sp, 0x0000);
        assert_ne!(cpu.f & FLAG_H, 0);
        assert_ne!(cpu.f & FLAG_C, 0);
        assert_eq!(cpu.f & FLAG_Z, 0, "Z is always clear");
    }

    #[test]
    fn ldi_and_ldd_move_hl() {
        let (mut cpu, mut mmu) = setup(&[0x22, 0x3A]); // LD (HL+),A; LD A,(HL-)
        cpu.a = 0x77;
        cpu.set_hl(0xC100);
        cpu.step(&mut mmu);
        assert_eq!(mmu.read8(0xC100), 0x77);
        assert_eq!(cpu.hl(), 0xC101);

        mmu.write8(0xC101, 0x88);
        cpu.step(&mut mmu);
        assert_eq!(cpu.a, 0x88);
        assert_eq!(cpu.hl(), 0xC100);
    }

    #[test]
    fn jp_hl_is_a_bare_jump() {
        let (mut cpu, mut mmu) = setup(&[0xE9]);
        cpu.set_hl(0xC200);
        assert_eq!(step_cycles(&mut cpu, &mut mmu), 4);
        assert_eq!(cpu.pc, 0xC200);
    }

    #[test]
    fn conditional_call_and_ret_timing() {
        // CALL Z with Z clear: 12 cycles, falls through.
        let (mut cpu, mut mmu) = setup(&[0xCC, 0x00, 0xC2]);
        cpu.f = 0;
        cpu.sp = 0xDFFE;
        assert_eq!(step_cycles(&mut cpu, &mut mmu), 12);
        assert_eq!(cpu.pc, 0xC003);
        assert_eq!(cpu.sp, 0xDFFE, "nothing pushed");

        // RET NZ with Z clear: 20 cycles.
        let (mut cpu, mut mmu) = setup(&[0xC0]);
        cpu.f = 0;
        cpu.sp = 0xDFF0;
        mmu.write16(0xDFF0, 0xC300);
        assert_eq!(step_cycles(&mut cpu, &mut mmu), 20);
        assert_eq!(cpu.pc, 0xC300);

        // RET NZ with Z set: 8 cycles, no pop.
        let (mut cpu, mut mmu) = setup(&[0xC0]);
        cpu.f = FLAG_Z;
        cpu.sp = 0xDFF0;
        assert_eq!(step_cycles(&mut cpu, &mut mmu), 8);
        assert_eq!(cpu.sp, 0xDFF0);
    }

    #[test]
    fn rla_rotates_through_carry_and_clears_z() {
        let (mut cpu, mut mmu) = setup(&[0x17]); // RLA
        cpu.a = 0x80;
        cpu.f = 0;
        cpu.step(&mut mmu);
        assert_eq!(cpu.a, 0x00);
        assert_eq!(cpu.f, FLAG_C, "Z stays clear even for zero result");
    }

    #[test]
    fn cpl_sets_n_and_h_only() {
        let (mut cpu, mut mmu) = setup(&[0x2F]);
        cpu.a = 0x35;
        cpu.f = FLAG_Z | FLAG_C;
        cpu.step(&mut mmu);
        assert_eq!(cpu.a, 0xCA);
        assert_eq!(cpu.f, FLAG_Z | FLAG_C | FLAG_N | FLAG_H);
    }

    #[test]
    fn scf_and_ccf_preserve_z() {
        let (mut cpu, mut mmu) = setup(&[0x37, 0x3F, 0x3F]);
        cpu.f = FLAG_Z | FLAG_N | FLAG_H;
        cpu.step(&mut mmu);
        assert_eq!(cpu.f, FLAG_Z | FLAG_C);
        cpu.step(&mut mmu);
        assert_eq!(cpu.f, FLAG_Z);
        cpu.step(&mut mmu);
        assert_eq!(cpu.f, FLAG_Z | FLAG_C);
    }

    #[test]
    fn ld_hl_sp_with_negative_offset() {
        let (mut cpu, mut mmu) = setup(&[0xF8, 0xFE]); // LD HL,SP-2
        cpu.sp = 0xD000;
        assert_eq!(step_cycles(&mut cpu, &mut mmu), 12);
        assert_eq!(cpu.hl(), 0xCFFE);
        assert_eq!(cpu.sp, 0xD000, "SP unchanged");
    }

    #[test]
    fn ld_a16_sp_stores_little_endian() {
        let (mut cpu, mut mmu) = setup(&[0x08, 0x00, 0xC4]); // LD (C400),SP
        cpu.sp = 0xBEEF;
        assert_eq!(step_cycles(&mut cpu, &mut mmu), 20);
        assert_eq!(mmu.read8(0xC400), 0xEF);
        assert_eq!(mmu.read8(0xC401), 0xBE);
    }

    #[test]
    fn halt_with_interrupts_disabled_and_none_pending_sleeps() {
        let (mut cpu, mut mmu) = setup(&[0x76]);
        cpu.step(&mut mmu);
        assert!(cpu.halted);
    }

    #[test]
    fn every_opcode_has_an_entry() {
        for (i, instr) in PRIMARY.iter().enumerate() {
            assert!(!instr.mnemonic.is_empty(), "primary {:02X}", i);
            assert!(instr.operands <= 2, "primary {:02X}", i);
        }
        for (i, instr) in EXTENDED.iter().enumerate() {
            assert!(!instr.mnemonic.is_empty(), "extended {:02X}", i);
            assert_eq!(instr.operands, 0, "extended {:02X}", i);
        }
    }

    #[test]
    fn disassemble_substitutes_operands() {
        let (text, len) = disassemble(&[0x3E, 0x42]);
        assert_eq!(text, "LD A,42H");
        assert_eq!(len, 2);
        let (text, len) = disassemble(&[0xC3, 0x50, 0x01]);
        assert_eq!(text, "JP 0150H");
        assert_eq!(len, 3);
        let (text, len) = disassemble(&[0xCB, 0x7E]);
        assert_eq!(text, "BIT 7,(HL)");
        assert_eq!(len, 2);
        let (text, _) = disassemble(&[0x18, 0xFE]);
        assert_eq!(text, "JR -2");
    }
}
