//! Sharp SM83 processor core (Game Boy).
//!
//! Instructions are executed in full on their first M-cycle; every bus access
//! and internal delay is counted, and the remaining M-cycles of the
//! instruction are burned by subsequent [`Processor::cycle`] calls. The `CB`
//! prefix is its own one-cycle step that latches the extended table for the
//! next fetch.

pub mod disasm;

use crate::bus::{Bus, BusView, FlatBus};
use crate::error::{Architecture, EmuError};
use crate::processor::{MachinePhase, Processor};

#[cfg(feature = "cpu-trace")]
macro_rules! cpu_trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*);
    };
}
#[cfg(not(feature = "cpu-trace"))]
macro_rules! cpu_trace {
    ($($arg:tt)*) => {};
}

pub const FLAG_Z: u8 = 0x80; // Zero
pub const FLAG_N: u8 = 0x40; // Subtract
pub const FLAG_H: u8 = 0x20; // Half Carry
pub const FLAG_C: u8 = 0x10; // Carry

/// First interrupt vector (VBlank); the others follow at 8-byte steps.
const INTERRUPT_VECTOR_BASE: u16 = 0x0040;

const BOOT_PC: u16 = 0x0100;
const BOOT_SP: u16 = 0xFFFE;

// Register state left behind by the DMG (rev A/B/C) boot ROM.
const DMG_BOOT_A: u8 = 0x01;
const DMG_BOOT_F: u8 = 0xB0;
const DMG_BOOT_B: u8 = 0x00;
const DMG_BOOT_C: u8 = 0x13;
const DMG_BOOT_D: u8 = 0x00;
const DMG_BOOT_E: u8 = 0xD8;
const DMG_BOOT_H: u8 = 0x01;
const DMG_BOOT_L: u8 = 0x4D;

/// Opcodes with no defined behavior; they lock up real hardware.
pub const INVALID_OPCODES: [u8; 11] = [
    0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD,
];

/// Bus as seen by an SM83: memory plus interrupt and low-power plumbing.
pub trait Sm83Bus: Bus {
    /// `IE & IF` limited to the five interrupt sources.
    fn pending_interrupts(&self) -> u8 {
        self.read_byte(0xFFFF) & self.read_byte(0xFF0F) & 0x1F
    }

    /// Clears `bit` in `IF` once its handler has been entered.
    fn acknowledge_interrupt(&mut self, bit: u8) {
        let flags = self.read_byte(0xFF0F);
        self.write_byte(0xFF0F, flags & !bit);
    }

    /// Called when STOP executes.
    fn stop(&mut self) {}

    /// True while a joypad line would bring the CPU out of STOP.
    fn joypad_wake(&self) -> bool {
        false
    }
}

impl Sm83Bus for FlatBus {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// HALT: no fetches until `IE & IF` becomes non-zero.
    Halted,
    /// STOP: no fetches until the joypad wakes the CPU.
    Stopped,
}

#[derive(Debug, Clone)]
pub struct Sm83 {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub pc: u16,
    pub sp: u16,
    pub ime: bool,
    pub run_state: RunState,
    ime_enable_delay: u8,
    halt_bug: bool,
    prefixed: bool,
    /// M-cycles left in the current instruction.
    busy: u8,
    /// M-cycles counted while executing the current instruction.
    spent: u8,
    opcode_addr: u16,
    cycles: u64,
}

impl Default for Sm83 {
    fn default() -> Self {
        Self::new()
    }
}

impl Sm83 {
    /// CPU in the post-boot register state.
    pub fn new() -> Self {
        Self {
            a: DMG_BOOT_A,
            f: DMG_BOOT_F,
            b: DMG_BOOT_B,
            c: DMG_BOOT_C,
            d: DMG_BOOT_D,
            e: DMG_BOOT_E,
            h: DMG_BOOT_H,
            l: DMG_BOOT_L,
            pc: BOOT_PC,
            sp: BOOT_SP,
            ime: false,
            run_state: RunState::Running,
            ime_enable_delay: 0,
            halt_bug: false,
            prefixed: false,
            busy: 0,
            spent: 0,
            opcode_addr: BOOT_PC,
            cycles: 0,
        }
    }

    pub fn get_af(&self) -> u16 {
        ((self.a as u16) << 8) | self.f as u16
    }

    pub fn get_bc(&self) -> u16 {
        ((self.b as u16) << 8) | self.c as u16
    }

    pub fn set_bc(&mut self, val: u16) {
        self.b = (val >> 8) as u8;
        self.c = val as u8;
    }

    pub fn get_de(&self) -> u16 {
        ((self.d as u16) << 8) | self.e as u16
    }

    pub fn set_de(&mut self, val: u16) {
        self.d = (val >> 8) as u8;
        self.e = val as u8;
    }

    pub fn get_hl(&self) -> u16 {
        ((self.h as u16) << 8) | self.l as u16
    }

    pub fn set_hl(&mut self, val: u16) {
        self.h = (val >> 8) as u8;
        self.l = val as u8;
    }

    /// True while EI has executed but IME is not yet set.
    pub fn ime_pending(&self) -> bool {
        self.ime_enable_delay > 0
    }

    /// Formatted CPU state string for debugging.
    pub fn debug_state(&self) -> String {
        format!(
            "AF:{:04X} BC:{:04X} DE:{:04X} HL:{:04X} PC:{:04X} SP:{:04X} CY:{}",
            self.get_af(),
            self.get_bc(),
            self.get_de(),
            self.get_hl(),
            self.pc,
            self.sp,
            self.cycles
        )
    }

    #[inline]
    fn tick(&mut self, m_cycles: u8) {
        self.spent += m_cycles;
    }

    #[inline(always)]
    fn fetch8(&mut self, bus: &mut dyn Sm83Bus) -> u8 {
        let val = bus.read_byte(self.pc);
        self.pc = self.pc.wrapping_add(1);
        self.tick(1);
        val
    }

    #[inline(always)]
    fn fetch16(&mut self, bus: &mut dyn Sm83Bus) -> u16 {
        let lo = self.fetch8(bus) as u16;
        let hi = self.fetch8(bus) as u16;
        (hi << 8) | lo
    }

    #[inline(always)]
    fn read8(&mut self, bus: &mut dyn Sm83Bus, addr: u16) -> u8 {
        let val = bus.read_byte(addr);
        self.tick(1);
        val
    }

    #[inline(always)]
    fn write8(&mut self, bus: &mut dyn Sm83Bus, addr: u16, val: u8) {
        bus.write_byte(addr, val);
        self.tick(1);
    }

    fn push_stack(&mut self, bus: &mut dyn Sm83Bus, val: u16) {
        self.sp = self.sp.wrapping_sub(1);
        self.write8(bus, self.sp, (val >> 8) as u8);
        self.sp = self.sp.wrapping_sub(1);
        self.write8(bus, self.sp, val as u8);
    }

    fn pop_stack(&mut self, bus: &mut dyn Sm83Bus) -> u16 {
        let lo = self.read8(bus, self.sp) as u16;
        self.sp = self.sp.wrapping_add(1);
        let hi = self.read8(bus, self.sp) as u16;
        self.sp = self.sp.wrapping_add(1);
        (hi << 8) | lo
    }

    /// Register operand by its 3-bit encoding: B C D E H L (HL) A.
    fn read_reg(&mut self, bus: &mut dyn Sm83Bus, index: u8) -> u8 {
        match index {
            0 => self.b,
            1 => self.c,
            2 => self.d,
            3 => self.e,
            4 => self.h,
            5 => self.l,
            6 => self.read8(bus, self.get_hl()),
            _ => self.a,
        }
    }

    fn write_reg(&mut self, bus: &mut dyn Sm83Bus, index: u8, val: u8) {
        match index {
            0 => self.b = val,
            1 => self.c = val,
            2 => self.d = val,
            3 => self.e = val,
            4 => self.h = val,
            5 => self.l = val,
            6 => {
                let addr = self.get_hl();
                self.write8(bus, addr, val);
            }
            _ => self.a = val,
        }
    }

    /// 16-bit register pair by its 2-bit encoding: BC DE HL SP.
    fn get_rp(&self, index: u8) -> u16 {
        match index {
            0 => self.get_bc(),
            1 => self.get_de(),
            2 => self.get_hl(),
            _ => self.sp,
        }
    }

    fn set_rp(&mut self, index: u8, val: u16) {
        match index {
            0 => self.set_bc(val),
            1 => self.set_de(val),
            2 => self.set_hl(val),
            _ => self.sp = val,
        }
    }

    /// NZ, Z, NC, C
    fn condition(&self, cc: u8) -> bool {
        match cc & 0x03 {
            0 => self.f & FLAG_Z == 0,
            1 => self.f & FLAG_Z != 0,
            2 => self.f & FLAG_C == 0,
            _ => self.f & FLAG_C != 0,
        }
    }

    fn inc8(&mut self, val: u8) -> u8 {
        let res = val.wrapping_add(1);
        self.f = (self.f & FLAG_C)
            | if res == 0 { FLAG_Z } else { 0 }
            | if val & 0x0F == 0x0F { FLAG_H } else { 0 };
        res
    }

    fn dec8(&mut self, val: u8) -> u8 {
        let res = val.wrapping_sub(1);
        self.f = (self.f & FLAG_C)
            | FLAG_N
            | if res == 0 { FLAG_Z } else { 0 }
            | if val & 0x0F == 0 { FLAG_H } else { 0 };
        res
    }

    fn add_hl(&mut self, val: u16) {
        let hl = self.get_hl();
        self.f = (self.f & FLAG_Z)
            | if (hl & 0x0FFF) + (val & 0x0FFF) > 0x0FFF {
                FLAG_H
            } else {
                0
            }
            | if hl as u32 + val as u32 > 0xFFFF {
                FLAG_C
            } else {
                0
            };
        self.set_hl(hl.wrapping_add(val));
    }

    /// SP + signed immediate with flags from the low byte, shared by
    /// `ADD SP,e` and `LD HL,SP+e`.
    fn sp_plus_offset(&mut self, bus: &mut dyn Sm83Bus) -> u16 {
        let val = self.fetch8(bus) as i8 as i16 as u16;
        let sp = self.sp;
        self.f = if (sp & 0x0F) + (val & 0x0F) > 0x0F {
            FLAG_H
        } else {
            0
        } | if (sp & 0xFF) + (val & 0xFF) > 0xFF {
            FLAG_C
        } else {
            0
        };
        sp.wrapping_add(val)
    }

    /// ADD ADC SUB SBC AND XOR OR CP, selected by bits 3..5 of the opcode.
    fn alu(&mut self, op: u8, val: u8) {
        let a = self.a;
        let carry_in = if self.f & FLAG_C != 0 { 1u8 } else { 0 };
        match op & 0x07 {
            0 | 1 => {
                let c = if op & 0x07 == 1 { carry_in } else { 0 };
                let res = a as u16 + val as u16 + c as u16;
                self.f = if res as u8 == 0 { FLAG_Z } else { 0 }
                    | if (a & 0x0F) + (val & 0x0F) + c > 0x0F {
                        FLAG_H
                    } else {
                        0
                    }
                    | if res > 0xFF { FLAG_C } else { 0 };
                self.a = res as u8;
            }
            2 | 3 | 7 => {
                let c = if op & 0x07 == 3 { carry_in } else { 0 };
                let res = a as i16 - val as i16 - c as i16;
                self.f = FLAG_N
                    | if res as u8 == 0 { FLAG_Z } else { 0 }
                    | if (a & 0x0F) < (val & 0x0F) + c {
                        FLAG_H
                    } else {
                        0
                    }
                    | if res < 0 { FLAG_C } else { 0 };
                if op & 0x07 != 7 {
                    self.a = res as u8;
                }
            }
            4 => {
                self.a &= val;
                self.f = if self.a == 0 { FLAG_Z } else { 0 } | FLAG_H;
            }
            5 => {
                self.a ^= val;
                self.f = if self.a == 0 { FLAG_Z } else { 0 };
            }
            _ => {
                self.a |= val;
                self.f = if self.a == 0 { FLAG_Z } else { 0 };
            }
        }
    }

    fn daa(&mut self) {
        let mut correction = 0u8;
        let mut carry = false;
        if self.f & FLAG_H != 0 || (self.f & FLAG_N == 0 && (self.a & 0x0F) > 9) {
            correction |= 0x06;
        }
        if self.f & FLAG_C != 0 || (self.f & FLAG_N == 0 && self.a > 0x99) {
            correction |= 0x60;
            carry = true;
        }
        if self.f & FLAG_N == 0 {
            self.a = self.a.wrapping_add(correction);
        } else {
            self.a = self.a.wrapping_sub(correction);
        }
        self.f = if self.a == 0 { FLAG_Z } else { 0 }
            | (self.f & FLAG_N)
            | if carry { FLAG_C } else { 0 };
    }

    fn execute_cb(&mut self, opcode: u8, bus: &mut dyn Sm83Bus) {
        let r = opcode & 0x07;
        let bit = (opcode >> 3) & 0x07;
        let val = self.read_reg(bus, r);
        match opcode >> 6 {
            0 => {
                let carry_in = if self.f & FLAG_C != 0 { 1 } else { 0 };
                let (res, carry) = match bit {
                    0 => (val.rotate_left(1), val & 0x80 != 0),
                    1 => (val.rotate_right(1), val & 0x01 != 0),
                    2 => ((val << 1) | carry_in, val & 0x80 != 0),
                    3 => ((val >> 1) | (carry_in << 7), val & 0x01 != 0),
                    4 => (val << 1, val & 0x80 != 0),
                    5 => ((val >> 1) | (val & 0x80), val & 0x01 != 0),
                    6 => (val.rotate_left(4), false),
                    _ => (val >> 1, val & 0x01 != 0),
                };
                self.write_reg(bus, r, res);
                self.f = if res == 0 { FLAG_Z } else { 0 } | if carry { FLAG_C } else { 0 };
            }
            1 => {
                self.f =
                    (self.f & FLAG_C) | FLAG_H | if val & (1 << bit) == 0 { FLAG_Z } else { 0 };
            }
            2 => self.write_reg(bus, r, val & !(1 << bit)),
            _ => self.write_reg(bus, r, val | (1 << bit)),
        }
    }

    fn dispatch_interrupt(&mut self, bus: &mut dyn Sm83Bus) {
        self.ime = false;
        self.tick(2);
        let return_pc = self.pc;

        // The upper-byte push may land on IE ($FFFF) and change which
        // interrupt is taken, or cancel dispatch entirely.
        self.sp = self.sp.wrapping_sub(1);
        self.write8(bus, self.sp, (return_pc >> 8) as u8);
        let pending = bus.pending_interrupts();

        self.sp = self.sp.wrapping_sub(1);
        self.write8(bus, self.sp, return_pc as u8);

        if pending == 0 {
            self.pc = 0;
        } else {
            let bit = pending & pending.wrapping_neg();
            bus.acknowledge_interrupt(bit);
            self.pc = INTERRUPT_VECTOR_BASE + 8 * bit.trailing_zeros() as u16;
        }
        cpu_trace!("SM83 interrupt -> {:04X}", self.pc);
        self.tick(1);
    }

    /// Runs the M-cycle that begins an instruction, returning what it was.
    fn begin(&mut self, bus: &mut dyn Sm83Bus) -> Result<MachinePhase, EmuError> {
        match self.run_state {
            RunState::Stopped => {
                if bus.joypad_wake() {
                    self.run_state = RunState::Running;
                }
                self.tick(1);
                return Ok(MachinePhase::Idle);
            }
            RunState::Halted => {
                if bus.pending_interrupts() == 0 {
                    self.tick(1);
                    return Ok(MachinePhase::Idle);
                }
                self.run_state = RunState::Running;
            }
            RunState::Running => {}
        }

        if !self.prefixed && self.ime && bus.pending_interrupts() != 0 {
            self.dispatch_interrupt(bus);
            return Ok(MachinePhase::Interrupt);
        }

        let enable_after = self.ime_enable_delay == 1;
        self.execute(bus)?;
        if !self.prefixed {
            if enable_after && self.ime_enable_delay > 0 {
                self.ime = true;
            }
            if self.ime_enable_delay > 0 {
                self.ime_enable_delay -= 1;
            }
        }
        Ok(MachinePhase::Fetch)
    }

    fn execute(&mut self, bus: &mut dyn Sm83Bus) -> Result<(), EmuError> {
        if !self.prefixed {
            self.opcode_addr = self.pc;
        }
        let opcode = if self.halt_bug {
            self.halt_bug = false;
            self.read8(bus, self.pc)
        } else {
            self.fetch8(bus)
        };

        if self.prefixed {
            self.prefixed = false;
            self.execute_cb(opcode, bus);
            return Ok(());
        }
        cpu_trace!("SM83 {:04X}: {:02X} {}", self.opcode_addr, opcode, self.debug_state());

        match opcode {
            0x00 => {}
            0x01 | 0x11 | 0x21 | 0x31 => {
                let val = self.fetch16(bus);
                self.set_rp(opcode >> 4, val);
            }
            0x02 | 0x12 => {
                let addr = self.get_rp(opcode >> 4);
                self.write8(bus, addr, self.a);
            }
            0x0A | 0x1A => {
                let addr = self.get_rp(opcode >> 4);
                self.a = self.read8(bus, addr);
            }
            0x22 | 0x32 => {
                let addr = self.get_hl();
                self.write8(bus, addr, self.a);
                self.set_hl(if opcode == 0x22 {
                    addr.wrapping_add(1)
                } else {
                    addr.wrapping_sub(1)
                });
            }
            0x2A | 0x3A => {
                let addr = self.get_hl();
                self.a = self.read8(bus, addr);
                self.set_hl(if opcode == 0x2A {
                    addr.wrapping_add(1)
                } else {
                    addr.wrapping_sub(1)
                });
            }
            0x03 | 0x13 | 0x23 | 0x33 => {
                let rp = opcode >> 4;
                self.set_rp(rp, self.get_rp(rp).wrapping_add(1));
                self.tick(1);
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                let rp = opcode >> 4;
                self.set_rp(rp, self.get_rp(rp).wrapping_sub(1));
                self.tick(1);
            }
            0x09 | 0x19 | 0x29 | 0x39 => {
                self.add_hl(self.get_rp(opcode >> 4));
                self.tick(1);
            }
            op if op & 0xC7 == 0x04 => {
                let r = (op >> 3) & 0x07;
                let val = self.read_reg(bus, r);
                let res = self.inc8(val);
                self.write_reg(bus, r, res);
            }
            op if op & 0xC7 == 0x05 => {
                let r = (op >> 3) & 0x07;
                let val = self.read_reg(bus, r);
                let res = self.dec8(val);
                self.write_reg(bus, r, res);
            }
            op if op & 0xC7 == 0x06 => {
                let val = self.fetch8(bus);
                self.write_reg(bus, (op >> 3) & 0x07, val);
            }
            0x07 => {
                let carry = self.a & 0x80 != 0;
                self.a = self.a.rotate_left(1);
                self.f = if carry { FLAG_C } else { 0 };
            }
            0x0F => {
                let carry = self.a & 0x01 != 0;
                self.a = self.a.rotate_right(1);
                self.f = if carry { FLAG_C } else { 0 };
            }
            0x17 => {
                let carry = self.a & 0x80 != 0;
                self.a = (self.a << 1) | if self.f & FLAG_C != 0 { 1 } else { 0 };
                self.f = if carry { FLAG_C } else { 0 };
            }
            0x1F => {
                let carry = self.a & 0x01 != 0;
                self.a = (self.a >> 1) | if self.f & FLAG_C != 0 { 0x80 } else { 0 };
                self.f = if carry { FLAG_C } else { 0 };
            }
            0x08 => {
                let addr = self.fetch16(bus);
                self.write8(bus, addr, self.sp as u8);
                self.write8(bus, addr.wrapping_add(1), (self.sp >> 8) as u8);
            }
            0x10 => {
                let _ = self.fetch8(bus);
                bus.stop();
                self.run_state = RunState::Stopped;
            }
            0x18 => {
                let offset = self.fetch8(bus) as i8;
                self.pc = self.pc.wrapping_add(offset as u16);
                self.tick(1);
            }
            0x20 | 0x28 | 0x30 | 0x38 => {
                let offset = self.fetch8(bus) as i8;
                if self.condition((opcode >> 3) & 0x03) {
                    self.pc = self.pc.wrapping_add(offset as u16);
                    self.tick(1);
                }
            }
            0x27 => self.daa(),
            0x2F => {
                self.a ^= 0xFF;
                self.f = (self.f & (FLAG_Z | FLAG_C)) | FLAG_N | FLAG_H;
            }
            0x37 => self.f = (self.f & FLAG_Z) | FLAG_C,
            0x3F => self.f = (self.f & FLAG_Z) | ((self.f & FLAG_C) ^ FLAG_C),
            0x76 => {
                if self.ime || self.ime_enable_delay > 0 || bus.pending_interrupts() == 0 {
                    self.run_state = RunState::Halted;
                } else {
                    self.halt_bug = true;
                }
            }
            0x40..=0x7F => {
                let val = self.read_reg(bus, opcode & 0x07);
                self.write_reg(bus, (opcode >> 3) & 0x07, val);
            }
            0x80..=0xBF => {
                let val = self.read_reg(bus, opcode & 0x07);
                self.alu(opcode >> 3, val);
            }
            0xC0 | 0xC8 | 0xD0 | 0xD8 => {
                self.tick(1);
                if self.condition((opcode >> 3) & 0x03) {
                    self.pc = self.pop_stack(bus);
                    self.tick(1);
                }
            }
            0xC9 | 0xD9 => {
                self.pc = self.pop_stack(bus);
                if opcode == 0xD9 {
                    self.ime = true;
                }
                self.tick(1);
            }
            0xC1 | 0xD1 | 0xE1 => {
                let val = self.pop_stack(bus);
                self.set_rp((opcode >> 4) & 0x03, val);
            }
            0xF1 => {
                let val = self.pop_stack(bus);
                self.a = (val >> 8) as u8;
                self.f = (val as u8) & 0xF0;
            }
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                let val = if opcode == 0xF5 {
                    ((self.a as u16) << 8) | (self.f & 0xF0) as u16
                } else {
                    self.get_rp((opcode >> 4) & 0x03)
                };
                self.tick(1);
                self.push_stack(bus, val);
            }
            0xC2 | 0xCA | 0xD2 | 0xDA => {
                let addr = self.fetch16(bus);
                if self.condition((opcode >> 3) & 0x03) {
                    self.pc = addr;
                    self.tick(1);
                }
            }
            0xC3 => {
                self.pc = self.fetch16(bus);
                self.tick(1);
            }
            0xE9 => self.pc = self.get_hl(),
            0xC4 | 0xCC | 0xD4 | 0xDC => {
                let addr = self.fetch16(bus);
                if self.condition((opcode >> 3) & 0x03) {
                    self.tick(1);
                    self.push_stack(bus, self.pc);
                    self.pc = addr;
                }
            }
            0xCD => {
                let addr = self.fetch16(bus);
                self.tick(1);
                self.push_stack(bus, self.pc);
                self.pc = addr;
            }
            op if op & 0xC7 == 0xC7 => {
                self.tick(1);
                self.push_stack(bus, self.pc);
                self.pc = (op & 0x38) as u16;
            }
            op if op & 0xC7 == 0xC6 => {
                let val = self.fetch8(bus);
                self.alu(op >> 3, val);
            }
            0xCB => self.prefixed = true,
            0xE0 => {
                let addr = 0xFF00 | self.fetch8(bus) as u16;
                self.write8(bus, addr, self.a);
            }
            0xF0 => {
                let addr = 0xFF00 | self.fetch8(bus) as u16;
                self.a = self.read8(bus, addr);
            }
            0xE2 => self.write8(bus, 0xFF00 | self.c as u16, self.a),
            0xF2 => self.a = self.read8(bus, 0xFF00 | self.c as u16),
            0xEA => {
                let addr = self.fetch16(bus);
                self.write8(bus, addr, self.a);
            }
            0xFA => {
                let addr = self.fetch16(bus);
                self.a = self.read8(bus, addr);
            }
            0xE8 => {
                self.sp = self.sp_plus_offset(bus);
                self.tick(2);
            }
            0xF8 => {
                let val = self.sp_plus_offset(bus);
                self.set_hl(val);
                self.tick(1);
            }
            0xF9 => {
                self.sp = self.get_hl();
                self.tick(1);
            }
            0xF3 => {
                self.ime = false;
                self.ime_enable_delay = 0;
            }
            0xFB => self.ime_enable_delay = 2,
            _ => {
                return Err(EmuError::invalid_instruction(
                    Architecture::Sm83,
                    &[opcode],
                    self.opcode_addr,
                ));
            }
        }
        Ok(())
    }
}

impl Processor for Sm83 {
    type Bus = dyn Sm83Bus;

    fn cycle(&mut self, bus: &mut Self::Bus) -> Result<MachinePhase, EmuError> {
        self.cycles += 1;
        if self.busy > 0 {
            self.busy -= 1;
            return Ok(MachinePhase::Execute);
        }
        self.spent = 0;
        let phase = self.begin(bus)?;
        self.busy = self.spent.saturating_sub(1);
        Ok(phase)
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn instruction_pointer(&self) -> u16 {
        self.pc
    }

    fn at_instruction_boundary(&self) -> bool {
        self.busy == 0 && !self.prefixed && self.run_state == RunState::Running
    }

    fn cycles(&self) -> u64 {
        self.cycles
    }
}
