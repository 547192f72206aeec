//! RCA CDP1802 ("COSMAC") processor core.
//!
//! The core is stepped one machine state at a time: S0 fetch, S1 execute,
//! S2 DMA and S3 interrupt. Each state is 8 clock periods on real hardware.
//! Most instructions take S0 + one S1; the long branch/skip group (`CN`)
//! takes two S1 states.

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

/// Direction of a pending DMA request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dma {
    /// Peripheral writes into `M(R0)`.
    In,
    /// Peripheral reads `M(R0)`.
    Out,
}

/// Bus as seen by a CDP1802: memory plus the control lines of the chip.
///
/// Every line defaults to inactive so that plain memory can stand in for a
/// full machine.
pub trait CosmacBus: Bus {
    /// `EF1..EF4` in bits 0..3, set while the line is asserted.
    fn flag_lines(&self) -> u8 {
        0
    }

    fn interrupt_requested(&self) -> bool {
        false
    }

    fn dma_request(&self) -> Option<Dma> {
        None
    }

    fn dma_out(&mut self, _value: u8) {}

    fn dma_in(&mut self) -> u8 {
        0
    }

    /// `OUT 1..7`: `value` is `M(R(X))`, `port` the N lines.
    fn output(&mut self, _port: u8, _value: u8) {}

    /// `INP 1..7`: the returned byte lands in both `M(R(X))` and `D`.
    fn input(&mut self, _port: u8) -> u8 {
        0
    }

    fn set_q(&mut self, _q: bool) {}
}

impl CosmacBus for FlatBus {}

/// CDP1802 machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// S0
    Fetch,
    /// S1
    Execute,
    /// S2
    Dma,
    /// S3
    Interrupt,
}

#[derive(Debug, Clone)]
pub struct Cdp1802 {
    /// Scratchpad registers R0..R15.
    pub r: [u16; 16],
    /// Program counter designator.
    pub p: u8,
    /// Data pointer designator.
    pub x: u8,
    /// High nibble of the current opcode.
    pub i: u8,
    /// Low nibble of the current opcode.
    pub n: u8,
    pub d: u8,
    pub df: bool,
    pub ie: bool,
    pub q: bool,
    /// `X:P` saved on interrupt entry.
    pub t: u8,
    state: State,
    exec_cycle: u8,
    branch_latch: u8,
    long_taken: bool,
    idle: bool,
    opcode_addr: u16,
    cycles: u64,
}

impl Default for Cdp1802 {
    fn default() -> Self {
        Self::new()
    }
}

impl Cdp1802 {
    pub fn new() -> Self {
        let mut cpu = Self {
            r: [0; 16],
            p: 0,
            x: 0,
            i: 0,
            n: 0,
            d: 0,
            df: false,
            ie: true,
            q: false,
            t: 0,
            state: State::Fetch,
            exec_cycle: 0,
            branch_latch: 0,
            long_taken: false,
            idle: false,
            opcode_addr: 0,
            cycles: 0,
        };
        cpu.reset();
        cpu
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Places the core at an instruction boundary in the given state, used
    /// when loading register snapshots.
    pub fn set_state(&mut self, state: State) {
        self.state = state;
        self.exec_cycle = 0;
        self.idle = false;
    }

    pub fn is_idle(&self) -> bool {
        self.idle
    }

    pub fn pc(&self) -> u16 {
        self.r[self.p as usize]
    }

    pub fn debug_state(&self) -> String {
        format!(
            "P:{:X} X:{:X} D:{:02X} DF:{} IE:{} Q:{} R{:X}:{:04X} R{:X}:{:04X} CY:{}",
            self.p,
            self.x,
            self.d,
            self.df as u8,
            self.ie as u8,
            self.q as u8,
            self.p,
            self.pc(),
            self.x,
            self.r[self.x as usize],
            self.cycles
        )
    }

    fn rp(&mut self) -> &mut u16 {
        &mut self.r[self.p as usize]
    }

    fn rx(&self) -> u16 {
        self.r[self.x as usize]
    }

    fn inc_rx(&mut self) {
        let x = self.x as usize;
        self.r[x] = self.r[x].wrapping_add(1);
    }

    /// Reads the immediate byte at `R(P)` and advances `R(P)`.
    fn immediate(&mut self, bus: &mut dyn CosmacBus) -> u8 {
        let addr = *self.rp();
        *self.rp() = addr.wrapping_add(1);
        bus.read_byte(addr)
    }

    fn add(&mut self, a: u8, b: u8, carry: bool) {
        let sum = a as u16 + b as u16 + carry as u16;
        self.d = sum as u8;
        self.df = sum > 0xFF;
    }

    /// `minuend - subtrahend`; `no_borrow` is the incoming DF. DF is set when
    /// no borrow occurred.
    fn subtract(&mut self, minuend: u8, subtrahend: u8, no_borrow: bool) {
        self.add(minuend, !subtrahend, no_borrow);
    }

    fn short_condition(&self, bus: &dyn CosmacBus) -> bool {
        let base = match self.n & 0x7 {
            0 => true,
            1 => self.q,
            2 => self.d == 0,
            3 => self.df,
            k => bus.flag_lines() & (1 << (k - 4)) != 0,
        };
        base ^ (self.n & 0x8 != 0)
    }

    fn long_condition(&self) -> bool {
        let n = self.n;
        if n & 0x4 == 0 {
            let base = match n & 0x3 {
                0 => true,
                1 => self.q,
                2 => self.d == 0,
                _ => self.df,
            };
            base ^ (n & 0x8 != 0)
        } else {
            match n {
                0x4 => false,
                0xC => self.ie,
                _ => {
                    let base = match n & 0x3 {
                        1 => self.q,
                        2 => self.d == 0,
                        _ => self.df,
                    };
                    base ^ (n & 0x8 == 0)
                }
            }
        }
    }

    fn next_state(&self, bus: &dyn CosmacBus) -> State {
        if bus.dma_request().is_some() {
            State::Dma
        } else if self.ie && bus.interrupt_requested() {
            State::Interrupt
        } else if self.idle {
            State::Execute
        } else {
            State::Fetch
        }
    }

    fn fetch(&mut self, bus: &mut dyn CosmacBus) {
        self.opcode_addr = self.pc();
        let op = self.immediate(bus);
        cpu_trace!("1802 {:04X}: {:02X} D={:02X}", self.opcode_addr, op, self.d);
        self.i = op >> 4;
        self.n = op & 0x0F;
        self.exec_cycle = 0;
        self.state = State::Execute;
    }

    /// Runs one S1 state. Returns true once the instruction has completed.
    fn execute(&mut self, bus: &mut dyn CosmacBus) -> Result<bool, EmuError> {
        let n = self.n as usize;
        match self.i {
            0x0 if n == 0 => {
                // IDL: M(R0) stays on the bus until DMA or an interrupt.
                self.idle = true;
            }
            0x0 => self.d = bus.read_byte(self.r[n]),
            0x1 => self.r[n] = self.r[n].wrapping_add(1),
            0x2 => self.r[n] = self.r[n].wrapping_sub(1),
            0x3 => {
                let target = bus.read_byte(self.pc());
                if self.short_condition(bus) {
                    let pc = self.pc();
                    *self.rp() = (pc & 0xFF00) | target as u16;
                } else {
                    *self.rp() = self.pc().wrapping_add(1);
                }
            }
            0x4 => {
                self.d = bus.read_byte(self.r[n]);
                self.r[n] = self.r[n].wrapping_add(1);
            }
            0x5 => bus.write_byte(self.r[n], self.d),
            0x6 => match n {
                0x0 => self.inc_rx(),
                0x1..=0x7 => {
                    let value = bus.read_byte(self.rx());
                    bus.output(self.n, value);
                    self.inc_rx();
                }
                0x8 => {
                    let next = bus.read_byte(self.pc());
                    return Err(EmuError::invalid_instruction(
                        Architecture::Cdp1802,
                        &[0x68, next],
                        self.opcode_addr,
                    ));
                }
                _ => {
                    let value = bus.input(self.n & 0x7);
                    bus.write_byte(self.rx(), value);
                    self.d = value;
                }
            },
            0x7 => self.execute_group_7(bus),
            0x8 => self.d = self.r[n] as u8,
            0x9 => self.d = (self.r[n] >> 8) as u8,
            0xA => self.r[n] = (self.r[n] & 0xFF00) | self.d as u16,
            0xB => self.r[n] = (self.r[n] & 0x00FF) | ((self.d as u16) << 8),
            0xC => return Ok(self.execute_long(bus)),
            0xD => self.p = self.n,
            0xE => self.x = self.n,
            _ => self.execute_group_f(bus),
        }
        Ok(true)
    }

    fn execute_group_7(&mut self, bus: &mut dyn CosmacBus) {
        match self.n {
            0x0 | 0x1 => {
                // RET / DIS
                let value = bus.read_byte(self.rx());
                self.inc_rx();
                self.x = value >> 4;
                self.p = value & 0x0F;
                self.ie = self.n == 0x0;
            }
            0x2 => {
                self.d = bus.read_byte(self.rx());
                self.inc_rx();
            }
            0x3 => {
                bus.write_byte(self.rx(), self.d);
                let x = self.x as usize;
                self.r[x] = self.r[x].wrapping_sub(1);
            }
            0x4 => {
                let m = bus.read_byte(self.rx());
                self.add(self.d, m, self.df);
            }
            0x5 => {
                let m = bus.read_byte(self.rx());
                self.subtract(m, self.d, self.df);
            }
            0x6 => {
                let carry = self.d & 0x01 != 0;
                self.d = (self.d >> 1) | ((self.df as u8) << 7);
                self.df = carry;
            }
            0x7 => {
                let m = bus.read_byte(self.rx());
                self.subtract(self.d, m, self.df);
            }
            0x8 => bus.write_byte(self.rx(), self.t),
            0x9 => {
                // MARK
                self.t = (self.x << 4) | self.p;
                bus.write_byte(self.r[2], self.t);
                self.x = self.p;
                self.r[2] = self.r[2].wrapping_sub(1);
            }
            0xA | 0xB => {
                self.q = self.n == 0xB;
                bus.set_q(self.q);
            }
            0xC => {
                let m = self.immediate(bus);
                self.add(self.d, m, self.df);
            }
            0xD => {
                let m = self.immediate(bus);
                self.subtract(m, self.d, self.df);
            }
            0xE => {
                let carry = self.d & 0x80 != 0;
                self.d = (self.d << 1) | self.df as u8;
                self.df = carry;
            }
            _ => {
                let m = self.immediate(bus);
                self.subtract(self.d, m, self.df);
            }
        }
    }

    /// `CN`: long branches and long skips, two S1 states.
    fn execute_long(&mut self, bus: &mut dyn CosmacBus) -> bool {
        let branch = self.n & 0x4 == 0;
        if self.exec_cycle == 0 {
            self.long_taken = self.long_condition();
            self.exec_cycle = 1;
            if branch {
                self.branch_latch = self.immediate(bus);
            } else if self.long_taken {
                *self.rp() = self.pc().wrapping_add(1);
            }
            return false;
        }

        if branch {
            let lo = bus.read_byte(self.pc());
            if self.long_taken {
                *self.rp() = ((self.branch_latch as u16) << 8) | lo as u16;
            } else {
                *self.rp() = self.pc().wrapping_add(1);
            }
        } else if self.long_taken {
            *self.rp() = self.pc().wrapping_add(1);
        }
        true
    }

    fn execute_group_f(&mut self, bus: &mut dyn CosmacBus) {
        let operand = match self.n {
            0x6 | 0xE => 0,
            0x0..=0x7 => bus.read_byte(self.rx()),
            _ => self.immediate(bus),
        };
        match self.n & 0x7 {
            0x0 => self.d = operand,
            0x1 => self.d |= operand,
            0x2 => self.d &= operand,
            0x3 => self.d ^= operand,
            0x4 => self.add(self.d, operand, false),
            0x5 => self.subtract(operand, self.d, true),
            0x6 => {
                if self.n == 0x6 {
                    self.df = self.d & 0x01 != 0;
                    self.d >>= 1;
                } else {
                    self.df = self.d & 0x80 != 0;
                    self.d <<= 1;
                }
            }
            _ => self.subtract(self.d, operand, true),
        }
    }

    fn dma(&mut self, bus: &mut dyn CosmacBus) {
        let addr = self.r[0];
        match bus.dma_request() {
            Some(Dma::Out) => {
                let value = bus.read_byte(addr);
                bus.dma_out(value);
            }
            Some(Dma::In) => {
                let value = bus.dma_in();
                bus.write_byte(addr, value);
            }
            None => return,
        }
        self.r[0] = addr.wrapping_add(1);
        self.idle = false;
    }

    fn interrupt(&mut self) {
        cpu_trace!("1802 interrupt X={:X} P={:X}", self.x, self.p);
        self.t = (self.x << 4) | self.p;
        self.x = 2;
        self.p = 1;
        self.ie = false;
        self.idle = false;
    }
}

impl Processor for Cdp1802 {
    type Bus = dyn CosmacBus;

    fn cycle(&mut self, bus: &mut Self::Bus) -> Result<MachinePhase, EmuError> {
        let phase = match self.state {
            State::Fetch => {
                self.fetch(bus);
                MachinePhase::Fetch
            }
            State::Execute => {
                let phase = if self.idle {
                    MachinePhase::Idle
                } else {
                    MachinePhase::Execute
                };
                let done = self.idle || self.execute(bus)?;
                if done {
                    self.state = self.next_state(bus);
                }
                phase
            }
            State::Dma => {
                self.dma(bus);
                self.state = self.next_state(bus);
                MachinePhase::Dma
            }
            State::Interrupt => {
                self.interrupt();
                self.state = if bus.dma_request().is_some() {
                    State::Dma
                } else {
                    State::Fetch
                };
                MachinePhase::Interrupt
            }
        };
        self.cycles += 1;
        Ok(phase)
    }

    fn reset(&mut self) {
        self.i = 0;
        self.n = 0;
        self.x = 0;
        self.p = 0;
        self.r[0] = 0;
        self.q = false;
        self.ie = true;
        self.state = State::Fetch;
        self.exec_cycle = 0;
        self.idle = false;
        self.cycles = 0;
    }

    fn instruction_pointer(&self) -> u16 {
        self.pc()
    }

    fn at_instruction_boundary(&self) -> bool {
        self.state == State::Fetch
    }

    fn cycles(&self) -> u64 {
        self.cycles
    }
}
