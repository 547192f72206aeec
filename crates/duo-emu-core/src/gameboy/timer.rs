//! DIV/TIMA/TMA/TAC.
//!
//! TIMA increments on the falling edge of the selected divider bit ANDed
//! with the enable bit, so writes to DIV or TAC can produce a spurious tick.

/// Divider bit feeding TIMA for each TAC clock select.
const TAC_BITS: [u16; 4] = [9, 3, 5, 7];

/// T-cycles between TIMA overflow and the TMA reload.
const RELOAD_DELAY: u8 = 4;

pub struct Timer {
    /// Internal 16-bit divider; DIV is the upper byte.
    pub div: u16,
    pub tima: u8,
    pub tma: u8,
    pub tac: u8,
    last_signal: bool,
    /// Counts down after an overflow while TIMA reads 0.
    reload_delay: u8,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            div: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            last_signal: false,
            reload_delay: 0,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF04 => (self.div >> 8) as u8,
            0xFF05 => self.tima,
            0xFF06 => self.tma,
            0xFF07 => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8, if_reg: &mut u8) {
        match addr {
            0xFF04 => self.reset_div(if_reg),
            0xFF05 => {
                // A write during the reload window cancels the reload.
                self.tima = val;
                self.reload_delay = 0;
            }
            0xFF06 => self.tma = val,
            0xFF07 => {
                self.tac = val & 0x07;
                self.update_signal();
            }
            _ => {}
        }
    }

    /// Advances `cycles` T-cycles, raising the timer interrupt in `if_reg`.
    pub fn step(&mut self, cycles: u16, if_reg: &mut u8) {
        for _ in 0..cycles {
            if self.reload_delay > 0 {
                self.reload_delay -= 1;
                if self.reload_delay == 0 {
                    self.tima = self.tma;
                    *if_reg |= 0x04;
                }
            }
            self.div = self.div.wrapping_add(1);
            self.update_signal();
        }
    }

    pub fn reset_div(&mut self, _if_reg: &mut u8) {
        self.div = 0;
        self.update_signal();
    }

    fn signal(&self) -> bool {
        self.tac & 0x04 != 0 && (self.div >> TAC_BITS[(self.tac & 0x03) as usize]) & 1 != 0
    }

    fn update_signal(&mut self) {
        let new = self.signal();
        if self.last_signal && !new {
            self.increment();
        }
        self.last_signal = new;
    }

    fn increment(&mut self) {
        if self.tima == 0xFF {
            self.tima = 0;
            self.reload_delay = RELOAD_DELAY;
        } else {
            self.tima += 1;
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
