use log::{debug, trace, warn};

use super::keypad::Keypad;
use super::pixie::Pixie;
use super::tone::Tone;
use crate::bus::{Bus, BusView};
use crate::cdp1802::{CosmacBus, Dma};

pub const MONITOR_SIZE: usize = 0x200;
pub const MAX_RAM_SIZE: usize = 0x8000;
pub const DEFAULT_RAM_SIZE: usize = 0x1000;

/// VIP address space: RAM mirrored across the lower half, the monitor ROM
/// window mirrored across the upper half.
pub struct VipBus {
    ram: Vec<u8>,
    ram_mask: u16,
    monitor: Box<[u8; MONITOR_SIZE]>,
    pub pixie: Pixie,
    pub keypad: Keypad,
    pub tone: Tone,
}

impl VipBus {
    /// `ram_size` is rounded up to a power of two and clamped to 32 KiB.
    pub fn new(ram_size: usize, sample_rate: u32) -> Self {
        let size = ram_size.clamp(1, MAX_RAM_SIZE).next_power_of_two();
        Self {
            ram: vec![0; size],
            ram_mask: (size - 1) as u16,
            monitor: Box::new([0; MONITOR_SIZE]),
            pixie: Pixie::new(),
            keypad: Keypad::new(),
            tone: Tone::new(sample_rate),
        }
    }

    pub fn ram_size(&self) -> usize {
        self.ram.len()
    }

    pub fn load_monitor(&mut self, image: &[u8]) {
        let len = image.len().min(MONITOR_SIZE);
        self.monitor[..len].copy_from_slice(&image[..len]);
        if image.len() > MONITOR_SIZE {
            warn!(
                "Monitor image truncated from {} to {MONITOR_SIZE} bytes",
                image.len()
            );
        }
    }

    /// Clears RAM and copies `program` to address 0.
    pub fn load_program(&mut self, program: &[u8]) {
        self.ram.fill(0);
        let len = program.len().min(self.ram.len());
        self.ram[..len].copy_from_slice(&program[..len]);
    }

    pub fn reset_peripherals(&mut self) {
        self.pixie.reset();
        self.keypad = Keypad::new();
        self.tone.reset();
    }

    /// Clocks the peripherals once after the processor's machine cycle.
    pub fn end_cycle(&mut self) {
        self.pixie.advance();
        self.tone.tick();
    }
}

impl BusView for VipBus {
    fn read_byte(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF => self.ram[(addr & self.ram_mask) as usize],
            0x8000..=0xFFFF => self.monitor[(addr & 0x01FF) as usize],
        }
    }

    fn memory_size(&self) -> usize {
        self.ram.len()
    }

    fn memory_bounds_mask(&self) -> u16 {
        self.ram_mask
    }
}

impl Bus for VipBus {
    fn write_byte(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x7FFF => self.ram[(addr & self.ram_mask) as usize] = value,
            0x8000..=0xFFFF => trace!("Write to monitor ROM {addr:04X} <- {value:02X}"),
        }
    }
}

impl CosmacBus for VipBus {
    fn flag_lines(&self) -> u8 {
        (self.pixie.ef1() as u8)
            | ((self.keypad.key_line() as u8) << 2)
            | ((self.keypad.in_line() as u8) << 3)
    }

    fn interrupt_requested(&self) -> bool {
        self.pixie.interrupt()
    }

    fn dma_request(&self) -> Option<Dma> {
        self.pixie.dma_request().then_some(Dma::Out)
    }

    fn dma_out(&mut self, value: u8) {
        trace!("DMA out {value:02X} on line {}", self.pixie.line());
        self.pixie.dma_byte(value);
    }

    fn output(&mut self, port: u8, value: u8) {
        match port {
            1 => self.pixie.set_enabled(false),
            2 => self.keypad.latch(value),
            _ => debug!("Unmapped OUT {port} <- {value:02X}"),
        }
    }

    fn input(&mut self, port: u8) -> u8 {
        match port {
            1 => {
                self.pixie.set_enabled(true);
                0xFF
            }
            _ => {
                debug!("Unmapped INP {port}");
                0xFF
            }
        }
    }

    fn set_q(&mut self, q: bool) {
        self.tone.set_q(q);
    }
}
