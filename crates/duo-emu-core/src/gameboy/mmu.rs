use log::{debug, trace};

use super::apu::Apu;
use super::cartridge::Cartridge;
use super::joypad::{Button, Joypad};
use super::ppu::{OAM_SIZE, Ppu};
use super::serial::Serial;
use super::timer::Timer;
use crate::bus::{Bus, BusView};
use crate::sm83::Sm83Bus;

const WRAM_SIZE: usize = 0x2000;
const HRAM_SIZE: usize = 0x7F;

/// Divider value the DMG boot ROM leaves behind.
const BOOT_DIV: u16 = 0xABCC;

/// DMG memory map.
pub struct GameBoyBus {
    pub cart: Cartridge,
    wram: Box<[u8; WRAM_SIZE]>,
    hram: [u8; HRAM_SIZE],
    pub ie: u8,
    pub if_reg: u8,
    pub ppu: Ppu,
    pub apu: Apu,
    pub timer: Timer,
    pub joypad: Joypad,
    pub serial: Serial,
    sample_rate: u32,
}

impl GameBoyBus {
    pub fn new(cart: Cartridge, sample_rate: u32) -> Self {
        let mut bus = Self {
            cart,
            wram: Box::new([0; WRAM_SIZE]),
            hram: [0; HRAM_SIZE],
            ie: 0,
            if_reg: 0,
            ppu: Ppu::new(),
            apu: Apu::new(sample_rate),
            timer: Timer::new(),
            joypad: Joypad::new(),
            serial: Serial::new(),
            sample_rate,
        };
        bus.reset();
        bus
    }

    /// Clears work RAM and puts the I/O registers in their post-boot state.
    /// Cartridge RAM survives.
    pub fn reset(&mut self) {
        self.wram.fill(0);
        self.hram = [0; HRAM_SIZE];
        self.ie = 0;
        self.if_reg = 0x01;
        self.ppu = Ppu::new();
        self.ppu.apply_boot_state();
        self.apu = Apu::new(self.sample_rate);
        self.apu.apply_boot_state();
        self.timer = Timer::new();
        self.timer.div = BOOT_DIV;
        self.joypad = Joypad::new();
        self.serial = Serial::new();
    }

    /// Steps every peripheral by one M-cycle.
    pub fn tick(&mut self) {
        let div = self.timer.div;
        self.timer.step(4, &mut self.if_reg);
        self.ppu.step(4, &mut self.if_reg);
        self.apu.step(4, div);
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        if self.joypad.set_button(button, pressed) {
            self.if_reg |= 0x10;
        }
    }

    /// Copies 160 bytes from `page << 8` into OAM at once.
    fn oam_dma(&mut self, page: u8) {
        // Sources past WRAM read through the echo region.
        let page = if page >= 0xE0 { page - 0x20 } else { page };
        let base = (page as u16) << 8;
        trace!("OAM DMA from {base:04X}");
        for i in 0..OAM_SIZE as u16 {
            self.ppu.oam[i as usize] = self.read_byte(base + i);
        }
    }

    fn read_io(&self, addr: u16) -> u8 {
        match addr {
            0xFF00 => self.joypad.read(),
            0xFF01 | 0xFF02 => self.serial.read(addr),
            0xFF04..=0xFF07 => self.timer.read(addr),
            0xFF0F => self.if_reg | 0xE0,
            0xFF10..=0xFF3F => self.apu.read_reg(addr),
            0xFF40..=0xFF4B => self.ppu.read_reg(addr),
            _ => 0xFF,
        }
    }

    fn write_io(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF00 => self.joypad.write(val),
            0xFF01 | 0xFF02 => self.serial.write(addr, val, &mut self.if_reg),
            0xFF04 => {
                let div = self.timer.div;
                self.timer.reset_div(&mut self.if_reg);
                self.apu.div_reset(div);
            }
            0xFF05..=0xFF07 => self.timer.write(addr, val, &mut self.if_reg),
            0xFF0F => self.if_reg = val & 0x1F,
            0xFF10..=0xFF3F => self.apu.write_reg(addr, val),
            0xFF46 => {
                self.ppu.write_reg(addr, val);
                self.oam_dma(val);
            }
            0xFF40..=0xFF4B => self.ppu.write_reg(addr, val),
            _ => debug!("Unmapped I/O write {addr:04X} <- {val:02X}"),
        }
    }
}

impl BusView for GameBoyBus {
    fn read_byte(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF => self.cart.read_rom(addr),
            0x8000..=0x9FFF => self.ppu.vram[(addr & 0x1FFF) as usize],
            0xA000..=0xBFFF => self.cart.read_ram(addr),
            0xC000..=0xDFFF => self.wram[(addr & 0x1FFF) as usize],
            0xE000..=0xFDFF => self.wram[(addr & 0x1FFF) as usize],
            0xFE00..=0xFE9F => self.ppu.oam[(addr & 0x00FF) as usize],
            0xFEA0..=0xFEFF => 0xFF,
            0xFF00..=0xFF7F => self.read_io(addr),
            0xFF80..=0xFFFE => self.hram[(addr & 0x007F) as usize],
            0xFFFF => self.ie,
        }
    }
}

impl Bus for GameBoyBus {
    fn write_byte(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF => trace!("Write to ROM {addr:04X} <- {val:02X}"),
            0x8000..=0x9FFF => self.ppu.vram[(addr & 0x1FFF) as usize] = val,
            0xA000..=0xBFFF => self.cart.write_ram(addr, val),
            0xC000..=0xDFFF => self.wram[(addr & 0x1FFF) as usize] = val,
            0xE000..=0xFDFF => self.wram[(addr & 0x1FFF) as usize] = val,
            0xFE00..=0xFE9F => self.ppu.oam[(addr & 0x00FF) as usize] = val,
            0xFEA0..=0xFEFF => {}
            0xFF00..=0xFF7F => self.write_io(addr, val),
            0xFF80..=0xFFFE => self.hram[(addr & 0x007F) as usize] = val,
            0xFFFF => self.ie = val,
        }
    }
}

impl Sm83Bus for GameBoyBus {
    fn pending_interrupts(&self) -> u8 {
        self.ie & self.if_reg & 0x1F
    }

    fn acknowledge_interrupt(&mut self, bit: u8) {
        self.if_reg &= !bit;
    }

    fn stop(&mut self) {
        let div = self.timer.div;
        self.timer.reset_div(&mut self.if_reg);
        self.apu.div_reset(div);
    }

    fn joypad_wake(&self) -> bool {
        self.joypad.any_pressed()
    }
}
