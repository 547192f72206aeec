//! Original Game Boy (DMG): SM83 core, mapper-less cartridge and the
//! on-board peripherals.

pub mod apu;
pub mod cartridge;
pub mod joypad;
pub mod mmu;
pub mod ppu;
pub mod serial;
pub mod timer;

use crate::audio::{AudioBuffer, AudioGenerator};
use crate::bus::BusView;
use crate::error::EmuError;
use crate::processor::{MachinePhase, Processor};
use crate::rom::Rom;
use crate::sm83::Sm83;
use crate::video::{VideoFrame, VideoGenerator};

pub use cartridge::Cartridge;
pub use joypad::Button;
pub use mmu::GameBoyBus;

/// 70 224 T-cycles per frame.
pub const CYCLES_PER_FRAME: u32 = 17_556;

pub struct GameBoySystem {
    pub cpu: Sm83,
    pub bus: GameBoyBus,
}

impl GameBoySystem {
    pub fn new(rom: Rom, sample_rate: u32) -> Result<Self, EmuError> {
        let cart = Cartridge::new(&rom)?;
        Ok(Self {
            cpu: Sm83::new(),
            bus: GameBoyBus::new(cart, sample_rate),
        })
    }

    pub fn title(&self) -> &str {
        &self.bus.cart.title
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.reset();
    }

    /// One SM83 M-cycle followed by four T-cycles of peripheral time.
    pub fn execute_cycle(&mut self) -> Result<MachinePhase, EmuError> {
        let phase = self.cpu.cycle(&mut self.bus)?;
        self.bus.tick();
        Ok(phase)
    }

    pub fn pull_video(&mut self) -> VideoFrame {
        self.bus.ppu.pull_frame()
    }

    pub fn pull_audio(&mut self) -> Option<AudioBuffer> {
        self.bus.apu.pull_samples()
    }

    pub fn take_serial(&mut self) -> Vec<u8> {
        self.bus.serial.take_output()
    }

    pub fn view(&self) -> &dyn BusView {
        &self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(program: &[u8]) -> GameBoySystem {
        let mut image = vec![0u8; 0x8000];
        image[0x0100..0x0100 + program.len()].copy_from_slice(program);
        GameBoySystem::new(Rom::from_bytes(image).unwrap(), 44_100).unwrap()
    }

    #[test]
    fn serial_output_from_program() {
        // LD A,'O'; LDH (01),A; LD A,$81; LDH (02),A; JR -2
        let mut gb = system(&[0x3E, b'O', 0xE0, 0x01, 0x3E, 0x81, 0xE0, 0x02, 0x18, 0xFE]);
        for _ in 0..64 {
            gb.execute_cycle().unwrap();
        }
        assert_eq!(gb.take_serial(), b"O");
    }

    #[test]
    fn one_frame_raises_vblank() {
        // EI; HALT; JR -3 with VBlank enabled and the vector returning
        let mut gb = system(&[0x3E, 0x01, 0xE0, 0xFF, 0xFB, 0x76, 0x18, 0xFD]);
        for _ in 0..CYCLES_PER_FRAME {
            gb.execute_cycle().unwrap();
        }
        assert_eq!(gb.bus.ppu.frames(), 1);
    }

    #[test]
    fn invalid_opcode_surfaces_as_error() {
        let mut gb = system(&[0xD3]);
        let err = gb.execute_cycle().unwrap_err();
        assert_eq!(err.to_string(), "SM83: invalid instruction D3 at $0100");
    }
}
