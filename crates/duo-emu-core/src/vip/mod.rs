//! RCA COSMAC VIP: a CDP1802 with 4 KiB of RAM, a CDP1861 video chip, a
//! hex keypad and a Q-driven beeper.

pub mod bus;
pub mod keypad;
pub mod pixie;
pub mod tone;

use log::info;

use crate::audio::{AudioBuffer, AudioGenerator};
use crate::bus::BusView;
use crate::cdp1802::Cdp1802;
use crate::error::EmuError;
use crate::processor::{MachinePhase, Processor};
use crate::rom::Rom;
use crate::video::{VideoFrame, VideoGenerator};

pub use bus::VipBus;
pub use pixie::CYCLES_PER_FRAME;

pub struct VipSystem {
    pub cpu: Cdp1802,
    pub bus: VipBus,
    program: Rom,
}

impl VipSystem {
    pub fn new(program: Rom, ram_size: usize, sample_rate: u32) -> Result<Self, EmuError> {
        let bus = VipBus::new(ram_size, sample_rate);
        if program.len() > bus.ram_size() {
            return Err(EmuError::RomTooLarge {
                size: program.len(),
                capacity: bus.ram_size(),
            });
        }
        info!(
            "COSMAC VIP: {} byte program, {} KiB RAM",
            program.len(),
            bus.ram_size() / 1024
        );
        let mut system = Self {
            cpu: Cdp1802::new(),
            bus,
            program,
        };
        system.reset();
        Ok(system)
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.reset_peripherals();
        self.bus.load_program(self.program.data());
    }

    /// One CDP1802 machine cycle followed by one peripheral clock.
    pub fn execute_cycle(&mut self) -> Result<MachinePhase, EmuError> {
        let phase = self.cpu.cycle(&mut self.bus)?;
        self.bus.end_cycle();
        Ok(phase)
    }

    pub fn pull_video(&mut self) -> VideoFrame {
        self.bus.pixie.pull_frame()
    }

    pub fn pull_audio(&mut self) -> Option<AudioBuffer> {
        self.bus.tone.pull_samples()
    }

    pub fn view(&self) -> &dyn BusView {
        &self.bus
    }
}
