//! Frame scheduler.
//!
//! [`Emulator::execute_frame`] runs one video frame's worth of machine
//! cycles and then pulls each generator once. Breakpoints can stop a frame
//! part way; the next call picks up where it stopped. In step mode frames are
//! gated off and the debugger drives [`Emulator::execute_cycle`] directly.

use log::{debug, error, info};

use crate::audio::AudioBuffer;
use crate::bus::BusView;
use crate::disassembler::{Disassembler, Entry};
use crate::error::{Architecture, EmuError};
use crate::gameboy::{Button, GameBoySystem};
use crate::processor::{MachinePhase, Processor};
use crate::registry::{SystemDescriptor, SystemId};
use crate::video::VideoFrame;
use crate::vip::VipSystem;

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorConfig {
    /// Overrides the system's nominal framerate.
    pub framerate: Option<u32>,
    pub frame_skip: bool,
    pub force_initial_frame: bool,
    pub audio_sample_rate: u32,
    pub vip_ram_size: usize,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            framerate: None,
            frame_skip: true,
            force_initial_frame: true,
            audio_sample_rate: DEFAULT_SAMPLE_RATE,
            vip_ram_size: crate::vip::bus::DEFAULT_RAM_SIZE,
        }
    }
}

/// One machine per supported architecture.
pub enum Machine {
    Vip(VipSystem),
    GameBoy(GameBoySystem),
}

impl Machine {
    pub fn architecture(&self) -> Architecture {
        match self {
            Machine::Vip(_) => Architecture::Cdp1802,
            Machine::GameBoy(_) => Architecture::Sm83,
        }
    }

    pub fn execute_cycle(&mut self) -> Result<MachinePhase, EmuError> {
        match self {
            Machine::Vip(vip) => vip.execute_cycle(),
            Machine::GameBoy(gb) => gb.execute_cycle(),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Machine::Vip(vip) => vip.reset(),
            Machine::GameBoy(gb) => gb.reset(),
        }
    }

    pub fn pull_video(&mut self) -> VideoFrame {
        match self {
            Machine::Vip(vip) => vip.pull_video(),
            Machine::GameBoy(gb) => gb.pull_video(),
        }
    }

    pub fn pull_audio(&mut self) -> Option<AudioBuffer> {
        match self {
            Machine::Vip(vip) => vip.pull_audio(),
            Machine::GameBoy(gb) => gb.pull_audio(),
        }
    }

    pub fn view(&self) -> &dyn BusView {
        match self {
            Machine::Vip(vip) => vip.view(),
            Machine::GameBoy(gb) => gb.view(),
        }
    }

    pub fn instruction_pointer(&self) -> u16 {
        match self {
            Machine::Vip(vip) => vip.cpu.instruction_pointer(),
            Machine::GameBoy(gb) => gb.cpu.instruction_pointer(),
        }
    }

    pub fn at_instruction_boundary(&self) -> bool {
        match self {
            Machine::Vip(vip) => vip.cpu.at_instruction_boundary(),
            Machine::GameBoy(gb) => gb.cpu.at_instruction_boundary(),
        }
    }

    pub fn cpu_state(&self) -> String {
        match self {
            Machine::Vip(vip) => vip.cpu.debug_state(),
            Machine::GameBoy(gb) => gb.cpu.debug_state(),
        }
    }
}

/// Output of a completed frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub video: VideoFrame,
    /// `None` when the audio hardware stayed silent for the whole frame.
    pub audio: Option<AudioBuffer>,
}

#[derive(Debug, Clone)]
pub enum FrameOutcome {
    Completed(Frame),
    /// Execution stopped before the instruction at `address`.
    Breakpoint { address: u16 },
    /// Step mode is on; nothing ran.
    Gated,
}

pub struct Emulator {
    id: SystemId,
    machine: Machine,
    framerate: u32,
    cycles_per_frame: u32,
    disassembler: Disassembler,
    stepping: bool,
    /// Machine cycles already run in the current frame.
    frame_cycles: u32,
    frame_instructions: u32,
    instructions_per_frame: u32,
    frames: u64,
    fault: Option<String>,
    /// Breakpoint already reported; the next call runs its instruction.
    resume_from: Option<u16>,
}

impl Emulator {
    pub fn new(descriptor: &SystemDescriptor, machine: Machine, config: &EmulatorConfig) -> Self {
        let framerate = config.framerate.unwrap_or(descriptor.framerate);
        info!("Starting {} at {framerate} fps", descriptor.name);
        Self {
            id: descriptor.id,
            disassembler: Disassembler::new(machine.architecture()),
            machine,
            framerate,
            cycles_per_frame: descriptor.cycles_per_frame,
            stepping: false,
            frame_cycles: 0,
            frame_instructions: 0,
            instructions_per_frame: 0,
            frames: 0,
            fault: None,
            resume_from: None,
        }
    }

    pub fn system(&self) -> SystemId {
        self.id
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    pub fn get_framerate(&self) -> u32 {
        self.framerate
    }

    pub fn cycles_per_frame(&self) -> u32 {
        self.cycles_per_frame
    }

    /// Instructions completed during the last full frame.
    pub fn get_current_instructions_per_frame(&self) -> u32 {
        self.instructions_per_frame
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    pub fn is_stepping(&self) -> bool {
        self.stepping
    }

    pub fn set_stepping(&mut self, stepping: bool) {
        if self.stepping != stepping {
            debug!("Step mode {}", if stepping { "on" } else { "off" });
        }
        self.stepping = stepping;
    }

    pub fn disassembler(&self) -> &Disassembler {
        &self.disassembler
    }

    pub fn disassembler_mut(&mut self) -> &mut Disassembler {
        &mut self.disassembler
    }

    /// Disassembles `count` rows around the program counter.
    pub fn listing_around_pc(&mut self, before: usize, count: usize) -> Vec<Entry> {
        let pc = self.machine.instruction_pointer();
        self.disassembler.sync_to(pc);
        self.disassembler
            .listing_around(self.machine.view(), pc, before, count)
    }

    /// Listing row `ordinal`, decoding up to it as needed.
    pub fn get_entry(&mut self, ordinal: usize) -> Option<Entry> {
        self.disassembler.sync_to(self.machine.instruction_pointer());
        self.disassembler.get_entry(self.machine.view(), ordinal)
    }

    /// Row holding the instruction that starts at `address`, if any does.
    pub fn get_ordinal_for_address(&mut self, address: u16) -> Option<usize> {
        self.disassembler.sync_to(self.machine.instruction_pointer());
        self.disassembler
            .get_ordinal_for_address(self.machine.view(), address)
    }

    pub fn instruction_pointer(&self) -> u16 {
        self.machine.instruction_pointer()
    }

    pub fn cpu_state(&self) -> String {
        self.machine.cpu_state()
    }

    pub fn view(&self) -> &dyn BusView {
        self.machine.view()
    }

    pub fn reset(&mut self) {
        info!("Reset {}", self.id);
        self.machine.reset();
        self.disassembler.invalidate();
        self.frame_cycles = 0;
        self.frame_instructions = 0;
        self.instructions_per_frame = 0;
        self.fault = None;
        self.resume_from = None;
    }

    fn check_fault(&self) -> Result<(), EmuError> {
        match &self.fault {
            Some(message) => Err(EmuError::Faulted(message.clone())),
            None => Ok(()),
        }
    }

    /// Runs one machine cycle and does the per-cycle bookkeeping. Returns
    /// true when the cycle finished the current frame.
    fn step(&mut self) -> Result<(MachinePhase, bool), EmuError> {
        let phase = self.machine.execute_cycle().inspect_err(|err| {
            error!("{err}");
            self.fault = Some(err.to_string());
        })?;
        if matches!(phase, MachinePhase::Fetch | MachinePhase::Interrupt) {
            self.resume_from = None;
        }
        if self.machine.at_instruction_boundary() {
            self.frame_instructions += 1;
        }
        self.frame_cycles += 1;
        let frame_done = self.frame_cycles >= self.cycles_per_frame;
        if frame_done {
            self.frame_cycles = 0;
            self.instructions_per_frame = self.frame_instructions;
            self.frame_instructions = 0;
            self.frames += 1;
        }
        Ok((phase, frame_done))
    }

    /// Runs the rest of the current frame.
    pub fn execute_frame(&mut self) -> Result<FrameOutcome, EmuError> {
        self.check_fault()?;
        if self.stepping {
            return Ok(FrameOutcome::Gated);
        }
        let check_breakpoints = self.disassembler.has_breakpoints();
        loop {
            if check_breakpoints && self.machine.at_instruction_boundary() {
                let address = self.machine.instruction_pointer();
                if self.resume_from != Some(address)
                    && self.disassembler.has_breakpoint(address)
                {
                    info!("Breakpoint at ${address:04X}");
                    self.resume_from = Some(address);
                    return Ok(FrameOutcome::Breakpoint { address });
                }
            }
            let (_, frame_done) = self.step()?;
            if frame_done {
                return Ok(FrameOutcome::Completed(Frame {
                    video: self.machine.pull_video(),
                    audio: self.machine.pull_audio(),
                }));
            }
        }
    }

    /// Runs a single machine cycle. Only allowed in step mode; returns
    /// `None` while free-running.
    pub fn execute_cycle(&mut self) -> Result<Option<MachinePhase>, EmuError> {
        self.check_fault()?;
        if !self.stepping {
            return Ok(None);
        }
        let (phase, _) = self.step()?;
        Ok(Some(phase))
    }

    /// Runs machine cycles until the processor reaches the next instruction
    /// boundary. Returns the number of cycles run, 0 while free-running.
    pub fn step_instruction(&mut self) -> Result<u32, EmuError> {
        let mut cycles = 0;
        while self.execute_cycle()?.is_some() {
            cycles += 1;
            if self.machine.at_instruction_boundary() {
                break;
            }
        }
        Ok(cycles)
    }

    /// Frame the video generator completed most recently.
    pub fn pull_video(&mut self) -> VideoFrame {
        self.machine.pull_video()
    }

    pub fn pull_audio(&mut self) -> Option<AudioBuffer> {
        self.machine.pull_audio()
    }

    /// VIP hex keypad. Returns false on systems without one.
    pub fn set_key(&mut self, key: u8, pressed: bool) -> bool {
        match &mut self.machine {
            Machine::Vip(vip) => {
                vip.bus.keypad.set_key(key, pressed);
                true
            }
            Machine::GameBoy(_) => false,
        }
    }

    /// VIP IN button.
    pub fn set_in_button(&mut self, pressed: bool) -> bool {
        match &mut self.machine {
            Machine::Vip(vip) => {
                vip.bus.keypad.set_in_button(pressed);
                true
            }
            Machine::GameBoy(_) => false,
        }
    }

    /// Game Boy joypad. Returns false on systems without one.
    pub fn set_button(&mut self, button: Button, pressed: bool) -> bool {
        match &mut self.machine {
            Machine::GameBoy(gb) => {
                gb.bus.set_button(button, pressed);
                true
            }
            Machine::Vip(_) => false,
        }
    }

    /// Bytes sent over the Game Boy serial port since the last call.
    pub fn take_serial(&mut self) -> Vec<u8> {
        match &mut self.machine {
            Machine::GameBoy(gb) => gb.take_serial(),
            Machine::Vip(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SystemRegistry;
    use crate::rom::Rom;

    fn vip(program: Vec<u8>) -> Emulator {
        SystemRegistry::with_builtin()
            .create(
                SystemId::CosmacVip,
                Rom::from_bytes(program).unwrap(),
                &EmulatorConfig::default(),
            )
            .unwrap()
    }

    #[test]
    fn branch_loop_counts_instructions() {
        // BR $00 forever: 2 machine cycles per instruction.
        let mut emu = vip(vec![0x30, 0x00]);
        let outcome = emu.execute_frame().unwrap();
        assert!(matches!(outcome, FrameOutcome::Completed(_)));
        assert_eq!(emu.frames(), 1);
        assert_eq!(emu.get_current_instructions_per_frame(), 3_668 / 2);
        assert_eq!(emu.instruction_pointer(), 0x0000);
    }

    #[test]
    fn breakpoint_stops_mid_frame_and_resumes() {
        // $00: SEQ  $01: REQ  $02: BR $00
        let mut emu = vip(vec![0x7B, 0x7A, 0x30, 0x00]);
        emu.disassembler_mut().add_breakpoint(0x0002);

        let FrameOutcome::Breakpoint { address } = emu.execute_frame().unwrap() else {
            panic!("expected breakpoint");
        };
        assert_eq!(address, 0x0002);
        assert_eq!(emu.instruction_pointer(), 0x0002);

        // Resuming executes the branch and stops again one loop later.
        let FrameOutcome::Breakpoint { .. } = emu.execute_frame().unwrap() else {
            panic!("expected breakpoint");
        };
        assert_eq!(emu.frames(), 0);

        emu.disassembler_mut().clear_breakpoints();
        assert!(matches!(
            emu.execute_frame().unwrap(),
            FrameOutcome::Completed(_)
        ));
        assert_eq!(emu.frames(), 1);
    }

    #[test]
    fn breakpoint_on_entry_instruction() {
        // $00: SEQ  $01: BR $01
        let mut emu = vip(vec![0x7B, 0x30, 0x01]);
        emu.disassembler_mut().add_breakpoint(0x0000);

        let FrameOutcome::Breakpoint { address } = emu.execute_frame().unwrap() else {
            panic!("expected breakpoint");
        };
        assert_eq!(address, 0x0000);
        assert_eq!(emu.instruction_pointer(), 0x0000);

        // The stopped instruction runs once; the loop never comes back to it.
        assert!(matches!(
            emu.execute_frame().unwrap(),
            FrameOutcome::Completed(_)
        ));
        assert_eq!(emu.instruction_pointer(), 0x0001);
    }

    #[test]
    fn breakpoint_on_frame_boundary() {
        // 1834 SEQs fill one frame exactly, so the REQ after them starts
        // the second frame.
        let mut program = vec![0x7B; 3_668 / 2];
        let req = program.len() as u16;
        program.extend([0x7A, 0x30, (req + 1) as u8]);
        let mut emu = vip(program);
        emu.disassembler_mut().add_breakpoint(req);

        assert!(matches!(
            emu.execute_frame().unwrap(),
            FrameOutcome::Completed(_)
        ));
        assert_eq!(emu.instruction_pointer(), req);

        let FrameOutcome::Breakpoint { address } = emu.execute_frame().unwrap() else {
            panic!("expected breakpoint");
        };
        assert_eq!(address, req);
        assert!(matches!(
            emu.execute_frame().unwrap(),
            FrameOutcome::Completed(_)
        ));
        assert_eq!(emu.instruction_pointer(), req + 1);
    }

    #[test]
    fn listing_queries_invert() {
        // LDI $10, SEQ, LBR $0000, REQ
        let mut emu = vip(vec![0xF8, 0x10, 0x7B, 0xC0, 0x00, 0x00, 0x7A]);
        let mut ordinal = 0;
        while let Some(entry) = emu.get_entry(ordinal) {
            assert_eq!(emu.get_ordinal_for_address(entry.address), Some(ordinal));
            ordinal += 1;
        }
        assert!(ordinal > 4);
        assert_eq!(emu.get_entry(2).unwrap().text, "LBR $0000");
        assert_eq!(emu.get_ordinal_for_address(0x0006), Some(3));
        // Inside the LBR operand.
        assert_eq!(emu.get_ordinal_for_address(0x0004), None);
    }

    #[test]
    fn step_mode_gates_frames() {
        let mut emu = vip(vec![0x30, 0x00]);
        assert_eq!(emu.execute_cycle().unwrap(), None);

        emu.set_stepping(true);
        assert!(matches!(emu.execute_frame().unwrap(), FrameOutcome::Gated));
        assert_eq!(emu.execute_cycle().unwrap(), Some(MachinePhase::Fetch));
        assert_eq!(emu.step_instruction().unwrap(), 1);
        assert_eq!(emu.step_instruction().unwrap(), 2);
    }

    #[test]
    fn invalid_instruction_faults_until_reset() {
        // 0x68 is the 1804 extension prefix.
        let mut emu = vip(vec![0x68, 0x00]);
        let err = emu.execute_frame().unwrap_err();
        assert!(matches!(err, EmuError::InvalidInstruction { .. }));
        assert!(emu.is_faulted());
        assert!(matches!(emu.execute_frame(), Err(EmuError::Faulted(_))));

        emu.reset();
        assert!(!emu.is_faulted());
    }

    #[test]
    fn input_routes_to_the_right_machine() {
        let mut emu = vip(vec![0x30, 0x00]);
        assert!(emu.set_key(0x0A, true));
        assert!(!emu.set_button(Button::Start, true));
        assert!(emu.take_serial().is_empty());
    }
}
