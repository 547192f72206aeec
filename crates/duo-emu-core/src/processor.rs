use crate::error::EmuError;

/// What a processor spent its last machine cycle on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachinePhase {
    /// Opcode fetch (CDP1802 S0, first M-cycle of an SM83 instruction).
    Fetch,
    /// Instruction execution.
    Execute,
    /// A DMA transfer stole the cycle.
    Dma,
    /// Interrupt entry.
    Interrupt,
    /// Halted, stopped or idling until an interrupt or DMA request.
    Idle,
}

/// Capability interface shared by the processor cores.
///
/// A core is driven one machine cycle at a time against the bus flavor its
/// architecture needs (`Self::Bus`).
pub trait Processor {
    type Bus: ?Sized;

    /// Advances exactly one machine cycle.
    fn cycle(&mut self, bus: &mut Self::Bus) -> Result<MachinePhase, EmuError>;

    fn reset(&mut self);

    /// Address of the next instruction to be fetched.
    fn instruction_pointer(&self) -> u16;

    /// True when the next `cycle` call starts a new instruction.
    fn at_instruction_boundary(&self) -> bool;

    /// Machine cycles executed since construction or reset.
    fn cycles(&self) -> u64;
}
