use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Processor architectures implemented by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    Cdp1802,
    Sm83,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::Cdp1802 => f.write_str("CDP1802"),
            Architecture::Sm83 => f.write_str("SM83"),
        }
    }
}

/// Raw opcode bytes, displayed as space separated hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeBytes(pub Vec<u8>);

impl fmt::Display for OpcodeBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum EmuError {
    #[error("{arch}: invalid instruction {opcode} at ${address:04X}")]
    InvalidInstruction {
        arch: Architecture,
        opcode: OpcodeBytes,
        address: u16,
    },

    #[error("failed to read ROM {}: {source}", path.display())]
    RomRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ROM image is empty")]
    EmptyRom,

    #[error("ROM image of {size} bytes exceeds the {capacity} bytes this system can address")]
    RomTooLarge { size: usize, capacity: usize },

    #[error("unknown system: {0}")]
    UnknownSystem(String),

    #[error("emulator is stopped after an earlier fault ({0}); reset to continue")]
    Faulted(String),
}

impl EmuError {
    pub(crate) fn invalid_instruction(arch: Architecture, opcode: &[u8], address: u16) -> Self {
        EmuError::InvalidInstruction {
            arch,
            opcode: OpcodeBytes(opcode.to_vec()),
            address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_instruction_names_arch_and_bytes() {
        let err = EmuError::invalid_instruction(Architecture::Sm83, &[0xD3], 0x0150);
        assert_eq!(err.to_string(), "SM83: invalid instruction D3 at $0150");

        let err = EmuError::invalid_instruction(Architecture::Cdp1802, &[0x68, 0x0F], 0x0002);
        assert_eq!(err.to_string(), "CDP1802: invalid instruction 68 0F at $0002");
    }
}
