//! The systems the emulator can run, keyed by [`SystemId`].

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use log::debug;

use crate::emulator::{Emulator, EmulatorConfig, Machine};
use crate::error::{Architecture, EmuError};
use crate::gameboy::{self, GameBoySystem};
use crate::rom::Rom;
use crate::vip::{self, VipSystem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemId {
    CosmacVip,
    GameBoy,
}

impl SystemId {
    pub const ALL: [SystemId; 2] = [SystemId::CosmacVip, SystemId::GameBoy];

    pub fn as_str(self) -> &'static str {
        match self {
            SystemId::CosmacVip => "cosmac-vip",
            SystemId::GameBoy => "game-boy",
        }
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemId {
    type Err = EmuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        SystemId::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| EmuError::UnknownSystem(s.to_string()))
    }
}

type Factory = fn(Rom, &EmulatorConfig) -> Result<Machine, EmuError>;

#[derive(Debug, Clone)]
pub struct SystemDescriptor {
    pub id: SystemId,
    pub name: &'static str,
    pub architecture: Architecture,
    /// Nominal frames per second.
    pub framerate: u32,
    /// Processor machine cycles per video frame.
    pub cycles_per_frame: u32,
    /// ROM file extensions, lowercase, without the dot.
    pub extensions: &'static [&'static str],
    factory: Factory,
}

fn create_vip(rom: Rom, config: &EmulatorConfig) -> Result<Machine, EmuError> {
    VipSystem::new(rom, config.vip_ram_size, config.audio_sample_rate).map(Machine::Vip)
}

fn create_game_boy(rom: Rom, config: &EmulatorConfig) -> Result<Machine, EmuError> {
    GameBoySystem::new(rom, config.audio_sample_rate).map(Machine::GameBoy)
}

/// Built-in system table, constructed once by the frontend and passed around.
pub struct SystemRegistry {
    systems: Vec<SystemDescriptor>,
}

impl SystemRegistry {
    pub fn with_builtin() -> Self {
        Self {
            systems: vec![
                SystemDescriptor {
                    id: SystemId::CosmacVip,
                    name: "RCA COSMAC VIP",
                    architecture: Architecture::Cdp1802,
                    framerate: 60,
                    cycles_per_frame: vip::CYCLES_PER_FRAME,
                    extensions: &["ch8", "vip", "bin"],
                    factory: create_vip,
                },
                SystemDescriptor {
                    id: SystemId::GameBoy,
                    name: "Nintendo Game Boy",
                    architecture: Architecture::Sm83,
                    framerate: 60,
                    cycles_per_frame: gameboy::CYCLES_PER_FRAME,
                    extensions: &["gb"],
                    factory: create_game_boy,
                },
            ],
        }
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &SystemDescriptor> {
        self.systems.iter()
    }

    pub fn get(&self, id: SystemId) -> Option<&SystemDescriptor> {
        self.systems.iter().find(|d| d.id == id)
    }

    /// Picks a system from the ROM file's extension.
    pub fn detect(&self, path: &Path) -> Result<SystemId, EmuError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let id = self
            .systems
            .iter()
            .find(|d| d.extensions.contains(&ext.as_str()))
            .map(|d| d.id)
            .ok_or_else(|| {
                EmuError::UnknownSystem(format!("no system for ROM {}", path.display()))
            })?;
        debug!("Detected {id} from {}", path.display());
        Ok(id)
    }

    pub fn create(
        &self,
        id: SystemId,
        rom: Rom,
        config: &EmulatorConfig,
    ) -> Result<Emulator, EmuError> {
        let descriptor = self
            .get(id)
            .ok_or_else(|| EmuError::UnknownSystem(id.to_string()))?;
        let machine = (descriptor.factory)(rom, config)?;
        Ok(Emulator::new(descriptor, machine, config))
    }
}

impl Default for SystemRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
