use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;

use crate::error::EmuError;

/// Immutable ROM image shared between the machine and any debugger views.
#[derive(Debug, Clone)]
pub struct Rom {
    data: Arc<[u8]>,
    path: Option<PathBuf>,
}

impl Rom {
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Result<Self, EmuError> {
        let data: Vec<u8> = data.into();
        if data.is_empty() {
            return Err(EmuError::EmptyRom);
        }
        Ok(Self {
            data: data.into(),
            path: None,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EmuError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| EmuError::RomRead {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded ROM {} ({} bytes)", path.display(), data.len());
        let mut rom = Self::from_bytes(data)?;
        rom.path = Some(path.to_path_buf());
        Ok(rom)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
