use std::io;
use std::path::PathBuf;

use duo_emu_core::error::EmuError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Emu(#[from] EmuError),

    #[error("failed to parse config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to start {name} thread: {source}")]
    Thread {
        name: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode PNG: {0}")]
    Png(#[from] png::EncodingError),

    #[error("invalid address {0:?}; expected hex like 0150, $0150 or 0x0150")]
    Address(String),
}
