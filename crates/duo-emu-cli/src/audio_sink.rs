//! Consumes converted audio on its own thread so the emulation loop never
//! blocks on output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam_channel as cb;
use duo_emu_core::audio::i16_to_le_bytes;
use log::{debug, warn};

use crate::error::CliError;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SinkStats {
    /// Interleaved stereo sample pairs received.
    pub frames: u64,
    /// Batches dropped because the sink fell behind.
    pub dropped: u64,
}

pub struct AudioSink {
    tx: Option<cb::Sender<Vec<i16>>>,
    handle: Option<JoinHandle<Result<u64, CliError>>>,
    dropped: u64,
}

impl AudioSink {
    /// Starts the sink thread. With `out` set, samples are appended to that
    /// file as raw signed 16-bit little-endian stereo.
    pub fn spawn(capacity: usize, out: Option<&Path>) -> Result<Self, CliError> {
        let mut writer = match out {
            Some(path) => Some((
                path.to_path_buf(),
                BufWriter::new(File::create(path).map_err(|source| CliError::Io {
                    path: path.to_path_buf(),
                    source,
                })?),
            )),
            None => None,
        };

        let (tx, rx) = cb::bounded::<Vec<i16>>(capacity.max(1));
        let handle = thread::Builder::new()
            .name("audio".into())
            .spawn(move || {
                let mut frames = 0u64;
                for batch in rx.iter() {
                    frames += batch.len() as u64 / 2;
                    if let Some((path, w)) = writer.as_mut() {
                        write_all(w, path, &i16_to_le_bytes(&batch))?;
                    }
                }
                if let Some((path, w)) = writer.as_mut() {
                    w.flush().map_err(|source| CliError::Io {
                        path: path.clone(),
                        source,
                    })?;
                }
                debug!("Audio sink stopped after {frames} frames");
                Ok(frames)
            })
            .map_err(|source| CliError::Thread {
                name: "audio",
                source,
            })?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
            dropped: 0,
        })
    }

    /// Queues a batch without blocking; drops it when the sink is full.
    pub fn push(&mut self, samples: Vec<i16>) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };
        match tx.try_send(samples) {
            Ok(()) => {}
            Err(cb::TrySendError::Full(_)) => self.dropped += 1,
            Err(cb::TrySendError::Disconnected(_)) => {
                warn!("Audio sink exited early");
                self.tx = None;
            }
        }
    }

    /// Closes the channel and waits for the sink to drain.
    pub fn finish(mut self) -> Result<SinkStats, CliError> {
        self.tx = None;
        let frames = match self.handle.take().map(JoinHandle::join) {
            Some(Ok(result)) => result?,
            Some(Err(_)) => {
                warn!("Audio sink thread panicked");
                0
            }
            None => 0,
        };
        Ok(SinkStats {
            frames,
            dropped: self.dropped,
        })
    }
}

impl Drop for AudioSink {
    fn drop(&mut self) {
        self.tx = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn write_all(w: &mut impl Write, path: &PathBuf, bytes: &[u8]) -> Result<(), CliError> {
    w.write_all(bytes).map_err(|source| CliError::Io {
        path: path.clone(),
        source,
    })
}
