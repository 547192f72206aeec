//! Cycle-accurate emulation core for two 8-bit machines: the RCA COSMAC VIP
//! (CDP1802) and the original Game Boy (SM83).
//!
//! This crate contains the platform-agnostic machine logic (processors, buses,
//! peripherals, pacing). Frontends drive it through the [`emulator`] facade and
//! consume frames, samples and disassembly through its pull interfaces.

#![allow(dead_code)]

/// Audio sample buffers and the 8/16-bit, mono/stereo resampler.
pub mod audio;

/// Address-space contracts shared by every machine.
pub mod bus;

/// RCA CDP1802 processor core.
pub mod cdp1802;

/// Row-indexed instruction listing and breakpoint set.
pub mod disassembler;

/// Frame scheduler tying processor cycles to video/audio output.
pub mod emulator;

/// Error types.
pub mod error;

/// Wall-clock frame pacing.
pub mod frame_limiter;

/// DMG Game Boy machine: memory map and peripherals.
pub mod gameboy;

/// Processor capability interface.
pub mod processor;

/// Systems known to the emulator and their factories.
pub mod registry;

/// Latest-frame-wins handoff to a rendering thread.
pub mod render;

/// Immutable ROM images.
pub mod rom;

/// Sharp SM83 processor core.
pub mod sm83;

/// Video frames and generator interface.
pub mod video;

/// COSMAC VIP machine: memory map, CDP1861 video, keypad and tone.
pub mod vip;
