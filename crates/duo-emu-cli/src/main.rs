mod audio_sink;
mod config;
mod error;
mod screenshot;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use clap::Parser;
use duo_emu_core::audio::to_stereo_i16;
use duo_emu_core::emulator::{Emulator, FrameOutcome};
use duo_emu_core::frame_limiter::FrameLimiter;
use duo_emu_core::registry::{SystemId, SystemRegistry};
use duo_emu_core::render::{FrameQueue, RenderThread};
use duo_emu_core::rom::Rom;
use duo_emu_core::video::VideoFrame;
use log::{debug, error, info};

use crate::audio_sink::AudioSink;
use crate::config::CliConfig;
use crate::error::CliError;

#[derive(Parser, Debug)]
#[command(name = "duo-emu", version, about = "COSMAC VIP and Game Boy emulator")]
struct Args {
    /// Path to ROM file
    rom: PathBuf,

    /// System to run (cosmac-vip, game-boy); detected from the file
    /// extension when omitted
    #[arg(long)]
    system: Option<SystemId>,

    /// Number of frames to run
    #[arg(long)]
    frames: Option<u64>,

    /// Number of seconds to run
    #[arg(long)]
    seconds: Option<u64>,

    /// Override the system framerate
    #[arg(long)]
    framerate: Option<u32>,

    /// Catch up late frames one at a time instead of dropping them
    #[arg(long)]
    no_frame_skip: bool,

    /// Run as fast as possible
    #[arg(long)]
    unpaced: bool,

    /// Write the last frame to this PNG file
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Write audio as raw s16le stereo to this file
    #[arg(long)]
    audio_out: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop before executing the instruction at this address (hex)
    #[arg(long = "breakpoint", value_name = "ADDR")]
    breakpoints: Vec<String>,

    /// Print this many disassembled rows around the program counter on exit
    #[arg(long, value_name = "N")]
    disasm: Option<usize>,

    /// Enable debug logging and periodic CPU state output
    #[arg(long)]
    debug: bool,
}

fn parse_address(text: &str) -> Result<u16, CliError> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix('$')
        .or_else(|| trimmed.strip_prefix("0x"))
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u16::from_str_radix(digits, 16).map_err(|_| CliError::Address(text.to_string()))
}

fn print_serial(bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    print!("[SERIAL] ");
    for b in bytes {
        if b.is_ascii_graphic() || *b == b' ' {
            print!("{}", *b as char);
        } else {
            print!("\\x{b:02X}");
        }
    }
    println!();
}

fn print_listing(emu: &mut Emulator, rows: usize) {
    let pc = emu.instruction_pointer();
    for entry in emu.listing_around_pc(rows / 2, rows) {
        let marker = if entry.address == pc { '>' } else { ' ' };
        let bp = if emu.disassembler().has_breakpoint(entry.address) {
            '*'
        } else {
            ' '
        };
        let bytes: Vec<String> = entry.bytecode.iter().map(|b| format!("{b:02X}")).collect();
        println!(
            "{marker}{bp} {:04X}  {:<9} {}",
            entry.address,
            bytes.join(" "),
            entry.text
        );
    }
}

fn load_config(args: &Args) -> Result<CliConfig, CliError> {
    let mut cfg = match &args.config {
        Some(path) => config::load_required(path)?,
        None => config::load_default(&config::default_config_path()),
    };
    if args.framerate.is_some() {
        cfg.pacing.framerate = args.framerate;
    }
    if args.no_frame_skip {
        cfg.pacing.frame_skip = false;
    }
    Ok(cfg)
}

fn run(args: &Args) -> Result<(), CliError> {
    let cfg = load_config(args)?;
    let registry = SystemRegistry::with_builtin();
    let id = match args.system {
        Some(id) => id,
        None => registry.detect(&args.rom)?,
    };
    let rom = Rom::from_file(&args.rom)?;
    let mut emu = registry.create(id, rom, &cfg.emulator_config())?;

    for text in &args.breakpoints {
        let address = parse_address(text)?;
        emu.disassembler_mut().add_breakpoint(address);
        debug!("Breakpoint set at ${address:04X}");
    }

    let presented: Arc<Mutex<Option<VideoFrame>>> = Arc::new(Mutex::new(None));
    let queue = Arc::new(FrameQueue::new());
    let mut render = {
        let presented = Arc::clone(&presented);
        RenderThread::spawn(Arc::clone(&queue), move |frame| {
            *presented.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
        })
        .map_err(|source| CliError::Thread {
            name: "render",
            source,
        })?
    };
    let mut sink = AudioSink::spawn(cfg.audio.queue_frames, args.audio_out.as_deref())?;

    let mut limiter = FrameLimiter::new(
        emu.get_framerate(),
        cfg.pacing.frame_skip,
        cfg.pacing.force_initial_frame,
    );
    let second_limit = args.seconds.map(Duration::from_secs);
    let start = Instant::now();
    let mut frame_count = 0u64;
    let mut serial = Vec::new();

    loop {
        if let Some(max) = args.frames
            && frame_count >= max
        {
            break;
        }
        if let Some(limit) = second_limit
            && start.elapsed() >= limit
        {
            break;
        }
        if !args.unpaced && !limiter.is_frame_ready() {
            continue;
        }

        match emu.execute_frame()? {
            FrameOutcome::Completed(frame) => {
                if let Some(audio) = frame.audio {
                    sink.push(to_stereo_i16(&audio));
                }
                queue.push(frame.video);
            }
            FrameOutcome::Breakpoint { address } => {
                emu.set_stepping(true);
                println!("Breakpoint at ${address:04X}");
                println!("{}", emu.cpu_state());
                print_listing(&mut emu, args.disasm.unwrap_or(8));
                break;
            }
            FrameOutcome::Gated => break,
        }

        serial.extend(emu.take_serial());
        if args.debug && frame_count.is_multiple_of(60) {
            print_serial(&serial);
            serial.clear();
            println!("{}", emu.cpu_state());
        }
        frame_count += 1;
    }
    serial.extend(emu.take_serial());
    print_serial(&serial);

    let rendered = render.shutdown().unwrap_or(0);
    let audio = sink.finish()?;
    info!(
        "Ran {frame_count} frames in {:.2?}: {rendered} rendered, {} superseded, \
         {} audio frames ({} batches dropped), {} instructions in the last frame",
        start.elapsed(),
        queue.dropped(),
        audio.frames,
        audio.dropped,
        emu.get_current_instructions_per_frame(),
    );

    if let Some(rows) = args.disasm
        && !emu.is_stepping()
    {
        print_listing(&mut emu, rows);
    }

    if let Some(path) = &args.screenshot {
        let last = presented
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let frame = last.unwrap_or_else(|| emu.pull_video());
        screenshot::save(&frame, path)?;
        info!("Saved screenshot to {}", path.display());
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
