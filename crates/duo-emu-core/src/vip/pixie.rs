//! CDP1861 "Pixie" video display controller.
//!
//! The chip counts machine cycles into scan lines and, while the display is
//! on, pulls 8 bytes per visible line from memory over DMA-out. Each byte is
//! 8 horizontal pixels, MSB first.

use crate::video::{VideoFrame, VideoGenerator};

pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 128;

pub const CYCLES_PER_LINE: u32 = 14;
pub const LINES_PER_FRAME: u32 = 262;
pub const CYCLES_PER_FRAME: u32 = CYCLES_PER_LINE * LINES_PER_FRAME;

const FIRST_DISPLAY_LINE: u32 = 80;
const LAST_DISPLAY_LINE: u32 = FIRST_DISPLAY_LINE + HEIGHT as u32 - 1;
const BYTES_PER_LINE: u8 = (WIDTH / 8) as u8;

const PIXEL_ON: u32 = 0x00FF_FFFF;
const PIXEL_OFF: u32 = 0x0000_0000;

pub struct Pixie {
    line: u32,
    line_cycle: u32,
    enabled: bool,
    dma_count: u8,
    back: Vec<u32>,
    front: Vec<u32>,
    frames: u64,
}

impl Default for Pixie {
    fn default() -> Self {
        Self::new()
    }
}

impl Pixie {
    pub fn new() -> Self {
        Self {
            line: 0,
            line_cycle: 0,
            enabled: false,
            dma_count: 0,
            back: vec![PIXEL_OFF; WIDTH * HEIGHT],
            front: vec![PIXEL_OFF; WIDTH * HEIGHT],
            frames: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            log::debug!("1861 display {}", if enabled { "on" } else { "off" });
        }
        self.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// Completed frames since reset.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// `INT` is held low on the two lines preceding the display window.
    pub fn interrupt(&self) -> bool {
        self.enabled && (FIRST_DISPLAY_LINE - 2..FIRST_DISPLAY_LINE).contains(&self.line)
    }

    /// `EF1` frames the display window with four lines on either side.
    pub fn ef1(&self) -> bool {
        self.enabled
            && ((FIRST_DISPLAY_LINE - 4..FIRST_DISPLAY_LINE).contains(&self.line)
                || (LAST_DISPLAY_LINE - 3..=LAST_DISPLAY_LINE).contains(&self.line))
    }

    pub fn dma_request(&self) -> bool {
        self.enabled
            && (FIRST_DISPLAY_LINE..=LAST_DISPLAY_LINE).contains(&self.line)
            && self.dma_count < BYTES_PER_LINE
    }

    /// Latches one DMA-out byte into the current line.
    pub fn dma_byte(&mut self, value: u8) {
        if !self.dma_request() {
            return;
        }
        let y = (self.line - FIRST_DISPLAY_LINE) as usize;
        let x = self.dma_count as usize * 8;
        let row = &mut self.back[y * WIDTH + x..y * WIDTH + x + 8];
        for (bit, pixel) in row.iter_mut().enumerate() {
            *pixel = if value & (0x80 >> bit) != 0 {
                PIXEL_ON
            } else {
                PIXEL_OFF
            };
        }
        self.dma_count += 1;
    }

    /// Advances one machine cycle.
    pub fn advance(&mut self) {
        self.line_cycle += 1;
        if self.line_cycle < CYCLES_PER_LINE {
            return;
        }
        self.line_cycle = 0;
        self.dma_count = 0;
        self.line += 1;
        if self.line == LINES_PER_FRAME {
            self.line = 0;
            self.frames += 1;
            std::mem::swap(&mut self.front, &mut self.back);
            self.back.fill(PIXEL_OFF);
        }
    }
}

impl VideoGenerator for Pixie {
    fn width(&self) -> usize {
        WIDTH
    }

    fn height(&self) -> usize {
        HEIGHT
    }

    fn pull_frame(&mut self) -> VideoFrame {
        VideoFrame {
            width: WIDTH,
            height: HEIGHT,
            pixels: self.front.clone(),
        }
    }
}
