//! DMG picture processing unit.
//!
//! Scanlines are rendered whole at the end of mode 3 rather than pixel by
//! pixel, which is enough for everything that doesn't change registers
//! mid-line.

use crate::video::{VideoFrame, VideoGenerator};

#[cfg(feature = "ppu-trace")]
macro_rules! ppu_trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*);
    };
}
#[cfg(not(feature = "ppu-trace"))]
macro_rules! ppu_trace {
    ($($arg:tt)*) => {};
}

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

// Mode lengths in T-cycles
const MODE0_CYCLES: u16 = 204;
const MODE1_CYCLES: u16 = 456;
const MODE2_CYCLES: u16 = 80;
const MODE3_CYCLES: u16 = 172;

const VBLANK_LINES: u8 = 10;

const MAX_SPRITES_PER_LINE: usize = 10;
const TOTAL_SPRITES: usize = 40;

pub const VRAM_SIZE: usize = 0x2000;
pub const OAM_SIZE: usize = 0xA0;

const WINDOW_X_MAX: u8 = 166;

const BG_MAP_0_BASE: usize = 0x1800;
const BG_MAP_1_BASE: usize = 0x1C00;
const TILE_DATA_0_BASE: usize = 0x0000;
const TILE_DATA_1_BASE: usize = 0x0800;

const MODE_HBLANK: u8 = 0;
const MODE_VBLANK: u8 = 1;
const MODE_OAM: u8 = 2;
const MODE_TRANSFER: u8 = 3;

/// Shades 0-3 as 0x00RRGGBB.
pub const DMG_PALETTE: [u32; 4] = [0x009BBC0F, 0x008BAC0F, 0x00306230, 0x000F380F];

#[derive(Copy, Clone, Default)]
struct Sprite {
    x: i16,
    y: i16,
    tile: u8,
    flags: u8,
}

pub struct Ppu {
    pub vram: Box<[u8; VRAM_SIZE]>,
    pub oam: [u8; OAM_SIZE],

    lcdc: u8,
    stat: u8,
    scy: u8,
    scx: u8,
    ly: u8,
    lyc: u8,
    pub dma: u8,
    bgp: u8,
    obp0: u8,
    obp1: u8,
    wy: u8,
    wx: u8,
    win_line_counter: u8,

    mode_clock: u16,
    pub mode: u8,

    framebuffer: Vec<u32>,
    completed: Vec<u32>,
    /// Background color index per pixel of the current line, for sprite
    /// priority.
    line_color_zero: [bool; SCREEN_WIDTH],
    line_sprites: [Sprite; MAX_SPRITES_PER_LINE],
    sprite_count: usize,
    stat_irq_line: bool,
    frame_counter: u64,
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            vram: Box::new([0; VRAM_SIZE]),
            oam: [0; OAM_SIZE],
            lcdc: 0,
            stat: 0,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            dma: 0xFF,
            bgp: 0,
            obp0: 0,
            obp1: 0,
            wy: 0,
            wx: 0,
            win_line_counter: 0,
            mode_clock: 0,
            mode: MODE_OAM,
            framebuffer: vec![DMG_PALETTE[0]; SCREEN_WIDTH * SCREEN_HEIGHT],
            completed: vec![DMG_PALETTE[0]; SCREEN_WIDTH * SCREEN_HEIGHT],
            line_color_zero: [false; SCREEN_WIDTH],
            line_sprites: [Sprite::default(); MAX_SPRITES_PER_LINE],
            sprite_count: 0,
            stat_irq_line: false,
            frame_counter: 0,
        }
    }

    /// Register state left behind by the DMG boot ROM.
    pub fn apply_boot_state(&mut self) {
        self.lcdc = 0x91;
        self.bgp = 0xFC;
        self.stat = 0x00;
        self.ly = 0;
        self.mode = MODE_OAM;
        self.mode_clock = 0;
    }

    pub fn frames(&self) -> u64 {
        self.frame_counter
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    fn lcd_on(&self) -> bool {
        self.lcdc & 0x80 != 0
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            0xFF40 => self.lcdc,
            0xFF41 => {
                let coincidence = if self.ly == self.lyc { 0x04 } else { 0 };
                let mode = if self.lcd_on() { self.mode & 0x03 } else { 0 };
                0x80 | (self.stat & 0x78) | coincidence | mode
            }
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF46 => self.dma,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            _ => 0xFF,
        }
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF40 => {
                let was_on = self.lcd_on();
                self.lcdc = val;
                if was_on && !self.lcd_on() {
                    ppu_trace!("LCD off at LY={}", self.ly);
                    self.mode = MODE_HBLANK;
                    self.mode_clock = 0;
                    self.win_line_counter = 0;
                    self.ly = 0;
                    self.completed.fill(DMG_PALETTE[0]);
                } else if !was_on && self.lcd_on() {
                    self.mode = MODE_OAM;
                    self.mode_clock = 0;
                }
            }
            0xFF41 => self.stat = val & 0x78,
            0xFF42 => self.scy = val,
            0xFF43 => self.scx = val,
            0xFF44 => {}
            0xFF45 => self.lyc = val,
            0xFF46 => self.dma = val,
            0xFF47 => self.bgp = val,
            0xFF48 => self.obp0 = val,
            0xFF49 => self.obp1 = val,
            0xFF4A => self.wy = val,
            0xFF4B => self.wx = val,
            _ => {}
        }
    }

    /// Collects up to 10 sprites on the current line, ordered by X then OAM
    /// index.
    fn oam_scan(&mut self) {
        let height: i16 = if self.lcdc & 0x04 != 0 { 16 } else { 8 };
        let ly = self.ly as i16;
        self.sprite_count = 0;
        for entry in self.oam.chunks_exact(4).take(TOTAL_SPRITES) {
            if self.sprite_count == MAX_SPRITES_PER_LINE {
                break;
            }
            let y = entry[0] as i16 - 16;
            if (y..y + height).contains(&ly) {
                self.line_sprites[self.sprite_count] = Sprite {
                    x: entry[1] as i16 - 8,
                    y,
                    tile: entry[2],
                    flags: entry[3],
                };
                self.sprite_count += 1;
            }
        }
        // Stable sort keeps OAM order among equal X.
        self.line_sprites[..self.sprite_count].sort_by_key(|s| s.x);
    }

    #[inline(always)]
    fn shade(palette: u8, color_id: u8) -> u8 {
        (palette >> (color_id * 2)) & 0x03
    }

    fn tile_row_address(&self, tile_index: u8, row: usize) -> usize {
        let base = if self.lcdc & 0x10 != 0 {
            TILE_DATA_0_BASE + tile_index as usize * 16
        } else {
            TILE_DATA_1_BASE + ((tile_index as i8 as i16 + 128) as usize) * 16
        };
        base + row * 2
    }

    fn color_id(&self, addr: usize, bit: usize) -> u8 {
        let lo = self.vram[addr];
        let hi = self.vram[addr + 1];
        (((hi >> bit) & 1) << 1) | ((lo >> bit) & 1)
    }

    fn render_scanline(&mut self) {
        if !self.lcd_on() || self.ly as usize >= SCREEN_HEIGHT {
            return;
        }
        let line = self.ly as usize * SCREEN_WIDTH;
        let blank = DMG_PALETTE[Self::shade(self.bgp, 0) as usize];
        self.framebuffer[line..line + SCREEN_WIDTH].fill(blank);
        self.line_color_zero.fill(true);

        if self.lcdc & 0x01 != 0 {
            self.render_background(line);
            self.render_window(line);
        }
        if self.lcdc & 0x02 != 0 {
            self.render_sprites(line);
        }
    }

    fn render_background(&mut self, line: usize) {
        let map = if self.lcdc & 0x08 != 0 {
            BG_MAP_1_BASE
        } else {
            BG_MAP_0_BASE
        };
        let y = self.ly.wrapping_add(self.scy) as usize;
        for x in 0..SCREEN_WIDTH {
            let px = (x as u8).wrapping_add(self.scx) as usize;
            let tile_index = self.vram[map + (y / 8) * 32 + px / 8];
            let addr = self.tile_row_address(tile_index, y % 8);
            let color_id = self.color_id(addr, 7 - px % 8);
            self.framebuffer[line + x] = DMG_PALETTE[Self::shade(self.bgp, color_id) as usize];
            self.line_color_zero[x] = color_id == 0;
        }
    }

    fn render_window(&mut self, line: usize) {
        if self.lcdc & 0x20 == 0 || self.ly < self.wy || self.wx > WINDOW_X_MAX {
            return;
        }
        let map = if self.lcdc & 0x40 != 0 {
            BG_MAP_1_BASE
        } else {
            BG_MAP_0_BASE
        };
        let wy = self.win_line_counter as usize;
        let start = self.wx as i16 - 7;
        for x in start.max(0) as usize..SCREEN_WIDTH {
            let wx = (x as i16 - start) as usize;
            let tile_index = self.vram[map + (wy / 8) * 32 + wx / 8];
            let addr = self.tile_row_address(tile_index, wy % 8);
            let color_id = self.color_id(addr, 7 - wx % 8);
            self.framebuffer[line + x] = DMG_PALETTE[Self::shade(self.bgp, color_id) as usize];
            self.line_color_zero[x] = color_id == 0;
        }
        self.win_line_counter = self.win_line_counter.wrapping_add(1);
    }

    fn render_sprites(&mut self, line: usize) {
        let height: i16 = if self.lcdc & 0x04 != 0 { 16 } else { 8 };
        let mut drawn = [false; SCREEN_WIDTH];
        let sprites = self.line_sprites;
        for s in &sprites[..self.sprite_count] {
            let tile = if height == 16 { s.tile & 0xFE } else { s.tile };
            let mut row = self.ly as i16 - s.y;
            if s.flags & 0x40 != 0 {
                row = height - 1 - row;
            }
            let addr = tile as usize * 16 + row as usize * 2;
            let palette = if s.flags & 0x10 != 0 {
                self.obp1
            } else {
                self.obp0
            };
            for px in 0..8 {
                let sx = s.x + px as i16;
                if !(0..SCREEN_WIDTH as i16).contains(&sx) || drawn[sx as usize] {
                    continue;
                }
                let bit = if s.flags & 0x20 != 0 { px } else { 7 - px };
                let color_id = self.color_id(addr, bit);
                if color_id == 0 {
                    continue;
                }
                let sx = sx as usize;
                drawn[sx] = true;
                if s.flags & 0x80 != 0 && !self.line_color_zero[sx] {
                    continue;
                }
                self.framebuffer[line + sx] = DMG_PALETTE[Self::shade(palette, color_id) as usize];
            }
        }
    }

    /// Advances `cycles` T-cycles, raising VBlank and STAT interrupts in
    /// `if_reg`.
    pub fn step(&mut self, cycles: u16, if_reg: &mut u8) {
        if !self.lcd_on() {
            return;
        }
        self.mode_clock += cycles;
        loop {
            let length = match self.mode {
                MODE_HBLANK => MODE0_CYCLES,
                MODE_VBLANK => MODE1_CYCLES,
                MODE_OAM => MODE2_CYCLES,
                _ => MODE3_CYCLES,
            };
            if self.mode_clock < length {
                break;
            }
            self.mode_clock -= length;
            match self.mode {
                MODE_OAM => {
                    self.oam_scan();
                    self.mode = MODE_TRANSFER;
                }
                MODE_TRANSFER => {
                    self.render_scanline();
                    self.mode = MODE_HBLANK;
                }
                MODE_HBLANK => {
                    self.ly += 1;
                    if self.ly as usize == SCREEN_HEIGHT {
                        self.mode = MODE_VBLANK;
                        self.completed.copy_from_slice(&self.framebuffer);
                        ppu_trace!("PPU frame {} complete", self.frame_counter);
                        *if_reg |= 0x01;
                    } else {
                        self.mode = MODE_OAM;
                    }
                }
                _ => {
                    self.ly += 1;
                    if self.ly == SCREEN_HEIGHT as u8 + VBLANK_LINES {
                        self.ly = 0;
                        self.win_line_counter = 0;
                        self.frame_counter = self.frame_counter.wrapping_add(1);
                        self.mode = MODE_OAM;
                    }
                }
            }
            self.update_stat_irq(if_reg);
        }
        self.update_stat_irq(if_reg);
    }

    /// STAT interrupts fire on the rising edge of the ORed sources.
    fn update_stat_irq(&mut self, if_reg: &mut u8) {
        let coincidence = self.ly == self.lyc && self.stat & 0x40 != 0;
        let mode_signal = match self.mode {
            MODE_HBLANK => self.stat & 0x08 != 0,
            MODE_VBLANK => self.stat & 0x10 != 0,
            MODE_OAM => self.stat & 0x20 != 0,
            _ => false,
        };
        let current = coincidence || mode_signal;
        if current && !self.stat_irq_line {
            *if_reg |= 0x02;
        }
        self.stat_irq_line = current;
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoGenerator for Ppu {
    fn width(&self) -> usize {
        SCREEN_WIDTH
    }

    fn height(&self) -> usize {
        SCREEN_HEIGHT
    }

    fn pull_frame(&mut self) -> VideoFrame {
        VideoFrame {
            width: SCREEN_WIDTH,
            height: SCREEN_HEIGHT,
            pixels: self.completed.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: u16 = 456;

    fn lcd_on() -> Ppu {
        let mut ppu = Ppu::new();
        ppu.apply_boot_state();
        ppu
    }

    #[test]
    fn vblank_interrupt_after_144_lines() {
        let mut ppu = lcd_on();
        let mut if_reg = 0;
        for _ in 0..143 {
            ppu.step(LINE, &mut if_reg);
        }
        assert_eq!(ppu.ly(), 143);
        assert_eq!(if_reg & 0x01, 0);
        ppu.step(LINE, &mut if_reg);
        assert_eq!(ppu.ly(), 144);
        assert_eq!(if_reg & 0x01, 0x01);
        assert_eq!(ppu.read_reg(0xFF41) & 0x03, MODE_VBLANK);
    }

    #[test]
    fn frame_wraps_after_154_lines() {
        let mut ppu = lcd_on();
        let mut if_reg = 0;
        for _ in 0..154 {
            ppu.step(LINE, &mut if_reg);
        }
        assert_eq!(ppu.ly(), 0);
        assert_eq!(ppu.frames(), 1);
    }

    #[test]
    fn lyc_stat_interrupt_on_rising_edge() {
        let mut ppu = lcd_on();
        let mut if_reg = 0;
        ppu.write_reg(0xFF45, 2);
        ppu.write_reg(0xFF41, 0x40);
        ppu.step(LINE, &mut if_reg);
        assert_eq!(if_reg & 0x02, 0);
        ppu.step(LINE, &mut if_reg);
        assert_eq!(if_reg & 0x02, 0x02);
        assert_eq!(ppu.read_reg(0xFF41) & 0x04, 0x04);
        if_reg = 0;
        ppu.step(100, &mut if_reg);
        assert_eq!(if_reg & 0x02, 0);
    }

    #[test]
    fn background_tile_renders_through_palette() {
        let mut ppu = lcd_on();
        ppu.write_reg(0xFF47, 0xE4);
        // Tile 0 row 0: color 3 in the leftmost pixel, color 1 in the next.
        ppu.vram[0] = 0b1100_0000;
        ppu.vram[1] = 0b1000_0000;
        let mut if_reg = 0;
        for _ in 0..144 {
            ppu.step(LINE, &mut if_reg);
        }
        let frame = ppu.pull_frame();
        assert_eq!(frame.pixel(0, 0), DMG_PALETTE[3]);
        assert_eq!(frame.pixel(1, 0), DMG_PALETTE[1]);
        assert_eq!(frame.pixel(2, 0), DMG_PALETTE[0]);
        assert_eq!(frame.pixel(8, 0), DMG_PALETTE[3]);
    }

    #[test]
    fn sprite_limit_is_ten_per_line() {
        let mut ppu = lcd_on();
        for i in 0..12 {
            ppu.oam[i * 4] = 16;
            ppu.oam[i * 4 + 1] = 8 + i as u8 * 8;
        }
        ppu.oam_scan();
        assert_eq!(ppu.sprite_count, MAX_SPRITES_PER_LINE);
    }
}
