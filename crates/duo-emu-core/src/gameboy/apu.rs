//! DMG audio processing unit: two pulse channels (the first with frequency
//! sweep), a wave channel, a noise channel, the 512 Hz frame sequencer and
//! the NR50/NR51 mixer.

use crate::audio::{AudioBuffer, AudioFormat, AudioGenerator, SampleWidth};

#[cfg(feature = "apu-trace")]
macro_rules! apu_trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*);
    };
}
#[cfg(not(feature = "apu-trace"))]
macro_rules! apu_trace {
    ($($arg:tt)*) => {};
}

const CPU_CLOCK_HZ: u32 = 4_194_304;
const VOLUME_FACTOR: i16 = 64;

/// The frame sequencer steps on falling edges of this divider bit (DIV bit 4).
const FRAME_SEQUENCER_DIV_BIT: u16 = 12;

const DUTY_TABLE: [[u8; 8]; 4] = [
    [0, 0, 0, 0, 0, 0, 0, 1], // 12.5%
    [1, 0, 0, 0, 0, 0, 0, 1], // 25%
    [1, 0, 0, 0, 0, 1, 1, 1], // 50%
    [0, 1, 1, 1, 1, 1, 1, 0], // 75%
];

const NOISE_DIVISORS: [i32; 8] = [8, 16, 32, 48, 64, 80, 96, 112];

#[derive(Default, Clone, Copy)]
struct Envelope {
    initial: u8,
    period: u8,
    add: bool,
    volume: u8,
    timer: u8,
}

impl Envelope {
    fn write(&mut self, val: u8) {
        self.initial = val >> 4;
        self.add = val & 0x08 != 0;
        self.period = val & 0x07;
    }

    fn trigger(&mut self) {
        self.volume = self.initial;
        self.timer = if self.period == 0 { 8 } else { self.period };
    }

    fn clock(&mut self) {
        if self.period == 0 {
            return;
        }
        if self.timer > 0 {
            self.timer -= 1;
        }
        if self.timer == 0 {
            self.timer = self.period;
            if self.add && self.volume < 15 {
                self.volume += 1;
            } else if !self.add && self.volume > 0 {
                self.volume -= 1;
            }
        }
    }
}

#[derive(Default)]
struct Sweep {
    period: u8,
    negate: bool,
    shift: u8,
    timer: u8,
    shadow: u16,
    enabled: bool,
}

impl Sweep {
    fn write(&mut self, val: u8) {
        self.period = (val >> 4) & 0x07;
        self.negate = val & 0x08 != 0;
        self.shift = val & 0x07;
    }

    fn calculate(&self) -> u16 {
        let delta = self.shadow >> self.shift;
        if self.negate {
            self.shadow.wrapping_sub(delta)
        } else {
            self.shadow.wrapping_add(delta)
        }
    }

    fn reload_timer(&mut self) {
        self.timer = if self.period == 0 { 8 } else { self.period };
    }
}

/// Remaining-length counter shared by all four channels.
#[derive(Default, Clone, Copy)]
struct Length {
    remaining: u16,
    enabled: bool,
}

impl Length {
    /// Returns true when the counter expires.
    fn clock(&mut self) -> bool {
        if self.enabled && self.remaining > 0 {
            self.remaining -= 1;
            return self.remaining == 0;
        }
        false
    }

    fn trigger(&mut self, max: u16) {
        if self.remaining == 0 {
            self.remaining = max;
        }
    }
}

#[derive(Default)]
struct SquareChannel {
    enabled: bool,
    dac_enabled: bool,
    duty: u8,
    duty_pos: u8,
    length: Length,
    envelope: Envelope,
    frequency: u16,
    timer: i32,
    sweep: Option<Sweep>,
}

impl SquareChannel {
    fn new(with_sweep: bool) -> Self {
        Self {
            sweep: with_sweep.then(Sweep::default),
            ..Self::default()
        }
    }

    fn period(&self) -> i32 {
        (2048 - self.frequency as i32) * 4
    }

    fn step(&mut self) {
        self.timer -= 1;
        if self.timer <= 0 {
            self.timer = self.period();
            self.duty_pos = (self.duty_pos + 1) & 7;
        }
    }

    fn output(&self) -> u8 {
        if !self.enabled {
            return 0;
        }
        DUTY_TABLE[self.duty as usize][self.duty_pos as usize] * self.envelope.volume
    }

    fn trigger(&mut self) {
        self.enabled = self.dac_enabled;
        self.length.trigger(64);
        self.timer = self.period();
        self.envelope.trigger();
        let frequency = self.frequency;
        let mut overflow = false;
        if let Some(sweep) = self.sweep.as_mut() {
            sweep.shadow = frequency;
            sweep.reload_timer();
            sweep.enabled = sweep.period != 0 || sweep.shift != 0;
            overflow = sweep.shift != 0 && sweep.calculate() > 2047;
        }
        if overflow {
            self.enabled = false;
        }
    }

    fn clock_length(&mut self) {
        if self.length.clock() {
            self.enabled = false;
        }
    }

    fn clock_sweep(&mut self) {
        let Some(sweep) = self.sweep.as_mut() else {
            return;
        };
        if sweep.timer > 0 {
            sweep.timer -= 1;
        }
        if sweep.timer != 0 {
            return;
        }
        sweep.reload_timer();
        if !sweep.enabled || sweep.period == 0 {
            return;
        }
        let next = sweep.calculate();
        if next > 2047 {
            self.enabled = false;
            return;
        }
        if sweep.shift != 0 {
            sweep.shadow = next;
            self.frequency = next;
            if sweep.calculate() > 2047 {
                self.enabled = false;
            }
        }
    }
}

#[derive(Default)]
struct WaveChannel {
    enabled: bool,
    dac_enabled: bool,
    length: Length,
    volume: u8,
    position: u8,
    sample: u8,
    frequency: u16,
    timer: i32,
}

impl WaveChannel {
    fn period(&self) -> i32 {
        (2048 - self.frequency as i32) * 2
    }

    fn step(&mut self, wave_ram: &[u8]) {
        if !self.enabled {
            return;
        }
        self.timer -= 1;
        if self.timer <= 0 {
            self.timer = self.period();
            self.position = (self.position + 1) & 0x1F;
            let byte = wave_ram[(self.position / 2) as usize];
            self.sample = if self.position & 1 == 0 {
                byte >> 4
            } else {
                byte & 0x0F
            };
        }
    }

    fn output(&self) -> u8 {
        if !self.enabled {
            return 0;
        }
        match self.volume {
            1 => self.sample,
            2 => self.sample >> 1,
            3 => self.sample >> 2,
            _ => 0,
        }
    }

    fn trigger(&mut self) {
        self.enabled = self.dac_enabled;
        self.length.trigger(256);
        self.position = 0;
        self.timer = self.period() + 6;
    }

    fn clock_length(&mut self) {
        if self.length.clock() {
            self.enabled = false;
        }
    }
}

#[derive(Default)]
struct NoiseChannel {
    enabled: bool,
    dac_enabled: bool,
    length: Length,
    envelope: Envelope,
    clock_shift: u8,
    divisor: u8,
    width7: bool,
    lfsr: u16,
    timer: i32,
}

impl NoiseChannel {
    fn period(&self) -> i32 {
        NOISE_DIVISORS[self.divisor as usize] << self.clock_shift
    }

    fn step(&mut self) {
        if !self.enabled || self.clock_shift >= 14 {
            return;
        }
        self.timer -= 1;
        if self.timer <= 0 {
            self.timer = self.period();
            let bit = (self.lfsr ^ (self.lfsr >> 1)) & 1;
            self.lfsr = (self.lfsr >> 1) | (bit << 14);
            if self.width7 {
                self.lfsr = (self.lfsr & !0x40) | (bit << 6);
            }
        }
    }

    fn output(&self) -> u8 {
        if !self.enabled || self.lfsr & 1 != 0 {
            return 0;
        }
        self.envelope.volume
    }

    fn trigger(&mut self) {
        self.enabled = self.dac_enabled;
        self.length.trigger(64);
        self.lfsr = 0x7FFF;
        self.timer = self.period();
        self.envelope.trigger();
    }

    fn clock_length(&mut self) {
        if self.length.clock() {
            self.enabled = false;
        }
    }
}

pub struct Apu {
    ch1: SquareChannel,
    ch2: SquareChannel,
    ch3: WaveChannel,
    ch4: NoiseChannel,
    /// Raw register file for `FF10-FF3F`; wave RAM lives at offset 0x20.
    regs: [u8; 0x30],
    nr50: u8,
    nr51: u8,
    powered: bool,
    sequencer_step: u8,
    sample_rate: u32,
    sample_clock: u32,
    samples: Vec<i16>,
    audible: bool,
    hp_coef: f32,
    hp_prev_input: [f32; 2],
    hp_prev_output: [f32; 2],
}

impl Apu {
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1);
        Self {
            ch1: SquareChannel::new(true),
            ch2: SquareChannel::new(false),
            ch3: WaveChannel::default(),
            ch4: NoiseChannel::default(),
            regs: [0; 0x30],
            nr50: 0,
            nr51: 0,
            powered: false,
            sequencer_step: 0,
            sample_rate,
            sample_clock: 0,
            samples: Vec::new(),
            audible: false,
            hp_coef: Self::calc_hp_coef(sample_rate),
            hp_prev_input: [0.0; 2],
            hp_prev_output: [0.0; 2],
        }
    }

    /// Register state left behind by the DMG boot ROM.
    pub fn apply_boot_state(&mut self) {
        self.write_reg(0xFF26, 0x80);
        self.write_reg(0xFF11, 0xBF);
        self.write_reg(0xFF12, 0xF3);
        self.write_reg(0xFF25, 0xF3);
        self.write_reg(0xFF24, 0x77);
        // The boot chime has finished by the time the cartridge starts.
        self.ch1.enabled = false;
    }

    fn calc_hp_coef(rate: u32) -> f32 {
        0.999_958_f32.powf(CPU_CLOCK_HZ as f32 / rate as f32)
    }

    fn read_mask(addr: u16) -> u8 {
        match addr {
            0xFF10 => 0x80,
            0xFF11 => 0x3F,
            0xFF12 => 0x00,
            0xFF13 => 0xFF,
            0xFF14 => 0xBF,
            0xFF16 => 0x3F,
            0xFF17 => 0x00,
            0xFF18 => 0xFF,
            0xFF19 => 0xBF,
            0xFF1A => 0x7F,
            0xFF1B => 0xFF,
            0xFF1C => 0x9F,
            0xFF1D => 0xFF,
            0xFF1E => 0xBF,
            0xFF20 => 0xFF,
            0xFF21 => 0x00,
            0xFF22 => 0x00,
            0xFF23 => 0xBF,
            0xFF24 => 0x00,
            0xFF25 => 0x00,
            0xFF26 => 0x70,
            0xFF30..=0xFF3F => 0x00,
            _ => 0xFF,
        }
    }

    pub fn sequencer_step(&self) -> u8 {
        self.sequencer_step
    }

    /// NR52 channel status bits.
    pub fn channel_status(&self) -> u8 {
        (self.ch1.enabled as u8)
            | ((self.ch2.enabled as u8) << 1)
            | ((self.ch3.enabled as u8) << 2)
            | ((self.ch4.enabled as u8) << 3)
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            0xFF26 => {
                let power = if self.powered { 0x80 } else { 0 };
                power | self.channel_status() | Self::read_mask(addr)
            }
            0xFF30..=0xFF3F if self.ch3.enabled => 0xFF,
            0xFF10..=0xFF3F => self.regs[(addr - 0xFF10) as usize] | Self::read_mask(addr),
            _ => 0xFF,
        }
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) {
        if !(0xFF10..=0xFF3F).contains(&addr) {
            return;
        }
        if addr == 0xFF26 {
            self.write_power(val & 0x80 != 0);
            return;
        }
        if (0xFF30..=0xFF3F).contains(&addr) {
            if !self.ch3.enabled {
                self.regs[(addr - 0xFF10) as usize] = val;
            }
            return;
        }
        if !self.powered {
            return;
        }
        self.regs[(addr - 0xFF10) as usize] = val;
        apu_trace!("APU {addr:04X} <- {val:02X}");

        match addr {
            0xFF10 => {
                if let Some(sweep) = self.ch1.sweep.as_mut() {
                    sweep.write(val);
                }
            }
            0xFF11 => {
                self.ch1.duty = val >> 6;
                self.ch1.length.remaining = 64 - (val & 0x3F) as u16;
            }
            0xFF12 => {
                self.ch1.envelope.write(val);
                self.ch1.dac_enabled = val & 0xF8 != 0;
                self.ch1.enabled &= self.ch1.dac_enabled;
            }
            0xFF13 => self.ch1.frequency = (self.ch1.frequency & 0x700) | val as u16,
            0xFF14 => {
                self.ch1.frequency = (self.ch1.frequency & 0xFF) | (((val & 0x07) as u16) << 8);
                self.ch1.length.enabled = val & 0x40 != 0;
                if val & 0x80 != 0 {
                    self.ch1.trigger();
                }
            }
            0xFF16 => {
                self.ch2.duty = val >> 6;
                self.ch2.length.remaining = 64 - (val & 0x3F) as u16;
            }
            0xFF17 => {
                self.ch2.envelope.write(val);
                self.ch2.dac_enabled = val & 0xF8 != 0;
                self.ch2.enabled &= self.ch2.dac_enabled;
            }
            0xFF18 => self.ch2.frequency = (self.ch2.frequency & 0x700) | val as u16,
            0xFF19 => {
                self.ch2.frequency = (self.ch2.frequency & 0xFF) | (((val & 0x07) as u16) << 8);
                self.ch2.length.enabled = val & 0x40 != 0;
                if val & 0x80 != 0 {
                    self.ch2.trigger();
                }
            }
            0xFF1A => {
                self.ch3.dac_enabled = val & 0x80 != 0;
                self.ch3.enabled &= self.ch3.dac_enabled;
            }
            0xFF1B => self.ch3.length.remaining = 256 - val as u16,
            0xFF1C => self.ch3.volume = (val >> 5) & 0x03,
            0xFF1D => self.ch3.frequency = (self.ch3.frequency & 0x700) | val as u16,
            0xFF1E => {
                self.ch3.frequency = (self.ch3.frequency & 0xFF) | (((val & 0x07) as u16) << 8);
                self.ch3.length.enabled = val & 0x40 != 0;
                if val & 0x80 != 0 {
                    self.ch3.trigger();
                }
            }
            0xFF20 => self.ch4.length.remaining = 64 - (val & 0x3F) as u16,
            0xFF21 => {
                self.ch4.envelope.write(val);
                self.ch4.dac_enabled = val & 0xF8 != 0;
                self.ch4.enabled &= self.ch4.dac_enabled;
            }
            0xFF22 => {
                self.ch4.clock_shift = val >> 4;
                self.ch4.width7 = val & 0x08 != 0;
                self.ch4.divisor = val & 0x07;
            }
            0xFF23 => {
                self.ch4.length.enabled = val & 0x40 != 0;
                if val & 0x80 != 0 {
                    self.ch4.trigger();
                }
            }
            0xFF24 => self.nr50 = val,
            0xFF25 => self.nr51 = val,
            _ => {}
        }
    }

    fn write_power(&mut self, on: bool) {
        if self.powered && !on {
            let wave = self.regs[0x20..].to_vec();
            self.ch1 = SquareChannel::new(true);
            self.ch2 = SquareChannel::new(false);
            self.ch3 = WaveChannel::default();
            self.ch4 = NoiseChannel::default();
            self.regs.fill(0);
            self.regs[0x20..].copy_from_slice(&wave);
            self.nr50 = 0;
            self.nr51 = 0;
        } else if !self.powered && on {
            self.sequencer_step = 0;
        }
        self.powered = on;
    }

    fn clock_frame_sequencer(&mut self) {
        let step = self.sequencer_step;
        self.sequencer_step = (step + 1) & 7;
        if step % 2 == 0 {
            self.ch1.clock_length();
            self.ch2.clock_length();
            self.ch3.clock_length();
            self.ch4.clock_length();
        }
        if step == 2 || step == 6 {
            self.ch1.clock_sweep();
        }
        if step == 7 {
            self.ch1.envelope.clock();
            self.ch2.envelope.clock();
            self.ch4.envelope.clock();
        }
    }

    /// Advances `cycles` T-cycles. `div` is the internal divider value at the
    /// start of the step; the frame sequencer follows its bit 12.
    pub fn step(&mut self, cycles: u16, div: u16) {
        for i in 0..cycles {
            if self.powered {
                let prev = div.wrapping_add(i);
                let next = prev.wrapping_add(1);
                if (prev >> FRAME_SEQUENCER_DIV_BIT) & 1 == 1
                    && (next >> FRAME_SEQUENCER_DIV_BIT) & 1 == 0
                {
                    self.clock_frame_sequencer();
                }
                self.ch1.step();
                self.ch2.step();
                self.ch3.step(&self.regs[0x20..]);
                self.ch4.step();
            }
            self.sample_clock += self.sample_rate;
            if self.sample_clock >= CPU_CLOCK_HZ {
                self.sample_clock -= CPU_CLOCK_HZ;
                let (left, right) = self.mix_output();
                self.samples.push(left);
                self.samples.push(right);
            }
        }
    }

    /// A DIV write clocks the frame sequencer when bit 12 was high.
    pub fn div_reset(&mut self, div_before: u16) {
        if self.powered && (div_before >> FRAME_SEQUENCER_DIV_BIT) & 1 == 1 {
            self.clock_frame_sequencer();
        }
    }

    fn mix_output(&mut self) -> (i16, i16) {
        let dacs = [
            self.ch1.dac_enabled,
            self.ch2.dac_enabled,
            self.ch3.dac_enabled,
            self.ch4.dac_enabled,
        ];
        if !self.powered || !dacs.iter().any(|&on| on) {
            self.hp_prev_input = [0.0; 2];
            self.hp_prev_output = [0.0; 2];
            return (0, 0);
        }
        self.audible = true;

        let outputs = [
            self.ch1.output(),
            self.ch2.output(),
            self.ch3.output(),
            self.ch4.output(),
        ];
        let mut left = 0i16;
        let mut right = 0i16;
        for (ch, (&out, &dac)) in outputs.iter().zip(dacs.iter()).enumerate() {
            if !dac {
                continue;
            }
            // DAC maps 0..15 to +15..-15
            let analog = 15 - 2 * out as i16;
            if self.nr51 & (0x10 << ch) != 0 {
                left += analog;
            }
            if self.nr51 & (0x01 << ch) != 0 {
                right += analog;
            }
        }
        let left_vol = ((self.nr50 >> 4) & 0x07) as i16 + 1;
        let right_vol = (self.nr50 & 0x07) as i16 + 1;
        self.dc_block(
            left * left_vol * VOLUME_FACTOR,
            right * right_vol * VOLUME_FACTOR,
        )
    }

    fn dc_block(&mut self, left: i16, right: i16) -> (i16, i16) {
        let r = self.hp_coef;
        let mut out = [0i16; 2];
        for (i, input) in [left as f32, right as f32].into_iter().enumerate() {
            let filtered = input - self.hp_prev_input[i] + r * self.hp_prev_output[i];
            self.hp_prev_input[i] = input;
            self.hp_prev_output[i] = filtered;
            out[i] = filtered.round() as i16;
        }
        (out[0], out[1])
    }
}

impl AudioGenerator for Apu {
    fn format(&self) -> AudioFormat {
        AudioFormat {
            width: SampleWidth::Bits16,
            channels: 2,
            sample_rate: self.sample_rate,
        }
    }

    fn pull_samples(&mut self) -> Option<AudioBuffer> {
        let samples = std::mem::take(&mut self.samples);
        let audible = std::mem::replace(&mut self.audible, false);
        if !audible {
            return None;
        }
        Some(AudioBuffer {
            format: self.format(),
            data: crate::audio::i16_to_le_bytes(&samples),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_filter_converges_to_zero() {
        let mut apu = Apu::new(44_100);
        let first = apu.dc_block(1000, 1000);
        let mut out = first;
        for _ in 0..8192 {
            out = apu.dc_block(1000, 1000);
        }
        assert!(out.0 < first.0);
        assert!(out.0.abs() < 10);
        assert!(out.1.abs() < 10);
    }

    #[test]
    fn dc_filter_channels_independent() {
        let mut apu = Apu::new(44_100);
        let mut last = (0, 0);
        for _ in 0..8 {
            last = apu.dc_block(1000, 0);
        }
        assert!(last.0 > 0);
        assert_eq!(last.1, 0);
    }

    #[test]
    fn sweep_overflow_on_trigger_disables_channel() {
        let mut apu = Apu::new(44_100);
        apu.write_reg(0xFF26, 0x80);
        apu.write_reg(0xFF12, 0xF0);
        apu.write_reg(0xFF10, 0x11); // period 1, add, shift 1
        apu.write_reg(0xFF13, 0xFF);
        apu.write_reg(0xFF14, 0x87); // frequency 0x7FF, trigger
        assert_eq!(apu.channel_status() & 0x01, 0);
    }
}
