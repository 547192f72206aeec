//! Q-gated square wave generator.

use crate::audio::{AudioBuffer, AudioFormat, AudioGenerator, SampleWidth};

/// Machine cycles per second at the VIP's 1.76064 MHz clock.
pub const CYCLES_PER_SECOND: u32 = 220_080;
pub const TONE_HZ: u32 = 1_400;
const AMPLITUDE: i8 = 0x20;

pub struct Tone {
    sample_rate: u32,
    q: bool,
    high: bool,
    sample_clock: u32,
    phase: u32,
    samples: Vec<u8>,
    audible: bool,
}

impl Tone {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            q: false,
            high: true,
            sample_clock: 0,
            phase: 0,
            samples: Vec::new(),
            audible: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.sample_rate);
    }

    pub fn set_q(&mut self, q: bool) {
        self.q = q;
    }

    /// Advances one machine cycle, emitting a sample whenever the output
    /// clock crosses a sample boundary.
    pub fn tick(&mut self) {
        self.sample_clock += self.sample_rate;
        while self.sample_clock >= CYCLES_PER_SECOND {
            self.sample_clock -= CYCLES_PER_SECOND;
            self.emit();
        }
    }

    fn emit(&mut self) {
        // Below 2 * TONE_HZ several edges can fall inside one sample.
        self.phase += 2 * TONE_HZ;
        while self.phase >= self.sample_rate {
            self.phase -= self.sample_rate;
            self.high = !self.high;
        }
        let value = if !self.q {
            0
        } else if self.high {
            AMPLITUDE
        } else {
            -AMPLITUDE
        };
        self.audible |= self.q;
        self.samples.push(value as u8);
    }
}

impl AudioGenerator for Tone {
    fn format(&self) -> AudioFormat {
        AudioFormat {
            width: SampleWidth::Bits8,
            channels: 1,
            sample_rate: self.sample_rate,
        }
    }

    fn pull_samples(&mut self) -> Option<AudioBuffer> {
        let data = std::mem::take(&mut self.samples);
        let audible = std::mem::replace(&mut self.audible, false);
        if !audible {
            return None;
        }
        Some(AudioBuffer {
            format: self.format(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_frame_yields_nothing() {
        let mut tone = Tone::new(44_100);
        for _ in 0..3668 {
            tone.tick();
        }
        assert!(tone.pull_samples().is_none());
    }

    #[test]
    fn one_second_of_tone() {
        let mut tone = Tone::new(44_100);
        tone.set_q(true);
        for _ in 0..CYCLES_PER_SECOND {
            tone.tick();
        }
        let buffer = tone.pull_samples().expect("tone was audible");
        assert_eq!(buffer.data.len(), 44_100);
        let edges = buffer
            .data
            .windows(2)
            .filter(|w| w[0] != w[1])
            .count();
        // Two edges per period.
        assert!((2 * TONE_HZ as usize - 2..=2 * TONE_HZ as usize).contains(&edges));
        assert!(buffer.data.iter().all(|&b| b as i8 == AMPLITUDE || b as i8 == -AMPLITUDE));
    }

    #[test]
    fn low_sample_rate_keeps_phase_bounded() {
        let mut tone = Tone::new(1_000);
        tone.set_q(true);
        for _ in 0..CYCLES_PER_SECOND {
            tone.tick();
            assert!(tone.phase < tone.sample_rate);
        }
        let buffer = tone.pull_samples().expect("tone was audible");
        assert_eq!(buffer.data.len(), 1_000);
        assert!(buffer.data.iter().all(|&b| b as i8 == AMPLITUDE || b as i8 == -AMPLITUDE));
    }
}
