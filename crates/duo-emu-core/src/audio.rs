//! Audio sample buffers and the conversion every frontend applies before
//! handing samples to a device.

/// Sample encoding of an [`AudioBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleWidth {
    /// Signed 8-bit, one byte per sample.
    Bits8,
    /// Signed 16-bit little-endian, two bytes per sample.
    Bits16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub width: SampleWidth,
    /// 1 (mono) or 2 (interleaved stereo).
    pub channels: u8,
    pub sample_rate: u32,
}

/// Samples produced during one video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBuffer {
    pub format: AudioFormat,
    pub data: Vec<u8>,
}

impl AudioBuffer {
    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        let bytes_per_sample = match self.format.width {
            SampleWidth::Bits8 => 1,
            SampleWidth::Bits16 => 2,
        };
        self.data.len() / (bytes_per_sample * self.format.channels.max(1) as usize)
    }
}

/// A peripheral that accumulates samples while the processor runs.
pub trait AudioGenerator {
    fn format(&self) -> AudioFormat;

    /// Hands off the samples accumulated since the last pull, or `None` when
    /// there is nothing worth playing.
    fn pull_samples(&mut self) -> Option<AudioBuffer>;
}

/// Converts any supported buffer to interleaved stereo `i16`.
///
/// 8-bit samples are scaled by 256 and mono is duplicated to both channels.
/// The conversion is exact; no rounding or dithering is applied.
pub fn to_stereo_i16(buffer: &AudioBuffer) -> Vec<i16> {
    let samples: Vec<i16> = match buffer.format.width {
        SampleWidth::Bits8 => buffer
            .data
            .iter()
            .map(|&b| (b as i8 as i16) * 256)
            .collect(),
        SampleWidth::Bits16 => buffer
            .data
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect(),
    };

    if buffer.format.channels >= 2 {
        return samples;
    }
    let mut stereo = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        stereo.push(s);
        stereo.push(s);
    }
    stereo
}

/// Encodes interleaved `i16` samples as little-endian bytes.
pub fn i16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(width: SampleWidth, channels: u8, data: Vec<u8>) -> AudioBuffer {
        AudioBuffer {
            format: AudioFormat {
                width,
                channels,
                sample_rate: 44_100,
            },
            data,
        }
    }

    #[test]
    fn eight_bit_mono_scales_and_duplicates() {
        let data: Vec<u8> = (0..=255).collect();
        let out = to_stereo_i16(&buffer(SampleWidth::Bits8, 1, data.clone()));
        assert_eq!(out.len(), 512);
        for (i, &b) in data.iter().enumerate() {
            let expected = (b as i8 as i16) * 256;
            assert_eq!(out[2 * i], expected);
            assert_eq!(out[2 * i + 1], expected);
        }
    }

    #[test]
    fn sixteen_bit_stereo_passes_through() {
        let samples = [i16::MIN, -1, 0, 1, i16::MAX, 1234];
        let out = to_stereo_i16(&buffer(
            SampleWidth::Bits16,
            2,
            i16_to_le_bytes(&samples),
        ));
        assert_eq!(out, samples);
    }

    #[test]
    fn frame_count() {
        let b = buffer(SampleWidth::Bits16, 2, vec![0; 40]);
        assert_eq!(b.frames(), 10);
    }
}
