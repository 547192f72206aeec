use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use duo_emu_core::video::VideoFrame;

use crate::error::CliError;

/// Packs `0x00RRGGBB` pixels into RGB8 rows.
pub fn rgb_bytes(frame: &VideoFrame) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.pixels.len() * 3);
    for &p in &frame.pixels {
        out.push((p >> 16) as u8);
        out.push((p >> 8) as u8);
        out.push(p as u8);
    }
    out
}

pub fn encode<W: Write>(frame: &VideoFrame, w: W) -> Result<(), CliError> {
    let mut encoder = png::Encoder::new(w, frame.width as u32, frame.height as u32);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&rgb_bytes(frame))?;
    Ok(())
}

pub fn save(frame: &VideoFrame, path: &Path) -> Result<(), CliError> {
    let file = File::create(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    encode(frame, BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_channels() {
        let mut frame = VideoFrame::new(2, 1);
        frame.pixels = vec![0x00E0F8D0, 0x00081820];
        assert_eq!(rgb_bytes(&frame), vec![0xE0, 0xF8, 0xD0, 0x08, 0x18, 0x20]);
    }

    #[test]
    fn writes_a_png_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        let mut frame = VideoFrame::new(64, 32);
        frame.pixels[0] = 0x00FFFFFF;
        save(&frame, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        // IHDR width and height
        assert_eq!(&bytes[16..24], &[0, 0, 0, 64, 0, 0, 0, 32]);
    }
}
