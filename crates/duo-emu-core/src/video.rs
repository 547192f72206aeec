/// One completed video frame, `0x00RRGGBB` per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u32>,
}

impl VideoFrame {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height],
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * self.width + x]
    }
}

/// A peripheral that accumulates pixels while the processor runs.
pub trait VideoGenerator {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// Hands off the most recently completed frame and resets accumulation.
    fn pull_frame(&mut self) -> VideoFrame;
}
