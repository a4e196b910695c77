//! Video frame types and processing

use crate::CaptureError;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        timestamp_ns: u64,
        sequence: u32,
    ) -> Result<Self, CaptureError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(CaptureError::Format(format!(
                "expected {} bytes for {}x{} RGB, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        })
    }

    /// Frame filled with a single color
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            data,
            width,
            height,
            timestamp_ns: 0,
            sequence: 0,
        }
    }

    /// Wrap an `image` RGB buffer
    pub fn from_rgb_image(img: image::RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        let (width, height) = img.dimensions();
        Self {
            data: img.into_raw(),
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Borrow the frame as an `image` buffer view
    pub fn as_rgb_image(&self) -> Option<image::ImageBuffer<image::Rgb<u8>, &[u8]>> {
        image::ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Set pixel at (x, y); out-of-bounds writes are ignored
    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.data[idx..idx + 3].copy_from_slice(&rgb);
    }

    /// Unweighted channel mean at (x, y), 0..=255
    pub fn intensity(&self, x: u32, y: u32) -> Option<f32> {
        self.get_pixel(x, y)
            .map(|[r, g, b]| (r as f32 + g as f32 + b as f32) / 3.0)
    }

    /// Resize frame (nearest neighbor)
    pub fn resize(&self, new_width: u32, new_height: u32) -> VideoFrame {
        if new_width == self.width && new_height == self.height {
            return self.clone();
        }

        let mut resized = Vec::with_capacity((new_width * new_height * 3) as usize);

        let x_ratio = self.width as f32 / new_width as f32;
        let y_ratio = self.height as f32 / new_height as f32;

        for y in 0..new_height {
            for x in 0..new_width {
                let x0 = (x as f32 * x_ratio).floor() as u32;
                let y0 = (y as f32 * y_ratio).floor() as u32;

                match self.get_pixel(x0.min(self.width - 1), y0.min(self.height - 1)) {
                    Some(pixel) => resized.extend_from_slice(&pixel),
                    None => resized.extend_from_slice(&[0, 0, 0]),
                }
            }
        }

        VideoFrame {
            data: resized,
            width: new_width,
            height: new_height,
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        }
    }

    /// Downsample to an intensity plane, averaging `factor` x `factor` blocks.
    ///
    /// Trailing rows/columns that do not fill a whole block are dropped.
    pub fn downsample(&self, factor: u32) -> GrayPlane {
        let factor = factor.max(1);
        let width = self.width / factor;
        let height = self.height / factor;
        let block = (factor * factor) as f32;

        let mut data = Vec::with_capacity((width * height) as usize);
        for by in 0..height {
            for bx in 0..width {
                let mut sum = 0.0;
                for dy in 0..factor {
                    for dx in 0..factor {
                        sum += self
                            .intensity(bx * factor + dx, by * factor + dy)
                            .unwrap_or(0.0);
                    }
                }
                data.push(sum / block);
            }
        }

        GrayPlane {
            width,
            height,
            data,
        }
    }
}

/// Single-channel intensity plane used for frame-to-frame differencing
#[derive(Debug, Clone, PartialEq)]
pub struct GrayPlane {
    pub width: u32,
    pub height: u32,
    /// Row-major intensities (0.0 - 255.0)
    pub data: Vec<f32>,
}

impl GrayPlane {
    /// Plane filled with a single intensity
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; (width * height) as usize],
        }
    }

    /// Intensity at (x, y)
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[(y * self.width + x) as usize])
    }

    /// Set intensity at (x, y); out-of-bounds writes are ignored
    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        if x < self.width && y < self.height {
            self.data[(y * self.width + x) as usize] = value;
        }
    }

    pub fn same_size(&self, other: &GrayPlane) -> bool {
        self.width == other.width && self.height == other.height
    }
}
