//! Video frame types and processing

/// Pixel format delivered by a camera backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Yuyv,
    Mjpeg,
}

impl PixelFormat {
    /// Bytes per pixel for uncompressed formats
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            PixelFormat::Rgb24 => Some(3),
            PixelFormat::Yuyv => Some(2),
            PixelFormat::Mjpeg => None,
        }
    }
}

/// Decoded RGB video frame
///
/// Frames are immutable snapshots; the capture path hands out a new one per
/// sampling tick and never mutates a frame after it has been produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture order within the owning session
    pub sequence: u64,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        debug_assert_eq!(data.len(), (width * height * 3) as usize);
        Self {
            data,
            width,
            height,
            sequence,
        }
    }

    /// Create a frame where every pixel has the same colour
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Self::new(data, width, height, 0)
    }

    /// Number of pixels in the frame
    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Scale into an RGB surface of `width` x `height` (nearest neighbour)
    ///
    /// `surface` is cleared and refilled so its allocation is reused
    /// across ticks.
    pub fn scale_into(&self, surface: &mut Vec<u8>, width: u32, height: u32) {
        surface.clear();
        surface.reserve((width * height * 3) as usize);

        if self.width == width && self.height == height {
            surface.extend_from_slice(&self.data);
            return;
        }

        let x_ratio = self.width as f32 / width as f32;
        let y_ratio = self.height as f32 / height as f32;

        for y in 0..height {
            for x in 0..width {
                let src_x = ((x as f32 * x_ratio) as u32).min(self.width.saturating_sub(1));
                let src_y = ((y as f32 * y_ratio) as u32).min(self.height.saturating_sub(1));

                match self.get_pixel(src_x, src_y) {
                    Some(pixel) => surface.extend_from_slice(&pixel),
                    None => surface.extend_from_slice(&[0, 0, 0]),
                }
            }
        }
    }

    /// Convert a packed YUYV (YUV 4:2:2) buffer to RGB
    pub fn from_yuyv(yuyv: &[u8], width: u32, height: u32, sequence: u64) -> Option<VideoFrame> {
        let expected = (width * height * 2) as usize;
        if width % 2 != 0 || yuyv.len() < expected {
            return None;
        }

        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        for chunk in yuyv[..expected].chunks_exact(4) {
            let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
            rgb.extend_from_slice(&yuv_to_rgb(y0, u, v));
            rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
        }

        Some(VideoFrame::new(rgb, width, height, sequence))
    }
}

/// BT.601 studio-swing conversion
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let clamp = |value: i32| value.clamp(0, 255) as u8;

    [
        clamp((298 * c + 409 * e + 128) >> 8),
        clamp((298 * c - 100 * d - 208 * e + 128) >> 8),
        clamp((298 * c + 516 * d + 128) >> 8),
    ]
}

/// Decode a buffer delivered by a backend in `format` into an RGB frame
///
/// Returns `None` when the buffer is truncated or undecodable, which the
/// capture path treats like a frame that is not ready yet.
pub fn decode(
    raw: &[u8],
    format: PixelFormat,
    width: u32,
    height: u32,
    sequence: u64,
) -> Option<VideoFrame> {
    match format {
        PixelFormat::Rgb24 => {
            let len = (width * height) as usize * format.bytes_per_pixel()?;
            if raw.len() < len {
                return None;
            }
            Some(VideoFrame::new(raw[..len].to_vec(), width, height, sequence))
        }
        PixelFormat::Yuyv => VideoFrame::from_yuyv(raw, width, height, sequence),
        PixelFormat::Mjpeg => decode_mjpeg(raw, sequence).ok(),
    }
}

/// Decode MJPEG frame to RGB
pub fn decode_mjpeg(mjpeg_data: &[u8], sequence: u64) -> Result<VideoFrame, image::ImageError> {
    use image::ImageFormat;

    let img = image::load_from_memory_with_format(mjpeg_data, ImageFormat::Jpeg)?;
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    Ok(VideoFrame {
        data: rgb.into_raw(),
        width,
        height,
        sequence,
    })
}
