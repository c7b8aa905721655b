//! Raw frame -> consumer-ready image conversion and the admission gate

use bytes::Bytes;

use crate::capture::frame::{PixelFormat, RawFrame};

/// Single-channel 16-bit depth image, millimeter units, row-major
/// little-endian. Shares the raw frame's buffer, no copy.
#[derive(Debug, Clone)]
pub struct DepthImage {
    pub width: u32,
    pub height: u32,
    data: Bytes,
}

impl DepthImage {
    /// Sole admission criterion: non-empty backing data of the size the
    /// dimensions demand.
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty()
            && self.data.len() == self.width as usize * self.height as usize * 2
    }

    /// Depth at (x, y) in millimeters. Panics out of bounds, like any slice.
    pub fn at(&self, x: u32, y: u32) -> u16 {
        let i = (y as usize * self.width as usize + x as usize) * 2;
        u16::from_le_bytes([self.data[i], self.data[i + 1]])
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// 3-channel byte image in blue-green-red order (the tracking consumer's
/// expected layout), row-major.
#[derive(Debug, Clone)]
pub struct ColorImage {
    pub width: u32,
    pub height: u32,
    data: Bytes,
}

impl ColorImage {
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty()
            && self.data.len() == self.width as usize * self.height as usize * 3
    }

    /// Pixel at (x, y) as [b, g, r]
    pub fn at(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Reinterpret a raw depth frame as a millimeter grid.
///
/// Zero-copy: the image shares the raw buffer. A frame with missing or
/// size-mismatched data yields an invalid image, which the pipeline drops.
pub fn adapt_depth(raw: &RawFrame) -> DepthImage {
    let data = if raw.format == PixelFormat::Depth1Mm && raw.data.len() == raw.expected_len() {
        raw.data.clone()
    } else {
        Bytes::new()
    };
    DepthImage {
        width: raw.width,
        height: raw.height,
        data,
    }
}

/// Reinterpret a raw RGB888 frame and reorder channels to BGR.
///
/// The reorder rewrites every pixel, so this one allocates.
pub fn adapt_color(raw: &RawFrame) -> ColorImage {
    let data = if raw.format == PixelFormat::Rgb888 && raw.data.len() == raw.expected_len() {
        let mut buf = raw.data.to_vec();
        swap_channel_order(&mut buf);
        Bytes::from(buf)
    } else {
        Bytes::new()
    };
    ColorImage {
        width: raw.width,
        height: raw.height,
        data,
    }
}

/// Swap the first and third channel of every 3-byte pixel in place
/// (RGB <-> BGR). Self-inverse. A trailing partial pixel is left untouched.
pub fn swap_channel_order(buf: &mut [u8]) {
    for px in buf.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
}
