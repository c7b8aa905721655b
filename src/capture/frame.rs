use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pixel formats the capture layer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 16-bit unsigned depth, one unit = 1 millimeter
    Depth1Mm,
    /// 3 bytes per pixel, red-green-blue (driver-native order)
    Rgb888,
    /// 3 bytes per pixel, blue-green-red (consumer order)
    Bgr888,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Depth1Mm => 2,
            PixelFormat::Rgb888 | PixelFormat::Bgr888 => 3,
        }
    }
}

/// One frame as delivered by the driver layer.
///
/// Single-buffering semantics: a driver may reuse its backing storage, so a
/// `RawFrame` is only guaranteed meaningful until the next read on the same
/// stream. Adapt or copy before reading again.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,

    /// Frame payload. Empty when the driver delivered no data for this frame.
    pub data: Bytes,

    /// Hardware timestamp if the driver provides one
    pub device_timestamp: Option<Duration>,
}

impl RawFrame {
    /// Payload size a well-formed frame of these dimensions must have
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_len_follows_format() {
        let frame = RawFrame {
            width: 320,
            height: 240,
            format: PixelFormat::Depth1Mm,
            data: Bytes::new(),
            device_timestamp: None,
        };
        assert_eq!(frame.expected_len(), 320 * 240 * 2);

        let frame = RawFrame {
            format: PixelFormat::Rgb888,
            ..frame
        };
        assert_eq!(frame.expected_len(), 320 * 240 * 3);
    }
}
