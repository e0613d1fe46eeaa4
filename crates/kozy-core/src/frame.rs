//! Sensor frames, display images, and stream configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// One of the two independent camera channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Color,
    Depth,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Color => write!(f, "color"),
            Self::Depth => write!(f, "depth"),
        }
    }
}

/// Sensor-native layout requested from the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireFormat {
    /// Interleaved 8-bit RGB
    Rgb8,
    /// 16-bit linear depth, little-endian, typically millimetres
    Z16,
}

impl WireFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Z16 => 2,
        }
    }
}

/// Configuration for one channel of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub channel: Channel,
    pub width: u32,
    pub height: u32,
    pub format: WireFormat,
    pub fps: u32,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamConfigError {
    #[error("Invalid resolution '{0}', expected WIDTHxHEIGHT")]
    InvalidResolution(String),
    #[error("Resolution must be non-zero, got {0}x{1}")]
    ZeroDimension(u32, u32),
    #[error("Frame rate must be at least 1 fps")]
    ZeroFps,
}

/// Size and rate chosen by the user before a session starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl StreamConfig {
    pub fn new(width: u32, height: u32, fps: u32) -> Result<Self, StreamConfigError> {
        if width == 0 || height == 0 {
            return Err(StreamConfigError::ZeroDimension(width, height));
        }
        if fps == 0 {
            return Err(StreamConfigError::ZeroFps);
        }
        Ok(Self { width, height, fps })
    }

    /// Parse a "1280x720" style resolution together with a frame rate
    pub fn parse(resolution: &str, fps: u32) -> Result<Self, StreamConfigError> {
        let (width, height) = parse_resolution(resolution)?;
        Self::new(width, height, fps)
    }

    /// Resolution as "WIDTHxHEIGHT"
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Period of the recurring acquisition tick (1000 / fps, integer division)
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(u64::from(1000 / self.fps.max(1)))
    }

    pub fn color_spec(&self) -> StreamSpec {
        StreamSpec {
            channel: Channel::Color,
            width: self.width,
            height: self.height,
            format: WireFormat::Rgb8,
            fps: self.fps,
        }
    }

    pub fn depth_spec(&self) -> StreamSpec {
        StreamSpec {
            channel: Channel::Depth,
            width: self.width,
            height: self.height,
            format: WireFormat::Z16,
            fps: self.fps,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
        }
    }
}

impl std::fmt::Display for StreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} @ {} FPS", self.width, self.height, self.fps)
    }
}

fn parse_resolution(text: &str) -> Result<(u32, u32), StreamConfigError> {
    let invalid = || StreamConfigError::InvalidResolution(text.to_string());
    let (w, h) = text.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
    let width = u32::from_str(w.trim()).map_err(|_| invalid())?;
    let height = u32::from_str(h.trim()).map_err(|_| invalid())?;
    Ok((width, height))
}

/// One channel's raw sample for one acquisition cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub channel: Channel,
    pub width: u32,
    pub height: u32,
    /// Raw bytes: interleaved RGB for color, little-endian u16 for depth
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(channel: Channel, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            channel,
            width,
            height,
            data,
        }
    }

    /// None when the dimensions cannot be addressed on this platform
    pub fn pixel_count(&self) -> Option<usize> {
        let width = usize::try_from(self.width).ok()?;
        let height = usize::try_from(self.height).ok()?;
        width.checked_mul(height)
    }
}

/// Frames returned by one pipeline wait. Either channel may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSet {
    pub color: Option<Frame>,
    pub depth: Option<Frame>,
}

/// Pixel layout of a display image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Gray8,
    Rgb8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Rgb8 => 3,
        }
    }
}

/// Renderer-ready image derived from exactly one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayImage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl DisplayImage {
    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }
}
