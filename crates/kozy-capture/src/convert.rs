//! Conversion of raw sensor frames into display images
//!
//! Color frames are relabelled as RGB8 without touching the bytes. Depth
//! frames are clamped to a maximum distance and scaled linearly to 8-bit
//! grayscale. A reading of 0 (no return) displays the same as "very close";
//! that is a known limitation of the linear mapping.

use kozy_core::{Channel, DeviceError, DisplayImage, Frame, PixelFormat, WireFormat};

/// Default clamp distance for depth display
pub const DEFAULT_MAX_DEPTH_MM: u16 = 3000;

/// Map one depth sample to a gray level:
/// `round(clamp(px, 0, max_mm) / max_mm * 255)`
pub fn depth_to_display(px: i32, max_mm: u16) -> u8 {
    let max = f64::from(max_mm.max(1));
    let clamped = f64::from(px).clamp(0.0, max);
    (clamped / max * 255.0).round() as u8
}

/// Convert a frame on either channel
pub fn convert_frame(frame: &Frame, max_depth_mm: u16) -> Result<DisplayImage, DeviceError> {
    match frame.channel {
        Channel::Color => convert_color(frame),
        Channel::Depth => convert_depth(frame, max_depth_mm),
    }
}

/// Interleaved RGB8 in, RGB8 display image out
pub fn convert_color(frame: &Frame) -> Result<DisplayImage, DeviceError> {
    check_layout(frame, Channel::Color, WireFormat::Rgb8)?;
    Ok(DisplayImage {
        width: frame.width,
        height: frame.height,
        format: PixelFormat::Rgb8,
        data: frame.data.clone(),
    })
}

/// Little-endian u16 depth in, Gray8 display image out
pub fn convert_depth(frame: &Frame, max_mm: u16) -> Result<DisplayImage, DeviceError> {
    check_layout(frame, Channel::Depth, WireFormat::Z16)?;

    // Same divisor as depth_to_display, so a zero range saturates
    let max_mm = max_mm.max(1);
    let lut: Vec<u8> = (0..=max_mm)
        .map(|mm| depth_to_display(i32::from(mm), max_mm))
        .collect();
    let data = frame
        .data
        .chunks_exact(2)
        .map(|b| lut[usize::from(u16::from_le_bytes([b[0], b[1]]).min(max_mm))])
        .collect();

    Ok(DisplayImage {
        width: frame.width,
        height: frame.height,
        format: PixelFormat::Gray8,
        data,
    })
}

fn check_layout(frame: &Frame, channel: Channel, format: WireFormat) -> Result<(), DeviceError> {
    let impossible = |reason: String| DeviceError::ConversionImpossible { channel, reason };

    if frame.channel != channel {
        return Err(impossible(format!("got a {} frame", frame.channel)));
    }
    let expected = frame
        .pixel_count()
        .and_then(|pixels| pixels.checked_mul(format.bytes_per_pixel()))
        .ok_or_else(|| {
            impossible(format!(
                "{}x{} is too large to address",
                frame.width, frame.height
            ))
        })?;
    if expected == 0 {
        return Err(impossible(format!(
            "empty frame {}x{}",
            frame.width, frame.height
        )));
    }
    if frame.data.len() != expected {
        return Err(impossible(format!(
            "{}x{} needs {} bytes, buffer has {}",
            frame.width,
            frame.height,
            expected,
            frame.data.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth_frame(width: u32, height: u32, samples: &[u16]) -> Frame {
        let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Frame::new(Channel::Depth, width, height, data)
    }

    #[test]
    fn test_depth_table_over_full_range() {
        let max = DEFAULT_MAX_DEPTH_MM;
        for px in 0..=i32::from(max) {
            let expected = (f64::from(px) / f64::from(max) * 255.0).round() as u8;
            assert_eq!(depth_to_display(px, max), expected, "px = {}", px);
        }
    }

    #[test]
    fn test_depth_saturates_and_floors() {
        let max = DEFAULT_MAX_DEPTH_MM;
        assert_eq!(depth_to_display(0, max), 0);
        assert_eq!(depth_to_display(3000, max), 255);
        assert_eq!(depth_to_display(3001, max), 255);
        assert_eq!(depth_to_display(65535, max), 255);
        assert_eq!(depth_to_display(-1, max), 0);
        assert_eq!(depth_to_display(i32::MIN, max), 0);
    }

    #[test]
    fn test_depth_stable_under_reclamping() {
        let max = DEFAULT_MAX_DEPTH_MM;
        for level in 0..=255u8 {
            let back = (f64::from(level) / 255.0 * f64::from(max)).round() as i32;
            assert_eq!(depth_to_display(back, max), level);
        }
    }

    #[test]
    fn test_convert_depth_frame() {
        let frame = depth_frame(2, 2, &[0, 1500, 3000, 5000]);
        let image = convert_depth(&frame, DEFAULT_MAX_DEPTH_MM).unwrap();
        assert_eq!(image.format, PixelFormat::Gray8);
        assert_eq!((image.width, image.height), (2, 2));
        assert_eq!(image.data, vec![0, 128, 255, 255]);
        assert_eq!(image.stride(), 2);
    }

    #[test]
    fn test_convert_depth_custom_range() {
        let frame = depth_frame(3, 1, &[250, 500, 1000]);
        let image = convert_depth(&frame, 1000).unwrap();
        assert_eq!(image.data, vec![64, 128, 255]);
    }

    #[test]
    fn test_convert_color_is_relabel() {
        let data: Vec<u8> = (0..2 * 3 * 3).map(|b| b as u8).collect();
        let frame = Frame::new(Channel::Color, 3, 2, data.clone());
        let image = convert_color(&frame).unwrap();
        assert_eq!(image.format, PixelFormat::Rgb8);
        assert_eq!(image.data, data);
        assert_eq!(image.stride(), 9);
    }

    #[test]
    fn test_malformed_buffers() {
        let short = Frame::new(Channel::Color, 4, 4, vec![0; 10]);
        assert!(matches!(
            convert_color(&short),
            Err(DeviceError::ConversionImpossible {
                channel: Channel::Color,
                ..
            })
        ));

        let odd = Frame::new(Channel::Depth, 1, 1, vec![0; 3]);
        assert!(convert_depth(&odd, DEFAULT_MAX_DEPTH_MM).is_err());

        let empty = Frame::new(Channel::Depth, 0, 480, vec![]);
        assert!(convert_depth(&empty, DEFAULT_MAX_DEPTH_MM).is_err());

        let swapped = depth_frame(1, 1, &[100]);
        assert!(convert_color(&swapped).is_err());
    }

    #[test]
    fn test_oversized_dimensions_are_rejected() {
        let color = Frame::new(Channel::Color, u32::MAX, u32::MAX, vec![0; 3]);
        assert!(matches!(
            convert_color(&color),
            Err(DeviceError::ConversionImpossible {
                channel: Channel::Color,
                ..
            })
        ));

        let depth = Frame::new(Channel::Depth, u32::MAX, u32::MAX, vec![0; 2]);
        assert!(matches!(
            convert_depth(&depth, DEFAULT_MAX_DEPTH_MM),
            Err(DeviceError::ConversionImpossible {
                channel: Channel::Depth,
                ..
            })
        ));
    }

    #[test]
    fn test_zero_range_matches_scalar_mapping() {
        let samples = [0u16, 1, 500, u16::MAX];
        let frame = depth_frame(4, 1, &samples);
        let image = convert_depth(&frame, 0).unwrap();
        let expected: Vec<u8> = samples
            .iter()
            .map(|&px| depth_to_display(i32::from(px), 0))
            .collect();
        assert_eq!(image.data, expected);
        assert_eq!(image.data, vec![0, 255, 255, 255]);
    }

    #[test]
    fn test_convert_frame_dispatches_on_channel() {
        let frame = depth_frame(1, 1, &[3000]);
        let image = convert_frame(&frame, DEFAULT_MAX_DEPTH_MM).unwrap();
        assert_eq!(image.format, PixelFormat::Gray8);
        assert_eq!(image.data, vec![255]);
    }
}
