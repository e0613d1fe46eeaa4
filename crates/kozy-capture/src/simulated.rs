//! Simulated depth camera
//!
//! Stands in for a vendor SDK: one enumerated device whose pipelines produce
//! a moving color gradient and a depth ramp, paced at the requested rate.

use kozy_core::{
    CameraDriver, CameraInfo, Channel, DeviceError, Frame, FrameSet, Pipeline, StreamSpec,
    WireFormat,
};
use std::time::{Duration, Instant};
use tracing::debug;

/// Nearest and farthest distance of the simulated depth ramp
const RAMP_NEAR_MM: u32 = 300;
const RAMP_FAR_MM: u32 = 4000;

#[derive(Debug, Clone)]
pub struct SimulatedCamera {
    info: CameraInfo,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        Self {
            info: CameraInfo {
                name: "Simulated D415".to_string(),
                serial: "SIM-0001".to_string(),
            },
        }
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraDriver for SimulatedCamera {
    fn enumerate_devices(&self) -> Result<Vec<CameraInfo>, DeviceError> {
        Ok(vec![self.info.clone()])
    }

    fn open_pipeline(
        &self,
        color: &StreamSpec,
        depth: &StreamSpec,
    ) -> Result<Box<dyn Pipeline>, DeviceError> {
        for (spec, channel, format) in [
            (color, Channel::Color, WireFormat::Rgb8),
            (depth, Channel::Depth, WireFormat::Z16),
        ] {
            if spec.channel != channel || spec.format != format {
                return Err(DeviceError::Driver(format!(
                    "unsupported {} stream format {:?}",
                    channel, spec.format
                )));
            }
            if spec.width == 0 || spec.height == 0 || spec.fps == 0 {
                return Err(DeviceError::Driver(format!(
                    "couldn't resolve {} request {}x{} @ {}",
                    channel, spec.width, spec.height, spec.fps
                )));
            }
        }
        debug!(serial = %self.info.serial, "Simulated pipeline opened");
        Ok(Box::new(SimulatedPipeline::new(*color, *depth)))
    }
}

struct SimulatedPipeline {
    color: StreamSpec,
    depth: StreamSpec,
    period: Duration,
    next_due: Instant,
    frame_index: u64,
    closed: bool,
}

impl SimulatedPipeline {
    fn new(color: StreamSpec, depth: StreamSpec) -> Self {
        let period = Duration::from_secs(1) / color.fps.max(1);
        Self {
            color,
            depth,
            period,
            next_due: Instant::now(),
            frame_index: 0,
            closed: false,
        }
    }

    fn color_frame(&self) -> Frame {
        let (w, h) = (self.color.width as usize, self.color.height as usize);
        let shift = (self.frame_index % 256) as u8;
        let mut data = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                data.push((x * 255 / w.max(1)) as u8);
                data.push((y * 255 / h.max(1)) as u8);
                data.push(shift);
            }
        }
        Frame::new(Channel::Color, self.color.width, self.color.height, data)
    }

    fn depth_frame(&self) -> Frame {
        let (w, h) = (self.depth.width as usize, self.depth.height as usize);
        let offset = (self.frame_index % 100) as u32 * 10;
        let mut data = Vec::with_capacity(w * h * 2);
        for _ in 0..h {
            for x in 0..w {
                let mm = RAMP_NEAR_MM + (RAMP_FAR_MM - RAMP_NEAR_MM) * x as u32 / w.max(1) as u32;
                data.extend_from_slice(&((mm + offset).min(u32::from(u16::MAX)) as u16).to_le_bytes());
            }
        }
        Frame::new(Channel::Depth, self.depth.width, self.depth.height, data)
    }
}

impl Pipeline for SimulatedPipeline {
    fn wait_for_frames(&mut self) -> Result<FrameSet, DeviceError> {
        if self.closed {
            return Err(DeviceError::Driver("pipeline closed".to_string()));
        }

        let now = Instant::now();
        if self.next_due > now {
            std::thread::sleep(self.next_due - now);
            self.next_due += self.period;
        } else {
            self.next_due = now + self.period;
        }

        let frames = FrameSet {
            color: Some(self.color_frame()),
            depth: Some(self.depth_frame()),
        };
        self.frame_index += 1;
        Ok(frames)
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.closed = true;
        Ok(())
    }
}
