//! Camera driver boundary
//!
//! A driver enumerates capture devices and opens pipelines; a pipeline hands
//! out synchronized frame sets until it is closed. Implementations wrap a
//! vendor SDK or simulate one.

use crate::device::CameraInfo;
use crate::error::DeviceError;
use crate::frame::{FrameSet, StreamSpec};

pub trait CameraDriver: Send + Sync {
    /// List connected capture devices
    fn enumerate_devices(&self) -> Result<Vec<CameraInfo>, DeviceError>;

    /// Open a pipeline with independent color and depth channels
    fn open_pipeline(
        &self,
        color: &StreamSpec,
        depth: &StreamSpec,
    ) -> Result<Box<dyn Pipeline>, DeviceError>;
}

pub trait Pipeline: Send {
    /// Block until the next frame set is available or the driver times out
    fn wait_for_frames(&mut self) -> Result<FrameSet, DeviceError>;

    /// Stop streaming and release the device
    fn close(&mut self) -> Result<(), DeviceError>;
}
