//! rollcall-hw — hardware abstraction for webcam capture.
//!
//! Provides V4L2-based camera access (YUYV and MJPG webcams) and the
//! `FrameSource` implementation the session loop consumes.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, CameraStream, DeviceInfo, PixelFormat};
pub use frame::Frame;
