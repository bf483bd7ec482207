//! Calibrated camera model, distortion and undistortion maps

mod distortion;
mod pinhole;
mod remap;
mod rig;

pub use distortion::{DistortionError, DistortionModel};
pub use pinhole::{CalibrationParams, Camera};
pub use remap::{MapKey, UndistortMap, UndistortMapCache};
pub use rig::CameraRig;
