//! File formats around the triangulation pipeline: camera calibrations,
//! COCO keypoint datasets, image-name association and skeleton JSON.

pub mod calibration;
pub mod coco;
pub mod config;
pub mod dimensions;
pub mod error;
pub mod json;
pub mod naming;
pub mod skeleton;

pub use calibration::{CalibrationFile, calibration_path, load_calibration, load_rig};
pub use coco::{CocoAnnotation, CocoCategory, CocoDataset, CocoImage};
pub use config::load_config;
pub use dimensions::{DimensionResolver, probe_dimensions};
pub use error::{IoError, Result};
pub use naming::{frame_key, parse_frame_key, parse_image_name};
pub use skeleton::{SkeletonFile, read_skeletons, write_skeletons};
