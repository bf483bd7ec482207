//! Multi-view keypoint triangulation: calibrated cameras, rectification,
//! DLT triangulation and reprojection scoring.

pub mod aggregate;
pub mod camera;
pub mod config;
pub mod error;
pub mod observation;
pub mod pipeline;
pub mod rectify;
pub mod reproject;
pub mod skeleton;
pub mod triangulate;

pub use aggregate::{Aggregation, MultiViewFrame, aggregate};
pub use camera::{CalibrationParams, Camera, CameraRig, DistortionModel, UndistortMap, UndistortMapCache};
pub use config::PipelineConfig;
pub use error::{CalibrationError, MvpError, Result, Unresolved};
pub use observation::{Association, BoundingBox, CameraId, FrameIndex, Keypoint2d, KeypointSet, Visibility};
pub use pipeline::{ImageObservation, Pipeline, PipelineOutput, PolicyCounters, RectifiedObservation, ReprojectedObservation};
pub use rectify::{Rectified, Rectifier};
pub use reproject::{ErrorSummary, ReprojectionRecord, ReprojectionReport, Reprojector, ScoringOptions};
pub use skeleton::Skeleton3d;
pub use triangulate::{Triangulation, TriangulationStats, Triangulator, triangulate_point};
