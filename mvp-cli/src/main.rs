//! `mvp`: multi-view keypoint triangulation
//!
//! ```bash
//! mvp run _annotations.coco.json --output-dir out --cameras 2,5,8,13
//! mvp triangulate _annotations.coco.rectified.json -o triangulated_3d_skeleton.json
//! ```

mod logger;
mod report;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mvp_core::{
    Aggregation, CameraId, FrameIndex, ImageObservation, Pipeline, PipelineConfig, Skeleton3d,
    aggregate,
};
use mvp_io::json::write_json;
use mvp_io::{CocoDataset, DimensionResolver, load_config, load_rig, read_skeletons, write_skeletons};
use tracing::info;

use crate::logger::init_logger;

const RECTIFIED_FILE: &str = "_annotations.coco.rectified.json";
const SKELETON_FILE: &str = "triangulated_3d_skeleton.json";
const REPROJECTED_FILE: &str = "reprojected_annotations.json";
const ERROR_FILE: &str = "reprojection_error.json";

#[derive(Parser, Debug)]
#[command(name = "mvp", version, about = "Multi-view keypoint triangulation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Undistort keypoints and boxes of a COCO dataset
    Rectify(RectifyArgs),
    /// Triangulate 3D skeletons from rectified annotations
    Triangulate(TriangulateArgs),
    /// Score skeletons against rectified annotations
    Reproject(ReprojectArgs),
    /// Write a COCO dataset of reprojected skeletons
    ExportReprojected(ExportArgs),
    /// Rectify, triangulate, score and export in one pass
    Run(RunArgs),
}

#[derive(Args, Clone, Debug)]
struct CommonArgs {
    /// Pipeline config JSON; flags below override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Directory holding cam_<id>/calib/camera_calib.json
    #[arg(long, value_name = "DIR")]
    calibration_root: Option<PathBuf>,
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    cameras: Option<Vec<CameraId>>,
    /// Visible views needed to triangulate a joint
    #[arg(long)]
    min_views: Option<usize>,
}

#[derive(Args, Clone, Debug)]
struct RectifyArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(value_name = "ANNOTATIONS")]
    annotations: PathBuf,
    #[arg(short, long, default_value = RECTIFIED_FILE)]
    output: PathBuf,
    /// Probe image files here when the dataset omits width/height
    #[arg(long, value_name = "DIR")]
    image_root: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
struct TriangulateArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(value_name = "RECTIFIED_ANNOTATIONS")]
    annotations: PathBuf,
    #[arg(short, long, default_value = SKELETON_FILE)]
    output: PathBuf,
}

#[derive(Args, Clone, Debug)]
struct ReprojectArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(value_name = "RECTIFIED_ANNOTATIONS")]
    annotations: PathBuf,
    #[arg(long, default_value = SKELETON_FILE)]
    skeleton: PathBuf,
    /// Also write the error summary as JSON
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
struct ExportArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(value_name = "RECTIFIED_ANNOTATIONS")]
    annotations: PathBuf,
    #[arg(long, default_value = SKELETON_FILE)]
    skeleton: PathBuf,
    #[arg(short, long, default_value = REPROJECTED_FILE)]
    output: PathBuf,
}

#[derive(Args, Clone, Debug)]
struct RunArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(value_name = "ANNOTATIONS")]
    annotations: PathBuf,
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
    #[arg(long, value_name = "DIR")]
    image_root: Option<PathBuf>,
}

impl CommonArgs {
    fn config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(root) = &self.calibration_root {
            config.calibration_root = root.clone();
        }
        if let Some(cameras) = &self.cameras {
            config.camera_ids = cameras.clone();
        }
        if let Some(min_views) = self.min_views {
            config.min_views = min_views;
        }
        config.validate().context("invalid pipeline config")?;
        Ok(config)
    }

    fn pipeline(&self) -> Result<Pipeline> {
        let config = self.config()?;
        let rig = load_rig(&config).context("loading camera calibrations")?;
        Ok(Pipeline::new(config, rig)?)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger();

    match cli.command {
        Command::Rectify(args) => rectify(args),
        Command::Triangulate(args) => triangulate(args),
        Command::Reproject(args) => reproject(args),
        Command::ExportReprojected(args) => export_reprojected(args),
        Command::Run(args) => run(args),
    }
}

fn load_dataset(path: &Path) -> Result<CocoDataset> {
    CocoDataset::load(path).with_context(|| format!("loading annotations {}", path.display()))
}

/// Observations of an already rectified dataset; image sizes are not needed
fn rectified_observations(dataset: &CocoDataset) -> Result<Vec<ImageObservation>> {
    Ok(dataset.observations(|img| Ok(img.dimensions().unwrap_or((0, 0))))?)
}

fn aggregate_rectified(dataset: &CocoDataset) -> Result<Aggregation> {
    let observations = rectified_observations(dataset)?;
    let aggregation = aggregate(observations.into_iter().map(|o| (o.association, o.keypoints)));
    info!(
        frames = aggregation.frames.len(),
        dropped = aggregation.dropped,
        "annotations grouped by frame"
    );
    Ok(aggregation)
}

fn load_skeletons(path: &Path) -> Result<BTreeMap<FrameIndex, Skeleton3d>> {
    read_skeletons(path).with_context(|| format!("loading skeletons {}", path.display()))
}

fn rectify(args: RectifyArgs) -> Result<()> {
    let mut pipeline = args.common.pipeline()?;
    let mut dataset = load_dataset(&args.annotations)?;

    let resolver = DimensionResolver::new(args.image_root);
    let observations = dataset.observations(|img| resolver.resolve(img))?;
    let (rectified, counters) = pipeline.rectify(observations)?;
    report::log_counters(&counters);

    dataset.apply_rectified(&rectified)?;
    dataset.save(&args.output)?;
    info!("Rectified annotations saved to {}", args.output.display());
    Ok(())
}

fn triangulate(args: TriangulateArgs) -> Result<()> {
    let pipeline = args.common.pipeline()?;
    let dataset = load_dataset(&args.annotations)?;

    let aggregation = aggregate_rectified(&dataset)?;
    let triangulation = pipeline.triangulate(&aggregation);
    report::log_triangulation(&triangulation.stats, triangulation.skeletons.len());
    report::log_bone_lengths(&triangulation.skeletons);

    write_skeletons(&args.output, &triangulation.skeletons)?;
    info!("3D skeletons saved to {}", args.output.display());
    Ok(())
}

fn reproject(args: ReprojectArgs) -> Result<()> {
    let pipeline = args.common.pipeline()?;
    let dataset = load_dataset(&args.annotations)?;
    let skeletons = load_skeletons(&args.skeleton)?;

    let aggregation = aggregate_rectified(&dataset)?;
    let report = pipeline.score(&skeletons, &aggregation.ground_truth());
    report::log_error_report(&report);

    if let Some(path) = &args.report {
        write_json(path, &report.summary)?;
        info!("Error summary saved to {}", path.display());
    }
    Ok(())
}

fn export_reprojected(args: ExportArgs) -> Result<()> {
    let pipeline = args.common.pipeline()?;
    let dataset = load_dataset(&args.annotations)?;
    let skeletons = load_skeletons(&args.skeleton)?;

    let reprojected = pipeline.reproject_images(&skeletons, dataset.image_associations());
    let exported = dataset.with_reprojections(&reprojected)?;
    exported.save(&args.output)?;
    info!(
        "Wrote {} reprojected annotations to {}",
        exported.annotations.len(),
        args.output.display()
    );
    Ok(())
}

fn run(args: RunArgs) -> Result<()> {
    let mut pipeline = args.common.pipeline()?;
    let mut dataset = load_dataset(&args.annotations)?;

    let resolver = DimensionResolver::new(args.image_root);
    let observations = dataset.observations(|img| resolver.resolve(img))?;
    let output = pipeline.run(observations)?;

    report::log_counters(&output.counters);
    report::log_triangulation(
        &output.triangulation.stats,
        output.triangulation.skeletons.len(),
    );
    report::log_bone_lengths(&output.triangulation.skeletons);
    report::log_error_report(&output.report);

    let out = &args.output_dir;
    dataset.apply_rectified(&output.rectified)?;
    dataset.save(&out.join(RECTIFIED_FILE))?;
    write_skeletons(&out.join(SKELETON_FILE), &output.triangulation.skeletons)?;
    write_json(&out.join(ERROR_FILE), &output.report.summary)?;

    let reprojected = pipeline.reproject_images(
        &output.triangulation.skeletons,
        dataset.image_associations(),
    );
    let exported = dataset.with_reprojections(&reprojected)?;
    exported.save(&out.join(REPROJECTED_FILE))?;

    info!("Outputs written to {}", out.display());
    Ok(())
}
