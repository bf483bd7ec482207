use std::path::Path;

use mvp_core::PipelineConfig;
use tracing::debug;

use crate::error::Result;
use crate::json::read_json;

/// Load and validate a pipeline config; absent keys take their defaults
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let config: PipelineConfig = read_json(path)?;
    config.validate()?;
    debug!(path = %path.display(), ?config, "pipeline config loaded");
    Ok(config)
}
