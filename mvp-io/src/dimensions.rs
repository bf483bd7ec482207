//! Image sizes for COCO entries that omit `width`/`height`

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::coco::CocoImage;
use crate::error::{IoError, Result};

/// Read the size from the image header without decoding pixels
pub fn probe_dimensions(path: &Path) -> Result<(u32, u32)> {
    let (w, h) = ::image::image_dimensions(path)?;
    debug!(path = %path.display(), width = w, height = h, "image size probed");
    Ok((w, h))
}

/// Resolves the size of COCO images, probing files under `image_root`
/// when the dataset leaves it out
#[derive(Debug, Clone, Default)]
pub struct DimensionResolver {
    image_root: Option<PathBuf>,
}

impl DimensionResolver {
    pub fn new(image_root: Option<PathBuf>) -> Self {
        Self { image_root }
    }

    pub fn resolve(&self, image: &CocoImage) -> Result<(u32, u32)> {
        if let Some(dims) = image.dimensions() {
            return Ok(dims);
        }
        match &self.image_root {
            Some(root) => probe_dimensions(&root.join(&image.file_name)),
            None => Err(IoError::InvalidInput(format!(
                "image {} ({}) has no width/height and no image root was given",
                image.id, image.file_name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn image(width: Option<u32>, height: Option<u32>) -> CocoImage {
        CocoImage {
            id: 7,
            file_name: "out2_frame_0001.png".to_string(),
            width,
            height,
            extra: None,
            rest: Map::new(),
        }
    }

    #[test]
    fn test_stored_dimensions_win() {
        let resolver = DimensionResolver::new(Some(PathBuf::from("/nonexistent")));
        assert_eq!(resolver.resolve(&image(Some(640), Some(480))).unwrap(), (640, 480));
    }

    #[test]
    fn test_missing_dimensions_without_root() {
        let resolver = DimensionResolver::default();
        assert!(matches!(
            resolver.resolve(&image(Some(640), None)),
            Err(IoError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_probe_written_image() {
        let dir = std::env::temp_dir().join(format!("mvp-io-dims-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        ::image::RgbImage::new(12, 5)
            .save(dir.join("out2_frame_0001.png"))
            .unwrap();

        let resolver = DimensionResolver::new(Some(dir.clone()));
        assert_eq!(resolver.resolve(&image(None, None)).unwrap(), (12, 5));

        let missing = CocoImage {
            file_name: "absent.png".to_string(),
            ..image(None, None)
        };
        assert!(resolver.resolve(&missing).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
