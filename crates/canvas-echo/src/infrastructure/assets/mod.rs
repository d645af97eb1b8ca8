//! Overlay asset loading.
//!
//! The watermark is loaded once, asynchronously, by location.  Loading only
//! decodes the raster; cropping and scaling to the configured placement
//! happen in [`canvas_core::OverlayAsset::prepare`].

use std::path::PathBuf;

use async_trait::async_trait;
use image::RgbaImage;
use thiserror::Error;
use tracing::debug;

/// Error type for overlay loading.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read overlay {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode overlay {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid overlay placement: {0}")]
    Placement(#[from] canvas_core::PlacementError),
}

/// Loads a raster image by location.
#[async_trait]
pub trait OverlayLoader: Send + Sync {
    async fn load(&self, location: &str) -> Result<RgbaImage, AssetError>;
}

/// Loads overlays from the local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileOverlayLoader;

#[async_trait]
impl OverlayLoader for FileOverlayLoader {
    async fn load(&self, location: &str) -> Result<RgbaImage, AssetError> {
        let path = PathBuf::from(location);
        let bytes = tokio::fs::read(&path).await.map_err(|source| AssetError::Io {
            path: path.clone(),
            source,
        })?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|source| AssetError::Decode {
                path: path.clone(),
                source,
            })?
            .to_rgba8();
        debug!(
            "overlay {} decoded ({}x{})",
            path.display(),
            decoded.width(),
            decoded.height()
        );
        Ok(decoded)
    }
}

/// Hands out an in-memory image whatever the location.
#[derive(Debug, Clone)]
pub struct StaticOverlayLoader {
    image: RgbaImage,
}

impl StaticOverlayLoader {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }
}

#[async_trait]
impl OverlayLoader for StaticOverlayLoader {
    async fn load(&self, _location: &str) -> Result<RgbaImage, AssetError> {
        Ok(self.image.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_file_loader_decodes_png() {
        // Arrange – write a small PNG to a temp file
        let path = std::env::temp_dir().join(format!("canvas_overlay_{}.png", Uuid::new_v4()));
        let logo = RgbaImage::from_pixel(34, 11, Rgba([10, 20, 30, 40]));
        logo.save_with_format(&path, ImageFormat::Png).unwrap();

        // Act
        let loaded = FileOverlayLoader.load(path.to_str().unwrap()).await.unwrap();

        // Assert
        assert_eq!(loaded, logo);

        // Cleanup
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_file_loader_reports_missing_file() {
        let result = FileOverlayLoader
            .load("/nonexistent/path/that/cannot/exist/logo.png")
            .await;
        assert!(matches!(result, Err(AssetError::Io { .. })));
    }

    #[tokio::test]
    async fn test_file_loader_reports_undecodable_file() {
        // Arrange
        let path = std::env::temp_dir().join(format!("canvas_overlay_{}.png", Uuid::new_v4()));
        std::fs::write(&path, b"definitely not a png").unwrap();

        // Act
        let result = FileOverlayLoader.load(path.to_str().unwrap()).await;

        // Assert
        assert!(matches!(result, Err(AssetError::Decode { .. })));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_static_loader_ignores_location() {
        let logo = RgbaImage::from_pixel(4, 2, Rgba([1, 2, 3, 4]));
        let loader = StaticOverlayLoader::new(logo.clone());

        let loaded = tokio_test::block_on(loader.load("anything://at/all")).unwrap();

        assert_eq!(loaded, logo);
    }

    #[test]
    fn test_bundled_watermark_decodes() {
        let bytes = include_bytes!("../../../../../assets/watermark.png");
        let logo = image::load_from_memory(bytes).unwrap();
        assert_eq!((logo.width(), logo.height()), (340, 110));
    }
}
