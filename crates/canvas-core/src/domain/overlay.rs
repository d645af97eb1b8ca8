//! Watermark placement and the pre-scaled overlay asset.
//!
//! The watermark is a static image drawn every tick at a fixed destination
//! rectangle, scaled by a constant factor.  Since neither the image nor the
//! factor ever change, the asset is cropped and resized once when it is
//! prepared; each tick only alpha-composites the ready pixels.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use thiserror::Error;

use super::media::{Rect, Resolution};

/// Error type for overlay placement.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlacementError {
    #[error("overlay scale must be a positive finite number, got {0}")]
    InvalidScale(f32),
    #[error("overlay source rectangle is empty")]
    EmptySource,
    #[error("overlay source rectangle {source_rect:?} exceeds the {image} image")]
    SourceOutOfBounds { source_rect: Rect, image: Resolution },
    #[error("overlay scaled to nothing ({width}x{height} at {scale})")]
    EmptyAfterScaling { width: u32, height: u32, scale: f32 },
}

/// Where and how large the watermark is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayPlacement {
    /// Region of the asset to draw.
    pub source: Rect,
    /// Constant scale factor applied to `source`.
    pub scale: f32,
    /// Destination rectangle on the surface (already scaled).
    pub dest: Rect,
}

impl OverlayPlacement {
    /// Places a `source` region of the asset at `origin`, scaled by `scale`.
    pub fn new(source: Rect, scale: f32, origin: (i64, i64)) -> Result<Self, PlacementError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(PlacementError::InvalidScale(scale));
        }
        if source.width == 0 || source.height == 0 {
            return Err(PlacementError::EmptySource);
        }
        let width = (source.width as f32 * scale).round() as u32;
        let height = (source.height as f32 * scale).round() as u32;
        if width == 0 || height == 0 {
            return Err(PlacementError::EmptyAfterScaling {
                width: source.width,
                height: source.height,
                scale,
            });
        }
        Ok(Self {
            source,
            scale,
            dest: Rect::new(origin.0, origin.1, width, height),
        })
    }

    /// Anchors the whole `source_width`×`source_height` asset in the top
    /// right corner of `canvas`, `margin` pixels from both edges.
    ///
    /// With the stock 340×110 logo at 0.4 on a 640×480 canvas and a 15 px
    /// margin this gives a 136×44 rectangle at (489, 15).
    pub fn top_right(
        canvas: Resolution,
        source_width: u32,
        source_height: u32,
        scale: f32,
        margin: u32,
    ) -> Result<Self, PlacementError> {
        let mut placement = Self::new(Rect::new(0, 0, source_width, source_height), scale, (0, 0))?;
        placement.dest.x =
            i64::from(canvas.width) - i64::from(placement.dest.width) - i64::from(margin);
        placement.dest.y = i64::from(margin);
        Ok(placement)
    }
}

/// A decoded watermark already cropped and scaled to its destination size.
#[derive(Debug, Clone)]
pub struct OverlayAsset {
    image: RgbaImage,
    placement: OverlayPlacement,
}

impl OverlayAsset {
    /// Crops `source` out of `image` and resizes it to the placement's
    /// destination size.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::SourceOutOfBounds`] when the source region
    /// does not fit inside `image`.
    pub fn prepare(image: &RgbaImage, placement: OverlayPlacement) -> Result<Self, PlacementError> {
        let src = placement.source;
        let fits = src.x >= 0
            && src.y >= 0
            && src.x + i64::from(src.width) <= i64::from(image.width())
            && src.y + i64::from(src.height) <= i64::from(image.height());
        if !fits {
            return Err(PlacementError::SourceOutOfBounds {
                source_rect: src,
                image: Resolution::new(image.width(), image.height()),
            });
        }

        let cropped = imageops::crop_imm(image, src.x as u32, src.y as u32, src.width, src.height)
            .to_image();
        let dest = placement.dest;
        let image = if cropped.dimensions() == (dest.width, dest.height) {
            cropped
        } else {
            imageops::resize(&cropped, dest.width, dest.height, FilterType::Triangle)
        };

        Ok(Self { image, placement })
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn placement(&self) -> &OverlayPlacement {
        &self.placement
    }

    pub fn destination(&self) -> Rect {
        self.placement.dest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_top_right_matches_stock_logo_geometry() {
        // Arrange / Act
        let placement =
            OverlayPlacement::top_right(Resolution::new(640, 480), 340, 110, 0.4, 15).unwrap();

        // Assert
        assert_eq!(placement.dest, Rect::new(489, 15, 136, 44));
        assert_eq!(placement.source, Rect::new(0, 0, 340, 110));
    }

    #[test]
    fn test_non_positive_scale_is_rejected() {
        let result = OverlayPlacement::top_right(Resolution::new(640, 480), 340, 110, 0.0, 15);
        assert_eq!(result, Err(PlacementError::InvalidScale(0.0)));
        assert!(OverlayPlacement::new(Rect::new(0, 0, 1, 1), f32::NAN, (0, 0)).is_err());
    }

    #[test]
    fn test_scale_that_collapses_the_asset_is_rejected() {
        let result = OverlayPlacement::new(Rect::new(0, 0, 2, 2), 0.1, (0, 0));
        assert!(matches!(result, Err(PlacementError::EmptyAfterScaling { .. })));
    }

    #[test]
    fn test_prepare_resizes_to_destination() {
        // Arrange
        let logo = RgbaImage::from_pixel(340, 110, Rgba([0, 0, 255, 200]));
        let placement =
            OverlayPlacement::top_right(Resolution::new(640, 480), 340, 110, 0.4, 15).unwrap();

        // Act
        let asset = OverlayAsset::prepare(&logo, placement).unwrap();

        // Assert
        assert_eq!(asset.image().dimensions(), (136, 44));
        assert_eq!(asset.destination(), Rect::new(489, 15, 136, 44));
    }

    #[test]
    fn test_prepare_crops_source_region() {
        // Arrange – left half red, right half green
        let mut logo = RgbaImage::from_pixel(4, 2, Rgba([255, 0, 0, 255]));
        for y in 0..2 {
            for x in 2..4 {
                logo.put_pixel(x, y, Rgba([0, 255, 0, 255]));
            }
        }
        let placement = OverlayPlacement::new(Rect::new(2, 0, 2, 2), 1.0, (0, 0)).unwrap();

        // Act
        let asset = OverlayAsset::prepare(&logo, placement).unwrap();

        // Assert
        assert!(asset.image().pixels().all(|p| *p == Rgba([0, 255, 0, 255])));
    }

    #[test]
    fn test_prepare_rejects_source_outside_image() {
        let logo = RgbaImage::new(100, 50);
        let placement =
            OverlayPlacement::top_right(Resolution::new(640, 480), 340, 110, 0.4, 15).unwrap();

        let result = OverlayAsset::prepare(&logo, placement);

        assert!(matches!(result, Err(PlacementError::SourceOutOfBounds { .. })));
    }
}
