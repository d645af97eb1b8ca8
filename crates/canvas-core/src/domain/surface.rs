//! The composited surface painted by the draw loop.
//!
//! A [`Surface`] is a fixed-size RGBA buffer plus the text runs drawn on it
//! during the current frame.  Every tick starts with [`Surface::begin_frame`],
//! which resets the whole buffer to opaque black, paints the camera frame
//! over it, then layers the watermark, the caption band and the caption text
//! on top.
//!
//! # Why every frame starts from black (for beginners)
//!
//! The watermark and the band are *blended*, not copied: a half-transparent
//! band drawn twice over the same pixels is darker than one drawn once.  If a
//! tick painted on top of the previous frame (say, because the camera had no
//! new picture yet), every such tick would darken the band a little more.
//! Starting from a fixed base makes a tick a pure function of its inputs.
//!
//! Text runs are kept next to the pixels so callers can tell which caption
//! a frame was painted with without reading glyphs back.

use image::imageops::{self, FilterType};
use image::{Pixel, Rgba, RgbaImage};

use super::caption::{CaptionState, FontSpec};
use super::media::{CompositedFrame, Rect, Resolution};
use super::overlay::OverlayAsset;
use super::text::GlyphPainter;

/// Base color every frame is painted on.
const BASE: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// A caption string drawn at a given anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub color: Rgba<u8>,
    pub font: FontSpec,
    pub x: i32,
    pub y: i32,
}

impl TextRun {
    /// Captures the caption as it is right now.
    pub fn from_caption(caption: &CaptionState) -> Self {
        Self {
            text: caption.text.clone(),
            color: caption.color.rgba(),
            font: caption.font.clone(),
            x: caption.x,
            y: caption.y,
        }
    }
}

/// Fixed-size RGBA drawing surface.
#[derive(Debug)]
pub struct Surface {
    pixels: RgbaImage,
    text: Vec<TextRun>,
    glyphs: GlyphPainter,
}

impl Surface {
    /// Creates an opaque black surface of the given size.
    pub fn new(size: Resolution) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(size.width, size.height, BASE),
            text: Vec::new(),
            glyphs: GlyphPainter::new(),
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.pixels.width(), self.pixels.height())
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn text_runs(&self) -> &[TextRun] {
        &self.text
    }

    /// Resets the buffer to opaque black and drops the previous text runs.
    pub fn begin_frame(&mut self) {
        self.pixels.pixels_mut().for_each(|p| *p = BASE);
        self.text.clear();
    }

    /// Paints `frame` stretched over the whole surface.
    pub fn draw_frame(&mut self, frame: &RgbaImage) {
        if frame.dimensions() == self.pixels.dimensions() {
            imageops::replace(&mut self.pixels, frame, 0, 0);
        } else {
            let (width, height) = self.pixels.dimensions();
            let scaled = imageops::resize(frame, width, height, FilterType::Nearest);
            imageops::replace(&mut self.pixels, &scaled, 0, 0);
        }
    }

    /// Alpha-composites the pre-scaled watermark at its destination.
    pub fn draw_overlay(&mut self, asset: &OverlayAsset) {
        let dest = asset.destination();
        imageops::overlay(&mut self.pixels, asset.image(), dest.x, dest.y);
    }

    /// Blends `color` over every pixel of `rect` that lies on the surface.
    pub fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) {
        let (width, height) = self.pixels.dimensions();
        let x0 = rect.x.clamp(0, i64::from(width)) as u32;
        let y0 = rect.y.clamp(0, i64::from(height)) as u32;
        let x1 = (rect.x + i64::from(rect.width)).clamp(0, i64::from(width)) as u32;
        let y1 = (rect.y + i64::from(rect.height)).clamp(0, i64::from(height)) as u32;

        for y in y0..y1 {
            for x in x0..x1 {
                self.pixels.get_pixel_mut(x, y).blend(&color);
            }
        }
    }

    /// Rasterises the caption at its anchor and records it as a text run.
    pub fn fill_text(&mut self, caption: &CaptionState) {
        let run = TextRun::from_caption(caption);
        self.glyphs.paint(&mut self.pixels, &run);
        self.text.push(run);
    }

    /// Copies the current contents into a [`CompositedFrame`].
    pub fn snapshot(&self, sequence: u64) -> CompositedFrame {
        CompositedFrame {
            sequence,
            image: self.pixels.clone(),
            text: self.text.clone(),
        }
    }
}
