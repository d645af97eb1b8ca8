//! Caption rasterisation.
//!
//! [`GlyphPainter`] shapes a [`TextRun`] with `cosmic-text` and blends the
//! resulting glyph coverage into an RGBA buffer.  The font is bundled with
//! the crate, so output is the same on every machine whatever fonts the host
//! has installed.
//!
//! # Anchor (for beginners)
//!
//! A caption anchor `(x, y)` names the left end of the text *baseline*, the
//! line the letters sit on.  Descenders (`g`, `p`, `y`) hang below `y`, the
//! rest of the glyphs rise above it.

use std::fmt;

use cosmic_text::{
    fontdb, Attrs, Buffer, Color as GlyphColor, Family, FontSystem, Metrics, Shaping, SwashCache,
};
use image::{Pixel, Rgba, RgbaImage};
use tracing::debug;

use super::surface::TextRun;

/// DejaVu Sans, see `assets/fonts/LICENSE-DejaVu.txt`.
static BUNDLED_FONT: &[u8] = include_bytes!("../../../../assets/fonts/DejaVuSans.ttf");
const BUNDLED_FAMILY: &str = "DejaVu Sans";

const LINE_HEIGHT: f32 = 1.2;

/// Shapes and rasterises caption text.
///
/// Every CSS family resolves to the bundled face; only the size of the
/// caption font is honoured.
pub struct GlyphPainter {
    fonts: FontSystem,
    cache: SwashCache,
}

impl GlyphPainter {
    pub fn new() -> Self {
        let mut db = fontdb::Database::new();
        db.load_font_data(BUNDLED_FONT.to_vec());
        db.set_sans_serif_family(BUNDLED_FAMILY);
        Self {
            fonts: FontSystem::new_with_locale_and_db("en-US".to_string(), db),
            cache: SwashCache::new(),
        }
    }

    /// Blends `run` into `target` with its baseline at `(run.x, run.y)`.
    ///
    /// Glyph pixels outside `target` are dropped.
    pub fn paint(&mut self, target: &mut RgbaImage, run: &TextRun) {
        if run.text.trim().is_empty() {
            return;
        }

        let size = run.font.size_px();
        let mut buffer = Buffer::new(&mut self.fonts, Metrics::new(size, size * LINE_HEIGHT));
        buffer.set_size(&mut self.fonts, None, None);
        let attrs = Attrs::new().family(Family::SansSerif);
        buffer.set_text(&mut self.fonts, &run.text, &attrs, Shaping::Advanced);
        buffer.shape_until_scroll(&mut self.fonts, false);

        let Some(baseline) = buffer.layout_runs().next().map(|line| line.line_y) else {
            debug!("caption {:?} shaped to no lines", run.text);
            return;
        };
        let left = i64::from(run.x);
        let top = i64::from(run.y) - baseline.round() as i64;

        let [r, g, b, a] = run.color.0;
        let (width, height) = target.dimensions();
        buffer.draw(
            &mut self.fonts,
            &mut self.cache,
            GlyphColor::rgba(r, g, b, a),
            |x, y, w, h, color| {
                if color.a() == 0 {
                    return;
                }
                let ink = Rgba([color.r(), color.g(), color.b(), color.a()]);
                let x0 = (left + i64::from(x)).clamp(0, i64::from(width)) as u32;
                let y0 = (top + i64::from(y)).clamp(0, i64::from(height)) as u32;
                let x1 = (left + i64::from(x) + i64::from(w)).clamp(0, i64::from(width)) as u32;
                let y1 = (top + i64::from(y) + i64::from(h)).clamp(0, i64::from(height)) as u32;
                for py in y0..y1 {
                    for px in x0..x1 {
                        target.get_pixel_mut(px, py).blend(&ink);
                    }
                }
            },
        );
    }
}

impl Default for GlyphPainter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GlyphPainter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlyphPainter")
            .field("family", &BUNDLED_FAMILY)
            .finish_non_exhaustive()
    }
}
