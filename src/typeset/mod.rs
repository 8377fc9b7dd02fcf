mod fit;
mod font;
mod render;
mod resolver;
mod script;
mod wrap;

pub use fit::{LINE_GAP, MAX_FONT_SIZE, MIN_FONT_SIZE, PARAGRAPH_GAP, fits, optimal_size};
pub use font::{FontFace, FontLibrary, GlyphMetrics, LoadedFont};
pub use render::{BoxRenderer, CLEAR_TOP_INSET, OverlayStyle, parse_hex_color};
pub use resolver::{
    FontLocator, FontResolver, FontSpec, ResolvedFont, SystemFontLocator, default_font_dirs,
    font_spec,
};
pub use script::{Script, detect, dominant_script};
pub use wrap::wrap;

/// Axis-aligned rectangle in page-image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    /// Returns `None` unless `x0 < x1` and `y0 < y1`.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Option<Self> {
        let finite = [x0, y0, x1, y1].iter().all(|value| value.is_finite());
        if finite && x0 < x1 && y0 < y1 {
            Some(Rect { x0, y0, x1, y1 })
        } else {
            None
        }
    }

    /// Bounding rectangle of a polygon.
    pub fn from_points(points: &[(f32, f32)]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let (mut x0, mut y0) = *first;
        let (mut x1, mut y1) = *first;
        for (x, y) in rest {
            x0 = x0.min(*x);
            y0 = y0.min(*y);
            x1 = x1.max(*x);
            y1 = y1.max(*y);
        }
        Rect::new(x0, y0, x1, y1)
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

/// Everything the renderer needs to draw one block.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    pub font: ResolvedFont,
    pub size_pt: u32,
    pub lines: Vec<String>,
}

impl RenderPlan {
    /// Sizes `paragraphs` for a `width` x `height` area and wraps them at that size.
    ///
    /// Sizing keeps a 5% margin on both axes; the final wrap uses the full width.
    pub fn build<M: GlyphMetrics + ?Sized>(
        font: ResolvedFont,
        metrics: &M,
        paragraphs: &[String],
        width: f32,
        height: f32,
    ) -> Self {
        let size_pt = optimal_size(paragraphs, metrics, width, height);
        let lines = paragraphs
            .iter()
            .flat_map(|paragraph| wrap(paragraph, metrics, size_pt as f32, width))
            .collect();
        RenderPlan {
            font,
            size_pt,
            lines,
        }
    }
}
