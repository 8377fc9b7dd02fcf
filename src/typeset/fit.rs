use super::font::GlyphMetrics;
use super::wrap::wrap;

pub const MAX_FONT_SIZE: u32 = 150;
pub const MIN_FONT_SIZE: u32 = 8;

/// Share of the box the text may occupy in each direction.
const FILL_RATIO: f32 = 0.95;
/// Gap added after every paragraph.
pub const PARAGRAPH_GAP: f32 = 5.0;
/// Gap between consecutive lines.
pub const LINE_GAP: f32 = 2.0;

/// Largest integer size at which every paragraph, wrapped, fits the box.
///
/// Every size from [`MAX_FONT_SIZE`] down is tried in turn. Wrapping can shift
/// break points non-monotonically, so the search does not bisect. When nothing
/// fits, [`MIN_FONT_SIZE`] is returned and the text may overflow.
pub fn optimal_size<M: GlyphMetrics + ?Sized>(
    paragraphs: &[String],
    metrics: &M,
    box_width: f32,
    box_height: f32,
) -> u32 {
    (MIN_FONT_SIZE..=MAX_FONT_SIZE)
        .rev()
        .find(|size| fits(paragraphs, metrics, *size as f32, box_width, box_height))
        .unwrap_or(MIN_FONT_SIZE)
}

/// Fit predicate for a single candidate size.
pub fn fits<M: GlyphMetrics + ?Sized>(
    paragraphs: &[String],
    metrics: &M,
    size: f32,
    box_width: f32,
    box_height: f32,
) -> bool {
    let max_width = box_width * FILL_RATIO;
    let max_height = box_height * FILL_RATIO;
    let mut total_height = 0.0;

    for paragraph in paragraphs {
        let lines = wrap(paragraph, metrics, size, max_width);
        for (idx, line) in lines.iter().enumerate() {
            if metrics.text_width(line, size) > max_width {
                return false;
            }
            if idx > 0 {
                total_height += LINE_GAP;
            }
            total_height += metrics.line_height(line, size);
        }
        total_height += PARAGRAPH_GAP;
        if total_height > max_height {
            return false;
        }
    }
    true
}
