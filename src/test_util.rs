use crate::typeset::GlyphMetrics;

/// Metrics double: every character advances `advance * size`, every line is
/// `height * size` tall.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct FixedAdvance {
    pub(crate) advance: f32,
    pub(crate) height: f32,
}

#[cfg(test)]
impl GlyphMetrics for FixedAdvance {
    fn text_width(&self, text: &str, size: f32) -> f32 {
        text.chars().filter(|ch| *ch != '\n').count() as f32 * self.advance * size
    }

    fn line_height(&self, _text: &str, size: f32) -> f32 {
        self.height * size
    }

    fn ascent(&self, size: f32) -> f32 {
        0.8 * size
    }
}
