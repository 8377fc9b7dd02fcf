use super::font::GlyphMetrics;
use super::script::detect;

/// Breaks `paragraph` into lines no wider than `max_width` at `size`.
///
/// Character-wrapped scripts break between any two characters; everything
/// else breaks on single spaces. A token wider than `max_width` on its own
/// still gets a line to itself.
pub fn wrap<M: GlyphMetrics + ?Sized>(
    paragraph: &str,
    metrics: &M,
    size: f32,
    max_width: f32,
) -> Vec<String> {
    if detect(paragraph).uses_character_wrap() {
        wrap_characters(paragraph, metrics, size, max_width)
    } else {
        wrap_words(paragraph, metrics, size, max_width)
    }
}

fn wrap_characters<M: GlyphMetrics + ?Sized>(
    paragraph: &str,
    metrics: &M,
    size: f32,
    max_width: f32,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut width = 0.0;
    let mut buf = [0u8; 4];

    for ch in paragraph.chars() {
        let char_width = metrics.text_width(ch.encode_utf8(&mut buf), size);
        if !current.is_empty() && width + char_width > max_width {
            lines.push(std::mem::take(&mut current));
            width = 0.0;
        }
        current.push(ch);
        width += char_width;
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn wrap_words<M: GlyphMetrics + ?Sized>(
    paragraph: &str,
    metrics: &M,
    size: f32,
    max_width: f32,
) -> Vec<String> {
    let space_width = metrics.text_width(" ", size);
    let mut lines = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    // Includes one trailing space per placed word.
    let mut width = 0.0;

    for word in paragraph.split(' ') {
        let word_width = metrics.text_width(word, size);
        if !current.is_empty() && width + word_width > max_width {
            lines.push(current.join(" "));
            current.clear();
            width = 0.0;
        }
        current.push(word);
        width += word_width + space_width;
    }
    if !current.is_empty() {
        lines.push(current.join(" "));
    }
    lines
}
