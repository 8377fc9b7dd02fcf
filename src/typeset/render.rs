use image::{Rgb, RgbImage};
use resvg::render;
use tiny_skia::{Pixmap, Transform};
use usvg::{Options, Tree};

use super::font::{GlyphMetrics, LoadedFont};
use super::{LINE_GAP, Rect, RenderPlan};
use crate::error::{OverlayError, Result};

/// Share of the box height left untouched at the top when clearing.
pub const CLEAR_TOP_INSET: f32 = 0.15;

/// Shadow offsets drawn in the fill color under every line.
const SHADOW_OFFSETS: [(f32, f32); 4] = [(1.0, 0.0), (-1.0, 0.0), (0.0, 1.0), (0.0, -1.0)];

#[derive(Debug, Clone)]
pub struct OverlayStyle {
    pub text_color: String,
    pub fill_color: String,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            text_color: "#000000".to_string(),
            fill_color: "#ffffff".to_string(),
        }
    }
}

/// Parses `#rrggbb` (or `rrggbb`).
pub fn parse_hex_color(value: &str) -> Option<Rgb<u8>> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some(Rgb([channel(0..2)?, channel(2..4)?, channel(4..6)?]))
}

/// Clears text boxes and draws translated lines into them.
#[derive(Debug, Clone)]
pub struct BoxRenderer {
    style: OverlayStyle,
    fill: Rgb<u8>,
}

impl BoxRenderer {
    pub fn new(style: OverlayStyle) -> Result<Self> {
        let fill = parse_hex_color(&style.fill_color).ok_or_else(|| {
            OverlayError::RenderFailed(format!("invalid fill color '{}'", style.fill_color))
        })?;
        if parse_hex_color(&style.text_color).is_none() {
            return Err(OverlayError::RenderFailed(format!(
                "invalid text color '{}'",
                style.text_color
            )));
        }
        Ok(Self { style, fill })
    }

    /// Clears the box, then draws the plan into it.
    pub fn render(
        &self,
        image: &mut RgbImage,
        rect: &Rect,
        plan: &RenderPlan,
        font: &LoadedFont,
        left_margin: f32,
    ) -> Result<()> {
        self.clear(image, rect);
        self.draw(image, rect, plan, font, left_margin)
    }

    /// Fills the box with the fill color, skipping the top 15% of its height.
    /// Bounds are inclusive and clamped to the image.
    pub fn clear(&self, image: &mut RgbImage, rect: &Rect) {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let top = rect.y0 + rect.height() * CLEAR_TOP_INSET;
        let Some((x_start, x_end)) = clamp_span(rect.x0, rect.x1, width) else {
            return;
        };
        let Some((y_start, y_end)) = clamp_span(top, rect.y1, height) else {
            return;
        };
        for y in y_start..=y_end {
            for x in x_start..=x_end {
                image.put_pixel(x, y, self.fill);
            }
        }
    }

    /// Draws the plan's lines left-aligned at `x0 + left_margin`, top-down from `y0`.
    pub fn draw(
        &self,
        image: &mut RgbImage,
        rect: &Rect,
        plan: &RenderPlan,
        font: &LoadedFont,
        left_margin: f32,
    ) -> Result<()> {
        if plan.lines.is_empty() {
            return Ok(());
        }
        let size = plan.size_pt as f32;
        let metrics = &font.face;
        let x = rect.x0 + left_margin;

        let placed = place_lines(&plan.lines, metrics, size, rect.y0);
        let widest = plan
            .lines
            .iter()
            .map(|line| metrics.text_width(line, size))
            .fold(0.0f32, f32::max);
        let last_top = placed.last().map(|(_, top)| *top).unwrap_or(rect.y0);

        let (img_w, img_h) = image.dimensions();
        let left = (x - 2.0).floor().max(0.0);
        let top = (rect.y0 - 2.0).floor().max(0.0);
        let right = (x + widest + size * 0.5 + 2.0).ceil().min(img_w as f32);
        let bottom = (last_top + size * 1.5 + 2.0).ceil().min(img_h as f32);
        if right <= left || bottom <= top {
            return Ok(());
        }
        let layer_w = (right - left) as u32;
        let layer_h = (bottom - top) as u32;

        let layer = LineLayer {
            lines: placed,
            x,
            size,
            ascent: metrics.ascent(size),
            family: &font.family,
            weight: font.weight,
        };
        let svg = self.layer_svg(&layer, (left, top), (layer_w, layer_h));
        let pixmap = rasterize(&svg, font, layer_w, layer_h)?;
        composite(image, &pixmap, left as u32, top as u32);
        Ok(())
    }

    fn layer_svg(&self, layer: &LineLayer<'_>, origin: (f32, f32), dims: (u32, u32)) -> String {
        let mut svg = String::new();
        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = dims.0,
            h = dims.1
        ));
        svg.push_str(&format!(
            r#"<g transform="translate({dx} {dy})" font-family="{family}" font-weight="{weight}" font-size="{size}">"#,
            dx = -origin.0,
            dy = -origin.1,
            family = escape_xml(layer.family),
            weight = layer.weight,
            size = layer.size
        ));
        for (text, top) in &layer.lines {
            let escaped = escape_xml(text);
            let baseline = top + layer.ascent;
            for (dx, dy) in SHADOW_OFFSETS {
                push_text(&mut svg, layer.x + dx, baseline + dy, &self.style.fill_color, &escaped);
            }
            push_text(&mut svg, layer.x, baseline, &self.style.text_color, &escaped);
        }
        svg.push_str("</g></svg>");
        svg
    }
}

/// Lines of one box, each paired with its top edge, ready for the SVG layer.
struct LineLayer<'a> {
    lines: Vec<(&'a str, f32)>,
    x: f32,
    size: f32,
    ascent: f32,
    family: &'a str,
    weight: u16,
}

/// Top edge of each line, stacked down from `top` with [`LINE_GAP`] between lines.
fn place_lines<'a, M: GlyphMetrics + ?Sized>(
    lines: &'a [String],
    metrics: &M,
    size: f32,
    top: f32,
) -> Vec<(&'a str, f32)> {
    let mut y = top;
    lines
        .iter()
        .map(|line| {
            let placed = (line.as_str(), y);
            y += metrics.line_height(line, size) + LINE_GAP;
            placed
        })
        .collect()
}

fn push_text(svg: &mut String, x: f32, y: f32, color: &str, escaped: &str) {
    svg.push_str(&format!(
        r#"<text x="{x}" y="{y}" fill="{color}" xml:space="preserve">{text}</text>"#,
        x = x,
        y = y,
        color = color,
        text = escaped
    ));
}

fn rasterize(svg: &str, font: &LoadedFont, width: u32, height: u32) -> Result<Pixmap> {
    let options = Options {
        fontdb: font.fontdb.clone(),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options)
        .map_err(|err| OverlayError::RenderFailed(format!("failed to parse text layer: {err}")))?;
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| OverlayError::RenderFailed("empty text layer".to_string()))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, Transform::identity(), &mut pixmap_mut);
    Ok(pixmap)
}

/// Source-over blend of a premultiplied RGBA layer onto the page.
fn composite(image: &mut RgbImage, layer: &Pixmap, left: u32, top: u32) {
    let layer_w = layer.width();
    for (idx, pixel) in layer.pixels().iter().enumerate() {
        let alpha = pixel.alpha() as u32;
        if alpha == 0 {
            continue;
        }
        let x = left + idx as u32 % layer_w;
        let y = top + idx as u32 / layer_w;
        if x >= image.width() || y >= image.height() {
            continue;
        }
        let dst = image.get_pixel_mut(x, y);
        let inverse = 255 - alpha;
        let src = [pixel.red(), pixel.green(), pixel.blue()];
        for channel in 0..3 {
            let blended = src[channel] as u32 + (dst.0[channel] as u32 * inverse + 127) / 255;
            dst.0[channel] = blended.min(255) as u8;
        }
    }
}

/// Inclusive pixel span covering `[start, end]`, clamped to `0..limit`.
fn clamp_span(start: f32, end: f32, limit: u32) -> Option<(u32, u32)> {
    let max = (limit - 1) as f32;
    let lo = start.round().max(0.0);
    let hi = end.round().min(max);
    if hi < lo || lo > max || hi < 0.0 {
        return None;
    }
    Some((lo as u32, hi as u32))
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::FixedAdvance;
    use regex::Regex;

    fn renderer() -> BoxRenderer {
        BoxRenderer::new(OverlayStyle::default()).unwrap()
    }

    #[test]
    fn clear_skips_top_fifteen_percent() {
        let mut image = RgbImage::from_pixel(100, 100, Rgb([10, 20, 30]));
        let rect = Rect::new(10.0, 20.0, 50.0, 60.0).unwrap();
        renderer().clear(&mut image, &rect);

        // Top inset is 6px of the 40px box: rows 20..=25 untouched, 26..=60 cleared.
        assert_eq!(*image.get_pixel(30, 25), Rgb([10, 20, 30]));
        assert_eq!(*image.get_pixel(30, 26), Rgb([255, 255, 255]));
        assert_eq!(*image.get_pixel(10, 60), Rgb([255, 255, 255]));
        assert_eq!(*image.get_pixel(50, 40), Rgb([255, 255, 255]));
        assert_eq!(*image.get_pixel(51, 40), Rgb([10, 20, 30]));
        assert_eq!(*image.get_pixel(30, 61), Rgb([10, 20, 30]));
        assert_eq!(*image.get_pixel(9, 40), Rgb([10, 20, 30]));
    }

    #[test]
    fn clear_clamps_to_image_bounds() {
        let mut image = RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]));
        let rect = Rect::new(-10.0, 0.0, 50.0, 50.0).unwrap();
        renderer().clear(&mut image, &rect);
        assert_eq!(*image.get_pixel(19, 19), Rgb([255, 255, 255]));
        assert_eq!(*image.get_pixel(0, 8), Rgb([255, 255, 255]));
        assert_eq!(*image.get_pixel(0, 7), Rgb([0, 0, 0]));
    }

    #[test]
    fn clear_outside_image_is_a_no_op() {
        let mut image = RgbImage::from_pixel(20, 20, Rgb([1, 2, 3]));
        let before = image.clone();
        let rect = Rect::new(100.0, 100.0, 150.0, 150.0).unwrap();
        renderer().clear(&mut image, &rect);
        assert_eq!(image, before);
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#ff8000"), Some(Rgb([255, 128, 0])));
        assert_eq!(parse_hex_color("00ff00"), Some(Rgb([0, 255, 0])));
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("#gg0000"), None);
    }

    #[test]
    fn renderer_rejects_bad_colors() {
        let style = OverlayStyle {
            text_color: "black".to_string(),
            fill_color: "#ffffff".to_string(),
        };
        assert!(BoxRenderer::new(style).is_err());
    }

    #[test]
    fn composite_blends_premultiplied_pixels() {
        let mut image = RgbImage::from_pixel(2, 1, Rgb([255, 255, 255]));
        let mut layer = Pixmap::new(2, 1).unwrap();
        layer.fill(tiny_skia::Color::from_rgba8(0, 0, 0, 255));
        composite(&mut image, &layer, 1, 0);
        assert_eq!(*image.get_pixel(0, 0), Rgb([255, 255, 255]));
        assert_eq!(*image.get_pixel(1, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_xml("a<b & 'c'"), "a&lt;b &amp; &apos;c&apos;");
    }

    #[test]
    fn lines_stack_with_line_gap() {
        let metrics = FixedAdvance {
            advance: 0.5,
            height: 1.0,
        };
        let lines = vec!["first".to_string(), "second".to_string(), "third".to_string()];
        let placed = place_lines(&lines, &metrics, 20.0, 10.0);
        assert_eq!(placed, vec![("first", 10.0), ("second", 32.0), ("third", 54.0)]);
    }

    #[test]
    fn layer_draws_four_shadows_then_text_per_line() {
        let metrics = FixedAdvance {
            advance: 0.5,
            height: 1.0,
        };
        let renderer = BoxRenderer::new(OverlayStyle {
            text_color: "#112233".to_string(),
            fill_color: "#ffeedd".to_string(),
        })
        .unwrap();
        let rect = Rect::new(5.0, 10.0, 200.0, 80.0).unwrap();
        let lines = vec!["Hallo".to_string(), "Welt & Co".to_string()];
        let layer = LineLayer {
            lines: place_lines(&lines, &metrics, 20.0, rect.y0),
            x: rect.x0 + 12.0,
            size: 20.0,
            ascent: metrics.ascent(20.0),
            family: "Test Sans",
            weight: 700,
        };
        let svg = renderer.layer_svg(&layer, (3.0, 8.0), (100, 60));

        assert!(svg.contains(r#"font-family="Test Sans" font-weight="700" font-size="20""#));
        assert!(svg.contains(r#"translate(-3 -8)"#));

        let pattern =
            Regex::new(r#"<text x="([^"]+)" y="([^"]+)" fill="([^"]+)" xml:space="preserve">([^<]*)</text>"#)
                .unwrap();
        let texts: Vec<(f32, f32, String, String)> = pattern
            .captures_iter(&svg)
            .map(|caps| {
                (
                    caps[1].parse().unwrap(),
                    caps[2].parse().unwrap(),
                    caps[3].to_string(),
                    caps[4].to_string(),
                )
            })
            .collect();
        assert_eq!(texts.len(), 10);

        // Baseline is the line top plus the 0.8 * size ascent; the second line
        // starts one line height plus the 2px gap lower.
        let x = 17.0;
        for (line, (top, text)) in [(10.0f32, "Hallo"), (32.0, "Welt &amp; Co")].iter().enumerate() {
            let baseline = top + 16.0;
            let expected = [
                (x + 1.0, baseline, "#ffeedd"),
                (x - 1.0, baseline, "#ffeedd"),
                (x, baseline + 1.0, "#ffeedd"),
                (x, baseline - 1.0, "#ffeedd"),
                (x, baseline, "#112233"),
            ];
            for (idx, (ex, ey, color)) in expected.iter().enumerate() {
                let (ax, ay, acolor, atext) = &texts[line * 5 + idx];
                assert_eq!((*ax, *ay, acolor.as_str(), atext.as_str()), (*ex, *ey, *color, *text));
            }
        }
    }
}
