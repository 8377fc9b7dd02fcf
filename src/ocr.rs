use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::error::{OverlayError, Result};
use crate::typeset::Rect;

pub const DEFAULT_LEFT_MARGIN: f32 = 30.0;

/// Text drawn for detected regions that came without recognized text.
pub const PLACEHOLDER_TEXT: &str = "[untranslated text]";

/// One recognized region of a page image.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub rect: Rect,
    pub source_text: String,
    pub is_bold: bool,
    pub left_margin: f32,
}

impl TextBlock {
    pub fn new(rect: Rect, source_text: impl Into<String>) -> Self {
        Self {
            rect,
            source_text: source_text.into(),
            is_bold: false,
            left_margin: DEFAULT_LEFT_MARGIN,
        }
    }

    /// Placeholder blocks are drawn as-is, never sent for translation.
    pub fn is_placeholder(&self) -> bool {
        self.source_text == PLACEHOLDER_TEXT
    }
}

#[derive(Debug, Default, Deserialize)]
struct PageFile {
    rec_texts: Option<Vec<Value>>,
    rec_boxes: Option<Vec<Value>>,
    dt_polys: Option<Vec<Value>>,
}

/// Blocks of one page, in reading order as produced by OCR.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrPage {
    pub blocks: Vec<TextBlock>,
}

impl OcrPage {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content).map_err(|err| match err {
            OverlayError::InvalidOcr(message) => {
                OverlayError::InvalidOcr(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }

    /// Recognized texts with their boxes win; detection polygons are used
    /// only when there is no usable recognition output.
    pub fn from_json(content: &str) -> Result<Self> {
        let file: PageFile = serde_json::from_str(content)
            .map_err(|err| OverlayError::InvalidOcr(err.to_string()))?;

        let blocks = match (&file.rec_texts, &file.rec_boxes) {
            (Some(texts), Some(boxes)) if texts.len() == boxes.len() => recognized(texts, boxes),
            _ => file.dt_polys.as_deref().map(detected).unwrap_or_default(),
        };
        Ok(Self { blocks })
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Concatenated source text, capped at `limit` characters.
    pub fn sample_text(&self, limit: usize) -> String {
        let mut sample = String::new();
        let mut taken = 0;
        for block in self.blocks.iter().filter(|block| !block.is_placeholder()) {
            for ch in block.source_text.chars().chain(std::iter::once(' ')) {
                if taken >= limit {
                    return sample;
                }
                sample.push(ch);
                taken += 1;
            }
        }
        sample
    }
}

fn recognized(texts: &[Value], boxes: &[Value]) -> Vec<TextBlock> {
    let mut blocks = Vec::new();
    for (idx, (text, coords)) in texts.iter().zip(boxes).enumerate() {
        let Some(text) = text.as_str().map(str::trim).filter(|text| !text.is_empty()) else {
            continue;
        };
        let Some(rect) = box_rect(coords) else {
            debug!("skipping block {idx}: unusable box {coords}");
            continue;
        };
        blocks.push(TextBlock::new(rect, text));
    }
    blocks
}

fn detected(polys: &[Value]) -> Vec<TextBlock> {
    polys
        .iter()
        .filter_map(|poly| {
            let points = poly
                .as_array()?
                .iter()
                .map(point)
                .collect::<Option<Vec<_>>>()?;
            if points.len() < 4 {
                return None;
            }
            Rect::from_points(&points)
        })
        .map(|rect| TextBlock::new(rect, PLACEHOLDER_TEXT))
        .collect()
}

fn box_rect(coords: &Value) -> Option<Rect> {
    let values = numbers(coords)?;
    match values.as_slice() {
        [x0, y0, x1, y1] => Rect::new(*x0, *y0, *x1, *y1),
        _ => None,
    }
}

fn point(value: &Value) -> Option<(f32, f32)> {
    match numbers(value)?.as_slice() {
        [x, y, ..] => Some((*x, *y)),
        _ => None,
    }
}

fn numbers(value: &Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_f64().map(|number| number as f32))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recognized_blocks() {
        let page = OcrPage::from_json(
            r#"{"rec_texts": ["  Title ", "", "Body"],
                "rec_boxes": [[10, 20, 110, 60], [0, 0, 5, 5], [10.5, 70, 300, 120.25]]}"#,
        )
        .unwrap();
        assert_eq!(page.blocks.len(), 2);
        assert_eq!(page.blocks[0].source_text, "Title");
        assert_eq!(page.blocks[0].rect, Rect::new(10.0, 20.0, 110.0, 60.0).unwrap());
        assert_eq!(page.blocks[0].left_margin, DEFAULT_LEFT_MARGIN);
        assert!(!page.blocks[0].is_bold);
        assert_eq!(page.blocks[1].rect.y1, 120.25);
    }

    #[test]
    fn skips_malformed_and_degenerate_boxes() {
        let page = OcrPage::from_json(
            r#"{"rec_texts": ["a", "b", "c", "d"],
                "rec_boxes": [[1, 2, 3], [5, 5, 5, 9], ["x", 0, 1, 1], [0, 0, 10, 10]]}"#,
        )
        .unwrap();
        assert_eq!(page.blocks.len(), 1);
        assert_eq!(page.blocks[0].source_text, "d");
    }

    #[test]
    fn falls_back_to_detection_polygons() {
        let page = OcrPage::from_json(
            r#"{"rec_texts": ["only one"], "rec_boxes": [],
                "dt_polys": [[[5, 2], [40, 3], [41, 20], [4, 19]], [[0, 0], [1, 1], [2, 2]]]}"#,
        )
        .unwrap();
        assert_eq!(page.blocks.len(), 1);
        assert!(page.blocks[0].is_placeholder());
        assert_eq!(page.blocks[0].rect, Rect::new(4.0, 2.0, 41.0, 20.0).unwrap());
    }

    #[test]
    fn no_known_keys_means_no_blocks() {
        let page = OcrPage::from_json(r#"{"input_path": "page_1.jpg"}"#).unwrap();
        assert!(page.is_empty());
    }

    #[test]
    fn invalid_json_is_an_error() {
        let err = OcrPage::from_json("{not json").unwrap_err();
        assert!(matches!(err, OverlayError::InvalidOcr(_)));
    }

    #[test]
    fn sample_text_is_capped_and_skips_placeholders() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0).unwrap();
        let page = OcrPage {
            blocks: vec![
                TextBlock::new(rect, "abc"),
                TextBlock::new(rect, PLACEHOLDER_TEXT),
                TextBlock::new(rect, "defgh"),
            ],
        };
        assert_eq!(page.sample_text(100), "abc defgh ");
        assert_eq!(page.sample_text(6), "abc de");
    }
}
