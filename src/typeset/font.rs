use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ttf_parser::{Face, name_id};
use usvg::fontdb;

use crate::error::{OverlayError, Result};

/// Measures glyph runs at a given pixel size.
///
/// Widths must be additive over concatenation (advance based), which the
/// wrapper relies on when it accumulates word and space widths.
pub trait GlyphMetrics {
    /// Advance width of `text`.
    fn text_width(&self, text: &str, size: f32) -> f32;
    /// Ink height of `text`, from the top of its tallest glyph to the bottom of its lowest.
    fn line_height(&self, text: &str, size: f32) -> f32;
    /// Distance from the top of the line box to the baseline.
    fn ascent(&self, size: f32) -> f32;
}

/// A parsed font file used for measuring.
#[derive(Clone)]
pub struct FontFace {
    data: Arc<Vec<u8>>,
    face_index: u32,
    units_per_em: u16,
    space_advance: u16,
    ascender: i16,
    descender: i16,
    family: Option<String>,
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace")
            .field("family", &self.family)
            .field("face_index", &self.face_index)
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

impl FontFace {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|err| {
            OverlayError::RenderFailed(format!("failed to read font {}: {}", path.display(), err))
        })?;
        Self::from_data(data).map_err(|err| {
            OverlayError::RenderFailed(format!("failed to parse font {}: {}", path.display(), err))
        })
    }

    /// Parses the first usable face of a font file or collection.
    pub fn from_data(data: Vec<u8>) -> std::result::Result<Self, String> {
        let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
        for index in 0..count {
            let Ok(face) = Face::parse(&data, index) else {
                continue;
            };
            let units_per_em = face.units_per_em().max(1);
            let space_advance = face
                .glyph_index(' ')
                .and_then(|id| face.glyph_hor_advance(id))
                .unwrap_or(units_per_em / 2);
            let family = extract_family_name(&face);
            let ascender = face.ascender();
            let descender = face.descender();
            return Ok(FontFace {
                data: Arc::new(data),
                face_index: index,
                units_per_em,
                space_advance,
                ascender,
                descender,
                family,
            });
        }
        Err("no parsable face in font data".to_string())
    }

    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn scale(&self, size: f32) -> f32 {
        size / self.units_per_em as f32
    }

    fn with_face<T>(&self, fallback: T, func: impl FnOnce(&Face<'_>) -> T) -> T {
        match Face::parse(&self.data, self.face_index) {
            Ok(face) => func(&face),
            Err(_) => fallback,
        }
    }
}

impl GlyphMetrics for FontFace {
    fn text_width(&self, text: &str, size: f32) -> f32 {
        let advance = self.with_face(0u32, |face| {
            let mut advance = 0u32;
            for ch in text.chars() {
                if ch == '\n' {
                    continue;
                }
                let glyph_advance = face
                    .glyph_index(ch)
                    .and_then(|glyph| face.glyph_hor_advance(glyph))
                    .unwrap_or(self.space_advance);
                advance = advance.saturating_add(glyph_advance as u32);
            }
            advance
        });
        advance as f32 * self.scale(size)
    }

    fn line_height(&self, text: &str, size: f32) -> f32 {
        let full = (self.ascender as i32 - self.descender as i32).max(1);
        let units = self.with_face(full, |face| {
            let mut top: Option<i32> = None;
            let mut bottom: Option<i32> = None;
            for ch in text.chars() {
                let Some(bbox) = face
                    .glyph_index(ch)
                    .and_then(|glyph| face.glyph_bounding_box(glyph))
                else {
                    continue;
                };
                top = Some(top.map_or(bbox.y_max as i32, |value| value.max(bbox.y_max as i32)));
                bottom = Some(
                    bottom.map_or(bbox.y_min as i32, |value| value.min(bbox.y_min as i32)),
                );
            }
            match (top, bottom) {
                (Some(top), Some(bottom)) if top > bottom => top - bottom,
                _ => full,
            }
        });
        units as f32 * self.scale(size)
    }

    fn ascent(&self, size: f32) -> f32 {
        self.ascender as f32 * self.scale(size)
    }
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

/// A font file ready for both measuring and rasterizing.
pub struct LoadedFont {
    pub face: FontFace,
    pub fontdb: Arc<fontdb::Database>,
    /// Family and weight of the first face, as the rasterizer will match them.
    pub family: String,
    pub weight: u16,
}

/// Loads each font file once per run.
#[derive(Default)]
pub struct FontLibrary {
    loaded: Mutex<HashMap<PathBuf, Arc<LoadedFont>>>,
}

impl FontLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, path: &Path) -> Result<Arc<LoadedFont>> {
        if let Some(hit) = self.lock().get(path) {
            return Ok(hit.clone());
        }

        let face = FontFace::load(path)?;
        let mut db = fontdb::Database::new();
        db.load_font_data(face.data().to_vec());
        let (family, weight) = db
            .faces()
            .next()
            .and_then(|info| {
                info.families
                    .first()
                    .map(|(name, _)| (name.clone(), info.weight.0))
            })
            .or_else(|| face.family().map(|name| (name.to_string(), 400)))
            .ok_or_else(|| {
                OverlayError::RenderFailed(format!("font has no family name: {}", path.display()))
            })?;
        let loaded = Arc::new(LoadedFont {
            face,
            fontdb: Arc::new(db),
            family,
            weight,
        });

        // First writer wins; a concurrent load of the same file is identical.
        let mut guard = self.lock();
        let entry = guard
            .entry(path.to_path_buf())
            .or_insert_with(|| loaded.clone());
        Ok(entry.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<LoadedFont>>> {
        self.loaded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
