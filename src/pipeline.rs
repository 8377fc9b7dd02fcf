use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use regex::Regex;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{OverlayError, Result};
use crate::languages::LanguageCode;
use crate::ocr::{OcrPage, TextBlock};
use crate::translate::{ChatCompletionsTransport, TranslationClient, Transport};
use crate::typeset::{
    BoxRenderer, FontLibrary, FontLocator, FontResolver, RenderPlan, SystemFontLocator, detect,
    dominant_script,
};

static PAGE_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"page_(\d+)").expect("invalid page index regex"));

/// Quality used for JPEG output.
pub const JPEG_QUALITY: u8 = 100;

/// Characters of OCR text sampled when detecting the source language.
pub const SOURCE_SAMPLE_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub source: LanguageCode,
    pub target: LanguageCode,
    /// Translation requests in flight per page.
    pub concurrency: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            source: LanguageCode::En,
            target: LanguageCode::DEFAULT_TARGET,
            concurrency: 1,
        }
    }
}

/// Outcome of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageReport {
    pub page: Option<u32>,
    pub blocks: usize,
    pub rendered: usize,
    pub skipped: usize,
}

/// Outcome of a whole document run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub failed: usize,
    pub pages: Vec<PageReport>,
}

pub struct OverlayPipeline<T: Transport = ChatCompletionsTransport, L: FontLocator = SystemFontLocator>
{
    resolver: FontResolver<L>,
    fonts: FontLibrary,
    renderer: BoxRenderer,
    client: TranslationClient<T>,
    options: PipelineOptions,
}

impl<T: Transport, L: FontLocator> OverlayPipeline<T, L> {
    pub fn new(
        resolver: FontResolver<L>,
        renderer: BoxRenderer,
        client: TranslationClient<T>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            resolver,
            fonts: FontLibrary::new(),
            renderer,
            client,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn resolver(&self) -> &FontResolver<L> {
        &self.resolver
    }

    pub fn client(&self) -> &TranslationClient<T> {
        &self.client
    }

    /// Translates and redraws every block of one page in place.
    ///
    /// A block that fails to resolve a font or render is logged and skipped;
    /// its box stays cleared.
    pub async fn translate_page(&self, image: &mut RgbImage, blocks: &[TextBlock]) -> PageReport {
        let mut report = PageReport {
            blocks: blocks.len(),
            ..PageReport::default()
        };
        if blocks.is_empty() {
            return report;
        }

        let translated = self.translate_blocks(blocks).await;
        for (idx, (block, text)) in blocks.iter().zip(&translated).enumerate() {
            match self.render_block(image, block, text) {
                Ok(()) => report.rendered += 1,
                Err(err) => {
                    warn!("skipping block {}: {}", idx, err);
                    report.skipped += 1;
                }
            }
        }
        report
    }

    async fn translate_blocks(&self, blocks: &[TextBlock]) -> Vec<String> {
        let pending: Vec<String> = blocks
            .iter()
            .filter(|block| !block.is_placeholder())
            .map(|block| block.source_text.clone())
            .collect();
        let mut done = self
            .client
            .translate_all(
                &pending,
                self.options.source,
                self.options.target,
                self.options.concurrency,
            )
            .await
            .into_iter();

        blocks
            .iter()
            .map(|block| {
                if block.is_placeholder() {
                    block.source_text.clone()
                } else {
                    done.next().unwrap_or_else(|| block.source_text.clone())
                }
            })
            .collect()
    }

    /// Clears the block, then sizes and draws `translated` into it.
    pub fn render_block(&self, image: &mut RgbImage, block: &TextBlock, translated: &str) -> Result<()> {
        self.renderer.clear(image, &block.rect);

        let paragraphs = split_paragraphs(translated);
        if paragraphs.is_empty() {
            return Ok(());
        }
        let script = detect(&paragraphs.join(" "));
        let resolved = self.resolver.resolve(script, block.is_bold)?;
        let font = self.fonts.load(&resolved.path)?;

        let width = block.rect.width() - block.left_margin;
        let plan = RenderPlan::build(resolved, &font.face, &paragraphs, width, block.rect.height());
        debug!(
            "block at ({:.0}, {:.0}): {} lines at {}pt",
            block.rect.x0,
            block.rect.y0,
            plan.lines.len(),
            plan.size_pt
        );
        self.renderer
            .draw(image, &block.rect, &plan, &font, block.left_margin)
    }

    /// Reads one OCR result, redraws its page image and writes the output.
    pub async fn process_page_file(
        &self,
        json_path: &Path,
        image_dir: &Path,
        output_dir: &Path,
    ) -> Result<PageReport> {
        let page = OcrPage::load(json_path)?;
        let image_name = image_name_for_json(json_path);
        let image_path = find_file(image_dir, &image_name).ok_or_else(|| {
            OverlayError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("image {} not found under {}", image_name, image_dir.display()),
            ))
        })?;

        let mut image = image::open(&image_path)?.to_rgb8();
        let mut report = self.translate_page(&mut image, &page.blocks).await;
        report.page = page_index(json_path);

        std::fs::create_dir_all(output_dir)?;
        let out = output_path(output_dir, &image_path, self.options.target);
        save_image(&image, &out)?;
        info!(
            "page {}: {}/{} blocks rendered -> {}",
            image_name,
            report.rendered,
            report.blocks,
            out.display()
        );
        Ok(report)
    }

    /// Processes every OCR result under `json_dir` in page order.
    pub async fn process_document(
        &self,
        json_dir: &Path,
        image_dir: &Path,
        output_dir: &Path,
    ) -> RunSummary {
        let files = collect_json_files(json_dir);
        info!("found {} OCR result files", files.len());
        self.process_files(&files, image_dir, output_dir).await
    }

    /// Processes the given OCR result files in the order given.
    pub async fn process_files(
        &self,
        files: &[PathBuf],
        image_dir: &Path,
        output_dir: &Path,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        for path in files {
            match self.process_page_file(path, image_dir, output_dir).await {
                Ok(report) => {
                    summary.processed += 1;
                    summary.pages.push(report);
                }
                Err(err) => {
                    warn!("failed to process {}: {}", path.display(), err);
                    summary.failed += 1;
                }
            }
        }
        info!(
            "done: {} pages processed, {} failed",
            summary.processed, summary.failed
        );
        summary
    }
}

/// Splits translated text into trimmed, non-empty paragraphs.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Numeric page index from a `page_<n>` file name.
pub fn page_index(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    PAGE_INDEX.captures(name)?.get(1)?.as_str().parse().ok()
}

/// Numeric page order; files without an index go last, by name.
pub fn sort_pages(paths: &mut [PathBuf]) {
    paths.sort_by_cached_key(|path| {
        let order = match page_index(path) {
            Some(index) => (0, index),
            None => (1, 0),
        };
        (order, path.file_name().map(|name| name.to_os_string()))
    });
}

/// All `.json` files under `dir`, recursively, in page order.
pub fn collect_json_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .collect();
    sort_pages(&mut files);
    files
}

/// `page_3_res.json` -> `page_3.jpg`; any other `name.json` -> `name.jpg`.
pub fn image_name_for_json(json_path: &Path) -> String {
    let name = json_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name
        .strip_suffix("_res.json")
        .or_else(|| name.strip_suffix(".json"))
        .unwrap_or(&name);
    format!("{stem}.jpg")
}

/// `<dir>/translated_<lang>_<image>`; the suffix is left out for the default target.
pub fn output_path(output_dir: &Path, image_path: &Path, target: LanguageCode) -> PathBuf {
    let name = image_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = if target == LanguageCode::DEFAULT_TARGET {
        format!("translated_{name}")
    } else {
        format!("translated_{}_{name}", target.as_str())
    };
    output_dir.join(file_name)
}

/// Writes `image` to `path`; JPEG output is encoded at [`JPEG_QUALITY`].
pub fn save_image(image: &RgbImage, path: &Path) -> Result<()> {
    let is_jpeg = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"));
    if !is_jpeg {
        image.save(path)?;
        return Ok(());
    }
    let mut writer = BufWriter::new(File::create(path)?);
    image.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY))?;
    writer.flush()?;
    Ok(())
}

fn find_file(dir: &Path, file_name: &str) -> Option<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name().to_str() == Some(file_name))
        .map(|entry| entry.into_path())
}

/// OCR text from the first pages of `files`, up to `limit` characters.
pub fn sample_document_text(files: &[PathBuf], limit: usize) -> String {
    let mut sample = String::new();
    for path in files {
        let remaining = limit.saturating_sub(sample.chars().count());
        if remaining == 0 {
            break;
        }
        match OcrPage::load(path) {
            Ok(page) => sample.push_str(&page.sample_text(remaining)),
            Err(err) => debug!("not sampling {}: {}", path.display(), err),
        }
    }
    sample
}

/// Source language guessed from the dominant script of `sample`.
pub fn detect_source_language(sample: &str) -> Option<LanguageCode> {
    dominant_script(sample).map(LanguageCode::for_script)
}
