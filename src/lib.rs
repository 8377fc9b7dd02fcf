use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub mod error;
pub mod languages;
pub mod logging;
pub mod ocr;
pub mod pipeline;
pub mod settings;
#[cfg(test)]
mod test_util;
pub mod translate;
pub mod typeset;

pub use error::OverlayError;
pub use languages::LanguageCode;
pub use ocr::{OcrPage, TextBlock};
pub use pipeline::{OverlayPipeline, PageReport, PipelineOptions, RunSummary};
pub use translate::TranslationClient;

use translate::ChatCompletionsTransport;
use typeset::{BoxRenderer, FontResolver, OverlayStyle, SystemFontLocator};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub lang: Option<String>,
    pub source_lang: Option<String>,
    pub key: Option<String>,
    pub settings_path: Option<String>,
    pub json_dir: Option<String>,
    pub image_dir: Option<String>,
    pub output_dir: Option<String>,
    pub show_languages: bool,
    /// Print the run summary as JSON.
    pub json_summary: bool,
}

pub async fn run(config: Config) -> Result<String> {
    if config.show_languages {
        return Ok(format_languages());
    }

    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    let target_raw = config.lang.as_deref().unwrap_or(&settings.target_lang);
    let target: LanguageCode = target_raw
        .parse()
        .with_context(|| "invalid target language")?;

    let json_dir = dir_or(config.json_dir.as_deref(), &settings.json_dir);
    let image_dir = dir_or(config.image_dir.as_deref(), &settings.image_dir);
    let output_dir = dir_or(config.output_dir.as_deref(), &settings.output_dir);

    let files = pipeline::collect_json_files(&json_dir);
    if files.is_empty() {
        return Err(anyhow!(
            "no OCR result files found under {}",
            json_dir.display()
        ));
    }

    let source_raw = config
        .source_lang
        .as_deref()
        .unwrap_or(&settings.source_lang);
    let source = resolve_source_language(source_raw, &files)?;
    info!("translating {} -> {}", source, target);

    let key = if source == target {
        String::new()
    } else {
        resolve_key(config.key.as_deref(), &settings.key_env)?
    };
    let transport = ChatCompletionsTransport::new(&settings.api_url, key, settings.timeout)
        .with_context(|| "failed to set up translation client")?;
    let client = TranslationClient::new(transport)
        .with_model(&settings.model)
        .with_max_retries(settings.max_retries)
        .with_retry_delay(settings.retry_delay);

    let resolver = FontResolver::new(SystemFontLocator::new(settings.font_search_dirs()));
    let renderer = BoxRenderer::new(OverlayStyle {
        text_color: settings.text_color.clone(),
        fill_color: settings.fill_color.clone(),
    })
    .with_context(|| "invalid overlay colors in settings")?;

    let options = PipelineOptions {
        source,
        target,
        concurrency: settings.concurrency,
    };
    let pipeline = OverlayPipeline::new(resolver, renderer, client, options);
    let summary = pipeline.process_files(&files, &image_dir, &output_dir).await;

    if summary.processed == 0 {
        return Err(anyhow!("no pages could be processed ({} failed)", summary.failed));
    }
    if config.json_summary {
        return format_summary_json(&summary, &output_dir);
    }
    Ok(format_summary(&summary, &output_dir))
}

/// Parses a source language, sampling the OCR output when it is `auto`.
pub fn resolve_source_language(value: &str, files: &[PathBuf]) -> Result<LanguageCode> {
    if !value.trim().eq_ignore_ascii_case(settings::AUTO_SOURCE) {
        return value
            .parse()
            .with_context(|| "invalid source language");
    }
    let sample = pipeline::sample_document_text(files, pipeline::SOURCE_SAMPLE_LIMIT);
    match pipeline::detect_source_language(&sample) {
        Some(code) => {
            info!("detected source language: {}", code);
            Ok(code)
        }
        None => {
            warn!("could not detect source language; assuming en");
            Ok(LanguageCode::En)
        }
    }
}

fn resolve_key(explicit: Option<&str>, key_env: &str) -> Result<String> {
    if let Some(key) = explicit.map(str::trim).filter(|key| !key.is_empty()) {
        return Ok(key.to_string());
    }
    std::env::var(key_env)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| anyhow!("no API key found; set {} or pass --key", key_env))
}

fn dir_or(explicit: Option<&str>, fallback: &Path) -> PathBuf {
    explicit
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| fallback.to_path_buf())
}

fn format_languages() -> String {
    LanguageCode::ALL
        .iter()
        .map(|code| format!("{}\t{}", code.as_str(), code.display_name()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_summary(summary: &RunSummary, output_dir: &Path) -> String {
    let rendered: usize = summary.pages.iter().map(|page| page.rendered).sum();
    let skipped: usize = summary.pages.iter().map(|page| page.skipped).sum();
    format!(
        "processed: {}\nfailed: {}\nblocks rendered: {}\nblocks skipped: {}\noutput: {}",
        summary.processed,
        summary.failed,
        rendered,
        skipped,
        output_dir.display()
    )
}

#[derive(Serialize)]
struct SummaryReport<'a> {
    #[serde(flatten)]
    summary: &'a RunSummary,
    output: String,
}

fn format_summary_json(summary: &RunSummary, output_dir: &Path) -> Result<String> {
    let report = SummaryReport {
        summary,
        output: output_dir.display().to_string(),
    };
    serde_json::to_string_pretty(&report).with_context(|| "failed to encode run summary")
}
