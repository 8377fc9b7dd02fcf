use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::translate::{DEFAULT_API_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT};
use crate::typeset::default_font_dirs;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

pub const AUTO_SOURCE: &str = "auto";

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub model: String,
    pub key_env: String,
    pub max_retries: usize,
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub concurrency: usize,
    pub source_lang: String,
    pub target_lang: String,
    pub json_dir: PathBuf,
    pub image_dir: PathBuf,
    pub output_dir: PathBuf,
    pub font_dirs: Vec<PathBuf>,
    pub extra_font_dirs: Vec<PathBuf>,
    pub text_color: String,
    pub fill_color: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            key_env: "DEEPSEEK_API_KEY".to_string(),
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            timeout: DEFAULT_TIMEOUT,
            concurrency: 1,
            source_lang: AUTO_SOURCE.to_string(),
            target_lang: "en".to_string(),
            json_dir: PathBuf::from("output/json"),
            image_dir: PathBuf::from("output/images"),
            output_dir: PathBuf::from("output/translated_images"),
            font_dirs: Vec::new(),
            extra_font_dirs: Vec::new(),
            text_color: "#000000".to_string(),
            fill_color: "#ffffff".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    api: Option<ApiSettings>,
    language: Option<LanguageSettings>,
    paths: Option<PathSettings>,
    fonts: Option<FontSettings>,
    overlay: Option<OverlaySettings>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiSettings {
    url: Option<String>,
    model: Option<String>,
    key_env: Option<String>,
    max_retries: Option<usize>,
    retry_delay_secs: Option<f64>,
    timeout_secs: Option<f64>,
    concurrency: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LanguageSettings {
    source: Option<String>,
    target: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PathSettings {
    json_dir: Option<String>,
    image_dir: Option<String>,
    output_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FontSettings {
    dirs: Option<Vec<String>>,
    extra_dirs: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySettings {
    text_color: Option<String>,
    fill_color: Option<String>,
}

/// Embedded defaults, then `./settings.toml`, `./settings.local.toml`, the
/// home settings file and finally `extra_path`, each overriding the last.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }
    load_layers(&ordered_paths)
}

/// Merges the embedded defaults with every existing file in `paths`.
pub fn load_layers(paths: &[PathBuf]) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse default settings")?;
    settings.merge(defaults);

    for path in paths {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }
    Ok(settings)
}

impl Settings {
    /// Directories searched for font files, extra ones first.
    pub fn font_search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = self.extra_font_dirs.clone();
        if self.font_dirs.is_empty() {
            dirs.extend(default_font_dirs());
        } else {
            dirs.extend(self.font_dirs.iter().cloned());
        }
        dirs
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(api) = incoming.api {
            merge_string(&mut self.api_url, api.url);
            merge_string(&mut self.model, api.model);
            merge_string(&mut self.key_env, api.key_env);
            if let Some(retries) = api.max_retries {
                if retries > 0 {
                    self.max_retries = retries;
                }
            }
            if let Some(delay) = api.retry_delay_secs.and_then(seconds) {
                self.retry_delay = delay;
            }
            if let Some(timeout) = api.timeout_secs.and_then(seconds) {
                if !timeout.is_zero() {
                    self.timeout = timeout;
                }
            }
            if let Some(concurrency) = api.concurrency {
                if concurrency > 0 {
                    self.concurrency = concurrency;
                }
            }
        }
        if let Some(language) = incoming.language {
            merge_string(&mut self.source_lang, language.source);
            merge_string(&mut self.target_lang, language.target);
        }
        if let Some(paths) = incoming.paths {
            merge_path(&mut self.json_dir, paths.json_dir);
            merge_path(&mut self.image_dir, paths.image_dir);
            merge_path(&mut self.output_dir, paths.output_dir);
        }
        if let Some(fonts) = incoming.fonts {
            if let Some(dirs) = fonts.dirs {
                self.font_dirs = expand_dirs(dirs);
            }
            if let Some(dirs) = fonts.extra_dirs {
                self.extra_font_dirs = expand_dirs(dirs);
            }
        }
        if let Some(overlay) = incoming.overlay {
            merge_string(&mut self.text_color, overlay.text_color);
            merge_string(&mut self.fill_color, overlay.fill_color);
        }
    }
}

fn merge_string(target: &mut String, value: Option<String>) {
    if let Some(value) = value {
        let value = value.trim();
        if !value.is_empty() {
            *target = value.to_string();
        }
    }
}

fn merge_path(target: &mut PathBuf, value: Option<String>) {
    if let Some(value) = value {
        if !value.trim().is_empty() {
            *target = expand_home(value.trim());
        }
    }
}

fn seconds(value: f64) -> Option<Duration> {
    if value.is_finite() && value >= 0.0 {
        Some(Duration::from_secs_f64(value))
    } else {
        None
    }
}

fn expand_dirs(dirs: Vec<String>) -> Vec<PathBuf> {
    dirs.iter()
        .map(|dir| dir.trim())
        .filter(|dir| !dir.is_empty())
        .map(expand_home)
        .collect()
}

fn expand_home(value: &str) -> PathBuf {
    if let Some(rest) = value.strip_prefix("~/") {
        if let Some(home) = user_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(value)
}

fn user_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(PathBuf::from(home))
        }
    })
}

fn home_dir() -> Option<PathBuf> {
    user_home().map(|home| home.join(".pdf-overlay-translator"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_load() {
        let settings = load_layers(&[]).unwrap();
        assert_eq!(settings.model, "deepseek-chat");
        assert_eq!(settings.key_env, "DEEPSEEK_API_KEY");
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.retry_delay, Duration::from_secs(5));
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert_eq!(settings.source_lang, AUTO_SOURCE);
        assert_eq!(settings.target_lang, "en");
        assert!(settings.font_dirs.is_empty());
    }

    #[test]
    fn later_layers_override_earlier_ones() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.toml");
        let second = dir.path().join("second.toml");
        fs::write(
            &first,
            "[api]\nmax_retries = 5\nretry_delay_secs = 0.5\n[language]\ntarget = \"de\"\n",
        )
        .unwrap();
        fs::write(&second, "[language]\ntarget = \"ja\"\n[fonts]\ndirs = [\"/opt/fonts\"]\n")
            .unwrap();

        let settings = load_layers(&[first, second, dir.path().join("missing.toml")]).unwrap();
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.retry_delay, Duration::from_millis(500));
        assert_eq!(settings.target_lang, "ja");
        assert_eq!(settings.font_dirs, vec![PathBuf::from("/opt/fonts")]);
    }

    #[test]
    fn blank_and_invalid_values_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(
            &path,
            "[api]\nmodel = \"  \"\nmax_retries = 0\nconcurrency = 0\ntimeout_secs = -1\n",
        )
        .unwrap();
        let settings = load_layers(&[path]).unwrap();
        assert_eq!(settings.model, "deepseek-chat");
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.concurrency, 1);
        assert_eq!(settings.timeout, Duration::from_secs(30));
    }

    #[test]
    fn extra_font_dirs_come_first() {
        let settings = Settings {
            font_dirs: vec![PathBuf::from("/a")],
            extra_font_dirs: vec![PathBuf::from("/b")],
            ..Settings::default()
        };
        assert_eq!(
            settings.font_search_dirs(),
            vec![PathBuf::from("/b"), PathBuf::from("/a")]
        );
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[api\n").unwrap();
        let err = load_layers(&[path]).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn missing_explicit_settings_file_is_an_error() {
        let err = load_settings(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("settings file not found"));
    }
}
