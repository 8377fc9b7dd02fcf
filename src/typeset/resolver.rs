use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use tracing::{debug, warn};
use usvg::fontdb;
use walkdir::WalkDir;

use super::script::Script;
use crate::error::{OverlayError, Result};

/// A concrete font file chosen for a (script, weight) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFont {
    pub path: PathBuf,
    pub script: Script,
    pub bold: bool,
}

/// Canonical font file and family for one script and weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontSpec {
    pub file_name: &'static str,
    pub family: &'static str,
}

pub fn font_spec(script: Script, bold: bool) -> FontSpec {
    let (file_name, family) = match (script, bold) {
        (Script::Cjk, false) => ("NotoSansCJK-Regular.ttc", "Noto Sans CJK SC"),
        (Script::Cjk, true) => ("NotoSansCJK-Bold.ttc", "Noto Sans CJK SC"),
        (Script::Korean, false) => ("NanumGothic.ttf", "NanumGothic"),
        (Script::Korean, true) => ("NanumGothicBold.ttf", "NanumGothic"),
        (Script::Japanese, false) => ("NotoSansJP-Regular.otf", "Noto Sans JP"),
        (Script::Japanese, true) => ("NotoSansJP-Bold.otf", "Noto Sans JP"),
        (Script::Cyrillic, false) => ("NotoSans-Regular.ttf", "Noto Sans"),
        (Script::Cyrillic, true) => ("NotoSans-Bold.ttf", "Noto Sans"),
        (Script::Latin, false) => ("Arial.ttf", "Arial"),
        (Script::Latin, true) => ("Arial Bold.ttf", "Arial"),
    };
    FontSpec { file_name, family }
}

/// Latin fonts tried when the script's own font is missing, in order.
const FALLBACK_FONTS: [FontSpec; 2] = [
    FontSpec {
        file_name: "Arial.ttf",
        family: "Arial",
    },
    FontSpec {
        file_name: "DejaVuSans.ttf",
        family: "DejaVu Sans",
    },
];

const GENERIC_SANS_SERIF: &str = "sans-serif";

/// Families tried, in order, for the generic sans-serif query.
const SANS_FAMILIES: [&str; 4] = ["DejaVu Sans", "Liberation Sans", "Noto Sans", "FreeSans"];

/// Where font files are looked up.
pub trait FontLocator: Send + Sync {
    /// Case-insensitive file-name search through the font directories.
    fn find_in_dirs(&self, file_name: &str) -> Option<PathBuf>;
    /// System font query by family name; `"sans-serif"` means the generic family.
    fn query_system(&self, family: &str) -> Option<PathBuf>;
}

pub fn default_font_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/usr/share/fonts"),
        PathBuf::from("/usr/local/share/fonts"),
    ];
    if let Some(home) = home_dir() {
        dirs.push(home.join(".local/share/fonts"));
        dirs.push(home.join(".fonts"));
    }
    dirs.push(PathBuf::from("/mnt/c/Windows/Fonts"));
    dirs
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(PathBuf::from(home))
        }
    })
}

/// Searches font directories on disk and the system font database.
pub struct SystemFontLocator {
    dirs: Vec<PathBuf>,
    system: OnceLock<fontdb::Database>,
}

impl SystemFontLocator {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            system: OnceLock::new(),
        }
    }

    fn system_db(&self) -> &fontdb::Database {
        self.system.get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            db
        })
    }
}

impl Default for SystemFontLocator {
    fn default() -> Self {
        Self::new(default_font_dirs())
    }
}

impl FontLocator for SystemFontLocator {
    fn find_in_dirs(&self, file_name: &str) -> Option<PathBuf> {
        let wanted = file_name.to_lowercase();
        self.dirs
            .iter()
            .filter(|dir| dir.is_dir())
            .find_map(|dir| find_file_recursive(dir, &wanted))
    }

    fn query_system(&self, family: &str) -> Option<PathBuf> {
        query_database(self.system_db(), family)
    }
}

/// Looks `family` up in `db`. The generic `"sans-serif"` tries common sans
/// families before settling for any proportional face backed by a file.
fn query_database(db: &fontdb::Database, family: &str) -> Option<PathBuf> {
    if !family.eq_ignore_ascii_case(GENERIC_SANS_SERIF) {
        return query_families(db, &[fontdb::Family::Name(family)]);
    }
    let mut families: Vec<_> = SANS_FAMILIES.into_iter().map(fontdb::Family::Name).collect();
    families.push(fontdb::Family::SansSerif);
    query_families(db, &families).or_else(|| {
        db.faces()
            .filter(|face| !face.monospaced)
            .find_map(|face| file_path(&face.source))
    })
}

fn query_families(db: &fontdb::Database, families: &[fontdb::Family<'_>]) -> Option<PathBuf> {
    let query = fontdb::Query {
        families,
        ..Default::default()
    };
    let id = db.query(&query)?;
    file_path(&db.face(id)?.source)
}

fn file_path(source: &fontdb::Source) -> Option<PathBuf> {
    match source {
        fontdb::Source::File(path) => Some(path.clone()),
        _ => None,
    }
}

fn find_file_recursive(dir: &Path, wanted_lower: &str) -> Option<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| entry.file_name().to_string_lossy().to_lowercase() == wanted_lower)
        .map(|entry| entry.into_path())
}

type CacheKey = (&'static str, bool);

/// Maps (script, weight) to a font file, caching every successful lookup for
/// the lifetime of the resolver.
pub struct FontResolver<L: FontLocator = SystemFontLocator> {
    locator: L,
    cache: Mutex<HashMap<CacheKey, ResolvedFont>>,
}

impl<L: FontLocator> FontResolver<L> {
    pub fn new(locator: L) -> Self {
        Self {
            locator,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn resolve(&self, script: Script, bold: bool) -> Result<ResolvedFont> {
        let spec = font_spec(script, bold);
        let key = (spec.file_name, bold);
        if let Some(hit) = self.lock_cache().get(&key) {
            return Ok(hit.clone());
        }

        let path = match self.locate(&spec) {
            Some(path) => path,
            None => {
                warn!(
                    "font {} not found for {} text; trying fallbacks",
                    spec.file_name,
                    script.as_str()
                );
                self.locate_fallback().ok_or_else(|| OverlayError::FontNotFound {
                    font: spec.file_name.to_string(),
                })?
            }
        };
        debug!("resolved {} (bold={}) to {}", spec.file_name, bold, path.display());

        let resolved = ResolvedFont { path, script, bold };
        let mut cache = self.lock_cache();
        Ok(cache.entry(key).or_insert(resolved).clone())
    }

    /// Number of cached (font, weight) entries.
    pub fn cached_len(&self) -> usize {
        self.lock_cache().len()
    }

    fn locate(&self, spec: &FontSpec) -> Option<PathBuf> {
        self.locator
            .find_in_dirs(spec.file_name)
            .or_else(|| self.locator.query_system(spec.family))
    }

    fn locate_fallback(&self) -> Option<PathBuf> {
        FALLBACK_FONTS
            .iter()
            .find_map(|spec| self.locate(spec))
            .or_else(|| self.locator.query_system(GENERIC_SANS_SERIF))
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, ResolvedFont>> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingLocator {
        files: HashMap<String, PathBuf>,
        system: HashMap<String, PathBuf>,
        dir_searches: AtomicUsize,
        system_queries: AtomicUsize,
    }

    impl CountingLocator {
        fn with_file(mut self, name: &str, path: &str) -> Self {
            self.files.insert(name.to_lowercase(), PathBuf::from(path));
            self
        }

        fn with_system(mut self, family: &str, path: &str) -> Self {
            self.system.insert(family.to_string(), PathBuf::from(path));
            self
        }
    }

    impl FontLocator for CountingLocator {
        fn find_in_dirs(&self, file_name: &str) -> Option<PathBuf> {
            self.dir_searches.fetch_add(1, Ordering::SeqCst);
            self.files.get(&file_name.to_lowercase()).cloned()
        }

        fn query_system(&self, family: &str) -> Option<PathBuf> {
            self.system_queries.fetch_add(1, Ordering::SeqCst);
            self.system.get(family).cloned()
        }
    }

    #[test]
    fn table_covers_every_script_and_weight() {
        for script in [
            Script::Latin,
            Script::Cjk,
            Script::Korean,
            Script::Japanese,
            Script::Cyrillic,
        ] {
            let regular = font_spec(script, false);
            let bold = font_spec(script, true);
            assert_ne!(regular.file_name, bold.file_name);
        }
    }

    #[test]
    fn resolve_is_idempotent_and_searches_once() {
        let locator =
            CountingLocator::default().with_file("NanumGothic.ttf", "/fonts/NanumGothic.ttf");
        let resolver = FontResolver::new(locator);

        let first = resolver.resolve(Script::Korean, false).unwrap();
        let second = resolver.resolve(Script::Korean, false).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.path, PathBuf::from("/fonts/NanumGothic.ttf"));
        assert_eq!(resolver.locator.dir_searches.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cached_len(), 1);
    }

    #[test]
    fn weights_are_cached_separately() {
        let locator = CountingLocator::default()
            .with_file("arial.ttf", "/fonts/arial.ttf")
            .with_file("arial bold.ttf", "/fonts/arialbd.ttf");
        let resolver = FontResolver::new(locator);

        let regular = resolver.resolve(Script::Latin, false).unwrap();
        let bold = resolver.resolve(Script::Latin, true).unwrap();

        assert_eq!(regular.path, PathBuf::from("/fonts/arial.ttf"));
        assert_eq!(bold.path, PathBuf::from("/fonts/arialbd.ttf"));
        assert!(bold.bold);
        assert_eq!(resolver.cached_len(), 2);
    }

    #[test]
    fn system_query_runs_after_directory_miss() {
        let locator = CountingLocator::default().with_system("Noto Sans", "/sys/NotoSans.ttf");
        let resolver = FontResolver::new(locator);

        let font = resolver.resolve(Script::Cyrillic, false).unwrap();
        assert_eq!(font.path, PathBuf::from("/sys/NotoSans.ttf"));
        assert_eq!(font.script, Script::Cyrillic);
    }

    #[test]
    fn falls_back_to_latin_then_generic_sans() {
        let locator = CountingLocator::default().with_file("DejaVuSans.ttf", "/fonts/DejaVuSans.ttf");
        let resolver = FontResolver::new(locator);
        let font = resolver.resolve(Script::Cjk, true).unwrap();
        assert_eq!(font.path, PathBuf::from("/fonts/DejaVuSans.ttf"));

        let locator = CountingLocator::default().with_system("sans-serif", "/sys/Generic.ttf");
        let resolver = FontResolver::new(locator);
        let font = resolver.resolve(Script::Japanese, false).unwrap();
        assert_eq!(font.path, PathBuf::from("/sys/Generic.ttf"));
    }

    #[test]
    fn exhausted_fallbacks_report_font_not_found() {
        let resolver = FontResolver::new(CountingLocator::default());
        let err = resolver.resolve(Script::Korean, true).unwrap_err();
        assert!(matches!(err, OverlayError::FontNotFound { font } if font == "NanumGothicBold.ttf"));
        assert_eq!(resolver.cached_len(), 0);
    }

    #[test]
    fn directory_search_is_case_insensitive_and_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("truetype").join("noto");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("notosans-regular.TTF"), b"x").unwrap();

        let locator = SystemFontLocator::new(vec![
            dir.path().join("missing"),
            dir.path().to_path_buf(),
        ]);
        let found = locator.find_in_dirs("NotoSans-Regular.ttf").unwrap();
        assert_eq!(found, nested.join("notosans-regular.TTF"));
        assert!(locator.find_in_dirs("Other.ttf").is_none());
    }

    #[test]
    fn generic_sans_picks_an_installed_face_without_arial() {
        let mut db = fontdb::Database::new();
        for dir in default_font_dirs().iter().filter(|dir| dir.is_dir()) {
            db.load_fonts_dir(dir);
        }
        let arial: Vec<_> = db
            .faces()
            .filter(|face| face.families.iter().any(|(name, _)| name.eq_ignore_ascii_case("Arial")))
            .map(|face| face.id)
            .collect();
        for id in arial {
            db.remove_face(id);
        }
        let proportional: Vec<PathBuf> = db
            .faces()
            .filter(|face| !face.monospaced)
            .filter_map(|face| file_path(&face.source))
            .collect();
        if proportional.is_empty() {
            eprintln!("no proportional fonts installed; skipping");
            return;
        }

        let path = query_database(&db, "sans-serif").expect("generic sans resolves");
        assert!(proportional.contains(&path), "{}", path.display());

        let has_dejavu = db
            .faces()
            .any(|face| face.families.iter().any(|(name, _)| name == "DejaVu Sans"));
        if has_dejavu {
            let chosen = db
                .faces()
                .find(|face| file_path(&face.source).as_ref() == Some(&path))
                .unwrap();
            assert!(chosen.families.iter().any(|(name, _)| name == "DejaVu Sans"));
        }
    }

    #[test]
    fn generic_sans_on_an_empty_database_finds_nothing() {
        let db = fontdb::Database::new();
        assert!(query_database(&db, "sans-serif").is_none());
        assert!(query_database(&db, "DejaVu Sans").is_none());
    }
}
