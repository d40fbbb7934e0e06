//! File-backed message catalog.
//!
//! Each language lives in `<dir>/<lang>.json` as a flat object of
//! `key -> template`. Catalogs are loaded on first use and kept in a
//! read-write-locked map. When `reload_after` is non-zero, an entry older
//! than that is re-validated against the file's mtime on the next lookup and
//! re-read only if the file changed.

mod accept_language;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

pub use accept_language::AcceptLanguage;

/// Templates for one language, in file order.
pub type Catalog = IndexMap<String, String>;

struct Entry {
    /// `None` when the file is missing or unreadable.
    catalog: Option<Arc<Catalog>>,
    modified: Option<SystemTime>,
    checked_at: Instant,
}

/// Lookups are synchronous and read files with `std::fs` on a cache miss or
/// a stale-entry check, so a slow mount stalls the calling runtime worker
/// for that request. Catalogs are small flat files and misses are rare once
/// warm; keep `MESSAGES_DIR` on local disk.
pub struct MessageCatalog {
    dir: PathBuf,
    default_language: String,
    reload_after: Duration,
    cache: RwLock<HashMap<String, Entry>>,
}

impl MessageCatalog {
    pub fn new(dir: impl Into<PathBuf>, default_language: &str, reload_after: Duration) -> Self {
        Self {
            dir: dir.into(),
            default_language: normalize(default_language),
            reload_after,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Catalog for exactly `lang` (no fallback).
    pub fn catalog(&self, lang: &str) -> Option<Arc<Catalog>> {
        let lang = normalize(lang);
        if !is_valid_tag(&lang) {
            return None;
        }

        if let Some(hit) = self.cached(&lang) {
            return hit;
        }

        let path = self.path_for(&lang);
        let modified = modified_time(&path);

        // Stale entry whose file has not changed: just refresh the check time.
        {
            let mut cache = self.cache.write();
            if let Some(entry) = cache.get_mut(&lang) {
                if entry.modified == modified {
                    entry.checked_at = Instant::now();
                    return entry.catalog.clone();
                }
            }
        }

        let catalog = load_file(&path).map(Arc::new);
        debug!(lang = %lang, found = catalog.is_some(), "Loaded message catalog");

        self.cache.write().insert(
            lang,
            Entry {
                catalog: catalog.clone(),
                modified,
                checked_at: Instant::now(),
            },
        );
        catalog
    }

    /// Outer `Some` means the cached entry is fresh enough to use.
    fn cached(&self, lang: &str) -> Option<Option<Arc<Catalog>>> {
        let cache = self.cache.read();
        let entry = cache.get(lang)?;
        let fresh = self.reload_after.is_zero() || entry.checked_at.elapsed() < self.reload_after;
        fresh.then(|| entry.catalog.clone())
    }

    /// Renders `key` for `lang`, falling back to the primary subtag, then to
    /// the default language, then to the key itself.
    pub fn lookup(&self, lang: &str, key: &str, params: &[(&str, String)]) -> String {
        for candidate in self.fallback_chain(lang) {
            if let Some(catalog) = self.catalog(&candidate) {
                if let Some(template) = catalog.get(key) {
                    return render(template, params);
                }
            }
        }
        key.to_string()
    }

    /// First preferred language that has a catalog, else the default.
    pub fn resolve(&self, preferences: &[String]) -> String {
        for pref in preferences {
            let tag = normalize(pref);
            if self.catalog(&tag).is_some() {
                return tag;
            }
            if let Some(primary) = primary_subtag(&tag) {
                if self.catalog(primary).is_some() {
                    return primary.to_string();
                }
            }
        }
        self.default_language.clone()
    }

    /// Languages with a `*.json` file in the catalog directory, sorted.
    pub fn languages(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Cannot read message directory");
                return Vec::new();
            }
        };

        let mut langs: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(normalize))
            .filter(|lang| is_valid_tag(lang))
            .collect();
        langs.sort();
        langs.dedup();
        langs
    }

    /// Drops every cached catalog; the next lookup re-reads from disk.
    pub fn reload(&self) {
        let mut cache = self.cache.write();
        let dropped = cache.len();
        cache.clear();
        info!(dropped, "Message catalog cache cleared");
    }

    fn fallback_chain(&self, lang: &str) -> Vec<String> {
        let tag = normalize(lang);
        let mut chain = Vec::with_capacity(3);
        if let Some(primary) = primary_subtag(&tag) {
            let primary = primary.to_string();
            chain.push(tag);
            chain.push(primary);
        } else {
            chain.push(tag);
        }
        if !chain.contains(&self.default_language) {
            chain.push(self.default_language.clone());
        }
        chain
    }

    fn path_for(&self, lang: &str) -> PathBuf {
        self.dir.join(format!("{lang}.json"))
    }
}

fn load_file(path: &Path) -> Option<Catalog> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read message catalog");
            return None;
        }
    };
    match serde_json::from_str::<Catalog>(&raw) {
        Ok(catalog) => Some(catalog),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Malformed message catalog");
            None
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Lower-case, `_` -> `-`, trimmed.
pub fn normalize(lang: &str) -> String {
    lang.trim().replace('_', "-").to_ascii_lowercase()
}

fn primary_subtag(tag: &str) -> Option<&str> {
    tag.split_once('-').map(|(primary, _)| primary).filter(|p| !p.is_empty())
}

/// Tags become file names, so only `[a-z0-9-]` is accepted.
fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag.len() <= 35
        && tag.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Replaces `{name}` with the matching param. Unknown placeholders and
/// unmatched braces are copied through.
pub fn render(template: &str, params: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match params.iter().find(|(k, _)| *k == name) {
                    Some((_, value)) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &Path, lang: &str, body: &str) {
        let mut f = File::create(dir.join(format!("{lang}.json"))).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    fn setup() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "en", r#"{"greet": "Hello {name}", "only_en": "English only"}"#);
        write(dir.path(), "es", r#"{"greet": "Hola {name}"}"#);
        write(dir.path(), "pt-br", r#"{"greet": "Olá {name}"}"#);
        dir
    }

    fn p(name: &'static str, v: &str) -> Vec<(&'static str, String)> {
        vec![(name, v.to_string())]
    }

    #[test]
    fn render_substitutes_known_params() {
        assert_eq!(render("Hi {a} and {b}", &[("a", "x".into())]), "Hi x and {b}");
        assert_eq!(render("no placeholders", &[]), "no placeholders");
        assert_eq!(render("open { brace", &[]), "open { brace");
    }

    #[test]
    fn lookup_by_language() {
        let dir = setup();
        let cat = MessageCatalog::new(dir.path(), "en", Duration::ZERO);
        assert_eq!(cat.lookup("es", "greet", &p("name", "Ana")), "Hola Ana");
        assert_eq!(cat.lookup("EN", "greet", &p("name", "Ann")), "Hello Ann");
    }

    #[test]
    fn lookup_falls_back_through_primary_then_default() {
        let dir = setup();
        let cat = MessageCatalog::new(dir.path(), "en", Duration::ZERO);
        assert_eq!(cat.lookup("es_MX", "greet", &p("name", "Ana")), "Hola Ana");
        assert_eq!(cat.lookup("es", "only_en", &[]), "English only");
        assert_eq!(cat.lookup("fr", "greet", &p("name", "Zoe")), "Hello Zoe");
        assert_eq!(cat.lookup("es", "missing.key", &[]), "missing.key");
    }

    #[test]
    fn path_like_tags_are_rejected() {
        let dir = setup();
        let cat = MessageCatalog::new(dir.path(), "en", Duration::ZERO);
        assert!(cat.catalog("../en").is_none());
        assert_eq!(cat.lookup("../es", "greet", &p("name", "x")), "Hello x");
    }

    #[test]
    fn resolve_prefers_first_available() {
        let dir = setup();
        let cat = MessageCatalog::new(dir.path(), "en", Duration::ZERO);
        let prefs = vec!["de".to_string(), "pt-BR".to_string(), "es".to_string()];
        assert_eq!(cat.resolve(&prefs), "pt-br");
        assert_eq!(cat.resolve(&["es-AR".to_string()]), "es");
        assert_eq!(cat.resolve(&["de".to_string()]), "en");
        assert_eq!(cat.resolve(&[]), "en");
    }

    #[test]
    fn languages_lists_json_files() {
        let dir = setup();
        File::create(dir.path().join("notes.txt")).unwrap();
        let cat = MessageCatalog::new(dir.path(), "en", Duration::ZERO);
        assert_eq!(cat.languages(), vec!["en", "es", "pt-br"]);
    }

    #[test]
    fn catalog_preserves_file_order() {
        let dir = setup();
        let cat = MessageCatalog::new(dir.path(), "en", Duration::ZERO);
        let en = cat.catalog("en").unwrap();
        let keys: Vec<&str> = en.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["greet", "only_en"]);
    }

    #[test]
    fn cache_is_kept_without_reload_interval() {
        let dir = setup();
        let cat = MessageCatalog::new(dir.path(), "en", Duration::ZERO);
        assert_eq!(cat.lookup("es", "greet", &p("name", "A")), "Hola A");
        write(dir.path(), "es", r#"{"greet": "Buenas {name}"}"#);
        assert_eq!(cat.lookup("es", "greet", &p("name", "A")), "Hola A");

        cat.reload();
        assert_eq!(cat.lookup("es", "greet", &p("name", "A")), "Buenas A");
    }

    #[test]
    fn stale_entry_reloads_when_file_changes() {
        let dir = setup();
        let cat = MessageCatalog::new(dir.path(), "en", Duration::from_millis(1));
        assert_eq!(cat.lookup("es", "greet", &p("name", "A")), "Hola A");

        write(dir.path(), "es", r#"{"greet": "Buenas {name}"}"#);
        // Push the mtime forward so the change is visible on coarse clocks.
        let later = SystemTime::now() + Duration::from_secs(5);
        File::options()
            .write(true)
            .open(dir.path().join("es.json"))
            .unwrap()
            .set_modified(later)
            .unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(cat.lookup("es", "greet", &p("name", "A")), "Buenas A");
    }

    #[test]
    fn stale_entry_is_kept_when_mtime_is_unchanged() {
        let dir = setup();
        let path = dir.path().join("es.json");
        let cat = MessageCatalog::new(dir.path(), "en", Duration::from_millis(1));
        assert_eq!(cat.lookup("es", "greet", &p("name", "A")), "Hola A");
        let original = fs::metadata(&path).unwrap().modified().unwrap();

        write(dir.path(), "es", r#"{"greet": "Buenas {name}"}"#);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(original)
            .unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(cat.lookup("es", "greet", &p("name", "A")), "Hola A");
    }

    #[test]
    fn missing_file_is_cached_then_picked_up_after_reload() {
        let dir = setup();
        let cat = MessageCatalog::new(dir.path(), "en", Duration::ZERO);
        assert!(cat.catalog("fr").is_none());
        write(dir.path(), "fr", r#"{"greet": "Bonjour {name}"}"#);
        assert!(cat.catalog("fr").is_none());
        cat.reload();
        assert!(cat.catalog("fr").is_some());
    }

    #[test]
    fn malformed_file_behaves_as_missing() {
        let dir = setup();
        write(dir.path(), "de", "{ not json");
        let cat = MessageCatalog::new(dir.path(), "en", Duration::ZERO);
        assert!(cat.catalog("de").is_none());
        assert_eq!(cat.lookup("de", "greet", &p("name", "B")), "Hello B");
    }
}
