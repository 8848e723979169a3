use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

/// Durable key semantics - defines only the key layout, shared by the
/// engine and the CLI so both read and write the same entries.

pub const LANGUAGE_PREFIX: &str = "compilerace:language";
pub const BEST_TIME_PREFIX: &str = "compilerace:best";
pub const ACCENT_KEY: &str = "compilerace:accent";

pub const DEFAULT_ACCENT: &str = "#4ade80";

/// Cache key for the resolved language id of a runtime
pub fn language_id_key(runtime: &str) -> String {
    format!("{}:{}", LANGUAGE_PREFIX, runtime.to_lowercase())
}

/// Best-time key for a question
pub fn best_time_key(question_id: &str) -> String {
    format!("{}:{}", BEST_TIME_PREFIX, question_id)
}

/// `#` followed by exactly six hex digits
pub fn is_valid_accent(colour: &str) -> bool {
    colour
        .strip_prefix('#')
        .map_or(false, |hex| hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Stored accent colour, or the default when absent or invalid
pub fn accent(store: &dyn KeyValueStore) -> String {
    store
        .get(ACCENT_KEY)
        .filter(|colour| is_valid_accent(colour))
        .unwrap_or_else(|| DEFAULT_ACCENT.to_string())
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize store: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Text-only key/value storage that outlives a session.
/// Reads never fail: absent or unreadable data reads as `None`.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Entries whose key starts with `prefix`, in key order.
    fn entries(&self, prefix: &str) -> Vec<(String, String)>;
}

/// Read an integer entry, treating corrupt values as absent
pub fn get_parsed<T: std::str::FromStr>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring corrupt stored value");
            None
        }
    }
}

/// Store backed by a single JSON object on disk, rewritten on every change
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = read_entries(&path);
        debug!(path = %path.display(), entries = entries.len(), "Opened store");

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let payload = serde_json::to_string_pretty(entries)?;

        // Readers only ever see a complete file
        let tmp = self.temp_path();
        fs::write(&tmp, payload).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            io_err(source)
        })
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store.json".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
    }

    fn update<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Other processes may have written since this handle last looked
        *entries = read_entries(&self.path);
        change(&mut entries);
        self.flush(&entries)
    }
}

/// Current on-disk entries; a missing, unreadable or corrupt file reads as empty
fn read_entries(path: &Path) -> BTreeMap<String, String> {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Store file is corrupt, starting empty");
                BTreeMap::new()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Store file is unreadable, starting empty");
            BTreeMap::new()
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }

    fn entries(&self, prefix: &str) -> Vec<(String, String)> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Volatile store, used in tests and when no durable location is wanted
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.remove(key);
        Ok(())
    }

    fn entries(&self, prefix: &str) -> Vec<(String, String)> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_store_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("compilerace-{}", Uuid::new_v4()))
            .join("store.json")
    }

    #[test]
    fn test_accent_validation_and_default() {
        assert!(is_valid_accent("#4ade80"));
        assert!(is_valid_accent("#FFAA00"));
        assert!(!is_valid_accent("4ade80"));
        assert!(!is_valid_accent("#4ade8"));
        assert!(!is_valid_accent("#4ade8g"));

        let store = MemoryStore::new();
        assert_eq!(accent(&store), DEFAULT_ACCENT);
        store.set(ACCENT_KEY, "#123abc").unwrap();
        assert_eq!(accent(&store), "#123abc");
        store.set(ACCENT_KEY, "red").unwrap();
        assert_eq!(accent(&store), DEFAULT_ACCENT);
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(language_id_key("Java"), "compilerace:language:java");
        assert_eq!(best_time_key("fizzbuzz"), "compilerace:best:fizzbuzz");
        assert!(best_time_key("a").starts_with(BEST_TIME_PREFIX));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let path = temp_store_path();
        {
            let store = FileStore::open(&path);
            store.set(&language_id_key("java"), "91").unwrap();
        }
        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get(&language_id_key("java")).as_deref(), Some("91"));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_two_handles_keep_each_others_writes() {
        let path = temp_store_path();
        let race_session = FileStore::open(&path);
        let other_cli = FileStore::open(&path);

        other_cli.set(ACCENT_KEY, "#123abc").unwrap();
        race_session.set(&best_time_key("addition"), "9").unwrap();

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get(ACCENT_KEY).as_deref(), Some("#123abc"));
        assert_eq!(reopened.get(&best_time_key("addition")).as_deref(), Some("9"));

        // removal through a stale handle keeps the newer entries too
        other_cli.remove(ACCENT_KEY).unwrap();
        let reopened = FileStore::open(&path);
        assert!(reopened.get(ACCENT_KEY).is_none());
        assert_eq!(reopened.get(&best_time_key("addition")).as_deref(), Some("9"));

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_corrupt_file_reads_empty() {
        let path = temp_store_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();

        let store = FileStore::open(&path);
        assert!(store.get(ACCENT_KEY).is_none());
        store.set(ACCENT_KEY, "#ff0000").unwrap();
        assert_eq!(FileStore::open(&path).get(ACCENT_KEY).as_deref(), Some("#ff0000"));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_get_parsed_ignores_garbage() {
        let store = MemoryStore::new();
        store.set("n", "abc").unwrap();
        assert_eq!(get_parsed::<u32>(&store, "n"), None);
        store.set("n", " 62 ").unwrap();
        assert_eq!(get_parsed::<u32>(&store, "n"), Some(62));
        assert_eq!(get_parsed::<u32>(&store, "missing"), None);
    }

    #[test]
    fn test_prefix_entries() {
        let store = MemoryStore::new();
        store.set(&best_time_key("a"), "10").unwrap();
        store.set(&best_time_key("b"), "12").unwrap();
        store.set(ACCENT_KEY, "#000000").unwrap();
        let best = store.entries(BEST_TIME_PREFIX);
        assert_eq!(best.len(), 2);
        assert_eq!(best[0].0, best_time_key("a"));

        store.remove(&best_time_key("a")).unwrap();
        assert_eq!(store.entries(BEST_TIME_PREFIX).len(), 1);
    }
}
