use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::time::{Duration, SystemTime};

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CacheStore {
    root: Utf8PathBuf,
    max_age: Duration,
    enabled: bool,
}

impl CacheStore {
    pub fn new(root: impl Into<Utf8PathBuf>, max_age: Duration) -> Self {
        Self {
            root: root.into(),
            max_age,
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            root: Utf8PathBuf::new(),
            max_age: Duration::ZERO,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn key(endpoint: &str, params: &BTreeMap<String, String>) -> String {
        let encoded = params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        let mut hasher = Sha256::new();
        hasher.update(endpoint.as_bytes());
        hasher.update(b":");
        hasher.update(encoded.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn entry_path(&self, key: &str) -> Utf8PathBuf {
        self.root.join(format!("{key}.json"))
    }

    /// Expiry is judged from the entry's mtime on every read. No locking; one
    /// writer per cache directory.
    pub fn read(&self, key: &str) -> Option<Value> {
        if !self.enabled {
            return None;
        }
        let path = self.entry_path(key);
        let metadata = fs::metadata(path.as_std_path()).ok()?;
        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(err) => {
                warn!(path = %path, error = %err, "cache entry has no mtime, ignoring");
                return None;
            }
        };
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age > self.max_age {
            debug!(path = %path, age_secs = age.as_secs(), "cache entry expired");
            return None;
        }

        let content = match fs::read(path.as_std_path()) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %path, error = %err, "failed to read cache entry");
                return None;
            }
        };
        match serde_json::from_slice(&content) {
            Ok(value) => {
                debug!(path = %path, "cache hit");
                Some(value)
            }
            Err(err) => {
                warn!(path = %path, error = %err, "corrupt cache entry, treating as miss");
                None
            }
        }
    }

    pub fn write(&self, key: &str, payload: &Value) {
        if !self.enabled {
            return;
        }
        let path = self.entry_path(key);
        if let Err(message) = self.write_atomic(&path, payload) {
            warn!(path = %path, error = %message, "failed to write cache entry");
        }
    }

    fn write_atomic(&self, path: &Utf8Path, payload: &Value) -> Result<(), String> {
        fs::create_dir_all(self.root.as_std_path()).map_err(|err| err.to_string())?;
        let content = serde_json::to_vec_pretty(payload).map_err(|err| err.to_string())?;
        let mut temp = tempfile::Builder::new()
            .prefix(".cache-entry")
            .tempfile_in(self.root.as_std_path())
            .map_err(|err| err.to_string())?;
        temp.write_all(&content).map_err(|err| err.to_string())?;
        temp.persist(path.as_std_path())
            .map_err(|err| err.error.to_string())?;
        Ok(())
    }
}

pub fn params<const N: usize>(pairs: [(&str, &str); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
