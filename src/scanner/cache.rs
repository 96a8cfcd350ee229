// src/scanner/cache.rs

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::types::{ItemKind, ScanItem, ScanResults};
use crate::config::ScanConfig;

/// On-disk shape of one result, keyed by its path in the cache file.
#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    #[serde(rename = "type")]
    kind: ItemKind,
    size: u64,
    #[serde(default = "default_count")]
    count: u64,
    #[serde(default = "unknown_category")]
    category: String,
    #[serde(default)]
    last_scan: f64,
}

fn default_count() -> u64 {
    1
}

fn unknown_category() -> String {
    "Unknown".to_string()
}

impl CacheRecord {
    fn from_item(item: &ScanItem, stamp: f64) -> Self {
        CacheRecord {
            kind: item.kind,
            size: item.size_bytes,
            count: item.file_count,
            category: item.category.clone(),
            last_scan: stamp,
        }
    }

    fn into_item(self, path: PathBuf) -> ScanItem {
        let last_scan_time = Utc
            .timestamp_millis_opt((self.last_scan * 1000.0) as i64)
            .single()
            .unwrap_or_else(Utc::now);
        ScanItem {
            path,
            kind: self.kind,
            size_bytes: self.size,
            file_count: self.count,
            category: self.category,
            last_scan_time,
        }
    }
}

/// Persisted scan results. Records expire after the TTL or as soon as their
/// path disappears from disk.
pub struct ResultCache {
    path: PathBuf,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(path: impl Into<PathBuf>, ttl_seconds: u64) -> Self {
        ResultCache {
            path: path.into(),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    pub fn for_config(config: &ScanConfig) -> Self {
        Self::new(config.cache_path.clone(), config.thresholds.cache_ttl_secs)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> ScanResults {
        self.load_at(Utc::now())
    }

    /// Never fails: a missing or corrupt file gives an empty result set and
    /// bad records are dropped one by one.
    pub fn load_at(&self, now: DateTime<Utc>) -> ScanResults {
        let mut items = ScanResults::new();
        if !self.path.exists() {
            return items;
        }

        let records = match self.read_records() {
            Ok(records) => records,
            Err(err) => {
                log::warn!("{}", err);
                return items;
            }
        };

        let now_secs = unix_seconds(now);
        let ttl_secs = self.ttl.as_secs_f64();
        for (key, value) in records {
            let record: CacheRecord = match serde_json::from_value(value) {
                Ok(record) => record,
                Err(_) => continue,
            };
            if now_secs - record.last_scan > ttl_secs {
                continue;
            }
            let path = PathBuf::from(key);
            if !path.exists() {
                continue;
            }
            items.insert(path.clone(), record.into_item(path));
        }

        log::info!("Loaded {} cached items from {}", items.len(), self.path.display());
        items
    }

    /// Rewrites the whole cache, stamping every record with the current time.
    /// Failures are logged; the in-memory results stay authoritative.
    pub fn save(&self, items: &ScanResults) {
        match self.write(items, Utc::now()) {
            Ok(()) => log::info!("Saved {} items to {}", items.len(), self.path.display()),
            Err(err) => log::warn!("{}", err),
        }
    }

    fn read_records(&self) -> Result<serde_json::Map<String, serde_json::Value>, String> {
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| format!("Failed to read cache {}: {}", self.path.display(), e))?;
        serde_json::from_str(&raw)
            .map_err(|e| format!("Failed to parse cache {}: {}", self.path.display(), e))
    }

    fn write(&self, items: &ScanResults, now: DateTime<Utc>) -> Result<(), String> {
        let stamp = unix_seconds(now);
        let records: BTreeMap<String, CacheRecord> = items
            .iter()
            .map(|(path, item)| {
                (
                    path.to_string_lossy().into_owned(),
                    CacheRecord::from_item(item, stamp),
                )
            })
            .collect();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create cache directory: {}", e))?;
            }
        }
        let data = serde_json::to_vec_pretty(&records)
            .map_err(|e| format!("Failed to serialize cache: {}", e))?;
        fs::write(&self.path, data)
            .map_err(|e| format!("Failed to write cache {}: {}", self.path.display(), e))
    }
}

fn unix_seconds(time: DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64 / 1000.0
}
