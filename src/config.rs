// src/config.rs

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::scanner::types::{old_file_category, JunkRules};

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    // Junk detection
    pub junk_dir_min_bytes: u64,      // Default: 1 MiB
    pub app_data_dir_min_bytes: u64,  // Default: 10 MiB

    // Age grouping
    pub junk_merge_ratio: f64,        // Default: 0.6
    pub merge_ratio: f64,             // Default: 0.85
    pub min_stale_files: u64,         // Default: 5 (a merge needs strictly more)

    // Result cache
    pub cache_ttl_secs: u64,          // Default: 7 days
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            junk_dir_min_bytes: MIB,
            app_data_dir_min_bytes: 10 * MIB,
            junk_merge_ratio: 0.6,
            merge_ratio: 0.85,
            min_stale_files: 5,
            cache_ttl_secs: 7 * 86_400,
        }
    }
}

/// Everything a scan needs, built once and passed to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub days_old: u32,
    /// Root of the junk pass.
    pub scan_root: PathBuf,
    /// Root of the age pass.
    pub home_dir: PathBuf,
    /// Well-known user folders analysed next to `home_dir`.
    pub extra_roots: Vec<PathBuf>,
    pub cache_path: PathBuf,
    pub protected_roots: Vec<PathBuf>,
    /// Substrings marking a user-profile application data region.
    pub profile_markers: Vec<String>,
    pub thresholds: Thresholds,
    pub rules: JunkRules,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let scan_root = if cfg!(windows) {
            PathBuf::from("C:\\")
        } else {
            home_dir.clone()
        };
        let extra_roots = [dirs::document_dir(), dirs::download_dir(), dirs::picture_dir()]
            .into_iter()
            .flatten()
            .collect();
        let cache_path = dirs::cache_dir()
            .unwrap_or_else(|| home_dir.clone())
            .join("space-reclaimer")
            .join("cleaner_cache.json");

        ScanConfig {
            days_old: 60,
            scan_root,
            home_dir,
            extra_roots,
            cache_path,
            protected_roots: default_protected_roots(),
            profile_markers: vec!["appdata".to_string()],
            thresholds: Thresholds::default(),
            rules: JunkRules::builtin(),
        }
    }
}

impl ScanConfig {
    /// Scan and analyse a single tree, keeping the cache file next to it.
    pub fn for_root(root: impl Into<PathBuf>, cache_path: impl Into<PathBuf>) -> Self {
        let root = root.into();
        ScanConfig {
            scan_root: root.clone(),
            home_dir: root,
            extra_roots: Vec::new(),
            cache_path: cache_path.into(),
            ..ScanConfig::default()
        }
    }

    pub fn with_rules_file(mut self, path: &Path) -> Result<Self, String> {
        self.rules = JunkRules::from_file(path)?;
        Ok(self)
    }

    /// Roots of the age analysis: the home directory first, then every extra
    /// root that currently exists.
    pub fn age_roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.home_dir.clone()];
        for extra in &self.extra_roots {
            if extra.is_dir() && !roots.contains(extra) {
                roots.push(extra.clone());
            }
        }
        roots
    }

    pub fn old_file_category(&self) -> String {
        old_file_category(self.days_old)
    }
}

pub fn default_protected_roots() -> Vec<PathBuf> {
    let roots: &[&str] = if cfg!(windows) {
        &[
            r"C:\Windows",
            r"C:\System Volume Information",
            r"C:\Program Files",
            r"C:\Program Files (x86)",
            r"C:\ProgramData",
            r"C:\$Recycle.Bin",
        ]
    } else {
        &[
            "/bin", "/etc", "/usr", "/lib", "/lib64", "/boot", "/dev", "/proc", "/sys", "/var",
            "/opt", "/root", "/sbin",
        ]
    };
    roots.iter().map(PathBuf::from).collect()
}
