use std::fs;
use std::path::Path;

use tokio_util::sync::CancellationToken;
use walkdir::{DirEntry, WalkDir};

use super::safety::PathClassifier;
use super::sizing;
use super::types::{
    insert_item, ItemKind, ScanItem, ScanResults, APP_DATA_CATEGORY, JUNK_FILE_CATEGORY,
};
use crate::config::ScanConfig;

/// Phase 1: one top-down walk flagging junk directories by name and junk
/// files by extension.
pub struct TrashScanner<'a> {
    config: &'a ScanConfig,
    classifier: &'a PathClassifier,
}

impl<'a> TrashScanner<'a> {
    pub fn new(config: &'a ScanConfig, classifier: &'a PathClassifier) -> Self {
        TrashScanner { config, classifier }
    }

    /// Walks `root` and returns every junk candidate found. When `cancel`
    /// fires, whatever was collected so far is returned.
    pub fn scan(&self, root: &Path, cancel: &CancellationToken) -> ScanResults {
        let mut found = ScanResults::new();
        let mut walker = WalkDir::new(root).follow_links(false).into_iter();

        while let Some(next) = walker.next() {
            let entry = match next {
                Ok(entry) => entry,
                Err(err) => {
                    log::debug!("Skipping unreadable entry: {}", err);
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                if cancel.is_cancelled() {
                    log::info!("Junk scan cancelled with {} items collected", found.len());
                    return found;
                }
                if !self.visit_dir(&entry, &mut found, cancel) {
                    walker.skip_current_dir();
                }
            } else if entry.file_type().is_file() {
                self.register_junk_file(&entry, &mut found);
            }
        }

        found
    }

    /// Returns false when the walk must not descend into `entry`.
    fn visit_dir(&self, entry: &DirEntry, found: &mut ScanResults, cancel: &CancellationToken) -> bool {
        let path = entry.path();
        if self.classifier.is_protected(path) {
            log::debug!("Pruning protected directory {}", path.display());
            return false;
        }

        let name_lower = entry.file_name().to_string_lossy().to_lowercase();
        if self.is_profile_data_root(path, &name_lower) {
            self.scan_profile_children(path, found, cancel);
            return true;
        }

        if entry.depth() > 0 {
            if let Some(label) = self.config.rules.keyword_label(&name_lower) {
                self.claim_junk_dir(path, label, found);
                return false;
            }
        }

        true
    }

    /// Whole junk directory. The caller prunes it whether or not it was big
    /// enough to register.
    fn claim_junk_dir(&self, path: &Path, label: &str, found: &mut ScanResults) {
        let stats = sizing::measure(path);
        if stats.size_bytes > self.config.thresholds.junk_dir_min_bytes {
            insert_item(
                found,
                ScanItem::new(
                    path.to_path_buf(),
                    ItemKind::TrashDir,
                    stats.size_bytes,
                    stats.file_count,
                    label,
                ),
            );
        } else {
            log::debug!(
                "Junk directory {} below threshold ({} bytes)",
                path.display(),
                stats.size_bytes
            );
        }
    }

    /// Only `<marker>/<root>` itself, e.g. `AppData/Local`. Deeper folders
    /// such as `LocalCache` go through the keyword rule.
    fn is_profile_data_root(&self, path: &Path, name_lower: &str) -> bool {
        if !self.config.rules.is_profile_root(name_lower) {
            return false;
        }
        let parent_lower = match path.parent().and_then(|parent| parent.file_name()) {
            Some(name) => name.to_string_lossy().to_lowercase(),
            None => return false,
        };
        self.config
            .profile_markers
            .iter()
            .any(|marker| parent_lower.contains(&marker.to_lowercase()))
    }

    /// Each immediate subdirectory of an application data root is judged on
    /// its own: big enough and holding at least one junk-extension file.
    fn scan_profile_children(&self, dir: &Path, found: &mut ScanResults, cancel: &CancellationToken) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                log::debug!("Cannot list {}: {}", dir.display(), err);
                return;
            }
        };

        let rules = &self.config.rules;
        for entry in entries.flatten() {
            if cancel.is_cancelled() {
                return;
            }
            match entry.file_type() {
                Ok(file_type) if file_type.is_dir() => {}
                _ => continue,
            }

            // Keyword-named children get their own rule when the walk reaches them
            let name_lower = entry.file_name().to_string_lossy().to_lowercase();
            if rules.matches_keyword(&name_lower) {
                continue;
            }

            let child = entry.path();
            if self.classifier.is_protected(&child) {
                continue;
            }

            let (stats, junk_files) = sizing::measure_with(&child, |p, _| rules.is_junk_extension(p));
            if stats.size_bytes > self.config.thresholds.app_data_dir_min_bytes && junk_files > 0 {
                insert_item(
                    found,
                    ScanItem::new(
                        child,
                        ItemKind::TrashDir,
                        stats.size_bytes,
                        junk_files,
                        APP_DATA_CATEGORY,
                    ),
                );
            }
        }
    }

    fn register_junk_file(&self, entry: &DirEntry, found: &mut ScanResults) {
        let path = entry.path();
        if !self.config.rules.is_junk_extension(path) || self.classifier.is_protected(path) {
            return;
        }
        match entry.metadata() {
            Ok(metadata) if metadata.len() > 0 => insert_item(
                found,
                ScanItem::new(
                    path.to_path_buf(),
                    ItemKind::TrashFile,
                    metadata.len(),
                    1,
                    JUNK_FILE_CATEGORY,
                ),
            ),
            Ok(_) => {}
            Err(err) => log::debug!("Cannot stat {}: {}", path.display(), err),
        }
    }
}
