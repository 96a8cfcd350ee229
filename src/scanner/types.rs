use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const JUNK_FILE_CATEGORY: &str = "Junk File/Log";
pub const APP_DATA_CATEGORY: &str = "Cached Application Data";

/// How a candidate was found. `TrashFile`/`TrashDir` come from the junk
/// heuristics, `File`/`Directory` from the age analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    File,
    #[serde(rename = "dir")]
    Directory,
    TrashFile,
    TrashDir,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanItem {
    pub path: PathBuf,
    pub kind: ItemKind,
    pub size_bytes: u64,
    pub file_count: u64,
    pub category: String,
    pub last_scan_time: DateTime<Utc>,
}

impl ScanItem {
    pub fn new(
        path: PathBuf,
        kind: ItemKind,
        size_bytes: u64,
        file_count: u64,
        category: impl Into<String>,
    ) -> Self {
        ScanItem {
            path,
            kind,
            size_bytes,
            file_count,
            category: category.into(),
            last_scan_time: Utc::now(),
        }
    }
}

/// Unified result set; the path is the only identity of an item.
pub type ScanResults = HashMap<PathBuf, ScanItem>;

pub(crate) fn insert_item(results: &mut ScanResults, item: ScanItem) {
    results.insert(item.path.clone(), item);
}

pub fn old_file_category(days_old: u32) -> String {
    format!("Old File ({}+)", days_old)
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub items: ScanResults,
    pub cancelled: bool,
    pub total_size: u64,
    pub categories: Vec<CategoryReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryReport {
    pub name: String,
    pub size: u64,
    pub count: usize,
}

impl ScanReport {
    pub fn from_items(items: ScanResults, cancelled: bool) -> Self {
        let mut categories: HashMap<String, (u64, usize)> = HashMap::new();
        let mut total_size = 0u64;

        for item in items.values() {
            total_size = total_size.saturating_add(item.size_bytes);
            let entry = categories.entry(item.category.clone()).or_insert((0, 0));
            entry.0 = entry.0.saturating_add(item.size_bytes);
            entry.1 += 1;
        }

        let mut categories: Vec<CategoryReport> = categories
            .into_iter()
            .map(|(name, (size, count))| CategoryReport { name, size, count })
            .collect();
        categories.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.name.cmp(&b.name)));

        ScanReport {
            items,
            cancelled,
            total_size,
            categories,
        }
    }

    pub fn cancelled() -> Self {
        Self::from_items(ScanResults::new(), true)
    }
}

// -------- Junk Rule Tables --------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeywordRule {
    pub keyword: String,
    pub label: String,
}

/// Static lookup tables behind the junk heuristics. Keyword order matters:
/// the first keyword contained in a directory name decides its label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JunkRules {
    pub keywords: Vec<KeywordRule>,
    pub extensions: Vec<String>,
    /// Directory names marking per-application state roots (AppData\Local etc.)
    pub profile_roots: Vec<String>,
}

lazy_static! {
    static ref BUILTIN_RULES: JunkRules = load_rules();
}

impl JunkRules {
    pub fn builtin() -> Self {
        BUILTIN_RULES.clone()
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read rules {}: {}", path.display(), e))?;
        parse_rules(&raw)
    }

    pub fn keyword_label(&self, name_lower: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|rule| name_lower.contains(rule.keyword.as_str()))
            .map(|rule| rule.label.as_str())
    }

    pub fn matches_keyword(&self, text_lower: &str) -> bool {
        self.keyword_label(text_lower).is_some()
    }

    pub fn is_junk_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|known| *known == ext)
            })
            .unwrap_or(false)
    }

    /// Exact name match; `LocalCache` is not a profile root.
    pub fn is_profile_root(&self, name_lower: &str) -> bool {
        self.profile_roots.iter().any(|root| root == name_lower)
    }

    fn normalized(mut self) -> Self {
        for rule in &mut self.keywords {
            rule.keyword = rule.keyword.to_lowercase();
        }
        self.extensions = self
            .extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        self.profile_roots = self.profile_roots.iter().map(|r| r.to_lowercase()).collect();
        self
    }
}

impl Default for JunkRules {
    fn default() -> Self {
        Self::builtin()
    }
}

fn parse_rules(raw: &str) -> Result<JunkRules, String> {
    serde_json::from_str::<JunkRules>(raw)
        .map(JunkRules::normalized)
        .map_err(|e| format!("Failed to parse junk rules: {}", e))
}

// Load bundled rules with error propagation
pub(crate) fn load_rules_result() -> Result<JunkRules, String> {
    parse_rules(include_str!("../../rules/junk_rules.json"))
}

// Load bundled rules with empty fallback
pub(crate) fn load_rules() -> JunkRules {
    load_rules_result().unwrap_or_else(|err| {
        log::warn!("{}", err);
        JunkRules {
            keywords: Vec::new(),
            extensions: Vec::new(),
            profile_roots: Vec::new(),
        }
    })
}
