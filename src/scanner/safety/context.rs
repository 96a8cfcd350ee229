use std::path::Path;

/// Lower-cased view of a path used by the name-based heuristics.
#[derive(Debug)]
pub(crate) struct PathContext {
    lower: String,
    segments_lower: Vec<String>,
}

impl PathContext {
    pub(crate) fn new(path: &Path) -> Self {
        Self {
            lower: path.to_string_lossy().to_lowercase(),
            segments_lower: lower_segments(path),
        }
    }

    /// Only the components of `path` below `base` count as segments; the
    /// substring checks still see the full path.
    pub(crate) fn below(path: &Path, base: &Path) -> Self {
        let relative = path.strip_prefix(base).unwrap_or(path);
        Self {
            lower: path.to_string_lossy().to_lowercase(),
            segments_lower: lower_segments(relative),
        }
    }

    pub(crate) fn contains_keyword(&self, keyword: &str) -> bool {
        self.lower.contains(keyword)
    }

    pub(crate) fn contains_any<S: AsRef<str>>(&self, keywords: &[S]) -> bool {
        keywords
            .iter()
            .any(|keyword| self.contains_keyword(&keyword.as_ref().to_lowercase()))
    }

    pub(crate) fn segment_matches(&self, mut predicate: impl FnMut(&str) -> bool) -> bool {
        self.segments_lower.iter().any(|segment| predicate(segment))
    }
}

fn lower_segments(path: &Path) -> Vec<String> {
    path.iter()
        .filter_map(|component| component.to_str())
        .filter(|segment| !segment.is_empty() && *segment != "/" && *segment != "\\")
        .map(|segment| segment.to_lowercase())
        .collect()
}
