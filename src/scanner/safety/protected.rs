use std::env;
use std::path::{Component, Path, PathBuf};

/// Decides whether a path lies inside one of the protected system regions.
/// Protected subtrees are never walked, measured or proposed.
#[derive(Debug, Clone, Default)]
pub struct PathClassifier {
    roots: Vec<PathBuf>,
}

impl PathClassifier {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots = roots
            .into_iter()
            .filter_map(|root| {
                let root = root.as_ref();
                let normalized = normalize(root);
                if normalized.is_none() {
                    log::debug!("Ignoring unresolvable protected root {}", root.display());
                }
                normalized
            })
            .collect();
        PathClassifier { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// True when `path` equals or is nested under a protected root. Matching
    /// is per component, so `/usr2` is not inside `/usr`. A path that cannot
    /// be made absolute counts as protected.
    pub fn is_protected(&self, path: &Path) -> bool {
        match normalize(path) {
            Some(normalized) => self.roots.iter().any(|root| normalized.starts_with(root)),
            None => true,
        }
    }
}

/// Absolute, lexically cleaned and (on Windows) case-folded form of `path`.
/// Symlinks are not resolved.
pub(crate) fn normalize(path: &Path) -> Option<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().ok()?.join(path)
    };

    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => cleaned.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root
                if cleaned.parent().is_some() {
                    cleaned.pop();
                }
            }
            Component::Normal(segment) => cleaned.push(segment),
        }
    }

    if cfg!(windows) {
        let folded = cleaned.to_str()?.to_lowercase();
        Some(PathBuf::from(folded))
    } else {
        Some(cleaned)
    }
}
