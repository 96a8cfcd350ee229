use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use super::safety::PathClassifier;
use super::sizing::StaleCutoff;

pub type NodeId = usize;

/// One directory of the age analysis. `old_*`/`real_*` cover the files
/// directly inside it, `total_*` the whole subtree including itself.
#[derive(Debug, Clone, Default)]
pub struct AgeNode {
    pub path: PathBuf,
    pub parent: Option<NodeId>,
    pub subdirs: BTreeMap<OsString, NodeId>,
    pub old_files: Vec<PathBuf>,
    pub all_files: Vec<PathBuf>,
    pub old_size_bytes: u64,
    pub real_size_bytes: u64,
    pub total_old_count: u64,
    pub total_real_size_bytes: u64,
    pub total_file_count: u64,
}

impl AgeNode {
    pub fn new(path: PathBuf, parent: Option<NodeId>) -> Self {
        AgeNode {
            path,
            parent,
            ..AgeNode::default()
        }
    }

    fn record_file(&mut self, path: PathBuf, metadata: &Metadata, cutoff: &StaleCutoff) {
        let size = metadata.len();
        if cutoff.is_stale(metadata) {
            self.old_files.push(path.clone());
            self.old_size_bytes = self.old_size_bytes.saturating_add(size);
        }
        self.all_files.push(path);
        self.real_size_bytes = self.real_size_bytes.saturating_add(size);
    }
}

/// Arena of directory nodes. A parent always has a smaller id than its
/// children, so walking ids backwards visits children before parents.
#[derive(Debug, Default)]
pub struct AgeTree {
    nodes: Vec<AgeNode>,
    roots: Vec<NodeId>,
}

impl AgeTree {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> &AgeNode {
        &self.nodes[id]
    }

    pub fn find(&self, path: &Path) -> Option<NodeId> {
        self.roots.iter().find_map(|&root| {
            let relative = path.strip_prefix(&self.nodes[root].path).ok()?;
            relative.iter().try_fold(root, |id, name| {
                self.nodes[id].subdirs.get(name).copied()
            })
        })
    }

    pub fn root_of(&self, mut id: NodeId) -> NodeId {
        while let Some(parent) = self.nodes[id].parent {
            id = parent;
        }
        id
    }

    /// Every node, children strictly before their parent.
    pub fn children_first(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).rev()
    }

    fn covers(&self, path: &Path) -> bool {
        self.roots
            .iter()
            .any(|&root| path.starts_with(&self.nodes[root].path))
    }

    fn aggregate(&mut self) {
        for id in (0..self.nodes.len()).rev() {
            let node = &mut self.nodes[id];
            node.total_old_count += node.old_files.len() as u64;
            node.total_real_size_bytes = node
                .total_real_size_bytes
                .saturating_add(node.real_size_bytes);
            node.total_file_count += node.all_files.len() as u64;

            let (parent, old, size, files) = (
                node.parent,
                node.total_old_count,
                node.total_real_size_bytes,
                node.total_file_count,
            );
            if let Some(parent) = parent {
                let parent = &mut self.nodes[parent];
                parent.total_old_count += old;
                parent.total_real_size_bytes = parent.total_real_size_bytes.saturating_add(size);
                parent.total_file_count += files;
            }
        }
    }
}

/// Phase 2a: builds the age tree for the home region.
pub struct AgeTreeBuilder<'a> {
    classifier: &'a PathClassifier,
    cutoff: StaleCutoff,
}

impl<'a> AgeTreeBuilder<'a> {
    pub fn new(classifier: &'a PathClassifier, cutoff: StaleCutoff) -> Self {
        AgeTreeBuilder { classifier, cutoff }
    }

    /// Returns `None` when cancelled; a half-built tree is never handed out.
    pub fn build(&self, roots: &[PathBuf], cancel: &CancellationToken) -> Option<AgeTree> {
        let mut tree = AgeTree::default();

        for root in roots {
            if tree.covers(root) {
                log::debug!("{} already covered by an earlier root", root.display());
                continue;
            }
            if !root.is_dir() || self.classifier.is_protected(root) {
                continue;
            }
            let id = self.walk(root, &mut tree, cancel)?;
            tree.roots.push(id);
        }

        tree.aggregate();
        Some(tree)
    }

    fn walk(&self, root: &Path, tree: &mut AgeTree, cancel: &CancellationToken) -> Option<NodeId> {
        let root_id = tree.nodes.len();
        let mut pending: Vec<(PathBuf, Option<NodeId>)> = vec![(root.to_path_buf(), None)];

        while let Some((dir, parent)) = pending.pop() {
            if cancel.is_cancelled() {
                log::info!("Age analysis cancelled at {}", dir.display());
                return None;
            }

            let id = tree.nodes.len();
            if let (Some(parent), Some(name)) = (parent, dir.file_name()) {
                tree.nodes[parent].subdirs.insert(name.to_os_string(), id);
            }

            let mut node = AgeNode::new(dir, parent);
            match fs::read_dir(&node.path) {
                Ok(entries) => {
                    for entry in entries.flatten() {
                        let file_type = match entry.file_type() {
                            Ok(t) => t,
                            Err(_) => continue,
                        };
                        let path = entry.path();
                        if file_type.is_dir() {
                            if self.classifier.is_protected(&path) {
                                log::debug!("Pruning protected directory {}", path.display());
                                continue;
                            }
                            pending.push((path, Some(id)));
                        } else if file_type.is_file() {
                            match entry.metadata() {
                                Ok(metadata) => node.record_file(path, &metadata, &self.cutoff),
                                Err(err) => log::debug!("Cannot stat {}: {}", path.display(), err),
                            }
                        }
                    }
                }
                Err(err) => log::debug!("Cannot list {}: {}", node.path.display(), err),
            }
            tree.nodes.push(node);
        }

        Some(root_id)
    }
}
