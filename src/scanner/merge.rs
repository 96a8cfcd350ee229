use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use super::age_tree::{AgeNode, AgeTree};
use super::safety::PathContext;
use crate::config::ScanConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeDecision {
    /// Propose the directory as one candidate.
    WholeDirectory,
    /// Propose only the stale files sitting directly in the directory.
    StaleFiles,
}

/// Phase 2b: turns the age tree into candidate paths.
pub struct ProposalMerger<'a> {
    config: &'a ScanConfig,
}

impl<'a> ProposalMerger<'a> {
    pub fn new(config: &'a ScanConfig) -> Self {
        ProposalMerger { config }
    }

    /// Children are decided before their parent. A directory proposed whole
    /// replaces every earlier proposal nested under it, so no candidate is
    /// covered twice. Cancellation yields an empty set.
    pub fn merge(&self, tree: &AgeTree, cancel: &CancellationToken) -> BTreeSet<PathBuf> {
        let mut proposals = BTreeSet::new();

        for id in tree.children_first() {
            if cancel.is_cancelled() {
                log::info!("Proposal merge cancelled");
                return BTreeSet::new();
            }

            let node = tree.node(id);
            let root = &tree.node(tree.root_of(id)).path;
            match self.decide(node, root) {
                MergeDecision::WholeDirectory => {
                    proposals.retain(|p: &PathBuf| !p.starts_with(&node.path));
                    proposals.insert(node.path.clone());
                }
                MergeDecision::StaleFiles => {
                    for file in &node.old_files {
                        if still_has_content(file) {
                            proposals.insert(file.clone());
                        }
                    }
                }
            }
        }

        proposals
    }

    pub fn decide(&self, node: &AgeNode, root: &Path) -> MergeDecision {
        let thresholds = &self.config.thresholds;
        let ratio = old_ratio(node);
        if ratio >= self.merge_threshold(&node.path, root)
            && node.total_old_count > thresholds.min_stale_files
            && node.total_real_size_bytes > 0
        {
            MergeDecision::WholeDirectory
        } else {
            MergeDecision::StaleFiles
        }
    }

    /// Junk-looking directories and application data regions merge at a
    /// lower ratio than ordinary folders. Only the part of `path` below the
    /// analysed `root` is checked for keywords.
    pub fn merge_threshold(&self, path: &Path, root: &Path) -> f64 {
        let rules = &self.config.rules;
        let relative = PathContext::below(path, root);
        let junk_named = relative.segment_matches(|segment| rules.matches_keyword(segment));
        let in_profile = PathContext::new(path).contains_any(&self.config.profile_markers);

        if junk_named || in_profile {
            self.config.thresholds.junk_merge_ratio
        } else {
            self.config.thresholds.merge_ratio
        }
    }
}

/// Share of stale files across the whole subtree, 0 for an empty one.
pub fn old_ratio(node: &AgeNode) -> f64 {
    if node.total_file_count == 0 {
        0.0
    } else {
        node.total_old_count as f64 / node.total_file_count as f64
    }
}

fn still_has_content(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}
