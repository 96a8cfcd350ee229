mod age_tree;
mod cache;
mod engine;
mod merge;
mod safety;
pub mod sizing;
mod trash_scan;
pub mod types;
pub mod units;


pub use age_tree::{AgeNode, AgeTree, AgeTreeBuilder, NodeId};
pub use cache::ResultCache;
pub use engine::{ProgressFn, ScanEngine};
pub use merge::{old_ratio, MergeDecision, ProposalMerger};
pub use safety::PathClassifier;
pub use trash_scan::TrashScanner;
pub use types::{CategoryReport, ItemKind, JunkRules, KeywordRule, ScanItem, ScanReport, ScanResults};
