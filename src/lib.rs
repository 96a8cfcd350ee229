mod config;
mod ops;
mod scanner;

pub use config::{default_protected_roots, ScanConfig, Thresholds};
pub use ops::{
    load_cached, OpState, OperationId, OperationRegistry, OperationStatus, ScanHandle,
    ScanProgress,
};
pub use scanner::sizing::{measure, measure_with, DirStats, StaleCutoff};
pub use scanner::types::{old_file_category, APP_DATA_CATEGORY, JUNK_FILE_CATEGORY};
pub use scanner::units::{format_size, parse_size};
pub use scanner::{
    old_ratio, AgeNode, AgeTree, AgeTreeBuilder, CategoryReport, ItemKind, JunkRules,
    KeywordRule, MergeDecision, NodeId, PathClassifier, ProgressFn, ProposalMerger, ResultCache,
    ScanEngine, ScanItem, ScanReport, ScanResults, TrashScanner,
};
