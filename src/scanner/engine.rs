use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
#[cfg(feature = "metrics")]
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::age_tree::AgeTreeBuilder;
use super::merge::ProposalMerger;
use super::safety::PathClassifier;
use super::sizing::{self, StaleCutoff};
use super::trash_scan::TrashScanner;
use super::types::{insert_item, ItemKind, ScanItem, ScanReport};
use super::units::format_size;
use crate::config::ScanConfig;

/// Progress callback: `(percent, message, stage)`. May borrow from the caller.
pub type ProgressFn<'a> = dyn Fn(f32, &str, &str) + Send + Sync + 'a;

/// Runs the junk pass, then the age pass, and folds both into one result
/// set. Blocking; callers wanting a responsive context go through
/// `OperationRegistry`.
pub struct ScanEngine {
    config: ScanConfig,
    classifier: PathClassifier,
}

impl ScanEngine {
    pub fn new(config: ScanConfig) -> Self {
        let classifier = PathClassifier::new(&config.protected_roots);
        ScanEngine { config, classifier }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn run(&self, cancel: &CancellationToken, progress: Option<&ProgressFn<'_>>) -> ScanReport {
        self.run_at(SystemTime::now(), cancel, progress)
    }

    /// Like [`run`](Self::run) with staleness judged against `now`.
    pub fn run_at(
        &self,
        now: SystemTime,
        cancel: &CancellationToken,
        progress: Option<&ProgressFn<'_>>,
    ) -> ScanReport {
        #[cfg(feature = "metrics")]
        let mut clock = PhaseClock::start();

        emit(
            progress,
            0.0,
            &format!(
                "Phase 1/2: quick junk scan of {}...",
                self.config.scan_root.display()
            ),
            "junk",
        );
        let mut items = TrashScanner::new(&self.config, &self.classifier)
            .scan(&self.config.scan_root, cancel);
        if cancel.is_cancelled() {
            log::info!("Scan cancelled during the junk pass");
            return ScanReport::cancelled();
        }
        #[cfg(feature = "metrics")]
        clock.lap("junk");

        emit(
            progress,
            50.0,
            &format!(
                "Phase 2/2: deep scan for files older than {} days...",
                self.config.days_old
            ),
            "age",
        );
        let cutoff = StaleCutoff::days_before(now, self.config.days_old);
        let proposals = self.propose_stale(&cutoff, cancel);
        if cancel.is_cancelled() {
            log::info!("Scan cancelled during the age pass");
            return ScanReport::from_items(items, true);
        }
        #[cfg(feature = "metrics")]
        clock.lap("age");

        let category = self.config.old_file_category();
        for path in proposals {
            if items.contains_key(&path) {
                continue;
            }
            if let Some(item) = resolve_proposal(&path, &cutoff, &category) {
                insert_item(&mut items, item);
            }
        }
        #[cfg(feature = "metrics")]
        clock.lap("resolve");

        let report = ScanReport::from_items(items, false);
        emit(
            progress,
            100.0,
            &format!(
                "Scan complete. Found {} unique items ({}).",
                report.items.len(),
                format_size(report.total_size)
            ),
            "complete",
        );
        report
    }

    fn propose_stale(&self, cutoff: &StaleCutoff, cancel: &CancellationToken) -> BTreeSet<PathBuf> {
        let roots = self.config.age_roots();
        match AgeTreeBuilder::new(&self.classifier, *cutoff).build(&roots, cancel) {
            Some(tree) => ProposalMerger::new(&self.config).merge(&tree, cancel),
            None => BTreeSet::new(),
        }
    }
}

/// Final size and count of an age proposal. Directories count only their
/// stale files but report their full size. Zero-sized proposals are dropped.
fn resolve_proposal(path: &Path, cutoff: &StaleCutoff, category: &str) -> Option<ScanItem> {
    let metadata = fs::symlink_metadata(path).ok()?;
    let (kind, size, count) = if metadata.is_dir() {
        let (stats, stale) = sizing::measure_with(path, |_, md| cutoff.is_stale(md));
        (ItemKind::Directory, stats.size_bytes, stale)
    } else if metadata.is_file() {
        (ItemKind::File, metadata.len(), 1)
    } else {
        return None;
    };

    if size == 0 {
        return None;
    }
    Some(ScanItem::new(path.to_path_buf(), kind, size, count, category))
}

fn emit(progress: Option<&ProgressFn<'_>>, percent: f32, message: &str, stage: &str) {
    log::info!("{}", message);
    if let Some(cb) = progress {
        cb(percent, message, stage);
    }
}

#[cfg(feature = "metrics")]
struct PhaseClock {
    started: Instant,
    last: Instant,
}

#[cfg(feature = "metrics")]
impl PhaseClock {
    fn start() -> Self {
        let now = Instant::now();
        PhaseClock { started: now, last: now }
    }

    fn lap(&mut self, phase: &str) {
        let now = Instant::now();
        let took: Duration = now.duration_since(self.last);
        self.last = now;
        log::debug!(
            "{} pass took {:?} ({:?} since start)",
            phase,
            took,
            now.duration_since(self.started)
        );
    }
}
