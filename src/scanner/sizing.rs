use std::fs::Metadata;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use walkdir::WalkDir;

const SECS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirStats {
    pub size_bytes: u64,
    pub file_count: u64,
}

/// Recursive size and file count of `dir`. Best effort: entries that cannot
/// be read are skipped and never abort the rest of the walk.
pub fn measure(dir: &Path) -> DirStats {
    measure_with(dir, |_, _| false).0
}

/// Same walk as [`measure`], also counting the files accepted by `matches`.
pub fn measure_with<F>(dir: &Path, mut matches: F) -> (DirStats, u64)
where
    F: FnMut(&Path, &Metadata) -> bool,
{
    let mut stats = DirStats::default();
    let mut matched = 0u64;

    for entry in WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(_) => continue,
        };
        stats.size_bytes = stats.size_bytes.saturating_add(metadata.len());
        stats.file_count += 1;
        if matches(entry.path(), &metadata) {
            matched += 1;
        }
    }

    (stats, matched)
}

/// Point in time before which a file counts as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleCutoff {
    threshold: SystemTime,
}

impl StaleCutoff {
    pub fn days_before(now: SystemTime, days: u32) -> Self {
        let window = Duration::from_secs(u64::from(days) * SECS_PER_DAY);
        StaleCutoff {
            threshold: now.checked_sub(window).unwrap_or(UNIX_EPOCH),
        }
    }

    /// A file is stale only when none of its access, modify and
    /// change/creation times reaches the threshold.
    pub fn is_stale(&self, metadata: &Metadata) -> bool {
        match newest_timestamp(metadata) {
            Some(newest) => newest < self.threshold,
            None => false,
        }
    }
}

fn newest_timestamp(metadata: &Metadata) -> Option<SystemTime> {
    [
        metadata.accessed().ok(),
        metadata.modified().ok(),
        change_or_creation_time(metadata),
    ]
    .into_iter()
    .flatten()
    .max()
}

#[cfg(unix)]
fn change_or_creation_time(metadata: &Metadata) -> Option<SystemTime> {
    use std::os::unix::fs::MetadataExt;

    let secs = u64::try_from(metadata.ctime()).ok()?;
    let nanos = u32::try_from(metadata.ctime_nsec()).unwrap_or(0);
    Some(UNIX_EPOCH + Duration::new(secs, nanos))
}

#[cfg(not(unix))]
fn change_or_creation_time(metadata: &Metadata) -> Option<SystemTime> {
    metadata.created().ok()
}
