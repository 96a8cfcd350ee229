use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{oneshot, watch, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::config::ScanConfig;
use crate::scanner::{ProgressFn, ResultCache, ScanEngine, ScanReport, ScanResults};

pub type OperationId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Running,
    Completed,
    Canceled,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpState {
    pub id: OperationId,
    pub started_at_ms: u128,
    pub stage: String,
    pub progress: f32,
    pub details: Option<String>,
    pub status: OperationStatus,
}

/// Latest progress of a scan. Intermediate values may be skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScanProgress {
    pub percent: f32,
    pub stage: String,
    pub message: String,
}

#[derive(Debug)]
struct OpHandle {
    token: CancellationToken,
    started_at: Instant,
}

/// Caller side of a running scan.
pub struct ScanHandle {
    id: OperationId,
    token: CancellationToken,
    progress: watch::Receiver<ScanProgress>,
    result: oneshot::Receiver<ScanReport>,
}

impl ScanHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn progress(&self) -> watch::Receiver<ScanProgress> {
        self.progress.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Waits for the final result. Errors only if the scan task died.
    pub async fn wait(self) -> Result<ScanReport, String> {
        self.result
            .await
            .map_err(|_| format!("scan {} ended without a result", self.id))
    }
}

#[derive(Clone)]
pub struct OperationRegistry {
    inner: Arc<DashMap<OperationId, (OpState, Arc<OpHandle>)>>,
    // Global concurrency guard
    pub scan_sem: Arc<Semaphore>,
}

impl OperationRegistry {
    pub fn new(scan_permits: usize) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            scan_sem: Arc::new(Semaphore::new(scan_permits.max(1))),
        }
    }

    fn register(&self) -> (OperationId, CancellationToken) {
        let id = uuid::Uuid::new_v4().to_string();
        let token = CancellationToken::new();
        let state = OpState {
            id: id.clone(),
            started_at_ms: now_ms(),
            stage: "pending".into(),
            progress: 0.0,
            details: None,
            status: OperationStatus::Pending,
        };
        let handle = Arc::new(OpHandle {
            token: token.clone(),
            started_at: Instant::now(),
        });
        self.inner.insert(id.clone(), (state, handle));
        (id, token)
    }

    /// Starts a scan on the blocking pool and returns immediately. Must be
    /// called from inside a Tokio runtime. A scan that is not cancelled
    /// saves its results to the configured cache before delivering them.
    pub fn start_scan(&self, config: ScanConfig) -> ScanHandle {
        let (id, token) = self.register();
        let (progress_tx, progress_rx) = watch::channel(ScanProgress::default());
        let (result_tx, result_rx) = oneshot::channel();

        let registry = self.clone();
        let op_id = id.clone();
        let task_token = token.clone();
        tokio::spawn(async move {
            let permit = match registry.scan_sem.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    registry.finish_failed(&op_id, "scan semaphore closed");
                    return;
                }
            };
            registry.update(&op_id, |s| {
                s.status = OperationStatus::Running;
                s.stage = "starting".into();
            });

            let progress_registry = registry.clone();
            let progress_id = op_id.clone();
            let joined = tokio::task::spawn_blocking(move || {
                let on_progress: &ProgressFn<'_> = &move |percent: f32, message: &str, stage: &str| {
                    progress_registry.update(&progress_id, |s| {
                        s.progress = percent;
                        s.stage = stage.to_string();
                        s.details = Some(message.to_string());
                    });
                    let _ = progress_tx.send(ScanProgress {
                        percent,
                        stage: stage.to_string(),
                        message: message.to_string(),
                    });
                };

                let engine = ScanEngine::new(config);
                let report = engine.run(&task_token, Some(on_progress));
                if !report.cancelled {
                    ResultCache::for_config(engine.config()).save(&report.items);
                }
                report
            })
            .await;
            drop(permit);

            match joined {
                Ok(report) => {
                    if report.cancelled {
                        registry.finish_canceled(&op_id);
                    } else {
                        registry.finish_success(&op_id);
                    }
                    let _ = result_tx.send(report);
                }
                Err(err) => {
                    log::error!("Scan {} failed: {}", op_id, err);
                    registry.finish_failed(&op_id, &err.to_string());
                }
            }
        });

        ScanHandle {
            id,
            token,
            progress: progress_rx,
            result: result_rx,
        }
    }

    pub fn update(&self, id: &str, mut f: impl FnMut(&mut OpState)) {
        if let Some(mut entry) = self.inner.get_mut(id) {
            f(&mut entry.0);
        }
    }

    pub fn get(&self, id: &str) -> Option<OpState> {
        self.inner.get(id).map(|e| e.0.clone())
    }

    pub fn cancel(&self, id: &str) -> bool {
        if let Some(entry) = self.inner.get(id) {
            entry.1.token.cancel();
            true
        } else {
            false
        }
    }

    pub fn active(&self) -> usize {
        self.inner.len()
    }

    fn finish_success(&self, id: &str) {
        self.update(id, |s| {
            s.status = OperationStatus::Completed;
            s.progress = 100.0;
            s.stage = "complete".into();
        });
        self.retire(id, "completed");
    }

    fn finish_canceled(&self, id: &str) {
        self.update(id, |s| {
            s.status = OperationStatus::Canceled;
        });
        self.retire(id, "canceled");
    }

    fn finish_failed(&self, id: &str, msg: &str) {
        self.update(id, |s| {
            s.status = OperationStatus::Failed;
            s.details = Some(msg.to_string());
        });
        self.retire(id, "failed");
    }

    // Finished operations are dropped right away; the handle carries the result
    fn retire(&self, id: &str, outcome: &str) {
        if let Some((_, (_, handle))) = self.inner.remove(id) {
            log::info!(
                "Scan {} {} after {:?}",
                id,
                outcome,
                handle.started_at.elapsed()
            );
        }
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Results of the last completed scan still valid on disk.
pub fn load_cached(config: &ScanConfig) -> ScanResults {
    ResultCache::for_config(config).load()
}

fn now_ms() -> u128 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
