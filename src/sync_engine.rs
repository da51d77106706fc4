use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::connectivity::ConnectivityMonitor;
use crate::db::models::NewReportPhoto;
use crate::error::AgentResult;
use crate::notice::{Notice, NoticeBoard};
use crate::photo;
use crate::queue_store::QueueStore;
use crate::remote::{PhotoStorage, ReportRepository};
use crate::report::{NewQueuedReport, QueuedReport};


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Syncing,
}

struct EngineState {
    phase: SyncState,
    // A submit arrived while a sweep was running.
    rerun: bool,
}


#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncedReport {
    pub queue_id: String,
    pub report_id: i32,
    pub photo_attached: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct SweepReport {
    pub synced: Vec<SyncedReport>,
    /// Queue id of the entry that stopped the sweep.
    pub halted_at: Option<String>,
    pub remaining: usize,
    pub notices: Vec<Notice>,
}

impl SweepReport {
    pub fn halted(&self) -> bool {
        self.halted_at.is_some()
    }
}


#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitStatus {
    Submitted { report_id: i32 },
    Queued,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    pub queue_id: String,
    #[serde(flatten)]
    pub status: SubmitStatus,
}


/// Holding one means the engine is `Syncing`. Dropping it returns the engine
/// to `Idle`.
pub struct SweepGuard<'a> {
    engine: &'a SyncEngine,
    released: bool,
}

impl SweepGuard<'_> {
    /// Called after each pass. Returns true when a rerun was requested and the
    /// pass did not halt; otherwise the engine goes back to `Idle`.
    fn continue_after(&mut self, halted: bool) -> bool {
        let mut state = self.engine.lock_state();

        if state.rerun && !halted {
            state.rerun = false;
            return true;
        }

        state.rerun = false;
        state.phase = SyncState::Idle;
        self.released = true;
        false
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            let mut state = self.engine.lock_state();
            state.rerun = false;
            state.phase = SyncState::Idle;
        }
    }
}


/// Drains the local queue into the remote service, one entry at a time, in
/// queue order. A failed report insert stops the sweep and leaves that entry
/// and everything after it queued for the next time the uplink comes back.
pub struct SyncEngine {
    queue: Arc<QueueStore>,
    reports: Box<dyn ReportRepository>,
    photos: Box<dyn PhotoStorage>,
    connectivity: Arc<ConnectivityMonitor>,
    notices: Arc<NoticeBoard>,
    state: Mutex<EngineState>,
}

impl SyncEngine {
    pub fn new(
        queue: Arc<QueueStore>,
        reports: Box<dyn ReportRepository>,
        photos: Box<dyn PhotoStorage>,
        connectivity: Arc<ConnectivityMonitor>,
        notices: Arc<NoticeBoard>,
    ) -> Self {
        SyncEngine {
            queue,
            reports,
            photos,
            connectivity,
            notices,
            state: Mutex::new(EngineState {
                phase: SyncState::Idle,
                rerun: false,
            }),
        }
    }

    pub fn queue(&self) -> &QueueStore {
        &self.queue
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn state(&self) -> SyncState {
        self.lock_state().phase
    }

    /// `Idle -> Syncing`. Returns `None` if a sweep is already running.
    pub fn try_begin(&self) -> Option<SweepGuard<'_>> {
        let mut state = self.lock_state();

        match state.phase {
            SyncState::Syncing => None,
            SyncState::Idle => {
                state.phase = SyncState::Syncing;
                Some(SweepGuard { engine: self, released: false })
            },
        }
    }

    /// Runs one sweep. Returns `None` when offline or when another sweep is
    /// already in progress.
    pub fn sweep(&self) -> Option<SweepReport> {
        if !self.is_online() {
            return None;
        }

        let guard = self.try_begin()?;
        Some(self.run(guard))
    }

    /// Stores the report, then tries to push it right away if the uplink is up.
    pub fn submit(&self, report: NewQueuedReport) -> AgentResult<Submission> {
        let entry = self.queue.enqueue(report)?;
        info!("Queued report {} ({})", entry.id, entry.report.category);

        let status = self.sweep_or_defer()
            .and_then(|sweep| {
                sweep.synced.iter()
                    .find(|s| s.queue_id == entry.id)
                    .map(|s| SubmitStatus::Submitted { report_id: s.report_id })
            })
            .unwrap_or(SubmitStatus::Queued);

        Ok(Submission {
            queue_id: entry.id,
            status,
        })
    }


    fn sweep_or_defer(&self) -> Option<SweepReport> {
        if !self.is_online() {
            return None;
        }

        let guard = {
            let mut state = self.lock_state();

            match state.phase {
                SyncState::Syncing => {
                    state.rerun = true;
                    return None;
                },
                SyncState::Idle => {
                    state.phase = SyncState::Syncing;
                    SweepGuard { engine: self, released: false }
                },
            }
        };

        Some(self.run(guard))
    }

    fn run(&self, mut guard: SweepGuard<'_>) -> SweepReport {
        let mut report = SweepReport::default();

        loop {
            let halted = self.run_pass(&mut report);
            if !guard.continue_after(halted) {
                break;
            }
        }

        report.remaining = self.queue.len();
        if !report.synced.is_empty() || report.halted() {
            info!("Sweep done: {} synced, {} remaining", report.synced.len(), report.remaining);
        }

        report
    }

    /// One pass over a snapshot of the queue. Returns true if it halted.
    fn run_pass(&self, report: &mut SweepReport) -> bool {
        let snapshot = self.queue.list();

        for entry in snapshot {
            let (report_id, photo_attached) = match self.deliver(&entry, report) {
                Ok(result) => result,
                Err(err) => {
                    warn!("Fail to sync report {}: {}", entry.id, err);
                    self.notify(report, Notice::SyncHalted {
                        queue_id: entry.id.clone(),
                        reason: err.to_string(),
                    });
                    report.halted_at = Some(entry.id);
                    return true;
                },
            };

            if let Err(err) = self.queue.remove(&entry.id) {
                // Going on would send this entry again on the next sweep
                // after each later one.
                error!("Fail to remove synced report {} from queue: {}", entry.id, err);
                self.notify(report, Notice::SyncHalted {
                    queue_id: entry.id.clone(),
                    reason: err.to_string(),
                });
                report.halted_at = Some(entry.id);
                return true;
            }

            self.notify(report, Notice::Submitted {
                queue_id: entry.id.clone(),
                report_id,
            });
            report.synced.push(SyncedReport {
                queue_id: entry.id,
                report_id,
                photo_attached,
            });
        }

        false
    }

    /// Sends one entry. Only the report insert can fail the entry; the photo
    /// is best effort.
    fn deliver(&self, entry: &QueuedReport, report: &mut SweepReport) -> AgentResult<(i32, bool)> {
        let uploaded = match entry.report.photo_base64.as_deref() {
            Some(encoded) => Some(self.upload_photo(encoded)),
            None => None,
        };

        let report_id = self.reports.insert_report(&entry.to_new_report())?;

        let photo_error = match uploaded {
            Some(Ok(storage_path)) => {
                self.reports.insert_photo(&NewReportPhoto { report_id, storage_path })
                    .err()
            },
            Some(Err(err)) => Some(err),
            None => None,
        };

        if let Some(err) = &photo_error {
            warn!("Photo for report {} not attached: {}", entry.id, err);
            self.notify(report, Notice::PhotoNotAttached {
                queue_id: entry.id.clone(),
                reason: err.to_string(),
            });
        }

        Ok((report_id, entry.has_photo() && photo_error.is_none()))
    }

    fn upload_photo(&self, encoded: &str) -> AgentResult<String> {
        let decoded = photo::decode_photo(encoded)?;
        let path = photo::photo_file_name(&decoded.ext);
        let content_type = decoded.content_type();

        self.photos.upload(&path, &content_type, decoded.bytes)
    }

    fn notify(&self, report: &mut SweepReport, notice: Notice) {
        report.notices.push(notice.clone());
        self.notices.post(notice);
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}
