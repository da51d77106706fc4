use std::{
    fs,
    io,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};
use chrono::{SubsecRound, Utc};

use crate::error::AgentResult;
use crate::report::{NewQueuedReport, QueuedReport};
use crate::util;


/// Durable list of reports waiting to be synced, kept as one JSON array in a
/// single file. Entries leave the queue only through `remove` or `clear`.
pub struct QueueStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl QueueStore {
    pub fn open<P: AsRef<Path>>(path: P) -> AgentResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        Ok(QueueStore {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn enqueue(&self, report: NewQueuedReport) -> AgentResult<QueuedReport> {
        let _guard = self.guard();
        let mut entries = self.read_entries();

        // Stored at millisecond precision, so the returned entry matches the
        // one read back later. Kept non-decreasing even if the clock steps back.
        let now = Utc::now().trunc_subsecs(3);
        let timestamp = match entries.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };

        let entry = QueuedReport {
            id: format!("{}-{}", timestamp.timestamp_millis(), util::generate_rand_id(9)),
            timestamp,
            report,
        };

        entries.push(entry.clone());
        self.write_entries(&entries)?;

        Ok(entry)
    }

    /// Every pending entry in insertion order. Unreadable storage reads as empty.
    pub fn list(&self) -> Vec<QueuedReport> {
        let _guard = self.guard();
        self.read_entries()
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.list().iter().any(|e| e.id == id)
    }

    /// Returns false if no entry had that id.
    pub fn remove(&self, id: &str) -> AgentResult<bool> {
        let _guard = self.guard();
        let mut entries = self.read_entries();

        match entries.iter().position(|e| e.id == id) {
            Some(pos) => {
                entries.remove(pos);
                self.write_entries(&entries)?;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    pub fn clear(&self) -> AgentResult<()> {
        let _guard = self.guard();

        match fs::remove_file(&self.path) {
            Ok(_) => Ok(()),
            Err(ref err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }


    fn guard(&self) -> MutexGuard<'_, ()> {
        // The guarded data is `()`, a poisoned lock holds nothing broken.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_entries(&self) -> Vec<QueuedReport> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(ref err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!("Fail to read report queue {}: {}", self.path.display(), err);
                return Vec::new();
            },
        };

        if text.trim().is_empty() {
            return Vec::new();
        }

        match serde_json::from_str(&text) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Report queue {} is corrupt, treating it as empty: {}",
                    self.path.display(), err);
                Vec::new()
            },
        }
    }

    fn write_entries(&self, entries: &[QueuedReport]) -> AgentResult<()> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");

        fs::write(&tmp, serde_json::to_vec(entries)?)?;
        fs::rename(&tmp, &self.path)?;

        Ok(())
    }
}
