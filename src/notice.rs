use std::{
    collections::VecDeque,
    fmt,
    sync::Mutex,
};
use chrono::{DateTime, Utc};
use serde::Serialize;


const MAX_NOTICES: usize = 50;


/// What the person who filed a report gets told about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    Submitted { queue_id: String, report_id: i32 },
    PhotoNotAttached { queue_id: String, reason: String },
    SyncHalted { queue_id: String, reason: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Notice::Submitted { queue_id, report_id } =>
                write!(f, "Report {} submitted as #{}", queue_id, report_id),
            Notice::PhotoNotAttached { queue_id, reason } =>
                write!(f, "Photo for report {} could not be attached: {}", queue_id, reason),
            Notice::SyncHalted { queue_id, reason } =>
                write!(f, "Sync stopped at report {} and will retry when back online: {}",
                    queue_id, reason),
        }
    }
}


#[derive(Debug, Clone, Serialize)]
pub struct PostedNotice {
    pub time: DateTime<Utc>,
    pub message: String,
    #[serde(flatten)]
    pub notice: Notice,
}


/// The most recent notices, oldest first.
pub struct NoticeBoard {
    recent: Mutex<VecDeque<PostedNotice>>,
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl NoticeBoard {
    pub fn new() -> Self {
        NoticeBoard {
            recent: Mutex::new(VecDeque::with_capacity(MAX_NOTICES)),
        }
    }

    pub fn post(&self, notice: Notice) {
        match notice {
            Notice::SyncHalted { .. } => warn!("{}", notice),
            _ => info!("{}", notice),
        }

        let mut recent = self.recent.lock().unwrap_or_else(|p| p.into_inner());
        if recent.len() >= MAX_NOTICES {
            recent.pop_front();
        }
        recent.push_back(PostedNotice {
            time: Utc::now(),
            message: notice.to_string(),
            notice,
        });
    }

    pub fn recent(&self) -> Vec<PostedNotice> {
        self.recent.lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}
