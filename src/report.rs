use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::NewHazardReport;


/// Kinds of power-infrastructure hazard a citizen can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardCategory {
    BrokenPole,
    FallenWire,
    TreeOnLine,
    TransformerNoise,
    MeterDamage,
    Other,
}

impl HazardCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            HazardCategory::BrokenPole => "broken_pole",
            HazardCategory::FallenWire => "fallen_wire",
            HazardCategory::TreeOnLine => "tree_on_line",
            HazardCategory::TransformerNoise => "transformer_noise",
            HazardCategory::MeterDamage => "meter_damage",
            HazardCategory::Other => "other",
        }
    }
}

impl fmt::Display for HazardCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


/// A report as handed over by the submitter, before the queue has assigned
/// it an id and a creation time.
///
/// Exactly one of `barangay_id` and `custom_location` is expected to be set;
/// the submitter checks that, the queue does not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQueuedReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barangay_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_location: Option<String>,
    pub category: HazardCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_base64: Option<String>,
}

impl NewQueuedReport {
    pub fn new(category: HazardCategory) -> Self {
        NewQueuedReport {
            barangay_id: None,
            custom_location: None,
            category,
            description: None,
            contact_name: None,
            contact_number: None,
            lat: None,
            lng: None,
            photo_base64: None,
        }
    }
}


/// A pending report held by the local queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedReport {
    pub id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub report: NewQueuedReport,
}

impl QueuedReport {
    pub fn has_photo(&self) -> bool {
        self.report.photo_base64.is_some()
    }

    /// Builds the remote record for this entry. The photo travels separately.
    pub fn to_new_report(&self) -> NewHazardReport {
        let r = &self.report;

        NewHazardReport {
            barangay_id: r.barangay_id,
            custom_location: r.custom_location.clone(),
            category: r.category.as_str().to_owned(),
            description: r.description.clone(),
            contact_name: r.contact_name.clone(),
            contact_number: r.contact_number.clone(),
            latitude: r.lat,
            longitude: r.lng,
            status: "pending".to_owned(),
            reported_at: self.timestamp,
        }
    }
}
