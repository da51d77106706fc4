use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::schema::{hazard_reports, report_photos};


#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = hazard_reports)]
pub struct NewHazardReport {
    pub barangay_id: Option<i32>,
    pub custom_location: Option<String>,
    pub category: String,
    pub description: Option<String>,
    pub contact_name: Option<String>,
    pub contact_number: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: String,
    pub reported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = report_photos)]
pub struct NewReportPhoto {
    pub report_id: i32,
    pub storage_path: String,
}
