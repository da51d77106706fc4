use crate::db::models::{NewHazardReport, NewReportPhoto};
use crate::error::AgentResult;


/// The hosted data store that receives report and photo records.
pub trait ReportRepository: Send + Sync {
    /// Inserts a report record and returns the id the remote assigned to it.
    fn insert_report(&self, report: &NewHazardReport) -> AgentResult<i32>;

    fn insert_photo(&self, photo: &NewReportPhoto) -> AgentResult<()>;
}


/// The hosted object storage that keeps report photos.
pub trait PhotoStorage: Send + Sync {
    /// Uploads `bytes` under the caller-chosen `path` and returns the stored
    /// object path.
    fn upload(&self, path: &str, content_type: &str, bytes: Vec<u8>) -> AgentResult<String>;
}
