pub mod models;
pub mod schema;


use std::sync::Mutex;

use diesel::prelude::*;
use diesel::pg::PgConnection;
use diesel::result::QueryResult;

use models::*;
use schema::hazard_reports::dsl::{self as r_dsl};

use crate::error::{AgentError, AgentResult};
use crate::remote::ReportRepository;


pub fn insert_report(conn: &mut PgConnection, report: &NewHazardReport) -> QueryResult<i32> {
    diesel::insert_into(schema::hazard_reports::table)
        .values(report)
        .returning(r_dsl::id)
        .get_result::<i32>(conn)
}

pub fn insert_report_photo(conn: &mut PgConnection, photo: &NewReportPhoto) -> QueryResult<usize> {
    diesel::insert_into(schema::report_photos::table)
        .values(photo)
        .execute(conn)
}


/// Postgres-backed repository. The connection is opened on first use and
/// thrown away after any failure, so the agent can start while offline and
/// reconnect once the uplink is back.
pub struct PgReportRepository {
    database_url: String,
    conn: Mutex<Option<PgConnection>>,
}

impl PgReportRepository {
    pub fn new(database_url: String) -> Self {
        PgReportRepository {
            database_url,
            conn: Mutex::new(None),
        }
    }

    fn with_conn<T, F>(&self, job: F) -> AgentResult<T> where
        F: FnOnce(&mut PgConnection) -> QueryResult<T> {

        let mut slot = self.conn.lock()
            .map_err(|_| AgentError::Remote("database connection lock poisoned".into()))?;

        if slot.is_none() {
            *slot = Some(PgConnection::establish(&self.database_url)?);
        }

        let result = match slot.as_mut() {
            Some(conn) => job(conn),
            None => return Err(AgentError::Remote("no database connection".into())),
        };

        if result.is_err() {
            // Reconnect on the next call.
            *slot = None;
        }

        result.map_err(AgentError::from)
    }
}

impl ReportRepository for PgReportRepository {
    fn insert_report(&self, report: &NewHazardReport) -> AgentResult<i32> {
        self.with_conn(|conn| insert_report(conn, report))
    }

    fn insert_photo(&self, photo: &NewReportPhoto) -> AgentResult<()> {
        self.with_conn(|conn| insert_report_photo(conn, photo))
            .map(|_| ())
    }
}
