use std::sync::Arc;

use rocket::{
    State,
    Route,
    response::{
        status::BadRequest,
        content::RawJson,
    },
    serde::json::Json,
    tokio::task,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::notice::NoticeBoard;
use crate::photo::FILE_UPLOAD_LIMIT;
use crate::report::{HazardCategory, NewQueuedReport};
use crate::sync_engine::SyncEngine;


type JsonResult = Result<RawJson<String>, BadRequest<String>>;


fn make_json_result(json: String) -> JsonResult {
    Ok(RawJson(json))
}

fn make_json_error(err: String) -> JsonResult {
    Err(BadRequest(err))
}

fn to_json_result<T: Serialize>(value: &T) -> JsonResult {
    match serde_json::to_string(value) {
        Ok(json) => make_json_result(json),
        Err(err) => make_json_error(err.to_string()),
    }
}


pub fn routes() -> Vec<Route> {
    routes![
        post_report,
        get_queue,
        delete_queued_report,
        delete_queue,
        post_sync,
        get_status,
        get_notices,
    ]
}


#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportInput {
    #[serde(default)]
    barangay_id: Option<i32>,
    #[serde(default)]
    custom_location: Option<String>,
    category: HazardCategory,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    contact_name: Option<String>,
    #[serde(default)]
    contact_number: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lng: Option<f64>,
    #[serde(default)]
    photo: Option<String>,
}

impl ReportInput {
    fn verify_error(&self) -> Option<&'static str> {
        let custom_location = non_blank(&self.custom_location);

        if self.barangay_id.is_some() && custom_location.is_some() {
            Some("Pick a barangay or type a location, not both")
        }
        else if self.barangay_id.is_none() && custom_location.is_none() {
            Some("A barangay or a location is required")
        }
        else if custom_location.map_or(false, |l| l.len() > 256) {
            Some("Location can not be longer than 256 characters")
        }
        else if self.description.as_ref().map_or(false, |d| d.len() >= 65536) {
            Some("The maximum length of the description is 65536")
        }
        else if self.contact_name.as_ref().map_or(false, |n| n.chars().count() > 64)
            || self.contact_number.as_ref().map_or(false, |n| n.chars().count() > 64) {
            Some("Contact details can not be longer than 64 characters")
        }
        else if self.lat.map_or(false, |lat| !(-90.0..=90.0).contains(&lat))
            || self.lng.map_or(false, |lng| !(-180.0..=180.0).contains(&lng)) {
            Some("Invalid coordinates")
        }
        else if self.lat.is_some() != self.lng.is_some() {
            Some("Latitude and longitude go together")
        }
        else if self.photo.as_ref().map_or(false, |p| p.len() > FILE_UPLOAD_LIMIT) {
            Some("The file is too large")
        }
        else {
            None
        }
    }

    fn into_report(self) -> NewQueuedReport {
        let mut report = NewQueuedReport::new(self.category);

        report.barangay_id = self.barangay_id;
        report.custom_location = non_blank(&self.custom_location).map(str::to_owned);
        report.description = non_blank(&self.description).map(str::to_owned);
        report.contact_name = non_blank(&self.contact_name).map(str::to_owned);
        report.contact_number = non_blank(&self.contact_number).map(str::to_owned);
        report.lat = self.lat;
        report.lng = self.lng;
        report.photo_base64 = self.photo.filter(|p| !p.is_empty());

        report
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}


#[post("/report", format = "json", data = "<input>")]
pub async fn post_report(input: Json<ReportInput>, engine: &State<Arc<SyncEngine>>) -> JsonResult {
    let input = input.into_inner();

    if let Some(err) = input.verify_error() {
        return make_json_error(err.to_string());
    }

    let engine = engine.inner().clone();
    let result = task::spawn_blocking(move || engine.submit(input.into_report())).await;

    match result {
        Ok(Ok(submission)) => to_json_result(&submission),
        Ok(Err(err)) => {
            error!("Fail to store report: {}", err);
            make_json_error(err.to_string())
        },
        Err(err) => make_json_error(err.to_string()),
    }
}

#[get("/queue")]
pub async fn get_queue(engine: &State<Arc<SyncEngine>>) -> JsonResult {
    let engine = engine.inner().clone();
    let entries = match task::spawn_blocking(move || engine.queue().list()).await {
        Ok(entries) => entries,
        Err(err) => return make_json_error(err.to_string()),
    };

    let part_jsons = entries.iter()
        .map(|e| {
            json!({
                "id": e.id,
                "timestamp": e.timestamp.timestamp_millis(),
                "category": e.report.category,
                "barangayId": e.report.barangay_id,
                "customLocation": e.report.custom_location,
                "description": e.report.description,
                "lat": e.report.lat,
                "lng": e.report.lng,
                "hasPhoto": e.has_photo(),
            })
        })
        .collect::<Vec<_>>();

    make_json_result(json!({
        "reports": part_jsons,
        "size": part_jsons.len(),
    }).to_string())
}

#[delete("/queue?<id>")]
pub async fn delete_queued_report(id: String, engine: &State<Arc<SyncEngine>>) -> JsonResult {
    let engine = engine.inner().clone();
    let t_id = id.clone();

    match task::spawn_blocking(move || engine.queue().remove(&t_id)).await {
        Ok(Ok(true)) => {
            warn!("Report {} discarded from the queue", id);
            make_json_result(json!({ "removed": id }).to_string())
        },
        Ok(Ok(false)) => make_json_error("Not found".into()),
        Ok(Err(err)) => make_json_error(err.to_string()),
        Err(err) => make_json_error(err.to_string()),
    }
}

#[delete("/queue/all")]
pub async fn delete_queue(engine: &State<Arc<SyncEngine>>) -> JsonResult {
    let engine = engine.inner().clone();
    let result = task::spawn_blocking(move || {
        let cnt = engine.queue().len();
        engine.queue().clear().map(|_| cnt)
    }).await;

    match result {
        Ok(Ok(cnt)) => {
            warn!("{} report(s) discarded from the queue", cnt);
            make_json_result(json!({ "removed": cnt }).to_string())
        },
        Ok(Err(err)) => make_json_error(err.to_string()),
        Err(err) => make_json_error(err.to_string()),
    }
}

#[post("/sync")]
pub async fn post_sync(engine: &State<Arc<SyncEngine>>) -> JsonResult {
    if !engine.is_online() {
        return make_json_error("Offline, reports will sync when the connection is back".into());
    }

    let engine = engine.inner().clone();
    match task::spawn_blocking(move || engine.sweep()).await {
        Ok(Some(report)) => to_json_result(&report),
        Ok(None) => make_json_error("A sync is already running".into()),
        Err(err) => make_json_error(err.to_string()),
    }
}

#[get("/status")]
pub async fn get_status(engine: &State<Arc<SyncEngine>>) -> JsonResult {
    let engine = engine.inner().clone();
    let result = task::spawn_blocking(move || {
        json!({
            "online": engine.is_online(),
            "state": engine.state(),
            "pending": engine.queue().len(),
        })
    }).await;

    match result {
        Ok(status) => make_json_result(status.to_string()),
        Err(err) => make_json_error(err.to_string()),
    }
}

#[get("/notices")]
pub fn get_notices(notices: &State<Arc<NoticeBoard>>) -> JsonResult {
    let recent = notices.recent();

    make_json_result(json!({
        "notices": recent,
        "size": recent.len(),
    }).to_string())
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::{mpsc, Mutex}, time::Duration};
    use rocket::{Build, Rocket};
    use rocket::http::Status;
    use rocket::local::{asynchronous, blocking::Client};
    use serde_json::Value as JsonValue;
    use tempfile::{tempdir, TempDir};

    use crate::connectivity::{ConnectivityMonitor, Link, tests::SwitchProbe};
    use crate::db::models::{NewHazardReport, NewReportPhoto};
    use crate::error::AgentResult;
    use crate::queue_store::QueueStore;
    use crate::remote::{PhotoStorage, ReportRepository};

    struct OkRepo;

    impl ReportRepository for OkRepo {
        fn insert_report(&self, _report: &NewHazardReport) -> AgentResult<i32> {
            Ok(42)
        }

        fn insert_photo(&self, _photo: &NewReportPhoto) -> AgentResult<()> {
            Ok(())
        }
    }

    struct OkStorage;

    impl PhotoStorage for OkStorage {
        fn upload(&self, path: &str, _content_type: &str, _bytes: Vec<u8>) -> AgentResult<String> {
            Ok(path.to_owned())
        }
    }

    // Lets a test hold the first insert until it says go.
    struct HeldRepo {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl ReportRepository for HeldRepo {
        fn insert_report(&self, _report: &NewHazardReport) -> AgentResult<i32> {
            self.entered.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            Ok(7)
        }

        fn insert_photo(&self, _photo: &NewReportPhoto) -> AgentResult<()> {
            Ok(())
        }
    }

    struct Setup {
        dir: TempDir,
        rocket: Rocket<Build>,
        monitor: Arc<ConnectivityMonitor>,
        queue: Arc<QueueStore>,
    }

    fn setup(repo: Box<dyn ReportRepository>) -> Setup {
        let dir = tempdir().expect("tempdir");
        let queue = Arc::new(QueueStore::open(dir.path().join("queue.json")).unwrap());
        let monitor = Arc::new(ConnectivityMonitor::new(Box::new(SwitchProbe::new(false))));
        let notices = Arc::new(NoticeBoard::new());
        let engine = Arc::new(SyncEngine::new(
            queue.clone(),
            repo,
            Box::new(OkStorage),
            monitor.clone(),
            notices.clone(),
        ));

        let rocket = rocket::build()
            .mount("/", routes())
            .manage(engine)
            .manage(notices);

        Setup { dir, rocket, monitor, queue }
    }

    fn client() -> (TempDir, Client, Arc<ConnectivityMonitor>) {
        let Setup { dir, rocket, monitor, .. } = setup(Box::new(OkRepo));
        (dir, Client::tracked(rocket).expect("valid rocket"), monitor)
    }

    fn input(value: JsonValue) -> ReportInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn verify_requires_exactly_one_location() {
        assert!(input(json!({ "category": "other" })).verify_error().is_some());
        assert!(input(json!({ "category": "other", "customLocation": "  " }))
            .verify_error().is_some());
        assert!(input(json!({ "category": "other", "barangayId": 1, "customLocation": "Sitio" }))
            .verify_error().is_some());
        assert!(input(json!({ "category": "other", "barangayId": 1 })).verify_error().is_none());
        assert!(input(json!({ "category": "other", "customLocation": "Sitio" }))
            .verify_error().is_none());
    }

    #[test]
    fn verify_checks_coordinates() {
        let bad_lat = input(json!({ "category": "other", "barangayId": 1, "lat": 91.0, "lng": 0.0 }));
        assert_eq!(bad_lat.verify_error(), Some("Invalid coordinates"));

        let half = input(json!({ "category": "other", "barangayId": 1, "lat": 16.3 }));
        assert!(half.verify_error().is_some());

        let ok = input(json!({ "category": "other", "barangayId": 1, "lat": 16.3, "lng": 121.5 }));
        assert!(ok.verify_error().is_none());
    }

    #[test]
    fn into_report_drops_blank_fields() {
        let report = input(json!({
            "category": "fallen_wire",
            "customLocation": " Purok 3 ",
            "description": "",
            "contactName": "   ",
            "photo": "",
        })).into_report();

        assert_eq!(report.custom_location.as_deref(), Some("Purok 3"));
        assert!(report.description.is_none());
        assert!(report.contact_name.is_none());
        assert!(report.photo_base64.is_none());
    }

    #[test]
    fn offline_report_is_queued() {
        let (_dir, client, _monitor) = client();

        let res = client.post("/report")
            .json(&json!({ "category": "fallen_wire", "barangayId": 5, "lat": 16.3, "lng": 121.5 }))
            .dispatch();
        assert_eq!(res.status(), Status::Ok);
        let body: JsonValue = res.into_json().unwrap();
        assert_eq!(body["status"], "queued");

        let queue: JsonValue = client.get("/queue").dispatch().into_json().unwrap();
        assert_eq!(queue["size"], 1);
        assert_eq!(queue["reports"][0]["id"], body["queue_id"]);
        assert_eq!(queue["reports"][0]["hasPhoto"], false);

        let status: JsonValue = client.get("/status").dispatch().into_json().unwrap();
        assert_eq!(status["online"], false);
        assert_eq!(status["state"], "idle");
        assert_eq!(status["pending"], 1);
    }

    #[test]
    fn invalid_report_is_rejected() {
        let (_dir, client, _monitor) = client();

        let res = client.post("/report")
            .json(&json!({ "category": "fallen_wire" }))
            .dispatch();
        assert_eq!(res.status(), Status::BadRequest);
    }

    #[test]
    fn manual_sync_drains_queue_when_online() {
        let (_dir, client, monitor) = client();
        client.post("/report")
            .json(&json!({ "category": "broken_pole", "customLocation": "Km 12 highway" }))
            .dispatch();

        let res = client.post("/sync").dispatch();
        assert_eq!(res.status(), Status::BadRequest);

        monitor.observe(Link::Online);
        let sweep: JsonValue = client.post("/sync").dispatch().into_json().unwrap();
        assert_eq!(sweep["synced"][0]["report_id"], 42);
        assert_eq!(sweep["remaining"], 0);

        let notices: JsonValue = client.get("/notices").dispatch().into_json().unwrap();
        assert_eq!(notices["size"], 1);
        assert_eq!(notices["notices"][0]["kind"], "submitted");
    }

    #[test]
    fn online_report_is_submitted() {
        let (_dir, client, monitor) = client();
        monitor.observe(Link::Online);

        let body: JsonValue = client.post("/report")
            .json(&json!({ "category": "tree_on_line", "barangayId": 2 }))
            .dispatch()
            .into_json()
            .unwrap();
        assert_eq!(body["status"], "submitted");
        assert_eq!(body["report_id"], 42);
    }

    #[test]
    fn discards_queued_reports() {
        let (_dir, client, _monitor) = client();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let body: JsonValue = client.post("/report")
                .json(&json!({ "category": "other", "barangayId": 1 }))
                .dispatch()
                .into_json()
                .unwrap();
            ids.push(body["queue_id"].as_str().unwrap().to_owned());
        }

        let res = client.delete(format!("/queue?id={}", ids[0])).dispatch();
        assert_eq!(res.status(), Status::Ok);
        let res = client.delete("/queue?id=missing").dispatch();
        assert_eq!(res.status(), Status::BadRequest);

        let queue: JsonValue = client.get("/queue").dispatch().into_json().unwrap();
        assert_eq!(queue["size"], 2);

        let cleared: JsonValue = client.delete("/queue/all").dispatch().into_json().unwrap();
        assert_eq!(cleared["removed"], 2);
        let queue: JsonValue = client.get("/queue").dispatch().into_json().unwrap();
        assert_eq!(queue["size"], 0);
    }

    #[rocket::async_test]
    async fn status_answers_while_sweep_runs() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let Setup { dir: _dir, rocket, monitor, queue } = setup(Box::new(HeldRepo {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        }));
        queue.enqueue(NewQueuedReport::new(HazardCategory::FallenWire)).unwrap();
        monitor.observe(Link::Online);

        let client = asynchronous::Client::tracked(rocket).await.expect("valid rocket");

        let sync = client.post("/sync").dispatch();
        let check = async {
            task::spawn_blocking(move || entered_rx.recv_timeout(Duration::from_secs(5)))
                .await
                .unwrap()
                .unwrap();

            let status = client.get("/status").dispatch().await;
            let status: JsonValue = status.into_json().await.unwrap();
            let queued = client.get("/queue").dispatch().await;
            let queued: JsonValue = queued.into_json().await.unwrap();

            release_tx.send(()).unwrap();
            (status, queued)
        };

        let (sync, (status, queued)) = rocket::tokio::join!(sync, check);

        assert_eq!(status["state"], "syncing");
        assert_eq!(status["pending"], 1);
        assert_eq!(queued["size"], 1);

        let sweep: JsonValue = sync.into_json().await.unwrap();
        assert_eq!(sweep["synced"][0]["report_id"], 7);
        assert_eq!(sweep["remaining"], 0);
    }
}
