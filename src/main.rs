#[macro_use] extern crate rocket;


mod config;
mod connectivity;
mod db;
mod error;
mod logger;
mod notice;
mod photo;
mod queue_store;
mod remote;
mod report;
mod report_route;
mod storage;
mod sync_engine;
mod sync_sys;
mod task_scheduler;
mod util;


use std::{process, sync::Arc};

use crate::config::Config;
use crate::connectivity::{ConnectivityMonitor, HttpProbe};
use crate::db::PgReportRepository;
use crate::error::AgentResult;
use crate::notice::NoticeBoard;
use crate::queue_store::QueueStore;
use crate::storage::HttpPhotoStorage;
use crate::sync_engine::SyncEngine;
use crate::sync_sys::SyncSchedule;
use crate::task_scheduler::TaskSchedulerBuilder;


#[get("/")]
fn index() -> &'static str {
    "Hazard Report Agent"
}


fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        },
    };

    let _sentry = match logger::init(&config) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Fail to init logger: {}", err);
            process::exit(1);
        },
    };

    if let Err(err) = run(config) {
        error!("{}", err);
        process::exit(1);
    }
}

fn run(config: Config) -> AgentResult<()> {
    let queue = Arc::new(QueueStore::open(&config.queue_path)?);
    info!("Report queue at {}", queue.path().display());

    let notices = Arc::new(NoticeBoard::new());
    let monitor = Arc::new(ConnectivityMonitor::new(Box::new(
        HttpProbe::new(&config.probe_url, config.probe_timeout)?)));
    let engine = Arc::new(SyncEngine::new(
        queue,
        Box::new(PgReportRepository::new(config.database_url.clone())),
        Box::new(HttpPhotoStorage::new(
            &config.storage_url, &config.storage_bucket, &config.storage_key)?),
        monitor.clone(),
        notices.clone(),
    ));

    let mut scheduler = TaskSchedulerBuilder::new()
        .period_resolution(config.scheduler_tick);
    sync_sys::init_sync_sys(&mut scheduler, monitor, engine.clone(), SyncSchedule {
        online_period: config.probe_period,
        offline_period: config.offline_probe_period,
    });
    let scheduler = scheduler.build();

    let result = rocket::execute(
        rocket::build()
            .mount("/", routes![index])
            .mount("/", report_route::routes())
            .manage(engine)
            .manage(notices)
            .launch()
    );

    scheduler.join();

    if let Err(err) = result {
        error!("Server stopped: {}", err);
    }

    Ok(())
}
