use std::{
    sync::Arc,
    time::Duration,
};

use crate::connectivity::{ConnectivityMonitor, Transition};
use crate::sync_engine::{SyncEngine, SyncState};
use crate::task_scheduler::{Task, TaskSchedulerBuilder};


pub struct SyncSchedule {
    pub online_period: Duration,
    pub offline_period: Duration,
}


pub fn init_sync_sys(
    scheduler: &mut TaskSchedulerBuilder,
    monitor: Arc<ConnectivityMonitor>,
    engine: Arc<SyncEngine>,
    schedule: SyncSchedule,
) {
    if !engine.queue().is_empty() {
        info!("{} report(s) waiting in the queue", engine.queue().len());
    }

    scheduler.add_task(Task::new("connectivity", move || {
        connectivity_job(&monitor, &engine, &schedule)
    }, Duration::new(0, 0)));
}

fn connectivity_job(monitor: &ConnectivityMonitor, engine: &SyncEngine, schedule: &SyncSchedule)
    -> Duration {

    if monitor.poll() == Transition::CameOnline {
        match engine.sweep() {
            Some(report) if report.halted() => {
                warn!("Sync halted, {} report(s) stay queued", report.remaining);
            },
            Some(_) => (),
            None if engine.state() == SyncState::Syncing => info!("Sync already running, skip"),
            None => info!("Link dropped before sync could start"),
        }
    }

    if monitor.is_online() {
        schedule.online_period
    }
    else {
        schedule.offline_period
    }
}
