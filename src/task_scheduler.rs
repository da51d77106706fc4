use std::{
    thread,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};
use threadpool::ThreadPool;


pub type FnTask = dyn Fn() -> Duration + Send + Sync + 'static;

const N_WORKERS: usize = 2;


/// A periodic job. The job returns how long to wait before its next run.
pub struct Task {
    name: &'static str,
    job: Arc<FnTask>,
    next_time: Instant,
    running: bool,
}

impl Task {
    pub fn new<F>(name: &'static str, job: F, delay: Duration) -> Self where
        F: Fn() -> Duration + Send + Sync + 'static {

        Task {
            name,
            job: Arc::new(job),
            next_time: Instant::now() + delay,
            running: false,
        }
    }

    fn ready(&self) -> bool {
        !self.running && Instant::now() >= self.next_time
    }

    fn finish_job(&mut self, result: Duration) {
        self.next_time = Instant::now() + result;
        self.running = false;
    }

    fn mark_as_busy(&mut self) {
        self.running = true;
    }
}


pub struct TaskSchedulerBuilder {
    tasks: Vec<Arc<Mutex<Task>>>,
    period_resolution: Duration,
}

impl Default for TaskSchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskSchedulerBuilder {
    pub fn new() -> Self {
        TaskSchedulerBuilder {
            tasks: Vec::new(),
            period_resolution: Duration::from_millis(500),
        }
    }

    pub fn period_resolution(mut self, period: Duration) -> Self {
        self.period_resolution = period;
        self
    }

    pub fn add_task(&mut self, task: Task) {
        self.tasks.push(Arc::new(Mutex::new(task)));
    }

    pub fn build(self) -> TaskScheduler {
        TaskScheduler::new(self)
    }
}


pub struct TaskScheduler {
    scheduler: thread::JoinHandle<()>,
    running: Arc<AtomicBool>,
}

impl TaskScheduler {
    fn new(builder: TaskSchedulerBuilder) -> Self {
        let tasks = builder.tasks;
        let period_resolution = builder.period_resolution;

        let running = Arc::new(AtomicBool::new(true));
        let t_running = running.clone();

        let scheduler_job = move || {
            let pool = ThreadPool::new(N_WORKERS);

            while t_running.load(Ordering::SeqCst) {
                for m_task in &tasks {
                    let mut task = lock(m_task);

                    if task.ready() {
                        task.mark_as_busy();

                        let name = task.name;
                        let job = task.job.clone();
                        let t_task = m_task.clone();
                        pool.execute(move || {
                            debug!("Run task {}", name);
                            let next_period = (*job)();
                            lock(&t_task).finish_job(next_period);
                        });
                    }
                }

                thread::sleep(period_resolution);
            }

            pool.join();
        };

        TaskScheduler {
            scheduler: thread::spawn(scheduler_job),
            running,
        }
    }

    /// Stops scheduling and waits for running jobs to finish.
    pub fn join(self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if self.scheduler.join().is_err() {
            error!("Task scheduler thread panicked");
        }
    }
}

fn lock(task: &Mutex<Task>) -> MutexGuard<'_, Task> {
    task.lock().unwrap_or_else(|p| p.into_inner())
}
