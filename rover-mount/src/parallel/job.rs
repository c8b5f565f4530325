use crate::config::{MountingConfig, RuntimeCapabilities, WorkerLimits};
use crate::error::{MountError, Result, panic_message};
use parking_lot::{Condvar, Mutex};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, warn};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Submission refused; the job is handed back so the caller can run it inline
pub struct JobRejected {
    pub job: Job,
    pub reason: String,
}

impl std::fmt::Debug for JobRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRejected")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

/// Bounded worker pool with a join point
pub trait JobPartner: Send + Sync {
    fn submit(&self, job: Job) -> std::result::Result<(), JobRejected>;

    /// Block until every job submitted so far has finished
    fn wait(&self);
}

/// Worker scenarios, each with its own pool and limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Preallocation,
    MutationCreate,
}

impl Scenario {
    pub fn name(self) -> &'static str {
        match self {
            Scenario::Preallocation => "prealloc",
            Scenario::MutationCreate => "create",
        }
    }

    pub fn limits(self, config: &MountingConfig) -> WorkerLimits {
        match self {
            Scenario::Preallocation => config.preallocation_workers,
            Scenario::MutationCreate => config.mutation_create_workers,
        }
    }
}

/// Runs every job on the submitting thread
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineJobPartner;

impl JobPartner for InlineJobPartner {
    fn submit(&self, job: Job) -> std::result::Result<(), JobRejected> {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
            error!(panic = %panic_message(payload.as_ref()), "inline job panicked");
        }
        Ok(())
    }

    fn wait(&self) {}
}

#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    done: Condvar,
}

impl InFlight {
    fn start(&self) {
        *self.count.lock() += 1;
    }

    fn finish(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.done.notify_all();
        }
    }
}

/// [`JobPartner`] backed by a dedicated rayon pool
pub struct RayonJobPartner {
    scenario: Scenario,
    pool: rayon::ThreadPool,
    in_flight: Arc<InFlight>,
    accepting: AtomicBool,
}

impl RayonJobPartner {
    pub fn new(scenario: Scenario, limits: WorkerLimits) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(limits.max_parallelism.max(1))
            .thread_name(move |i| format!("mount-{}-{i}", scenario.name()))
            .build()
            .map_err(|e| MountError::WorkerPool(e.to_string()))?;
        debug!(
            scenario = scenario.name(),
            threads = pool.current_num_threads(),
            priority = limits.priority,
            "worker pool ready"
        );

        Ok(Self {
            scenario,
            pool,
            in_flight: Arc::new(InFlight::default()),
            accepting: AtomicBool::new(true),
        })
    }

    pub fn in_flight(&self) -> usize {
        *self.in_flight.count.lock()
    }

    /// Refuse further submissions. Jobs already queued still run.
    pub fn shutdown(&self) {
        self.accepting.store(false, Ordering::Release);
    }
}

impl JobPartner for RayonJobPartner {
    fn submit(&self, job: Job) -> std::result::Result<(), JobRejected> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(JobRejected {
                job,
                reason: format!("{} pool is shut down", self.scenario.name()),
            });
        }

        self.in_flight.start();
        let in_flight = self.in_flight.clone();
        let scenario = self.scenario;
        self.pool.spawn(move || {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                error!(
                    scenario = scenario.name(),
                    panic = %panic_message(payload.as_ref()),
                    "worker job panicked"
                );
            }
            in_flight.finish();
        });
        Ok(())
    }

    fn wait(&self) {
        let mut count = self.in_flight.count.lock();
        while *count > 0 {
            self.in_flight.done.wait(&mut count);
        }
    }
}

/// Pick the partner for `scenario`. Without off-thread creation, or when the
/// pool cannot be built, jobs run inline.
pub fn job_partner_for(
    scenario: Scenario,
    config: &MountingConfig,
    capabilities: RuntimeCapabilities,
) -> Arc<dyn JobPartner> {
    if !capabilities.off_thread_creation {
        return Arc::new(InlineJobPartner);
    }
    match RayonJobPartner::new(scenario, scenario.limits(config)) {
        Ok(partner) => Arc::new(partner),
        Err(e) => {
            warn!(scenario = scenario.name(), error = %e, "falling back to inline jobs");
            Arc::new(InlineJobPartner)
        }
    }
}
