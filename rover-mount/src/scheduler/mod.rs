mod frame;
mod load_window;
mod main_thread;
mod split;

pub use frame::{FrameScheduler, FrameTask, ManualVsync, VsyncCallback, VsyncSource};
pub use load_window::SurfaceLoadTracker;
pub use main_thread::{MainTask, MainThreadExecutor, MainThreadQueue};
pub use split::{SplitPlan, split_index, split_non_create};

use crate::config::{MountingConfig, RuntimeCapabilities};
use crate::mounting::{MountReport, MountingManager};
use crate::mutation::{Mutation, MutationList, ShadowView, SurfaceId, Transaction};
use crate::prealloc::{PreallocationQueue, PreallocationRequest};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Entry point for committed transactions.
///
/// Decides which thread and which frame each part of a transaction is
/// applied on, then hands the work to the [`MountingManager`].
pub struct SchedulerDelegate {
    mounting_manager: Weak<MountingManager>,
    main_thread: Arc<dyn MainThreadExecutor>,
    frames: Arc<FrameScheduler>,
    preallocation_queue: Option<Weak<PreallocationQueue>>,
    load_tracker: SurfaceLoadTracker,
    config: MountingConfig,
    capabilities: RuntimeCapabilities,
}

impl SchedulerDelegate {
    pub fn new(
        mounting_manager: &Arc<MountingManager>,
        main_thread: Arc<dyn MainThreadExecutor>,
        frames: Arc<FrameScheduler>,
        config: MountingConfig,
    ) -> Self {
        Self {
            mounting_manager: Arc::downgrade(mounting_manager),
            main_thread,
            frames,
            preallocation_queue: None,
            load_tracker: SurfaceLoadTracker::new(config.load_window),
            capabilities: mounting_manager.capabilities(),
            config,
        }
    }

    pub fn with_preallocation_queue(mut self, queue: &Arc<PreallocationQueue>) -> Self {
        self.preallocation_queue = Some(Arc::downgrade(queue));
        self
    }

    pub fn scheduler_did_finish_transaction(&self, transaction: Transaction) {
        let transaction = Arc::new(transaction);
        debug!(
            surface = transaction.surface_id.0,
            mutations = transaction.mutations.len(),
            "transaction finished"
        );

        let do_mount = Arc::clone(&transaction);
        self.perform_on_main_thread(move |manager| manager.do_mount(&do_mount.mutations));

        if self.capabilities.parallel_scheduling {
            self.mount_parallel(&transaction);
        } else {
            self.mount_serial(&transaction);
        }
        log_telemetry(&transaction);

        if let Some(manager) = self.mounting_manager.upgrade() {
            manager.clear_preallocation_request_queue();
        }
    }

    /// Fan eligible Creates out on the calling thread, then apply everything
    /// else on the main thread, deferring the tail of a large batch by one frame.
    fn mount_parallel(&self, transaction: &Arc<Transaction>) {
        let Some(manager) = self.mounting_manager.upgrade() else {
            return;
        };
        let (main_creates, others, report) = fan_out_creates(&manager, &transaction.mutations);
        if !report.is_clean() {
            warn!(
                surface = transaction.surface_id.0,
                applied = report.applied,
                failed = report.failures.len(),
                "off-thread creates failed"
            );
        }
        drop(manager);

        self.perform_on_main_thread(move |manager| {
            manager.did_mount(&main_creates);
        });

        if self
            .load_tracker
            .is_in_initial_load_window(transaction.surface_id)
        {
            let all = Arc::clone(transaction);
            self.perform_on_main_thread(move |manager| {
                manager.did_mount(&others);
                manager.finalize_mutation_updates(&all.mutations);
            });
            self.perform_on_main_thread(|manager| manager.clear_preallocated_views());
            return;
        }

        let plan = split_non_create(&others, &self.config.split);
        let all = Arc::clone(transaction);
        if plan.enabled {
            debug!(
                batch_a = plan.batch_a.len(),
                batch_b = plan.batch_b.len(),
                "deferring mutation tail to next frame"
            );
            let SplitPlan {
                batch_a, batch_b, ..
            } = plan;
            self.perform_on_main_thread(move |manager| {
                manager.did_mount(&batch_a);
            });
            self.perform_on_main_thread_next_frame(move |manager| {
                manager.did_mount(&batch_b);
                manager.finalize_mutation_updates(&all.mutations);
                manager.clear_preallocated_views();
            });
        } else {
            self.perform_on_main_thread(move |manager| {
                manager.did_mount(&others);
                manager.finalize_mutation_updates(&all.mutations);
            });
            self.perform_on_main_thread(|manager| manager.clear_preallocated_views());
        }
    }

    /// Post Creates in fixed-size fragments, then the rest of the transaction
    fn mount_serial(&self, transaction: &Arc<Transaction>) {
        let (creates, others): (MutationList, MutationList) = transaction
            .mutations
            .iter()
            .cloned()
            .partition(Mutation::is_create);

        for fragment in creates.chunks(self.config.create_fragment_size.max(1)) {
            let fragment = fragment.to_vec();
            self.perform_on_main_thread(move |manager| {
                manager.did_mount(&fragment);
            });
        }

        let all = Arc::clone(transaction);
        self.perform_on_main_thread(move |manager| {
            manager.did_mount(&others);
            manager.finalize_mutation_updates(&all.mutations);
        });
        self.perform_on_main_thread(|manager| manager.clear_preallocated_views());
    }

    pub fn scheduler_did_request_preliminary_view_allocation(
        &self,
        surface: SurfaceId,
        request: PreallocationRequest,
    ) {
        let Some(queue) = self.preallocation_queue.as_ref().and_then(Weak::upgrade) else {
            return;
        };
        debug!(surface = surface.0, tag = request.tag.0, "preliminary view allocation");
        queue.push(request);
    }

    pub fn scheduler_did_dispatch_command(&self, view: ShadowView, command: String, args: Value) {
        self.perform_on_main_thread(move |manager| {
            manager.dispatch_command(&view, &command, &args)
        });
    }

    pub fn scheduler_did_send_accessibility_event(&self, view: ShadowView, event_type: String) {
        self.perform_on_main_thread(move |manager| {
            manager.send_accessibility_event(view.tag, &event_type)
        });
    }

    pub fn scheduler_did_set_is_js_responder(
        &self,
        view: ShadowView,
        is_js_responder: bool,
        block_native_responder: bool,
    ) {
        self.perform_on_main_thread(move |manager| {
            manager.set_is_js_responder(&view, is_js_responder, block_native_responder)
        });
    }

    /// Runs `f` on the main thread if the manager is still alive by then
    fn perform_on_main_thread<F>(&self, f: F)
    where
        F: FnOnce(&MountingManager) + Send + 'static,
    {
        let manager = self.mounting_manager.clone();
        self.main_thread.run_on_main(Box::new(move || {
            if let Some(manager) = manager.upgrade() {
                f(&manager);
            }
        }));
    }

    fn perform_on_main_thread_next_frame<F>(&self, f: F)
    where
        F: FnOnce(&MountingManager) + Send + 'static,
    {
        let manager = self.mounting_manager.clone();
        let main_thread = Arc::clone(&self.main_thread);
        self.frames.post(Box::new(move || {
            main_thread.run_on_main(Box::new(move || {
                if let Some(manager) = manager.upgrade() {
                    f(&manager);
                }
            }));
        }));
    }
}

/// Run the parallel-safe Creates of `mutations` on the manager's create
/// partner and join them. Returns the Creates left for the main thread, every
/// other mutation in order, and the outcome of the off-thread Creates.
fn fan_out_creates(
    manager: &Arc<MountingManager>,
    mutations: &[Mutation],
) -> (MutationList, MutationList, MountReport) {
    let partner = Arc::clone(manager.create_partner());
    let parallel = manager.parallel_components();
    let report = Arc::new(Mutex::new(MountReport::default()));

    let mut main_creates = MutationList::new();
    let mut others = MutationList::new();
    let mut fanned_out = false;
    for mutation in mutations {
        if !mutation.is_create() {
            others.push(mutation.clone());
            continue;
        }
        let view = &mutation.new_child;
        if !parallel.is_eligible(view.component_handle, &view.component_name) {
            main_creates.push(mutation.clone());
            continue;
        }

        let job_manager = Arc::clone(manager);
        let job_mutation = mutation.clone();
        let job_report = Arc::clone(&report);
        let submitted = partner.submit(Box::new(move || {
            let result = job_manager.apply_isolated(&job_mutation);
            job_report.lock().record(&job_mutation, result);
        }));
        match submitted {
            Ok(()) => fanned_out = true,
            Err(rejected) => {
                warn!(tag = view.tag.0, reason = %rejected.reason, "create job rejected, running inline");
                (rejected.job)();
            }
        }
    }
    if fanned_out {
        partner.wait();
    }

    let report = std::mem::take(&mut *report.lock());
    (main_creates, others, report)
}

fn log_telemetry(transaction: &Transaction) {
    let telemetry = &transaction.telemetry;
    info!(
        target: "rover::mount::telemetry",
        surface = transaction.surface_id.0,
        mutations = transaction.mutations.len(),
        commit_ms = telemetry.commit_ms(),
        diff_ms = telemetry.diff_ms(),
        layout_ms = telemetry.layout_ms(),
        "transaction scheduled"
    );
}
