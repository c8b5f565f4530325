#![allow(dead_code)]

use rover_mount::config::{MountingConfig, RuntimeCapabilities};
use rover_mount::instance::{BuiltinComponent, DefaultInstanceProvider, NativeComponentFactory};
use rover_mount::mutation::{Props, ShadowView};
use rover_mount::native::RecordingNodeApi;
use rover_mount::parallel::{ParallelComponentSet, Scenario, job_partner_for};
use rover_mount::prealloc::PreallocationQueue;
use rover_mount::scheduler::{FrameScheduler, MainThreadQueue, ManualVsync, SchedulerDelegate};
use rover_mount::{MountingManager, Mutation, SurfaceId, Transaction};
use serde_json::Value;
use std::sync::Arc;

/// Full mounting stack over the in-memory native API, with a hand-pumped
/// main thread and a hand-fired vsync
pub struct Harness {
    pub api: Arc<RecordingNodeApi>,
    pub factory: Arc<NativeComponentFactory>,
    pub queue: Arc<PreallocationQueue>,
    pub provider: Arc<DefaultInstanceProvider>,
    pub manager: Arc<MountingManager>,
    pub main: Arc<MainThreadQueue>,
    pub vsync: Arc<ManualVsync>,
    pub frames: Arc<FrameScheduler>,
    pub delegate: SchedulerDelegate,
}

impl Harness {
    pub fn new(capabilities: RuntimeCapabilities) -> Self {
        Self::with_config(capabilities, MountingConfig::default())
    }

    pub fn with_config(capabilities: RuntimeCapabilities, config: MountingConfig) -> Self {
        init_tracing();
        let api = Arc::new(RecordingNodeApi::new());
        let factory = Arc::new(NativeComponentFactory::new(api.clone()));
        let parallel = Arc::new(ParallelComponentSet::with_builtins());
        let queue = Arc::new(PreallocationQueue::new(
            job_partner_for(Scenario::Preallocation, &config, capabilities),
            parallel.clone(),
            capabilities,
        ));
        let provider = DefaultInstanceProvider::new(factory.clone(), queue.clone());
        let manager = MountingManager::builder(provider.clone())
            .parallel_components(parallel)
            .create_partner(job_partner_for(
                Scenario::MutationCreate,
                &config,
                capabilities,
            ))
            .capabilities(capabilities)
            .build();

        let main = Arc::new(MainThreadQueue::new());
        let vsync = Arc::new(ManualVsync::new());
        let frames = FrameScheduler::new(Some(vsync.clone()));
        let delegate = SchedulerDelegate::new(&manager, main.clone(), frames.clone(), config)
            .with_preallocation_queue(&queue);

        Self {
            api,
            factory,
            queue,
            provider,
            manager,
            main,
            vsync,
            frames,
            delegate,
        }
    }

    pub fn commit(&self, surface: i32, mutations: Vec<Mutation>) {
        self.delegate
            .scheduler_did_finish_transaction(Transaction::new(SurfaceId(surface), mutations));
    }

    /// Drain the main thread
    pub fn pump(&self) -> usize {
        self.main.run_pending()
    }

    /// Fire one vsync and drain whatever it posted to the main thread
    pub fn next_frame(&self) -> usize {
        self.vsync.fire(16_666_667);
        self.pump()
    }
}

/// Set ROVER_MOUNT_LOG (e.g. `debug`) to see the engine's events
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("ROVER_MOUNT_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

pub fn view(tag: i32) -> ShadowView {
    ShadowView::builtin(BuiltinComponent::View, tag)
}

pub fn text(tag: i32) -> ShadowView {
    ShadowView::builtin(BuiltinComponent::Text, tag)
}

pub fn image(tag: i32) -> ShadowView {
    ShadowView::builtin(BuiltinComponent::Image, tag)
}

pub fn with_opacity(view: ShadowView, opacity: i64) -> ShadowView {
    view.with_props(Props::new().with("opacity", Value::from(opacity)))
}

/// Create a root plus `children` views under it, in mount order
pub fn tree(root: i32, children: std::ops::Range<i32>) -> Vec<Mutation> {
    let mut mutations = vec![Mutation::create(view(root))];
    for (index, tag) in children.enumerate() {
        mutations.push(Mutation::create(view(tag)));
        mutations.push(Mutation::insert(view(root), view(tag), index));
    }
    mutations
}
