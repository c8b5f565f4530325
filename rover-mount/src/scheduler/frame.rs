//! Coalesces "after the next frame" work onto one vsync callback.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

pub type FrameTask = Box<dyn FnOnce() + Send + 'static>;
pub type VsyncCallback = Box<dyn FnOnce(i64) + Send + 'static>;

/// Platform vsync primitive
pub trait VsyncSource: Send + Sync {
    /// Ask for `callback` on the next frame, called with the frame timestamp
    /// in nanoseconds. Returns false when no frame can be requested.
    fn request_frame(&self, callback: VsyncCallback) -> bool;
}

/// Vsync source fired by hand, for headless hosts and tests
#[derive(Default)]
pub struct ManualVsync {
    callbacks: Mutex<Vec<VsyncCallback>>,
    unavailable: AtomicBool,
}

impl ManualVsync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make later frame requests fail
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::Release);
    }

    pub fn pending_requests(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Run every callback requested so far. Returns how many ran.
    pub fn fire(&self, timestamp_ns: i64) -> usize {
        let callbacks = std::mem::take(&mut *self.callbacks.lock());
        let count = callbacks.len();
        for callback in callbacks {
            callback(timestamp_ns);
        }
        count
    }
}

impl VsyncSource for ManualVsync {
    fn request_frame(&self, callback: VsyncCallback) -> bool {
        if self.unavailable.load(Ordering::Acquire) {
            return false;
        }
        self.callbacks.lock().push(callback);
        true
    }
}

/// Single-flight "run after next frame" dispatcher.
///
/// Tasks posted before a vsync fires all run on that vsync, in posting order.
/// At most one frame request is outstanding. Without a vsync source tasks
/// run immediately.
pub struct FrameScheduler {
    this: Weak<FrameScheduler>,
    vsync: Option<Arc<dyn VsyncSource>>,
    pending: Mutex<Vec<FrameTask>>,
    request_in_flight: AtomicBool,
}

impl FrameScheduler {
    pub fn new(vsync: Option<Arc<dyn VsyncSource>>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            vsync,
            pending: Mutex::new(Vec::new()),
            request_in_flight: AtomicBool::new(false),
        })
    }

    pub fn post(&self, task: FrameTask) {
        self.pending.lock().push(task);
        self.request_if_needed();
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_request_in_flight(&self) -> bool {
        self.request_in_flight.load(Ordering::Acquire)
    }

    fn request_if_needed(&self) {
        if self
            .request_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        if let Some(vsync) = &self.vsync {
            let this = self.this.clone();
            let requested = vsync.request_frame(Box::new(move |timestamp| {
                // Dropped scheduler: the callback is a no-op
                if let Some(scheduler) = this.upgrade() {
                    trace!(timestamp, "frame callback");
                    scheduler.request_in_flight.store(false, Ordering::Release);
                    scheduler.flush();
                }
            }));
            if requested {
                return;
            }
        }

        self.request_in_flight.store(false, Ordering::Release);
        self.flush();
    }

    fn flush(&self) {
        let tasks = std::mem::take(&mut *self.pending.lock());
        for task in tasks {
            task();
        }
        let has_more = !self.pending.lock().is_empty();
        if has_more {
            self.request_if_needed();
        }
    }
}
