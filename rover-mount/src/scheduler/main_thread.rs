use parking_lot::Mutex;
use std::collections::VecDeque;

pub type MainTask = Box<dyn FnOnce() + Send + 'static>;

/// Posts work to the thread that owns the mounted tree
pub trait MainThreadExecutor: Send + Sync {
    fn run_on_main(&self, task: MainTask);
}

/// FIFO of main-thread work, drained by the host's UI loop
#[derive(Default)]
pub struct MainThreadQueue {
    tasks: Mutex<VecDeque<MainTask>>,
}

impl MainThreadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run queued tasks, including ones queued while draining, until the
    /// queue is empty. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let Some(task) = self.tasks.lock().pop_front() else {
                return ran;
            };
            task();
            ran += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

impl MainThreadExecutor for MainThreadQueue {
    fn run_on_main(&self, task: MainTask) {
        self.tasks.lock().push_back(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_runs_in_fifo_order() {
        let queue = MainThreadQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let log = log.clone();
            queue.run_on_main(Box::new(move || log.lock().push(n)));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.run_pending(), 3);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_tasks_queued_while_draining_also_run() {
        let queue = Arc::new(MainThreadQueue::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let inner_queue = queue.clone();
        let inner_log = log.clone();
        queue.run_on_main(Box::new(move || {
            inner_log.lock().push("outer");
            let log = inner_log.clone();
            inner_queue.run_on_main(Box::new(move || log.lock().push("inner")));
        }));

        assert_eq!(queue.run_pending(), 2);
        assert_eq!(*log.lock(), vec!["outer", "inner"]);
    }
}
