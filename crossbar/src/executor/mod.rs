/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

//! The serial work queue components run on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

pub use task::{INLINE_TASK_ALIGN, INLINE_TASK_BYTES};
use task::Task;

mod task;

/// Shared handle to an executor. Two components are "on the same executor"
/// exactly when their handles point at the same allocation.
pub type ExecutorHandle = Arc<Executor>;

/// A serial FIFO work queue.
///
/// Tasks may be enqueued from any thread; [`execute`](Executor::execute)
/// drains the batch queued up to the moment of entry on the calling thread.
/// Only one thread may call `execute` at a time — that exclusivity is the
/// serial-queue contract the rest of the runtime builds its lock elision on,
/// and it is the caller's to uphold.
pub struct Executor {
    queue: Mutex<Vec<Task>>,
    // Batch under execution. Swapped with `queue` at the top of `execute` so
    // enqueues during the drain land in the next batch.
    drain: Mutex<Vec<Task>>,
    contentions: AtomicU64,
}

impl Executor {
    /// Creates an executor behind a shared handle.
    pub fn new() -> ExecutorHandle {
        Arc::new(Executor {
            queue: Mutex::new(Vec::new()),
            drain: Mutex::new(Vec::new()),
            contentions: AtomicU64::new(0),
        })
    }

    /// Enqueues a payload together with the function that consumes it.
    ///
    /// Thread-safe. Small payloads are stored inline in the task; larger
    /// ones take a single heap allocation. The payload is dropped exactly
    /// once whether or not the task ever runs.
    pub fn enqueue<P: Send + 'static>(&self, payload: P, run: fn(P)) {
        self.lock_queue().push(Task::new(payload, run));
    }

    /// Enqueues a closure. Convenience wrapper over [`enqueue`](Self::enqueue)
    /// with the closure itself as the payload.
    pub fn enqueue_fn<F: FnOnce() + Send + 'static>(&self, f: F) {
        self.enqueue(f, run_closure::<F>);
    }

    /// Drains the tasks that were queued before this call, in enqueue order.
    ///
    /// Tasks enqueued while the drain is in progress run in the next batch.
    pub fn execute(&self) {
        let mut batch = self.drain.lock();
        debug_assert!(batch.is_empty());
        {
            let mut queue = self.lock_queue();
            std::mem::swap(&mut *queue, &mut *batch);
        }
        for task in batch.drain(..) {
            task.run();
        }
    }

    /// Number of tasks currently waiting in the next batch.
    pub fn len(&self) -> usize {
        self.lock_queue().len()
    }

    /// Whether no tasks are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times the queue lock was contended. Observability only.
    pub fn lock_contentions(&self) -> u64 {
        self.contentions.load(Ordering::Relaxed)
    }

    fn lock_queue(&self) -> MutexGuard<'_, Vec<Task>> {
        match self.queue.try_lock() {
            Some(guard) => guard,
            None => {
                self.contentions.fetch_add(1, Ordering::Relaxed);
                self.queue.lock()
            }
        }
    }
}

fn run_closure<F: FnOnce()>(f: F) {
    f()
}
