use crate::scheduler::task::PinnedTask;

use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicPtr, Ordering};

struct Node {
    task: Arc<PinnedTask>,
    next: *mut Node,
}

/// Per-worker queue of tasks pinned to that worker.
///
/// Any thread may push (lock-free, compare-and-swap on the head); only
/// the owning worker drains. Draining detaches the whole chain with a
/// single swap, so consumers never race producers on individual nodes
/// and the structure is immune to ABA.
pub(crate) struct PinnedList {
    /// Most recently pushed node, or null.
    head: AtomicPtr<Node>,
}

// Safety: nodes are only reachable through `head` and are owned by
// whichever thread detaches them; `PinnedTask` is `Send + Sync`.
unsafe impl Send for PinnedList {}
unsafe impl Sync for PinnedList {}

impl PinnedList {
    /// Creates an empty list.
    pub(crate) fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Pushes a task onto the head of the list.
    pub(crate) fn push(&self, task: Arc<PinnedTask>) {
        let node = Box::into_raw(Box::new(Node {
            task,
            next: ptr::null_mut(),
        }));

        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            // Safety: `node` is not yet published and still owned here.
            unsafe {
                (*node).next = head;
            }

            match self
                .head
                .compare_exchange_weak(head, node, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(current) => head = current,
            }
        }
    }

    /// Detaches every queued task, oldest first.
    pub(crate) fn take_all(&self) -> Vec<Arc<PinnedTask>> {
        let mut current = self.head.swap(ptr::null_mut(), Ordering::Acquire);
        let mut tasks = Vec::new();

        while !current.is_null() {
            // Safety: the swap transferred ownership of the whole chain.
            let node = unsafe { Box::from_raw(current) };
            current = node.next;
            tasks.push(node.task);
        }

        tasks.reverse();
        tasks
    }

    /// Returns `true` if no task is queued at the time of the call.
    pub(crate) fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }
}

impl Drop for PinnedList {
    fn drop(&mut self) {
        drop(self.take_all());
    }
}
