//! Drain-once FIFO of tasks shared by the workers.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use syncwarden_common::Task;

/// Thread-safe task queue, filled before the workers start.
///
/// Every task is handed out at most once; once empty the queue stays empty.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl TaskQueue {
    /// Create a queue holding `tasks` in arrival order.
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks.into_iter().collect()),
        }
    }

    /// Take the next task, or `None` when drained.
    pub fn try_pop(&self) -> Option<Task> {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::tests::task;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_pops_in_arrival_order() {
        let queue = TaskQueue::from_tasks(vec![task("1.json"), task("2.json")]);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.try_pop().unwrap().id.as_str(), "1.json");
        assert_eq!(queue.try_pop().unwrap().id.as_str(), "2.json");
        assert!(queue.try_pop().is_none());
        assert!(queue.try_pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_concurrent_pops_deliver_each_task_once() {
        let queue = Arc::new(TaskQueue::from_tasks(
            (0..200).map(|i| task(&format!("{}.json", i))),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(task) = queue.try_pop() {
                        seen.push(task.id.to_string());
                    }
                    seen
                })
            })
            .collect();

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }
        let unique: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(all.len(), 200);
        assert_eq!(unique.len(), 200);
    }
}
