// SPDX-License-Identifier: AGPL-3.0-or-later
// SiftDB - Bit-Sliced Signature Search Engine
// Copyright (C) 2026 SiftDB contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Bounded blocking MPMC queue.
//!
//! `try_enqueue` blocks while the queue is at capacity, `try_dequeue`
//! blocks while it is empty; both return their failure value only once
//! the queue is shutting down. `shutdown` wakes every waiter, refuses
//! further enqueues, and blocks until the backlog drains, so after it
//! returns the queue is provably empty and quiescent.
//!
//! Invariant: once shutdown begins, an empty queue can never become
//! non-empty again - enqueues are rejected before touching the deque.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

struct Inner<T> {
    queue: VecDeque<T>,
    /// Shutdown has been requested; no further enqueues succeed.
    shutdown: bool,
    /// Shutdown has been requested and the queue has drained.
    finished: bool,
}

pub struct BlockingQueue<T> {
    inner: Mutex<Inner<T>>,
    /// Signalled when space frees up.
    space_cond: Condvar,
    /// Signalled when an item arrives.
    item_cond: Condvar,
    /// Signalled by the dequeuer that drains the last item after
    /// shutdown. Replaces the spin-wait the naive implementation of
    /// drain-on-shutdown invites.
    finished_cond: Condvar,
    capacity: usize,
}

impl<T> BlockingQueue<T> {
    /// Create a queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "BlockingQueue requires capacity > 0");
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(capacity),
                shutdown: false,
                finished: false,
            }),
            space_cond: Condvar::new(),
            item_cond: Condvar::new(),
            finished_cond: Condvar::new(),
            capacity,
        }
    }

    /// Enqueue `value`, blocking while the queue is full. Returns false
    /// iff the queue is shutting down (the value is dropped).
    pub fn try_enqueue(&self, value: T) -> bool {
        let mut inner = self.inner.lock();
        while inner.queue.len() >= self.capacity && !inner.shutdown {
            self.space_cond.wait(&mut inner);
        }
        if inner.shutdown {
            return false;
        }
        inner.queue.push_back(value);
        drop(inner);
        self.item_cond.notify_one();
        true
    }

    /// Dequeue the oldest item, blocking while the queue is empty.
    /// Returns None iff the queue has shut down and drained.
    pub fn try_dequeue(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        while inner.queue.is_empty() && !inner.shutdown {
            self.item_cond.wait(&mut inner);
        }
        if inner.shutdown && inner.queue.is_empty() {
            if !inner.finished {
                inner.finished = true;
                self.finished_cond.notify_all();
            }
            return None;
        }
        let value = inner.queue.pop_front();
        if inner.shutdown && inner.queue.is_empty() {
            inner.finished = true;
            self.finished_cond.notify_all();
        }
        drop(inner);
        self.space_cond.notify_one();
        value
    }

    /// Refuse further enqueues, wake all waiters, and block until every
    /// queued item has been dequeued. Shutting down twice is a bug.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        assert!(!inner.shutdown, "BlockingQueue shut down twice");
        inner.shutdown = true;
        if inner.queue.is_empty() {
            inner.finished = true;
        }
        self.item_cond.notify_all();
        self.space_cond.notify_all();
        while !inner.finished {
            self.finished_cond.wait(&mut inner);
        }
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once shutdown has been requested.
    pub fn is_shut_down(&self) -> bool {
        self.inner.lock().shutdown
    }
}

impl<T> Drop for BlockingQueue<T> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        assert!(
            inner.shutdown && inner.finished,
            "BlockingQueue dropped without completing shutdown"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_single_thread() {
        let queue = BlockingQueue::new(8);
        for i in 0..5 {
            assert!(queue.try_enqueue(i));
        }
        for i in 0..5 {
            assert_eq!(queue.try_dequeue(), Some(i));
        }
        queue.shutdown();
        assert_eq!(queue.try_dequeue(), None);
    }

    #[test]
    fn test_enqueue_after_shutdown_fails() {
        let queue = BlockingQueue::new(4);
        queue.shutdown();
        assert!(!queue.try_enqueue(1));
        assert_eq!(queue.try_dequeue(), None);
    }

    #[test]
    fn test_shutdown_drains_backlog() {
        // Capacity 1: the producer is throttled by the consumer. 100 in,
        // 50 out, then the producer finishes and shuts down; the consumer
        // must observe the remaining 50 in order, then the terminal None.
        let queue = Arc::new(BlockingQueue::new(1));

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..100u32 {
                    assert!(queue.try_enqueue(i));
                }
                queue.shutdown();
            })
        };

        for i in 0..50u32 {
            assert_eq!(queue.try_dequeue(), Some(i));
        }
        let mut rest = Vec::new();
        while let Some(v) = queue.try_dequeue() {
            rest.push(v);
        }
        assert_eq!(rest, (50..100u32).collect::<Vec<_>>());
        assert_eq!(queue.try_dequeue(), None);
        producer.join().unwrap();
    }

    #[test]
    fn test_producers_consumers_totals() {
        const PRODUCERS: u32 = 4;
        const PER_PRODUCER: u32 = 250;
        let queue = Arc::new(BlockingQueue::new(16));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        assert!(queue.try_enqueue((p, i)));
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(v) = queue.try_dequeue() {
                        seen.push(v);
                    }
                    seen
                })
            })
            .collect();

        for p in producers {
            p.join().unwrap();
        }
        queue.shutdown();

        let mut all: Vec<(u32, u32)> = Vec::new();
        for c in consumers {
            let seen = c.join().unwrap();
            // Per-producer FIFO: within one consumer, each producer's
            // items appear in increasing order.
            for p in 0..PRODUCERS {
                let ordered: Vec<u32> =
                    seen.iter().filter(|(q, _)| *q == p).map(|&(_, i)| i).collect();
                assert!(ordered.windows(2).all(|w| w[0] < w[1]));
            }
            all.extend(seen);
        }
        assert_eq!(all.len(), (PRODUCERS * PER_PRODUCER) as usize);
    }

    #[test]
    #[should_panic(expected = "without completing shutdown")]
    fn test_drop_without_shutdown_panics() {
        let queue: BlockingQueue<u32> = BlockingQueue::new(2);
        drop(queue);
    }
}
