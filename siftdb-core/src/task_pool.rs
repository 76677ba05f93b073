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

//! Worker pool for asynchronous commands.
//!
//! Each worker runs the loop `while let Some(cmd) = queue.try_dequeue()`,
//! so shutting down the queue is all it takes to drain and stop the pool:
//! in-flight work runs to completion, nothing new is admitted, and the
//! workers exit when the backlog is gone. Dequeue order is FIFO; there is
//! no fairness guarantee beyond that.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::Result;
use crate::queue::BlockingQueue;

/// How a command wants to be scheduled by its host loop. `Synchronous`
/// commands run on the caller's thread, `Asynchronous` ones go through
/// the pool, `Exit` terminates the host loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Synchronous,
    Asynchronous,
    Exit,
}

/// A unit of work submitted to the pool.
pub trait Command: Send {
    fn command_type(&self) -> CommandType;

    /// Execute the command. Errors are recoverable: the pool logs them
    /// and keeps serving.
    fn execute(self: Box<Self>) -> Result<()>;
}

pub struct TaskPool {
    queue: Arc<BlockingQueue<Box<dyn Command>>>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskPool {
    /// Start `thread_count` workers over a queue of `capacity` pending
    /// commands.
    pub fn new(thread_count: usize, capacity: usize) -> Self {
        assert!(thread_count > 0, "TaskPool requires at least one worker");
        let queue = Arc::new(BlockingQueue::<Box<dyn Command>>::new(capacity));

        let workers = (0..thread_count)
            .map(|i| {
                let queue = Arc::clone(&queue);
                thread::Builder::new()
                    .name(format!("siftdb-worker-{i}"))
                    .spawn(move || {
                        while let Some(command) = queue.try_dequeue() {
                            if let Err(e) = command.execute() {
                                warn!("command failed: {e}");
                            }
                        }
                    })
                    .expect("failed to spawn task pool worker")
            })
            .collect();

        debug!(threads = thread_count, capacity, "task pool started");
        Self { queue, workers }
    }

    /// Submit a command, blocking while the queue is full. Returns false
    /// iff the pool is shutting down.
    pub fn try_enqueue(&self, command: Box<dyn Command>) -> bool {
        self.queue.try_enqueue(command)
    }

    /// Pending command count.
    pub fn backlog(&self) -> usize {
        self.queue.len()
    }

    /// Drain the queue and join every worker. Safe to call once.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.queue.shutdown();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("task pool stopped");
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
