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

//! Slice recycler.
//!
//! A single background thread is the exclusive destroyer of slices.
//! When a slice's last logical reference is released it is posted here;
//! owner threads never free buffers themselves, so a query that raced
//! the final expiry can finish against memory that is still intact.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use tracing::{debug, warn};

use crate::slice::Slice;

enum Message {
    Retire(Arc<Slice>),
    Shutdown,
}

/// Cloneable submission side of the recycler.
#[derive(Clone)]
pub struct RecyclerHandle {
    tx: Sender<Message>,
}

impl RecyclerHandle {
    /// Queue a slice for destruction.
    pub fn schedule(&self, slice: Arc<Slice>) {
        if let Err(e) = self.tx.send(Message::Retire(slice)) {
            // The recycler already stopped; destroy inline.
            warn!("recycler stopped, destroying slice inline");
            drop(e);
        }
    }
}

pub struct Recycler {
    tx: Sender<Message>,
    thread: Option<JoinHandle<()>>,
}

impl Recycler {
    pub fn start() -> Self {
        let (tx, rx) = unbounded();
        let thread = thread::Builder::new()
            .name("siftdb-recycler".into())
            .spawn(move || {
                while let Ok(message) = rx.recv() {
                    match message {
                        Message::Retire(slice) => {
                            debug!(
                                slice_id = slice.slice_id(),
                                words = slice.buffer().len(),
                                "recycling slice"
                            );
                            drop(slice);
                        }
                        Message::Shutdown => break,
                    }
                }
            })
            .expect("failed to spawn recycler thread");
        debug!("recycler started");
        Self {
            tx,
            thread: Some(thread),
        }
    }

    pub fn handle(&self) -> RecyclerHandle {
        RecyclerHandle {
            tx: self.tx.clone(),
        }
    }

    /// Process everything already queued, then stop the thread.
    pub fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.tx.send(Message::Shutdown);
            let _ = thread.join();
            debug!("recycler stopped");
        }
    }
}

impl Drop for Recycler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
