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

//! Shards.
//!
//! A shard owns an ordered list of slices (most recent last), the
//! layout descriptors every slice shares, and the term table that maps
//! terms onto its rows. Ingestion appends to the last slice and rolls a
//! new one when it fills; the shard mutex serialises exactly two
//! things - claiming a document slot and rolling a slice. Posting-bit
//! writes need no lock because each ingesting thread owns its document
//! slot exclusively until activation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use siftdb_core::row_id::RowId;
use siftdb_core::types::ShardId;

use crate::config::IndexConfig;
use crate::document_handle::DocumentHandle;
use crate::recycler::RecyclerHandle;
use crate::slice::{Slice, SliceLayout};
use crate::term_table::TermTable;

pub struct Shard {
    id: ShardId,
    term_table: Arc<TermTable>,
    layout: Arc<SliceLayout>,
    slices: Mutex<Vec<Arc<Slice>>>,
    recycler: RecyclerHandle,
    next_slice_id: AtomicU64,
    self_weak: Weak<Shard>,
}

impl Shard {
    pub fn new(
        id: ShardId,
        term_table: Arc<TermTable>,
        config: &IndexConfig,
        recycler: RecyclerHandle,
    ) -> Arc<Self> {
        let layout = Arc::new(SliceLayout::new(&term_table, config));
        debug!(
            shard = id,
            capacity = layout.capacity(),
            words = layout.total_words(),
            "shard created"
        );
        Arc::new_cyclic(|weak| Self {
            id,
            term_table,
            layout,
            slices: Mutex::new(Vec::new()),
            recycler,
            next_slice_id: AtomicU64::new(0),
            self_weak: weak.clone(),
        })
    }

    #[inline]
    pub fn id(&self) -> ShardId {
        self.id
    }

    #[inline]
    pub fn term_table(&self) -> &Arc<TermTable> {
        &self.term_table
    }

    #[inline]
    pub fn layout(&self) -> &Arc<SliceLayout> {
        &self.layout
    }

    /// The well-known publication row.
    pub fn document_active_row(&self) -> RowId {
        self.term_table.document_active_row()
    }

    /// Claim a document slot, rolling a fresh slice if the current one
    /// is full.
    pub fn allocate_document(&self) -> DocumentHandle {
        let mut slices = self.slices.lock();
        if let Some(last) = slices.last() {
            if let Some(index) = last.try_reserve_document() {
                return DocumentHandle::new(Arc::clone(last), index);
            }
        }

        let slice_id = self.next_slice_id.fetch_add(1, Ordering::Relaxed);
        let slice = Slice::new(
            ((self.id as u64) << 32) | slice_id,
            self.self_weak.clone(),
            Arc::clone(&self.layout),
            self.recycler.clone(),
        );
        let index = slice
            .try_reserve_document()
            .expect("fresh slice rejected its first document");
        slices.push(Arc::clone(&slice));
        DocumentHandle::new(slice, index)
    }

    /// Drop the shard's reference to a fully-expired slice. Called by
    /// the expiry that filled it; reaching here twice for one slice is
    /// a bug.
    pub fn retire_slice(&self, slice: &Arc<Slice>) {
        let mut slices = self.slices.lock();
        let position = slices
            .iter()
            .position(|s| Arc::ptr_eq(s, slice))
            .expect("slice retired twice");
        slices.remove(position);
        drop(slices);
        debug!(shard = self.id, slice_id = slice.slice_id(), "slice retired");
        slice.decrement_ref_count();
    }

    /// Snapshot of the current slices for a query pass.
    pub fn slices(&self) -> Vec<Arc<Slice>> {
        self.slices.lock().clone()
    }

    pub fn slice_count(&self) -> usize {
        self.slices.lock().len()
    }
}
