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

//! Slices: fixed-capacity document blocks.
//!
//! A slice is one contiguous buffer of 64-bit words holding every row
//! table of its shard plus the doc table. [`SliceLayout`] computes the
//! descriptors once per shard; every slice of the shard shares them.
//!
//! Lifecycle counters:
//! - `allocated` (mutex, claimed under the shard lock):
//!   `unallocated + committed = capacity`
//! - `expired` (atomic): `expired <= committed`; the expiry that brings
//!   it to `capacity` makes the slice eligible for retirement
//! - `ref_count` (atomic): logical references; the decrement that
//!   reaches zero posts the slice to the recycler, and reaching zero
//!   twice is a fatal bug
//!
//! The document-active row (rank 0, row 0) is written with Release and
//! read with Acquire; it is the only cross-thread publication point.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use parking_lot::Mutex;
use tracing::debug;

use siftdb_core::error::{Result, SiftDbError};
use siftdb_core::row_id::RowId;
use siftdb_core::types::{DocId, DocIndex, Rank, MAX_RANK};
use siftdb_core::SIFTDB_MAGIC;

use crate::config::IndexConfig;
use crate::doc_table::DocTableDescriptor;
use crate::recycler::RecyclerHandle;
use crate::row_table::RowTableDescriptor;
use crate::shard::Shard;
use crate::term_table::{TermTable, RANK_COUNT};

/// Backup format version.
const SLICE_BACKUP_VERSION: u8 = 1;

/// Shared, immutable description of how a shard's slices are laid out.
pub struct SliceLayout {
    capacity: usize,
    row_tables: Vec<RowTableDescriptor>,
    rank_index: [Option<usize>; RANK_COUNT],
    doc_table: DocTableDescriptor,
    total_words: usize,
}

impl SliceLayout {
    /// Compute the layout for a shard using `term_table`'s row counts.
    /// The requested slice capacity is rounded up so every active rank
    /// covers a whole number of words.
    pub fn new(term_table: &TermTable, config: &IndexConfig) -> Self {
        let max_rank = (0..=MAX_RANK)
            .filter(|&r| term_table.total_row_count(r) > 0)
            .max()
            .expect("term table has no rows at any rank");
        let alignment = 64usize << max_rank;
        let capacity = config.documents_per_slice.div_ceil(alignment) * alignment;

        let mut row_tables = Vec::new();
        let mut rank_index = [None; RANK_COUNT];
        let mut cursor = 0;
        for rank in 0..=MAX_RANK {
            let rows = term_table.total_row_count(rank);
            if rows == 0 {
                continue;
            }
            let descriptor = RowTableDescriptor::new(rank, rows, capacity, cursor);
            cursor += descriptor.total_words();
            rank_index[rank as usize] = Some(row_tables.len());
            row_tables.push(descriptor);
        }

        let doc_table = DocTableDescriptor::new(
            capacity,
            cursor,
            &config.fixed_blob_sizes,
            config.variable_blob_count,
            config.variable_blob_heap_bytes,
        );
        let total_words = cursor + doc_table.total_words();

        Self {
            capacity,
            row_tables,
            rank_index,
            doc_table,
            total_words,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn doc_table(&self) -> &DocTableDescriptor {
        &self.doc_table
    }

    /// Descriptor for `rank`. Asking for an inactive rank is a plan bug.
    #[inline]
    pub fn row_table(&self, rank: Rank) -> &RowTableDescriptor {
        let slot = self.rank_index[rank as usize]
            .unwrap_or_else(|| panic!("shard has no rank-{rank} rows"));
        &self.row_tables[slot]
    }

    pub fn active_ranks(&self) -> impl Iterator<Item = Rank> + '_ {
        self.row_tables.iter().map(|t| t.rank())
    }

    pub fn total_words(&self) -> usize {
        self.total_words
    }

    fn rank_bitmap(&self) -> u8 {
        self.row_tables.iter().fold(0u8, |b, t| b | (1u8 << t.rank()))
    }
}

pub struct Slice {
    slice_id: u64,
    shard: Weak<Shard>,
    layout: Arc<SliceLayout>,
    buffer: Vec<AtomicU64>,
    allocated: Mutex<usize>,
    expired: AtomicUsize,
    ref_count: AtomicU32,
    recycler: RecyclerHandle,
}

impl Slice {
    /// Allocate a zeroed slice. The creating index holds the initial
    /// logical reference.
    pub fn new(
        slice_id: u64,
        shard: Weak<Shard>,
        layout: Arc<SliceLayout>,
        recycler: RecyclerHandle,
    ) -> Arc<Self> {
        let buffer = (0..layout.total_words()).map(|_| AtomicU64::new(0)).collect();
        debug!(slice_id, words = layout.total_words(), "slice allocated");
        Arc::new(Self {
            slice_id,
            shard,
            layout,
            buffer,
            allocated: Mutex::new(0),
            expired: AtomicUsize::new(0),
            ref_count: AtomicU32::new(1),
            recycler,
        })
    }

    #[inline]
    pub fn slice_id(&self) -> u64 {
        self.slice_id
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.layout.capacity()
    }

    #[inline]
    pub fn layout(&self) -> &SliceLayout {
        &self.layout
    }

    #[inline]
    pub fn buffer(&self) -> &[AtomicU64] {
        &self.buffer
    }

    pub fn shard(&self) -> Option<Arc<Shard>> {
        self.shard.upgrade()
    }

    // ------------------------------------------------------------------
    // Document slots
    // ------------------------------------------------------------------

    /// Claim the next free document slot. Called under the shard mutex.
    pub fn try_reserve_document(&self) -> Option<DocIndex> {
        let mut allocated = self.allocated.lock();
        if *allocated == self.capacity() {
            return None;
        }
        let index = *allocated;
        *allocated += 1;
        Some(index)
    }

    pub fn committed(&self) -> usize {
        *self.allocated.lock()
    }

    pub fn unallocated(&self) -> usize {
        self.capacity() - self.committed()
    }

    pub fn expired(&self) -> usize {
        self.expired.load(Ordering::Relaxed)
    }

    /// Record one document expiry. Returns true for the expiry that
    /// fills the slice, i.e. when it becomes eligible for retirement.
    pub fn expire_document(&self) -> bool {
        let expired = self.expired.fetch_add(1, Ordering::Relaxed) + 1;
        let committed = self.committed();
        assert!(
            expired <= committed,
            "slice {}: {expired} expiries for {committed} committed documents",
            self.slice_id
        );
        expired == self.capacity()
    }

    // ------------------------------------------------------------------
    // Logical reference count
    // ------------------------------------------------------------------

    pub fn increment_ref_count(&self) {
        self.ref_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Release one logical reference; the release that reaches zero
    /// posts the slice to the recycler.
    pub fn decrement_ref_count(self: &Arc<Self>) {
        let previous = self.ref_count.fetch_sub(1, Ordering::AcqRel);
        assert!(
            previous > 0,
            "slice {} refcount hit zero more than once",
            self.slice_id
        );
        if previous == 1 {
            debug!(slice_id = self.slice_id, "slice released, scheduling recycle");
            self.recycler.schedule(Arc::clone(self));
        }
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count.load(Ordering::Relaxed)
    }

    // ------------------------------------------------------------------
    // Bits
    // ------------------------------------------------------------------

    /// Set a posting bit. Relaxed: the document is unpublished or owned.
    pub fn set_posting_bit(&self, row: RowId, doc: DocIndex) {
        self.layout
            .row_table(row.rank())
            .set_bit(&self.buffer, row.index(), doc);
    }

    pub fn get_bit(&self, row: RowId, doc: DocIndex) -> bool {
        self.layout
            .row_table(row.rank())
            .get_bit(&self.buffer, row.index(), doc)
    }

    /// Publish a document: Release-set its active bit. Returns the
    /// previous value.
    pub fn set_active_bit(&self, doc: DocIndex) -> bool {
        self.layout
            .row_table(0)
            .set_bit_with(&self.buffer, 0, doc, Ordering::Release)
    }

    /// Retract a document: Release-clear its active bit. Returns the
    /// previous value.
    pub fn clear_active_bit(&self, doc: DocIndex) -> bool {
        self.layout
            .row_table(0)
            .clear_bit_with(&self.buffer, 0, doc, Ordering::Release)
    }

    /// Acquire-read of one document's active bit.
    pub fn is_document_active(&self, doc: DocIndex) -> bool {
        self.layout
            .row_table(0)
            .get_bit_with(&self.buffer, 0, doc, Ordering::Acquire)
    }

    /// Acquire-load of a 64-document window of the active row.
    pub fn active_word(&self, word_index: usize) -> u64 {
        self.layout
            .row_table(0)
            .get_word(&self.buffer, 0, word_index, Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // Backup
    // ------------------------------------------------------------------

    /// Write the backup image: header, then the buffer verbatim (row
    /// tables in rank order followed by the doc table, which is exactly
    /// the buffer's layout order).
    pub fn write_backup(&self, writer: &mut dyn Write) -> Result<()> {
        writer.write_all(&SIFTDB_MAGIC)?;
        writer.write_u8(SLICE_BACKUP_VERSION)?;
        writer.write_u64::<LittleEndian>(self.capacity() as u64)?;

        let committed = self.committed();
        writer.write_u64::<LittleEndian>(committed as u64)?;
        writer.write_u64::<LittleEndian>(self.expired() as u64)?;

        let (min_id, max_id) = self.doc_id_range(committed);
        writer.write_u64::<LittleEndian>(min_id)?;
        writer.write_u64::<LittleEndian>(max_id)?;
        writer.write_u8(self.layout.rank_bitmap())?;

        for word in &self.buffer {
            writer.write_u64::<LittleEndian>(word.load(Ordering::Relaxed))?;
        }
        Ok(())
    }

    /// Read a backup written by [`write_backup`](Self::write_backup)
    /// into a fresh slice of the same shard layout.
    pub fn read_backup(
        reader: &mut dyn Read,
        slice_id: u64,
        shard: Weak<Shard>,
        layout: Arc<SliceLayout>,
        recycler: RecyclerHandle,
    ) -> Result<Arc<Self>> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != SIFTDB_MAGIC {
            return Err(SiftDbError::Format("bad slice backup magic".into()));
        }
        let version = reader.read_u8()?;
        if version != SLICE_BACKUP_VERSION {
            return Err(SiftDbError::VersionMismatch {
                expected: SLICE_BACKUP_VERSION as u32,
                actual: version as u32,
            });
        }
        let capacity = reader.read_u64::<LittleEndian>()? as usize;
        if capacity != layout.capacity() {
            return Err(SiftDbError::Format(format!(
                "slice backup capacity {capacity} does not match layout {}",
                layout.capacity()
            )));
        }
        let allocated = reader.read_u64::<LittleEndian>()? as usize;
        let expired = reader.read_u64::<LittleEndian>()? as usize;
        let _min_id = reader.read_u64::<LittleEndian>()?;
        let _max_id = reader.read_u64::<LittleEndian>()?;
        let bitmap = reader.read_u8()?;
        if bitmap != layout.rank_bitmap() {
            return Err(SiftDbError::Format(
                "slice backup rank set does not match layout".into(),
            ));
        }

        let mut buffer = Vec::with_capacity(layout.total_words());
        for _ in 0..layout.total_words() {
            buffer.push(AtomicU64::new(reader.read_u64::<LittleEndian>()?));
        }

        debug!(slice_id, allocated, expired, "slice restored from backup");
        Ok(Arc::new(Self {
            slice_id,
            shard,
            layout,
            buffer,
            allocated: Mutex::new(allocated),
            expired: AtomicUsize::new(expired),
            ref_count: AtomicU32::new(1),
            recycler,
        }))
    }

    fn doc_id_range(&self, committed: usize) -> (DocId, DocId) {
        let table = self.layout.doc_table();
        let mut min = DocId::MAX;
        let mut max = 0;
        for doc in 0..committed {
            let id = table.get_doc_id(&self.buffer, doc);
            min = min.min(id);
            max = max.max(id);
        }
        if committed == 0 {
            (0, 0)
        } else {
            (min, max)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recycler::Recycler;
    use crate::treatment::TermTreatment;
    use siftdb_core::term::Term;

    fn test_layout() -> Arc<SliceLayout> {
        let mut table = TermTable::new(TermTreatment::PrivateRank0, 0, 0);
        for word in ["a", "b", "c"] {
            table.register_term(Term::new(word, 0), 0.5);
        }
        let config = IndexConfig {
            documents_per_slice: 100,
            ..IndexConfig::default()
        };
        Arc::new(SliceLayout::new(&table, &config))
    }

    #[test]
    fn test_layout_rounds_capacity() {
        let layout = test_layout();
        // Only rank 0 is active, so capacity rounds to the next 64.
        assert_eq!(layout.capacity(), 128);
        assert_eq!(layout.active_ranks().collect::<Vec<_>>(), vec![0]);
        // 4 rows (active + three private), two words each.
        assert_eq!(layout.row_table(0).row_count(), 4);
        assert_eq!(layout.row_table(0).words_per_row(), 2);
    }

    #[test]
    fn test_reserve_until_full() {
        let recycler = Recycler::start();
        let layout = test_layout();
        let slice = Slice::new(1, Weak::new(), layout, recycler.handle());

        for expected in 0..slice.capacity() {
            assert_eq!(slice.try_reserve_document(), Some(expected));
        }
        assert_eq!(slice.try_reserve_document(), None);
        assert_eq!(slice.unallocated(), 0);
        slice.decrement_ref_count();
    }

    #[test]
    fn test_expiry_fills_slice() {
        let recycler = Recycler::start();
        let layout = test_layout();
        let slice = Slice::new(2, Weak::new(), layout, recycler.handle());

        let capacity = slice.capacity();
        for _ in 0..capacity {
            slice.try_reserve_document().unwrap();
        }
        for i in 0..capacity {
            let full = slice.expire_document();
            assert_eq!(full, i == capacity - 1);
        }
        slice.decrement_ref_count();
    }

    #[test]
    #[should_panic(expected = "refcount hit zero more than once")]
    fn test_refcount_double_zero_aborts() {
        let recycler = Recycler::start();
        let layout = test_layout();
        let slice = Slice::new(3, Weak::new(), layout, recycler.handle());
        slice.decrement_ref_count();
        slice.decrement_ref_count();
    }

    #[test]
    fn test_active_bit_publication() {
        let recycler = Recycler::start();
        let layout = test_layout();
        let slice = Slice::new(4, Weak::new(), layout, recycler.handle());

        assert!(!slice.is_document_active(7));
        assert!(!slice.set_active_bit(7));
        assert!(slice.is_document_active(7));
        assert_eq!(slice.active_word(0), 1 << 7);
        assert!(slice.clear_active_bit(7));
        assert!(!slice.is_document_active(7));
        slice.decrement_ref_count();
    }

    #[test]
    fn test_backup_roundtrip() {
        let recycler = Recycler::start();
        let layout = test_layout();
        let slice = Slice::new(5, Weak::new(), Arc::clone(&layout), recycler.handle());

        let doc = slice.try_reserve_document().unwrap();
        slice.layout().doc_table().set_doc_id(slice.buffer(), doc, 42);
        slice.set_posting_bit(RowId::new(0, 2), doc);
        slice.set_active_bit(doc);

        let mut bytes = Vec::new();
        slice.write_backup(&mut bytes).unwrap();

        let restored = Slice::read_backup(
            &mut bytes.as_slice(),
            6,
            Weak::new(),
            Arc::clone(&layout),
            recycler.handle(),
        )
        .unwrap();
        assert_eq!(restored.committed(), 1);
        assert!(restored.get_bit(RowId::new(0, 2), doc));
        assert!(restored.is_document_active(doc));
        assert_eq!(restored.layout().doc_table().get_doc_id(restored.buffer(), doc), 42);

        slice.decrement_ref_count();
        restored.decrement_ref_count();
    }
}
