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

//! Doc table descriptor.
//!
//! Per-document metadata inside the slice buffer:
//!
//! ```text
//! [ doc ids | fixed blobs | variable blob slots | heap cursor | heap ]
//! ```
//!
//! Fixed-size blobs live inline at word-rounded offsets. Variable-size
//! blobs bump-allocate from the heap at the region's tail; their slot
//! records (offset+1, length) packed in one word so a zeroed slot reads
//! as "not allocated". Blob contents are written only by the thread that
//! owns the document during ingestion; the document-active publication
//! makes them visible to readers.

use std::sync::atomic::{AtomicU64, Ordering};

use siftdb_core::error::{Result, SiftDbError};
use siftdb_core::types::{DocId, DocIndex};

/// Identifies one of the per-document variable-size blob slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableSizeBlobId(pub u8);

/// Identifies one of the per-document fixed-size blob slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSizeBlobId(pub u8);

#[derive(Debug, Clone)]
pub struct DocTableDescriptor {
    capacity: usize,
    word_offset: usize,
    fixed_sizes: Vec<usize>,
    fixed_offsets: Vec<usize>,
    fixed_words_per_doc: usize,
    variable_blob_count: usize,
    heap_words: usize,
}

impl DocTableDescriptor {
    pub fn new(
        capacity: usize,
        word_offset: usize,
        fixed_sizes: &[usize],
        variable_blob_count: u8,
        heap_bytes: usize,
    ) -> Self {
        let mut fixed_offsets = Vec::with_capacity(fixed_sizes.len());
        let mut fixed_words_per_doc = 0;
        for &size in fixed_sizes {
            fixed_offsets.push(fixed_words_per_doc);
            fixed_words_per_doc += size.div_ceil(8);
        }
        Self {
            capacity,
            word_offset,
            fixed_sizes: fixed_sizes.to_vec(),
            fixed_offsets,
            fixed_words_per_doc,
            variable_blob_count: variable_blob_count as usize,
            heap_words: heap_bytes.div_ceil(8),
        }
    }

    /// Words this table occupies in the slice buffer.
    pub fn total_words(&self) -> usize {
        self.capacity * (1 + self.fixed_words_per_doc + self.variable_blob_count)
            + 1
            + self.heap_words
    }

    pub fn word_offset(&self) -> usize {
        self.word_offset
    }

    // Region starts, as buffer indexes.

    #[inline]
    fn doc_id_word(&self, doc: DocIndex) -> usize {
        debug_assert!(doc < self.capacity);
        self.word_offset + doc
    }

    #[inline]
    fn fixed_word(&self, doc: DocIndex, blob: FixedSizeBlobId) -> usize {
        let id = blob.0 as usize;
        assert!(id < self.fixed_sizes.len(), "fixed blob id out of range");
        self.word_offset
            + self.capacity
            + doc * self.fixed_words_per_doc
            + self.fixed_offsets[id]
    }

    #[inline]
    fn variable_slot_word(&self, doc: DocIndex, blob: VariableSizeBlobId) -> usize {
        let id = blob.0 as usize;
        assert!(id < self.variable_blob_count, "variable blob id out of range");
        self.word_offset
            + self.capacity * (1 + self.fixed_words_per_doc)
            + doc * self.variable_blob_count
            + id
    }

    #[inline]
    fn heap_cursor_word(&self) -> usize {
        self.word_offset + self.capacity * (1 + self.fixed_words_per_doc + self.variable_blob_count)
    }

    #[inline]
    fn heap_start(&self) -> usize {
        self.heap_cursor_word() + 1
    }

    pub fn set_doc_id(&self, buffer: &[AtomicU64], doc: DocIndex, id: DocId) {
        buffer[self.doc_id_word(doc)].store(id, Ordering::Relaxed);
    }

    pub fn get_doc_id(&self, buffer: &[AtomicU64], doc: DocIndex) -> DocId {
        buffer[self.doc_id_word(doc)].load(Ordering::Relaxed)
    }

    /// Byte size of a fixed blob slot.
    pub fn fixed_blob_size(&self, blob: FixedSizeBlobId) -> usize {
        self.fixed_sizes[blob.0 as usize]
    }

    pub fn write_fixed_blob(
        &self,
        buffer: &[AtomicU64],
        doc: DocIndex,
        blob: FixedSizeBlobId,
        data: &[u8],
    ) {
        assert_eq!(
            data.len(),
            self.fixed_blob_size(blob),
            "fixed blob size mismatch"
        );
        store_bytes(buffer, self.fixed_word(doc, blob), data);
    }

    pub fn read_fixed_blob(
        &self,
        buffer: &[AtomicU64],
        doc: DocIndex,
        blob: FixedSizeBlobId,
    ) -> Vec<u8> {
        load_bytes(buffer, self.fixed_word(doc, blob), self.fixed_blob_size(blob))
    }

    /// Reserve `byte_size` bytes of heap for (doc, blob). Fails once the
    /// slice heap is exhausted; allocating a slot twice is a bug.
    pub fn allocate_variable_blob(
        &self,
        buffer: &[AtomicU64],
        doc: DocIndex,
        blob: VariableSizeBlobId,
        byte_size: usize,
    ) -> Result<()> {
        let slot = self.variable_slot_word(doc, blob);
        assert_eq!(
            buffer[slot].load(Ordering::Relaxed),
            0,
            "variable blob allocated twice"
        );
        let words = byte_size.div_ceil(8);
        let cursor = &buffer[self.heap_cursor_word()];
        let start = cursor.fetch_add(words as u64, Ordering::Relaxed) as usize;
        if start + words > self.heap_words {
            cursor.fetch_sub(words as u64, Ordering::Relaxed);
            return Err(SiftDbError::CapacityExhausted(
                "slice variable-blob heap full".into(),
            ));
        }
        let packed = ((start as u64 + 1) << 32) | byte_size as u64;
        buffer[slot].store(packed, Ordering::Relaxed);
        Ok(())
    }

    pub fn write_variable_blob(
        &self,
        buffer: &[AtomicU64],
        doc: DocIndex,
        blob: VariableSizeBlobId,
        data: &[u8],
    ) {
        let (start, len) = self
            .variable_blob_extent(buffer, doc, blob)
            .expect("variable blob written before allocation");
        assert_eq!(data.len(), len, "variable blob size mismatch");
        store_bytes(buffer, self.heap_start() + start, data);
    }

    pub fn read_variable_blob(
        &self,
        buffer: &[AtomicU64],
        doc: DocIndex,
        blob: VariableSizeBlobId,
    ) -> Option<Vec<u8>> {
        let (start, len) = self.variable_blob_extent(buffer, doc, blob)?;
        Some(load_bytes(buffer, self.heap_start() + start, len))
    }

    fn variable_blob_extent(
        &self,
        buffer: &[AtomicU64],
        doc: DocIndex,
        blob: VariableSizeBlobId,
    ) -> Option<(usize, usize)> {
        let packed = buffer[self.variable_slot_word(doc, blob)].load(Ordering::Relaxed);
        if packed == 0 {
            return None;
        }
        let start = (packed >> 32) as usize - 1;
        let len = (packed & 0xFFFF_FFFF) as usize;
        Some((start, len))
    }
}

/// Write `data` into consecutive words starting at `start_word`.
fn store_bytes(buffer: &[AtomicU64], start_word: usize, data: &[u8]) {
    for (i, chunk) in data.chunks(8).enumerate() {
        let mut bytes = [0u8; 8];
        bytes[..chunk.len()].copy_from_slice(chunk);
        buffer[start_word + i].store(u64::from_le_bytes(bytes), Ordering::Relaxed);
    }
}

/// Read `len` bytes from consecutive words starting at `start_word`.
fn load_bytes(buffer: &[AtomicU64], start_word: usize, len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut remaining = len;
    let mut word = start_word;
    while remaining > 0 {
        let bytes = buffer[word].load(Ordering::Relaxed).to_le_bytes();
        let take = remaining.min(8);
        out.extend_from_slice(&bytes[..take]);
        remaining -= take;
        word += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_and_buffer() -> (DocTableDescriptor, Vec<AtomicU64>) {
        let table = DocTableDescriptor::new(8, 0, &[4, 16], 2, 64);
        let buffer = (0..table.total_words()).map(|_| AtomicU64::new(0)).collect();
        (table, buffer)
    }

    #[test]
    fn test_doc_ids() {
        let (table, buf) = table_and_buffer();
        table.set_doc_id(&buf, 0, 42);
        table.set_doc_id(&buf, 7, 1234);
        assert_eq!(table.get_doc_id(&buf, 0), 42);
        assert_eq!(table.get_doc_id(&buf, 7), 1234);
        assert_eq!(table.get_doc_id(&buf, 3), 0);
    }

    #[test]
    fn test_fixed_blobs() {
        let (table, buf) = table_and_buffer();
        table.write_fixed_blob(&buf, 2, FixedSizeBlobId(0), &[1, 2, 3, 4]);
        table.write_fixed_blob(&buf, 2, FixedSizeBlobId(1), &[9; 16]);
        assert_eq!(table.read_fixed_blob(&buf, 2, FixedSizeBlobId(0)), vec![1, 2, 3, 4]);
        assert_eq!(table.read_fixed_blob(&buf, 2, FixedSizeBlobId(1)), vec![9; 16]);
        // Another doc's slots are independent.
        assert_eq!(table.read_fixed_blob(&buf, 3, FixedSizeBlobId(0)), vec![0; 4]);
    }

    #[test]
    fn test_variable_blobs() {
        let (table, buf) = table_and_buffer();
        assert!(table.read_variable_blob(&buf, 1, VariableSizeBlobId(0)).is_none());

        table
            .allocate_variable_blob(&buf, 1, VariableSizeBlobId(0), 11)
            .unwrap();
        table.write_variable_blob(&buf, 1, VariableSizeBlobId(0), b"hello world");
        assert_eq!(
            table.read_variable_blob(&buf, 1, VariableSizeBlobId(0)).unwrap(),
            b"hello world"
        );

        table
            .allocate_variable_blob(&buf, 1, VariableSizeBlobId(1), 3)
            .unwrap();
        table.write_variable_blob(&buf, 1, VariableSizeBlobId(1), b"abc");
        assert_eq!(
            table.read_variable_blob(&buf, 1, VariableSizeBlobId(1)).unwrap(),
            b"abc"
        );
        // First blob undisturbed.
        assert_eq!(
            table.read_variable_blob(&buf, 1, VariableSizeBlobId(0)).unwrap(),
            b"hello world"
        );
    }

    #[test]
    fn test_heap_exhaustion() {
        let (table, buf) = table_and_buffer();
        table
            .allocate_variable_blob(&buf, 0, VariableSizeBlobId(0), 64)
            .unwrap();
        let err = table.allocate_variable_blob(&buf, 0, VariableSizeBlobId(1), 8);
        assert!(matches!(err, Err(SiftDbError::CapacityExhausted(_))));
    }
}
