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

//! Row table descriptor.
//!
//! A row table is one rank's bit matrix: `row_count` rows, each a bitmap
//! over the slice's documents at that rank's resolution. Rows are stored
//! row-major; within a row, documents pack LSB-first into 64-bit words,
//! and a rank-`r` row indexes with `doc >> r`.
//!
//! The descriptor holds offsets and sizes only - the memory is the
//! slice's buffer. Bit operations are relaxed atomics: each document's
//! cells are written only by the thread ingesting that document, and
//! readers tolerate torn pre/post-ingest views everywhere except the
//! document-active row, whose Release/Acquire transition is the
//! publication point (see `Slice`).

use std::sync::atomic::{AtomicU64, Ordering};

use siftdb_core::types::{DocIndex, Rank, RowIndex};

#[derive(Debug, Clone)]
pub struct RowTableDescriptor {
    rank: Rank,
    row_count: RowIndex,
    words_per_row: usize,
    word_offset: usize,
    capacity: usize,
}

impl RowTableDescriptor {
    /// Describe a rank's table at `word_offset` in the slice buffer.
    /// `capacity` must cover a whole number of words at this rank.
    pub fn new(rank: Rank, row_count: RowIndex, capacity: usize, word_offset: usize) -> Self {
        let bits = capacity >> rank;
        assert!(
            bits > 0 && bits % 64 == 0,
            "slice capacity must be a multiple of 64 << rank"
        );
        Self {
            rank,
            row_count,
            words_per_row: bits / 64,
            word_offset,
            capacity,
        }
    }

    #[inline]
    pub fn rank(&self) -> Rank {
        self.rank
    }

    #[inline]
    pub fn row_count(&self) -> RowIndex {
        self.row_count
    }

    #[inline]
    pub fn words_per_row(&self) -> usize {
        self.words_per_row
    }

    /// Words this table occupies in the slice buffer.
    pub fn total_words(&self) -> usize {
        self.row_count as usize * self.words_per_row
    }

    pub fn word_offset(&self) -> usize {
        self.word_offset
    }

    #[inline]
    fn bit_position(&self, row: RowIndex, doc: DocIndex) -> (usize, u64) {
        debug_assert!(row < self.row_count, "row {row} out of range");
        debug_assert!(doc < self.capacity, "doc {doc} out of range");
        let bit = doc >> self.rank;
        let word = self.word_offset + row as usize * self.words_per_row + (bit >> 6);
        (word, 1u64 << (bit & 63))
    }

    /// Read bit (row, doc). Relaxed.
    #[inline]
    pub fn get_bit(&self, buffer: &[AtomicU64], row: RowIndex, doc: DocIndex) -> bool {
        let (word, mask) = self.bit_position(row, doc);
        buffer[word].load(Ordering::Relaxed) & mask != 0
    }

    /// Set bit (row, doc); returns the previous value.
    #[inline]
    pub fn set_bit(&self, buffer: &[AtomicU64], row: RowIndex, doc: DocIndex) -> bool {
        self.set_bit_with(buffer, row, doc, Ordering::Relaxed)
    }

    /// Clear bit (row, doc); returns the previous value.
    #[inline]
    pub fn clear_bit(&self, buffer: &[AtomicU64], row: RowIndex, doc: DocIndex) -> bool {
        self.clear_bit_with(buffer, row, doc, Ordering::Relaxed)
    }

    pub fn set_bit_with(
        &self,
        buffer: &[AtomicU64],
        row: RowIndex,
        doc: DocIndex,
        order: Ordering,
    ) -> bool {
        let (word, mask) = self.bit_position(row, doc);
        buffer[word].fetch_or(mask, order) & mask != 0
    }

    pub fn clear_bit_with(
        &self,
        buffer: &[AtomicU64],
        row: RowIndex,
        doc: DocIndex,
        order: Ordering,
    ) -> bool {
        let (word, mask) = self.bit_position(row, doc);
        buffer[word].fetch_and(!mask, order) & mask != 0
    }

    /// Read bit (row, doc) with an explicit ordering. Used for the
    /// document-active row's Acquire load.
    #[inline]
    pub fn get_bit_with(
        &self,
        buffer: &[AtomicU64],
        row: RowIndex,
        doc: DocIndex,
        order: Ordering,
    ) -> bool {
        let (word, mask) = self.bit_position(row, doc);
        buffer[word].load(order) & mask != 0
    }

    /// Load the `word_index`-th 64-bit word of a row.
    #[inline]
    pub fn get_word(
        &self,
        buffer: &[AtomicU64],
        row: RowIndex,
        word_index: usize,
        order: Ordering,
    ) -> u64 {
        debug_assert!(row < self.row_count);
        debug_assert!(word_index < self.words_per_row);
        buffer[self.word_offset + row as usize * self.words_per_row + word_index].load(order)
    }
}
