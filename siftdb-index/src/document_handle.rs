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

//! Document handles.
//!
//! A handle names one document slot: (slice, doc index). It is
//! non-owning with respect to the slice's logical reference count; the
//! index alone holds that reference while the slice is live.
//!
//! Ordering contract: any number of `add_posting` / blob / fact calls,
//! then `activate` - the publication point - then queries, then
//! `expire`. Activating or expiring twice is a fatal invariant
//! violation.

use std::sync::Arc;

use siftdb_core::error::Result;
use siftdb_core::row_id::RowId;
use siftdb_core::term::Term;
use siftdb_core::types::{DocId, DocIndex};

use crate::doc_table::{FixedSizeBlobId, VariableSizeBlobId};
use crate::shard::Shard;
use crate::slice::Slice;
use crate::term_table::FactHandle;

#[derive(Clone)]
pub struct DocumentHandle {
    slice: Arc<Slice>,
    index: DocIndex,
}

impl DocumentHandle {
    pub(crate) fn new(slice: Arc<Slice>, index: DocIndex) -> Self {
        Self { slice, index }
    }

    #[inline]
    pub fn slice(&self) -> &Arc<Slice> {
        &self.slice
    }

    #[inline]
    pub fn index(&self) -> DocIndex {
        self.index
    }

    fn shard(&self) -> Arc<Shard> {
        self.slice.shard().expect("slice outlived its shard")
    }

    /// Set every row bit the term table assigns to `term`. Must happen
    /// before `activate`.
    pub fn add_posting(&self, term: &Term) {
        let shard = self.shard();
        for row in shard.term_table().get_rows(term) {
            self.slice.set_posting_bit(row, self.index);
        }
    }

    /// Publish the document. Fatal if already active.
    pub fn activate(&self) {
        let was_active = self.slice.set_active_bit(self.index);
        assert!(!was_active, "document activated twice");
    }

    /// Retract the document and record the expiry; the expiry that
    /// fills the slice hands it back to the shard. Fatal if the
    /// document is not active.
    pub fn expire(&self) {
        let was_active = self.slice.clear_active_bit(self.index);
        assert!(was_active, "document expired twice or never activated");
        if self.slice.expire_document() {
            if let Some(shard) = self.slice.shard() {
                shard.retire_slice(&self.slice);
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.slice.is_document_active(self.index)
    }

    pub fn get_bit(&self, row: RowId) -> bool {
        self.slice.get_bit(row, self.index)
    }

    pub fn set_doc_id(&self, id: DocId) {
        self.slice
            .layout()
            .doc_table()
            .set_doc_id(self.slice.buffer(), self.index, id);
    }

    pub fn doc_id(&self) -> DocId {
        self.slice
            .layout()
            .doc_table()
            .get_doc_id(self.slice.buffer(), self.index)
    }

    /// Set or clear a fact bit for this document.
    pub fn assert_fact(&self, fact: FactHandle, value: bool) {
        let row = self.shard().term_table().fact_row(fact);
        let table = self.slice.layout().row_table(row.rank());
        if value {
            table.set_bit(self.slice.buffer(), row.index(), self.index);
        } else {
            table.clear_bit(self.slice.buffer(), row.index(), self.index);
        }
    }

    pub fn allocate_variable_size_blob(
        &self,
        blob: VariableSizeBlobId,
        byte_size: usize,
    ) -> Result<()> {
        self.slice.layout().doc_table().allocate_variable_blob(
            self.slice.buffer(),
            self.index,
            blob,
            byte_size,
        )
    }

    pub fn write_variable_size_blob(&self, blob: VariableSizeBlobId, data: &[u8]) {
        self.slice
            .layout()
            .doc_table()
            .write_variable_blob(self.slice.buffer(), self.index, blob, data);
    }

    pub fn get_variable_size_blob(&self, blob: VariableSizeBlobId) -> Option<Vec<u8>> {
        self.slice
            .layout()
            .doc_table()
            .read_variable_blob(self.slice.buffer(), self.index, blob)
    }

    pub fn write_fixed_size_blob(&self, blob: FixedSizeBlobId, data: &[u8]) {
        self.slice
            .layout()
            .doc_table()
            .write_fixed_blob(self.slice.buffer(), self.index, blob, data);
    }

    pub fn get_fixed_size_blob(&self, blob: FixedSizeBlobId) -> Vec<u8> {
        self.slice
            .layout()
            .doc_table()
            .read_fixed_blob(self.slice.buffer(), self.index, blob)
    }
}
