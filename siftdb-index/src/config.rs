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

//! Index configuration.

use serde::{Deserialize, Serialize};

/// Sizing and routing knobs for an ingestion index. The slice capacity
/// is a request; shards round it up so that every active rank covers a
/// whole number of 64-bit words.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Requested documents per slice.
    pub documents_per_slice: usize,

    /// Posting-count lower bounds for shards 1..N. A document with `t`
    /// postings lands in the last shard whose bound is <= t. Empty means
    /// a single shard takes everything.
    pub shard_term_count_boundaries: Vec<usize>,

    /// Byte sizes of the per-document fixed-size blob slots.
    pub fixed_blob_sizes: Vec<usize>,

    /// Number of per-document variable-size blob slots.
    pub variable_blob_count: u8,

    /// Bytes reserved per slice for variable-size blob payloads.
    pub variable_blob_heap_bytes: usize,

    /// Reserved fact rows (rank 0) beyond the document-active row.
    pub fact_capacity: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            documents_per_slice: 4096,
            shard_term_count_boundaries: Vec::new(),
            fixed_blob_sizes: Vec::new(),
            variable_blob_count: 2,
            variable_blob_heap_bytes: 16 * 1024,
            fact_capacity: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_single_shard() {
        let config = IndexConfig::default();
        assert!(config.shard_term_count_boundaries.is_empty());
        assert!(config.documents_per_slice > 0);
    }
}
