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

//! Primitive semantic types shared across the index and query crates.

/// Externally supplied document identifier. Unique per ingestion run.
/// Zero is reserved as the invalid DocId.
pub type DocId = u64;

/// Reserved invalid document identifier.
pub const INVALID_DOC_ID: DocId = 0;

/// Dense index of a document within its slice, `0..capacity`.
pub type DocIndex = usize;

/// Sentinel meaning "no slot".
pub const INVALID_DOC_INDEX: DocIndex = usize::MAX;

/// Bit-compression exponent of a row. A rank-`r` row OR-collapses
/// `2^r` consecutive documents into a single bit, so higher ranks are
/// coarser but an eighth, a sixteenth, ... of the bits to scan.
pub type Rank = u8;

/// Highest rank the row tables support.
pub const MAX_RANK: Rank = 7;

/// Dense per-rank index of a row within a shard's row table.
pub type RowIndex = u32;

/// Identifier of a shard within an ingestion index.
pub type ShardId = u16;

/// Number of documents covered by one 64-bit row-table word at `rank`.
#[inline]
pub const fn docs_per_word(rank: Rank) -> usize {
    64 << rank
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docs_per_word() {
        assert_eq!(docs_per_word(0), 64);
        assert_eq!(docs_per_word(3), 512);
        assert_eq!(docs_per_word(MAX_RANK), 8192);
    }
}
