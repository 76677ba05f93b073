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

//! Terms - the unit of posting and matching.
//!
//! A term is a 64-bit stream-tagged hash plus a gram size and a stream id.
//! The text itself is never stored; every downstream structure (term
//! table, row tables, plans) works from the hash alone. Two terms are the
//! same term iff hash, gram size and stream id all match.

use std::fmt;

use serde::{Deserialize, Serialize};
use twox_hash::xxh3;

/// Identifies the document stream a term was drawn from (body, title,
/// metadata, ...). Tagging the hash with the stream keeps "title:red"
/// and "body:red" in disjoint row sets.
pub type StreamId = u8;

/// A hashed term.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Term {
    hash: u64,
    gram_size: u8,
    stream_id: StreamId,
}

impl Term {
    /// Hash a single word drawn from `stream`.
    pub fn new(text: &str, stream: StreamId) -> Self {
        Self {
            hash: xxh3::hash64_with_seed(text.as_bytes(), stream as u64),
            gram_size: 1,
            stream_id: stream,
        }
    }

    /// Construct a term from raw parts, e.g. when loading a persisted
    /// term table.
    pub const fn from_parts(hash: u64, gram_size: u8, stream_id: StreamId) -> Self {
        Self {
            hash,
            gram_size,
            stream_id,
        }
    }

    /// Extend this term with the word that follows it in the document,
    /// forming an n-gram. The rotation keeps concatenation
    /// order-sensitive: "new york" and "york new" hash apart.
    pub fn concat(&self, next: &Term) -> Self {
        debug_assert_eq!(
            self.stream_id, next.stream_id,
            "n-grams never span streams"
        );
        Self {
            hash: self.hash.rotate_left(1) ^ next.hash,
            gram_size: self.gram_size.saturating_add(next.gram_size),
            stream_id: self.stream_id,
        }
    }

    #[inline]
    pub const fn hash(&self) -> u64 {
        self.hash
    }

    #[inline]
    pub const fn gram_size(&self) -> u8 {
        self.gram_size
    }

    #[inline]
    pub const fn stream_id(&self) -> StreamId {
        self.stream_id
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Term({:#018x}, gram={}, stream={})",
            self.hash, self.gram_size, self.stream_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_deterministic() {
        assert_eq!(Term::new("blood", 0), Term::new("blood", 0));
        assert_ne!(Term::new("blood", 0), Term::new("red", 0));
    }

    #[test]
    fn test_stream_tagging() {
        // Same text on different streams must be distinct terms.
        assert_ne!(Term::new("red", 0), Term::new("red", 1));
    }

    #[test]
    fn test_concat_order_sensitive() {
        let new = Term::new("new", 0);
        let york = Term::new("york", 0);
        let a = new.concat(&york);
        let b = york.concat(&new);
        assert_ne!(a, b);
        assert_eq!(a.gram_size(), 2);
    }

    #[test]
    fn test_concat_associates_left() {
        let a = Term::new("a", 0);
        let b = Term::new("b", 0);
        let c = Term::new("c", 0);
        let abc = a.concat(&b).concat(&c);
        assert_eq!(abc.gram_size(), 3);
        assert_eq!(abc, a.concat(&b).concat(&c));
    }
}
