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

//! Row match trees.
//!
//! The middle representation of a query: a boolean tree over rows,
//! arena-allocated and immutable once built. And/Or are binary and
//! left-associated; `Report` marks the boundary between rows evaluated
//! as filters (above it) and rows evaluated only to refine what gets
//! reported (below it, together with the NOT subtrees).

use siftdb_core::arena::{Arena, NodeId};
use siftdb_core::row_id::RowId;
use siftdb_core::types::{Rank, RowIndex};

/// A row reference inside a plan. `rank` is the rank at which the
/// matcher consumes the row; `rank + rank_delta` is the rank the row is
/// physically stored at. A positive delta means each physical bit is
/// OR-fanned across `2^delta` consumed positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbstractRow {
    id: RowIndex,
    rank: Rank,
    rank_delta: Rank,
    recycled: bool,
}

impl AbstractRow {
    pub const fn new(id: RowIndex, rank: Rank, recycled: bool) -> Self {
        Self {
            id,
            rank,
            rank_delta: 0,
            recycled,
        }
    }

    pub const fn with_delta(id: RowIndex, rank: Rank, rank_delta: Rank, recycled: bool) -> Self {
        Self {
            id,
            rank,
            rank_delta,
            recycled,
        }
    }

    /// Wrap a physical row, consumed at its native rank.
    pub const fn from_row_id(row: RowId) -> Self {
        Self {
            id: row.index(),
            rank: row.rank(),
            rank_delta: 0,
            recycled: row.is_recycled(),
        }
    }

    #[inline]
    pub const fn id(&self) -> RowIndex {
        self.id
    }

    /// Rank the matcher consumes this row at.
    #[inline]
    pub const fn rank(&self) -> Rank {
        self.rank
    }

    #[inline]
    pub const fn rank_delta(&self) -> Rank {
        self.rank_delta
    }

    /// Rank the row is physically stored at.
    #[inline]
    pub const fn native_rank(&self) -> Rank {
        self.rank + self.rank_delta
    }

    #[inline]
    pub const fn is_recycled(&self) -> bool {
        self.recycled
    }

    /// The same physical row, consumed at a (lower or equal) rank.
    pub fn consumed_at(&self, rank: Rank) -> Self {
        let native = self.native_rank();
        assert!(rank <= native, "a row cannot be consumed above its native rank");
        Self {
            id: self.id,
            rank,
            rank_delta: native - rank,
            recycled: self.recycled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowMatchNode {
    And {
        left: RowMatchRef,
        right: RowMatchRef,
    },
    Or {
        left: RowMatchRef,
        right: RowMatchRef,
    },
    Not {
        child: RowMatchRef,
    },
    Row(AbstractRow),
    Report {
        child: Option<RowMatchRef>,
    },
}

pub type RowMatchArena = Arena<RowMatchNode>;
pub type RowMatchRef = NodeId<RowMatchNode>;

/// Left-fold `items` into an And chain. A single item stands alone.
pub fn and_chain(arena: &mut RowMatchArena, items: &[RowMatchRef]) -> RowMatchRef {
    fold_chain(arena, items, true)
}

/// Left-fold `items` into an Or chain. A single item stands alone.
pub fn or_chain(arena: &mut RowMatchArena, items: &[RowMatchRef]) -> RowMatchRef {
    fold_chain(arena, items, false)
}

fn fold_chain(arena: &mut RowMatchArena, items: &[RowMatchRef], and: bool) -> RowMatchRef {
    assert!(!items.is_empty(), "cannot build an empty chain");
    let mut acc = items[0];
    for &item in &items[1..] {
        acc = arena.alloc(if and {
            RowMatchNode::And {
                left: acc,
                right: item,
            }
        } else {
            RowMatchNode::Or {
                left: acc,
                right: item,
            }
        });
    }
    acc
}

/// Collect the n-ary children of a left-associated And tree, in order.
pub fn flatten_and(arena: &RowMatchArena, node: RowMatchRef, out: &mut Vec<RowMatchRef>) {
    match arena[node] {
        RowMatchNode::And { left, right } => {
            flatten_and(arena, left, out);
            flatten_and(arena, right, out);
        }
        _ => out.push(node),
    }
}

/// Collect the n-ary children of a left-associated Or tree, in order.
pub fn flatten_or(arena: &RowMatchArena, node: RowMatchRef, out: &mut Vec<RowMatchRef>) {
    match arena[node] {
        RowMatchNode::Or { left, right } => {
            flatten_or(arena, left, out);
            flatten_or(arena, right, out);
        }
        _ => out.push(node),
    }
}

/// Does any `Report` node occur in this subtree?
pub fn contains_report(arena: &RowMatchArena, node: RowMatchRef) -> bool {
    match arena[node] {
        RowMatchNode::Report { .. } => true,
        RowMatchNode::And { left, right } | RowMatchNode::Or { left, right } => {
            contains_report(arena, left) || contains_report(arena, right)
        }
        RowMatchNode::Not { child } => contains_report(arena, child),
        RowMatchNode::Row(_) => false,
    }
}

/// Highest native rank of any row in the subtree.
pub fn max_native_rank(arena: &RowMatchArena, node: RowMatchRef) -> Rank {
    match arena[node] {
        RowMatchNode::Row(row) => row.native_rank(),
        RowMatchNode::And { left, right } | RowMatchNode::Or { left, right } => {
            max_native_rank(arena, left).max(max_native_rank(arena, right))
        }
        RowMatchNode::Not { child } => max_native_rank(arena, child),
        RowMatchNode::Report { child } => child.map_or(0, |c| max_native_rank(arena, c)),
    }
}
