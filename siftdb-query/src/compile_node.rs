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

//! Compile nodes: the executable form of a plan.
//!
//! The matcher interprets this tree directly. Machine-flavoured nodes
//! (`AndRowJz`, `RankDown`, `Report`) drive an accumulator word through
//! the rank descent with short-circuiting; structural nodes (`AndTree`,
//! `OrTree`, `Not`, `LoadRow`) combine row words pointwise and only
//! occur where no rank transition remains.

use siftdb_core::arena::{Arena, NodeId};
use siftdb_core::types::Rank;

use crate::row_match_node::AbstractRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileNode {
    /// Pointwise AND of two subtree values.
    AndTree {
        left: CompileRef,
        right: CompileRef,
    },
    /// Pointwise OR of two subtree values.
    OrTree {
        left: CompileRef,
        right: CompileRef,
    },
    /// Pointwise complement.
    Not { child: CompileRef },
    /// Load one word of a row.
    LoadRow(AbstractRow),
    /// AND a row word into the accumulator; skip `next` if the result
    /// is zero.
    AndRowJz {
        row: AbstractRow,
        next: CompileRef,
    },
    /// Descend one rank: run `child` over each half-window with the
    /// accumulator bits fanned out two-fold.
    RankDown { rank: Rank, child: CompileRef },
    /// Emit the accumulator's surviving bits as matches, refined by the
    /// optional rank-0 child value.
    Report { child: Option<CompileRef> },
}

pub type CompileArena = Arena<CompileNode>;
pub type CompileRef = NodeId<CompileNode>;

/// Verify the rank discipline of a compiled tree: along every path the
/// rank only decreases, one step at a time, and every row is consumed
/// at the rank in force where it appears. Used by tests; returns the
/// highest rank the tree expects to start at.
pub fn check_rank_discipline(arena: &CompileArena, root: CompileRef, entry_rank: Rank) {
    match arena[root] {
        CompileNode::AndRowJz { row, next } => {
            assert_eq!(row.rank(), entry_rank, "row consumed at the wrong rank");
            check_rank_discipline(arena, next, entry_rank);
        }
        CompileNode::RankDown { rank, child } => {
            assert_eq!(rank + 1, entry_rank, "rank descent must not skip");
            check_rank_discipline(arena, child, rank);
        }
        CompileNode::Report { child } => {
            assert_eq!(entry_rank, 0, "Report outside rank 0");
            if let Some(child) = child {
                check_rank_discipline(arena, child, 0);
            }
        }
        CompileNode::AndTree { left, right } | CompileNode::OrTree { left, right } => {
            check_rank_discipline(arena, left, entry_rank);
            check_rank_discipline(arena, right, entry_rank);
        }
        CompileNode::Not { child } => check_rank_discipline(arena, child, entry_rank),
        CompileNode::LoadRow(row) => {
            assert_eq!(row.rank(), entry_rank, "row loaded at the wrong rank");
        }
    }
}
