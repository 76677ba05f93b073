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

//! Plan compilers.
//!
//! [`RankDownCompiler`] lowers a rewritten match tree into compile
//! nodes: conjunction chains become `AndRowJz` sequences, and every
//! rank decrease inserts single-step `RankDown` nodes, never skipping a
//! rank. Compilation is split into `compile` and `create_tree` because
//! an OR's entry rank is only known after its children are compiled:
//! each child is compiled independently, the OR adopts the maximum of
//! their entry ranks, and lower children are wrapped up to it.
//!
//! Once the descent reaches rank 0 there is no transition left to
//! manage, and [`RankZeroCompiler`] takes over as a straight structural
//! translation (And to AndTree, Or to OrTree, Not to Not, Row to
//! LoadRow). Unsupported node kinds at either stage are fatal.

use siftdb_core::types::Rank;

use crate::compile_node::{CompileArena, CompileNode, CompileRef};
use crate::row_match_node::{
    contains_report, flatten_and, flatten_or, RowMatchArena, RowMatchNode, RowMatchRef,
};

/// Structural translator for subtrees already at rank 0.
pub struct RankZeroCompiler<'a, 'b> {
    rows: &'a RowMatchArena,
    out: &'b mut CompileArena,
}

impl<'a, 'b> RankZeroCompiler<'a, 'b> {
    pub fn new(rows: &'a RowMatchArena, out: &'b mut CompileArena) -> Self {
        Self { rows, out }
    }

    pub fn compile(&mut self, node: RowMatchRef) -> CompileRef {
        match self.rows[node] {
            RowMatchNode::And { left, right } => {
                let left = self.compile(left);
                let right = self.compile(right);
                self.out.alloc(CompileNode::AndTree { left, right })
            }
            RowMatchNode::Or { left, right } => {
                let left = self.compile(left);
                let right = self.compile(right);
                self.out.alloc(CompileNode::OrTree { left, right })
            }
            RowMatchNode::Not { child } => {
                let child = self.compile(child);
                self.out.alloc(CompileNode::Not { child })
            }
            RowMatchNode::Row(row) => {
                assert_eq!(row.rank(), 0, "rank-zero compiler fed a ranked row");
                self.out.alloc(CompileNode::LoadRow(row))
            }
            RowMatchNode::Report { .. } => {
                panic!("unsupported node type at rank-zero stage: Report")
            }
        }
    }
}

pub struct RankDownCompiler<'a, 'b> {
    rows: &'a RowMatchArena,
    out: &'b mut CompileArena,
    compiled: Option<(CompileRef, Rank)>,
}

impl<'a, 'b> RankDownCompiler<'a, 'b> {
    pub fn new(rows: &'a RowMatchArena, out: &'b mut CompileArena) -> Self {
        Self {
            rows,
            out,
            compiled: None,
        }
    }

    /// Compile the rewritten tree. The entry rank is available from
    /// [`initial_rank`](Self::initial_rank) afterwards.
    pub fn compile(&mut self, root: RowMatchRef) {
        let compiled = self.compile_node(root);
        self.compiled = Some(compiled);
    }

    /// Rank the compiled tree wants to start at.
    pub fn initial_rank(&self) -> Rank {
        self.compiled.expect("compile() has not run").1
    }

    /// Produce the executable tree, wrapped with whatever `RankDown`
    /// steps bridge `initial_rank` down to the compiled entry rank.
    pub fn create_tree(&mut self, initial_rank: Rank) -> CompileRef {
        let (node, rank) = self.compiled.expect("compile() has not run");
        assert!(
            initial_rank >= rank,
            "cannot enter a rank-{rank} tree at rank {initial_rank}"
        );
        self.wrap_down(node, initial_rank, rank)
    }

    /// Wrap `node` (entered at `to`) so the result is entered at `from`.
    fn wrap_down(&mut self, node: CompileRef, from: Rank, to: Rank) -> CompileRef {
        let mut wrapped = node;
        for new_rank in to..from {
            wrapped = self.out.alloc(CompileNode::RankDown {
                rank: new_rank,
                child: wrapped,
            });
        }
        wrapped
    }

    fn compile_node(&mut self, node: RowMatchRef) -> (CompileRef, Rank) {
        match self.rows[node] {
            RowMatchNode::And { .. } => {
                let mut elements = Vec::new();
                flatten_and(self.rows, node, &mut elements);
                self.compile_chain(&elements)
            }
            RowMatchNode::Or { .. } => self.compile_or(node),
            RowMatchNode::Report { child } => {
                let compiled = child.map(|c| self.rank_zero(c));
                (self.out.alloc(CompileNode::Report { child: compiled }), 0)
            }
            RowMatchNode::Row(_) | RowMatchNode::Not { .. } => {
                panic!("unsupported node type at rank-down stage")
            }
        }
    }

    /// Compile an OR whose branches carry their own Reports. Children
    /// compile independently; the OR enters at the maximum child rank.
    fn compile_or(&mut self, node: RowMatchRef) -> (CompileRef, Rank) {
        let mut children = Vec::new();
        flatten_or(self.rows, node, &mut children);
        assert!(children.len() >= 2, "OR with fewer than two children");

        let compiled: Vec<(CompileRef, Rank)> =
            children.iter().map(|&c| self.compile_node(c)).collect();
        let or_rank = compiled.iter().map(|&(_, r)| r).max().expect("children");

        let mut iter = compiled.into_iter();
        let (first, first_rank) = iter.next().expect("children");
        let mut acc = self.wrap_down(first, or_rank, first_rank);
        for (child, child_rank) in iter {
            let right = self.wrap_down(child, or_rank, child_rank);
            acc = self.out.alloc(CompileNode::OrTree { left: acc, right });
        }
        (acc, or_rank)
    }

    /// Compile a conjunction chain right to left, accumulating the
    /// continuation and inserting rank transitions between elements.
    fn compile_chain(&mut self, elements: &[RowMatchRef]) -> (CompileRef, Rank) {
        let mut cont: Option<(CompileRef, Rank)> = None;
        for &element in elements.iter().rev() {
            let next = match self.rows[element] {
                RowMatchNode::Report { .. } => {
                    assert!(cont.is_none(), "Report must terminate its chain");
                    self.compile_node(element)
                }
                RowMatchNode::Or { .. } if contains_report(self.rows, element) => {
                    assert!(cont.is_none(), "an expanded OR must terminate its chain");
                    self.compile_or(element)
                }
                RowMatchNode::Or { .. } => {
                    // Residual OR: a rank-0 pointwise filter.
                    let (next, next_rank) =
                        cont.take().expect("filter OR cannot terminate a chain");
                    assert_eq!(next_rank, 0, "filter OR joined above rank 0");
                    let value = self.rank_zero(element);
                    let and = self.out.alloc(CompileNode::AndTree {
                        left: value,
                        right: next,
                    });
                    (and, 0)
                }
                RowMatchNode::Row(row) => {
                    let (next, next_rank) = cont.take().expect("row chain missing its Report");
                    assert!(
                        row.rank() >= next_rank,
                        "conjunction chain not sorted by descending rank"
                    );
                    let wrapped = self.wrap_down(next, row.rank(), next_rank);
                    let jz = self.out.alloc(CompileNode::AndRowJz {
                        row,
                        next: wrapped,
                    });
                    (jz, row.rank())
                }
                RowMatchNode::And { .. } => unreachable!("conjunctions are flattened"),
                RowMatchNode::Not { .. } => {
                    panic!("unsupported node type at rank-down stage: Not")
                }
            };
            cont = Some(next);
        }
        cont.expect("empty conjunction chain")
    }

    fn rank_zero(&mut self, node: RowMatchRef) -> CompileRef {
        RankZeroCompiler::new(self.rows, self.out).compile(node)
    }
}
