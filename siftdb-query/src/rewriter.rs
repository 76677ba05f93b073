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

//! Match tree rewriter.
//!
//! Normalises a row match tree into the shape the rank-down compiler
//! consumes:
//!
//! - Conjunctions become chains sorted by descending rank, so the
//!   matcher starts cheap (few bits per document) and only descends for
//!   survivors. A row placed after a lower-rank row is consumed at that
//!   lower rank (`rank_delta` records the fan-out).
//! - OR subtrees are partially multiplied into a sum of products. Rows
//!   of rank > 0 hoist in front of the OR; rank-0 rows push into every
//!   branch, after the branch's own rows. The last OR of the
//!   conjunction enumerates outermost, its children ordered by
//!   descending maximum rank; a global counter caps the number of
//!   emitted products at `target_cross_product_term_count`. Once at
//!   least one product is out and the counter is spent, the remaining
//!   children collapse into a single residual branch: a lone child
//!   merges as if enumerated, several stay as one unexpanded OR,
//!   evaluated at rank 0 after the branch's rows.
//! - Every chain ends in exactly one `Report`. NOT subtrees (and, with
//!   a zero budget, entire OR subtrees) live under it, consumed at
//!   rank 0.
//! - `target_row_count` stops the multiplication once a branch already
//!   carries that many rows.

use siftdb_core::types::{Rank, MAX_RANK};

use crate::row_match_node::{
    and_chain, flatten_or, max_native_rank, or_chain, AbstractRow, RowMatchArena, RowMatchNode,
    RowMatchRef,
};

pub struct MatchTreeRewriter;

impl MatchTreeRewriter {
    /// Rewrite `root`, allocating the result into the same arena.
    pub fn rewrite(
        arena: &mut RowMatchArena,
        root: RowMatchRef,
        target_row_count: usize,
        target_cross_product_term_count: usize,
    ) -> RowMatchRef {
        let partition = Partition::from_tree(arena, root);
        let mut rewriter = Rewriter {
            arena,
            target_row_count,
            target_cross_product_term_count,
            products: 0,
        };
        rewriter.rewrite_partition(partition, MAX_RANK)
    }
}

/// A conjunction split into its three kinds of members. All vectors are
/// kept newest-first: collection reverses the traversal, and descending
/// into an OR child prepends the child's members ahead of the inherited
/// context. Within one rank this is what puts a branch's own rows ahead
/// of pushed-down context rows after the stable sort.
#[derive(Clone)]
struct Partition {
    rows: Vec<AbstractRow>,
    ors: Vec<RowMatchRef>,
    nots: Vec<RowMatchRef>,
}

impl Partition {
    fn from_tree(arena: &RowMatchArena, node: RowMatchRef) -> Self {
        let mut partition = Partition {
            rows: Vec::new(),
            ors: Vec::new(),
            nots: Vec::new(),
        };
        partition.collect(arena, node);
        partition.rows.reverse();
        partition.ors.reverse();
        partition.nots.reverse();
        partition
    }

    fn collect(&mut self, arena: &RowMatchArena, node: RowMatchRef) {
        match arena[node] {
            RowMatchNode::And { left, right } => {
                self.collect(arena, left);
                self.collect(arena, right);
            }
            RowMatchNode::Row(row) => self.rows.push(row),
            RowMatchNode::Or { .. } => self.ors.push(node),
            RowMatchNode::Not { child } => self.nots.push(child),
            RowMatchNode::Report { .. } => {
                panic!("unsupported node in rewriter input: Report")
            }
        }
    }

    /// Partition of an OR child combined with this inherited context.
    fn descend(&self, arena: &RowMatchArena, child: RowMatchRef) -> Self {
        let mut partition = Partition::from_tree(arena, child);
        partition.rows.extend_from_slice(&self.rows);
        partition.ors.extend_from_slice(&self.ors);
        partition.nots.extend_from_slice(&self.nots);
        partition
    }
}

struct Rewriter<'a> {
    arena: &'a mut RowMatchArena,
    target_row_count: usize,
    target_cross_product_term_count: usize,
    products: usize,
}

impl Rewriter<'_> {
    fn rewrite_partition(&mut self, partition: Partition, entry_rank: Rank) -> RowMatchRef {
        let budget = self.target_cross_product_term_count;
        if !partition.ors.is_empty()
            && budget > 0
            && self.products < budget
            && partition.rows.len() < self.target_row_count
        {
            self.expand_or(partition, entry_rank)
        } else {
            // A zero budget parks OR subtrees under the Report node;
            // a spent budget keeps them as rank-0 filters in the chain.
            self.emit_chain(partition, entry_rank, budget == 0)
        }
    }

    fn expand_or(&mut self, partition: Partition, entry_rank: Rank) -> RowMatchRef {
        let mut rows = partition.rows;
        rows.sort_by(|a, b| b.native_rank().cmp(&a.native_rank()));
        let split = rows.partition_point(|r| r.native_rank() > 0);
        let (high, zero) = rows.split_at(split);

        let mut children = Vec::new();
        flatten_or(self.arena, partition.ors[0], &mut children);
        assert!(children.len() >= 2, "OR with fewer than two children");
        children.sort_by(|&a, &b| {
            max_native_rank(self.arena, b).cmp(&max_native_rank(self.arena, a))
        });

        let context = Partition {
            rows: zero.to_vec(),
            ors: partition.ors[1..].to_vec(),
            nots: partition.nots,
        };

        // Hoist the rank > 0 rows; the branches enter at whatever rank
        // the prefix descended to.
        let mut prefix = Vec::new();
        let mut running = entry_rank;
        for row in high {
            let consumed = row.native_rank().min(running);
            running = consumed;
            prefix.push(self.alloc_row(row.consumed_at(consumed)));
        }
        let branch_entry = running;

        let mut branches = Vec::new();
        for (i, &child) in children.iter().enumerate() {
            if self.products >= self.target_cross_product_term_count {
                let remaining = &children[i..];
                if remaining.len() == 1 {
                    let merged = context.descend(self.arena, remaining[0]);
                    branches.push(self.rewrite_partition(merged, branch_entry));
                } else {
                    let residual = or_chain(self.arena, remaining);
                    let mut with_residual = context.clone();
                    with_residual.ors.insert(0, residual);
                    branches.push(self.emit_chain(with_residual, branch_entry, false));
                }
                break;
            }
            let branch = context.descend(self.arena, child);
            branches.push(self.rewrite_partition(branch, branch_entry));
        }

        let or_ref = or_chain(self.arena, &branches);
        if prefix.is_empty() {
            or_ref
        } else {
            prefix.push(or_ref);
            and_chain(self.arena, &prefix)
        }
    }

    /// Emit a finished chain: sorted rows, then any unexpanded ORs as
    /// rank-0 filters (or parked under Report), then the Report with
    /// the NOT subtrees.
    fn emit_chain(
        &mut self,
        partition: Partition,
        entry_rank: Rank,
        ors_under_report: bool,
    ) -> RowMatchRef {
        let mut rows = partition.rows;
        rows.sort_by(|a, b| b.native_rank().cmp(&a.native_rank()));

        let mut elements = Vec::new();
        let mut running = entry_rank;
        for row in &rows {
            let consumed = row.native_rank().min(running);
            running = consumed;
            elements.push(self.alloc_row(row.consumed_at(consumed)));
        }

        let mut report_parts = Vec::new();
        for &or in &partition.ors {
            let zeroed = self.rank_zeroed(or);
            if ors_under_report {
                report_parts.push(zeroed);
            } else {
                elements.push(zeroed);
            }
        }
        for &not_child in &partition.nots {
            let zeroed = self.rank_zeroed(not_child);
            report_parts.push(self.arena.alloc(RowMatchNode::Not { child: zeroed }));
        }

        let report_child = if report_parts.is_empty() {
            None
        } else {
            Some(and_chain(self.arena, &report_parts))
        };
        elements.push(self.arena.alloc(RowMatchNode::Report {
            child: report_child,
        }));

        self.products += 1;
        and_chain(self.arena, &elements)
    }

    /// Structural copy with every row consumed at rank 0. Applied to
    /// everything evaluated at or below the Report boundary.
    fn rank_zeroed(&mut self, node: RowMatchRef) -> RowMatchRef {
        match self.arena[node] {
            RowMatchNode::Row(row) => self.alloc_row(row.consumed_at(0)),
            RowMatchNode::And { left, right } => {
                let left = self.rank_zeroed(left);
                let right = self.rank_zeroed(right);
                self.arena.alloc(RowMatchNode::And { left, right })
            }
            RowMatchNode::Or { left, right } => {
                let left = self.rank_zeroed(left);
                let right = self.rank_zeroed(right);
                self.arena.alloc(RowMatchNode::Or { left, right })
            }
            RowMatchNode::Not { child } => {
                let child = self.rank_zeroed(child);
                self.arena.alloc(RowMatchNode::Not { child })
            }
            RowMatchNode::Report { .. } => {
                panic!("unsupported node in rewriter input: Report")
            }
        }
    }

    fn alloc_row(&mut self, row: AbstractRow) -> RowMatchRef {
        self.arena.alloc(RowMatchNode::Row(row))
    }
}
