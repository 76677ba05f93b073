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

//! Query planner: the full pipeline.
//!
//! For every shard: expand terms to rows, rewrite, compile, then run
//! the program over each of the shard's slices. Plans are rebuilt per
//! shard because row assignments are per-term-table. All plan trees
//! live in per-query arenas thrown away on return.

use serde::{Deserialize, Serialize};
use tracing::debug;

use siftdb_core::types::DocId;
use siftdb_index::IngestionIndex;

use crate::compile_node::CompileArena;
use crate::compiler::RankDownCompiler;
use crate::matcher;
use crate::rewriter::MatchTreeRewriter;
use crate::row_match_node::RowMatchArena;
use crate::row_plan::build_row_plan;
use crate::term_match_node::{TermMatchArena, TermMatchRef};

/// Rewriter budgets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Rows a cross-product branch may accumulate before the rewriter
    /// stops multiplying ORs into it.
    pub target_row_count: usize,
    /// Cap on emitted cross-product conjunctions per query.
    pub target_cross_product_term_count: usize,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            target_row_count: 8,
            target_cross_product_term_count: 3,
        }
    }
}

pub struct QueryPlanner<'a> {
    index: &'a IngestionIndex,
    config: PlanConfig,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(index: &'a IngestionIndex) -> Self {
        Self::with_config(index, PlanConfig::default())
    }

    pub fn with_config(index: &'a IngestionIndex, config: PlanConfig) -> Self {
        Self { index, config }
    }

    /// Run the query and return matching DocIds, ascending.
    ///
    /// Matches are whatever the row signatures admit: exact for private
    /// rows, with the treatment's configured false-positive rate for
    /// shared ones.
    pub fn execute(&self, terms: &TermMatchArena, root: TermMatchRef) -> Vec<DocId> {
        let mut results = Vec::new();

        for shard in self.index.shards() {
            let mut rows = RowMatchArena::new();
            let plan = build_row_plan(terms, root, shard.term_table(), &mut rows);
            let rewritten = MatchTreeRewriter::rewrite(
                &mut rows,
                plan,
                self.config.target_row_count,
                self.config.target_cross_product_term_count,
            );

            let mut compiled = CompileArena::new();
            let mut compiler = RankDownCompiler::new(&rows, &mut compiled);
            compiler.compile(rewritten);
            let initial_rank = compiler.initial_rank();
            let tree = compiler.create_tree(initial_rank);

            let slices = shard.slices();
            debug!(
                shard = shard.id(),
                initial_rank,
                slices = slices.len(),
                "executing compiled plan"
            );
            for slice in slices {
                let doc_table = slice.layout().doc_table();
                for doc in matcher::match_slice(&compiled, tree, initial_rank, &slice) {
                    results.push(doc_table.get_doc_id(slice.buffer(), doc));
                }
            }
        }

        // Branches of an expanded OR report independently, so a
        // document can surface once per branch.
        results.sort_unstable();
        results.dedup();
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term_match_node::{any_of, conjunction_of_words, not, unigram};
    use siftdb_index::prime_factors::create_prime_factors_index;

    #[test]
    fn test_prime_factors_conjunction() {
        let index = create_prime_factors_index(15, 0);
        let planner = QueryPlanner::new(&index);

        let mut terms = TermMatchArena::new();
        let root = conjunction_of_words(&mut terms, &["2", "3"], 0);
        assert_eq!(planner.execute(&terms, root), vec![6, 12]);
    }

    #[test]
    fn test_prime_factors_disjunction() {
        let index = create_prime_factors_index(15, 0);
        let planner = QueryPlanner::new(&index);

        let mut terms = TermMatchArena::new();
        let five = unigram(&mut terms, "5", 0);
        let seven = unigram(&mut terms, "7", 0);
        let root = any_of(&mut terms, &[five, seven]);
        assert_eq!(planner.execute(&terms, root), vec![5, 7, 10, 14, 15]);
    }

    #[test]
    fn test_prime_factors_negation() {
        let index = create_prime_factors_index(15, 0);
        let planner = QueryPlanner::new(&index);

        // Divisible by 2 but not by 3.
        let mut terms = TermMatchArena::new();
        let two = unigram(&mut terms, "2", 0);
        let three = unigram(&mut terms, "3", 0);
        let not_three = not(&mut terms, three);
        let root = crate::term_match_node::all_of(&mut terms, &[two, not_three]);
        assert_eq!(planner.execute(&terms, root), vec![2, 4, 8, 10, 14]);
    }

    #[test]
    fn test_expired_documents_disappear() {
        let index = create_prime_factors_index(15, 0);
        let planner = QueryPlanner::new(&index);

        let mut terms = TermMatchArena::new();
        let root = conjunction_of_words(&mut terms, &["2", "3"], 0);
        assert_eq!(planner.execute(&terms, root), vec![6, 12]);

        index.delete_document(6).unwrap();
        assert_eq!(planner.execute(&terms, root), vec![12]);
    }
}
