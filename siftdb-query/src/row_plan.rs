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

//! Row plan builder.
//!
//! Expands a term match tree into a row match tree against one shard's
//! term table. A unigram becomes the conjunction of all its rows (every
//! row must match). A phrase conjoins its word unigrams with the
//! adjacent bigrams, so "new york" requires the signature of both words
//! plus the order-sensitive bigram. Facts resolve to their reserved
//! system row.

use siftdb_core::term::Term;
use siftdb_index::TermTable;

use crate::row_match_node::{
    and_chain, AbstractRow, RowMatchArena, RowMatchNode, RowMatchRef,
};
use crate::term_match_node::{TermMatchArena, TermMatchNode, TermMatchRef};

/// Build the row plan for `root` against `term_table`.
pub fn build_row_plan(
    terms: &TermMatchArena,
    root: TermMatchRef,
    term_table: &TermTable,
    out: &mut RowMatchArena,
) -> RowMatchRef {
    match &terms[root] {
        TermMatchNode::And { left, right } => {
            let left = build_row_plan(terms, *left, term_table, out);
            let right = build_row_plan(terms, *right, term_table, out);
            out.alloc(RowMatchNode::And { left, right })
        }
        TermMatchNode::Or { left, right } => {
            let left = build_row_plan(terms, *left, term_table, out);
            let right = build_row_plan(terms, *right, term_table, out);
            out.alloc(RowMatchNode::Or { left, right })
        }
        TermMatchNode::Not { child } => {
            let child = build_row_plan(terms, *child, term_table, out);
            out.alloc(RowMatchNode::Not { child })
        }
        TermMatchNode::Unigram(term) => term_conjunction(term, term_table, out),
        TermMatchNode::Phrase { terms: words } => {
            let mut parts = Vec::new();
            for word in words {
                parts.push(term_conjunction(word, term_table, out));
            }
            for pair in words.windows(2) {
                let bigram = pair[0].concat(&pair[1]);
                parts.push(term_conjunction(&bigram, term_table, out));
            }
            and_chain(out, &parts)
        }
        TermMatchNode::Fact(handle) => {
            let row = term_table.fact_row(*handle);
            out.alloc(RowMatchNode::Row(AbstractRow::from_row_id(row)))
        }
    }
}

/// All rows of one term, AND-combined in sequence order.
fn term_conjunction(
    term: &Term,
    term_table: &TermTable,
    out: &mut RowMatchArena,
) -> RowMatchRef {
    let rows = term_table.get_rows(term);
    assert!(!rows.is_empty(), "term resolved to no rows");
    let nodes: Vec<_> = rows
        .iter()
        .map(|&row| out.alloc(RowMatchNode::Row(AbstractRow::from_row_id(row))))
        .collect();
    and_chain(out, &nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan_text::format_plan;
    use crate::term_match_node::{conjunction_of_words, unigram};
    use siftdb_index::TermTreatment;

    fn private_table(words: &[&str]) -> TermTable {
        let mut table = TermTable::new(TermTreatment::PrivateRank0, 0, 0);
        for word in words {
            table.register_term(Term::new(word, 0), 0.5);
        }
        table
    }

    #[test]
    fn test_unigram_expands_to_its_rows() {
        let table = private_table(&["blood"]);
        let mut terms = TermMatchArena::new();
        let root = unigram(&mut terms, "blood", 0);
        let mut rows = RowMatchArena::new();
        let plan = build_row_plan(&terms, root, &table, &mut rows);

        let expected = table.get_rows(&Term::new("blood", 0));
        assert_eq!(expected.len(), 1);
        match rows[plan] {
            RowMatchNode::Row(row) => {
                assert_eq!(row.id(), expected[0].index());
                assert_eq!(row.rank(), 0);
            }
            ref other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_and_of_unigrams() {
        let table = private_table(&["blood", "red"]);
        let mut terms = TermMatchArena::new();
        let root = conjunction_of_words(&mut terms, &["blood", "red"], 0);
        let mut rows = RowMatchArena::new();
        let plan = build_row_plan(&terms, root, &table, &mut rows);
        // Two private rows, one per term.
        let text = format_plan(&rows, plan);
        assert!(text.starts_with("And"));
        assert_eq!(text.matches("Row(").count(), 2);
    }

    #[test]
    fn test_shared_rows_multiply() {
        let mut table = TermTable::new(
            TermTreatment::PrivateSharedRank0 {
                density: 0.15,
                snr: 100.0,
            },
            512,
            0,
        );
        let term = Term::new("rare", 0);
        table.register_term(term, 0.001);
        let k = table.get_rows(&term).len();
        assert!(k > 1);

        let mut terms = TermMatchArena::new();
        let root = unigram(&mut terms, "rare", 0);
        let mut rows = RowMatchArena::new();
        let plan = build_row_plan(&terms, root, &table, &mut rows);
        let text = format_plan(&rows, plan);
        assert_eq!(text.matches("Row(").count(), k);
    }

    #[test]
    fn test_phrase_adds_bigrams() {
        let new = Term::new("new", 0);
        let york = Term::new("york", 0);
        let mut table = private_table(&["new", "york"]);
        table.register_term(new.concat(&york), 0.01);

        let mut terms = TermMatchArena::new();
        let root = crate::term_match_node::phrase(&mut terms, &["new", "york"], 0);
        let mut rows = RowMatchArena::new();
        let plan = build_row_plan(&terms, root, &table, &mut rows);
        // new + york + "new york" bigram, one private row each.
        let text = format_plan(&rows, plan);
        assert_eq!(text.matches("Row(").count(), 3);
    }
}
