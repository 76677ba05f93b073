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

//! Whole-pipeline tests: ingest documents, run queries through the
//! planner, compare against directly-evaluated row bits.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use siftdb_core::term::Term;
use siftdb_core::types::DocId;
use siftdb_index::{IndexConfig, IngestionIndex, TermTable, TermTreatment};
use siftdb_query::term_match_node::{
    all_of, any_of, conjunction_of_words, not, unigram, TermMatchArena,
};
use siftdb_query::QueryPlanner;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn ingest_then_query_then_expire() {
    init_tracing();
    let mut table = TermTable::new(TermTreatment::PrivateRank0, 0, 0);
    for word in ["blood", "red", "rose"] {
        table.register_term(Term::new(word, 0), 0.1);
    }
    let index = IngestionIndex::new(table, &IndexConfig::default());

    index
        .add_document(42, &[Term::new("blood", 0), Term::new("red", 0)])
        .unwrap();
    index
        .add_document(43, &[Term::new("red", 0), Term::new("rose", 0)])
        .unwrap();

    let planner = QueryPlanner::new(&index);
    let mut terms = TermMatchArena::new();
    let query = conjunction_of_words(&mut terms, &["blood", "red"], 0);
    assert_eq!(planner.execute(&terms, query), vec![42]);

    let mut terms = TermMatchArena::new();
    let query = conjunction_of_words(&mut terms, &["red"], 0);
    assert_eq!(planner.execute(&terms, query), vec![42, 43]);

    index.delete_document(42).unwrap();
    let mut terms = TermMatchArena::new();
    let query = conjunction_of_words(&mut terms, &["blood", "red"], 0);
    assert_eq!(planner.execute(&terms, query), Vec::<DocId>::new());
}

#[test]
fn facts_refine_queries() {
    let mut table = TermTable::new(TermTreatment::PrivateRank0, 0, 1);
    let published = table.register_fact().unwrap();
    table.register_term(Term::new("red", 0), 0.1);
    let index = IngestionIndex::new(table, &IndexConfig::default());

    let a = index.add_document(1, &[Term::new("red", 0)]).unwrap();
    index.add_document(2, &[Term::new("red", 0)]).unwrap();
    a.assert_fact(published, true);

    let planner = QueryPlanner::new(&index);
    let mut terms = TermMatchArena::new();
    let red = unigram(&mut terms, "red", 0);
    let flag = siftdb_query::term_match_node::fact(&mut terms, published);
    let query = all_of(&mut terms, &[red, flag]);
    assert_eq!(planner.execute(&terms, query), vec![1]);
}

/// Evaluate a conjunction of terms the slow way: a document matches if
/// every row of every term has its bit set.
fn brute_force_and(index: &IngestionIndex, doc_ids: &[DocId], words: &[&str]) -> Vec<DocId> {
    let table = index.term_table();
    doc_ids
        .iter()
        .copied()
        .filter(|&id| {
            let handle = match index.handle(id) {
                Some(h) => h,
                None => return false,
            };
            words.iter().all(|w| {
                table
                    .get_rows(&Term::new(w, 0))
                    .iter()
                    .all(|&row| handle.get_bit(row))
            })
        })
        .collect()
}

#[test]
fn matcher_agrees_with_row_bits_across_ranks() {
    // A treatment that uses both rank-0 and rank-3 rows, two slices
    // worth of documents, seeded-random term assignment.
    let vocabulary: &[(&str, f64)] = &[
        ("the", 0.0625), // private rank-3 row plus shared top-up
        ("quick", 0.03),
        ("brown", 0.03),
        ("fox", 0.008),
        ("jumps", 0.008),
        ("lazy", 0.002),
        ("dog", 0.002),
    ];

    let mut table = TermTable::new(
        TermTreatment::PrivateSharedRank0And3 {
            density: 0.15,
            snr: 100.0,
        },
        1024,
        0,
    );
    for &(word, frequency) in vocabulary {
        table.register_term(Term::new(word, 0), frequency);
    }

    let config = IndexConfig {
        documents_per_slice: 512,
        ..IndexConfig::default()
    };
    let index = IngestionIndex::new(table, &config);

    let mut rng = StdRng::seed_from_u64(0x5157_u64);
    let mut doc_ids = Vec::new();
    for id in 1..=700u64 {
        let mut terms = Vec::new();
        for &(word, frequency) in vocabulary {
            // Over-sample so every term has hits in a small corpus.
            if rng.gen_bool((frequency * 8.0).min(1.0)) {
                terms.push(Term::new(word, 0));
            }
        }
        index.add_document(id, &terms).unwrap();
        doc_ids.push(id);
    }

    let planner = QueryPlanner::new(&index);
    let queries: &[&[&str]] = &[
        &["the"],
        &["the", "quick"],
        &["fox", "lazy"],
        &["the", "brown", "dog"],
    ];
    for words in queries {
        let mut terms = TermMatchArena::new();
        let query = conjunction_of_words(&mut terms, words, 0);
        let got = planner.execute(&terms, query);
        let expected = brute_force_and(&index, &doc_ids, words);
        assert_eq!(got, expected, "query {words:?}");
    }
}

#[test]
fn disjunction_and_negation_agree_with_row_bits() {
    let mut table = TermTable::new(TermTreatment::PrivateRank0, 0, 0);
    for word in ["a", "b", "c"] {
        table.register_term(Term::new(word, 0), 0.2);
    }
    let index = IngestionIndex::new(table, &IndexConfig::default());

    let mut rng = StdRng::seed_from_u64(0xBEEF);
    let mut expected_or = Vec::new();
    let mut expected_a_not_b = Vec::new();
    for id in 1..=300u64 {
        let has: Vec<bool> = (0..3).map(|_| rng.gen_bool(0.3)).collect();
        let terms: Vec<Term> = ["a", "b", "c"]
            .iter()
            .zip(&has)
            .filter(|(_, &h)| h)
            .map(|(w, _)| Term::new(w, 0))
            .collect();
        index.add_document(id, &terms).unwrap();
        if has[0] || has[1] {
            expected_or.push(id);
        }
        if has[0] && !has[1] {
            expected_a_not_b.push(id);
        }
    }

    let planner = QueryPlanner::new(&index);

    let mut terms = TermMatchArena::new();
    let a = unigram(&mut terms, "a", 0);
    let b = unigram(&mut terms, "b", 0);
    let query = any_of(&mut terms, &[a, b]);
    assert_eq!(planner.execute(&terms, query), expected_or);

    let mut terms = TermMatchArena::new();
    let a = unigram(&mut terms, "a", 0);
    let b = unigram(&mut terms, "b", 0);
    let not_b = not(&mut terms, b);
    let query = all_of(&mut terms, &[a, not_b]);
    assert_eq!(planner.execute(&terms, query), expected_a_not_b);
}
