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

//! Prime-factors synthetic index.
//!
//! DocId `d` is posted under one term per distinct prime factor of `d`,
//! e.g. document 12 under "2" and "3". Results are trivially checkable
//! by arithmetic, which makes this the standard fixture for matcher
//! correctness tests.

use siftdb_core::term::{StreamId, Term};
use siftdb_core::types::DocId;

use crate::config::IndexConfig;
use crate::ingestor::IngestionIndex;
use crate::term_table::TermTable;
use crate::treatment::TermTreatment;

pub fn primes_up_to(n: u64) -> Vec<u64> {
    let mut primes = Vec::new();
    'candidates: for c in 2..=n {
        for &p in &primes {
            if p * p > c {
                break;
            }
            if c % p == 0 {
                continue 'candidates;
            }
        }
        primes.push(c);
    }
    primes
}

/// Terms for the distinct prime factors of `d`.
pub fn prime_factor_terms(d: DocId, stream: StreamId) -> Vec<Term> {
    let mut terms = Vec::new();
    let mut rest = d;
    let mut p = 2;
    while p * p <= rest {
        if rest % p == 0 {
            terms.push(Term::new(&p.to_string(), stream));
            while rest % p == 0 {
                rest /= p;
            }
        }
        p += 1;
    }
    if rest > 1 {
        terms.push(Term::new(&rest.to_string(), stream));
    }
    terms
}

/// Build and fully ingest the prime-factors index over `1..=max_doc_id`.
/// Every prime term gets a private rank-0 row.
pub fn create_prime_factors_index(max_doc_id: DocId, stream: StreamId) -> IngestionIndex {
    let mut table = TermTable::new(TermTreatment::PrivateRank0, 0, 0);
    for p in primes_up_to(max_doc_id) {
        // Frequency of prime p among 1..=max: every p-th document.
        let frequency = 1.0 / p as f64;
        table.register_term(Term::new(&p.to_string(), stream), frequency);
    }

    let config = IndexConfig {
        documents_per_slice: 64,
        ..IndexConfig::default()
    };
    let index = IngestionIndex::new(table, &config);
    for d in 1..=max_doc_id {
        index
            .add_document(d, &prime_factor_terms(d, stream))
            .expect("prime factors ingestion failed");
    }
    index
}
