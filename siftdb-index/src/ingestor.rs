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

//! The ingestion index: the set of shards behind one term table.
//!
//! Documents route to a shard by posting count, land in a slice slot,
//! get their bits set, and publish atomically through the active bit.
//! The DocId map makes later expiry by DocId possible. All methods take
//! `&self`; ingestion can fan out across task-pool workers.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use siftdb_core::error::{Result, SiftDbError};
use siftdb_core::term::Term;
use siftdb_core::types::{DocId, ShardId, INVALID_DOC_ID};

use crate::config::IndexConfig;
use crate::document_handle::DocumentHandle;
use crate::recycler::Recycler;
use crate::shard::Shard;
use crate::term_table::TermTable;

pub struct IngestionIndex {
    term_table: Arc<TermTable>,
    shards: Vec<Arc<Shard>>,
    boundaries: Vec<usize>,
    documents: DashMap<DocId, DocumentHandle>,
    recycler: Recycler,
}

impl IngestionIndex {
    pub fn new(term_table: TermTable, config: &IndexConfig) -> Self {
        let term_table = Arc::new(term_table);
        let recycler = Recycler::start();
        let boundaries = config.shard_term_count_boundaries.clone();

        let shard_count = boundaries.len() + 1;
        let shards = (0..shard_count)
            .map(|i| {
                Shard::new(
                    i as ShardId,
                    Arc::clone(&term_table),
                    config,
                    recycler.handle(),
                )
            })
            .collect();

        info!(shards = shard_count, "ingestion index started");
        Self {
            term_table,
            shards,
            boundaries,
            documents: DashMap::new(),
            recycler,
        }
    }

    #[inline]
    pub fn term_table(&self) -> &Arc<TermTable> {
        &self.term_table
    }

    pub fn shards(&self) -> &[Arc<Shard>] {
        &self.shards
    }

    /// Shard for a document with `posting_count` postings: the last
    /// shard whose boundary it reaches.
    pub fn shard_for(&self, posting_count: usize) -> &Arc<Shard> {
        let mut pick = 0;
        for (i, &bound) in self.boundaries.iter().enumerate() {
            if posting_count >= bound {
                pick = i + 1;
            }
        }
        &self.shards[pick]
    }

    /// Ingest one document: claim a slot, set every posting bit, then
    /// activate. Concurrent queries see the document fully indexed or
    /// not at all.
    pub fn add_document(&self, doc_id: DocId, terms: &[Term]) -> Result<DocumentHandle> {
        if doc_id == INVALID_DOC_ID {
            return Err(SiftDbError::InvalidArgument(
                "DocId zero is reserved".into(),
            ));
        }
        if self.documents.contains_key(&doc_id) {
            return Err(SiftDbError::InvalidArgument(format!(
                "DocId {doc_id} already ingested"
            )));
        }

        let handle = self.shard_for(terms.len()).allocate_document();
        handle.set_doc_id(doc_id);
        for term in terms {
            handle.add_posting(term);
        }
        handle.activate();
        self.documents.insert(doc_id, handle.clone());
        debug!(doc_id, postings = terms.len(), "document ingested");
        Ok(handle)
    }

    /// Expire a document by DocId.
    pub fn delete_document(&self, doc_id: DocId) -> Result<()> {
        let (_, handle) = self
            .documents
            .remove(&doc_id)
            .ok_or_else(|| SiftDbError::NotFound(format!("DocId {doc_id}")))?;
        handle.expire();
        debug!(doc_id, "document expired");
        Ok(())
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn handle(&self, doc_id: DocId) -> Option<DocumentHandle> {
        self.documents.get(&doc_id).map(|entry| entry.value().clone())
    }

    /// Stop the recycler after processing everything queued.
    pub fn shutdown(&mut self) {
        self.documents.clear();
        self.recycler.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::treatment::TermTreatment;

    fn small_index(boundaries: Vec<usize>) -> IngestionIndex {
        let mut table = TermTable::new(
            TermTreatment::PrivateSharedRank0 {
                density: 0.15,
                snr: 10.0,
            },
            128,
            0,
        );
        for word in ["a", "b", "c"] {
            table.register_term(Term::new(word, 0), 0.01);
        }
        let config = IndexConfig {
            documents_per_slice: 64,
            shard_term_count_boundaries: boundaries,
            ..IndexConfig::default()
        };
        IngestionIndex::new(table, &config)
    }

    #[test]
    fn test_add_and_delete() {
        let index = small_index(vec![]);
        let terms = [Term::new("a", 0), Term::new("b", 0)];
        let handle = index.add_document(7, &terms).unwrap();
        assert!(handle.is_active());
        assert_eq!(index.document_count(), 1);

        index.delete_document(7).unwrap();
        assert_eq!(index.document_count(), 0);
        assert!(!handle.is_active());
        assert!(matches!(
            index.delete_document(7),
            Err(SiftDbError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_and_invalid_doc_ids() {
        let index = small_index(vec![]);
        index.add_document(1, &[]).unwrap();
        assert!(matches!(
            index.add_document(1, &[]),
            Err(SiftDbError::InvalidArgument(_))
        ));
        assert!(matches!(
            index.add_document(INVALID_DOC_ID, &[]),
            Err(SiftDbError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_shard_routing() {
        let index = small_index(vec![4, 16]);
        assert_eq!(index.shards().len(), 3);
        assert_eq!(index.shard_for(0).id(), 0);
        assert_eq!(index.shard_for(3).id(), 0);
        assert_eq!(index.shard_for(4).id(), 1);
        assert_eq!(index.shard_for(15).id(), 1);
        assert_eq!(index.shard_for(16).id(), 2);
        assert_eq!(index.shard_for(1000).id(), 2);
    }

    #[test]
    fn test_concurrent_ingestion() {
        use std::thread;
        let index = Arc::new(small_index(vec![]));
        let threads: Vec<_> = (0..4u64)
            .map(|t| {
                let index = Arc::clone(&index);
                thread::spawn(move || {
                    for i in 0..50u64 {
                        let doc_id = 1 + t * 50 + i;
                        index.add_document(doc_id, &[Term::new("a", 0)]).unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(index.document_count(), 200);
    }
}
