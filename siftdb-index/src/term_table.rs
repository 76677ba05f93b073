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

//! Term table: the term-to-row mapping.
//!
//! Per rank, the row index space is laid out as
//!
//! ```text
//! rank 0:  [ active | facts... | shared pool ......... | private ... ]
//! rank r:  [ shared pool ......resolve............... | private ... ]
//! ```
//!
//! Row 0 of rank 0 is the document-active row - the publication point
//! for every ingested document. Registered terms draw private rows from
//! the tail region; shared rows (registered or adhoc) are picked by
//! hashing the term's hash with one salt per row and reducing into the
//! shared pool. Given the same treatment, pool sizes and registrations,
//! two term tables always produce identical row sequences.
//!
//! The resulting sequence is sorted by (rank descending, row index
//! ascending), ties in salt order, and deduplicated.

use std::collections::HashMap;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use smallvec::SmallVec;
use tracing::debug;
use twox_hash::xxh3;

use siftdb_core::error::{Result, SiftDbError};
use siftdb_core::row_id::RowId;
use siftdb_core::term::Term;
use siftdb_core::types::{Rank, RowIndex, MAX_RANK};
use siftdb_core::SIFTDB_MAGIC;

use crate::treatment::{FrequencyBand, RowConfiguration, TermTreatment, MAX_FREQUENCY_BAND};

/// Ordered, deduplicated rows for one term.
pub type RowIdSequence = SmallVec<[RowId; 8]>;

/// Handle to a reserved fact row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FactHandle(u32);

pub(crate) const RANK_COUNT: usize = MAX_RANK as usize + 1;

/// On-disk format version.
const TERM_TABLE_VERSION: u32 = 1;

#[derive(Debug)]
struct ExplicitEntry {
    band: FrequencyBand,
    rows: RowIdSequence,
}

#[derive(Debug)]
pub struct TermTable {
    treatment: TermTreatment,
    fact_capacity: u32,
    fact_used: u32,
    shared_pool: [RowIndex; RANK_COUNT],
    private_used: [RowIndex; RANK_COUNT],
    explicit: HashMap<Term, ExplicitEntry>,
}

impl TermTable {
    /// Create a term table with `shared_rows` shared rows at each of the
    /// treatment's active ranks, and room for `fact_capacity` fact rows.
    pub fn new(treatment: TermTreatment, shared_rows: RowIndex, fact_capacity: u32) -> Self {
        let mut shared_pool = [0; RANK_COUNT];
        for &rank in treatment.active_ranks() {
            shared_pool[rank as usize] = shared_rows;
        }
        Self {
            treatment,
            fact_capacity,
            fact_used: 0,
            shared_pool,
            private_used: [0; RANK_COUNT],
            explicit: HashMap::new(),
        }
    }

    pub fn treatment(&self) -> TermTreatment {
        self.treatment
    }

    /// Rows reserved ahead of the shared pool: the document-active row
    /// and the fact rows, all at rank 0.
    fn system_count(&self, rank: Rank) -> RowIndex {
        if rank == 0 {
            1 + self.fact_capacity
        } else {
            0
        }
    }

    fn shared_start(&self, rank: Rank) -> RowIndex {
        self.system_count(rank)
    }

    fn private_start(&self, rank: Rank) -> RowIndex {
        self.system_count(rank) + self.shared_pool[rank as usize]
    }

    /// Total rows a shard must provision at `rank`.
    pub fn total_row_count(&self, rank: Rank) -> RowIndex {
        self.system_count(rank) + self.shared_pool[rank as usize] + self.private_used[rank as usize]
    }

    /// The well-known rank-0 row whose bit publishes a document.
    pub fn document_active_row(&self) -> RowId {
        RowId::new(0, 0)
    }

    /// Reserve a fact row.
    pub fn register_fact(&mut self) -> Result<FactHandle> {
        if self.fact_used >= self.fact_capacity {
            return Err(SiftDbError::CapacityExhausted(format!(
                "all {} fact rows in use",
                self.fact_capacity
            )));
        }
        let handle = FactHandle(self.fact_used);
        self.fact_used += 1;
        Ok(handle)
    }

    /// Row backing a fact.
    pub fn fact_row(&self, fact: FactHandle) -> RowId {
        assert!(fact.0 < self.fact_used, "fact handle was never registered");
        RowId::new(0, 1 + fact.0)
    }

    /// Register a term observed in `frequency` (fraction of documents).
    /// Registration assigns any private rows the treatment calls for;
    /// re-registering returns the existing assignment.
    pub fn register_term(&mut self, term: Term, frequency: f64) -> RowIdSequence {
        if let Some(entry) = self.explicit.get(&term) {
            return entry.rows.clone();
        }
        let band = crate::treatment::band_for_frequency(frequency);
        let config = self.treatment.configuration(band);
        let rows = self.assign_rows(term, &config);
        self.explicit.insert(
            term,
            ExplicitEntry {
                band,
                rows: rows.clone(),
            },
        );
        rows
    }

    /// Resolve a term to its rows. Registered terms use their recorded
    /// assignment; unknown terms fall back to the rarest band, which
    /// must be expressible without private rows - anything else is a
    /// configuration bug and aborts.
    pub fn get_rows(&self, term: &Term) -> RowIdSequence {
        if let Some(entry) = self.explicit.get(term) {
            return entry.rows.clone();
        }
        let config = self.treatment.configuration(MAX_FREQUENCY_BAND);
        assert!(
            !config.has_private_rows(),
            "treatment demands a private row for an unregistered term; \
             the term table was built without it"
        );
        self.assign_shared(term, &config)
    }

    fn assign_rows(&mut self, term: Term, config: &RowConfiguration) -> RowIdSequence {
        let mut rows: RowIdSequence = SmallVec::new();
        for entry in config.iter() {
            if entry.is_private {
                let rank = entry.rank as usize;
                for _ in 0..entry.row_count {
                    let index = self.private_start(entry.rank) + self.private_used[rank];
                    self.private_used[rank] += 1;
                    rows.push(RowId::new(entry.rank, index));
                }
            } else {
                rows.extend(self.shared_rows(&term, entry.rank, entry.row_count));
            }
        }
        sort_and_dedup(&mut rows);
        rows
    }

    fn assign_shared(&self, term: &Term, config: &RowConfiguration) -> RowIdSequence {
        let mut rows: RowIdSequence = SmallVec::new();
        for entry in config.iter() {
            rows.extend(self.shared_rows(term, entry.rank, entry.row_count));
        }
        sort_and_dedup(&mut rows);
        rows
    }

    fn shared_rows(&self, term: &Term, rank: Rank, count: u8) -> impl Iterator<Item = RowId> + '_ {
        let pool = self.shared_pool[rank as usize];
        assert!(
            pool > 0 || count == 0,
            "treatment assigns shared rank-{rank} rows but the shared pool is empty"
        );
        let start = self.shared_start(rank);
        let hash = term.hash();
        (0..count).map(move |salt| {
            let seed = ((rank as u64) << 8) | salt as u64;
            let h = xxh3::hash64_with_seed(&hash.to_le_bytes(), seed);
            RowId::new(rank, start + (h % pool as u64) as RowIndex)
        })
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Write the table in the little-endian binary format.
    pub fn save(&self, writer: &mut dyn Write) -> Result<()> {
        writer.write_all(&SIFTDB_MAGIC)?;
        writer.write_u32::<LittleEndian>(TERM_TABLE_VERSION)?;

        match self.treatment {
            TermTreatment::PrivateRank0 => {
                writer.write_u8(0)?;
                writer.write_f64::<LittleEndian>(0.0)?;
                writer.write_f64::<LittleEndian>(0.0)?;
            }
            TermTreatment::PrivateSharedRank0 { density, snr } => {
                writer.write_u8(1)?;
                writer.write_f64::<LittleEndian>(density)?;
                writer.write_f64::<LittleEndian>(snr)?;
            }
            TermTreatment::PrivateSharedRank0And3 { density, snr } => {
                writer.write_u8(2)?;
                writer.write_f64::<LittleEndian>(density)?;
                writer.write_f64::<LittleEndian>(snr)?;
            }
        }

        writer.write_u32::<LittleEndian>(self.fact_capacity)?;
        writer.write_u32::<LittleEndian>(self.fact_used)?;
        for rank in 0..RANK_COUNT {
            writer.write_u32::<LittleEndian>(self.shared_pool[rank])?;
        }
        for rank in 0..RANK_COUNT {
            writer.write_u32::<LittleEndian>(self.private_used[rank])?;
        }

        // Sort entries so the bytes are reproducible.
        let mut terms: Vec<(&Term, &ExplicitEntry)> = self.explicit.iter().collect();
        terms.sort_by_key(|(t, _)| (t.hash(), t.gram_size(), t.stream_id()));

        writer.write_u32::<LittleEndian>(terms.len() as u32)?;
        for (term, entry) in terms {
            writer.write_u64::<LittleEndian>(term.hash())?;
            writer.write_u8(term.gram_size())?;
            writer.write_u8(term.stream_id())?;
            writer.write_u8(entry.band)?;
            writer.write_u16::<LittleEndian>(entry.rows.len() as u16)?;
            for row in &entry.rows {
                writer.write_u64::<LittleEndian>(row.pack())?;
            }
        }
        Ok(())
    }

    /// Read a table written by [`save`](Self::save).
    pub fn load(reader: &mut dyn Read) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != SIFTDB_MAGIC {
            return Err(SiftDbError::Format("bad term table magic".into()));
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != TERM_TABLE_VERSION {
            return Err(SiftDbError::VersionMismatch {
                expected: TERM_TABLE_VERSION,
                actual: version,
            });
        }

        let tag = reader.read_u8()?;
        let density = reader.read_f64::<LittleEndian>()?;
        let snr = reader.read_f64::<LittleEndian>()?;
        let treatment = match tag {
            0 => TermTreatment::PrivateRank0,
            1 => TermTreatment::PrivateSharedRank0 { density, snr },
            2 => TermTreatment::PrivateSharedRank0And3 { density, snr },
            other => {
                return Err(SiftDbError::Configuration(format!(
                    "unknown treatment tag {other}"
                )))
            }
        };

        let fact_capacity = reader.read_u32::<LittleEndian>()?;
        let fact_used = reader.read_u32::<LittleEndian>()?;
        let mut shared_pool = [0; RANK_COUNT];
        for slot in shared_pool.iter_mut() {
            *slot = reader.read_u32::<LittleEndian>()?;
        }
        let mut private_used = [0; RANK_COUNT];
        for slot in private_used.iter_mut() {
            *slot = reader.read_u32::<LittleEndian>()?;
        }

        let term_count = reader.read_u32::<LittleEndian>()?;
        let mut explicit = HashMap::with_capacity(term_count as usize);
        for _ in 0..term_count {
            let hash = reader.read_u64::<LittleEndian>()?;
            let gram_size = reader.read_u8()?;
            let stream_id = reader.read_u8()?;
            let band = reader.read_u8()?;
            let row_count = reader.read_u16::<LittleEndian>()?;
            let mut rows: RowIdSequence = SmallVec::with_capacity(row_count as usize);
            for _ in 0..row_count {
                rows.push(RowId::unpack(reader.read_u64::<LittleEndian>()?));
            }
            explicit.insert(
                Term::from_parts(hash, gram_size, stream_id),
                ExplicitEntry { band, rows },
            );
        }

        debug!(terms = term_count, "term table loaded");
        Ok(Self {
            treatment,
            fact_capacity,
            fact_used,
            shared_pool,
            private_used,
            explicit,
        })
    }
}

fn sort_and_dedup(rows: &mut RowIdSequence) {
    rows.sort_by(|a, b| b.rank().cmp(&a.rank()).then(a.index().cmp(&b.index())));
    rows.dedup();
}
