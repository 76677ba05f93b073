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

//! SiftDB Index
//!
//! The in-memory signature index: term-to-row mapping, bit-packed
//! per-shard document storage, and the ingestion substrate.
//!
//! # Core Components
//!
//! - **TermTable / treatments**: deterministic term-to-row mapping
//! - **Slice / RowTable / DocTable**: bit-packed document storage
//! - **Shard / IngestionIndex**: slot allocation, publication, routing
//! - **Recycler**: deferred destruction of fully-expired slices
//!
//! # Publication model
//!
//! A document becomes visible to queries in a single Release store of
//! its document-active bit, after every posting bit and blob write. A
//! query AND-masks its result with the Acquire-loaded active row, so it
//! sees each document fully indexed or not at all.

pub mod config;
pub mod doc_table;
pub mod document_handle;
pub mod ingestor;
pub mod prime_factors;
pub mod recycler;
pub mod row_table;
pub mod shard;
pub mod slice;
pub mod term_table;
pub mod treatment;

pub use config::IndexConfig;
pub use doc_table::{DocTableDescriptor, FixedSizeBlobId, VariableSizeBlobId};
pub use document_handle::DocumentHandle;
pub use ingestor::IngestionIndex;
pub use recycler::{Recycler, RecyclerHandle};
pub use row_table::RowTableDescriptor;
pub use shard::Shard;
pub use slice::{Slice, SliceLayout};
pub use term_table::{FactHandle, RowIdSequence, TermTable};
pub use treatment::{
    band_for_frequency, FrequencyBand, RowConfigEntry, RowConfiguration, TermTreatment,
};
