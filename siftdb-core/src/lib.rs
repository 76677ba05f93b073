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

//! SiftDB Core
//!
//! Foundation crate of the SiftDB signature search engine: the primitive
//! semantic types (documents, ranks, rows, terms), the plan arena, and
//! the concurrency substrate (blocking queue, task pool) shared by the
//! index and query crates.
//!
//! # Core Components
//!
//! - **Types**: `DocId`, `DocIndex`, `Rank`, `RowIndex` and sentinels
//! - **Term**: stream-tagged 64-bit term hashes with n-gram composition
//! - **Arena**: per-query bump arenas for plan trees
//! - **BlockingQueue / TaskPool**: bounded MPMC queue with
//!   drain-on-shutdown, and the worker pool built on it
//! - **FileSystem**: the two-method storage abstraction the index
//!   persists through

pub mod arena;
pub mod error;
pub mod filesystem;
pub mod queue;
pub mod row_id;
pub mod task_pool;
pub mod term;
pub mod types;

pub use arena::{Arena, NodeId};
pub use error::{Result, SiftDbError};
pub use filesystem::{FileSystem, OsFileSystem, RamFileSystem};
pub use queue::BlockingQueue;
pub use row_id::RowId;
pub use task_pool::{Command, CommandType, TaskPool};
pub use term::{StreamId, Term};
pub use types::{
    docs_per_word, DocId, DocIndex, Rank, RowIndex, ShardId, INVALID_DOC_ID, INVALID_DOC_INDEX,
    MAX_RANK,
};

/// Crate version.
pub const SIFTDB_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Magic bytes for SiftDB files.
pub const SIFTDB_MAGIC: [u8; 4] = *b"SIFT";
