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

//! Error types for SiftDB
//!
//! Recoverable conditions (I/O, configuration, format mismatches) travel
//! through [`Result`]. Invariant violations - a queue shut down twice, a
//! document expired twice, an unsupported plan node - are programming
//! errors and abort via `panic!` at the detection site rather than being
//! threaded through every signature.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiftDbError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Capacity exhausted: {0}")]
    CapacityExhausted(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Shutting down: {0}")]
    ShuttingDown(String),
}

pub type Result<T> = std::result::Result<T, SiftDbError>;
