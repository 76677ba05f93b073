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

//! Filesystem abstraction.
//!
//! The index only touches storage to persist term tables and slice
//! backups, so the surface is two stream factories. [`OsFileSystem`]
//! maps paths under a root directory; [`RamFileSystem`] keeps whole
//! files in memory and backs the persistence tests.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Result, SiftDbError};

pub trait FileSystem: Send + Sync {
    fn open_for_read(&self, path: &str) -> Result<Box<dyn Read + Send>>;
    fn open_for_write(&self, path: &str) -> Result<Box<dyn Write + Send>>;
    fn exists(&self, path: &str) -> bool;
}

/// Real files under a root directory.
pub struct OsFileSystem {
    root: PathBuf,
}

impl OsFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl FileSystem for OsFileSystem {
    fn open_for_read(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let file = File::open(self.resolve(path))?;
        Ok(Box::new(file))
    }

    fn open_for_write(&self, path: &str) -> Result<Box<dyn Write + Send>> {
        let file = File::create(self.resolve(path))?;
        Ok(Box::new(file))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }
}

type FileMap = Arc<RwLock<HashMap<String, Arc<Vec<u8>>>>>;

/// In-memory filesystem. Writers publish their contents when dropped.
#[derive(Default, Clone)]
pub struct RamFileSystem {
    files: FileMap,
}

impl RamFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all files written so far.
    pub fn file_names(&self) -> Vec<String> {
        self.files.read().keys().cloned().collect()
    }
}

impl FileSystem for RamFileSystem {
    fn open_for_read(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let files = self.files.read();
        let content = files
            .get(path)
            .ok_or_else(|| SiftDbError::NotFound(path.to_string()))?;
        Ok(Box::new(Cursor::new(content.as_ref().clone())))
    }

    fn open_for_write(&self, path: &str) -> Result<Box<dyn Write + Send>> {
        Ok(Box::new(RamWriter {
            name: path.to_string(),
            buffer: Vec::new(),
            files: Arc::clone(&self.files),
        }))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.read().contains_key(path)
    }
}

struct RamWriter {
    name: String,
    buffer: Vec<u8>,
    files: FileMap,
}

impl Write for RamWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for RamWriter {
    fn drop(&mut self) {
        self.files
            .write()
            .insert(self.name.clone(), Arc::new(std::mem::take(&mut self.buffer)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ram_roundtrip() {
        let fs = RamFileSystem::new();
        {
            let mut w = fs.open_for_write("a/b.bin").unwrap();
            w.write_all(b"hello").unwrap();
        }
        assert!(fs.exists("a/b.bin"));
        let mut r = fs.open_for_read("a/b.bin").unwrap();
        let mut content = Vec::new();
        r.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"hello");
    }

    #[test]
    fn test_ram_missing_file() {
        let fs = RamFileSystem::new();
        assert!(fs.open_for_read("missing").is_err());
        assert!(!fs.exists("missing"));
    }

    #[test]
    fn test_os_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let fs = OsFileSystem::new(dir.path());
        {
            let mut w = fs.open_for_write("table.bin").unwrap();
            w.write_all(&[1, 2, 3]).unwrap();
        }
        let mut r = fs.open_for_read("table.bin").unwrap();
        let mut content = Vec::new();
        r.read_to_end(&mut content).unwrap();
        assert_eq!(content, &[1, 2, 3]);
    }
}
