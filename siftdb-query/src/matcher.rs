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

//! The matcher: executes a compiled plan against a slice.
//!
//! The driver walks the slice in windows of one 64-bit word at the
//! plan's entry rank. The accumulator starts all-ones; `AndRowJz` ANDs
//! row words in and abandons the window once it zeroes; `RankDown`
//! splits the window in two and fans each accumulator bit across both
//! halves; `Report` refines the survivors with its rank-0 child value,
//! masks them with the Acquire-loaded document-active word - the
//! publication point - and emits one hit per set bit.
//!
//! A row consumed below its native rank (`rank_delta > 0`) loads a
//! smaller chunk of its physical word and stretches each bit
//! `2^delta`-fold, the bitmap equivalent of the OR-collapse the rank
//! encodes.

use std::sync::atomic::Ordering;

use siftdb_core::types::{docs_per_word, DocIndex, Rank};
use siftdb_index::Slice;

use crate::compile_node::{CompileArena, CompileNode, CompileRef};
use crate::row_match_node::AbstractRow;

/// Run a compiled plan over one slice, returning matching doc indexes
/// in ascending order.
pub fn match_slice(
    arena: &CompileArena,
    tree: CompileRef,
    initial_rank: Rank,
    slice: &Slice,
) -> Vec<DocIndex> {
    let words = slice.capacity() / docs_per_word(initial_rank);
    debug_assert!(words > 0, "slice capacity below one window");

    let mut executor = Executor {
        arena,
        slice,
        matches: Vec::new(),
    };
    for word in 0..words {
        executor.exec(tree, initial_rank, word, u64::MAX);
    }
    executor.matches
}

struct Executor<'a> {
    arena: &'a CompileArena,
    slice: &'a Slice,
    matches: Vec<DocIndex>,
}

impl Executor<'_> {
    /// Execute a chain node at (`rank`, `word`) with accumulator `acc`.
    fn exec(&mut self, node: CompileRef, rank: Rank, word: usize, acc: u64) {
        match self.arena[node] {
            CompileNode::AndRowJz { row, next } => {
                let acc = acc & self.load_row_word(row, rank, word);
                if acc != 0 {
                    self.exec(next, rank, word, acc);
                }
            }
            CompileNode::RankDown { rank: new_rank, child } => {
                debug_assert!(new_rank < rank);
                let delta = rank - new_rank;
                for sub in 0..(1usize << delta) {
                    let acc = stretch_portion(acc, delta, sub);
                    if acc != 0 {
                        self.exec(child, new_rank, (word << delta) + sub, acc);
                    }
                }
            }
            CompileNode::OrTree { left, right } => {
                // Branches of an expanded OR: each reports on its own.
                self.exec(left, rank, word, acc);
                self.exec(right, rank, word, acc);
            }
            CompileNode::AndTree { left, right } => {
                let acc = acc & self.eval(left, rank, word);
                if acc != 0 {
                    self.exec(right, rank, word, acc);
                }
            }
            CompileNode::Report { child } => {
                assert_eq!(rank, 0, "Report executed above rank 0");
                let refine = match child {
                    Some(child) => self.eval(child, 0, word),
                    None => u64::MAX,
                };
                let hits = acc & refine & self.slice.active_word(word);
                let mut remaining = hits;
                while remaining != 0 {
                    let bit = remaining.trailing_zeros() as usize;
                    self.matches.push(word * 64 + bit);
                    remaining &= remaining - 1;
                }
            }
            CompileNode::LoadRow(_) | CompileNode::Not { .. } => {
                panic!("value node executed in chain position")
            }
        }
    }

    /// Pointwise value of a rank-0 subtree at `word`.
    fn eval(&self, node: CompileRef, rank: Rank, word: usize) -> u64 {
        match self.arena[node] {
            CompileNode::LoadRow(row) => self.load_row_word(row, rank, word),
            CompileNode::AndTree { left, right } => {
                self.eval(left, rank, word) & self.eval(right, rank, word)
            }
            CompileNode::OrTree { left, right } => {
                self.eval(left, rank, word) | self.eval(right, rank, word)
            }
            CompileNode::Not { child } => !self.eval(child, rank, word),
            ref other => panic!("chain node evaluated in value position: {other:?}"),
        }
    }

    /// One 64-bit word of `row` at its consumed rank, window `word`.
    fn load_row_word(&self, row: AbstractRow, rank: Rank, word: usize) -> u64 {
        debug_assert_eq!(row.rank(), rank, "row consumed at the wrong rank");
        let table = self.slice.layout().row_table(row.native_rank());
        let delta = row.rank_delta();

        if delta == 0 {
            return table.get_word(self.slice.buffer(), row.id(), word, Ordering::Relaxed);
        }
        if delta >= 6 {
            // One physical bit covers the entire 64-bit window.
            let native_bit = (word * 64) >> delta;
            let physical = table.get_word(
                self.slice.buffer(),
                row.id(),
                native_bit >> 6,
                Ordering::Relaxed,
            );
            return if physical >> (native_bit & 63) & 1 != 0 {
                u64::MAX
            } else {
                0
            };
        }

        // A 64 >> delta bit chunk of the physical row, stretched.
        let chunk_bits = 64 >> delta;
        let native_first_bit = word * chunk_bits;
        let physical = table.get_word(
            self.slice.buffer(),
            row.id(),
            native_first_bit >> 6,
            Ordering::Relaxed,
        );
        let chunk = (physical >> (native_first_bit & 63)) & ((1u64 << chunk_bits) - 1);
        stretch_bits(chunk, delta)
    }
}

/// Duplicate each of the low `64 >> delta` bits of `chunk` into a run
/// of `2^delta` bits, filling the word.
fn stretch_bits(chunk: u64, delta: Rank) -> u64 {
    let mut value = chunk;
    for _ in 0..delta {
        value = double_bits(value);
    }
    value
}

/// Spread the low 32 bits so each occupies two positions.
fn double_bits(value: u64) -> u64 {
    let mut v = value & 0xFFFF_FFFF;
    v = (v | (v << 16)) & 0x0000_FFFF_0000_FFFF;
    v = (v | (v << 8)) & 0x00FF_00FF_00FF_00FF;
    v = (v | (v << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    v = (v | (v << 2)) & 0x3333_3333_3333_3333;
    v = (v | (v << 1)) & 0x5555_5555_5555_5555;
    v | (v << 1)
}

/// For a rank descent of `delta`, the stretched accumulator for
/// sub-window `sub`: the relevant `64 >> delta` bits, each fanned out
/// `2^delta`-fold.
fn stretch_portion(acc: u64, delta: Rank, sub: usize) -> u64 {
    let chunk_bits = 64 >> delta;
    let chunk = (acc >> (sub * chunk_bits)) & mask(chunk_bits);
    stretch_bits(chunk, delta)
}

#[inline]
fn mask(bits: usize) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}
