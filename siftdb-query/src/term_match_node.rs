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

//! Term match trees - the query as the caller expresses it, before
//! terms are resolved to rows.

use smallvec::SmallVec;

use siftdb_core::arena::{Arena, NodeId};
use siftdb_core::term::{StreamId, Term};
use siftdb_index::FactHandle;

#[derive(Debug, Clone, PartialEq)]
pub enum TermMatchNode {
    And {
        left: TermMatchRef,
        right: TermMatchRef,
    },
    Or {
        left: TermMatchRef,
        right: TermMatchRef,
    },
    Not {
        child: TermMatchRef,
    },
    Unigram(Term),
    Phrase {
        terms: SmallVec<[Term; 4]>,
    },
    Fact(FactHandle),
}

pub type TermMatchArena = Arena<TermMatchNode>;
pub type TermMatchRef = NodeId<TermMatchNode>;

pub fn unigram(arena: &mut TermMatchArena, text: &str, stream: StreamId) -> TermMatchRef {
    arena.alloc(TermMatchNode::Unigram(Term::new(text, stream)))
}

pub fn phrase(arena: &mut TermMatchArena, words: &[&str], stream: StreamId) -> TermMatchRef {
    assert!(!words.is_empty(), "empty phrase");
    let terms = words.iter().map(|w| Term::new(w, stream)).collect();
    arena.alloc(TermMatchNode::Phrase { terms })
}

pub fn fact(arena: &mut TermMatchArena, handle: FactHandle) -> TermMatchRef {
    arena.alloc(TermMatchNode::Fact(handle))
}

pub fn not(arena: &mut TermMatchArena, child: TermMatchRef) -> TermMatchRef {
    arena.alloc(TermMatchNode::Not { child })
}

/// Left-fold an AND over `items`.
pub fn all_of(arena: &mut TermMatchArena, items: &[TermMatchRef]) -> TermMatchRef {
    fold(arena, items, true)
}

/// Left-fold an OR over `items`.
pub fn any_of(arena: &mut TermMatchArena, items: &[TermMatchRef]) -> TermMatchRef {
    fold(arena, items, false)
}

fn fold(arena: &mut TermMatchArena, items: &[TermMatchRef], and: bool) -> TermMatchRef {
    assert!(!items.is_empty(), "cannot fold an empty node list");
    let mut acc = items[0];
    for &item in &items[1..] {
        acc = arena.alloc(if and {
            TermMatchNode::And {
                left: acc,
                right: item,
            }
        } else {
            TermMatchNode::Or {
                left: acc,
                right: item,
            }
        });
    }
    acc
}

/// AND of unigrams, the common hand-typed query shape.
pub fn conjunction_of_words(
    arena: &mut TermMatchArena,
    words: &[&str],
    stream: StreamId,
) -> TermMatchRef {
    let nodes: Vec<_> = words.iter().map(|w| unigram(arena, w, stream)).collect();
    all_of(arena, &nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let mut arena = TermMatchArena::new();
        let a = unigram(&mut arena, "blood", 0);
        let b = unigram(&mut arena, "red", 0);
        let and = all_of(&mut arena, &[a, b]);
        match arena[and] {
            TermMatchNode::And { left, right } => {
                assert_eq!(left, a);
                assert_eq!(right, b);
            }
            ref other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_phrase_holds_terms_in_order() {
        let mut arena = TermMatchArena::new();
        let p = phrase(&mut arena, &["new", "york"], 0);
        match &arena[p] {
            TermMatchNode::Phrase { terms } => {
                assert_eq!(terms.len(), 2);
                assert_eq!(terms[0], Term::new("new", 0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
