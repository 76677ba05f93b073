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

//! Plan text format.
//!
//! Row match trees serialize to a whitespace-insensitive text form used
//! by the rewriter tests and for debugging:
//!
//! ```text
//! And { Children: [ Row(0, 0, 0, false), Report { Child: } ] }
//! Or  { Children: [ ... ] }
//! Not { Child: ... }
//! Row(rowIndex, rank, rankDelta, recycled)
//! Report { Child: <node or empty> }
//! ```
//!
//! Nested And/Or chains print flattened into one `Children` list.

use siftdb_core::error::{Result, SiftDbError};

use crate::row_match_node::{
    flatten_and, flatten_or, AbstractRow, RowMatchArena, RowMatchNode, RowMatchRef,
};

// ----------------------------------------------------------------------
// Formatting
// ----------------------------------------------------------------------

/// Render a tree in the plan text format.
pub fn format_plan(arena: &RowMatchArena, root: RowMatchRef) -> String {
    let mut out = String::new();
    format_node(arena, root, &mut out);
    out
}

fn format_node(arena: &RowMatchArena, node: RowMatchRef, out: &mut String) {
    match arena[node] {
        RowMatchNode::And { .. } => {
            let mut children = Vec::new();
            flatten_and(arena, node, &mut children);
            format_children(arena, "And", &children, out);
        }
        RowMatchNode::Or { .. } => {
            let mut children = Vec::new();
            flatten_or(arena, node, &mut children);
            format_children(arena, "Or", &children, out);
        }
        RowMatchNode::Not { child } => {
            out.push_str("Not { Child: ");
            format_node(arena, child, out);
            out.push_str(" }");
        }
        RowMatchNode::Row(row) => {
            out.push_str(&format!(
                "Row({}, {}, {}, {})",
                row.id(),
                row.rank(),
                row.rank_delta(),
                row.is_recycled()
            ));
        }
        RowMatchNode::Report { child } => {
            out.push_str("Report { Child:");
            if let Some(child) = child {
                out.push(' ');
                format_node(arena, child, out);
            }
            out.push_str(" }");
        }
    }
}

fn format_children(arena: &RowMatchArena, name: &str, children: &[RowMatchRef], out: &mut String) {
    out.push_str(name);
    out.push_str(" { Children: [");
    for (i, &child) in children.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push(' ');
        format_node(arena, child, out);
    }
    out.push_str(" ] }");
}

// ----------------------------------------------------------------------
// Parsing
// ----------------------------------------------------------------------

/// Parse the plan text format into `arena`.
pub fn parse_plan(arena: &mut RowMatchArena, text: &str) -> Result<RowMatchRef> {
    let mut parser = Parser {
        bytes: text.as_bytes(),
        position: 0,
    };
    let root = parser.parse_node(arena)?;
    parser.skip_whitespace();
    if parser.position != parser.bytes.len() {
        return Err(parse_error(&parser, "trailing input"));
    }
    Ok(root)
}

/// Compare two plan texts, ignoring whitespace.
pub fn same_except_for_whitespace(a: &str, b: &str) -> bool {
    let squash = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
    squash(a) == squash(b)
}

struct Parser<'a> {
    bytes: &'a [u8],
    position: usize,
}

fn parse_error(parser: &Parser<'_>, message: &str) -> SiftDbError {
    SiftDbError::Parse(format!("{message} at byte {}", parser.position))
}

impl<'a> Parser<'a> {
    fn skip_whitespace(&mut self) {
        while self
            .bytes
            .get(self.position)
            .is_some_and(|b| b.is_ascii_whitespace())
        {
            self.position += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.bytes.get(self.position).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.position += 1;
            Ok(())
        } else {
            Err(parse_error(self, &format!("expected '{}'", byte as char)))
        }
    }

    fn identifier(&mut self) -> Result<&'a str> {
        self.skip_whitespace();
        let start = self.position;
        while self
            .bytes
            .get(self.position)
            .is_some_and(|b| b.is_ascii_alphanumeric())
        {
            self.position += 1;
        }
        if start == self.position {
            return Err(parse_error(self, "expected identifier"));
        }
        Ok(std::str::from_utf8(&self.bytes[start..self.position]).expect("ascii identifier"))
    }

    fn keyword(&mut self, word: &str) -> Result<()> {
        let found = self.identifier()?;
        if found == word {
            Ok(())
        } else {
            Err(parse_error(self, &format!("expected '{word}', found '{found}'")))
        }
    }

    fn number(&mut self) -> Result<u64> {
        self.skip_whitespace();
        let start = self.position;
        while self
            .bytes
            .get(self.position)
            .is_some_and(|b| b.is_ascii_digit())
        {
            self.position += 1;
        }
        if start == self.position {
            return Err(parse_error(self, "expected number"));
        }
        std::str::from_utf8(&self.bytes[start..self.position])
            .expect("ascii digits")
            .parse()
            .map_err(|_| parse_error(self, "number out of range"))
    }

    fn boolean(&mut self) -> Result<bool> {
        match self.identifier()? {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(parse_error(self, "expected 'true' or 'false'")),
        }
    }

    fn parse_node(&mut self, arena: &mut RowMatchArena) -> Result<RowMatchRef> {
        let name = self.identifier()?;
        match name {
            "Row" => self.parse_row(arena),
            "And" => self.parse_variadic(arena, true),
            "Or" => self.parse_variadic(arena, false),
            "Not" => {
                self.expect(b'{')?;
                self.keyword("Child")?;
                self.expect(b':')?;
                let child = self.parse_node(arena)?;
                self.expect(b'}')?;
                Ok(arena.alloc(RowMatchNode::Not { child }))
            }
            "Report" => {
                self.expect(b'{')?;
                self.keyword("Child")?;
                self.expect(b':')?;
                let child = if self.peek() == Some(b'}') {
                    None
                } else {
                    Some(self.parse_node(arena)?)
                };
                self.expect(b'}')?;
                Ok(arena.alloc(RowMatchNode::Report { child }))
            }
            other => Err(parse_error(self, &format!("unknown node '{other}'"))),
        }
    }

    fn parse_row(&mut self, arena: &mut RowMatchArena) -> Result<RowMatchRef> {
        self.expect(b'(')?;
        let id = self.number()?;
        self.expect(b',')?;
        let rank = self.number()?;
        self.expect(b',')?;
        let delta = self.number()?;
        self.expect(b',')?;
        let recycled = self.boolean()?;
        self.expect(b')')?;
        Ok(arena.alloc(RowMatchNode::Row(AbstractRow::with_delta(
            id as u32,
            rank as u8,
            delta as u8,
            recycled,
        ))))
    }

    fn parse_variadic(&mut self, arena: &mut RowMatchArena, and: bool) -> Result<RowMatchRef> {
        self.expect(b'{')?;
        self.keyword("Children")?;
        self.expect(b':')?;
        self.expect(b'[')?;

        let mut children = Vec::new();
        loop {
            children.push(self.parse_node(arena)?);
            match self.peek() {
                Some(b',') => {
                    self.position += 1;
                }
                Some(b']') => break,
                _ => return Err(parse_error(self, "expected ',' or ']'")),
            }
        }
        self.position += 1; // consume ']'
        self.expect(b'}')?;

        if children.len() < 2 {
            return Err(parse_error(self, "And/Or needs at least two children"));
        }
        Ok(if and {
            crate::row_match_node::and_chain(arena, &children)
        } else {
            crate::row_match_node::or_chain(arena, &children)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(text: &str) -> String {
        let mut arena = RowMatchArena::new();
        let root = parse_plan(&mut arena, text).unwrap();
        format_plan(&arena, root)
    }

    #[test]
    fn test_row_roundtrip() {
        assert_eq!(roundtrip("Row(3, 6, 0, false)"), "Row(3, 6, 0, false)");
        assert_eq!(roundtrip("Row(2, 0, 6, true)"), "Row(2, 0, 6, true)");
    }

    #[test]
    fn test_tree_roundtrip_ignoring_whitespace() {
        let text = "
            And {
              Children: [
                Row(0, 0, 0, false),
                Not { Child: Row(2, 6, 0, false) },
                Report { Child: }
              ]
            }";
        let printed = roundtrip(text);
        assert!(same_except_for_whitespace(&printed, text));
    }

    #[test]
    fn test_nested_chains_flatten() {
        // Binary nesting prints as one flattened child list.
        let mut arena = RowMatchArena::new();
        let rows: Vec<_> = (0..3)
            .map(|i| arena.alloc(RowMatchNode::Row(AbstractRow::new(i, 0, false))))
            .collect();
        let chain = crate::row_match_node::and_chain(&mut arena, &rows);
        assert!(same_except_for_whitespace(
            &format_plan(&arena, chain),
            "And { Children: [ Row(0,0,0,false), Row(1,0,0,false), Row(2,0,0,false) ] }"
        ));
    }

    #[test]
    fn test_report_with_child() {
        let text = "Report { Child: Not { Child: Row(3, 0, 6, false) } }";
        assert!(same_except_for_whitespace(&roundtrip(text), text));
    }

    #[test]
    fn test_parse_errors() {
        let mut arena = RowMatchArena::new();
        assert!(parse_plan(&mut arena, "Bogus(1)").is_err());
        assert!(parse_plan(&mut arena, "Row(1, 2)").is_err());
        assert!(parse_plan(&mut arena, "And { Children: [ Row(0,0,0,false) ] }").is_err());
        assert!(parse_plan(&mut arena, "Row(0,0,0,false) junk").is_err());
    }
}
