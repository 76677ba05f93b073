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

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use siftdb_query::compile_node::CompileArena;
use siftdb_query::compiler::RankDownCompiler;
use siftdb_query::plan_text::parse_plan;
use siftdb_query::rewriter::MatchTreeRewriter;
use siftdb_query::row_match_node::RowMatchArena;

const THREE_ORS: &str = "And { Children: [
    Or { Children: [ Row(1, 0, 0, false), Row(2, 0, 0, false), Row(3, 0, 0, false) ] },
    Or { Children: [ Row(4, 0, 0, false), Row(5, 0, 0, false), Row(6, 0, 0, false) ] },
    Or { Children: [ Row(7, 0, 0, false), Row(8, 0, 0, false), Row(9, 0, 0, false) ] } ] }";

const MIXED_RANKS: &str = "And { Children: [
    Row(0, 0, 0, false),
    Row(1, 3, 0, false),
    Row(2, 6, 0, false),
    Not { Child: Row(3, 6, 0, false) },
    Or { Children: [ Row(4, 3, 0, false), Row(5, 3, 0, false) ] } ] }";

fn bench_rewrite(c: &mut Criterion) {
    c.bench_function("rewrite_three_ors", |b| {
        b.iter(|| {
            let mut arena = RowMatchArena::new();
            let root = parse_plan(&mut arena, THREE_ORS).unwrap();
            black_box(MatchTreeRewriter::rewrite(&mut arena, root, 8, 4))
        })
    });

    c.bench_function("rewrite_and_compile_mixed_ranks", |b| {
        b.iter(|| {
            let mut arena = RowMatchArena::new();
            let root = parse_plan(&mut arena, MIXED_RANKS).unwrap();
            let rewritten = MatchTreeRewriter::rewrite(&mut arena, root, 8, 4);
            let mut out = CompileArena::new();
            let mut compiler = RankDownCompiler::new(&arena, &mut out);
            compiler.compile(rewritten);
            let rank = compiler.initial_rank();
            black_box(compiler.create_tree(rank))
        })
    });
}

criterion_group!(benches, bench_rewrite);
criterion_main!(benches);
