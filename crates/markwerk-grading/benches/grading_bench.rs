// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the markwerk-grading crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use markwerk_core::{BubbleLayout, MarkMatrix, SheetId};
use markwerk_grading::{AnswerKey, Scorer};

/// Score a 100-question, 5-option sheet where every third answer is wrong
/// and every seventh is left blank.
fn bench_score_sheet(c: &mut Criterion) {
    let layout = BubbleLayout::new(100, 5, 0.2).unwrap();
    let key = AnswerKey::sample(&layout);
    let selections: Vec<Vec<usize>> = (0..100usize)
        .map(|row| match row {
            r if r % 7 == 0 => vec![],
            r if r % 3 == 0 => vec![(r + 1) % 5],
            r => vec![r % 5],
        })
        .collect();
    let matrix = MarkMatrix::from_selections(5, &selections).unwrap();
    let scorer = Scorer::default();

    c.bench_function("score (100x5)", |b| {
        b.iter(|| {
            black_box(
                scorer
                    .score(SheetId::new("bench"), black_box(&matrix), &key, None)
                    .unwrap(),
            )
        });
    });
}

fn bench_key_parse(c: &mut Criterion) {
    let layout = BubbleLayout::new(100, 5, 0.2).unwrap();
    let json = AnswerKey::sample(&layout).to_json_pretty().unwrap();

    c.bench_function("answer key parse (100 questions)", |b| {
        b.iter(|| black_box(AnswerKey::from_json_str(black_box(&json), &layout).unwrap()));
    });
}

criterion_group!(benches, bench_score_sheet, bench_key_parse);
criterion_main!(benches);
