use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};

use examline_core::ids::EntityId;
use examline_core::parser::{find_in_context, parse_assessment, unwrap_envelope};

fn make_payload(questions: usize) -> Value {
    let questions: Vec<Value> = (0..questions)
        .map(|i| {
            json!({
                "id": i,
                "text": format!("Question number {i}"),
                "choices": [
                    {"id": i * 10, "text": "first", "is_correct": true},
                    {"id": i * 10 + 1, "text": "second"},
                    {"id": i * 10 + 2},
                    {"id": i * 10 + 3, "text": "fourth"}
                ]
            })
        })
        .collect();
    json!({
        "id": 1,
        "title": "Benchmark exam",
        "duration": "45",
        "questions": questions
    })
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_assessment");

    for size in [10, 100, 1000] {
        let payload = make_payload(size);
        group.bench_function(format!("{size}_questions"), |b| {
            b.iter(|| parse_assessment(black_box(&payload)))
        });
    }

    group.finish();
}

fn bench_context_search(c: &mut Criterion) {
    let context = json!({
        "courses": (0..50)
            .map(|i| json!({"id": i, "exams": [make_payload(5)]}))
            .collect::<Vec<_>>(),
    });
    let id = EntityId::from(1);

    c.bench_function("find_in_context", |b| {
        b.iter(|| find_in_context(black_box(&context), black_box(&id)))
    });

    c.bench_function("unwrap_envelope", |b| {
        b.iter(|| unwrap_envelope(black_box(json!({"result": true, "data": {"id": 1}}))))
    });
}

criterion_group!(benches, bench_parse, bench_context_search);
criterion_main!(benches);
