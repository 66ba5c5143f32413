// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use sentinel_events::aggregator::Aggregator;
use sentinel_events::event::decode;

/// A package with `tests` top-level tests, each with two subtests
fn transcript(tests: usize) -> String {
    let mut lines = Vec::with_capacity(tests * 10);
    for i in 0..tests {
        let name = format!("Test{i}");
        lines.push(format!(r#"{{"Action":"run","Package":"bench","Test":"{name}"}}"#));
        for sub in ["a", "b"] {
            lines.push(format!(
                r#"{{"Action":"run","Package":"bench","Test":"{name}/{sub}"}}"#
            ));
            lines.push(format!(
                r#"{{"Action":"output","Package":"bench","Test":"{name}/{sub}","Output":"=== RUN   {name}/{sub}\n"}}"#
            ));
        }
        lines.push(format!(
            r#"{{"Action":"pass","Package":"bench","Test":"{name}/a","Elapsed":0.001}}"#
        ));
        if i % 10 == 0 {
            lines.push(format!(
                r#"{{"Action":"output","Package":"bench","Test":"{name}/b","Output":"    bench_test.go:{i}: mismatch\n"}}"#
            ));
            lines.push(format!(
                r#"{{"Action":"output","Package":"bench","Test":"{name}/b","Output":"--- FAIL: {name}/b (0.00s)\n"}}"#
            ));
            lines.push(format!(
                r#"{{"Action":"fail","Package":"bench","Test":"{name}/b","Elapsed":0.001}}"#
            ));
        } else {
            lines.push(format!(
                r#"{{"Action":"pass","Package":"bench","Test":"{name}/b","Elapsed":0.001}}"#
            ));
        }
        lines.push(format!(
            r#"{{"Action":"pass","Package":"bench","Test":"{name}","Elapsed":0.002}}"#
        ));
    }
    lines.join("\n")
}

fn decode_benchmark(c: &mut Criterion) {
    let line = r#"{"Time":"2026-01-17T02:33:00.010100Z","Action":"output","Package":"example.com/calc","Test":"TestAdd/positive","Output":"=== RUN   TestAdd/positive\n"}"#;
    c.bench_function("decode_output_event", |b| {
        b.iter(|| decode(std::hint::black_box(line)))
    });
}

fn aggregate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_batch");
    for tests in [100, 1_000, 10_000] {
        let input = transcript(tests);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(tests), &input, |b, input| {
            let mut aggregator = Aggregator::default();
            b.iter(|| {
                aggregator
                    .process_batch(std::hint::black_box(input))
                    .map(<[_]>::len)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, decode_benchmark, aggregate_benchmark);
criterion_main!(benches);
