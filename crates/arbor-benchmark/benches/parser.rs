use std::hint::black_box;

use arbor_generate::samples::Sample;
use codspeed_criterion_compat::{
    BenchmarkId, Criterion, Throughput, criterion_group, criterion_main,
};

fn statements(count: usize) -> String {
    (0..count)
        .map(|i| format!("x{i} = {i} + y * (z + {i});\n{{ print x{i}; # done\n}}\n"))
        .collect()
}

fn json(count: usize) -> String {
    let items: Vec<String> = (0..count)
        .map(|i| {
            format!(r#"{{"id": {i}, "name": "item {i}", "tags": [true, null], "score": -{i}.5}}"#)
        })
        .collect();
    format!("[{}]", items.join(",\n"))
}

fn benchmark_parser(c: &mut Criterion) {
    let inputs = [
        ("statements", Sample::Statements, statements(200)),
        ("json", Sample::Json, json(200)),
        ("ambiguous", Sample::Ambiguous, "a * b;\nc * d * e;\n% ;\n".repeat(200)),
    ];

    let mut group = c.benchmark_group("Parser Benchmark");

    for (name, sample, text) in &inputs {
        let language = sample.language().unwrap();
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", name), text, |b, text| {
            b.iter(|| {
                let tree = arbor_parse::parse(text.as_bytes(), &language).unwrap();
                black_box(tree);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_parser);
criterion_main!(benches);
