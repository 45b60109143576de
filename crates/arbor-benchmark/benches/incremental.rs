use std::hint::black_box;

use arbor_generate::samples::Sample;
use arbor_parse::{InputEdit, Parser};
use codspeed_criterion_compat::{
    BenchmarkId, Criterion, Throughput, criterion_group, criterion_main,
};

fn source(count: usize) -> String {
    (0..count).map(|i| format!("v{i} = {i} * (w + {i});\nprint v{i};\n")).collect()
}

/// Reparsing after a one-character edit in the middle of the file, against a
/// parse of the same text from scratch.
fn benchmark_incremental(c: &mut Criterion) {
    let language = Sample::Statements.language().unwrap();
    let mut group = c.benchmark_group("Incremental Benchmark");

    for count in [50, 500] {
        let text = source(count);
        let middle = text.find(&format!("= {} *", count / 2)).unwrap() + 2;
        let mut parser = Parser::new(language.clone());
        let old = parser.parse(text.as_bytes()).unwrap();
        let (edit, new_text) =
            InputEdit::replace(text.as_bytes(), middle..middle + 1, b"7").unwrap();

        group.throughput(Throughput::Bytes(new_text.len() as u64));
        group.bench_with_input(BenchmarkId::new("fresh", count), &new_text, |b, new_text| {
            b.iter(|| black_box(parser.parse(new_text).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("reparse", count), &new_text, |b, new_text| {
            b.iter(|| black_box(parser.edit(&old, &edit, new_text).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_incremental);
criterion_main!(benches);
