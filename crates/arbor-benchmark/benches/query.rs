use std::hint::black_box;

use arbor_generate::samples::Sample;
use arbor_query::Query;
use codspeed_criterion_compat::{Criterion, Throughput, criterion_group, criterion_main};

static QUERY: &str = r#"
(assignment name: (identifier) @name value: [(sum) (product)] @value)
((print_statement value: (identifier) @printed) (#eq? @printed "x1"))
(block "{" (_)* @body "}")
"#;

fn benchmark_query(c: &mut Criterion) {
    let language = Sample::Statements.language().unwrap();
    let text: String =
        (0..300).map(|i| format!("x{i} = {i} + 1;\n{{ print x{i}; y = x{i} * 2; }}\n")).collect();
    let tree = arbor_parse::parse(text.as_bytes(), &language).unwrap();
    let query = Query::new(&language, QUERY).unwrap();

    let mut group = c.benchmark_group("Query Benchmark");
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("matches", |b| {
        b.iter(|| black_box(arbor_query::query(&tree, &query).count()));
    });
    group.finish();
}

criterion_group!(benches, benchmark_query);
criterion_main!(benches);
