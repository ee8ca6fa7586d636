use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rule_engine::compile_model;

fn rule_source(num_rules: usize) -> String {
    let rules: Vec<String> = (0..num_rules)
        .map(|i| {
            format!(
                r#"{{"rule_code":"R{i}","priority":{i},"conditions":[
                    {{"field":"status","operator":"EQUAL_TO","value":"ACTIVE"}},
                    {{"field":"country","operator":"IS_ANY_OF","value":["US","CA","UK"]}},
                    {{"field":"age","operator":"BETWEEN","value":[18,65]}}
                ]}}"#
            )
        })
        .collect();
    format!("[{}]", rules.join(","))
}

fn bench_compile(c: &mut Criterion) {
    let small = rule_source(50);
    let large = rule_source(2_000);

    c.bench_function("compile_50_rules", |b| {
        b.iter(|| compile_model(black_box(&small)).unwrap());
    });

    c.bench_function("compile_2000_rules", |b| {
        b.iter(|| compile_model(black_box(&large)).unwrap());
    });
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
