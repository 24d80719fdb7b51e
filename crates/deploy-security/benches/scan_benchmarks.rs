use criterion::{Criterion, black_box, criterion_group, criterion_main};
use deploy_fs::NormalizedPath;
use deploy_meta::ConfigurationBundle;
use deploy_security::{SecurityScanner, TrustScorer};
use serde_json::{Map, json};

fn large_bundle(n: usize) -> ConfigurationBundle {
    let prompts: Vec<_> = (0..n)
        .map(|i| json!({"id": format!("prompt-{i}"), "content": "Summarize the change and list risks. ".repeat(20)}))
        .collect();
    let tasks: Vec<_> = (0..n)
        .map(|i| json!({"id": format!("task-{i}"), "command": "cargo", "args": ["test", "--workspace"]}))
        .collect();
    ConfigurationBundle::from_value(json!({
        "metadata": {"version": "1.0.0"},
        "components": {"ai-prompts": prompts, "tasks": tasks}
    }))
    .unwrap()
}

fn scan_benchmark(c: &mut Criterion) {
    let scanner = SecurityScanner::default();
    let bundle = large_bundle(200);

    c.bench_function("scanner::scan 400 components", |b| {
        b.iter(|| scanner.scan(black_box(&bundle)))
    });
}

fn trust_benchmark(c: &mut Criterion) {
    let scorer = TrustScorer::default();
    let path = NormalizedPath::new("/home/dev/projects/service");
    let settings = Map::new();

    c.bench_function("trust::score", |b| {
        b.iter(|| scorer.score(black_box(&path), black_box(&settings)))
    });
}

criterion_group!(benches, scan_benchmark, trust_benchmark);
criterion_main!(benches);
