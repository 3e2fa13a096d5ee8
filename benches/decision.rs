use std::sync::Arc;

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use mantic::theory::{classical_specs, TheoryError};
use mantic::{
    BirthCertainty, ConflictPolicy, ConflictResolver, Gender, Judgment, StandardAnswer,
    TheoryAnalysisResult, TheoryCalculator, TheoryCatalog, TheorySelector, TheorySpec, UserInput,
};

struct Stub(TheorySpec);

impl TheoryCalculator for Stub {
    fn spec(&self) -> &TheorySpec {
        &self.0
    }

    fn calculate(&self, _input: &UserInput) -> Result<serde_json::Value, TheoryError> {
        Ok(serde_json::Value::Null)
    }
}

fn full_catalog() -> TheoryCatalog {
    let mut catalog = TheoryCatalog::new();
    for spec in classical_specs() {
        catalog.register(Arc::new(Stub(spec))).unwrap();
    }
    catalog
}

fn bench_select(c: &mut Criterion) {
    let catalog = full_catalog();
    let selector = TheorySelector::new();
    let input = UserInput::builder()
        .question("career", "Should I take the position abroad?")
        .current_time(Utc.with_ymd_and_hms(2024, 10, 8, 14, 30, 0).unwrap())
        .birth_date(1991, 3, 12)
        .birth_time(9, Some(20), BirthCertainty::Approximate)
        .gender(Gender::Female)
        .numbers(vec![5, 2, 8])
        .build()
        .unwrap();

    c.bench_function("select/full_catalog", |b| {
        b.iter(|| selector.select(black_box(&input), &catalog, 3, 5).unwrap());
    });
}

fn bench_resolve(c: &mut Criterion) {
    let resolver = ConflictResolver::new(ConflictPolicy::default());
    let verdicts = [
        (Judgment::StrongPositive, 0.9, 0.9),
        (Judgment::Positive, 0.6, 0.8),
        (Judgment::Neutral, 0.5, 0.7),
        (Judgment::Negative, 0.7, 0.6),
        (Judgment::StrongNegative, 0.85, 0.85),
    ];
    let results: Vec<TheoryAnalysisResult> = verdicts
        .iter()
        .enumerate()
        .map(|(i, &(judgment, level, confidence))| {
            let answer = StandardAnswer::new(judgment, level, confidence);
            TheoryAnalysisResult::from_answer(format!("theory_{i}"), answer)
        })
        .collect();

    let mut group = c.benchmark_group("resolve");
    group.throughput(Throughput::Elements(results.len() as u64));
    group.bench_function("five_disagreeing", |b| {
        b.iter(|| resolver.resolve(black_box(&results)).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_select, bench_resolve);
criterion_main!(benches);
