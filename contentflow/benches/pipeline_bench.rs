//! Benchmarks for payload handling and pipeline execution.

use contentflow::payload::{ContentPayload, PayloadPatch};
use contentflow::testing::{sample_article, Harness};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn rich_payload() -> ContentPayload {
    ContentPayload::from_url("https://news.test/bench").with(
        PayloadPatch::new()
            .cleaned_content("word ".repeat(2_000))
            .title("Benchmark headline")
            .tags(["rust", "pipelines", "bench"])
            .extra("source_name", "bench")
            .article(sample_article(1)),
    )
}

fn payload_benchmark(c: &mut Criterion) {
    let payload = rich_payload();

    c.bench_function("payload_with", |b| {
        b.iter(|| black_box(payload.with(PayloadPatch::new().description("A short summary."))));
    });

    c.bench_function("payload_snapshot", |b| {
        b.iter(|| black_box(payload.to_snapshot()));
    });

    let snapshot = payload.to_snapshot();
    c.bench_function("payload_from_snapshot_detached", |b| {
        b.iter(|| black_box(ContentPayload::from_snapshot_detached(snapshot.clone())));
    });
}

fn pipeline_benchmark(c: &mut Criterion) {
    let Ok(runtime) = tokio::runtime::Runtime::new() else {
        return;
    };
    let harness = Harness::new();

    c.bench_function("in_memory_full_run", |b| {
        b.iter(|| {
            harness.clear_progress();
            let mut pipeline = harness.pipeline();
            let result = runtime.block_on(pipeline.process(ContentPayload::from_text("Benchmark body text.")));
            black_box(result.is_ok())
        });
    });
}

criterion_group!(benches, payload_benchmark, pipeline_benchmark);
criterion_main!(benches);
