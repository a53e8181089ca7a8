//! Benchmarks for pipeline execution.

use councilflow::audit::MemoryAuditSink;
use councilflow::core::StageOutcome;
use councilflow::pipeline::{JitterStrategy, Orchestrator, PipelineBuilder, RetryPolicy};
use councilflow::stages::FnStage;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn orchestrator_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let definition = PipelineBuilder::new("bench")
        .seed_key("trigger")
        .stage(
            "First",
            Arc::new(FnStage::new(|_| StageOutcome::value(serde_json::json!(1)))),
            &["trigger"],
            "first_out",
        )
        .stage(
            "Second",
            Arc::new(FnStage::new(|_| StageOutcome::value(serde_json::json!(2)))),
            &["first_out"],
            "second_out",
        )
        .stage(
            "Third",
            Arc::new(FnStage::new(|_| StageOutcome::value(serde_json::json!(3)))),
            &["second_out"],
            "third_out",
        )
        .build()
        .unwrap();

    let orchestrator = Orchestrator::new(Arc::new(MemoryAuditSink::new())).with_retry(
        RetryPolicy::new()
            .with_base_delay_ms(1)
            .with_jitter(JitterStrategy::None),
    );

    c.bench_function("three_stage_run", |b| {
        b.iter(|| {
            let report = runtime.block_on(orchestrator.run(
                &definition,
                vec![("trigger".to_string(), serde_json::json!("go"))],
            ));
            black_box(report).unwrap()
        })
    });
}

criterion_group!(benches, orchestrator_benchmark);
criterion_main!(benches);
