use conductor::adapters::executors::NoopExecutor;
use conductor::adapters::memory::{InMemoryMessageLog, InMemoryWorkflowStore};
use conductor::domain::models::{ExecutionMode, TaskDefinition, TaskRegistry, WorkflowType};
use conductor::services::{
    DependencyResolver, ExecutionEngine, ExecutorConfig, MessageBus, OrchestrateRequest, Orchestrator,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

/// `layers` layers of `width` tasks; each task depends on two tasks of the
/// layer above.
fn layered_graph(layers: usize, width: usize) -> Vec<TaskDefinition> {
    let name = |layer: usize, slot: usize| format!("l{layer:03}-t{slot:03}");
    let mut tasks = Vec::with_capacity(layers * width);
    for layer in 0..layers {
        for slot in 0..width {
            let task = if layer == 0 {
                TaskDefinition::new(name(layer, slot))
            } else {
                TaskDefinition::new(name(layer, slot))
                    .with_dependencies([name(layer - 1, slot), name(layer - 1, (slot + 1) % width)])
            };
            tasks.push(task);
        }
    }
    tasks
}

fn bench_resolve(c: &mut Criterion) {
    let resolver = DependencyResolver::new();
    let mut group = c.benchmark_group("resolve_phases");

    for (layers, width) in [(5, 10), (20, 20), (50, 40)] {
        let tasks = layered_graph(layers, width);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{layers}x{width}")),
            &tasks,
            |b, tasks| {
                b.iter(|| resolver.resolve(black_box(tasks)));
            },
        );
    }

    group.finish();
}

fn bench_detect_cycle(c: &mut Criterion) {
    let resolver = DependencyResolver::new();
    let mut tasks = layered_graph(20, 20);
    tasks[0] = TaskDefinition::new("l000-t000").with_dependencies(["l019-t000"]);

    c.bench_function("detect_cycle_20x20", |b| {
        b.iter(|| resolver.detect_cycle(black_box(&tasks)));
    });
}

fn orchestrator_for(tasks: Vec<TaskDefinition>) -> Orchestrator {
    let mut workflow = WorkflowType::new("bench", "layered benchmark graph");
    workflow.tasks = tasks;
    let registry = TaskRegistry::with_workflows(vec![workflow]).expect("valid graph");

    let store = Arc::new(InMemoryWorkflowStore::new());
    let bus = MessageBus::new(Arc::new(InMemoryMessageLog::new()));
    let engine = ExecutionEngine::new(
        Arc::new(NoopExecutor::new()),
        bus.clone(),
        store.clone(),
        ExecutorConfig::default(),
    );
    Orchestrator::new(registry, engine, store, bus).with_default_workflow("bench")
}

fn bench_noop_run(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("noop_run");

    for mode in [
        ExecutionMode::Sequential,
        ExecutionMode::Parallel,
        ExecutionMode::Intelligent,
    ] {
        let orchestrator = orchestrator_for(layered_graph(10, 10));
        let orchestrator = &orchestrator;
        group.bench_function(BenchmarkId::from_parameter(mode.as_str()), |b| {
            b.to_async(&rt).iter(|| async move {
                orchestrator
                    .orchestrate(OrchestrateRequest::new().with_mode(mode))
                    .await
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resolve, bench_detect_cycle, bench_noop_run);
criterion_main!(benches);
