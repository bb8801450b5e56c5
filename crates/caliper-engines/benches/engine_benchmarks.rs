//! Benchmark tests for engine execution.
//!
//! Run with: cargo bench --package caliper-engines

use std::collections::HashMap;

use caliper_core::{
    AttributeValue, DataType, GraphBuilder, ModelGraph, Tensor, TensorLayout, TensorSpec,
};
use caliper_engines::{GraphEngine, InferenceEngine, OnnxEngine};
use caliper_onnx::ModelExporter;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

fn create_tensor(data: Vec<f32>, shape: Vec<usize>) -> Tensor {
    Tensor::from_data(data, shape, DataType::F32, TensorLayout::RowMajor).unwrap()
}

fn dense_model() -> (ModelGraph, HashMap<String, Tensor>) {
    let graph = GraphBuilder::new("bench_dense")
        .input(TensorSpec::batched("x", &[64], DataType::F32))
        .op("MatMul", "hidden", &["x", "w1"], &["h"])
        .op("Relu", "act", &["h"], &["a"])
        .op("Gemm", "logits", &["a", "w2"], &["z"])
        .attr("transB", AttributeValue::Int(1))
        .op("Softmax", "probs", &["z"], &["y"])
        .output(TensorSpec::batched("y", &[10], DataType::F32))
        .build()
        .unwrap();

    let mut initializers = HashMap::new();
    initializers.insert(
        "w1".to_string(),
        create_tensor(
            (0..64 * 32).map(|i| ((i % 13) as f32) * 0.01 - 0.06).collect(),
            vec![64, 32],
        ),
    );
    initializers.insert(
        "w2".to_string(),
        create_tensor(
            (0..10 * 32).map(|i| ((i % 7) as f32) * 0.02 - 0.07).collect(),
            vec![10, 32],
        ),
    );
    (graph, initializers)
}

fn batch_input(batch: usize) -> HashMap<String, Tensor> {
    let mut inputs = HashMap::new();
    inputs.insert(
        "x".to_string(),
        create_tensor(
            (0..batch * 64).map(|i| ((i % 29) as f32) * 0.03 - 0.4).collect(),
            vec![batch, 64],
        ),
    );
    inputs
}

fn bench_graph_engine(c: &mut Criterion) {
    let (graph, initializers) = dense_model();
    let engine = GraphEngine::new(graph, initializers).unwrap();

    let mut group = c.benchmark_group("graph_engine");
    for batch in [1, 10, 100].iter() {
        group.bench_with_input(BenchmarkId::new("run", batch), batch, |bencher, &batch| {
            let inputs = batch_input(batch);
            bencher.iter(|| black_box(engine.run(inputs.clone()).unwrap()));
        });
    }
    group.finish();
}

fn bench_onnx_engine(c: &mut Criterion) {
    let (graph, initializers) = dense_model();
    let bytes = ModelExporter::new().export(&graph, &initializers).unwrap();
    let engine = OnnxEngine::from_bytes(&bytes).unwrap();

    let mut group = c.benchmark_group("onnx_engine");
    for batch in [1, 10, 100].iter() {
        group.bench_with_input(BenchmarkId::new("run", batch), batch, |bencher, &batch| {
            let inputs = batch_input(batch);
            bencher.iter(|| black_box(engine.run(inputs.clone()).unwrap()));
        });
    }
    group.bench_function("decode", |bencher| {
        bencher.iter(|| black_box(OnnxEngine::from_bytes(&bytes).unwrap()));
    });
    group.finish();
}

fn bench_model_roundtrip(c: &mut Criterion) {
    let (graph, initializers) = dense_model();
    let exporter = ModelExporter::new();

    let mut group = c.benchmark_group("model_serialization");
    group.bench_function("export", |bencher| {
        bencher.iter(|| black_box(exporter.export(&graph, &initializers).unwrap()));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_graph_engine,
    bench_onnx_engine,
    bench_model_roundtrip
);
criterion_main!(benches);
