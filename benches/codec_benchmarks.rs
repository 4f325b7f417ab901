use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use mcpipe::core::{
    CapabilityDescriptor, CapabilityKind, Codec, Correlator, JsonRpcMessage, JsonRpcRequest,
    JsonRpcResponse, Params,
};
use serde_json::json;
use std::time::Duration;

fn arguments(size: usize) -> Params {
    json!({"name": "read_file", "arguments": {"path": "test.md", "data": "x".repeat(size)}})
        .as_object()
        .cloned()
        .unwrap_or_default()
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for size in [16, 256, 4096, 65536] {
        let message: JsonRpcMessage =
            JsonRpcRequest::new(1, "tools/call", Some(arguments(size))).into();
        let frame = Codec::encode(&message).unwrap();

        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(BenchmarkId::new("encode", size), &message, |b, message| {
            b.iter(|| Codec::encode(message).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &frame, |b, frame| {
            b.iter(|| Codec::decode(frame).unwrap());
        });
    }

    let response = Codec::encode(
        &JsonRpcResponse::success(
            7,
            json!({"content": [{"type": "text", "text": "Hi, MCP client"}], "isError": false}),
        )
        .into(),
    )
    .unwrap();
    group.bench_function("decode_tool_result", |b| {
        b.iter(|| Codec::decode(&response).unwrap());
    });
    group.bench_function("peek_id", |b| {
        b.iter(|| Codec::peek_id(&response));
    });

    group.finish();
}

fn bench_descriptors(c: &mut Criterion) {
    let mut group = c.benchmark_group("descriptors");

    for count in [10, 100, 1000] {
        let tools: Vec<_> = (0..count)
            .map(|n| {
                json!({
                    "name": format!("tool_{n}"),
                    "description": "A test tool",
                    "inputSchema": {"type": "object", "properties": {"path": {"type": "string"}}}
                })
            })
            .collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("from_value", count), &tools, |b, tools| {
            b.iter(|| {
                tools
                    .iter()
                    .cloned()
                    .map(|tool| CapabilityDescriptor::from_value(CapabilityKind::Tools, tool))
                    .collect::<Result<Vec<_>, _>>()
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_correlator(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("correlator");

    for in_flight in [1, 64, 1024] {
        group.throughput(Throughput::Elements(in_flight as u64));
        group.bench_with_input(
            BenchmarkId::new("register_resolve", in_flight),
            &in_flight,
            |b, &in_flight| {
                b.iter(|| {
                    rt.block_on(async {
                        let correlator = Correlator::new();
                        let mut slots = Vec::with_capacity(in_flight);
                        for _ in 0..in_flight {
                            let id = correlator.next_id();
                            slots.push(correlator.register(id, "tools/call").await.unwrap());
                        }
                        for slot in slots.into_iter().rev() {
                            let id = slot.id().clone();
                            correlator
                                .resolve(&id, Ok(JsonRpcResponse::success(id.clone(), json!({}))))
                                .await
                                .unwrap();
                            slot.await.unwrap();
                        }
                    })
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(5));
    targets = bench_codec, bench_descriptors, bench_correlator
);
criterion_main!(benches);
