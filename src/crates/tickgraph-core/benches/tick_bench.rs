use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tickgraph_core::{ChannelDigest, Registry, Scheduler};
use tickgraph_ir::{
    Edge, Handle, Node, Param, Params, DEFAULT_INPUT_PARAM, DEFAULT_OUTPUT_PARAM, IR,
};
use tickgraph_telem::{DataType, Frame, Series};

fn channel_node(key: &str, type_tag: &str, channel: u32) -> Node {
    let mut node = Node::new(key, type_tag);
    node.config = Params(vec![Param::with_value(
        "channel",
        DataType::U32,
        serde_json::json!(channel),
    )]);
    if type_tag == "on" {
        node.outputs = Params(vec![Param::new(DEFAULT_OUTPUT_PARAM, DataType::F32)]);
    } else {
        node.inputs = Params(vec![Param::new(DEFAULT_INPUT_PARAM, DataType::F32)]);
    }
    node
}

fn timer_node(key: &str, period: Duration) -> Node {
    let mut node = Node::new(key, "interval");
    node.config = Params(vec![Param::with_value(
        "period",
        DataType::I64,
        serde_json::json!(period.as_nanos() as i64),
    )]);
    node.outputs = Params(vec![Param::new(DEFAULT_OUTPUT_PARAM, DataType::U8)]);
    node
}

fn pipeline_scheduler() -> Scheduler {
    let ir = IR {
        nodes: vec![
            timer_node("timer", Duration::from_millis(1)),
            channel_node("source", "on", 10),
            channel_node("sink", "write", 20),
        ],
        edges: vec![Edge::new(
            Handle::new("source", DEFAULT_OUTPUT_PARAM),
            Handle::new("sink", DEFAULT_INPUT_PARAM),
        )],
        ..IR::default()
    };
    let channels = vec![
        ChannelDigest::unindexed(10, DataType::F32),
        ChannelDigest::unindexed(20, DataType::F32),
    ];
    let mut registry = Registry::defaults();
    Scheduler::new(ir, channels, &mut registry).unwrap()
}

fn bench_idle_tick(c: &mut Criterion) {
    let mut scheduler = pipeline_scheduler();
    let mut elapsed = Duration::ZERO;
    c.bench_function("tick_idle", |b| {
        b.iter(|| {
            elapsed += Duration::from_millis(1);
            black_box(scheduler.tick(elapsed, Duration::from_micros(100), None));
        })
    });
}

fn bench_tick_with_frame(c: &mut Criterion) {
    let mut scheduler = pipeline_scheduler();
    let mut elapsed = Duration::ZERO;
    let mut alignment = 0u64;
    c.bench_function("tick_with_frame", |b| {
        b.iter(|| {
            elapsed += Duration::from_millis(1);
            alignment += 64;
            let series = Series::from(vec![1.5f32; 64])
                .with_alignment(tickgraph_telem::Alignment(alignment));
            let frame = Frame::new().with(10, series);
            black_box(scheduler.tick(elapsed, Duration::from_micros(100), Some(frame)));
        })
    });
}

criterion_group!(benches, bench_idle_tick, bench_tick_with_frame);
criterion_main!(benches);
