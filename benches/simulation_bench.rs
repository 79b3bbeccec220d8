//! Performance benchmarks for the socweave engine.
//!
//! Run with: `cargo bench`
//! Or for specific bench: `cargo bench --bench simulation_bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use socweave::components::{Counter, FetchCore, ImageLoader, Memory, Pulse};
use socweave::event::{EventPayload, MemRequest};
use socweave::queue::EventQueue;
use socweave::{ns, us, ClockDomain, ComponentId, GraphBuilder, Router, PRIORITY_NORMAL};

// ============================================================================
// Clock Benchmarks
// ============================================================================

fn bench_clock_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("clock_fan_out");

    for num_sinks in [1, 10, 100].iter() {
        // 100 edges per run
        group.throughput(Throughput::Elements(100 * *num_sinks as u64));
        group.bench_with_input(
            BenchmarkId::new("sinks", num_sinks),
            num_sinks,
            |b, &num_sinks| {
                b.iter(|| {
                    let mut graph = GraphBuilder::new();
                    let clock = graph
                        .add_component(None, "clock", ClockDomain::new(100e6).unwrap())
                        .unwrap();
                    for i in 0..num_sinks {
                        let sink = graph
                            .add_component(None, &format!("sink{i}"), Counter::new())
                            .unwrap();
                        graph.bind_clock(clock, sink).unwrap();
                    }

                    let mut sim = graph.build();
                    black_box(sim.run_until(us(1)).unwrap());
                });
            },
        );
    }

    group.finish();
}

fn bench_deferred_delivery(c: &mut Criterion) {
    let mut group = c.benchmark_group("deferred_delivery");

    for pulses in [100u64, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*pulses));
        group.bench_with_input(BenchmarkId::new("pulses", pulses), pulses, |b, &pulses| {
            b.iter(|| {
                let mut graph = GraphBuilder::new();
                let pulse = graph
                    .add_component(
                        None,
                        "pulse",
                        Pulse::new(ns(1), 1).with_count(pulses).with_latency(ns(3)),
                    )
                    .unwrap();
                let sink = graph.add_component(None, "sink", Counter::new()).unwrap();
                graph.connect(pulse, "out", sink, "wire").unwrap();

                let mut sim = graph.build();
                black_box(sim.run().unwrap());
            });
        });
    }

    group.finish();
}

// ============================================================================
// Routing Benchmarks
// ============================================================================

fn bench_routed_requests(c: &mut Criterion) {
    let mut group = c.benchmark_group("routed_requests");

    for num_targets in [4u64, 64, 512].iter() {
        let mut graph = GraphBuilder::new();
        let ico = graph.add_component(None, "ico", Router::new()).unwrap();
        for i in 0..*num_targets {
            let mem = graph
                .add_component(None, &format!("mem{i}"), Memory::new(0x100))
                .unwrap();
            let input = graph.input(mem, "input").unwrap();
            graph
                .map(ico, &format!("m{i}"), input, i * 0x1000, 0x100, true)
                .unwrap();
        }
        let input = graph.input(ico, "input").unwrap();
        let mut sim = graph.build();

        group.throughput(Throughput::Elements(1000));
        group.bench_with_input(
            BenchmarkId::new("targets", num_targets),
            num_targets,
            |b, &num_targets| {
                b.iter(|| {
                    for i in 0..1000u64 {
                        let addr = (i % num_targets) * 0x1000 + (i % 0x40) * 4;
                        black_box(sim.debug_request(input, MemRequest::read(addr, 4)).unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

// ============================================================================
// Board Benchmarks
// ============================================================================

fn bench_board_boot(c: &mut Criterion) {
    let mut group = c.benchmark_group("board_boot");
    // 100 MHz for 10 us
    group.throughput(Throughput::Elements(1000));
    group.bench_function("fetch_1000", |b| {
        b.iter(|| {
            let image: Vec<u8> = (0..1000u32).flat_map(|i| i.to_le_bytes()).collect();
            let mut graph = GraphBuilder::new();
            let clock = graph
                .add_component(None, "clock", ClockDomain::new(100e6).unwrap())
                .unwrap();
            let ico = graph.add_component(None, "ico", Router::new()).unwrap();
            let mem = graph.add_component(None, "mem", Memory::new(0x1000)).unwrap();
            let host = graph.add_component(None, "host", FetchCore::new()).unwrap();
            let loader = graph
                .add_component(None, "loader", ImageLoader::new(0).with_segment(0, image))
                .unwrap();

            graph.declare_input_port(ico, "fetch", socweave::PortKind::Memory).unwrap();
            graph.connect(host, "fetch", ico, "fetch").unwrap();
            graph.connect(loader, "out", ico, "input").unwrap();
            graph.connect(loader, "start", host, "fetch_enable").unwrap();
            graph.connect(loader, "entry", host, "entry").unwrap();
            graph.bind_clock(clock, host).unwrap();
            graph.bind_clock(clock, mem).unwrap();
            let input = graph.input(mem, "input").unwrap();
            graph.map(ico, "mem", input, 0, 0x1000, true).unwrap();

            let mut sim = graph.build();
            black_box(sim.run_until(us(10)).unwrap());
        });
    });

    group.finish();
}

// ============================================================================
// Event Queue Benchmarks
// ============================================================================

fn bench_event_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_queue");
    let owner = ComponentId::from_index(0);

    for num_events in [1000, 10000, 100000].iter() {
        group.throughput(Throughput::Elements(*num_events as u64));

        // Schedule benchmark
        group.bench_with_input(
            BenchmarkId::new("schedule", num_events),
            num_events,
            |b, &num_events| {
                b.iter(|| {
                    let mut queue = EventQueue::new();
                    for i in 0..num_events as u64 {
                        queue
                            .schedule(i, PRIORITY_NORMAL, owner, owner, EventPayload::Timer { tag: i })
                            .unwrap();
                    }
                    black_box(queue.len());
                });
            },
        );

        // Pop benchmark
        group.bench_with_input(
            BenchmarkId::new("pop", num_events),
            num_events,
            |b, &num_events| {
                b.iter_batched(
                    || {
                        let mut queue = EventQueue::new();
                        for i in 0..num_events as u64 {
                            queue
                                .schedule(i, PRIORITY_NORMAL, owner, owner, EventPayload::Timer { tag: i })
                                .unwrap();
                        }
                        queue
                    },
                    |mut queue| {
                        while queue.pop_until(u64::MAX).is_some() {}
                        black_box(queue.len());
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

// ============================================================================
// Criterion Groups
// ============================================================================

criterion_group!(
    benches,
    bench_clock_fan_out,
    bench_deferred_delivery,
    bench_routed_requests,
    bench_board_boot,
    bench_event_queue,
);

criterion_main!(benches);
