use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use memograph_core::{args, GraphRegistry, Node, TaskFn, Value};

fn add() -> TaskFn {
    TaskFn::new("add", |a| Ok(Value::Int(a.int(0)? + a.int(1)?)))
}

/// Chain of `len` nodes, each adding one to the previous. Returns the head
/// and the tail.
fn build_chain(graph: &GraphRegistry, len: usize) -> (Node, Node) {
    let add = graph.register(add());
    let head = add.call(args![0, 1]).unwrap();
    let mut tail = head.clone();
    for _ in 1..len {
        tail = add.call(args![&tail, 1]).unwrap();
    }
    (head, tail)
}

/// Resolve a freshly built chain, computing every node.
fn bench_chain_cold(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_cold");
    for len in [10usize, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            b.iter(|| {
                let graph = GraphRegistry::new();
                let (_, tail) = build_chain(&graph, len);
                black_box(tail.compute().unwrap());
            });
        });
    }
    group.finish();
}

/// Resolve a clean chain. Every iteration is a memo hit.
fn bench_chain_cached(c: &mut Criterion) {
    let graph = GraphRegistry::new();
    let (_, tail) = build_chain(&graph, 1_000);
    tail.compute().unwrap();

    c.bench_function("chain_cached", |b| {
        b.iter(|| black_box(tail.compute().unwrap()));
    });
}

/// Rewire the head of a chain, then resolve the tail again.
fn bench_chain_rewire(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_rewire");
    for len in [10usize, 100, 1_000] {
        let graph = GraphRegistry::new();
        let (head, tail) = build_chain(&graph, len);
        tail.compute().unwrap();
        let rewire = graph.update_task(&head).unwrap();

        let mut step = 0i64;
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                step += 1;
                rewire.args(args![step, 1]).unwrap();
                black_box(tail.compute().unwrap());
            });
        });
    }
    group.finish();
}

/// One shared upstream read by many leaves; rewire it and resolve one leaf.
fn bench_fanout_rewire(c: &mut Criterion) {
    let graph = GraphRegistry::new();
    let add = graph.register(add());
    let root = add.call(args![0, 0]).unwrap();
    let leaves: Vec<Node> = (0..256)
        .map(|i| add.call(args![&root, i]).unwrap())
        .collect();
    for leaf in &leaves {
        leaf.compute().unwrap();
    }
    let rewire = graph.update_task(&root).unwrap();

    let mut step = 0i64;
    c.bench_function("fanout_rewire_one_leaf", |b| {
        b.iter(|| {
            step += 1;
            rewire.args(args![step, 0]).unwrap();
            black_box(leaves[0].compute().unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_chain_cold,
    bench_chain_cached,
    bench_chain_rewire,
    bench_fanout_rewire
);
criterion_main!(benches);
