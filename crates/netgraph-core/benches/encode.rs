use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use netgraph_core::encode::{MemorySink, NetworkHeader, encode_graph};
use netgraph_core::graph::{ArcBuilder, Coord, Graph};
use netgraph_core::registry::NodeRegistry;
use netgraph_core::{IdentityKind, NodeIdentity};

const SIDES: [i64; 3] = [32, 128, 384];

/// A `side` x `side` street grid with two-way arcs between neighbours.
#[allow(clippy::cast_precision_loss)]
fn grid(side: i64) -> Graph {
    let id = |x: i64, y: i64| NodeIdentity::integer(y * side + x);
    let at = |x: i64, y: i64| Some(Coord::new(x as f64, y as f64));

    let mut registry = NodeRegistry::new(IdentityKind::Integer);
    for n in 0..side * side {
        registry.observe(NodeIdentity::integer(n)).expect("observe");
    }
    let mut builder = ArcBuilder::new(registry.finalize());
    let mut row = 0;
    for y in 0..side {
        for x in 0..side {
            for (nx, ny) in [(x + 1, y), (x, y + 1)] {
                if nx == side || ny == side {
                    continue;
                }
                row += 1;
                let cost = 1.0 + ((x * 7 + y * 13) % 5) as f64;
                builder
                    .add_arc(row, &id(x, y), &id(nx, ny), at(x, y), at(nx, ny), cost)
                    .expect("forward arc");
                builder
                    .add_arc(row, &id(nx, ny), &id(x, y), at(nx, ny), at(x, y), cost)
                    .expect("reverse arc");
            }
        }
    }
    builder.finish()
}

fn header(graph: &Graph) -> NetworkHeader {
    NetworkHeader {
        node_count: u32::try_from(graph.node_count()).expect("bench graph fits"),
        kind: IdentityKind::Integer,
        max_code_len: 0,
        table: "grid".into(),
        from_column: "node_from".into(),
        to_column: "node_to".into(),
        geometry_column: Some("geom".into()),
        name_column: None,
        a_star_coefficient: Some(1.0),
    }
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode.grid");

    for side in SIDES {
        let graph = grid(side);
        group.throughput(Throughput::Elements(graph.arc_count() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(side), &graph, |b, graph| {
            b.iter(|| {
                let mut sink = MemorySink::new();
                let summary = encode_graph(graph, header(graph), &mut sink).expect("encode");
                black_box((summary.blocks, sink.total_bytes()))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode);
criterion_main!(benches);
