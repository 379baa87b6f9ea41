use criterion::{black_box, criterion_group, criterion_main, Criterion};

use halogrid::geometry::Background;
use halogrid::index_space::range3d;
use halogrid::message::ChannelCommunicator;
use halogrid::{BoxLoop, Config, Context, DataView, Grid, Topology, UpdateMode, Vector};

const N: i64 = 64;
const NUM_GHOST: i64 = 2;




// ============================================================================
fn traversal(c: &mut Criterion) {
    let interior = range3d(0..N, 0..N, 0..N);
    let view = DataView::new(interior.extend_all(NUM_GHOST), 1);
    let data = vec![1.0; view.len()];
    let mut group = c.benchmark_group("traversal");

    group.bench_function("linear", |b| {
        b.iter(|| black_box(data.iter().sum::<f64>()))
    });

    group.bench_function("box_loop_for_each", |b| {
        b.iter(|| {
            let mut total = 0.0;
            BoxLoop::new(interior.clone()).for_each([&view], |_, [n]| total += data[n]);
            black_box(total)
        })
    });

    group.bench_function("box_loop_iter", |b| {
        b.iter(|| {
            let total: f64 = BoxLoop::new(interior.clone()).iter([&view]).map(|(_, [n])| data[n]).sum();
            black_box(total)
        })
    });

    group.bench_function("memory_region", |b| {
        let region = interior.memory_region_in(view.space());
        b.iter(|| black_box(region.iter_slice(&data, 1).map(|x| x[0]).sum::<f64>()))
    });

    group.bench_function("index_space_offsets", |b| {
        b.iter(|| black_box(interior.iter().map(|index| data[view.offset(index)]).sum::<f64>()))
    });
    group.finish();
}




// ============================================================================
fn exchange(c: &mut Criterion) {
    let config = Config {
        background: Background {
            extent: (N, N, N),
            ..Background::default()
        },
        topology: Topology::new(1, 1, 1),
        blocks: (2, 2, 2),
        refinement: (1, 1, 1),
    };

    let comm = ChannelCommunicator::world(1).pop().unwrap();
    let grid = Grid::new(Context::new(Box::new(comm)), &config).unwrap();
    let mut v = Vector::new(&grid, 1, NUM_GHOST).unwrap();
    v.fill_linear_ramp(0.0, 1.0);

    c.bench_function("update_all_eight_blocks", |b| {
        b.iter(|| v.update(UpdateMode::All).unwrap())
    });
}

criterion_group!(benches, traversal, exchange);
criterion_main!(benches);
