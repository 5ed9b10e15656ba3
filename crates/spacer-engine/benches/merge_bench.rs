use criterion::{black_box, criterion_group, criterion_main, Criterion};
use num::BigRational;
use spacer_engine::cluster_finder::LemmaClusterFinder;
use spacer_engine::convex_closure::ConvexClosure;
use spacer_engine::lemma::{Level, PobRef};
use spacer_engine::node::PredicateNode;
use spacer_engine::oracle::ReachabilityOracle;
use spacer_smt::backends::z3_backend::Z3Solver;
use spacer_smt::sorts::SmtSort;
use spacer_smt::terms::SmtTerm;

fn q(n: i64) -> BigRational {
    BigRational::from_integer(n.into())
}

fn closure_over(points: &[Vec<i64>]) -> usize {
    let dims = points[0].len();
    let mut cvx = ConvexClosure::new();
    cvx.reset(dims);
    for d in 0..dims {
        cvx.set_dimension(d, SmtTerm::var(d as u32, SmtSort::Int)).unwrap();
    }
    for p in points {
        cvx.push_back(p.iter().map(|v| q(*v)).collect()).unwrap();
    }
    cvx.closure().unwrap().constraints.len()
}

fn bench_closure_segment(c: &mut Criterion) {
    let points: Vec<Vec<i64>> = (0..32).map(|i| vec![i, 2 * i + 1, 3 - i]).collect();
    c.bench_function("convex_closure_segment_32", |b| {
        b.iter(|| closure_over(black_box(&points)))
    });
}

fn bench_closure_simplex(c: &mut Criterion) {
    let points = vec![vec![0, 0, 0], vec![4, 0, 0], vec![0, 5, 0], vec![0, 0, 6]];
    c.bench_function("convex_closure_simplex_3d", |b| {
        b.iter(|| closure_over(black_box(&points)))
    });
}

fn bench_closure_multipliers(c: &mut Criterion) {
    let points: Vec<Vec<i64>> = (0..12).map(|i| vec![i % 4, i / 4]).collect();
    c.bench_function("convex_closure_grid_12", |b| {
        b.iter(|| closure_over(black_box(&points)))
    });
}

fn bench_cluster_discovery(c: &mut Criterion) {
    let x = SmtTerm::int_const("x");
    let y = SmtTerm::int_const("y");
    c.bench_function("cluster_discovery_24_lemmas", |b| {
        b.iter(|| {
            let reach = x.clone().ge(SmtTerm::int(1000));
            let mut node = PredicateNode::new(
                "inv",
                Box::new(ReachabilityOracle::new(Z3Solver::new(), reach)),
            );
            let pob = PobRef::new(SmtTerm::bool(true), Level(1));
            let mut finder = LemmaClusterFinder::new();
            for i in 0..24 {
                let cube = vec![x.clone().le(SmtTerm::int(2 * i)), y.clone().eq(SmtTerm::int(i + 1))];
                let lemma = node.add_lemma(cube, Level(1), &pob);
                finder.cluster(&mut node, &lemma).unwrap();
            }
            node.clusters().len()
        })
    });
}

criterion_group!(
    benches,
    bench_closure_segment,
    bench_closure_simplex,
    bench_closure_multipliers,
    bench_cluster_discovery
);
criterion_main!(benches);
