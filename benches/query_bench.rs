#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stratalog::{Atom, DatalogEngine, Literal, Query, Rule, Term};

fn path(from: Term, to: Term) -> Atom {
    Atom::new("path", vec![from, to])
}

fn setup_large_graph() -> DatalogEngine {
    let mut engine = DatalogEngine::new();

    // 200 nodes, 5 outgoing edges each
    for i in 0..200 {
        for j in 0..5 {
            let next = (i + j + 1) % 200;
            engine
                .add_fact(Atom::new(
                    "edge",
                    vec![
                        Term::string(&format!("node_{i}")),
                        Term::string(&format!("node_{next}")),
                    ],
                ))
                .unwrap();
        }
    }

    let (x, y, z) = (Term::var("x"), Term::var("y"), Term::var("z"));
    engine
        .add_rule(Rule::new(
            Literal::positive(path(x.clone(), y.clone())),
            vec![Literal::positive(Atom::new("edge", vec![x.clone(), y.clone()]))],
        ))
        .unwrap();
    engine
        .add_rule(Rule::new(
            Literal::positive(path(x.clone(), z.clone())),
            vec![
                Literal::positive(path(x, y.clone())),
                Literal::positive(Atom::new("edge", vec![y, z])),
            ],
        ))
        .unwrap();

    engine.run().unwrap();
    engine
}

fn query_specific_paths(c: &mut Criterion) {
    let engine = setup_large_graph();
    let query = Query::new(vec![Literal::positive(path(
        Term::string("node_0"),
        Term::var("x"),
    ))]);

    c.bench_function("query_specific_paths", |b| {
        b.iter(|| black_box(engine.query(&query)));
    });
}

fn query_existence_check(c: &mut Criterion) {
    let engine = setup_large_graph();
    let query = Query::new(vec![Literal::positive(path(
        Term::string("node_0"),
        Term::string("node_100"),
    ))]);

    c.bench_function("query_existence_check", |b| {
        b.iter(|| black_box(engine.ask(&query)));
    });
}

fn query_all_paths(c: &mut Criterion) {
    let engine = setup_large_graph();
    let query = Query::new(vec![Literal::positive(path(Term::var("x"), Term::var("y")))]);

    c.bench_function("query_all_paths", |b| {
        b.iter(|| black_box(engine.query(&query)));
    });
}

criterion_group!(
    benches,
    query_specific_paths,
    query_existence_check,
    query_all_paths
);
criterion_main!(benches);
