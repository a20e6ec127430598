//! Benchmark suite for query compilation, reduction and paging

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use predmap::query::{Projection, SelectQuery, Statement};
use predmap::reduce::{Reducer, Solution};
use predmap::schema::EntityType;
use predmap::{Entity, FieldValue, Filter, FilterOperator, Input, OrderMode, PageArgs, Registry, Term, Value};

fn create_entities(count: usize) -> Vec<Entity> {
    (0..count)
        .map(|i| {
            let mut e = Entity::new(&format!("http://example.test#Software-{}", i), "software");
            e.set("id", FieldValue::One(Value::from(format!("{}", i))));
            e.set("name", FieldValue::One(Value::from(format!("pkg_{}", (i * 7919) % count))));
            let kind = if i % 3 == 0 { "operating-system" } else { "software" };
            e.set("entity_type", FieldValue::One(Value::from(kind)));
            e
        })
        .collect()
}

fn create_solutions(subjects: usize, per_subject: usize) -> Vec<Solution> {
    let mut rows = Vec::with_capacity(subjects * per_subject);
    for s in 0..subjects {
        for v in 0..per_subject {
            let mut row = Solution::new();
            row.insert("iri".to_string(), Term::iri(format!("http://example.test#Software-{}", s)));
            row.insert("id".to_string(), Term::literal(format!("{}", s)));
            row.insert("name".to_string(), Term::literal(format!("pkg_{}", s)));
            row.insert("labels".to_string(), Term::literal(format!("label_{}", v)));
            rows.push(row);
        }
    }
    rows
}

fn bench_compile_select(c: &mut Criterion) {
    let registry = Registry::standard();
    let mut group = c.benchmark_group("compile_select");

    for entity_type in ["software", "computing-device", "party"] {
        let schema = registry.get(entity_type).unwrap().schema();
        group.bench_with_input(BenchmarkId::from_parameter(entity_type), &schema, |b, schema| {
            b.iter(|| {
                let projection = Projection::build(schema, &[], &[], None);
                let query = SelectQuery::scan(schema, &projection, "tag:stardog:api:context:named");
                black_box(query.to_sparql())
            });
        });
    }

    group.finish();
}

fn bench_compile_insert(c: &mut Criterion) {
    let registry = Registry::standard();
    let software = registry.get("software").unwrap();
    let input = Input::new()
        .with("name", "nginx")
        .with("version", "1.21")
        .with("vendor_name", "F5")
        .with("description", "HTTP and reverse proxy server");

    c.bench_function("compile_insert", |b| {
        b.iter(|| {
            let statement = Statement::insert_entity(software, "bench", black_box(&input), chrono::Utc::now()).unwrap();
            black_box(statement.to_sparql())
        });
    });
}

fn bench_reduce(c: &mut Criterion) {
    let registry = Registry::standard();
    let schema = registry.get("software").unwrap().schema();
    let projection = Projection::build(schema, &["name", "labels"], &[], None);
    let mut group = c.benchmark_group("reduce");

    for subjects in [100, 1000, 10000] {
        let rows = create_solutions(subjects, 4);
        group.bench_with_input(BenchmarkId::from_parameter(subjects), &rows, |b, rows| {
            b.iter(|| Reducer::new(schema, &projection).reduce_solutions(black_box(rows.clone())));
        });
    }

    group.finish();
}

fn bench_paginate(c: &mut Criterion) {
    let mut group = c.benchmark_group("paginate");
    let args = PageArgs::default()
        .order_by("name", OrderMode::Asc)
        .filter(Filter::new("entity_type", &["software"], FilterOperator::Eq))
        .offset(50)
        .first(25);

    for size in [1000, 10000, 100000] {
        let entities = create_entities(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &entities, |b, entities| {
            b.iter(|| predmap::page::paginate(black_box(entities.clone()), &args, true));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compile_select,
    bench_compile_insert,
    bench_reduce,
    bench_paginate,
);
criterion_main!(benches);
