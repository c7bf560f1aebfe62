//! Evaluation benchmarks
//!
//! Benchmarks: default registry over synthetic models, sequential versus parallel.
//! Run with: cargo bench --bench evaluation

use archcheck::{
    AccessEdge, AccessKind, ArchChecker, ClassElement, EvaluationOptions, MemberElement, MemberRef,
    Model,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

const FIELDS_PER_CLASS: usize = 8;

/// Model with `count` classes spread over ten packages; every tenth class is an entity
fn synthetic_model(count: usize) -> Model {
    let mut builder = Model::builder();

    for i in 0..count {
        let owner = format!("org.superbiz.servlet.p{}.Type{i:05}", i % 10);
        builder = builder.class(ClassElement::new(&owner).with_source_file(format!("Type{i:05}.java")));

        for f in 0..FIELDS_PER_CLASS {
            builder = builder.member(MemberElement::field(&owner, format!("field{f}"), "int").with_line(10 + f as u32));
        }
        builder = builder.member(MemberElement::method(&owner, "run", "void", Vec::<String>::new()).with_line(40));

        if i % 10 == 0 {
            builder = builder
                .annotate_class(&owner, "javax.persistence.Entity")
                .annotate_member(&MemberRef::field(&owner, "field0"), "javax.persistence.Id");
        }

        // Each class reads the first field of its predecessor
        if i > 0 {
            let previous = format!("org.superbiz.servlet.p{}.Type{:05}", (i - 1) % 10, i - 1);
            builder = builder.access(
                AccessEdge::new(
                    MemberRef::method(&owner, "run", Vec::<String>::new()),
                    MemberRef::field(previous, "field0"),
                    AccessKind::Read,
                )
                .with_line(41),
            );
        }
    }

    builder.build().unwrap()
}

fn default_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("default_registry");
    group.sample_size(10);

    let checker = ArchChecker::new().unwrap();

    for size in [1_000, 10_000] {
        let model = synthetic_model(size);

        for parallel in [false, true] {
            let options = EvaluationOptions { parallel, ..Default::default() };
            let label = if parallel { "parallel" } else { "sequential" };

            group.bench_with_input(BenchmarkId::new(label, size), &size, |b, _| {
                b.iter(|| checker.check_model(&model, &options).unwrap());
            });
        }
    }
    group.finish();
}

criterion_group!(benches, default_registry);
criterion_main!(benches);
