use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tessel_linker::{
    FieldDef, FieldType, Linker, LinkerOptions, MemberModifiers, MethodDef, Signature, TypeDefinition,
};

fn hierarchy(depth: usize) -> Vec<TypeDefinition> {
    (0..depth)
        .map(|level| {
            let name = format!("bench.T{}", level);
            let supertype = if level == 0 {
                "Object".to_string()
            } else {
                format!("bench.T{}", level - 1)
            };
            TypeDefinition::class(&name)
                .extends(&supertype)
                .field(FieldDef::new(&format!("r{}", level), FieldType::reference("Object")))
                .field(FieldDef::new(&format!("i{}", level), FieldType::Int))
                .static_field(FieldDef::new(&format!("s{}", level), FieldType::Long))
                .method(MethodDef::new("run", Signature::void()))
                .method(MethodDef::new(&format!("m{}", level), Signature::void()))
                .method(
                    MethodDef::new("id", Signature::new(vec![], Some(FieldType::Int)))
                        .with_modifiers(MemberModifiers::PROTECTED),
                )
        })
        .collect()
}

fn bench_complete_hierarchy(c: &mut Criterion) {
    let mut group = c.benchmark_group("complete_hierarchy");
    for depth in [8usize, 32, 128] {
        let defs = hierarchy(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &defs, |b, defs| {
            b.iter(|| {
                let linker = Linker::bootstrap(LinkerOptions::default()).unwrap();
                let ns = linker.create_namespace("bench");
                for def in defs {
                    black_box(linker.complete_definition(&ns, def.clone()).unwrap());
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_complete_hierarchy);
criterion_main!(benches);
