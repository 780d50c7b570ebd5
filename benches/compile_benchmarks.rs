//! Performance benchmarks for building class trees.
//!
//! Each iteration registers a fresh package and runs the parse, compile and
//! defaults phases over it:
//! - Size-based: one class with a growing number of functions
//! - Shape-based: wide and deep class hierarchies
//! - Rebuilds: forcing a rebuild of an already built package
//!
//! ```bash
//! cargo bench --bench compile_benchmarks -- "tree"
//! ```

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use unrealscript::{CompilerOptions, ScriptPackage};

const OBJECT: &str = r#"
class Object native;

struct Vector
{
    var float X, Y, Z;
};

native(129) static final preoperator bool ! (bool A);
native(163) static final preoperator int ++ (out int A);
native(144) static final operator(16) int * (int A, int B);
native(146) static final operator(20) int + (int A, int B);
native(147) static final operator(20) int - (int A, int B);
native(150) static final operator(24) bool < (int A, int B);
native(154) static final operator(24) bool == (int A, int B);
native(161) static final operator(34) int += (out int A, int B);
native(174) static final operator(20) float + (float A, float B);
"#;

/// A class with `functions` small functions over a few variables.
fn class_source(name: &str, parent: Option<&str>, functions: usize) -> String {
    let mut source = match parent {
        Some(parent) => format!("class {name} extends {parent};\n"),
        None => format!("class {name};\n"),
    };
    source.push_str("var int Count;\nvar float Scale;\nvar Vector Location;\n");
    for index in 0..functions {
        source.push_str(&format!(
            "function int Step{index}(int Amount)\n{{\n    local int I;\n    for (I = 0; I < Amount; ++I)\n    {{\n        Count += I * {index};\n    }}\n    if (Count == 0)\n        return Amount;\n    return Count - Amount;\n}}\n"
        ));
    }
    source
}

fn package_of(sources: &[String]) -> ScriptPackage {
    let mut package = ScriptPackage::new();
    package.add_source(OBJECT).unwrap();
    for source in sources {
        package.add_source(source).unwrap();
    }
    package
}

fn bytes(sources: &[String]) -> u64 {
    sources.iter().map(|source| source.len() as u64).sum::<u64>() + OBJECT.len() as u64
}

fn size_based_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("build/class_sizes");

    for functions in [1, 20, 200] {
        let sources = vec![class_source("Test", None, functions)];
        group.throughput(Throughput::Bytes(bytes(&sources)));
        group.bench_function(format!("functions_{functions}"), |b| {
            b.iter(|| {
                let mut package = package_of(black_box(&sources));
                let report = package.build().unwrap();
                black_box(report.statements)
            });
        });
    }

    group.finish();
}

fn tree_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("build/tree");

    // Fifty siblings directly under Object
    let wide: Vec<String> = (0..50)
        .map(|index| class_source(&format!("Wide{index}"), None, 5))
        .collect();
    group.throughput(Throughput::Bytes(bytes(&wide)));
    group.bench_function("wide_50", |b| {
        b.iter(|| {
            let mut package = package_of(black_box(&wide));
            black_box(package.build().unwrap().built)
        });
    });

    // A single fifty-deep chain
    let deep: Vec<String> = (0..50)
        .map(|index| {
            let parent = (index > 0).then(|| format!("Deep{}", index - 1));
            class_source(&format!("Deep{index}"), parent.as_deref(), 5)
        })
        .collect();
    group.throughput(Throughput::Bytes(bytes(&deep)));
    group.bench_function("deep_50", |b| {
        b.iter(|| {
            let mut package = package_of(black_box(&deep));
            black_box(package.build().unwrap().built)
        });
    });

    group.finish();
}

fn rebuild_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("build/rebuild");

    let sources: Vec<String> = (0..20)
        .map(|index| class_source(&format!("Class{index}"), None, 10))
        .collect();
    let mut package = package_of(&sources);
    package.build().unwrap();

    group.bench_function("up_to_date", |b| {
        b.iter(|| black_box(package.build().unwrap().built));
    });

    *package.options_mut() = CompilerOptions::new().with_force_rebuild(true);
    group.bench_function("forced", |b| {
        b.iter(|| black_box(package.build().unwrap().built));
    });

    group.finish();
}

criterion_group!(benches, size_based_benchmarks, tree_benchmarks, rebuild_benchmarks);

criterion_main!(benches);
