//! Dispatch benchmarks.
//!
//! - `table/*`: engine-free dispatch through [`ObjectTable`]
//! - `script/*`: the same calls issued from QuickJS through the class shim
//!
//! ```bash
//! cargo bench --bench dispatch_benchmarks
//! ```

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use jsbridge::prelude::*;
use jsbridge::{ObjectTable, RegistrySource};
use rquickjs::{Context, Runtime};

struct Point {
    x: i32,
    y: i32,
}
native_type!(Point);

fn registry() -> Arc<TypeRegistry> {
    let registry = Arc::new(TypeRegistry::new());
    define_class::<Point>()
        .constructor(|x: i32, y: i32| Point { x, y })
        .property("x", |p: &Point| p.x, |p: &mut Point, x: i32| p.x = x)
        .method("dot", |p: &Point, x: i32, y: i32| p.x * x + p.y * y)
        .method("label", |p: &Point, prefix: String| format!("{prefix}({}, {})", p.x, p.y))
        .register_into(&registry)
        .expect("Point registers");
    registry
}

fn table_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("table");
    let mut table = ObjectTable::new(RegistrySource::Private(registry()), true);
    let descriptor = table.descriptor("Point").expect("Point is registered");
    let point = table
        .construct(&descriptor, &[Dynamic::Int(3), Dynamic::Int(4)])
        .expect("construct Point");
    table.retain(point);

    group.bench_function("call_method", |b| {
        let args = [Dynamic::Int(1), Dynamic::Int(2)];
        b.iter(|| black_box(table.call_method(point, "dot", black_box(&args))))
    });

    group.bench_function("call_method_coerced", |b| {
        let args = [Dynamic::Int(7)];
        b.iter(|| black_box(table.call_method(point, "label", black_box(&args))))
    });

    group.bench_function("property_round_trip", |b| {
        b.iter(|| {
            table.set_property(point, "x", black_box(Dynamic::Int(5))).ok();
            black_box(table.get_property(point, "x"))
        })
    });

    group.bench_function("construct_release", |b| {
        let args = [Dynamic::Int(1), Dynamic::Int(1)];
        b.iter(|| {
            let handle = table.construct(&descriptor, &args).expect("construct Point");
            table.retain(handle);
            black_box(table.release(handle))
        })
    });

    group.finish();
}

fn script_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("script");
    let runtime = Runtime::new().expect("runtime");
    let context = Context::full(&runtime).expect("context");
    let mapper = ObjectMapper::with_config(MapperConfig::new().with_registry(registry()));
    context.with(|ctx| {
        mapper.initialize(&ctx).expect("initialize mapper");
        ctx.eval::<(), _>(
            "globalThis.Point = loadCppType('Point'); globalThis.p = new Point(3, 4);",
        )
        .expect("setup script");
    });

    group.bench_function("method_loop_1000", |b| {
        b.iter(|| {
            context.with(|ctx| {
                let total: i32 = ctx
                    .eval(
                        "(() => { let t = 0; for (let i = 0; i < 1000; i++) { t += p.dot(i, 1); } return t; })()",
                    )
                    .expect("loop");
                black_box(total)
            })
        })
    });

    group.bench_function("construct_loop_1000", |b| {
        b.iter(|| {
            context.with(|ctx| {
                ctx.eval::<(), _>("for (let i = 0; i < 1000; i++) { new Point(i, i); }")
                    .expect("loop");
            })
        })
    });

    group.finish();
    mapper.uninitialize();
}

criterion_group!(benches, table_benchmarks, script_benchmarks);
criterion_main!(benches);
