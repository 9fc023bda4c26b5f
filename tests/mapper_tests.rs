use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use jsbridge::prelude::*;
use rquickjs::{Context, FromJs, Runtime};

#[derive(Clone)]
struct TestClass {
    x: i32,
}
native_type!(TestClass);

impl TestClass {
    fn add(&self, a: i32, b: i32) -> i32 {
        a + b
    }
}

struct Frozen;
native_type!(Frozen);

struct Tracked;
native_type!(Tracked);

struct Account {
    balance: i32,
}
native_type!(Account);

static TRACKED_DROPS: AtomicUsize = AtomicUsize::new(0);

type Log = Arc<Mutex<Vec<String>>>;

fn test_registry(log: &Log) -> Arc<TypeRegistry> {
    let registry = Arc::new(TypeRegistry::new());
    let sink = Arc::clone(log);
    define_class::<TestClass>()
        .constructor(|x: i32| TestClass { x })
        .constructor(|| TestClass { x: 0 })
        .function("Print", move |msg: String| sink.lock().unwrap().push(msg))
        .function("Big", || 1i64 << 40)
        .property("X", |t: &TestClass| t.x, |t: &mut TestClass, x: i32| t.x = x)
        .property_readonly("Double", |t: &TestClass| t.x * 2)
        .method("Add", TestClass::add)
        .method("Twin", |t: &TestClass| Owned(t.clone()))
        .method("Sum", |t: &TestClass, other: Cloned<TestClass>| t.x + other.0.x)
        .method("Boom", |_: &TestClass| -> i32 { panic!("native failure") })
        .function("Describe", |text: String| format!("text:{text}"))
        .function("Describe", |n: i32| format!("int:{n}"))
        .register_into(&registry)
        .unwrap();
    define_class::<Frozen>()
        .function("answer", || 42)
        .register_into(&registry)
        .unwrap();
    define_class::<Tracked>()
        .constructor(|| Tracked)
        .destructor(|_: &mut Tracked| {
            TRACKED_DROPS.fetch_add(1, Ordering::SeqCst);
        })
        .register_into(&registry)
        .unwrap();
    define_class::<Account>()
        .constructor_raw(&[ValueKind::Int32], |ctx| {
            let balance: i32 = ctx.arg(0)?;
            let handle = ctx.adopt(Account { balance })?;
            if balance < 0 {
                return Err(NativeError::other("negative opening balance"));
            }
            ctx.set_return(handle);
            Ok(())
        })
        .property_readonly("balance", |a: &Account| a.balance)
        .register_into(&registry)
        .unwrap();
    registry
}

struct Harness {
    mapper: ObjectMapper,
    context: Context,
    runtime: Runtime,
    log: Log,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(|config| config)
    }

    fn with_config(configure: impl FnOnce(MapperConfig) -> MapperConfig) -> Self {
        let log = Log::default();
        let config = configure(MapperConfig::new().with_registry(test_registry(&log)));
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        let mapper = ObjectMapper::with_config(config);
        context.with(|ctx| mapper.initialize(&ctx)).unwrap();
        Self {
            mapper,
            context,
            runtime,
            log,
        }
    }

    fn eval<T>(&self, source: &str) -> T
    where
        T: for<'js> FromJs<'js>,
    {
        self.context.with(|ctx| match ctx.eval::<T, _>(source) {
            Ok(value) => value,
            Err(err) => panic!("{err}: {:?}", ctx.catch()),
        })
    }

    /// Run `source` and return the `code` of what it throws.
    fn error_code(&self, source: &str) -> String {
        self.eval(&format!(
            "(() => {{ try {{ {source}; return 'no error'; }} \
             catch (e) {{ return e.code !== undefined ? e.code : String(e); }} }})()"
        ))
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[test]
fn test_test_class_scenario() {
    let harness = Harness::new();
    let ok: bool = harness.eval(
        r#"
        const TestClass = loadCppType('TestClass');
        let o = new TestClass(123);
        const read = o.X === 123;
        o.X = 99;
        read && o.X === 99 && o.Add(1, 3) === 4
        "#,
    );
    assert!(ok);
}

#[test]
fn test_print_reaches_native() {
    let harness = Harness::new();
    harness.eval::<()>(
        r#"
        const TestClass = loadCppType('TestClass');
        TestClass.Print('hello world');
        let obj = new TestClass(123);
        TestClass.Print(obj.X);
        obj.X = 99;
        TestClass.Print(obj.X);
        TestClass.Print('ret = ' + obj.Add(1, 3));
        TestClass.Print('naïve ✓');
        "#,
    );
    assert_eq!(
        harness.log(),
        vec!["hello world", "123", "99", "ret = 4", "naïve ✓"]
    );
}

#[test]
fn test_load_returns_cached_class() {
    let harness = Harness::new();
    assert!(harness.eval::<bool>("loadCppType('TestClass') === loadCppType('TestClass')"));
    assert_eq!(harness.mapper.loaded_types(), vec!["TestClass".to_owned()]);
    assert!(harness.eval::<bool>(
        "new (loadCppType('TestClass'))(1) instanceof loadCppType('TestClass')"
    ));
}

#[test]
fn test_unknown_type() {
    let harness = Harness::new();
    assert_eq!(harness.error_code("loadCppType('NoSuchType')"), "UnknownType");
    assert!(harness.mapper.loaded_types().is_empty());
}

#[test]
fn test_errors_are_native_bridge_errors() {
    let harness = Harness::new();
    let ok: bool = harness.eval(
        r#"
        let caught;
        try { loadCppType('NoSuchType'); } catch (e) { caught = e; }
        caught instanceof loadCppType.NativeBridgeError
            && caught instanceof Error
            && caught.name === 'UnknownType'
            && caught.message.includes('NoSuchType')
        "#,
    );
    assert!(ok);
}

#[test]
fn test_type_mismatch_keeps_instance_usable() {
    let harness = Harness::new();
    harness.eval::<()>("globalThis.obj = new (loadCppType('TestClass'))(123);");
    assert_eq!(harness.error_code("obj.Add('a', 'b')"), "TypeMismatch");
    assert_eq!(harness.eval::<i32>("obj.Add(1, 3)"), 4);
    assert_eq!(harness.eval::<i32>("obj.X"), 123);
}

#[test]
fn test_overloads_by_arity() {
    let harness = Harness::new();
    assert_eq!(harness.eval::<i32>("new (loadCppType('TestClass'))().X"), 0);
    assert_eq!(harness.eval::<i32>("new (loadCppType('TestClass'))(8).X"), 8);
    assert_eq!(
        harness.error_code("new (loadCppType('TestClass'))(1, 2)"),
        "NoMatchingOverload"
    );
    assert_eq!(
        harness.error_code("new (loadCppType('TestClass'))(1).Add(1)"),
        "NoMatchingOverload"
    );
}

#[test]
fn test_exact_overload_beats_earlier_coercion() {
    let harness = Harness::new();
    let results: Vec<String> = harness.eval(
        r#"
        const TestClass = loadCppType('TestClass');
        [TestClass.Describe(5), TestClass.Describe('5'), TestClass.Describe(true)]
        "#,
    );
    assert_eq!(results, vec!["int:5", "text:5", "text:true"]);
}

#[test]
fn test_failed_constructor_leaves_nothing_behind() {
    let harness = Harness::new();
    let codes: Vec<String> = harness.eval(
        r#"
        const Account = loadCppType('Account');
        const codes = [];
        for (let i = 0; i < 101; i++) {
            try { new Account(-1); } catch (e) { codes.push(e.code); }
        }
        codes
        "#,
    );
    assert_eq!(codes.len(), 101);
    assert!(codes.iter().all(|code| code == "NativeError"));
    harness.runtime.run_gc();
    assert_eq!(harness.mapper.live_objects(), 0);
    assert_eq!(harness.eval::<i32>("new (loadCppType('Account'))(7).balance"), 7);
}

#[test]
fn test_use_after_free_after_uninitialize() {
    let harness = Harness::new();
    harness.eval::<()>(
        "globalThis.TestClass = loadCppType('TestClass'); globalThis.kept = new TestClass(5);",
    );
    assert_eq!(harness.mapper.live_objects(), 1);

    assert_eq!(harness.mapper.uninitialize(), 1);
    assert_eq!(harness.mapper.phase(), MapperPhase::Finalized);
    assert_eq!(harness.mapper.live_objects(), 0);
    assert_eq!(harness.mapper.uninitialize(), 0);

    assert_eq!(harness.error_code("kept.Add(1, 2)"), "UseAfterFree");
    assert_eq!(harness.error_code("kept.X"), "UseAfterFree");
    assert_eq!(harness.error_code("kept.X = 1"), "UseAfterFree");
    assert_eq!(harness.error_code("new TestClass(1)"), "NotInitialized");
    assert_eq!(harness.error_code("TestClass.Print('late')"), "NotInitialized");
    assert!(harness.log().is_empty());
}

#[test]
fn test_invalid_handle() {
    let harness = Harness::new();
    harness.eval::<()>("globalThis.TestClass = loadCppType('TestClass');");
    assert_eq!(
        harness.error_code("TestClass.prototype.Add.call({}, 1, 2)"),
        "InvalidHandle"
    );
    assert_eq!(harness.error_code("TestClass.prototype.X"), "InvalidHandle");
    assert_eq!(
        harness.error_code("TestClass.Print({ nativeHandle: [4000000000, 0, 0] })"),
        "InvalidHandle"
    );
    assert_eq!(
        harness.error_code("TestClass.Print({ nativeHandle: 'forged' })"),
        "InvalidHandle"
    );
}

#[test]
fn test_collected_objects_release_native_instances() {
    let harness = Harness::new();
    let before = TRACKED_DROPS.load(Ordering::SeqCst);
    harness.eval::<()>(
        r#"
        const Tracked = loadCppType('Tracked');
        globalThis.keep = new Tracked();
        for (let i = 0; i < 10; i++) { new Tracked(); }
        "#,
    );
    harness.runtime.run_gc();
    assert_eq!(harness.mapper.live_objects(), 1);
    assert_eq!(TRACKED_DROPS.load(Ordering::SeqCst) - before, 10);

    harness.eval::<()>("globalThis.keep = undefined;");
    harness.runtime.run_gc();
    assert_eq!(harness.mapper.live_objects(), 0);
    assert_eq!(TRACKED_DROPS.load(Ordering::SeqCst) - before, 11);
}

#[test]
fn test_expose_owned_instance() {
    let harness = Harness::new();
    harness.context.with(|ctx| {
        let value = harness.mapper.expose(&ctx, TestClass { x: 7 }).unwrap();
        ctx.globals().set("exposed", value).unwrap();
    });
    assert_eq!(harness.mapper.live_objects(), 1);
    assert!(harness.eval::<bool>(
        "exposed instanceof loadCppType('TestClass') && exposed.X === 7 && exposed.Add(exposed.X, 1) === 8"
    ));
    assert_eq!(harness.mapper.loaded_types(), vec!["TestClass".to_owned()]);
}

#[test]
fn test_expose_shared_keeps_host_access() {
    let harness = Harness::new();
    let shared = Arc::new(Mutex::new(TestClass { x: 1 }));
    harness.context.with(|ctx| {
        let value = harness.mapper.expose_shared(&ctx, Arc::clone(&shared)).unwrap();
        ctx.globals().set("shared", value).unwrap();
    });
    assert_eq!(Arc::strong_count(&shared), 2);

    harness.eval::<()>("shared.X = 41;");
    assert_eq!(shared.lock().unwrap().x, 41);

    shared.lock().unwrap().x = 5;
    assert_eq!(harness.eval::<i32>("shared.X"), 5);

    assert_eq!(harness.mapper.uninitialize(), 1);
    assert_eq!(Arc::strong_count(&shared), 1);
    assert_eq!(shared.lock().unwrap().x, 5);
}

#[test]
fn test_expose_unregistered_type_fails() {
    struct Stranger;
    native_type!(Stranger);

    let harness = Harness::new();
    harness.context.with(|ctx| {
        let err = harness.mapper.expose(&ctx, Stranger).unwrap_err();
        assert!(matches!(err, MapperError::Bridge(_)));
    });
}

#[test]
fn test_readonly_property() {
    let harness = Harness::new();
    harness.eval::<()>("globalThis.obj = new (loadCppType('TestClass'))(4);");
    assert_eq!(harness.eval::<i32>("obj.Double"), 8);
    assert_eq!(harness.error_code("obj.Double = 1"), "ReadOnlyProperty");
    assert_eq!(harness.eval::<i32>("obj.Double"), 8);
}

#[test]
fn test_native_panic_surfaces_as_native_error() {
    let harness = Harness::new();
    harness.eval::<()>("globalThis.obj = new (loadCppType('TestClass'))(4);");
    assert_eq!(harness.error_code("obj.Boom()"), "NativeError");
    assert_eq!(harness.eval::<i32>("obj.X"), 4);
}

#[test]
fn test_cloned_param_and_owned_return() {
    let harness = Harness::new();
    let ok: bool = harness.eval(
        r#"
        const TestClass = loadCppType('TestClass');
        const a = new TestClass(2);
        const b = a.Twin();
        b.X = 5;
        b instanceof TestClass && a.X === 2 && a.Sum(b) === 7
        "#,
    );
    assert!(ok);
    assert_eq!(harness.mapper.live_objects(), 2);
    assert_eq!(
        harness.error_code("new (loadCppType('TestClass'))(1).Sum({})"),
        "TypeMismatch"
    );
}

#[test]
fn test_already_initialized() {
    let harness = Harness::new();
    harness.context.with(|ctx| {
        let again = harness.mapper.initialize(&ctx).unwrap_err();
        assert!(matches!(again, MapperError::AlreadyInitialized));

        let other = ObjectMapper::new();
        let err = other.initialize(&ctx).unwrap_err();
        assert!(matches!(err, MapperError::AlreadyInitialized));
        assert_eq!(other.phase(), MapperPhase::Uninitialized);
    });
}

#[test]
fn test_integer_truncation_and_range() {
    let harness = Harness::new();
    harness.eval::<()>("globalThis.obj = new (loadCppType('TestClass'))(0);");
    assert_eq!(harness.eval::<i32>("obj.X = 3.9; obj.X"), 3);
    assert_eq!(harness.eval::<i32>("obj.X = -3.9; obj.X"), -3);
    assert_eq!(harness.eval::<i32>("obj.Add(2.7, 1.2)"), 3);
    assert_eq!(harness.error_code("obj.X = 1e12"), "TypeMismatch");
    assert_eq!(harness.error_code("obj.X = NaN"), "TypeMismatch");
    assert_eq!(harness.eval::<i32>("obj.X"), -3);
}

#[test]
fn test_large_integers_become_doubles() {
    let harness = Harness::new();
    assert!(harness.eval::<bool>("loadCppType('TestClass').Big() === 1099511627776"));
}

#[test]
fn test_class_requires_new() {
    let harness = Harness::new();
    let message = harness.error_code("loadCppType('TestClass')(1)");
    assert!(message.starts_with("TypeError"), "{message}");
}

#[test]
fn test_static_only_type() {
    let harness = Harness::new();
    assert_eq!(harness.eval::<i32>("loadCppType('Frozen').answer()"), 42);
    assert_eq!(
        harness.error_code("new (loadCppType('Frozen'))()"),
        "NoMatchingOverload"
    );
}

#[test]
fn test_custom_loader_name() {
    let harness = Harness::with_config(|config| config.with_loader_name("requireNative"));
    assert!(harness.eval::<bool>("typeof loadCppType === 'undefined'"));
    assert_eq!(harness.eval::<i32>("new (requireNative('TestClass'))(6).X"), 6);
}
