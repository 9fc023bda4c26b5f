use jsbridge::prelude::*;
use rquickjs::{Context, Function, Runtime};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

struct TestClass {
    x: i32,
}
native_type!(TestClass);

impl TestClass {
    fn new(p: i32) -> Self {
        info!("TestClass({p})");
        Self { x: p }
    }

    fn print(msg: String) {
        println!("{msg}");
    }

    fn add(&self, a: i32, b: i32) -> i32 {
        info!("Add({a},{b})");
        a + b
    }
}

const SCRIPT: &str = r#"
    log('function enter');
    const TestClass = loadCppType('TestClass');
    log('loadCppType ok.');
    TestClass.Print('hello world');
    let obj = new TestClass(123);

    TestClass.Print(obj.X);
    obj.X = 99;
    TestClass.Print(obj.X);

    TestClass.Print('ret = ' + obj.Add(1, 3));
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    define_class::<TestClass>()
        .constructor(TestClass::new)
        .function("Print", TestClass::print)
        .property("X", |t: &TestClass| t.x, |t: &mut TestClass, x: i32| t.x = x)
        .method("Add", TestClass::add)
        .register()?;

    let runtime = Runtime::new()?;
    let context = Context::full(&runtime)?;
    let mapper = ObjectMapper::new();

    context.with(|ctx| -> jsbridge::Result<()> {
        ctx.globals().set(
            "log",
            Function::new(ctx.clone(), |msg: String| println!("{msg}"))?,
        )?;
        ctx.eval::<(), _>("log('hello world');")?;

        mapper.initialize(&ctx)?;
        info!(mapper = mapper.id(), "object mapper ready");

        if let Err(err) = ctx.eval::<(), _>(SCRIPT) {
            let exception = ctx.catch();
            error!(%err, ?exception, "script failed");
        }
        Ok(())
    })?;

    let released = mapper.uninitialize();
    info!(released, "object mapper torn down");
    Ok(())
}
