//! Per-context object mapper.
//!
//! An [`ObjectMapper`] binds to one QuickJS context, installs the loader
//! global and the class shim, and owns the [`ObjectTable`] of every native
//! object that context can reach. Script-side classes call back into the
//! mapper through a small hooks object; each hook reads its script
//! arguments, dispatches with the mapper state borrowed, and answers with a
//! reply record the shim turns into a value or a thrown `NativeBridgeError`.

mod guard;
mod hooks;
mod script;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use rquickjs::{Ctx, Function, Object, Value};
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use jsbridge_core::{BridgeError, Dynamic, NativeType, ObjectHandle, TypeDescriptor};

use crate::config::MapperConfig;
use crate::dispatch::ObjectTable;
use crate::error::{MapperError, Result};

use script::{ScriptArg, Token};

const SHIM: &str = include_str!("shim.js");

static NEXT_MAPPER_ID: AtomicU32 = AtomicU32::new(1);

/// Lifecycle of an [`ObjectMapper`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapperPhase {
    Uninitialized,
    Initialized,
    Finalized,
}

impl fmt::Display for MapperPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MapperPhase::Uninitialized => "uninitialized",
            MapperPhase::Initialized => "initialized",
            MapperPhase::Finalized => "finalized",
        })
    }
}

/// Bridges registered native types into one script context.
///
/// ```no_run
/// use jsbridge::ObjectMapper;
/// use rquickjs::{Context, Runtime};
///
/// # fn main() -> jsbridge::Result<()> {
/// let runtime = Runtime::new()?;
/// let context = Context::full(&runtime)?;
/// let mapper = ObjectMapper::new();
/// context.with(|ctx| -> jsbridge::Result<()> {
///     mapper.initialize(&ctx)?;
///     ctx.eval::<(), _>("const Point = loadCppType('Point');")?;
///     Ok(())
/// })?;
/// mapper.uninitialize();
/// # Ok(())
/// # }
/// ```
pub struct ObjectMapper {
    shared: Rc<MapperShared>,
}

impl ObjectMapper {
    /// A mapper with the default configuration.
    pub fn new() -> Self {
        Self::with_config(MapperConfig::default())
    }

    pub fn with_config(config: MapperConfig) -> Self {
        let id = NEXT_MAPPER_ID.fetch_add(1, Ordering::Relaxed);
        let table = ObjectTable::new(config.registry().clone(), config.catch_panics());
        Self {
            shared: Rc::new(MapperShared {
                id,
                config,
                state: RefCell::new(MapperState {
                    phase: MapperPhase::Uninitialized,
                    table,
                    loaded: FxHashSet::default(),
                }),
                deferred: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Bind to `ctx`: evaluate the class shim and install the loader global.
    pub fn initialize(&self, ctx: &Ctx<'_>) -> Result<()> {
        let config = &self.shared.config;
        if self.phase() != MapperPhase::Uninitialized
            || ctx.globals().contains_key(config.hidden_key())?
        {
            return Err(MapperError::AlreadyInitialized);
        }

        let factory: Function = ctx.eval(SHIM)?;
        let hooks = hooks::install(ctx, &self.shared)?;
        factory.call::<_, ()>((
            hooks,
            config.loader_name().to_owned(),
            config.hidden_key().to_owned(),
        ))?;

        self.shared.state.borrow_mut().phase = MapperPhase::Initialized;
        debug!(
            mapper = self.shared.id,
            loader = config.loader_name(),
            "object mapper initialized"
        );
        Ok(())
    }

    /// Release every tracked wrapper and stop serving the context.
    ///
    /// Returns the number of wrappers released. Calling it again returns 0.
    pub fn uninitialize(&self) -> usize {
        let Ok(mut state) = self.shared.state.try_borrow_mut() else {
            warn!(
                mapper = self.shared.id,
                "uninitialize called during dispatch; ignored"
            );
            return 0;
        };
        if state.phase == MapperPhase::Finalized {
            return 0;
        }
        state.phase = MapperPhase::Finalized;
        self.shared.deferred.borrow_mut().clear();
        let released = state.table.sweep();
        state.loaded.clear();
        debug!(mapper = self.shared.id, released, "object mapper finalized");
        released
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> MapperPhase {
        self.shared.state.borrow().phase
    }

    /// Number of native objects currently reachable from script.
    pub fn live_objects(&self) -> usize {
        self.shared.state.borrow().table.live_objects()
    }

    /// Types materialized through the loader, sorted.
    pub fn loaded_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared.state.borrow().loaded.iter().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Process-unique id carried in every token this mapper hands out.
    pub fn id(&self) -> u32 {
        self.shared.id
    }

    /// Settings this mapper was created with.
    pub fn config(&self) -> &MapperConfig {
        &self.shared.config
    }

    /// Hand a natively constructed instance to script. The bridge owns it
    /// from here on and drops it once the script object is collected.
    pub fn expose<'js, T: NativeType>(&self, ctx: &Ctx<'js>, value: T) -> Result<Value<'js>> {
        let (handle, type_name) = self.shared.with_state(|state| {
            state.ensure_initialized()?;
            let handle = state.table.adopt(value)?;
            state.retain(handle).map_err(MapperError::from)
        })?;
        self.wrap(ctx, handle, type_name)
    }

    /// Hand a shared instance to script. The host keeps its own `Arc`;
    /// releasing the wrapper only drops the bridge's clone.
    pub fn expose_shared<'js, T: NativeType>(
        &self,
        ctx: &Ctx<'js>,
        value: Arc<Mutex<T>>,
    ) -> Result<Value<'js>> {
        let (handle, type_name) = self.shared.with_state(|state| {
            state.ensure_initialized()?;
            let handle = state.table.adopt_shared(value)?;
            state.retain(handle).map_err(MapperError::from)
        })?;
        self.wrap(ctx, handle, type_name)
    }

    fn wrap<'js>(&self, ctx: &Ctx<'js>, handle: ObjectHandle, type_name: String) -> Result<Value<'js>> {
        let reply = hooks::object_reply(ctx, &self.shared, handle, type_name)?;
        let hidden: Object = ctx.globals().get(self.shared.config.hidden_key())?;
        let wrap: Function = hidden.get("wrap")?;
        Ok(wrap.call((reply,))?)
    }
}

impl Default for ObjectMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ObjectMapper {
    fn drop(&mut self) {
        self.uninitialize();
    }
}

impl fmt::Debug for ObjectMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ObjectMapper");
        debug.field("id", &self.shared.id);
        match self.shared.state.try_borrow() {
            Ok(state) => debug
                .field("phase", &state.phase)
                .field("live_objects", &state.table.live_objects()),
            Err(_) => debug.field("state", &"<borrowed>"),
        };
        debug.finish()
    }
}

/// State shared between the mapper, its hooks and the finalization guards.
pub(crate) struct MapperShared {
    /// Process-unique mapper id, embedded in every token
    id: u32,
    /// Settings fixed at construction
    config: MapperConfig,
    /// Borrowed by one hook at a time
    state: RefCell<MapperState>,
    /// Releases requested by finalizers while `state` was borrowed
    deferred: RefCell<Vec<ObjectHandle>>,
}

struct MapperState {
    /// Where the mapper is in its lifecycle
    phase: MapperPhase,
    /// Wrappers reachable from the bound context
    table: ObjectTable,
    /// Names materialized through the loader
    loaded: FxHashSet<String>,
}

/// What a hook hands back to script.
pub(crate) enum Outcome {
    /// A plain value, converted straight back to script.
    Value(Dynamic),
    /// A wrapper already retained for the script object about to be made.
    Object {
        handle: ObjectHandle,
        type_name: String,
    },
}

impl MapperShared {
    fn with_state<R>(&self, f: impl FnOnce(&mut MapperState) -> R) -> R {
        let mut state = self.state.borrow_mut();
        for handle in self.deferred.take() {
            state.table.release(handle);
        }
        f(&mut state)
    }

    pub(crate) fn is_tracked(&self, handle: ObjectHandle) -> bool {
        self.state
            .try_borrow()
            .map_or(true, |state| state.table.heap().contains(handle))
    }

    pub(crate) fn release_or_defer(&self, handle: ObjectHandle) {
        match self.state.try_borrow_mut() {
            Ok(mut state) => {
                state.table.release(handle);
            }
            Err(_) => self.deferred.borrow_mut().push(handle),
        }
    }

    pub(crate) fn describe(&self, name: &str) -> Result<Arc<TypeDescriptor>> {
        self.with_state(|state| {
            state.ensure_initialized()?;
            let descriptor = state.table.descriptor(name)?;
            if state.loaded.insert(descriptor.name().to_owned()) {
                debug!(mapper = self.id, type_name = descriptor.name(), "type loaded");
            }
            Ok(descriptor)
        })
    }

    pub(crate) fn construct(&self, name: &str, args: Vec<ScriptArg>) -> Result<Outcome> {
        self.with_state(|state| {
            state.ensure_initialized()?;
            let descriptor = state.table.descriptor(name)?;
            let args = state.resolve_args(self.id, descriptor.name(), "constructor", args)?;
            let handle = state.table.construct(&descriptor, &args)?;
            state.settle(Dynamic::Object(handle))
        })
    }

    pub(crate) fn call_static(
        &self,
        name: &str,
        member: &str,
        args: Vec<ScriptArg>,
    ) -> Result<Outcome> {
        self.with_state(|state| {
            state.ensure_initialized()?;
            let descriptor = state.table.descriptor(name)?;
            let args = state.resolve_args(self.id, descriptor.name(), member, args)?;
            let result = state.table.call_static(&descriptor, member, &args)?;
            state.settle(result)
        })
    }

    pub(crate) fn invoke(&self, this: Token, member: &str, args: Vec<ScriptArg>) -> Result<Outcome> {
        self.with_state(|state| {
            let (this, type_name) = state.resolve_this(self.id, this)?;
            let args = state.resolve_args(self.id, &type_name, member, args)?;
            let result = state.table.call_method(this, member, &args)?;
            state.settle(result)
        })
    }

    pub(crate) fn get(&self, this: Token, member: &str) -> Result<Outcome> {
        self.with_state(|state| {
            let (this, _) = state.resolve_this(self.id, this)?;
            let result = state.table.get_property(this, member)?;
            state.settle(result)
        })
    }

    pub(crate) fn set(&self, this: Token, member: &str, value: ScriptArg) -> Result<Outcome> {
        self.with_state(|state| {
            let (this, type_name) = state.resolve_this(self.id, this)?;
            let mut value = state.resolve_args(self.id, &type_name, member, vec![value])?;
            let value = value.pop().unwrap_or_default();
            state.table.set_property(this, member, value)?;
            Ok(Outcome::Value(Dynamic::Void))
        })
    }
}

impl MapperState {
    fn ensure_initialized(&self) -> Result<()> {
        match self.phase {
            MapperPhase::Initialized => Ok(()),
            phase => Err(MapperError::NotInitialized(phase)),
        }
    }

    fn resolve_token(&self, mapper: u32, token: Token) -> std::result::Result<ObjectHandle, BridgeError> {
        if token.mapper != mapper {
            return Err(BridgeError::invalid_handle(format!(
                "token belongs to mapper {}, not {mapper}",
                token.mapper
            )));
        }
        self.table.resolve(token.index, token.generation)
    }

    fn resolve_this(&self, mapper: u32, token: Token) -> Result<(ObjectHandle, String)> {
        let handle = self.resolve_token(mapper, token)?;
        let type_name = self.table.type_name(handle).unwrap_or_default().to_owned();
        Ok((handle, type_name))
    }

    fn resolve_args(
        &self,
        mapper: u32,
        type_name: &str,
        member: &str,
        args: Vec<ScriptArg>,
    ) -> std::result::Result<Vec<Dynamic>, BridgeError> {
        args.into_iter()
            .enumerate()
            .map(|(position, arg)| match arg {
                ScriptArg::Value(value) => Ok(value),
                ScriptArg::Token(token) => self.resolve_token(mapper, token).map(Dynamic::Object),
                ScriptArg::Unsupported(kind) => Err(BridgeError::TypeMismatch {
                    type_name: type_name.to_owned(),
                    member: member.to_owned(),
                    detail: format!("argument {}: unsupported script value ({kind})", position + 1),
                }),
            })
            .collect()
    }

    /// Retain `handle` for one new script object.
    fn retain(&mut self, handle: ObjectHandle) -> std::result::Result<(ObjectHandle, String), BridgeError> {
        if !self.table.retain(handle) {
            return Err(BridgeError::UseAfterFree {
                index: handle.index,
            });
        }
        let type_name = self.table.type_name(handle).unwrap_or_default().to_owned();
        Ok((handle, type_name))
    }

    fn settle(&mut self, value: Dynamic) -> Result<Outcome> {
        match value {
            Dynamic::Object(handle) => {
                let (handle, type_name) = self.retain(handle)?;
                Ok(Outcome::Object { handle, type_name })
            }
            other => Ok(Outcome::Value(other)),
        }
    }
}
