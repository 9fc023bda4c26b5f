//! Native functions the class shim calls into.

use std::rc::Rc;

use rquickjs::{Array, Ctx, Function, Object, Value};
use tracing::trace;

use jsbridge_core::{ErrorCode, ObjectHandle, PropertyAccess, TypeDescriptor};

use super::guard::FinalizeGuard;
use super::script::{Token, read_args, read_token, read_value, write_value};
use super::{MapperShared, Outcome};
use crate::error::{MapperError, Result};

/// Build the hooks object handed to the shim factory.
pub(crate) fn install<'js>(ctx: &Ctx<'js>, shared: &Rc<MapperShared>) -> rquickjs::Result<Object<'js>> {
    let hooks = Object::new(ctx.clone())?;

    let mapper = Rc::clone(shared);
    hooks.set(
        "describe",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, name: String| -> rquickjs::Result<Object<'js>> {
                match mapper.describe(&name) {
                    Ok(descriptor) => info_reply(&ctx, &descriptor),
                    Err(err) => error_reply(&ctx, err),
                }
            },
        )?,
    )?;

    let mapper = Rc::clone(shared);
    hooks.set(
        "construct",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, name: String, args: Array<'js>| -> rquickjs::Result<Object<'js>> {
                let outcome = read_args(&args).and_then(|args| mapper.construct(&name, args));
                respond(&ctx, &mapper, outcome)
            },
        )?,
    )?;

    let mapper = Rc::clone(shared);
    hooks.set(
        "call",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, name: String, member: String, args: Array<'js>| -> rquickjs::Result<Object<'js>> {
                let outcome =
                    read_args(&args).and_then(|args| mapper.call_static(&name, &member, args));
                respond(&ctx, &mapper, outcome)
            },
        )?,
    )?;

    let mapper = Rc::clone(shared);
    hooks.set(
        "invoke",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, this: Array<'js>, member: String, args: Array<'js>| -> rquickjs::Result<Object<'js>> {
                let outcome = read_token(&this).and_then(|this| {
                    let args = read_args(&args)?;
                    mapper.invoke(this, &member, args)
                });
                respond(&ctx, &mapper, outcome)
            },
        )?,
    )?;

    let mapper = Rc::clone(shared);
    hooks.set(
        "get",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, this: Array<'js>, member: String| -> rquickjs::Result<Object<'js>> {
                let outcome = read_token(&this).and_then(|this| mapper.get(this, &member));
                respond(&ctx, &mapper, outcome)
            },
        )?,
    )?;

    let mapper = Rc::clone(shared);
    hooks.set(
        "set",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, this: Array<'js>, member: String, value: Value<'js>| -> rquickjs::Result<Object<'js>> {
                let outcome = read_token(&this).and_then(|this| {
                    let value = read_value(&value)?;
                    mapper.set(this, &member, value)
                });
                respond(&ctx, &mapper, outcome)
            },
        )?,
    )?;

    Ok(hooks)
}

fn respond<'js>(ctx: &Ctx<'js>, shared: &Rc<MapperShared>, outcome: Result<Outcome>) -> rquickjs::Result<Object<'js>> {
    match outcome {
        Ok(Outcome::Value(value)) => {
            let reply = Object::new(ctx.clone())?;
            reply.set("value", write_value(ctx, &value)?)?;
            Ok(reply)
        }
        Ok(Outcome::Object { handle, type_name }) => object_reply(ctx, shared, handle, type_name),
        Err(err) => error_reply(ctx, err),
    }
}

/// Reply for a retained wrapper. The guard owns that retain from here on.
pub(crate) fn object_reply<'js>(
    ctx: &Ctx<'js>,
    shared: &Rc<MapperShared>,
    handle: ObjectHandle,
    type_name: String,
) -> rquickjs::Result<Object<'js>> {
    let guard = FinalizeGuard::new(Rc::downgrade(shared), handle);
    let guard = Function::new(ctx.clone(), move || guard.is_attached())?;
    let token = Token {
        mapper: shared.id,
        index: handle.index,
        generation: handle.generation,
    };
    let reply = Object::new(ctx.clone())?;
    reply.set("object", token.to_array())?;
    reply.set("type", type_name)?;
    reply.set("guard", guard)?;
    Ok(reply)
}

fn info_reply<'js>(ctx: &Ctx<'js>, descriptor: &TypeDescriptor) -> rquickjs::Result<Object<'js>> {
    let owned = |names: Vec<&str>| names.into_iter().map(str::to_owned).collect::<Vec<_>>();

    let mut properties = Vec::new();
    for name in descriptor.property_names() {
        let writable = descriptor
            .property(name)
            .is_some_and(|p| p.access().contains(PropertyAccess::WRITE));
        let property = Object::new(ctx.clone())?;
        property.set("name", name.to_owned())?;
        property.set("writable", writable)?;
        properties.push(property);
    }

    let info = Object::new(ctx.clone())?;
    info.set("name", descriptor.name().to_owned())?;
    info.set("methods", owned(descriptor.method_names()))?;
    info.set("functions", owned(descriptor.function_names()))?;
    info.set("properties", properties)?;
    info.set("constructable", !descriptor.constructors().is_empty())?;

    let reply = Object::new(ctx.clone())?;
    reply.set("value", info)?;
    Ok(reply)
}

/// Engine errors propagate as they are; bridge errors become a reply the
/// shim throws as `NativeBridgeError`.
fn error_reply<'js>(ctx: &Ctx<'js>, err: MapperError) -> rquickjs::Result<Object<'js>> {
    let code = match err {
        MapperError::Engine(err) => return Err(err),
        MapperError::Bridge(ref bridge) => bridge.code(),
        MapperError::NotInitialized(_) | MapperError::AlreadyInitialized => {
            ErrorCode::NotInitialized
        }
    };
    trace!(code = code.as_str(), error = %err, "script operation failed");
    let reply = Object::new(ctx.clone())?;
    reply.set("error", code.as_str().to_owned())?;
    reply.set("message", err.to_string())?;
    Ok(reply)
}
