//! Conversion between QuickJS values and [`Dynamic`].
//!
//! Native object arguments reach the hooks as `{ nativeHandle: token }`
//! records built by the class shim; everything else is read by value.

use rquickjs::{Array, Ctx, Value};

use jsbridge_core::{BridgeError, Dynamic};

/// Key of the record the shim passes in place of a native instance.
pub(crate) const HANDLE_KEY: &str = "nativeHandle";

/// `[mapper id, slot index, generation]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token {
    pub mapper: u32,
    pub index: u32,
    pub generation: u32,
}

impl Token {
    pub fn to_array(self) -> Vec<f64> {
        vec![
            f64::from(self.mapper),
            f64::from(self.index),
            f64::from(self.generation),
        ]
    }
}

/// A script argument read before the mapper state is borrowed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ScriptArg {
    Value(Dynamic),
    Token(Token),
    /// A script value no native parameter can accept.
    Unsupported(&'static str),
}

pub(crate) fn read_args(args: &Array<'_>) -> crate::Result<Vec<ScriptArg>> {
    let mut out = Vec::with_capacity(args.len());
    for index in 0..args.len() {
        let value: Value = args.get(index)?;
        out.push(read_value(&value)?);
    }
    Ok(out)
}

pub(crate) fn read_value(value: &Value<'_>) -> crate::Result<ScriptArg> {
    let dynamic = if value.is_undefined() {
        Dynamic::Void
    } else if value.is_null() {
        Dynamic::Null
    } else if let Some(b) = value.as_bool() {
        Dynamic::Bool(b)
    } else if let Some(i) = value.as_int() {
        Dynamic::Int(i64::from(i))
    } else if let Some(f) = value.as_float() {
        Dynamic::Float(f)
    } else if let Some(s) = value.as_string() {
        match s.to_string() {
            Ok(s) => Dynamic::String(s),
            Err(_) => return Ok(ScriptArg::Unsupported("non UTF-8 string")),
        }
    } else if let Some(object) = value.as_object() {
        let marker: Value = object.get(HANDLE_KEY)?;
        if marker.is_undefined() {
            let kind = if value.is_function() { "function" } else { "object" };
            return Ok(ScriptArg::Unsupported(kind));
        }
        let token = marker
            .as_array()
            .ok_or_else(|| BridgeError::invalid_handle("native handle is not a token"))?;
        return Ok(ScriptArg::Token(read_token(token)?));
    } else {
        return Ok(ScriptArg::Unsupported("value"));
    };
    Ok(ScriptArg::Value(dynamic))
}

pub(crate) fn read_token(token: &Array<'_>) -> crate::Result<Token> {
    if token.len() != 3 {
        return Err(BridgeError::invalid_handle("malformed native token").into());
    }
    let mut parts = [0u32; 3];
    for (index, part) in parts.iter_mut().enumerate() {
        let value: Value = token.get(index)?;
        *part = token_part(&value)
            .ok_or_else(|| BridgeError::invalid_handle("malformed native token"))?;
    }
    let [mapper, index, generation] = parts;
    Ok(Token {
        mapper,
        index,
        generation,
    })
}

fn token_part(value: &Value<'_>) -> Option<u32> {
    if let Some(i) = value.as_int() {
        return u32::try_from(i).ok();
    }
    let f = value.as_float()?;
    (f.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&f)).then_some(f as u32)
}

/// Write a non-object value. Object results are wrapped by the mapper.
pub(crate) fn write_value<'js>(ctx: &Ctx<'js>, value: &Dynamic) -> rquickjs::Result<Value<'js>> {
    Ok(match value {
        Dynamic::Void | Dynamic::Object(_) => Value::new_undefined(ctx.clone()),
        Dynamic::Null => Value::new_null(ctx.clone()),
        Dynamic::Bool(b) => Value::new_bool(ctx.clone(), *b),
        Dynamic::Int(i) => match i32::try_from(*i) {
            Ok(small) => Value::new_int(ctx.clone(), small),
            Err(_) => Value::new_float(ctx.clone(), *i as f64),
        },
        Dynamic::Float(f) => Value::new_float(ctx.clone(), *f),
        Dynamic::String(s) => rquickjs::String::from_str(ctx.clone(), s)?.into_value(),
    })
}
