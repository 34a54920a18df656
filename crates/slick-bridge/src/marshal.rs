//! Type marshaling between Lua values and host objects
//!
//! Every conversion goes through [`ScriptValue`], an exhaustive tagged
//! union over the script shapes the bridge understands. Lua values are
//! classified once, at the boundary; everything past that point matches on
//! the tag.

use std::rc::Rc;

use mlua::{Lua, Value};

use crate::error::{BridgeError, BridgeResult};
use crate::host::{HostRuntime, KnownClass, Primitive};
use crate::record::ClassRecord;
use crate::reference::ObjectReference;

/// A script value as seen by the bridge
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue<O> {
    /// `nil`
    Nil,
    /// Any Lua number (integers included)
    Number(f64),
    /// Lua boolean
    Boolean(bool),
    /// Lua string, decoded as UTF-8 (lossy)
    String(String),
    /// Host object carried by a wrapper value
    Object(O),
    /// Shape with no host counterpart; carries the Lua type name
    Unsupported(&'static str),
}

impl<O> ScriptValue<O> {
    /// Script-level type name, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Nil => "nil",
            ScriptValue::Number(_) => "number",
            ScriptValue::Boolean(_) => "boolean",
            ScriptValue::String(_) => "string",
            ScriptValue::Object(_) => "object",
            ScriptValue::Unsupported(name) => name,
        }
    }
}

fn unsupported(type_name: &str) -> BridgeError {
    BridgeError::Conversion(format!("{} value conversion not supported", type_name))
}

// ============================================================================
// Lua boundary
// ============================================================================

/// Classify a Lua value.
///
/// Only [`ObjectReference`] and [`ClassRecord`] userdata carry host
/// objects; every other table, function, thread or foreign userdata is
/// `Unsupported`.
pub fn from_lua<H: HostRuntime>(value: &Value) -> ScriptValue<H::Object> {
    match value {
        Value::Nil => ScriptValue::Nil,
        Value::Boolean(b) => ScriptValue::Boolean(*b),
        Value::Integer(i) => ScriptValue::Number(*i as f64),
        Value::Number(n) => ScriptValue::Number(*n),
        Value::String(s) => ScriptValue::String(s.to_string_lossy().to_string()),
        Value::UserData(ud) => {
            if let Ok(reference) = ud.borrow::<ObjectReference<H>>() {
                ScriptValue::Object(reference.unwrap().clone())
            } else if let Ok(record) = ud.borrow::<ClassRecord<H>>() {
                ScriptValue::Object(record.descriptor().class().clone())
            } else {
                ScriptValue::Unsupported("userdata")
            }
        }
        other => ScriptValue::Unsupported(other.type_name()),
    }
}

/// Turn a script value into a Lua value, wrapping host objects in a fresh
/// [`ObjectReference`] without metadata.
pub fn into_lua<H: HostRuntime>(
    lua: &Lua,
    host: &Rc<H>,
    value: ScriptValue<H::Object>,
) -> BridgeResult<Value> {
    Ok(match value {
        ScriptValue::Nil => Value::Nil,
        ScriptValue::Number(n) => Value::Number(n),
        ScriptValue::Boolean(b) => Value::Boolean(b),
        ScriptValue::String(s) => Value::String(lua.create_string(&s)?),
        ScriptValue::Object(object) => {
            let reference = ObjectReference::wrap(host, &object, None)?;
            Value::UserData(lua.create_userdata(reference)?)
        }
        ScriptValue::Unsupported(name) => return Err(unsupported(name)),
    })
}

// ============================================================================
// Script -> host
// ============================================================================

/// Convert a script value into a host value.
///
/// `hint` is the declared parameter type of the receiving slot. Numbers are
/// boxed to the width the hint names (boxed or primitive short, int, long,
/// float); any other hint, or none, boxes a double.
pub fn to_host<H: HostRuntime>(
    host: &H,
    value: &ScriptValue<H::Object>,
    hint: Option<&H::Object>,
) -> BridgeResult<Option<H::Object>> {
    match value {
        ScriptValue::Nil => Ok(None),
        ScriptValue::Number(n) => host.box_primitive(number_for_hint(host, *n, hint)).map(Some),
        ScriptValue::Boolean(b) => host.box_primitive(Primitive::Boolean(*b)).map(Some),
        ScriptValue::String(s) => host.new_string(s).map(Some),
        ScriptValue::Object(object) => Ok(Some(object.clone())),
        ScriptValue::Unsupported(name) => Err(unsupported(name)),
    }
}

fn number_for_hint<H: HostRuntime>(host: &H, n: f64, hint: Option<&H::Object>) -> Primitive {
    let Some(hint) = hint else {
        return Primitive::Double(n);
    };
    let is = |boxed: KnownClass, primitive: KnownClass| {
        host.is_same_object(hint, host.known_class(boxed))
            || host.is_same_object(hint, host.known_class(primitive))
    };

    if is(KnownClass::Short, KnownClass::PrimitiveShort) {
        Primitive::Short(n as i16)
    } else if is(KnownClass::Integer, KnownClass::PrimitiveInt) {
        Primitive::Int(n as i32)
    } else if is(KnownClass::Long, KnownClass::PrimitiveLong) {
        Primitive::Long(n as i64)
    } else if is(KnownClass::Float, KnownClass::PrimitiveFloat) {
        Primitive::Float(n as f32)
    } else {
        Primitive::Double(n)
    }
}

// ============================================================================
// Host -> script
// ============================================================================

/// Convert a host value into a script value.
///
/// Strings, numbers (read through the generic double accessor, so very
/// large integers lose precision) and booleans become script scalars;
/// every other object stays an object.
pub fn from_host<H: HostRuntime>(
    host: &H,
    value: Option<&H::Object>,
) -> BridgeResult<ScriptValue<H::Object>> {
    let Some(object) = value else {
        return Ok(ScriptValue::Nil);
    };

    let class = host.class_of(object)?;
    if host.is_assignable_from(&class, host.known_class(KnownClass::String))? {
        Ok(ScriptValue::String(host.string_value(object)?))
    } else if host.is_assignable_from(&class, host.known_class(KnownClass::Number))? {
        Ok(ScriptValue::Number(host.double_value(object)?))
    } else if host.is_assignable_from(&class, host.known_class(KnownClass::Boolean))? {
        Ok(ScriptValue::Boolean(host.boolean_value(object)?))
    } else {
        Ok(ScriptValue::Object(object.clone()))
    }
}

// ============================================================================
// Type inference
// ============================================================================

/// Host type a script value presents to overload matching.
///
/// Numbers are always the boxed double type; objects report their actual
/// runtime class. `nil` has no type and matches any parameter.
pub fn infer_type<H: HostRuntime>(
    host: &H,
    value: &ScriptValue<H::Object>,
) -> BridgeResult<Option<H::Object>> {
    match value {
        ScriptValue::Nil => Ok(None),
        ScriptValue::Number(_) => Ok(Some(host.known_class(KnownClass::Double).clone())),
        ScriptValue::Boolean(_) => Ok(Some(host.known_class(KnownClass::Boolean).clone())),
        ScriptValue::String(_) => Ok(Some(host.known_class(KnownClass::String).clone())),
        ScriptValue::Object(object) => host.class_of(object).map(Some),
        ScriptValue::Unsupported(name) => Err(unsupported(name)),
    }
}
