//! Call dispatch: script arguments in, host call, script value out
//!
//! Both `new` and `invoke` run the same pipeline: classify the Lua
//! arguments, infer their host types, resolve one overload, prepare its
//! argument list, call the host and marshal the result back.

use std::rc::Rc;

use mlua::{AnyUserData, Lua, Table, Value};

use crate::args::prepare_arguments;
use crate::error::{BridgeError, BridgeResult};
use crate::host::HostRuntime;
use crate::marshal::{from_host, from_lua, infer_type, into_lua, to_host, ScriptValue};
use crate::record::ClassRecord;
use crate::reference::ObjectReference;
use crate::reflect::MethodDescriptor;
use crate::resolve::resolve;

/// Name reported for constructor resolution failures
pub const CONSTRUCTOR_NAME: &str = "<init>";

struct Resolved<H: HostRuntime> {
    descriptor: Rc<MethodDescriptor<H>>,
    arguments: Vec<Option<H::Object>>,
}

fn resolve_call<H: HostRuntime>(
    host: &H,
    name: &str,
    overloads: &[Rc<MethodDescriptor<H>>],
    args: &[Value],
) -> BridgeResult<Option<Resolved<H>>> {
    let values: Vec<ScriptValue<H::Object>> = args.iter().map(from_lua::<H>).collect();
    let types = values
        .iter()
        .map(|value| infer_type(host, value))
        .collect::<BridgeResult<Vec<_>>>()?;

    let descriptor = resolve(host, name, overloads, &types)?;
    let prepared = prepare_arguments(host, Some(&descriptor), &values)?;
    Ok(prepared.map(|arguments| Resolved {
        descriptor,
        arguments,
    }))
}

/// Construct an instance through the best matching constructor.
///
/// The result is always an object reference, even for classes whose
/// instances marshal to script scalars elsewhere.
pub fn construct<H: HostRuntime>(
    lua: &Lua,
    host: &Rc<H>,
    constructors: &[Rc<MethodDescriptor<H>>],
    args: &[Value],
) -> BridgeResult<Value> {
    let Some(call) = resolve_call(host.as_ref(), CONSTRUCTOR_NAME, constructors, args)? else {
        return Ok(Value::Nil);
    };
    let object = host.new_instance(call.descriptor.handle(), &call.arguments)?;
    into_lua(lua, host, ScriptValue::Object(object))
}

/// Invoke the best matching overload of `name`.
///
/// `instance` is the receiver; `nil` for static methods. Scalars are
/// marshaled to host values without a hint.
pub fn invoke<H: HostRuntime>(
    lua: &Lua,
    host: &Rc<H>,
    name: &str,
    overloads: &[Rc<MethodDescriptor<H>>],
    instance: &Value,
    args: &[Value],
) -> BridgeResult<Value> {
    tracing::trace!(target: "slick", method = name, arity = args.len(), "invoke");

    let receiver = to_host(host.as_ref(), &from_lua::<H>(instance), None)?;
    let Some(call) = resolve_call(host.as_ref(), name, overloads, args)? else {
        return Ok(Value::Nil);
    };
    let result = host.invoke(call.descriptor.handle(), receiver.as_ref(), &call.arguments)?;
    let value = from_host(host.as_ref(), result.as_ref())?;
    into_lua(lua, host, value)
}

/// Overload list named by an `invoke` target: a class record (looked up by
/// `name`) or an explicit sequence of method references.
pub fn overloads_of<H: HostRuntime>(
    target: &Value,
    name: &str,
) -> BridgeResult<Vec<Rc<MethodDescriptor<H>>>> {
    match target {
        Value::UserData(ud) => {
            let record = ud.borrow::<ClassRecord<H>>().map_err(|_| {
                BridgeError::Conversion("invoke target must be a class record".to_string())
            })?;
            Ok(record.descriptor().overloads(name).to_vec())
        }
        Value::Table(table) => method_references(table),
        other => Err(BridgeError::Conversion(format!(
            "{} is not an overload source",
            other.type_name()
        ))),
    }
}

fn method_references<H: HostRuntime>(table: &Table) -> BridgeResult<Vec<Rc<MethodDescriptor<H>>>> {
    let mut overloads = Vec::new();
    for entry in table.sequence_values::<AnyUserData>() {
        let entry = entry?;
        let reference = entry.borrow::<ObjectReference<H>>().map_err(|_| {
            BridgeError::Conversion("overload sequence holds a non-reference value".to_string())
        })?;
        let descriptor = reference.metadata().ok_or_else(|| {
            BridgeError::Conversion("object reference is not a method reference".to_string())
        })?;
        overloads.push(Rc::clone(descriptor));
    }
    Ok(overloads)
}
