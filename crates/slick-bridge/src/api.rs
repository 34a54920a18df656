//! Script-facing primitive API
//!
//! Registered as one global table (`_internal` unless configured
//! otherwise). Scripts build their own friendlier wrappers on top of it.

use std::rc::Rc;

use mlua::{AnyUserData, Lua, Table, Value, Variadic};

use crate::archive::AssetArchive;
use crate::config::BridgeConfig;
use crate::dispatch;
use crate::error::{BridgeError, BridgeResult};
use crate::host::HostRuntime;
use crate::record::ClassRecord;
use crate::reference::ObjectReference;
use crate::reflect::{self, ClassSelector};

/// Create the primitive API table and install it as a global
pub fn register<H: HostRuntime>(
    lua: &Lua,
    host: &Rc<H>,
    assets: &Rc<dyn AssetArchive>,
    config: &BridgeConfig,
) -> BridgeResult<Table> {
    let api = lua.create_table()?;

    api.set("log", lua.create_function(log::<H>)?)?;

    let archive = Rc::clone(assets);
    api.set(
        "inflate",
        lua.create_function(move |lua, path: String| match archive.inflate(&path) {
            Some(bytes) => Ok(Some(lua.create_string(bytes)?)),
            None => Ok(None),
        })?,
    )?;

    let h = Rc::clone(host);
    api.set(
        "import",
        lua.create_function(move |lua, target: Value| Ok(import(lua, &h, &target)?))?,
    )?;

    let h = Rc::clone(host);
    api.set(
        "new",
        lua.create_function(move |lua, (record, args): (AnyUserData, Variadic<Value>)| {
            let record = record.borrow::<ClassRecord<H>>().map_err(|_| {
                BridgeError::Conversion("new expects a class record".to_string())
            })?;
            Ok(dispatch::construct(lua, &h, record.descriptor().constructors(), &args)?)
        })?,
    )?;

    let h = Rc::clone(host);
    api.set(
        "invoke",
        lua.create_function(
            move |lua, (target, name, instance, args): (Value, String, Value, Variadic<Value>)| {
                let overloads = dispatch::overloads_of::<H>(&target, &name)?;
                Ok(dispatch::invoke(lua, &h, &name, &overloads, &instance, &args)?)
            },
        )?,
    )?;

    if let Some(path) = &config.storage_path {
        api.set("storage_path", path.to_string_lossy().as_ref())?;
    }

    lua.globals().set(config.api_name.as_str(), api.clone())?;
    Ok(api)
}

fn log<H: HostRuntime>(_: &Lua, value: Value) -> mlua::Result<()> {
    tracing::info!(target: "slick", "{}", describe::<H>(&value));
    Ok(())
}

/// Best-effort text of a script value for `log`. Never runs script code:
/// composites are logged by their type tag, bridge userdata by the same
/// form their `__tostring` produces.
fn describe<H: HostRuntime>(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.to_string_lossy().to_string(),
        Value::UserData(ud) => {
            let described = if let Ok(reference) = ud.borrow::<ObjectReference<H>>() {
                reference.describe().ok()
            } else if let Ok(record) = ud.borrow::<ClassRecord<H>>() {
                record.describe().ok()
            } else {
                None
            };
            described.unwrap_or_else(|| value.type_name().to_string())
        }
        other => other.type_name().to_string(),
    }
}

/// `import(name | class reference | class record)`
fn import<H: HostRuntime>(lua: &Lua, host: &Rc<H>, target: &Value) -> BridgeResult<AnyUserData> {
    let selector = match target {
        Value::String(name) => ClassSelector::Name(name.to_string_lossy().to_string()),
        Value::UserData(ud) => {
            if let Ok(reference) = ud.borrow::<ObjectReference<H>>() {
                ClassSelector::Handle(reference.unwrap().clone())
            } else if let Ok(record) = ud.borrow::<ClassRecord<H>>() {
                ClassSelector::Handle(record.descriptor().class().clone())
            } else {
                return Err(BridgeError::Conversion(
                    "import expects a class name or class reference".to_string(),
                ));
            }
        }
        other => {
            return Err(BridgeError::Conversion(format!(
                "import expects a class name, got {}",
                other.type_name()
            )))
        }
    };

    let descriptor = reflect::import(host.as_ref(), selector)?;
    let record = ClassRecord::new(lua, host, descriptor)?;
    Ok(lua.create_userdata(record)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryAssets;
    use crate::sim::SimHost;

    fn registered() -> (Lua, Rc<SimHost>) {
        let lua = Lua::new();
        let host = Rc::new(SimHost::new());
        let assets: Rc<dyn AssetArchive> = Rc::new(MemoryAssets::new());
        register(&lua, &host, &assets, &BridgeConfig::default()).unwrap();
        (lua, host)
    }

    #[test]
    fn test_log_never_runs_tostring_metamethods() {
        let (lua, _host) = registered();
        let result = lua
            .load(r#"_internal.log(setmetatable({}, { __tostring = function() error("boom") end }))"#)
            .exec();
        assert!(result.is_ok(), "{:?}", result.err());
    }

    #[test]
    fn test_log_survives_missing_tostring() {
        let (lua, _host) = registered();
        let result = lua
            .load("tostring = nil _internal.log(42) _internal.log(1.5) _internal.log(true)")
            .exec();
        assert!(result.is_ok(), "{:?}", result.err());
    }

    #[test]
    fn test_describe_values() {
        let (lua, _host) = registered();
        let d = |code: &str| describe::<SimHost>(&lua.load(code).eval::<Value>().unwrap());

        assert_eq!(d("return nil"), "nil");
        assert_eq!(d("return false"), "false");
        assert_eq!(d("return 42"), "42");
        assert_eq!(d("return 'text'"), "text");
        assert_eq!(d("return {}"), "table");
        assert_eq!(d("return print"), "function");
        assert_eq!(d("return _internal.import('java.lang.Math')"), "ClassRecord(java.lang.Math)");
        assert_eq!(
            d("return _internal.import('java.lang.Math').class"),
            "ObjectReference(java.lang.Class)"
        );
    }
}
