//! Module loading from the asset archive
//!
//! Appends a searcher to `package.searchers` so `require("a.b")` finds
//! `<asset_root>/a/b.lua` or `<asset_root>/a/b/init.lua` inside the bundle.
//! The built-in searchers stay in front of it.

use std::rc::Rc;

use mlua::{Lua, Table, Value};

use crate::archive::AssetArchive;
use crate::config::BridgeConfig;
use crate::error::BridgeResult;

/// Install the archive searcher
pub fn install(lua: &Lua, assets: &Rc<dyn AssetArchive>, config: &BridgeConfig) -> BridgeResult<()> {
    let package: Table = lua.globals().get("package")?;
    let searchers: Table = package.get("searchers")?;

    let assets = Rc::clone(assets);
    let config = config.clone();
    let searcher = lua.create_function(move |lua, module: String| {
        let paths = config.module_paths(&module);
        for path in &paths {
            if let Some(source) = assets.inflate(path) {
                tracing::debug!(target: "slick", module = %module, path = %path, "loading module");
                let chunk = lua
                    .load(source)
                    .set_name(format!("={}", module))
                    .into_function()?;
                return Ok((Value::Function(chunk), Value::String(lua.create_string(path)?)));
            }
        }

        // Lua 5.4 prefixes each searcher message with "\n\t" itself
        let message = paths
            .iter()
            .map(|path| format!("no asset '{}'", path))
            .collect::<Vec<_>>()
            .join("\n\t");
        Ok((Value::String(lua.create_string(&message)?), Value::Nil))
    })?;

    searchers.raw_set(searchers.raw_len() + 1, searcher)?;
    Ok(())
}
