//! Bridge lifecycle: initialize, call, destroy
//!
//! One [`Bridge`] owns one Lua state wired to one host runtime and one
//! asset archive. The host calls into scripts only through [`Bridge::call`],
//! which never reports failure back to the host: problems are logged and
//! the call returns.

use std::path::Path;
use std::rc::Rc;

use mlua::{Function, Lua, MultiValue, Value};

use crate::api;
use crate::archive::{AssetArchive, ZipAssets};
use crate::config::{BridgeConfig, ConfigError, BUNDLE_PATH};
use crate::error::{BridgeError, BridgeResult};
use crate::host::HostRuntime;
use crate::loader;
use crate::marshal::{from_host, into_lua};

/// A Lua state bridged to a reflective host runtime
pub struct Bridge<H: HostRuntime> {
    lua: Lua,
    host: Rc<H>,
    config: BridgeConfig,
}

impl<H: HostRuntime> Bridge<H> {
    /// Create the Lua state, register the primitive API and wire module
    /// loading to `assets`.
    pub fn initialize(
        host: Rc<H>,
        assets: impl AssetArchive + 'static,
        config: BridgeConfig,
    ) -> BridgeResult<Self> {
        config.validate()?;

        let lua = Lua::new();
        let assets: Rc<dyn AssetArchive> = Rc::new(assets);
        api::register(&lua, &host, &assets, &config)?;
        loader::install(&lua, &assets, &config)?;

        tracing::info!(
            target: "slick",
            api = %config.api_name,
            asset_root = %config.asset_root,
            "bridge initialized"
        );

        Ok(Self { lua, host, config })
    }

    /// Open an application bundle (zip/APK) and initialize from it.
    ///
    /// An optional `slick.toml` at the bundle root configures the bridge;
    /// `storage_path`, when given, overrides the configured one.
    pub fn open(host: Rc<H>, bundle_path: &Path, storage_path: Option<&Path>) -> BridgeResult<Self> {
        let assets = ZipAssets::open(bundle_path)?;

        let mut config = match assets.inflate(BUNDLE_PATH) {
            Some(bytes) => {
                let text = String::from_utf8(bytes).map_err(|e| {
                    ConfigError::ValidationError(format!("{} is not UTF-8: {}", BUNDLE_PATH, e))
                })?;
                BridgeConfig::from_toml_str(&text)?
            }
            None => BridgeConfig::default(),
        };
        if let Some(path) = storage_path {
            config.storage_path = Some(path.to_path_buf());
        }

        tracing::debug!(target: "slick", bundle = %bundle_path.display(), "opening bundle");
        Self::initialize(host, assets, config)
    }

    /// Call `module.function(args...)`, discarding any result.
    ///
    /// Host arguments are marshaled without a hint. Failures (module not
    /// found, function not found, script error) are logged and swallowed.
    pub fn call(&self, module: &str, function: &str, args: &[Option<H::Object>]) {
        if let Err(e) = self.try_call(module, function, args) {
            tracing::error!(target: "slick", module, function, "{}", e);
        }
    }

    /// [`Bridge::call`] that reports what went wrong
    pub fn try_call(&self, module: &str, function: &str, args: &[Option<H::Object>]) -> BridgeResult<()> {
        let require: Function = self.lua.globals().get("require")?;
        let exports: Value = require.call(module).map_err(|source| BridgeError::ModuleLoad {
            module: module.to_string(),
            source,
        })?;

        let entry = match &exports {
            Value::Table(table) => table.get::<Value>(function)?,
            _ => Value::Nil,
        };
        let Value::Function(entry) = entry else {
            return Err(BridgeError::FunctionNotFound {
                module: module.to_string(),
                function: function.to_string(),
            });
        };

        let values = args
            .iter()
            .map(|arg| {
                let value = from_host(self.host.as_ref(), arg.as_ref())?;
                into_lua(&self.lua, &self.host, value)
            })
            .collect::<BridgeResult<Vec<_>>>()?;

        entry
            .call::<()>(MultiValue::from_vec(values))
            .map_err(|source| BridgeError::Call {
                module: module.to_string(),
                function: function.to_string(),
                source,
            })
    }

    /// Close the Lua state. Every outstanding object reference is finalized
    /// and its host handle released.
    pub fn destroy(self) {
        let Self { lua, host, .. } = self;
        drop(lua);
        drop(host);
        tracing::info!(target: "slick", "bridge destroyed");
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    pub fn host(&self) -> &Rc<H> {
        &self.host
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}
