//! Slick Bridge - Lua scripting over a reflective host runtime
//!
//! Lets Lua scripts import host classes, construct instances and call
//! overloaded methods without any per-class binding code. Classes are
//! introspected at `import` time; every call resolves one overload from the
//! dynamic types of its arguments and marshals values in both directions.
//! Host objects handed to scripts stay alive until the Lua garbage
//! collector finalizes their wrappers.
//!
//! # Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use slick_bridge::{Bridge, BridgeConfig, MemoryAssets, SimHost};
//!
//! let assets = MemoryAssets::new().with(
//!     "assets/main.lua",
//!     r#"
//!     local M = {}
//!     function M.start(name)
//!         local String = _internal.import("java.lang.String")
//!         _internal.log(_internal.invoke(String, "concat", "hello ", name))
//!     end
//!     return M
//!     "#,
//! );
//! let host = Rc::new(SimHost::new());
//! let bridge = Bridge::initialize(host.clone(), assets, BridgeConfig::default())?;
//! bridge.call("main", "start", &[Some(host.string("world"))]);
//! bridge.destroy();
//! ```

pub mod api;
pub mod archive;
pub mod args;
pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod loader;
pub mod marshal;
pub mod record;
pub mod reference;
pub mod reflect;
pub mod resolve;
pub mod sim;

pub use archive::{AssetArchive, DirAssets, MemoryAssets, ZipAssets};
pub use bridge::Bridge;
pub use config::{BridgeConfig, ConfigError};
pub use error::{BridgeError, BridgeResult};
pub use host::{HostRuntime, KnownClass, MemberInfo, MemberKind, Primitive};
pub use marshal::ScriptValue;
pub use record::ClassRecord;
pub use reference::ObjectReference;
pub use reflect::{ClassSelector, HostClassDescriptor, MethodDescriptor};
pub use sim::{ClassDef, SimHost, SimObject};
