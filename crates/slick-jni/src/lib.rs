//! Slick JNI - native entry points of `com.slick.core.Lua`
//!
//! Exposes the bridge to the Java VM as three static natives:
//!
//! ```java
//! package com.slick.core;
//!
//! public final class Lua {
//!     public static native long init(String apkPath, String storagePath);
//!     public static native void call(String module, String function, Object[] args);
//!     public static native void destroy();
//! }
//! ```
//!
//! The bridge instance lives in a thread-local slot: the Java side owns a
//! single thread that calls `init`, any number of `call`s and `destroy`.

pub mod host;

pub use host::JvmHost;

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Once;

use jni::objects::{GlobalRef, JClass, JObjectArray, JString};
use jni::sys::jlong;
use jni::JNIEnv;
use slick_bridge::{Bridge, BridgeError, BridgeResult};
use tracing_subscriber::EnvFilter;

thread_local! {
    static BRIDGE: RefCell<Option<Bridge<JvmHost>>> = const { RefCell::new(None) };
}

static LOGGING: Once = Once::new();

/// Install the fmt subscriber once per process. `RUST_LOG` overrides the
/// default `info` filter.
fn init_logging() {
    LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new("info"))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}

// ============================================================================
// Argument helpers
// ============================================================================

fn read_string(env: &mut JNIEnv, value: &JString) -> BridgeResult<Option<String>> {
    if value.is_null() {
        return Ok(None);
    }
    let text = env
        .get_string(value)
        .map_err(|e| BridgeError::Host(e.to_string()))?;
    Ok(Some(text.into()))
}

fn read_arguments(env: &mut JNIEnv, args: &JObjectArray) -> BridgeResult<Vec<Option<GlobalRef>>> {
    if args.is_null() {
        return Ok(Vec::new());
    }
    let host_error = |e: jni::errors::Error| BridgeError::Host(e.to_string());
    let len = env.get_array_length(args).map_err(host_error)?;
    let mut out = Vec::with_capacity(len as usize);
    for i in 0..len {
        let element = env.get_object_array_element(args, i).map_err(host_error)?;
        if element.is_null() {
            out.push(None);
        } else {
            out.push(Some(env.new_global_ref(&element).map_err(host_error)?));
            env.delete_local_ref(element).map_err(host_error)?;
        }
    }
    Ok(out)
}

fn start(env: &mut JNIEnv, apk_path: &JString, storage_path: &JString) -> BridgeResult<Bridge<JvmHost>> {
    let apk_path = read_string(env, apk_path)?
        .ok_or_else(|| BridgeError::Archive("bundle path is null".to_string()))?;
    let storage_path = read_string(env, storage_path)?.map(PathBuf::from);

    let vm = env
        .get_java_vm()
        .map_err(|e| BridgeError::Host(e.to_string()))?;
    let host = Rc::new(JvmHost::new(vm)?);
    Bridge::open(host, Path::new(&apk_path), storage_path.as_deref())
}

// ============================================================================
// Native entry points
// ============================================================================

/// `static native long init(String apkPath, String storagePath)`
///
/// Returns 1 once the bridge is up, 0 if it could not be created.
#[no_mangle]
pub extern "system" fn Java_com_slick_core_Lua_init<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    apk_path: JString<'local>,
    storage_path: JString<'local>,
) -> jlong {
    init_logging();

    match start(&mut env, &apk_path, &storage_path) {
        Ok(bridge) => {
            BRIDGE.with(|slot| *slot.borrow_mut() = Some(bridge));
            1
        }
        Err(e) => {
            tracing::error!(target: "slick", "init failed: {}", e);
            0
        }
    }
}

/// `static native void call(String module, String function, Object[] args)`
#[no_mangle]
pub extern "system" fn Java_com_slick_core_Lua_call<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    module: JString<'local>,
    function: JString<'local>,
    args: JObjectArray<'local>,
) {
    let prepared = read_string(&mut env, &module).and_then(|module| {
        let function = read_string(&mut env, &function)?;
        let args = read_arguments(&mut env, &args)?;
        Ok((module, function, args))
    });

    let (module, function, args) = match prepared {
        Ok((Some(module), Some(function), args)) => (module, function, args),
        Ok(_) => {
            tracing::error!(target: "slick", "call with null module or function name");
            return;
        }
        Err(e) => {
            tracing::error!(target: "slick", "cannot read call arguments: {}", e);
            return;
        }
    };

    BRIDGE.with(|slot| match slot.borrow().as_ref() {
        Some(bridge) => bridge.call(&module, &function, &args),
        None => tracing::error!(target: "slick", %module, %function, "call before init"),
    });
}

/// `static native void destroy()`
#[no_mangle]
pub extern "system" fn Java_com_slick_core_Lua_destroy<'local>(_env: JNIEnv<'local>, _class: JClass<'local>) {
    let bridge = BRIDGE.with(|slot| slot.borrow_mut().take());
    match bridge {
        Some(bridge) => bridge.destroy(),
        None => tracing::warn!(target: "slick", "destroy without a live bridge"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_init_is_idempotent() {
        init_logging();
        init_logging();
        assert!(LOGGING.is_completed());
    }

    #[test]
    fn test_no_bridge_before_init() {
        BRIDGE.with(|slot| assert!(slot.borrow().is_none()));
    }
}
