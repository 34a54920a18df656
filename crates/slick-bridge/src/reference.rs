//! Cross-runtime reference management
//!
//! An [`ObjectReference`] is the only way a host object becomes visible to
//! scripts. It owns exactly one durable host handle, plus an optional
//! [`MethodDescriptor`] when the object is itself a constructor or method.
//!
//! The Lua garbage collector owns the userdata; its `__gc` runs the Rust
//! destructor, which releases the durable handle. Drop runs at most once,
//! so the handle is given back at most once and never while a script can
//! still reach the reference.

use std::fmt;
use std::rc::Rc;

use mlua::{MetaMethod, UserData, UserDataMethods};

use crate::error::BridgeResult;
use crate::host::HostRuntime;
use crate::reflect::MethodDescriptor;

/// Script-visible wrapper around one durable host object handle
pub struct ObjectReference<H: HostRuntime> {
    host: Rc<H>,
    // Taken exactly once, by Drop
    object: Option<H::Object>,
    metadata: Option<Rc<MethodDescriptor<H>>>,
}

impl<H: HostRuntime> ObjectReference<H> {
    /// Promote `object` to a durable handle and attach optional metadata
    pub fn wrap(
        host: &Rc<H>,
        object: &H::Object,
        metadata: Option<Rc<MethodDescriptor<H>>>,
    ) -> BridgeResult<Self> {
        let durable = host.retain(object)?;
        Ok(Self {
            host: Rc::clone(host),
            object: Some(durable),
            metadata,
        })
    }

    /// Borrow the wrapped host object (no ownership transfer)
    pub fn unwrap(&self) -> &H::Object {
        match &self.object {
            Some(object) => object,
            // Only Drop empties the slot
            None => unreachable!("object reference used after finalization"),
        }
    }

    /// Method descriptor attached when this reference exposes a member
    pub fn metadata(&self) -> Option<&Rc<MethodDescriptor<H>>> {
        self.metadata.as_ref()
    }

    /// Text form used by `__tostring`, e.g. `ObjectReference(java.lang.String)`
    /// or `ObjectReference(java.lang.reflect.Method#length)`
    pub fn describe(&self) -> BridgeResult<String> {
        let class = self.host.class_of(self.unwrap())?;
        let name = self.host.type_name(&class)?;
        Ok(match &self.metadata {
            Some(method) => format!("ObjectReference({}#{})", name, method.name()),
            None => format!("ObjectReference({})", name),
        })
    }

    /// Host this reference belongs to
    pub fn host(&self) -> &Rc<H> {
        &self.host
    }
}

impl<H: HostRuntime> Drop for ObjectReference<H> {
    fn drop(&mut self) {
        self.metadata.take();
        if let Some(object) = self.object.take() {
            self.host.release(object);
        }
    }
}

impl<H: HostRuntime> fmt::Debug for ObjectReference<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectReference")
            .field("method", &self.metadata.as_ref().map(|m| m.name()))
            .finish_non_exhaustive()
    }
}

impl<H: HostRuntime> UserData for ObjectReference<H> {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.describe()?));

        methods.add_meta_function(
            MetaMethod::Eq,
            |_, (a, b): (mlua::AnyUserData, mlua::AnyUserData)| {
                let (Ok(a), Ok(b)) = (a.borrow::<Self>(), b.borrow::<Self>()) else {
                    return Ok(false);
                };
                Ok(a.host.is_same_object(a.unwrap(), b.unwrap()))
            },
        );
    }
}
