//! Script-visible class records
//!
//! A [`ClassRecord`] is what `import` hands to scripts: the class object,
//! its constructors, its methods grouped by name and an always-empty
//! `fields` table. Every constructor and method is exposed as a method
//! reference, an [`ObjectReference`] carrying its [`MethodDescriptor`].

use std::rc::Rc;

use mlua::{AnyUserData, Lua, MetaMethod, Table, UserData, UserDataFields, UserDataMethods, Value, Variadic};

use crate::dispatch;
use crate::error::BridgeResult;
use crate::host::HostRuntime;
use crate::reference::ObjectReference;
use crate::reflect::{HostClassDescriptor, MethodDescriptor};

/// Imported host class, as seen by scripts
pub struct ClassRecord<H: HostRuntime> {
    host: Rc<H>,
    descriptor: HostClassDescriptor<H>,
    class: AnyUserData,
    constructors: Table,
    methods: Table,
    fields: Table,
}

impl<H: HostRuntime> ClassRecord<H> {
    /// Build the script tables for an imported class
    pub fn new(lua: &Lua, host: &Rc<H>, descriptor: HostClassDescriptor<H>) -> BridgeResult<Self> {
        let class = lua.create_userdata(ObjectReference::wrap(host, descriptor.class(), None)?)?;

        let constructors = method_references(lua, host, descriptor.constructors())?;

        let methods = lua.create_table_with_capacity(0, descriptor.methods().len())?;
        for (name, overloads) in descriptor.methods() {
            methods.raw_set(name.as_str(), method_references(lua, host, overloads)?)?;
        }

        Ok(Self {
            host: Rc::clone(host),
            descriptor,
            class,
            constructors,
            methods,
            fields: lua.create_table()?,
        })
    }

    /// Reflected overload tables
    pub fn descriptor(&self) -> &HostClassDescriptor<H> {
        &self.descriptor
    }

    pub fn host(&self) -> &Rc<H> {
        &self.host
    }

    /// Text form used by `__tostring`, e.g. `ClassRecord(java.lang.Math)`
    pub fn describe(&self) -> BridgeResult<String> {
        Ok(format!("ClassRecord({})", self.host.type_name(self.descriptor.class())?))
    }
}

fn method_references<H: HostRuntime>(
    lua: &Lua,
    host: &Rc<H>,
    overloads: &[Rc<MethodDescriptor<H>>],
) -> BridgeResult<Table> {
    let table = lua.create_table_with_capacity(overloads.len(), 0)?;
    for (i, descriptor) in overloads.iter().enumerate() {
        let reference = ObjectReference::wrap(host, descriptor.handle(), Some(Rc::clone(descriptor)))?;
        table.raw_set(i + 1, reference)?;
    }
    Ok(table)
}

impl<H: HostRuntime> UserData for ClassRecord<H> {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("class", |_, this| Ok(this.class.clone()));
        fields.add_field_method_get("constructors", |_, this| Ok(this.constructors.clone()));
        fields.add_field_method_get("methods", |_, this| Ok(this.methods.clone()));
        fields.add_field_method_get("fields", |_, this| Ok(this.fields.clone()));
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("new", |lua, this, args: Variadic<Value>| {
            Ok(dispatch::construct(lua, &this.host, this.descriptor.constructors(), &args)?)
        });

        methods.add_method(
            "invoke",
            |lua, this, (name, instance, args): (String, Value, Variadic<Value>)| {
                let overloads = this.descriptor.overloads(&name);
                Ok(dispatch::invoke(lua, &this.host, &name, overloads, &instance, &args)?)
            },
        );

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.describe()?));
    }
}
