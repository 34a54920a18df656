//! Reflection cache
//!
//! Introspects a host class once per `import` and freezes the result into
//! overload tables: an ordered constructor list and a name → overload list
//! map. Order is whatever the host enumerates; nothing here reorders.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::{BridgeError, BridgeResult};
use crate::host::{HostRuntime, MemberKind};

/// Invocation handle plus declared signature of one overload.
///
/// Immutable once built; the parameter list length never changes.
pub struct MethodDescriptor<H: HostRuntime> {
    kind: MemberKind,
    name: String,
    handle: H::Object,
    parameter_types: Box<[H::Object]>,
    is_var_args: bool,
}

impl<H: HostRuntime> MethodDescriptor<H> {
    /// Build a descriptor from a reflective member, taking durable handles
    /// for the member and every declared parameter type.
    pub fn from_member(host: &H, member: &H::Object, kind: MemberKind) -> BridgeResult<Self> {
        let info = host.describe_member(member, kind)?;
        let parameter_types = info
            .parameter_types
            .iter()
            .map(|ty| host.retain(ty))
            .collect::<BridgeResult<Vec<_>>>()?;

        Ok(Self {
            kind,
            name: info.name,
            handle: host.retain(member)?,
            parameter_types: parameter_types.into_boxed_slice(),
            is_var_args: info.is_var_args,
        })
    }

    /// Constructor or method
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Reflected member name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reflective handle used to invoke this overload
    pub fn handle(&self) -> &H::Object {
        &self.handle
    }

    /// Declared parameter types, trailing array slot included
    pub fn parameter_types(&self) -> &[H::Object] {
        &self.parameter_types
    }

    /// Number of declared parameters, trailing array slot included
    pub fn parameter_count(&self) -> usize {
        self.parameter_types.len()
    }

    /// Parameters matched one-to-one with call-site arguments
    pub fn fixed_parameter_types(&self) -> &[H::Object] {
        if self.is_var_args {
            &self.parameter_types[..self.parameter_types.len().saturating_sub(1)]
        } else {
            &self.parameter_types
        }
    }

    /// Declared type of the trailing array slot
    pub fn var_args_type(&self) -> Option<&H::Object> {
        if self.is_var_args {
            self.parameter_types.last()
        } else {
            None
        }
    }

    /// Whether the last parameter is variadic
    pub fn is_var_args(&self) -> bool {
        self.is_var_args
    }

    /// Render the declared parameter list, e.g. `(int, java.lang.String[])`
    pub fn signature(&self, host: &H) -> BridgeResult<String> {
        let names = self
            .parameter_types
            .iter()
            .map(|ty| host.type_name(ty))
            .collect::<BridgeResult<Vec<_>>>()?;
        Ok(format!("({})", names.join(", ")))
    }
}

impl<H: HostRuntime> fmt::Debug for MethodDescriptor<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("parameter_count", &self.parameter_types.len())
            .field("is_var_args", &self.is_var_args)
            .finish()
    }
}

/// How a script names the class to import
pub enum ClassSelector<H: HostRuntime> {
    /// Class name as the host resolves it
    Name(String),
    /// A class object the script already holds
    Handle(H::Object),
}

/// Overload tables of one host class
pub struct HostClassDescriptor<H: HostRuntime> {
    class: H::Object,
    constructors: Vec<Rc<MethodDescriptor<H>>>,
    methods: FxHashMap<String, Vec<Rc<MethodDescriptor<H>>>>,
}

impl<H: HostRuntime> HostClassDescriptor<H> {
    /// Class handle
    pub fn class(&self) -> &H::Object {
        &self.class
    }

    /// Constructors in host enumeration order
    pub fn constructors(&self) -> &[Rc<MethodDescriptor<H>>] {
        &self.constructors
    }

    /// All overloads of `name`, in host enumeration order
    pub fn overloads(&self, name: &str) -> &[Rc<MethodDescriptor<H>>] {
        self.methods.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Method name → overload list
    pub fn methods(&self) -> &FxHashMap<String, Vec<Rc<MethodDescriptor<H>>>> {
        &self.methods
    }
}

/// Introspect a class and build its overload tables.
///
/// Every call reflects afresh; two imports of the same class yield two
/// independent descriptors.
pub fn import<H: HostRuntime>(
    host: &H,
    selector: ClassSelector<H>,
) -> BridgeResult<HostClassDescriptor<H>> {
    let class = match selector {
        ClassSelector::Name(name) => host
            .find_class(&name)?
            .ok_or(BridgeError::ClassNotFound(name))?,
        ClassSelector::Handle(class) => class,
    };
    let class = host.retain(&class)?;

    let constructors = host
        .constructors(&class)?
        .iter()
        .map(|member| MethodDescriptor::from_member(host, member, MemberKind::Constructor).map(Rc::new))
        .collect::<BridgeResult<Vec<_>>>()?;

    let mut methods: FxHashMap<String, Vec<Rc<MethodDescriptor<H>>>> = FxHashMap::default();
    for member in host.methods(&class)? {
        let descriptor = MethodDescriptor::from_member(host, &member, MemberKind::Method)?;
        methods
            .entry(descriptor.name().to_string())
            .or_default()
            .push(Rc::new(descriptor));
    }

    tracing::debug!(
        target: "slick",
        class = %host.type_name(&class)?,
        constructors = constructors.len(),
        methods = methods.len(),
        "imported class"
    );

    Ok(HostClassDescriptor {
        class,
        constructors,
        methods,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ClassDef, SimHost};

    fn sample_host() -> SimHost {
        let host = SimHost::new();
        host.define_class(
            ClassDef::new("demo.Greeter")
                .constructor(&[], |_, _| Ok(Box::new(())))
                .constructor(&["java.lang.String"], |_, _| Ok(Box::new(())))
                .method("greet", &[], |host, _, _| Ok(Some(host.string("hi"))))
                .method("greet", &["java.lang.String"], |host, _, _| {
                    Ok(Some(host.string("hi you")))
                })
                .var_args_method("greetAll", &["int", "java.lang.String[]"], |_, _, _| Ok(None)),
        );
        host
    }

    #[test]
    fn test_import_by_name_groups_overloads() {
        let host = sample_host();
        let class = import(&host, ClassSelector::Name("demo.Greeter".to_string())).unwrap();

        assert_eq!(class.constructors().len(), 2);
        assert_eq!(class.overloads("greet").len(), 2);
        assert_eq!(class.overloads("missing").len(), 0);
        // Inherited from java.lang.Object
        assert!(!class.overloads("toString").is_empty());
    }

    #[test]
    fn test_descriptor_captures_signature() {
        let host = sample_host();
        let class = import(&host, ClassSelector::Name("demo/Greeter".to_string())).unwrap();

        let greet_all = &class.overloads("greetAll")[0];
        assert!(greet_all.is_var_args());
        assert_eq!(greet_all.parameter_count(), 2);
        assert_eq!(greet_all.fixed_parameter_types().len(), 1);
        assert_eq!(
            greet_all.signature(&host).unwrap(),
            "(int, java.lang.String[])"
        );
        assert_eq!(greet_all.kind(), MemberKind::Method);
    }

    #[test]
    fn test_import_unknown_class_fails() {
        let host = sample_host();
        let err = import(&host, ClassSelector::Name("demo.Nope".to_string()))
            .err()
            .unwrap();
        assert!(matches!(err, BridgeError::ClassNotFound(ref n) if n == "demo.Nope"));
    }

    #[test]
    fn test_import_by_handle_reflects_fresh() {
        let host = sample_host();
        let handle = host.class("demo.Greeter").unwrap();
        let a = import(&host, ClassSelector::Handle(handle.clone())).unwrap();
        let b = import(&host, ClassSelector::Handle(handle)).unwrap();
        assert!(!Rc::ptr_eq(&a.constructors()[0], &b.constructors()[0]));
        assert!(host.is_same_object(a.class(), b.class()));
    }
}
