//! SimHost - an in-process reflective host
//!
//! Implements [`HostRuntime`] without a JVM so the bridge can be exercised
//! end to end from plain `cargo test`. It models the parts of a reflective
//! host the bridge relies on: a class hierarchy with interfaces, primitive
//! and array classes, public constructors and methods (inherited ones
//! included), JVM-style argument checking on invocation, and durable handle
//! accounting so tests can observe retain/release balance.
//!
//! Class names use dotted form (`java.lang.String`); slashed names are
//! accepted wherever a name is looked up.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::{BridgeError, BridgeResult};
use crate::host::{HostRuntime, KnownClass, MemberInfo, MemberKind, Primitive};

type ConstructorFn = Rc<dyn Fn(&SimHost, &[Option<SimObject>]) -> Result<Box<dyn Any>, String>>;
type MethodFn =
    Rc<dyn Fn(&SimHost, &SimObject, &[Option<SimObject>]) -> Result<Option<SimObject>, String>>;
type StaticFn = Rc<dyn Fn(&SimHost, &[Option<SimObject>]) -> Result<Option<SimObject>, String>>;

// ============================================================================
// Objects
// ============================================================================

/// Handle to a simulated host object. Equality is identity.
#[derive(Clone)]
pub struct SimObject(Rc<Payload>);

enum Payload {
    Class(ClassData),
    Member(MemberData),
    Str(String),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Array {
        class: SimObject,
        elements: RefCell<Vec<Option<SimObject>>>,
    },
    Instance {
        class: SimObject,
        state: RefCell<Box<dyn Any>>,
    },
}

struct ClassData {
    name: String,
    superclass: Option<SimObject>,
    interfaces: Vec<SimObject>,
    is_interface: bool,
    is_primitive: bool,
    component: Option<SimObject>,
    constructors: RefCell<Vec<SimObject>>,
    methods: RefCell<Vec<SimObject>>,
}

struct MemberData {
    name: String,
    declaring: SimObject,
    parameter_types: Vec<SimObject>,
    is_var_args: bool,
    body: Body,
}

#[derive(Clone)]
enum Body {
    Constructor(ConstructorFn),
    Method(MethodFn),
    Static(StaticFn),
}

impl SimObject {
    fn new(payload: Payload) -> Self {
        SimObject(Rc::new(payload))
    }

    fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    fn class_data(&self) -> Option<&ClassData> {
        match &*self.0 {
            Payload::Class(data) => Some(data),
            _ => None,
        }
    }

    fn member_data(&self) -> Option<&MemberData> {
        match &*self.0 {
            Payload::Member(data) => Some(data),
            _ => None,
        }
    }

    /// Integral value of a boxed short, int or long
    pub fn as_i64(&self) -> Option<i64> {
        match &*self.0 {
            Payload::Short(v) => Some(i64::from(*v)),
            Payload::Int(v) => Some(i64::from(*v)),
            Payload::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Value of any boxed number
    pub fn as_f64(&self) -> Option<f64> {
        match &*self.0 {
            Payload::Short(v) => Some(f64::from(*v)),
            Payload::Int(v) => Some(f64::from(*v)),
            Payload::Long(v) => Some(*v as f64),
            Payload::Float(v) => Some(f64::from(*v)),
            Payload::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Contents of a string
    pub fn as_str(&self) -> Option<String> {
        match &*self.0 {
            Payload::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Value of a boxed boolean
    pub fn as_bool(&self) -> Option<bool> {
        match &*self.0 {
            Payload::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Snapshot of an array's elements
    pub fn as_array(&self) -> Option<Vec<Option<SimObject>>> {
        match &*self.0 {
            Payload::Array { elements, .. } => Some(elements.borrow().clone()),
            _ => None,
        }
    }

    /// Run `f` on the state of an instance created by a [`ClassDef`]
    /// constructor. `None` if this is not such an instance, the state is
    /// not a `T`, or the state is already borrowed.
    pub fn with_state<T: 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        match &*self.0 {
            Payload::Instance { state, .. } => {
                let mut state = state.try_borrow_mut().ok()?;
                state.downcast_mut::<T>().map(f)
            }
            _ => None,
        }
    }
}

impl PartialEq for SimObject {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for SimObject {}

impl fmt::Debug for SimObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            Payload::Class(data) => write!(f, "Class({})", data.name),
            Payload::Member(data) => write!(f, "Member({})", data.name),
            Payload::Str(s) => write!(f, "String({:?})", s),
            Payload::Short(v) => write!(f, "Short({})", v),
            Payload::Int(v) => write!(f, "Integer({})", v),
            Payload::Long(v) => write!(f, "Long({})", v),
            Payload::Float(v) => write!(f, "Float({})", v),
            Payload::Double(v) => write!(f, "Double({})", v),
            Payload::Bool(v) => write!(f, "Boolean({})", v),
            Payload::Array { elements, .. } => write!(f, "Array(len={})", elements.borrow().len()),
            Payload::Instance { class, .. } => write!(f, "Instance({})", class_name(class)),
        }
    }
}

fn class_name(class: &SimObject) -> &str {
    class.class_data().map(|d| d.name.as_str()).unwrap_or("?")
}

fn normalize(name: &str) -> String {
    name.replace('/', ".")
}

// ============================================================================
// Class definitions
// ============================================================================

struct MemberDef {
    name: String,
    params: Vec<String>,
    is_var_args: bool,
    body: Body,
}

/// Builder for a simulated class
pub struct ClassDef {
    name: String,
    superclass: String,
    interfaces: Vec<String>,
    is_interface: bool,
    constructors: Vec<MemberDef>,
    methods: Vec<MemberDef>,
}

impl ClassDef {
    /// Class extending `java.lang.Object`
    pub fn new(name: &str) -> Self {
        Self {
            name: normalize(name),
            superclass: "java.lang.Object".to_string(),
            interfaces: Vec::new(),
            is_interface: false,
            constructors: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Interface type (no superclass, not instantiable)
    pub fn interface(name: &str) -> Self {
        Self {
            is_interface: true,
            ..Self::new(name)
        }
    }

    /// Class name, dotted
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extends(mut self, superclass: &str) -> Self {
        self.superclass = normalize(superclass);
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(normalize(interface));
        self
    }

    /// Public constructor; the body returns the new instance's state
    pub fn constructor<F>(self, params: &[&str], body: F) -> Self
    where
        F: Fn(&SimHost, &[Option<SimObject>]) -> Result<Box<dyn Any>, String> + 'static,
    {
        self.push_constructor(params, false, body)
    }

    /// Public constructor whose last parameter is variadic
    pub fn var_args_constructor<F>(self, params: &[&str], body: F) -> Self
    where
        F: Fn(&SimHost, &[Option<SimObject>]) -> Result<Box<dyn Any>, String> + 'static,
    {
        self.push_constructor(params, true, body)
    }

    /// Public instance method
    pub fn method<F>(self, name: &str, params: &[&str], body: F) -> Self
    where
        F: Fn(&SimHost, &SimObject, &[Option<SimObject>]) -> Result<Option<SimObject>, String>
            + 'static,
    {
        self.push_method(name, params, false, Body::Method(Rc::new(body)))
    }

    /// Public instance method whose last parameter is variadic
    pub fn var_args_method<F>(self, name: &str, params: &[&str], body: F) -> Self
    where
        F: Fn(&SimHost, &SimObject, &[Option<SimObject>]) -> Result<Option<SimObject>, String>
            + 'static,
    {
        self.push_method(name, params, true, Body::Method(Rc::new(body)))
    }

    /// Public static method
    pub fn static_method<F>(self, name: &str, params: &[&str], body: F) -> Self
    where
        F: Fn(&SimHost, &[Option<SimObject>]) -> Result<Option<SimObject>, String> + 'static,
    {
        self.push_method(name, params, false, Body::Static(Rc::new(body)))
    }

    fn push_constructor<F>(mut self, params: &[&str], is_var_args: bool, body: F) -> Self
    where
        F: Fn(&SimHost, &[Option<SimObject>]) -> Result<Box<dyn Any>, String> + 'static,
    {
        self.constructors.push(MemberDef {
            name: self.name.clone(),
            params: params.iter().map(|p| normalize(p)).collect(),
            is_var_args,
            body: Body::Constructor(Rc::new(body)),
        });
        self
    }

    fn push_method(mut self, name: &str, params: &[&str], is_var_args: bool, body: Body) -> Self {
        self.methods.push(MemberDef {
            name: name.to_string(),
            params: params.iter().map(|p| normalize(p)).collect(),
            is_var_args,
            body,
        });
        self
    }
}

// ============================================================================
// Host
// ============================================================================

/// Simulated reflective host
pub struct SimHost {
    classes: RefCell<FxHashMap<String, SimObject>>,
    known: Vec<SimObject>,
    class_class: SimObject,
    constructor_class: SimObject,
    method_class: SimObject,
    durable: RefCell<FxHashMap<usize, usize>>,
    over_releases: Cell<usize>,
}

fn declare(
    classes: &mut FxHashMap<String, SimObject>,
    name: &str,
    superclass: Option<&SimObject>,
    interfaces: &[&SimObject],
) -> SimObject {
    let class = SimObject::new(Payload::Class(ClassData {
        name: name.to_string(),
        superclass: superclass.cloned(),
        interfaces: interfaces.iter().map(|i| (*i).clone()).collect(),
        is_interface: false,
        is_primitive: false,
        component: None,
        constructors: RefCell::default(),
        methods: RefCell::default(),
    }));
    classes.insert(name.to_string(), class.clone());
    class
}

fn declare_interface(classes: &mut FxHashMap<String, SimObject>, name: &str) -> SimObject {
    let class = SimObject::new(Payload::Class(ClassData {
        name: name.to_string(),
        superclass: None,
        interfaces: Vec::new(),
        is_interface: true,
        is_primitive: false,
        component: None,
        constructors: RefCell::default(),
        methods: RefCell::default(),
    }));
    classes.insert(name.to_string(), class.clone());
    class
}

fn declare_primitive(classes: &mut FxHashMap<String, SimObject>, name: &str) -> SimObject {
    let class = SimObject::new(Payload::Class(ClassData {
        name: name.to_string(),
        superclass: None,
        interfaces: Vec::new(),
        is_interface: false,
        is_primitive: true,
        component: None,
        constructors: RefCell::default(),
        methods: RefCell::default(),
    }));
    classes.insert(name.to_string(), class.clone());
    class
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHost {
    /// Host with the `java.lang` bootstrap classes installed
    pub fn new() -> Self {
        let mut classes = FxHashMap::default();

        let object = declare(&mut classes, "java.lang.Object", None, &[]);
        let char_sequence = declare_interface(&mut classes, "java.lang.CharSequence");
        let string = declare(&mut classes, "java.lang.String", Some(&object), &[&char_sequence]);
        let number = declare(&mut classes, "java.lang.Number", Some(&object), &[]);
        let boolean = declare(&mut classes, "java.lang.Boolean", Some(&object), &[]);
        let short = declare(&mut classes, "java.lang.Short", Some(&number), &[]);
        let integer = declare(&mut classes, "java.lang.Integer", Some(&number), &[]);
        let long = declare(&mut classes, "java.lang.Long", Some(&number), &[]);
        let float = declare(&mut classes, "java.lang.Float", Some(&number), &[]);
        let double = declare(&mut classes, "java.lang.Double", Some(&number), &[]);
        let class_class = declare(&mut classes, "java.lang.Class", Some(&object), &[]);
        let constructor_class =
            declare(&mut classes, "java.lang.reflect.Constructor", Some(&object), &[]);
        let method_class = declare(&mut classes, "java.lang.reflect.Method", Some(&object), &[]);
        declare(&mut classes, "java.lang.Math", Some(&object), &[]);

        let known = vec![
            object,
            string,
            number,
            boolean,
            short,
            integer,
            long,
            float,
            double,
            declare_primitive(&mut classes, "short"),
            declare_primitive(&mut classes, "int"),
            declare_primitive(&mut classes, "long"),
            declare_primitive(&mut classes, "float"),
            declare_primitive(&mut classes, "double"),
            declare_primitive(&mut classes, "boolean"),
        ];

        let host = Self {
            classes: RefCell::new(classes),
            known,
            class_class,
            constructor_class,
            method_class,
            durable: RefCell::default(),
            over_releases: Cell::new(0),
        };
        host.install_bootstrap_members();
        host
    }

    fn install_bootstrap_members(&self) {
        let object = ClassDef::new("java.lang.Object")
            .constructor(&[], |_, _| Ok(Box::new(())))
            .method("toString", &[], |host, this, _| Ok(Some(host.string(&host.display(this)))))
            .method("hashCode", &[], |host, this, _| {
                Ok(Some(host.boxed(Primitive::Int(this.id() as i32))))
            })
            .method("equals", &["java.lang.Object"], |host, this, args| {
                let same = match args.first().and_then(Option::as_ref) {
                    Some(other) => this == other || value_equals(this, other),
                    None => false,
                };
                Ok(Some(host.boxed(Primitive::Boolean(same))))
            })
            .method("getClass", &[], |host, this, _| Ok(host.class_of(this).ok()));

        let class = ClassDef::new("java.lang.Class").method("getName", &[], |host, this, _| {
            Ok(Some(host.string(class_name(this))))
        });

        let string = ClassDef::new("java.lang.String")
            .method("length", &[], |host, this, _| {
                let s = this.as_str().ok_or("not a string")?;
                Ok(Some(host.boxed(Primitive::Int(s.chars().count() as i32))))
            })
            .method("isEmpty", &[], |host, this, _| {
                let s = this.as_str().ok_or("not a string")?;
                Ok(Some(host.boxed(Primitive::Boolean(s.is_empty()))))
            })
            .method("concat", &["java.lang.String"], |host, this, args| {
                let s = this.as_str().ok_or("not a string")?;
                let tail = arg_str(args, 0)?;
                Ok(Some(host.string(&(s + &tail))))
            })
            .method("toUpperCase", &[], |host, this, _| {
                let s = this.as_str().ok_or("not a string")?;
                Ok(Some(host.string(&s.to_uppercase())))
            })
            .static_method("valueOf", &["java.lang.Object"], |host, args| {
                let text = match args.first().and_then(Option::as_ref) {
                    Some(value) => host.display(value),
                    None => "null".to_string(),
                };
                Ok(Some(host.string(&text)))
            });

        let integer = ClassDef::new("java.lang.Integer").static_method(
            "parseInt",
            &["java.lang.String"],
            |host, args| {
                let text = arg_str(args, 0)?;
                let value = text
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| format!("NumberFormatException: For input string: \"{}\"", text))?;
                Ok(Some(host.boxed(Primitive::Int(value))))
            },
        );

        let math = ClassDef::new("java.lang.Math")
            .static_method("max", &["int", "int"], |host, args| {
                let (a, b) = (arg_i64(args, 0)?, arg_i64(args, 1)?);
                Ok(Some(host.boxed(Primitive::Int(a.max(b) as i32))))
            })
            .static_method("max", &["long", "long"], |host, args| {
                let (a, b) = (arg_i64(args, 0)?, arg_i64(args, 1)?);
                Ok(Some(host.boxed(Primitive::Long(a.max(b)))))
            })
            .static_method("max", &["double", "double"], |host, args| {
                let (a, b) = (arg_f64(args, 0)?, arg_f64(args, 1)?);
                Ok(Some(host.boxed(Primitive::Double(a.max(b)))))
            })
            .static_method("abs", &["double"], |host, args| {
                Ok(Some(host.boxed(Primitive::Double(arg_f64(args, 0)?.abs()))))
            });

        for def in [object, class, string, integer, math] {
            if let Some(target) = self.class(&def.name) {
                self.populate(&target, def);
            }
        }
    }

    /// Register a class, replacing any previous class of the same name.
    ///
    /// Unknown superclass, interface or parameter type names are declared
    /// on the fly as empty classes extending `java.lang.Object`.
    pub fn define_class(&self, def: ClassDef) -> SimObject {
        let superclass = if def.is_interface {
            None
        } else {
            Some(self.resolve_type(&def.superclass))
        };
        let interfaces = def.interfaces.iter().map(|i| self.resolve_type(i)).collect();

        let class = SimObject::new(Payload::Class(ClassData {
            name: def.name.clone(),
            superclass,
            interfaces,
            is_interface: def.is_interface,
            is_primitive: false,
            component: None,
            constructors: RefCell::default(),
            methods: RefCell::default(),
        }));
        self.classes.borrow_mut().insert(def.name.clone(), class.clone());
        self.populate(&class, def);
        class
    }

    fn populate(&self, class: &SimObject, def: ClassDef) {
        let Some(data) = class.class_data() else {
            return;
        };
        for member in def.constructors {
            let member = self.member(class, member);
            data.constructors.borrow_mut().push(member);
        }
        for member in def.methods {
            let member = self.member(class, member);
            data.methods.borrow_mut().push(member);
        }
    }

    fn member(&self, declaring: &SimObject, def: MemberDef) -> SimObject {
        SimObject::new(Payload::Member(MemberData {
            name: def.name,
            declaring: declaring.clone(),
            parameter_types: def.params.iter().map(|p| self.resolve_type(p)).collect(),
            is_var_args: def.is_var_args,
            body: def.body,
        }))
    }

    fn resolve_type(&self, name: &str) -> SimObject {
        if let Some(class) = self.class(name) {
            return class;
        }
        if let Some(component) = name.strip_suffix("[]") {
            let component = self.resolve_type(component);
            return self.array_class(&component);
        }
        let object = self.known_class(KnownClass::Object).clone();
        let mut classes = self.classes.borrow_mut();
        declare(&mut classes, &normalize(name), Some(&object), &[])
    }

    fn array_class(&self, component: &SimObject) -> SimObject {
        let name = format!("{}[]", class_name(component));
        if let Some(class) = self.classes.borrow().get(&name) {
            return class.clone();
        }
        let class = SimObject::new(Payload::Class(ClassData {
            name: name.clone(),
            superclass: Some(self.known_class(KnownClass::Object).clone()),
            interfaces: Vec::new(),
            is_interface: false,
            is_primitive: false,
            component: Some(component.clone()),
            constructors: RefCell::default(),
            methods: RefCell::default(),
        }));
        self.classes.borrow_mut().insert(name, class.clone());
        class
    }

    /// Look up a class by dotted or slashed name; `X[]` names an array class
    pub fn class(&self, name: &str) -> Option<SimObject> {
        let name = normalize(name);
        if let Some(class) = self.classes.borrow().get(&name) {
            return Some(class.clone());
        }
        let component = self.class(name.strip_suffix("[]")?)?;
        Some(self.array_class(&component))
    }

    /// New string object
    pub fn string(&self, value: &str) -> SimObject {
        SimObject::new(Payload::Str(value.to_string()))
    }

    /// New boxed scalar
    pub fn boxed(&self, value: Primitive) -> SimObject {
        SimObject::new(match value {
            Primitive::Short(v) => Payload::Short(v),
            Primitive::Int(v) => Payload::Int(v),
            Primitive::Long(v) => Payload::Long(v),
            Primitive::Float(v) => Payload::Float(v),
            Primitive::Double(v) => Payload::Double(v),
            Primitive::Boolean(v) => Payload::Bool(v),
        })
    }

    /// New array of `component`, without element checks
    pub fn array(&self, component: &SimObject, elements: Vec<Option<SimObject>>) -> SimObject {
        SimObject::new(Payload::Array {
            class: self.array_class(component),
            elements: RefCell::new(elements),
        })
    }

    // ========================================================================
    // Durable handle accounting
    // ========================================================================

    /// Outstanding durable handles to `object`
    pub fn durable_count(&self, object: &SimObject) -> usize {
        self.durable.borrow().get(&object.id()).copied().unwrap_or(0)
    }

    /// Outstanding durable handles across all objects
    pub fn durable_references(&self) -> usize {
        self.durable.borrow().values().sum()
    }

    /// Releases of handles that were not durable at the time
    pub fn over_releases(&self) -> usize {
        self.over_releases.get()
    }

    // ========================================================================
    // Invocation helpers
    // ========================================================================

    fn display(&self, object: &SimObject) -> String {
        match &*object.0 {
            Payload::Class(data) if data.is_interface => format!("interface {}", data.name),
            Payload::Class(data) => format!("class {}", data.name),
            Payload::Member(data) => format!("{}.{}", class_name(&data.declaring), data.name),
            Payload::Str(s) => s.clone(),
            Payload::Short(v) => v.to_string(),
            Payload::Int(v) => v.to_string(),
            Payload::Long(v) => v.to_string(),
            Payload::Float(v) => format!("{:?}", v),
            Payload::Double(v) => format!("{:?}", v),
            Payload::Bool(v) => v.to_string(),
            Payload::Array { class, .. } | Payload::Instance { class, .. } => {
                format!("{}@{:x}", class_name(class), object.id() as u32)
            }
        }
    }

    fn accepts(&self, declared: &SimObject, value: Option<&SimObject>) -> bool {
        let Some(declared_data) = declared.class_data() else {
            return false;
        };
        let Some(value) = value else {
            return !declared_data.is_primitive;
        };
        if declared_data.is_primitive {
            return unboxes_to(value, &declared_data.name);
        }
        match self.class_of(value) {
            Ok(class) => self.assignable(&class, declared),
            Err(_) => false,
        }
    }

    fn check_arguments(&self, member: &MemberData, args: &[Option<SimObject>]) -> Result<(), String> {
        if member.parameter_types.len() != args.len() {
            return Err(format!(
                "wrong number of arguments for {}: expected {}, got {}",
                member.name,
                member.parameter_types.len(),
                args.len()
            ));
        }
        for (i, (declared, value)) in member.parameter_types.iter().zip(args).enumerate() {
            if !self.accepts(declared, value.as_ref()) {
                return Err(format!(
                    "argument type mismatch for {} at position {}: expected {}",
                    member.name,
                    i,
                    class_name(declared)
                ));
            }
        }
        Ok(())
    }

    fn assignable(&self, from: &SimObject, to: &SimObject) -> bool {
        if from == to {
            return true;
        }
        let (Some(from_data), Some(to_data)) = (from.class_data(), to.class_data()) else {
            return false;
        };
        if from_data.is_primitive || to_data.is_primitive {
            return false;
        }
        if to == self.known_class(KnownClass::Object) {
            return true;
        }
        if let (Some(a), Some(b)) = (&from_data.component, &to_data.component) {
            return self.assignable(a, b);
        }
        if from_data.interfaces.iter().any(|i| self.assignable(i, to)) {
            return true;
        }
        match &from_data.superclass {
            Some(superclass) => self.assignable(superclass, to),
            None => false,
        }
    }
}

impl Drop for SimHost {
    fn drop(&mut self) {
        // Members point back at their declaring class
        for class in self.classes.get_mut().values() {
            if let Some(data) = class.class_data() {
                data.constructors.borrow_mut().clear();
                data.methods.borrow_mut().clear();
            }
        }
    }
}

fn unboxes_to(value: &SimObject, primitive: &str) -> bool {
    let rank = match &*value.0 {
        Payload::Short(_) => 1,
        Payload::Int(_) => 2,
        Payload::Long(_) => 3,
        Payload::Float(_) => 4,
        Payload::Double(_) => 5,
        Payload::Bool(_) => return primitive == "boolean",
        _ => return false,
    };
    let target = match primitive {
        "short" => 1,
        "int" => 2,
        "long" => 3,
        "float" => 4,
        "double" => 5,
        _ => return false,
    };
    rank <= target
}

fn value_equals(a: &SimObject, b: &SimObject) -> bool {
    match (&*a.0, &*b.0) {
        (Payload::Str(x), Payload::Str(y)) => x == y,
        (Payload::Bool(x), Payload::Bool(y)) => x == y,
        (Payload::Double(x), Payload::Double(y)) => x == y,
        _ => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

fn arg_str(args: &[Option<SimObject>], i: usize) -> Result<String, String> {
    args.get(i)
        .and_then(Option::as_ref)
        .and_then(SimObject::as_str)
        .ok_or_else(|| format!("NullPointerException: argument {}", i))
}

fn arg_i64(args: &[Option<SimObject>], i: usize) -> Result<i64, String> {
    args.get(i)
        .and_then(Option::as_ref)
        .and_then(SimObject::as_i64)
        .ok_or_else(|| format!("argument {} is not integral", i))
}

fn arg_f64(args: &[Option<SimObject>], i: usize) -> Result<f64, String> {
    args.get(i)
        .and_then(Option::as_ref)
        .and_then(SimObject::as_f64)
        .ok_or_else(|| format!("argument {} is not numeric", i))
}

fn not_a(what: &str, object: &SimObject) -> BridgeError {
    BridgeError::Host(format!("not a {}: {:?}", what, object))
}

impl HostRuntime for SimHost {
    type Object = SimObject;

    fn known_class(&self, class: KnownClass) -> &SimObject {
        &self.known[class as usize]
    }

    fn find_class(&self, name: &str) -> BridgeResult<Option<SimObject>> {
        Ok(self.class(name))
    }

    fn class_of(&self, object: &SimObject) -> BridgeResult<SimObject> {
        Ok(match &*object.0 {
            Payload::Class(_) => self.class_class.clone(),
            Payload::Member(data) => match data.body {
                Body::Constructor(_) => self.constructor_class.clone(),
                Body::Method(_) | Body::Static(_) => self.method_class.clone(),
            },
            Payload::Str(_) => self.known_class(KnownClass::String).clone(),
            Payload::Short(_) => self.known_class(KnownClass::Short).clone(),
            Payload::Int(_) => self.known_class(KnownClass::Integer).clone(),
            Payload::Long(_) => self.known_class(KnownClass::Long).clone(),
            Payload::Float(_) => self.known_class(KnownClass::Float).clone(),
            Payload::Double(_) => self.known_class(KnownClass::Double).clone(),
            Payload::Bool(_) => self.known_class(KnownClass::Boolean).clone(),
            Payload::Array { class, .. } | Payload::Instance { class, .. } => class.clone(),
        })
    }

    fn is_assignable_from(&self, from: &SimObject, to: &SimObject) -> BridgeResult<bool> {
        if from.class_data().is_none() {
            return Err(not_a("class", from));
        }
        if to.class_data().is_none() {
            return Err(not_a("class", to));
        }
        Ok(self.assignable(from, to))
    }

    fn is_same_object(&self, a: &SimObject, b: &SimObject) -> bool {
        a == b
    }

    fn type_name(&self, class: &SimObject) -> BridgeResult<String> {
        class
            .class_data()
            .map(|d| d.name.clone())
            .ok_or_else(|| not_a("class", class))
    }

    fn component_type(&self, array_class: &SimObject) -> BridgeResult<Option<SimObject>> {
        let data = array_class
            .class_data()
            .ok_or_else(|| not_a("class", array_class))?;
        Ok(data.component.clone())
    }

    fn constructors(&self, class: &SimObject) -> BridgeResult<Vec<SimObject>> {
        let data = class.class_data().ok_or_else(|| not_a("class", class))?;
        if data.is_interface {
            return Ok(Vec::new());
        }
        Ok(data.constructors.borrow().clone())
    }

    fn methods(&self, class: &SimObject) -> BridgeResult<Vec<SimObject>> {
        let mut out: Vec<SimObject> = Vec::new();
        let mut next = Some(class.clone());
        while let Some(class) = next.take() {
            let data = class.class_data().ok_or_else(|| not_a("class", &class))?;
            for member in data.methods.borrow().iter() {
                if !out.iter().any(|m| same_signature(m, member)) {
                    out.push(member.clone());
                }
            }
            next = data.superclass.clone();
        }
        Ok(out)
    }

    fn describe_member(
        &self,
        member: &SimObject,
        kind: MemberKind,
    ) -> BridgeResult<MemberInfo<SimObject>> {
        let data = member.member_data().ok_or_else(|| not_a("member", member))?;
        let actual = match data.body {
            Body::Constructor(_) => MemberKind::Constructor,
            Body::Method(_) | Body::Static(_) => MemberKind::Method,
        };
        if actual != kind {
            return Err(BridgeError::Host(format!(
                "{} is a {:?}, not a {:?}",
                data.name, actual, kind
            )));
        }
        Ok(MemberInfo {
            name: data.name.clone(),
            parameter_types: data.parameter_types.clone(),
            is_var_args: data.is_var_args,
        })
    }

    fn new_instance(&self, constructor: &SimObject, args: &[Option<SimObject>]) -> BridgeResult<SimObject> {
        let data = constructor
            .member_data()
            .ok_or_else(|| not_a("constructor", constructor))?;
        let Body::Constructor(body) = data.body.clone() else {
            return Err(not_a("constructor", constructor));
        };
        self.check_arguments(data, args).map_err(BridgeError::Invocation)?;

        let state = body(self, args).map_err(BridgeError::Invocation)?;
        Ok(SimObject::new(Payload::Instance {
            class: data.declaring.clone(),
            state: RefCell::new(state),
        }))
    }

    fn invoke(
        &self,
        method: &SimObject,
        receiver: Option<&SimObject>,
        args: &[Option<SimObject>],
    ) -> BridgeResult<Option<SimObject>> {
        let data = method.member_data().ok_or_else(|| not_a("method", method))?;
        self.check_arguments(data, args).map_err(BridgeError::Invocation)?;

        match data.body.clone() {
            Body::Static(body) => body(self, args).map_err(BridgeError::Invocation),
            Body::Method(body) => {
                let receiver = receiver.ok_or_else(|| {
                    BridgeError::Invocation(format!(
                        "NullPointerException: null receiver for {}",
                        data.name
                    ))
                })?;
                let class = self.class_of(receiver)?;
                if !self.assignable(&class, &data.declaring) {
                    return Err(BridgeError::Invocation(format!(
                        "object is not an instance of {}",
                        class_name(&data.declaring)
                    )));
                }
                body(self, receiver, args).map_err(BridgeError::Invocation)
            }
            Body::Constructor(_) => Err(not_a("method", method)),
        }
    }

    fn box_primitive(&self, value: Primitive) -> BridgeResult<SimObject> {
        Ok(self.boxed(value))
    }

    fn new_string(&self, value: &str) -> BridgeResult<SimObject> {
        Ok(self.string(value))
    }

    fn new_array(&self, component: &SimObject, elements: &[Option<SimObject>]) -> BridgeResult<SimObject> {
        if component.class_data().is_none() {
            return Err(not_a("class", component));
        }
        if let Some(i) = elements.iter().position(|e| !self.accepts(component, e.as_ref())) {
            return Err(BridgeError::Host(format!(
                "ArrayStoreException: element {} is not a {}",
                i,
                class_name(component)
            )));
        }
        Ok(self.array(component, elements.to_vec()))
    }

    fn string_value(&self, object: &SimObject) -> BridgeResult<String> {
        object.as_str().ok_or_else(|| not_a("string", object))
    }

    fn double_value(&self, object: &SimObject) -> BridgeResult<f64> {
        object.as_f64().ok_or_else(|| not_a("number", object))
    }

    fn boolean_value(&self, object: &SimObject) -> BridgeResult<bool> {
        object.as_bool().ok_or_else(|| not_a("boolean", object))
    }

    fn retain(&self, object: &SimObject) -> BridgeResult<SimObject> {
        *self.durable.borrow_mut().entry(object.id()).or_insert(0) += 1;
        Ok(object.clone())
    }

    fn release(&self, object: SimObject) {
        let mut durable = self.durable.borrow_mut();
        match durable.get_mut(&object.id()) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                durable.remove(&object.id());
            }
            None => self.over_releases.set(self.over_releases.get() + 1),
        }
    }
}

fn same_signature(a: &SimObject, b: &SimObject) -> bool {
    match (a.member_data(), b.member_data()) {
        (Some(a), Some(b)) => a.name == b.name && a.parameter_types == b.parameter_types,
        _ => false,
    }
}
