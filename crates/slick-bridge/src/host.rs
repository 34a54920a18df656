//! HostRuntime trait - abstract reflective host operations
//!
//! Defines the interface a statically-typed, reflective host runtime
//! implements so that scripts can reach its classes. The bridge only ever
//! programs against this trait; the JVM binding lives in `slick-jni` and an
//! in-process simulation lives in [`crate::sim`].
//!
//! Host `null` is modelled as `None` wherever a value may be absent.

use crate::error::BridgeResult;

/// Well-known host classes the marshaler and resolver compare against.
///
/// Implementations resolve these once at startup and hand out durable
/// handles for the lifetime of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownClass {
    /// Root of the class hierarchy
    Object,
    /// Host string type
    String,
    /// Supertype of every boxed numeric type
    Number,
    /// Boxed boolean
    Boolean,
    /// Boxed 16-bit integer
    Short,
    /// Boxed 32-bit integer
    Integer,
    /// Boxed 64-bit integer
    Long,
    /// Boxed 32-bit float
    Float,
    /// Boxed 64-bit float; the inferred type of every script number
    Double,
    /// Primitive `short`
    PrimitiveShort,
    /// Primitive `int`
    PrimitiveInt,
    /// Primitive `long`
    PrimitiveLong,
    /// Primitive `float`
    PrimitiveFloat,
    /// Primitive `double`
    PrimitiveDouble,
    /// Primitive `boolean`
    PrimitiveBoolean,
}

impl KnownClass {
    /// Every well-known class, in declaration order
    pub const ALL: [KnownClass; 15] = [
        KnownClass::Object,
        KnownClass::String,
        KnownClass::Number,
        KnownClass::Boolean,
        KnownClass::Short,
        KnownClass::Integer,
        KnownClass::Long,
        KnownClass::Float,
        KnownClass::Double,
        KnownClass::PrimitiveShort,
        KnownClass::PrimitiveInt,
        KnownClass::PrimitiveLong,
        KnownClass::PrimitiveFloat,
        KnownClass::PrimitiveDouble,
        KnownClass::PrimitiveBoolean,
    ];

    /// Primitive numeric types accepted for a generic script number
    pub const NUMERIC_PRIMITIVES: [KnownClass; 5] = [
        KnownClass::PrimitiveShort,
        KnownClass::PrimitiveInt,
        KnownClass::PrimitiveLong,
        KnownClass::PrimitiveFloat,
        KnownClass::PrimitiveDouble,
    ];

    /// Binary class name as the JVM spells it
    pub fn jvm_name(self) -> &'static str {
        match self {
            KnownClass::Object => "java/lang/Object",
            KnownClass::String => "java/lang/String",
            KnownClass::Number => "java/lang/Number",
            KnownClass::Boolean => "java/lang/Boolean",
            KnownClass::Short => "java/lang/Short",
            KnownClass::Integer => "java/lang/Integer",
            KnownClass::Long => "java/lang/Long",
            KnownClass::Float => "java/lang/Float",
            KnownClass::Double => "java/lang/Double",
            KnownClass::PrimitiveShort => "short",
            KnownClass::PrimitiveInt => "int",
            KnownClass::PrimitiveLong => "long",
            KnownClass::PrimitiveFloat => "float",
            KnownClass::PrimitiveDouble => "double",
            KnownClass::PrimitiveBoolean => "boolean",
        }
    }

    /// Boxed class whose `TYPE` field holds this primitive
    pub fn boxed(self) -> Option<KnownClass> {
        match self {
            KnownClass::PrimitiveShort => Some(KnownClass::Short),
            KnownClass::PrimitiveInt => Some(KnownClass::Integer),
            KnownClass::PrimitiveLong => Some(KnownClass::Long),
            KnownClass::PrimitiveFloat => Some(KnownClass::Float),
            KnownClass::PrimitiveDouble => Some(KnownClass::Double),
            KnownClass::PrimitiveBoolean => Some(KnownClass::Boolean),
            _ => None,
        }
    }
}

/// A scalar to be boxed into a host object
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    /// 16-bit integer
    Short(i16),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// Boolean
    Boolean(bool),
}

/// Which reflective member table a member came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// Constructor of the class
    Constructor,
    /// Public method (declared or inherited)
    Method,
}

/// Reflective description of one constructor or method
#[derive(Debug, Clone)]
pub struct MemberInfo<O> {
    /// Member name (the class name for constructors)
    pub name: String,
    /// Declared parameter types, in order
    pub parameter_types: Vec<O>,
    /// Whether the last parameter collects a variable-length tail
    pub is_var_args: bool,
}

/// Abstract reflective host runtime.
///
/// All methods run synchronously on the calling thread. Handles returned by
/// the host may be transient; [`HostRuntime::retain`] promotes one to a
/// durable handle and [`HostRuntime::release`] gives a durable handle back.
pub trait HostRuntime: 'static {
    /// Handle to any host object (classes and reflective members included)
    type Object: Clone + 'static;

    // ========================================================================
    // Classes
    // ========================================================================

    /// Get a cached well-known class
    fn known_class(&self, class: KnownClass) -> &Self::Object;

    /// Resolve a class by name; `None` if the host has no such class
    fn find_class(&self, name: &str) -> BridgeResult<Option<Self::Object>>;

    /// Get the runtime class of an object
    fn class_of(&self, object: &Self::Object) -> BridgeResult<Self::Object>;

    /// Whether a value of class `from` can be assigned to a slot of class `to`
    fn is_assignable_from(&self, from: &Self::Object, to: &Self::Object) -> BridgeResult<bool>;

    /// Host identity comparison
    fn is_same_object(&self, a: &Self::Object, b: &Self::Object) -> bool;

    /// Human-readable class name for diagnostics
    fn type_name(&self, class: &Self::Object) -> BridgeResult<String>;

    /// Element class of an array class; `None` for non-array classes
    fn component_type(&self, array_class: &Self::Object) -> BridgeResult<Option<Self::Object>>;

    // ========================================================================
    // Reflection
    // ========================================================================

    /// Public constructors of a class, in host enumeration order
    fn constructors(&self, class: &Self::Object) -> BridgeResult<Vec<Self::Object>>;

    /// Public methods of a class (inherited included), in host enumeration order
    fn methods(&self, class: &Self::Object) -> BridgeResult<Vec<Self::Object>>;

    /// Describe a reflective member obtained from `constructors` or `methods`
    fn describe_member(
        &self,
        member: &Self::Object,
        kind: MemberKind,
    ) -> BridgeResult<MemberInfo<Self::Object>>;

    // ========================================================================
    // Invocation
    // ========================================================================

    /// Invoke a constructor with fully prepared arguments
    fn new_instance(
        &self,
        constructor: &Self::Object,
        args: &[Option<Self::Object>],
    ) -> BridgeResult<Self::Object>;

    /// Invoke a method; `receiver` is `None` for static methods
    fn invoke(
        &self,
        method: &Self::Object,
        receiver: Option<&Self::Object>,
        args: &[Option<Self::Object>],
    ) -> BridgeResult<Option<Self::Object>>;

    // ========================================================================
    // Values
    // ========================================================================

    /// Box a scalar into its wrapper class
    fn box_primitive(&self, value: Primitive) -> BridgeResult<Self::Object>;

    /// Create a host string (copying)
    fn new_string(&self, value: &str) -> BridgeResult<Self::Object>;

    /// Create an array of `component` holding `elements`
    fn new_array(
        &self,
        component: &Self::Object,
        elements: &[Option<Self::Object>],
    ) -> BridgeResult<Self::Object>;

    /// Read a host string
    fn string_value(&self, object: &Self::Object) -> BridgeResult<String>;

    /// Read any boxed number as a double
    fn double_value(&self, object: &Self::Object) -> BridgeResult<f64>;

    /// Read a boxed boolean
    fn boolean_value(&self, object: &Self::Object) -> BridgeResult<bool>;

    // ========================================================================
    // Lifetime
    // ========================================================================

    /// Promote a handle to a durable one owned by the caller
    fn retain(&self, object: &Self::Object) -> BridgeResult<Self::Object>;

    /// Give back a durable handle obtained from `retain`
    fn release(&self, object: Self::Object);
}
