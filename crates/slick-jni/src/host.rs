//! JvmHost - HostRuntime over the Java VM
//!
//! Every host object handed to the bridge is a JNI global reference; local
//! references only ever live inside the local frame of one operation.
//! Reflection goes through `java.lang.Class` and `java.lang.reflect`, so
//! no per-class glue is needed on the Java side.

use jni::objects::{GlobalRef, JClass, JObject, JObjectArray, JString, JValue};
use jni::{JNIEnv, JavaVM};

use slick_bridge::{BridgeError, BridgeResult, HostRuntime, KnownClass, MemberInfo, MemberKind, Primitive};

/// Local references one host operation may hold at once
const LOCAL_FRAME_CAPACITY: i32 = 32;

const OBJECT_ARRAY_CLASS: &str = "java/lang/Object";
const REFLECT_ARRAY_CLASS: &str = "java/lang/reflect/Array";

/// Reflective host backed by a running Java VM
pub struct JvmHost {
    vm: JavaVM,
    known: Vec<GlobalRef>,
}

impl JvmHost {
    /// Resolve the well-known classes once; they are kept for the lifetime
    /// of the host.
    pub fn new(vm: JavaVM) -> BridgeResult<Self> {
        let mut env = vm.get_env().map_err(host_error)?;
        let mut known = Vec::with_capacity(KnownClass::ALL.len());
        for class in KnownClass::ALL {
            let global = env
                .with_local_frame(LOCAL_FRAME_CAPACITY, |env| resolve_known(env, class))
                .map_err(|e| {
                    let _ = take_exception(&mut env, false);
                    BridgeError::Host(format!("cannot resolve {}: {}", class.jvm_name(), e))
                })?;
            known.push(global);
        }
        Ok(Self { vm, known })
    }

    fn with_env<T>(
        &self,
        invocation: bool,
        f: impl FnOnce(&mut JNIEnv) -> jni::errors::Result<T>,
    ) -> BridgeResult<T> {
        let mut env = self.vm.get_env().map_err(host_error)?;
        match env.with_local_frame(LOCAL_FRAME_CAPACITY, f) {
            Ok(value) => Ok(value),
            Err(e) => {
                let message = take_exception(&mut env, invocation).unwrap_or_else(|| e.to_string());
                Err(if invocation {
                    BridgeError::Invocation(message)
                } else {
                    BridgeError::Host(message)
                })
            }
        }
    }
}

fn host_error(e: jni::errors::Error) -> BridgeError {
    BridgeError::Host(e.to_string())
}

fn resolve_known(env: &mut JNIEnv, class: KnownClass) -> jni::errors::Result<GlobalRef> {
    let local = match class.boxed() {
        // Primitive classes live in the TYPE field of their wrapper
        Some(boxed) => env
            .get_static_field(boxed.jvm_name(), "TYPE", "Ljava/lang/Class;")?
            .l()?,
        None => JObject::from(env.find_class(class.jvm_name())?),
    };
    env.new_global_ref(local)
}

/// Clear a pending Java exception and describe it. For reflective
/// invocation the interesting exception is the cause of the
/// `InvocationTargetException`.
fn take_exception(env: &mut JNIEnv, unwrap_cause: bool) -> Option<String> {
    if !env.exception_check().unwrap_or(false) {
        return None;
    }
    let throwable = env.exception_occurred().ok()?;
    env.exception_clear().ok()?;

    let mut target = JObject::from(throwable);
    if unwrap_cause {
        let cause = env
            .call_method(&target, "getCause", "()Ljava/lang/Throwable;", &[])
            .and_then(|v| v.l());
        if let Ok(cause) = cause {
            if !cause.is_null() {
                target = cause;
            }
        }
    }

    let text = env
        .call_method(&target, "toString", "()Ljava/lang/String;", &[])
        .and_then(|v| v.l())
        .ok()?;
    let text = JString::from(text);
    let text: String = env.get_string(&text).ok()?.into();
    Some(text)
}

fn global_or_none(env: &mut JNIEnv, local: JObject) -> jni::errors::Result<Option<GlobalRef>> {
    if local.is_null() {
        Ok(None)
    } else {
        env.new_global_ref(local).map(Some)
    }
}

fn java_string(env: &mut JNIEnv, local: JObject) -> jni::errors::Result<String> {
    let local = JString::from(local);
    let text: String = env.get_string(&local)?.into();
    Ok(text)
}

fn globals_of(env: &mut JNIEnv, array: JObject) -> jni::errors::Result<Vec<GlobalRef>> {
    let array = JObjectArray::from(array);
    let len = env.get_array_length(&array)?;
    let mut out = Vec::with_capacity(len as usize);
    for i in 0..len {
        let element = env.get_object_array_element(&array, i)?;
        out.push(env.new_global_ref(element)?);
    }
    Ok(out)
}

fn object_array<'local>(
    env: &mut JNIEnv<'local>,
    elements: &[Option<GlobalRef>],
) -> jni::errors::Result<JObjectArray<'local>> {
    let array = env.new_object_array(elements.len() as i32, OBJECT_ARRAY_CLASS, JObject::null())?;
    for (i, element) in elements.iter().enumerate() {
        if let Some(element) = element {
            env.set_object_array_element(&array, i as i32, element.as_obj())?;
        }
    }
    Ok(array)
}

impl HostRuntime for JvmHost {
    type Object = GlobalRef;

    fn known_class(&self, class: KnownClass) -> &GlobalRef {
        &self.known[class as usize]
    }

    fn find_class(&self, name: &str) -> BridgeResult<Option<GlobalRef>> {
        let binary = name.replace('.', "/");
        let mut env = self.vm.get_env().map_err(host_error)?;
        let found = env.with_local_frame(LOCAL_FRAME_CAPACITY, |env| {
            let class = env.find_class(binary.as_str())?;
            env.new_global_ref(class)
        });
        match found {
            Ok(class) => Ok(Some(class)),
            Err(jni::errors::Error::JavaException) => {
                let thrown = take_exception(&mut env, false);
                tracing::debug!(target: "slick", class = name, ?thrown, "class lookup failed");
                Ok(None)
            }
            Err(e) => Err(host_error(e)),
        }
    }

    fn class_of(&self, object: &GlobalRef) -> BridgeResult<GlobalRef> {
        self.with_env(false, |env| {
            let class = env.get_object_class(object)?;
            env.new_global_ref(class)
        })
    }

    fn is_assignable_from(&self, from: &GlobalRef, to: &GlobalRef) -> BridgeResult<bool> {
        self.with_env(false, |env| {
            let from = <&JClass>::from(from.as_obj());
            let to = <&JClass>::from(to.as_obj());
            env.is_assignable_from(from, to)
        })
    }

    fn is_same_object(&self, a: &GlobalRef, b: &GlobalRef) -> bool {
        match self.vm.get_env() {
            Ok(env) => env.is_same_object(a, b).unwrap_or(false),
            Err(_) => false,
        }
    }

    fn type_name(&self, class: &GlobalRef) -> BridgeResult<String> {
        self.with_env(false, |env| {
            let name = env.call_method(class, "getTypeName", "()Ljava/lang/String;", &[])?.l()?;
            java_string(env, name)
        })
    }

    fn component_type(&self, array_class: &GlobalRef) -> BridgeResult<Option<GlobalRef>> {
        self.with_env(false, |env| {
            let component = env
                .call_method(array_class, "getComponentType", "()Ljava/lang/Class;", &[])?
                .l()?;
            global_or_none(env, component)
        })
    }

    fn constructors(&self, class: &GlobalRef) -> BridgeResult<Vec<GlobalRef>> {
        self.with_env(false, |env| {
            let array = env
                .call_method(class, "getConstructors", "()[Ljava/lang/reflect/Constructor;", &[])?
                .l()?;
            globals_of(env, array)
        })
    }

    fn methods(&self, class: &GlobalRef) -> BridgeResult<Vec<GlobalRef>> {
        self.with_env(false, |env| {
            let array = env
                .call_method(class, "getMethods", "()[Ljava/lang/reflect/Method;", &[])?
                .l()?;
            globals_of(env, array)
        })
    }

    fn describe_member(&self, member: &GlobalRef, _kind: MemberKind) -> BridgeResult<MemberInfo<GlobalRef>> {
        // Constructor and Method share the accessors used here
        self.with_env(false, |env| {
            let name = env.call_method(member, "getName", "()Ljava/lang/String;", &[])?.l()?;
            let name = java_string(env, name)?;
            let types = env
                .call_method(member, "getParameterTypes", "()[Ljava/lang/Class;", &[])?
                .l()?;
            let parameter_types = globals_of(env, types)?;
            let is_var_args = env.call_method(member, "isVarArgs", "()Z", &[])?.z()?;
            Ok(MemberInfo {
                name,
                parameter_types,
                is_var_args,
            })
        })
    }

    fn new_instance(&self, constructor: &GlobalRef, args: &[Option<GlobalRef>]) -> BridgeResult<GlobalRef> {
        self.with_env(true, |env| {
            let args = object_array(env, args)?;
            let object = env
                .call_method(
                    constructor,
                    "newInstance",
                    "([Ljava/lang/Object;)Ljava/lang/Object;",
                    &[JValue::Object(&args)],
                )?
                .l()?;
            env.new_global_ref(object)
        })
    }

    fn invoke(
        &self,
        method: &GlobalRef,
        receiver: Option<&GlobalRef>,
        args: &[Option<GlobalRef>],
    ) -> BridgeResult<Option<GlobalRef>> {
        self.with_env(true, |env| {
            let args = object_array(env, args)?;
            let null = JObject::null();
            let receiver = receiver.map(GlobalRef::as_obj).unwrap_or(&null);
            let result = env
                .call_method(
                    method,
                    "invoke",
                    "(Ljava/lang/Object;[Ljava/lang/Object;)Ljava/lang/Object;",
                    &[JValue::Object(receiver), JValue::Object(&args)],
                )?
                .l()?;
            global_or_none(env, result)
        })
    }

    fn box_primitive(&self, value: Primitive) -> BridgeResult<GlobalRef> {
        let (class, signature, arg) = match value {
            Primitive::Short(v) => ("java/lang/Short", "(S)Ljava/lang/Short;", JValue::Short(v)),
            Primitive::Int(v) => ("java/lang/Integer", "(I)Ljava/lang/Integer;", JValue::Int(v)),
            Primitive::Long(v) => ("java/lang/Long", "(J)Ljava/lang/Long;", JValue::Long(v)),
            Primitive::Float(v) => ("java/lang/Float", "(F)Ljava/lang/Float;", JValue::Float(v)),
            Primitive::Double(v) => ("java/lang/Double", "(D)Ljava/lang/Double;", JValue::Double(v)),
            Primitive::Boolean(v) => ("java/lang/Boolean", "(Z)Ljava/lang/Boolean;", JValue::Bool(v.into())),
        };
        self.with_env(false, |env| {
            let boxed = env.call_static_method(class, "valueOf", signature, &[arg])?.l()?;
            env.new_global_ref(boxed)
        })
    }

    fn new_string(&self, value: &str) -> BridgeResult<GlobalRef> {
        self.with_env(false, |env| {
            let string = env.new_string(value)?;
            env.new_global_ref(string)
        })
    }

    fn new_array(&self, component: &GlobalRef, elements: &[Option<GlobalRef>]) -> BridgeResult<GlobalRef> {
        // java.lang.reflect.Array unboxes into primitive arrays
        self.with_env(false, |env| {
            let array = env
                .call_static_method(
                    REFLECT_ARRAY_CLASS,
                    "newInstance",
                    "(Ljava/lang/Class;I)Ljava/lang/Object;",
                    &[JValue::Object(component.as_obj()), JValue::Int(elements.len() as i32)],
                )?
                .l()?;
            for (i, element) in elements.iter().enumerate() {
                let Some(element) = element else {
                    continue;
                };
                env.call_static_method(
                    REFLECT_ARRAY_CLASS,
                    "set",
                    "(Ljava/lang/Object;ILjava/lang/Object;)V",
                    &[JValue::Object(&array), JValue::Int(i as i32), JValue::Object(element.as_obj())],
                )?;
            }
            env.new_global_ref(array)
        })
    }

    fn string_value(&self, object: &GlobalRef) -> BridgeResult<String> {
        self.with_env(false, |env| {
            let string = <&JString>::from(object.as_obj());
            let text: String = env.get_string(string)?.into();
            Ok(text)
        })
    }

    fn double_value(&self, object: &GlobalRef) -> BridgeResult<f64> {
        self.with_env(false, |env| env.call_method(object, "doubleValue", "()D", &[])?.d())
    }

    fn boolean_value(&self, object: &GlobalRef) -> BridgeResult<bool> {
        self.with_env(false, |env| env.call_method(object, "booleanValue", "()Z", &[])?.z())
    }

    fn retain(&self, object: &GlobalRef) -> BridgeResult<GlobalRef> {
        self.with_env(false, |env| env.new_global_ref(object))
    }

    fn release(&self, object: GlobalRef) {
        // Deleting the global reference is GlobalRef's own drop
        drop(object);
    }
}
