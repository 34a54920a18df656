//! Integration tests for script-driven interop
//!
//! Drives the primitive API from Lua against the simulated host: import,
//! construction, overload resolution, marshaling, error surfacing and the
//! lifetime of object references.

use std::rc::Rc;

use slick_bridge::{Bridge, BridgeConfig, ClassDef, HostRuntime, MemoryAssets, Primitive, SimHost, SimObject};

struct Counter {
    value: i64,
}

fn demo_host() -> Rc<SimHost> {
    let host = SimHost::new();

    host.define_class(ClassDef::new("demo.Joiner").constructor(&[], |_, _| Ok(Box::new(()))).var_args_method(
        "join",
        &["int", "java.lang.String[]"],
        |host, _, args| {
            let n = args[0].as_ref().and_then(SimObject::as_i64).ok_or("no count")?;
            let parts: Vec<String> = args[1]
                .as_ref()
                .and_then(SimObject::as_array)
                .ok_or("no parts")?
                .iter()
                .map(|p| p.as_ref().and_then(SimObject::as_str).unwrap_or_else(|| "null".to_string()))
                .collect();
            Ok(Some(host.string(&format!("{}:{}", n, parts.join(",")))))
        },
    ));

    host.define_class(
        ClassDef::new("demo.Counter")
            .constructor(&[], |_, _| Ok(Box::new(Counter { value: 0 })))
            .constructor(&["long"], |_, args| {
                let value = args[0].as_ref().and_then(SimObject::as_i64).ok_or("no start")?;
                Ok(Box::new(Counter { value }))
            })
            .method("next", &[], |host, this, _| {
                let value = this
                    .with_state(|c: &mut Counter| {
                        c.value += 1;
                        c.value
                    })
                    .ok_or("not a counter")?;
                Ok(Some(host.boxed(Primitive::Long(value))))
            })
            .method("add", &["long"], |host, this, args| {
                let delta = args[0].as_ref().and_then(SimObject::as_i64).ok_or("no delta")?;
                let value = this
                    .with_state(|c: &mut Counter| {
                        c.value += delta;
                        c.value
                    })
                    .ok_or("not a counter")?;
                Ok(Some(host.boxed(Primitive::Long(value))))
            })
            .method("add", &["java.lang.String"], |host, this, args| {
                let text = args[0].as_ref().and_then(SimObject::as_str).ok_or("no text")?;
                let delta: i64 = text.parse().map_err(|_| format!("bad number {}", text))?;
                let value = this
                    .with_state(|c: &mut Counter| {
                        c.value += delta;
                        c.value
                    })
                    .ok_or("not a counter")?;
                Ok(Some(host.boxed(Primitive::Long(value))))
            })
            .method("self", &[], |_, this, _| Ok(Some(this.clone())))
            .method("isPositive", &[], |host, this, _| {
                let positive = this.with_state(|c: &mut Counter| c.value > 0).ok_or("not a counter")?;
                Ok(Some(host.boxed(Primitive::Boolean(positive))))
            }),
    );

    Rc::new(host)
}

fn bridge(host: &Rc<SimHost>, assets: MemoryAssets, config: BridgeConfig) -> Bridge<SimHost> {
    Bridge::initialize(Rc::clone(host), assets, config).unwrap()
}

fn default_bridge(host: &Rc<SimHost>) -> Bridge<SimHost> {
    bridge(host, MemoryAssets::new(), BridgeConfig::default())
}

/// Run `body` in a protected call and return the error text
fn script_error(bridge: &Bridge<SimHost>, body: &str) -> String {
    let source = format!(
        "local ok, err = pcall(function() {} end) assert(not ok, 'expected failure') return tostring(err)",
        body
    );
    bridge.lua().load(&source).eval().unwrap()
}

#[test]
fn test_variadic_packing() {
    let host = demo_host();
    let bridge = default_bridge(&host);
    let out: String = bridge
        .lua()
        .load(
            r#"
            local Joiner = _internal.import("demo.Joiner")
            local j = _internal.new(Joiner)
            return _internal.invoke(Joiner, "join", j, 1, "a", "b", "c")
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(out, "1:a,b,c");
}

#[test]
fn test_variadic_with_empty_tail() {
    let host = demo_host();
    let bridge = default_bridge(&host);
    let out: String = bridge
        .lua()
        .load(
            r#"
            local Joiner = _internal.import("demo.Joiner")
            return Joiner:invoke("join", Joiner:new(), 7)
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(out, "7:");
}

#[test]
fn test_numeric_literal_widens_to_double() {
    let host = demo_host();
    host.define_class(
        ClassDef::new("demo.Scale")
            .static_method("describe", &["double"], |host, args| {
                let value = args[0].as_ref().and_then(SimObject::as_f64).ok_or("no value")?;
                Ok(Some(host.string(&format!("double:{}", value))))
            })
            .static_method("describe", &["java.lang.String"], |host, _| Ok(Some(host.string("string")))),
    );
    let bridge = default_bridge(&host);

    // Two overloads of equal arity: only the type filter can pick one
    let (number, text): (String, String) = bridge
        .lua()
        .load(
            r#"
            local Scale = _internal.import("demo.Scale")
            return _internal.invoke(Scale, "describe", nil, -5),
                _internal.invoke(Scale, "describe", nil, "five")
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(number, "double:-5");
    assert_eq!(text, "string");
}

#[test]
fn test_constructor_overloads_and_state() {
    let host = demo_host();
    let bridge = default_bridge(&host);
    let (a, b, positive): (f64, f64, bool) = bridge
        .lua()
        .load(
            r#"
            local Counter = _internal.import("demo.Counter")
            local c = _internal.new(Counter, 10)
            local a = _internal.invoke(Counter, "next", c)
            local b = Counter:invoke("next", c)
            return a, b, Counter:invoke("isPositive", c)
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!((a, b), (11.0, 12.0));
    assert!(positive);
}

#[test]
fn test_overloads_selected_by_argument_type() {
    let host = demo_host();
    let bridge = default_bridge(&host);
    let (by_number, by_string): (f64, f64) = bridge
        .lua()
        .load(
            r#"
            local Counter = _internal.import("demo.Counter")
            local c = Counter:new()
            return Counter:invoke("add", c, 5), Counter:invoke("add", c, "10")
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(by_number, 5.0);
    assert_eq!(by_string, 15.0);
}

#[test]
fn test_explicit_overload_sequence() {
    let host = demo_host();
    let bridge = default_bridge(&host);
    let n: f64 = bridge
        .lua()
        .load(
            r#"
            local Counter = _internal.import("demo.Counter")
            local c = Counter:new()
            return _internal.invoke(Counter.methods.add, "add", c, 3)
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(n, 3.0);
}

#[test]
fn test_returned_objects_compare_by_identity() {
    let host = demo_host();
    let bridge = default_bridge(&host);
    let (same, different, text): (bool, bool, String) = bridge
        .lua()
        .load(
            r#"
            local Counter = _internal.import("demo.Counter")
            local a, b = Counter:new(), Counter:new()
            return Counter:invoke("self", a) == a, a == b, tostring(a)
            "#,
        )
        .eval()
        .unwrap();
    assert!(same);
    assert!(!different);
    assert_eq!(text, "ObjectReference(demo.Counter)");
}

#[test]
fn test_host_scalars_become_script_scalars() {
    let host = demo_host();
    let bridge = default_bridge(&host);
    let (len, upper, empty, kind): (f64, String, bool, String) = bridge
        .lua()
        .load(
            r#"
            local String = _internal.import("java.lang.String")
            return _internal.invoke(String, "length", "héllo"),
                   _internal.invoke(String, "toUpperCase", "abc"),
                   _internal.invoke(String, "isEmpty", ""),
                   type(_internal.invoke(String, "valueOf", nil, 2.5))
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(len, 5.0);
    assert_eq!(upper, "ABC");
    assert!(empty);
    assert_eq!(kind, "string");
}

#[test]
fn test_import_by_handle_and_record() {
    let host = demo_host();
    let bridge = default_bridge(&host);
    let names: (String, String, String) = bridge
        .lua()
        .load(
            r#"
            local Counter = _internal.import("demo/Counter")
            local again = _internal.import(Counter.class)
            local third = _internal.import(Counter)
            return tostring(Counter), tostring(again), tostring(third)
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(names.0, "ClassRecord(demo.Counter)");
    assert_eq!(names.0, names.1);
    assert_eq!(names.1, names.2);
}

#[test]
fn test_ambiguous_call_fails() {
    let host = demo_host();
    let bridge = default_bridge(&host);
    let err = script_error(&bridge, r#"_internal.invoke(_internal.import("java.lang.Math"), "max", nil, 1, 2)"#);
    assert!(err.contains("Ambiguous method: (3) max"), "{err}");
    assert!(err.contains("(int, int)"), "{err}");
    assert!(err.contains("(double, double)"), "{err}");
}

#[test]
fn test_no_applicable_method() {
    let host = demo_host();
    let bridge = default_bridge(&host);
    let err = script_error(&bridge, r#"_internal.invoke(_internal.import("java.lang.String"), "concat", "a")"#);
    assert!(err.contains("No method found: concat"), "{err}");

    let err = script_error(&bridge, r#"_internal.invoke(_internal.import("java.lang.String"), "missing", "a")"#);
    assert!(err.contains("No method found: missing"), "{err}");
}

#[test]
fn test_type_filter_rejects_everything() {
    let host = demo_host();
    let bridge = default_bridge(&host);
    let err = script_error(
        &bridge,
        r#"local C = _internal.import("demo.Counter") C:invoke("add", C:new(), true)"#,
    );
    assert!(err.contains("No method found: add"), "{err}");
}

#[test]
fn test_host_failure_is_invocation_error() {
    let host = demo_host();
    let bridge = default_bridge(&host);
    let err = script_error(&bridge, r#"_internal.invoke(_internal.import("java.lang.Integer"), "parseInt", nil, "x1")"#);
    assert!(err.contains("Invocation failed"), "{err}");
    assert!(err.contains("NumberFormatException"), "{err}");
}

#[test]
fn test_unsupported_argument_is_conversion_error() {
    let host = demo_host();
    let bridge = default_bridge(&host);
    let err = script_error(
        &bridge,
        r#"local C = _internal.import("demo.Counter") C:invoke("add", C:new(), {})"#,
    );
    assert!(err.contains("table value conversion not supported"), "{err}");
}

#[test]
fn test_unknown_class() {
    let host = demo_host();
    let bridge = default_bridge(&host);
    let err = script_error(&bridge, r#"_internal.import("demo.Missing")"#);
    assert!(err.contains("Class not found: demo.Missing"), "{err}");
}

#[test]
fn test_errors_leave_bridge_usable() {
    let host = demo_host();
    let bridge = default_bridge(&host);
    script_error(&bridge, r#"_internal.import("demo.Missing")"#);
    let n: f64 = bridge
        .lua()
        .load(r#"local C = _internal.import("demo.Counter") return C:invoke("next", C:new())"#)
        .eval()
        .unwrap();
    assert_eq!(n, 1.0);
}

#[test]
fn test_references_are_finalized_once() {
    let host = demo_host();
    let holder = host.define_class(ClassDef::new("demo.Holder").constructor(&[], |_, _| Ok(Box::new(()))));
    let ctor = host.constructors(&holder).unwrap().remove(0);
    let shared = host.new_instance(&ctor, &[]).unwrap();
    let returned = shared.clone();
    host.define_class(
        ClassDef::new("demo.Registry")
            .static_method("shared", &[], move |_, _| Ok(Some(returned.clone()))),
    );

    let bridge = default_bridge(&host);
    bridge
        .lua()
        .load(
            r#"
            local Registry = _internal.import("demo.Registry")
            a = _internal.invoke(Registry, "shared", nil)
            b = _internal.invoke(Registry, "shared", nil)
            "#,
        )
        .exec()
        .unwrap();
    assert_eq!(host.durable_count(&shared), 2);

    bridge.lua().load("a = nil").exec().unwrap();
    bridge.lua().gc_collect().unwrap();
    bridge.lua().gc_collect().unwrap();
    assert_eq!(host.durable_count(&shared), 1);

    // Destroying the state finalizes what is still reachable
    bridge.destroy();
    assert_eq!(host.durable_count(&shared), 0);
    assert_eq!(host.over_releases(), 0);
}

#[test]
fn test_inflate_and_storage_path() {
    let host = demo_host();
    let assets = MemoryAssets::new().with("assets/data.txt", "payload");
    let config = BridgeConfig::default().with_storage_path("/data/user/0/app");
    let bridge = bridge(&host, assets, config);

    let (data, missing, storage): (String, bool, String) = bridge
        .lua()
        .load(
            r#"
            return _internal.inflate("assets/data.txt"),
                   _internal.inflate("assets/none.txt") == nil,
                   _internal.storage_path
            "#,
        )
        .eval()
        .unwrap();
    assert_eq!(data, "payload");
    assert!(missing);
    assert_eq!(storage, "/data/user/0/app");

    let absent: bool = default_bridge(&host)
        .lua()
        .load("return _internal.storage_path == nil")
        .eval()
        .unwrap();
    assert!(absent);
}

#[test]
fn test_custom_api_name_and_log() {
    let host = demo_host();
    let config = BridgeConfig {
        api_name: "host".to_string(),
        ..BridgeConfig::default()
    };
    let bridge = bridge(&host, MemoryAssets::new(), config);
    let installed: bool = bridge
        .lua()
        .load(
            r#"
            host.log("message")
            host.log(42)
            host.log({})
            host.log(nil)
            return _internal == nil and type(host.import) == "function"
            "#,
        )
        .eval()
        .unwrap();
    assert!(installed);
}
