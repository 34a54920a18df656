//! Overload resolution
//!
//! Picks the one overload a dynamically-typed call site means, by narrowing
//! the cached overload list in three passes:
//!
//! 1. arity: exact parameter count, or at least `count - 1` arguments for
//!    variadic overloads;
//! 2. types (only with more than one candidate left): every fixed argument
//!    type must be assignable to its declared parameter, with a script
//!    number also accepted by any numeric wrapper or primitive and a script
//!    boolean by primitive `boolean`;
//! 3. exactly one survivor wins; more than one is an ambiguity error.
//!
//! There is no "most specific" tie-break. The variadic element type is not
//! checked.

use std::rc::Rc;

use crate::error::{BridgeError, BridgeResult};
use crate::host::{HostRuntime, KnownClass};
use crate::reflect::MethodDescriptor;

/// Whether an overload can take `arity` call-site arguments
pub fn accepts_arity<H: HostRuntime>(descriptor: &MethodDescriptor<H>, arity: usize) -> bool {
    let count = descriptor.parameter_count();
    if descriptor.is_var_args() {
        count.saturating_sub(1) <= arity
    } else {
        count == arity
    }
}

/// Whether every fixed parameter of `descriptor` accepts the inferred
/// argument types. `None` (a script nil) matches any parameter.
pub fn accepts_types<H: HostRuntime>(
    host: &H,
    descriptor: &MethodDescriptor<H>,
    arg_types: &[Option<H::Object>],
) -> BridgeResult<bool> {
    for (declared, inferred) in descriptor.fixed_parameter_types().iter().zip(arg_types) {
        let Some(inferred) = inferred else {
            continue;
        };
        if !parameter_accepts(host, declared, inferred)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn parameter_accepts<H: HostRuntime>(
    host: &H,
    declared: &H::Object,
    inferred: &H::Object,
) -> BridgeResult<bool> {
    if host.is_assignable_from(inferred, declared)? {
        return Ok(true);
    }

    if host.is_same_object(inferred, host.known_class(KnownClass::Double)) {
        if host.is_assignable_from(declared, host.known_class(KnownClass::Number))? {
            return Ok(true);
        }
        if KnownClass::NUMERIC_PRIMITIVES
            .iter()
            .any(|p| host.is_same_object(declared, host.known_class(*p)))
        {
            return Ok(true);
        }
    }

    if host.is_same_object(inferred, host.known_class(KnownClass::Boolean))
        && host.is_same_object(declared, host.known_class(KnownClass::PrimitiveBoolean))
    {
        return Ok(true);
    }

    Ok(false)
}

/// Select the overload a call site means.
///
/// `name` is only used for diagnostics. `arg_types` holds the inferred host
/// type of each call-site argument, in order.
pub fn resolve<H: HostRuntime>(
    host: &H,
    name: &str,
    overloads: &[Rc<MethodDescriptor<H>>],
    arg_types: &[Option<H::Object>],
) -> BridgeResult<Rc<MethodDescriptor<H>>> {
    let arity = arg_types.len();

    // First pass: arity
    let mut candidates: Vec<&Rc<MethodDescriptor<H>>> = overloads
        .iter()
        .filter(|m| accepts_arity(m, arity))
        .collect();

    if candidates.len() > 1 {
        // Second pass: argument types
        let mut survivors = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if accepts_types(host, candidate, arg_types)? {
                survivors.push(candidate);
            }
        }
        candidates = survivors;
    }

    match candidates.as_slice() {
        [] => Err(BridgeError::NoApplicableMethod {
            name: name.to_string(),
        }),
        [only] => Ok(Rc::clone(only)),
        many => {
            let signatures = many
                .iter()
                .map(|m| m.signature(host))
                .collect::<BridgeResult<Vec<_>>>()?;
            for signature in &signatures {
                tracing::error!(target: "slick", method = name, "ambiguous candidate {}", signature);
            }
            Err(BridgeError::AmbiguousMethod {
                name: name.to_string(),
                candidates: signatures,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{import, ClassSelector, HostClassDescriptor};
    use crate::sim::{ClassDef, SimHost, SimObject};

    type Body = fn(&SimHost, &SimObject, &[Option<SimObject>]) -> Result<Option<SimObject>, String>;

    fn noop() -> Body {
        |_, _, _| Ok(None)
    }

    fn load(host: &SimHost, def: ClassDef) -> HostClassDescriptor<SimHost> {
        let name = def.name().to_string();
        host.define_class(def);
        import(host, ClassSelector::Name(name)).unwrap()
    }

    fn types(host: &SimHost, names: &[&str]) -> Vec<Option<SimObject>> {
        names
            .iter()
            .map(|n| if *n == "nil" { None } else { host.class(n) })
            .collect()
    }

    #[test]
    fn test_single_arity_match_skips_type_check() {
        let host = SimHost::new();
        let class = load(
            &host,
            ClassDef::new("t.One")
                .method("f", &["int"], noop())
                .method("f", &["int", "int"], noop()),
        );
        // A string for an int slot still resolves: one candidate after pass 1
        let chosen = resolve(&host, "f", class.overloads("f"), &types(&host, &["java.lang.String"])).unwrap();
        assert_eq!(chosen.parameter_count(), 1);
    }

    #[test]
    fn test_no_match_on_arity() {
        let host = SimHost::new();
        let class = load(
            &host,
            ClassDef::new("t.Arity")
                .method("f", &["int"], noop())
                .method("f", &["int", "int"], noop()),
        );
        let args = types(&host, &["java.lang.Double", "java.lang.Double", "java.lang.Double"]);
        let err = resolve(&host, "f", class.overloads("f"), &args).unwrap_err();
        assert!(matches!(err, BridgeError::NoApplicableMethod { ref name } if name == "f"));
    }

    #[test]
    fn test_numeric_widening_to_primitive_double() {
        let host = SimHost::new();
        let class = load(
            &host,
            ClassDef::new("t.Widen")
                .method("f", &["double"], noop())
                .method("f", &["java.lang.String"], noop()),
        );
        let chosen = resolve(&host, "f", class.overloads("f"), &types(&host, &["java.lang.Double"])).unwrap();
        assert_eq!(chosen.signature(&host).unwrap(), "(double)");
    }

    #[test]
    fn test_boolean_matches_primitive_boolean() {
        let host = SimHost::new();
        let class = load(
            &host,
            ClassDef::new("t.Bool")
                .method("f", &["boolean"], noop())
                .method("f", &["int"], noop()),
        );
        let chosen = resolve(&host, "f", class.overloads("f"), &types(&host, &["java.lang.Boolean"])).unwrap();
        assert_eq!(chosen.signature(&host).unwrap(), "(boolean)");
    }

    #[test]
    fn test_ambiguity_lists_every_candidate() {
        let host = SimHost::new();
        let class = load(
            &host,
            ClassDef::new("t.Ambiguous")
                .method("f", &["java.lang.Object"], noop())
                .method("f", &["java.lang.CharSequence"], noop()),
        );
        let err = resolve(&host, "f", class.overloads("f"), &types(&host, &["java.lang.String"])).unwrap_err();
        match err {
            BridgeError::AmbiguousMethod { name, candidates } => {
                assert_eq!(name, "f");
                assert_eq!(candidates.len(), 2);
                assert!(candidates.contains(&"(java.lang.Object)".to_string()));
                assert!(candidates.contains(&"(java.lang.CharSequence)".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_type_filter_eliminates_everything() {
        let host = SimHost::new();
        let class = load(
            &host,
            ClassDef::new("t.None")
                .method("f", &["int"], noop())
                .method("f", &["long"], noop()),
        );
        let err = resolve(&host, "f", class.overloads("f"), &types(&host, &["java.lang.String"])).unwrap_err();
        assert!(matches!(err, BridgeError::NoApplicableMethod { .. }));
    }

    #[test]
    fn test_nil_argument_matches_any_parameter() {
        let host = SimHost::new();
        let class = load(
            &host,
            ClassDef::new("t.Nil")
                .method("f", &["java.lang.String", "int"], noop())
                .method("f", &["java.lang.String", "java.lang.String"], noop()),
        );
        let chosen = resolve(&host, "f", class.overloads("f"), &types(&host, &["nil", "java.lang.Double"])).unwrap();
        assert_eq!(chosen.signature(&host).unwrap(), "(java.lang.String, int)");
    }

    #[test]
    fn test_variadic_arity_rule() {
        let host = SimHost::new();
        let class = load(
            &host,
            ClassDef::new("t.Var")
                .var_args_method("f", &["int", "java.lang.String[]"], noop()),
        );
        let f = &class.overloads("f")[0];
        assert!(!accepts_arity(f, 0));
        assert!(accepts_arity(f, 1));
        assert!(accepts_arity(f, 4));
    }

    #[test]
    fn test_variadic_element_type_is_not_checked() {
        let host = SimHost::new();
        let class = load(
            &host,
            ClassDef::new("t.VarTypes")
                .var_args_method("f", &["int", "java.lang.String[]"], noop())
                .method("f", &["java.lang.String", "java.lang.String"], noop()),
        );
        let args = types(&host, &["java.lang.Double", "java.lang.Boolean"]);
        let chosen = resolve(&host, "f", class.overloads("f"), &args).unwrap();
        assert!(chosen.is_var_args());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let host = SimHost::new();
        let class = load(
            &host,
            ClassDef::new("t.Det")
                .method("f", &["int"], noop())
                .method("f", &["java.lang.String"], noop())
                .method("f", &["int", "int"], noop()),
        );
        let args = types(&host, &["java.lang.String"]);
        let first = resolve(&host, "f", class.overloads("f"), &args).unwrap();
        for _ in 0..10 {
            let again = resolve(&host, "f", class.overloads("f"), &args).unwrap();
            assert!(Rc::ptr_eq(&first, &again));
        }
    }
}
