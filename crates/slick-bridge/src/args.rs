//! Argument preparation for a resolved overload
//!
//! Marshals call-site values into the exact argument list the host
//! reflective call expects: one slot per declared parameter, with the
//! variadic tail packed into a single trailing array.

use crate::error::BridgeResult;
use crate::host::{HostRuntime, KnownClass};
use crate::marshal::{to_host, ScriptValue};
use crate::reflect::MethodDescriptor;

/// Build the host argument list for `descriptor`.
///
/// Returns `Ok(None)` when there is no descriptor: nothing is invoked and
/// nothing is raised. Fixed parameters use their declared type as the
/// marshaling hint. Every variadic value uses the component type of the
/// trailing array parameter as its hint, and the packed array has that
/// component type.
pub fn prepare_arguments<H: HostRuntime>(
    host: &H,
    descriptor: Option<&MethodDescriptor<H>>,
    args: &[ScriptValue<H::Object>],
) -> BridgeResult<Option<Vec<Option<H::Object>>>> {
    let Some(descriptor) = descriptor else {
        return Ok(None);
    };

    let fixed = descriptor.fixed_parameter_types();
    let mut prepared = Vec::with_capacity(descriptor.parameter_count());
    for (i, declared) in fixed.iter().enumerate() {
        let value = args.get(i).unwrap_or(&ScriptValue::Nil);
        prepared.push(to_host(host, value, Some(declared))?);
    }

    if let Some(array_type) = descriptor.var_args_type() {
        let component = match host.component_type(array_type)? {
            Some(component) => component,
            None => host.known_class(KnownClass::Object).clone(),
        };

        let tail = args.get(fixed.len()..).unwrap_or(&[]);
        let elements = tail
            .iter()
            .map(|value| to_host(host, value, Some(&component)))
            .collect::<BridgeResult<Vec<_>>>()?;

        prepared.push(Some(host.new_array(&component, &elements)?));
    }

    Ok(Some(prepared))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{import, ClassSelector};
    use crate::sim::{ClassDef, SimHost, SimObject};

    fn descriptor(host: &SimHost, params: &[&str], var_args: bool) -> std::rc::Rc<MethodDescriptor<SimHost>> {
        let def = if var_args {
            ClassDef::new("t.Args").var_args_method("f", params, |_, _, _| Ok(None))
        } else {
            ClassDef::new("t.Args").method("f", params, |_, _, _| Ok(None))
        };
        host.define_class(def);
        let class = import(host, ClassSelector::Name("t.Args".to_string())).unwrap();
        class.overloads("f")[0].clone()
    }

    fn class_name(host: &SimHost, object: &SimObject) -> String {
        host.type_name(&host.class_of(object).unwrap()).unwrap()
    }

    #[test]
    fn test_absent_descriptor_is_not_an_error() {
        let host = SimHost::new();
        let prepared = prepare_arguments(&host, None, &[ScriptValue::Number(1.0)]).unwrap();
        assert!(prepared.is_none());
    }

    #[test]
    fn test_fixed_arguments_use_declared_hints() {
        let host = SimHost::new();
        let f = descriptor(&host, &["int", "java.lang.String", "boolean"], false);
        let args = [
            ScriptValue::Number(5.0),
            ScriptValue::String("s".to_string()),
            ScriptValue::Boolean(true),
        ];
        let prepared = prepare_arguments(&host, Some(&f), &args).unwrap().unwrap();
        assert_eq!(prepared.len(), 3);
        let values: Vec<SimObject> = prepared.into_iter().map(Option::unwrap).collect();
        assert_eq!(class_name(&host, &values[0]), "java.lang.Integer");
        assert_eq!(values[0].as_i64(), Some(5));
        assert_eq!(values[1].as_str().as_deref(), Some("s"));
        assert_eq!(values[2].as_bool(), Some(true));
    }

    #[test]
    fn test_variadic_tail_is_packed() {
        let host = SimHost::new();
        let f = descriptor(&host, &["int", "java.lang.String[]"], true);
        let args = [
            ScriptValue::Number(1.0),
            ScriptValue::String("a".to_string()),
            ScriptValue::String("b".to_string()),
            ScriptValue::String("c".to_string()),
        ];
        let prepared = prepare_arguments(&host, Some(&f), &args).unwrap().unwrap();
        assert_eq!(prepared.len(), 2);

        let first = prepared[0].as_ref().unwrap();
        assert_eq!(first.as_i64(), Some(1));

        let tail = prepared[1].as_ref().unwrap();
        assert_eq!(class_name(&host, tail), "java.lang.String[]");
        let items: Vec<String> = tail
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e.as_ref().unwrap().as_str().unwrap())
            .collect();
        assert_eq!(items, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_variadic_tail() {
        let host = SimHost::new();
        let f = descriptor(&host, &["long[]"], true);
        let prepared = prepare_arguments(&host, Some(&f), &[]).unwrap().unwrap();
        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].as_ref().unwrap().as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_variadic_numbers_use_component_hint() {
        let host = SimHost::new();
        let f = descriptor(&host, &["long[]"], true);
        let args = [ScriptValue::Number(2.0), ScriptValue::Number(3.0)];
        let prepared = prepare_arguments(&host, Some(&f), &args).unwrap().unwrap();
        let tail = prepared[0].as_ref().unwrap().as_array().unwrap();
        for element in tail.iter() {
            assert_eq!(class_name(&host, element.as_ref().unwrap()), "java.lang.Long");
        }
    }
}
