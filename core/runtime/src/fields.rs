// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Field access over the canonical JSON form of a message.
//!
//! The runtime never reflects over message schemas; it manipulates the
//! `serde_json::Value` produced by the generated types' serde derives.
//! Field paths are dot-separated snake_case names as declared in method
//! binding tables; the JSON mapping uses lowerCamelCase, so lookups
//! convert on the way in.

use serde_json::Value;

use cortex_types::Status;

/// Convert a snake_case field name to its lowerCamelCase JSON name.
pub fn json_name(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper_next = false;
    for c in field.chars() {
        if c == '_' {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn path_keys(path: &str) -> impl Iterator<Item = String> + '_ {
    path.split('.').map(json_name)
}

/// Look up a (possibly nested) field by its snake_case path.
pub fn get_field<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for key in path_keys(path) {
        current = current.as_object()?.get(&key)?;
    }
    Some(current)
}

/// Set a (possibly nested) field, creating intermediate objects.
pub fn set_field(value: &mut Value, path: &str, new: Value) -> Result<(), Status> {
    let keys: Vec<String> = path_keys(path).collect();
    let mut current = value;
    for (i, key) in keys.iter().enumerate() {
        let object = current.as_object_mut().ok_or_else(|| {
            Status::invalid_argument(format!("field path {} crosses a non-message field", path))
        })?;
        if i == keys.len() - 1 {
            object.insert(key.clone(), new);
            return Ok(());
        }
        current = object
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Default::default()));
    }
    Ok(())
}

/// Remove and return a (possibly nested) field.
pub fn take_field(value: &mut Value, path: &str) -> Option<Value> {
    let keys: Vec<String> = path_keys(path).collect();
    let mut current = value;
    for (i, key) in keys.iter().enumerate() {
        let object = current.as_object_mut()?;
        if i == keys.len() - 1 {
            return object.remove(key);
        }
        current = object.get_mut(key)?;
    }
    None
}

/// True when the value is the default for its JSON kind: null, empty
/// string, zero, false, empty array or empty object.
pub fn is_default(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Canonical scalar rendering for query parameters and routing values.
/// Non-scalar values have no rendering and return `None`.
pub fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_name() {
        assert_eq!(json_name("pipeline_job"), "pipelineJob");
        assert_eq!(json_name("pipeline_job_id"), "pipelineJobId");
        assert_eq!(json_name("parent"), "parent");
        assert_eq!(json_name("a_b_c"), "aBC");
    }

    #[test]
    fn test_get_field_nested() {
        let value = json!({"pipelineJob": {"displayName": "d"}});
        assert_eq!(
            get_field(&value, "pipeline_job.display_name"),
            Some(&json!("d"))
        );
        assert_eq!(get_field(&value, "pipeline_job.missing"), None);
        assert_eq!(get_field(&value, "missing"), None);
    }

    #[test]
    fn test_set_field_creates_intermediates() {
        let mut value = json!({});
        set_field(&mut value, "pipeline_job.display_name", json!("d")).unwrap();
        assert_eq!(value, json!({"pipelineJob": {"displayName": "d"}}));
    }

    #[test]
    fn test_set_field_rejects_scalar_crossing() {
        let mut value = json!({"parent": "p"});
        let err = set_field(&mut value, "parent.child", json!(1)).unwrap_err();
        assert_eq!(err.code(), cortex_types::Code::InvalidArgument);
    }

    #[test]
    fn test_take_field() {
        let mut value = json!({"parent": "p", "pipelineJob": {"displayName": "d"}});
        assert_eq!(take_field(&mut value, "parent"), Some(json!("p")));
        assert_eq!(value, json!({"pipelineJob": {"displayName": "d"}}));
        assert_eq!(take_field(&mut value, "parent"), None);
    }

    #[test]
    fn test_is_default() {
        assert!(is_default(&json!(null)));
        assert!(is_default(&json!("")));
        assert!(is_default(&json!(0)));
        assert!(is_default(&json!(false)));
        assert!(is_default(&json!([])));
        assert!(is_default(&json!({})));
        assert!(!is_default(&json!("x")));
        assert!(!is_default(&json!(1)));
        assert!(!is_default(&json!({"a": 1})));
    }

    #[test]
    fn test_render_scalar() {
        assert_eq!(render_scalar(&json!("s")), Some("s".to_string()));
        assert_eq!(render_scalar(&json!(42)), Some("42".to_string()));
        assert_eq!(render_scalar(&json!(true)), Some("true".to_string()));
        assert_eq!(render_scalar(&json!({})), None);
        assert_eq!(render_scalar(&json!([1])), None);
    }
}
