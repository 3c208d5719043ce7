//! JSON Schema helpers.
//!
//! Two concerns live here: normalizing capability parameter schemas before
//! they are handed to an LLM, and validating structured LLM output against
//! an agent's output schema.
//!
//! The validator enforces these keywords:
//!
//! - `type` (single or list), `enum`, `const`
//! - `allOf`, `anyOf`, `oneOf`, `not`, `if`/`then`/`else`
//! - `$ref` to a JSON pointer inside the same schema (`#/$defs/...`)
//! - `properties`, `patternProperties`, `additionalProperties`, `required`,
//!   `dependentRequired`, `propertyNames`, `minProperties`, `maxProperties`
//! - `items` (single schema), `contains`, `minContains`, `maxContains`,
//!   `minItems`, `maxItems`, `uniqueItems`
//! - `minLength`, `maxLength`, `pattern`
//! - `minimum`, `maximum`, `exclusiveMinimum`, `exclusiveMaximum`, `multipleOf`
//!
//! Annotations such as `title`, `description` and `format` carry no
//! assertion. Any other keyword that would constrain a value makes the whole
//! schema uncheckable: [`check_schema`] reports it and [`validate`] rejects
//! every instance rather than checking part of the schema.

use regex::Regex;
use serde_json::{Map, Value};

/// Assertion keywords the validator does not implement.
const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "additionalItems",
    "dependencies",
    "dependentSchemas",
    "prefixItems",
    "unevaluatedItems",
    "unevaluatedProperties",
    "$dynamicRef",
    "$recursiveRef",
];

const TYPE_NAMES: &[&str] = &["object", "array", "string", "boolean", "null", "number", "integer"];

/// Bound on `$ref` chains, which may be cyclic.
const MAX_REF_DEPTH: usize = 32;

/// Ensure a parameter schema is an object schema with a top-level
/// `"type": "object"` marker.
///
/// Non-object inputs (including `null`) become an empty object schema.
pub fn normalize_parameters(schema: &Value) -> Value {
    let mut map = match schema {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    if !map.contains_key("type") {
        map.insert("type".to_string(), Value::String("object".to_string()));
    }
    if !map.contains_key("properties") {
        map.insert("properties".to_string(), Value::Object(Map::new()));
    }
    Value::Object(map)
}

/// Report every part of `schema` the validator cannot enforce, such as an
/// unsupported keyword or a `$ref` pointing outside the schema.
pub fn check_schema(schema: &Value) -> Result<(), Vec<String>> {
    let mut problems = Vec::new();
    check_node(schema, schema, "", &mut problems);
    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}

/// Validate `instance` against `schema`, collecting every violation.
///
/// Each message is prefixed with the JSON pointer of the offending value.
/// A schema that fails [`check_schema`] rejects every instance.
pub fn validate(instance: &Value, schema: &Value) -> Result<(), Vec<String>> {
    check_schema(schema).map_err(|problems| {
        problems
            .into_iter()
            .map(|problem| format!("output schema cannot be enforced: {}", problem))
            .collect::<Vec<_>>()
    })?;

    let mut validator = Validator {
        root: schema,
        errors: Vec::new(),
    };
    validator.validate_at(instance, schema, "", 0);
    if validator.errors.is_empty() {
        Ok(())
    } else {
        Err(validator.errors)
    }
}

/// Decode `text` as JSON and validate it.
pub fn parse_and_validate(text: &str, schema: &Value) -> Result<Value, Vec<String>> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| vec![format!("response is not valid JSON: {}", e)])?;
    validate(&value, schema)?;
    Ok(value)
}

fn check_node(node: &Value, root: &Value, path: &str, problems: &mut Vec<String>) {
    let Value::Object(map) = node else {
        if !node.is_boolean() {
            problems.push(format!("{}: a schema must be an object or a boolean", display_path(path)));
        }
        return;
    };

    for keyword in UNSUPPORTED_KEYWORDS {
        if map.contains_key(*keyword) {
            problems.push(format!("{}: keyword '{}' is not supported", display_path(path), keyword));
        }
    }
    if map.get("items").is_some_and(Value::is_array) {
        problems.push(format!("{}: tuple form of 'items' is not supported", display_path(path)));
    }

    if let Some(expected) = map.get("type") {
        let names: Vec<&Value> = match expected {
            Value::Array(names) => names.iter().collect(),
            other => vec![other],
        };
        for name in names {
            if !name.as_str().is_some_and(|n| TYPE_NAMES.contains(&n)) {
                problems.push(format!("{}: unknown type {}", display_path(path), name));
            }
        }
    }

    if let Some(reference) = map.get("$ref") {
        if reference.as_str().and_then(|r| resolve_ref(root, r)).is_none() {
            problems.push(format!("{}: cannot resolve $ref {}", display_path(path), reference));
        }
    }

    if let Some(pattern) = map.get("pattern") {
        if let Err(reason) = compile_pattern(pattern) {
            problems.push(format!("{}/pattern: {}", path, reason));
        }
    }
    if let Some(Value::Object(patterns)) = map.get("patternProperties") {
        for pattern in patterns.keys() {
            if let Err(e) = Regex::new(pattern) {
                problems.push(format!("{}/patternProperties: invalid pattern '{}': {}", path, pattern, e));
            }
        }
    }

    for keyword in ["properties", "patternProperties", "definitions", "$defs"] {
        if let Some(Value::Object(children)) = map.get(keyword) {
            for (name, child) in children {
                check_node(child, root, &format!("{}/{}/{}", path, keyword, name), problems);
            }
        }
    }
    for keyword in [
        "additionalProperties",
        "items",
        "contains",
        "propertyNames",
        "not",
        "if",
        "then",
        "else",
    ] {
        match map.get(keyword) {
            Some(Value::Array(_)) | None => {}
            Some(child) => check_node(child, root, &format!("{}/{}", path, keyword), problems),
        }
    }
    for keyword in ["allOf", "anyOf", "oneOf"] {
        match map.get(keyword) {
            Some(Value::Array(branches)) if !branches.is_empty() => {
                for (i, branch) in branches.iter().enumerate() {
                    check_node(branch, root, &format!("{}/{}/{}", path, keyword, i), problems);
                }
            }
            Some(_) => problems.push(format!(
                "{}: '{}' must be a non-empty array of schemas",
                display_path(path),
                keyword
            )),
            None => {}
        }
    }
}

/// Resolve a same-document reference such as `#/$defs/item` or `#`.
fn resolve_ref<'a>(root: &'a Value, reference: &str) -> Option<&'a Value> {
    let pointer = reference.strip_prefix('#')?;
    if pointer.is_empty() {
        Some(root)
    } else {
        root.pointer(pointer)
    }
}

fn compile_pattern(pattern: &Value) -> Result<Regex, String> {
    let source = pattern
        .as_str()
        .ok_or_else(|| format!("pattern must be a string, found {}", pattern))?;
    Regex::new(source).map_err(|e| format!("invalid pattern '{}': {}", source, e))
}

struct Validator<'a> {
    root: &'a Value,
    errors: Vec<String>,
}

impl<'a> Validator<'a> {
    /// Validate against a subschema without touching `self.errors`.
    fn branch_errors(&self, instance: &Value, schema: &'a Value, path: &str, depth: usize) -> Vec<String> {
        let mut branch = Validator {
            root: self.root,
            errors: Vec::new(),
        };
        branch.validate_at(instance, schema, path, depth);
        branch.errors
    }

    fn validate_at(&mut self, instance: &Value, schema: &'a Value, path: &str, depth: usize) {
        let Value::Object(schema) = schema else {
            // `true`/`{}` accept everything, `false` rejects everything
            if schema == &Value::Bool(false) {
                self.errors.push(format!("{}: no value is allowed here", display_path(path)));
            }
            return;
        };

        if let Some(reference) = schema.get("$ref") {
            let target = reference.as_str().and_then(|r| resolve_ref(self.root, r));
            match target {
                Some(_) if depth >= MAX_REF_DEPTH => {
                    self.errors
                        .push(format!("{}: $ref chain deeper than {}", display_path(path), MAX_REF_DEPTH));
                    return;
                }
                Some(target) => self.validate_at(instance, target, path, depth + 1),
                None => {
                    self.errors
                        .push(format!("{}: cannot resolve $ref {}", display_path(path), reference));
                    return;
                }
            }
        }

        if let Some(expected) = schema.get("type") {
            if !type_matches(instance, expected) {
                self.errors.push(format!(
                    "{}: expected type {}, found {}",
                    display_path(path),
                    type_label(expected),
                    json_type(instance)
                ));
                // Further keywords would only produce noise
                return;
            }
        }

        if let Some(Value::Array(options)) = schema.get("enum") {
            if !options.contains(instance) {
                self.errors.push(format!(
                    "{}: value {} is not one of {}",
                    display_path(path),
                    instance,
                    Value::Array(options.clone())
                ));
            }
        }

        if let Some(constant) = schema.get("const") {
            if constant != instance {
                self.errors
                    .push(format!("{}: expected constant {}", display_path(path), constant));
            }
        }

        self.validate_combinators(instance, schema, path, depth);

        match instance {
            Value::Object(object) => self.validate_object(object, schema, path, depth),
            Value::Array(items) => self.validate_array(items, schema, path, depth),
            Value::String(s) => self.validate_string(s, schema, path),
            Value::Number(n) => self.validate_number(n, schema, path),
            _ => {}
        }
    }

    fn validate_combinators(&mut self, instance: &Value, schema: &'a Map<String, Value>, path: &str, depth: usize) {
        if let Some(Value::Array(branches)) = schema.get("allOf") {
            for branch in branches {
                self.validate_at(instance, branch, path, depth);
            }
        }

        if let Some(Value::Array(branches)) = schema.get("anyOf") {
            let failures: Vec<Vec<String>> = branches
                .iter()
                .map(|branch| self.branch_errors(instance, branch, path, depth))
                .collect();
            if failures.iter().all(|errors| !errors.is_empty()) {
                let details: Vec<String> = failures.into_iter().flatten().collect();
                self.errors.push(format!(
                    "{}: value matches none of the anyOf alternatives ({})",
                    display_path(path),
                    details.join("; ")
                ));
            }
        }

        if let Some(Value::Array(branches)) = schema.get("oneOf") {
            let matching = branches
                .iter()
                .filter(|&branch| self.branch_errors(instance, branch, path, depth).is_empty())
                .count();
            if matching != 1 {
                self.errors.push(format!(
                    "{}: value matches {} of the oneOf alternatives, expected exactly one",
                    display_path(path),
                    matching
                ));
            }
        }

        if let Some(negated) = schema.get("not") {
            if self.branch_errors(instance, negated, path, depth).is_empty() {
                self.errors
                    .push(format!("{}: value must not match the 'not' schema", display_path(path)));
            }
        }

        if let Some(condition) = schema.get("if") {
            let branch = if self.branch_errors(instance, condition, path, depth).is_empty() {
                schema.get("then")
            } else {
                schema.get("else")
            };
            if let Some(branch) = branch {
                self.validate_at(instance, branch, path, depth);
            }
        }
    }

    fn validate_object(&mut self, object: &Map<String, Value>, schema: &'a Map<String, Value>, path: &str, depth: usize) {
        if let Some(Value::Array(required)) = schema.get("required") {
            for key in required.iter().filter_map(Value::as_str) {
                if !object.contains_key(key) {
                    self.errors.push(format!(
                        "{}: missing required property '{}'",
                        display_path(path),
                        key
                    ));
                }
            }
        }

        if let Some(Value::Object(dependents)) = schema.get("dependentRequired") {
            for (trigger, needed) in dependents {
                if !object.contains_key(trigger) {
                    continue;
                }
                for key in needed.as_array().into_iter().flatten().filter_map(Value::as_str) {
                    if !object.contains_key(key) {
                        self.errors.push(format!(
                            "{}: property '{}' requires property '{}'",
                            display_path(path),
                            trigger,
                            key
                        ));
                    }
                }
            }
        }

        let count = object.len() as u64;
        if let Some(min) = schema.get("minProperties").and_then(Value::as_u64) {
            if count < min {
                self.errors
                    .push(format!("{}: fewer than {} properties", display_path(path), min));
            }
        }
        if let Some(max) = schema.get("maxProperties").and_then(Value::as_u64) {
            if count > max {
                self.errors
                    .push(format!("{}: more than {} properties", display_path(path), max));
            }
        }

        if let Some(names) = schema.get("propertyNames") {
            for key in object.keys() {
                let child_path = format!("{}/{}", path, key);
                self.validate_at(&Value::String(key.clone()), names, &child_path, depth);
            }
        }

        let mut pattern_schemas = Vec::new();
        if let Some(Value::Object(patterns)) = schema.get("patternProperties") {
            for (pattern, child_schema) in patterns {
                match Regex::new(pattern) {
                    Ok(regex) => pattern_schemas.push((regex, child_schema)),
                    Err(e) => self.errors.push(format!(
                        "{}: invalid pattern '{}': {}",
                        display_path(path),
                        pattern,
                        e
                    )),
                }
            }
        }

        let properties = schema.get("properties").and_then(Value::as_object);
        for (key, value) in object {
            let child_path = format!("{}/{}", path, key);
            let mut matched = false;

            if let Some(child_schema) = properties.and_then(|p| p.get(key)) {
                matched = true;
                self.validate_at(value, child_schema, &child_path, depth);
            }
            for (regex, child_schema) in &pattern_schemas {
                if regex.is_match(key) {
                    matched = true;
                    self.validate_at(value, child_schema, &child_path, depth);
                }
            }
            if matched {
                continue;
            }

            match schema.get("additionalProperties") {
                Some(Value::Bool(false)) => self.errors.push(format!(
                    "{}: additional property '{}' is not allowed",
                    display_path(path),
                    key
                )),
                Some(extra @ Value::Object(_)) => self.validate_at(value, extra, &child_path, depth),
                _ => {}
            }
        }
    }

    fn validate_array(&mut self, items: &[Value], schema: &'a Map<String, Value>, path: &str, depth: usize) {
        if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
            if (items.len() as u64) < min {
                self.errors
                    .push(format!("{}: fewer than {} items", display_path(path), min));
            }
        }
        if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
            if (items.len() as u64) > max {
                self.errors
                    .push(format!("{}: more than {} items", display_path(path), max));
            }
        }

        if schema.get("uniqueItems") == Some(&Value::Bool(true)) {
            let duplicated = items
                .iter()
                .enumerate()
                .any(|(i, item)| items[..i].contains(item));
            if duplicated {
                self.errors
                    .push(format!("{}: items must be unique", display_path(path)));
            }
        }

        if let Some(item_schema) = schema.get("items").filter(|s| !s.is_array()) {
            for (i, item) in items.iter().enumerate() {
                self.validate_at(item, item_schema, &format!("{}/{}", path, i), depth);
            }
        }

        if let Some(contains) = schema.get("contains") {
            let matching = items
                .iter()
                .enumerate()
                .filter(|(i, item)| {
                    self.branch_errors(item, contains, &format!("{}/{}", path, i), depth)
                        .is_empty()
                })
                .count() as u64;
            let min = schema.get("minContains").and_then(Value::as_u64).unwrap_or(1);
            if matching < min {
                self.errors.push(format!(
                    "{}: {} items match 'contains', at least {} required",
                    display_path(path),
                    matching,
                    min
                ));
            }
            if let Some(max) = schema.get("maxContains").and_then(Value::as_u64) {
                if matching > max {
                    self.errors.push(format!(
                        "{}: {} items match 'contains', at most {} allowed",
                        display_path(path),
                        matching,
                        max
                    ));
                }
            }
        }
    }

    fn validate_string(&mut self, s: &str, schema: &Map<String, Value>, path: &str) {
        let len = s.chars().count() as u64;
        if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
            if len < min {
                self.errors.push(format!(
                    "{}: string shorter than {} characters",
                    display_path(path),
                    min
                ));
            }
        }
        if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
            if len > max {
                self.errors.push(format!(
                    "{}: string longer than {} characters",
                    display_path(path),
                    max
                ));
            }
        }
        if let Some(pattern) = schema.get("pattern") {
            match compile_pattern(pattern) {
                Ok(regex) if regex.is_match(s) => {}
                Ok(regex) => self.errors.push(format!(
                    "{}: '{}' does not match pattern '{}'",
                    display_path(path),
                    s,
                    regex.as_str()
                )),
                Err(reason) => self.errors.push(format!("{}: {}", display_path(path), reason)),
            }
        }
    }

    fn validate_number(&mut self, n: &serde_json::Number, schema: &Map<String, Value>, path: &str) {
        let Some(value) = n.as_f64() else {
            return;
        };
        // Draft 4 spells exclusive bounds as booleans next to minimum/maximum
        let exclusive_min = schema.get("exclusiveMinimum") == Some(&Value::Bool(true));
        let exclusive_max = schema.get("exclusiveMaximum") == Some(&Value::Bool(true));

        if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
            if value < min || (exclusive_min && value == min) {
                self.errors
                    .push(format!("{}: {} is less than {}", display_path(path), n, min));
            }
        }
        if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
            if value > max || (exclusive_max && value == max) {
                self.errors
                    .push(format!("{}: {} is greater than {}", display_path(path), n, max));
            }
        }
        if let Some(bound) = schema.get("exclusiveMinimum").and_then(Value::as_f64) {
            if value <= bound {
                self.errors
                    .push(format!("{}: {} must be greater than {}", display_path(path), n, bound));
            }
        }
        if let Some(bound) = schema.get("exclusiveMaximum").and_then(Value::as_f64) {
            if value >= bound {
                self.errors
                    .push(format!("{}: {} must be less than {}", display_path(path), n, bound));
            }
        }
        if let Some(divisor) = schema.get("multipleOf").and_then(Value::as_f64) {
            let quotient = value / divisor;
            if divisor <= 0.0 || (quotient - quotient.round()).abs() > 1e-9 {
                self.errors
                    .push(format!("{}: {} is not a multiple of {}", display_path(path), n, divisor));
            }
        }
    }
}

fn type_matches(instance: &Value, expected: &Value) -> bool {
    match expected {
        Value::String(name) => matches_type_name(instance, name),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| matches_type_name(instance, name)),
        _ => false,
    }
}

fn matches_type_name(instance: &Value, name: &str) -> bool {
    match name {
        "object" => instance.is_object(),
        "array" => instance.is_array(),
        "string" => instance.is_string(),
        "boolean" => instance.is_boolean(),
        "null" => instance.is_null(),
        "number" => instance.is_number(),
        "integer" => match instance {
            Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
            _ => false,
        },
        _ => false,
    }
}

fn type_label(expected: &Value) -> String {
    match expected {
        Value::String(name) => name.clone(),
        other => other.to_string(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result_schema() -> Value {
        json!({
            "type": "object",
            "properties": { "result": { "type": "string" } },
            "required": ["result"]
        })
    }

    #[test]
    fn test_normalize_adds_object_marker() {
        let normalized = normalize_parameters(&json!({"properties": {"q": {"type": "string"}}}));
        assert_eq!(normalized["type"], "object");
        assert_eq!(normalized["properties"]["q"]["type"], "string");

        let from_null = normalize_parameters(&Value::Null);
        assert_eq!(from_null, json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn test_normalize_keeps_existing_type() {
        let schema = json!({"type": "object", "properties": {}, "required": []});
        assert_eq!(normalize_parameters(&schema), schema);
    }

    #[test]
    fn test_valid_instance() {
        assert!(validate(&json!({"result": "ok"}), &result_schema()).is_ok());
    }

    #[test]
    fn test_missing_required_property() {
        let errors = validate(&json!({"x": 1}), &result_schema()).unwrap_err();
        assert_eq!(errors, vec!["/: missing required property 'result'".to_string()]);
    }

    #[test]
    fn test_wrong_property_type() {
        let errors = validate(&json!({"result": 5}), &result_schema()).unwrap_err();
        assert!(errors[0].starts_with("/result: expected type string"));
    }

    #[test]
    fn test_additional_properties_false() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "integer"}},
            "additionalProperties": false
        });
        assert!(validate(&json!({"a": 1}), &schema).is_ok());
        assert!(validate(&json!({"a": 1, "b": 2}), &schema).is_err());
        assert!(validate(&json!({"a": 1.5}), &schema).is_err());
    }

    #[test]
    fn test_arrays_and_enums() {
        let schema = json!({
            "type": "array",
            "minItems": 1,
            "items": {"enum": ["low", "high"]}
        });
        assert!(validate(&json!(["low", "high"]), &schema).is_ok());
        assert!(validate(&json!([]), &schema).is_err());
        let errors = validate(&json!(["medium"]), &schema).unwrap_err();
        assert!(errors[0].starts_with("/0:"));
    }

    #[test]
    fn test_any_of_requires_one_matching_branch() {
        let schema = json!({"properties": {"result": {"anyOf": [{"type": "string"}]}}});
        let errors = parse_and_validate(r#"{"result": 1}"#, &schema).unwrap_err();
        assert!(errors[0].starts_with("/result: value matches none of the anyOf alternatives"));
        assert!(parse_and_validate(r#"{"result": "one"}"#, &schema).is_ok());
    }

    #[test]
    fn test_one_of_counts_matching_branches() {
        let schema = json!({
            "oneOf": [
                {"type": "integer", "minimum": 10},
                {"type": "integer", "maximum": 20}
            ]
        });
        assert!(validate(&json!(5), &schema).is_ok());
        assert!(validate(&json!(25), &schema).is_ok());

        // Both branches match
        let errors = validate(&json!(15), &schema).unwrap_err();
        assert!(errors[0].contains("matches 2 of the oneOf alternatives"));

        // Neither branch matches
        let errors = validate(&json!("15"), &schema).unwrap_err();
        assert!(errors[0].contains("matches 0 of the oneOf alternatives"));
    }

    #[test]
    fn test_all_of_and_not() {
        let schema = json!({
            "allOf": [{"type": "string"}, {"minLength": 2}],
            "not": {"const": "no"}
        });
        assert!(validate(&json!("yes"), &schema).is_ok());
        assert!(validate(&json!("y"), &schema).is_err());
        let errors = validate(&json!("no"), &schema).unwrap_err();
        assert_eq!(errors, vec!["/: value must not match the 'not' schema".to_string()]);
    }

    #[test]
    fn test_pattern_is_enforced() {
        let schema = json!({"type": "string", "pattern": "^[A-Z]{3}$"});
        assert!(validate(&json!("ABC"), &schema).is_ok());
        let errors = validate(&json!("nope"), &schema).unwrap_err();
        assert!(errors[0].contains("does not match pattern"));

        let keyed = json!({
            "type": "object",
            "patternProperties": {"^x_": {"type": "integer"}},
            "additionalProperties": false
        });
        assert!(validate(&json!({"x_a": 1}), &keyed).is_ok());
        assert!(validate(&json!({"x_a": "1"}), &keyed).is_err());
        assert!(validate(&json!({"y": 1}), &keyed).is_err());
    }

    #[test]
    fn test_local_ref_is_followed() {
        let schema = json!({
            "type": "object",
            "properties": {"items": {"type": "array", "items": {"$ref": "#/$defs/item"}}},
            "$defs": {"item": {"type": "object", "required": ["id"]}}
        });
        assert!(validate(&json!({"items": [{"id": 1}]}), &schema).is_ok());
        let errors = validate(&json!({"items": [{"name": "x"}]}), &schema).unwrap_err();
        assert_eq!(errors, vec!["/items/0: missing required property 'id'".to_string()]);
    }

    #[test]
    fn test_recursive_ref_terminates() {
        let schema = json!({"$ref": "#"});
        let errors = validate(&json!(1), &schema).unwrap_err();
        assert!(errors[0].contains("$ref chain deeper than"));
    }

    #[test]
    fn test_conditional_and_numeric_bounds() {
        let schema = json!({
            "if": {"properties": {"kind": {"const": "pct"}}},
            "then": {"properties": {"value": {"exclusiveMaximum": 100, "multipleOf": 5}}}
        });
        assert!(validate(&json!({"kind": "pct", "value": 95}), &schema).is_ok());
        assert!(validate(&json!({"kind": "pct", "value": 100}), &schema).is_err());
        assert!(validate(&json!({"kind": "pct", "value": 42}), &schema).is_err());
        assert!(validate(&json!({"kind": "raw", "value": 420}), &schema).is_ok());
    }

    #[test]
    fn test_unenforceable_schema_rejects_everything() {
        let schema = json!({
            "type": "object",
            "properties": {
                "pair": {"type": "array", "prefixItems": [{"type": "string"}]},
                "code": {"type": "strng"},
                "other": {"$ref": "https://example.com/schema.json"}
            }
        });
        let problems = check_schema(&schema).unwrap_err();
        assert_eq!(problems.len(), 3, "{:?}", problems);
        assert!(problems.iter().any(|p| p.contains("'prefixItems' is not supported")));
        assert!(problems.iter().any(|p| p.contains("unknown type \"strng\"")));
        assert!(problems.iter().any(|p| p.contains("cannot resolve $ref")));

        let errors = validate(&json!({}), &schema).unwrap_err();
        assert!(errors.iter().all(|e| e.starts_with("output schema cannot be enforced")));
    }

    #[test]
    fn test_check_schema_accepts_annotations() {
        let schema = json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "title": "Answer",
            "type": "object",
            "properties": {"when": {"type": "string", "format": "date", "description": "ISO date"}}
        });
        assert!(check_schema(&schema).is_ok());
        assert!(check_schema(&json!({"pattern": "("})).is_err());
    }

    #[test]
    fn test_parse_and_validate_rejects_non_json() {
        let errors = parse_and_validate("definitely not json", &result_schema()).unwrap_err();
        assert!(errors[0].contains("not valid JSON"));

        let value = parse_and_validate("  {\"result\": \"ok\"}\n", &result_schema()).unwrap();
        assert_eq!(value["result"], "ok");
    }
}
