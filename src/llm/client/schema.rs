//! 结构化输出schema转换
//!
//! schemars生成的是JSON Schema，provider只接受其中的OpenAPI子集：
//! 不支持 `$ref`、`$schema`、`title`、`format` 以及多类型数组。

use schemars::JsonSchema;
use serde_json::{Map, Value};

const MAX_DEPTH: usize = 16;

/// 为类型 T 生成provider可接受的 responseSchema
pub fn response_schema<T: JsonSchema>() -> Value {
    let root = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default();
    let defs = root
        .get("$defs")
        .or_else(|| root.get("definitions"))
        .cloned()
        .unwrap_or(Value::Null);
    sanitize(&root, &defs, 0)
}

fn resolve_ref<'a>(reference: &str, defs: &'a Value) -> Option<&'a Value> {
    let name = reference.rsplit('/').next()?;
    defs.get(name)
}

fn sanitize(node: &Value, defs: &Value, depth: usize) -> Value {
    let Value::Object(object) = node else {
        return node.clone();
    };
    if depth > MAX_DEPTH {
        return Value::Object(Map::new());
    }

    if let Some(Value::String(reference)) = object.get("$ref")
        && let Some(target) = resolve_ref(reference, defs)
    {
        return sanitize(target, defs, depth + 1);
    }

    // Option<Struct> 会生成 anyOf: [{...}, {"type": "null"}]
    for key in ["anyOf", "oneOf"] {
        if let Some(Value::Array(variants)) = object.get(key) {
            let non_null: Vec<&Value> = variants
                .iter()
                .filter(|variant| variant.get("type") != Some(&Value::String("null".into())))
                .collect();
            if let Some(first) = non_null.first() {
                let mut inner = sanitize(first, defs, depth + 1);
                if non_null.len() < variants.len()
                    && let Value::Object(map) = &mut inner
                {
                    map.insert("nullable".into(), Value::Bool(true));
                }
                return inner;
            }
        }
    }

    let mut out = Map::new();

    match object.get("type") {
        Some(Value::String(kind)) => {
            out.insert("type".into(), Value::String(kind.clone()));
        }
        Some(Value::Array(kinds)) => {
            let mut nullable = false;
            for kind in kinds {
                match kind.as_str() {
                    Some("null") => nullable = true,
                    Some(other) if !out.contains_key("type") => {
                        out.insert("type".into(), Value::String(other.to_string()));
                    }
                    _ => {}
                }
            }
            if nullable {
                out.insert("nullable".into(), Value::Bool(true));
            }
        }
        _ => {}
    }

    for key in ["description", "enum", "required", "minItems", "maxItems"] {
        if let Some(value) = object.get(key) {
            out.insert(key.into(), value.clone());
        }
    }

    if let Some(items) = object.get("items") {
        out.insert("items".into(), sanitize(items, defs, depth + 1));
    }

    if let Some(Value::Object(properties)) = object.get("properties") {
        let properties = properties
            .iter()
            .map(|(name, schema)| (name.clone(), sanitize(schema, defs, depth + 1)))
            .collect::<Map<String, Value>>();
        out.insert("properties".into(), Value::Object(properties));
    }

    Value::Object(out)
}
