//! Named JSON schemas and the per-route validation schemas derived from the
//! controller graph.
//!
//! Schemas reference each other with an internal form `Name#/pointer`
//! (the pointer is optional). The API description uses component references
//! instead, `#/components/schemas/Name/pointer`, with every `/` in a schema
//! name replaced by `_`.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::controller::{ControllerDescriptor, MethodDescriptor};
use crate::meta::{ParamSpec, SchemaRef};

/// Schema name as a component identifier: `/` becomes `_` and a `.json`
/// file suffix is dropped.
pub fn component_name(name: &str) -> String {
    name.trim_end_matches(".json").replace('/', "_")
}

/// Rewrite an internal reference (`Name#/pointer`) into a component
/// reference. Local references (`#/...`) are returned unchanged.
pub fn component_ref(reference: &str) -> String {
    if reference.starts_with('#') {
        return reference.to_string();
    }
    let (name, pointer) = match reference.split_once('#') {
        Some((name, pointer)) => (name, pointer),
        None => (reference, ""),
    };
    format!("#/components/schemas/{}{}", component_name(name), pointer)
}

/// Rewrite every `$ref` string inside `value` into component form.
pub fn rewrite_refs(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                match child {
                    Value::String(reference) if key == "$ref" => {
                        *reference = component_ref(reference);
                    }
                    other => rewrite_refs(other),
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(rewrite_refs),
        _ => {}
    }
}

/// Name → JSON schema table, filled by an external loader.
#[derive(Debug, Clone, Default)]
pub struct SchemaTable {
    schemas: BTreeMap<String, Value>,
}

impl SchemaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the schema registered under `name`.
    pub fn insert(&mut self, name: impl Into<String>, schema: Value) {
        self.schemas.insert(name.into(), schema);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schemas.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Schema for validation: a named reference becomes `{"$ref": "Name#..."}`
    /// when the table knows the name, an inline schema is used as-is.
    /// Unknown names resolve to `None`.
    pub fn resolve(&self, schema: &SchemaRef) -> Option<Value> {
        match schema {
            SchemaRef::Inline(value) => Some(value.clone()),
            SchemaRef::Named(name) => {
                let table_name = schema.table_name().unwrap_or(name);
                if !self.contains(table_name) {
                    return None;
                }
                let reference = if name.contains('#') {
                    name.clone()
                } else {
                    format!("{name}#")
                };
                Some(json!({ "$ref": reference }))
            }
        }
    }

    /// Schema for the API description, with references in component form.
    /// Unknown names resolve to `None`.
    pub fn resolve_for_docs(&self, schema: &SchemaRef) -> Option<Value> {
        match schema {
            SchemaRef::Inline(value) => {
                let mut value = value.clone();
                rewrite_refs(&mut value);
                Some(value)
            }
            SchemaRef::Named(name) => {
                let table_name = schema.table_name().unwrap_or(name);
                self.contains(table_name)
                    .then(|| json!({ "$ref": component_ref(name) }))
            }
        }
    }

    /// Every schema as an API description component.
    pub fn components(&self) -> Map<String, Value> {
        self.schemas
            .iter()
            .map(|(name, schema)| {
                let mut schema = schema.clone();
                rewrite_refs(&mut schema);
                (component_name(name), schema)
            })
            .collect()
    }
}

/// Validation schemas of one route.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub querystring: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Map<String, Value>>,
}

impl RouteSchema {
    pub fn is_empty(&self) -> bool {
        self.body.is_none()
            && self.params.is_none()
            && self.querystring.is_none()
            && self.response.is_none()
    }
}

fn object_schema<'a>(
    specs: impl Iterator<Item = &'a ParamSpec>,
    table: &SchemaTable,
) -> Option<Value> {
    let properties: Map<String, Value> = specs
        .filter_map(|spec| {
            let schema = spec.schema.as_ref().and_then(|s| table.resolve(s))?;
            Some((spec.name.clone(), schema))
        })
        .collect();
    (!properties.is_empty()).then(|| json!({ "type": "object", "properties": properties }))
}

/// Derive the validation schemas of a method.
///
/// Several accepted body schemas are combined with `allOf`; path
/// parameters merge the controller's and the method's; responses are keyed
/// by status code. Sections whose references cannot be resolved are left
/// out.
pub fn generate_request_schema(
    controller: &ControllerDescriptor,
    method: &MethodDescriptor,
    table: &SchemaTable,
) -> RouteSchema {
    let body = method.accepts.as_ref().and_then(|accepts| {
        let mut schemas: Vec<Value> = accepts
            .schemas
            .iter()
            .filter_map(|s| table.resolve(s))
            .collect();
        match schemas.len() {
            0 => None,
            1 => schemas.pop(),
            _ => Some(json!({ "allOf": schemas })),
        }
    });

    let params = object_schema(
        controller.parameters.iter().chain(method.parameters.iter()),
        table,
    );
    let querystring = object_schema(method.query.iter(), table);

    let response: Map<String, Value> = method
        .returns
        .iter()
        .filter_map(|ret| {
            let schema = ret.schema.as_ref().and_then(|s| table.resolve(s))?;
            Some((ret.code.clone(), schema))
        })
        .collect();

    RouteSchema {
        body,
        params,
        querystring,
        response: (!response.is_empty()).then_some(response),
    }
}
