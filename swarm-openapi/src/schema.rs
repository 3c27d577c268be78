use schemars::JsonSchema;
use serde_json::Value;
use swarm_core::{SchemaTable, Swarm};

const DEFS_PREFIX: &str = "#/$defs/";

// `#/$defs/Pet/properties/id` -> `Pet#/properties/id`
fn rewrite_defs_refs(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                match child {
                    Value::String(reference) if key == "$ref" => {
                        if let Some(rest) = reference.strip_prefix(DEFS_PREFIX) {
                            let (name, pointer) = match rest.split_once('/') {
                                Some((name, pointer)) => (name, format!("/{pointer}")),
                                None => (rest, String::new()),
                            };
                            *reference = format!("{name}#{pointer}");
                        }
                    }
                    other => rewrite_defs_refs(other),
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(rewrite_defs_refs),
        _ => {}
    }
}

/// Derive the JSON schema of `T` and add it to `table` under its schema
/// name. Nested definitions become table entries of their own. Returns the
/// name `T` was registered under.
pub fn register_type<T: JsonSchema>(table: &mut SchemaTable) -> String {
    let name = T::schema_name().into_owned();
    let mut root = schemars::schema_for!(T).to_value();

    if let Some(map) = root.as_object_mut() {
        map.remove("$schema");
        if let Some(Value::Object(defs)) = map.remove("$defs") {
            for (def_name, mut def) in defs {
                rewrite_defs_refs(&mut def);
                table.insert(def_name, def);
            }
        }
    }
    rewrite_defs_refs(&mut root);
    table.insert(name.clone(), root);
    name
}

/// Register derived schemas on a [`Swarm`] builder.
///
/// ```ignore
/// #[derive(JsonSchema)]
/// struct Pet { id: u64, name: String }
///
/// Swarm::new(options).with_type::<Pet>().controller::<Pets>()
/// ```
pub trait SchemaExt {
    fn with_type<T: JsonSchema>(self) -> Self;
}

impl SchemaExt for Swarm {
    fn with_type<T: JsonSchema>(mut self) -> Self {
        let name = register_type::<T>(self.schemas_mut());
        tracing::debug!(schema = %name, "Registered derived schema");
        self
    }
}
