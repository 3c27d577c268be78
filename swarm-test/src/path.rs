//! Dotted JSON paths: `pets[0].name`, `owner.pets.len()`.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    Field(String),
    Index(usize),
    /// `len()` or `size()`: element count of an array, object or string.
    Len,
}

/// Split a dotted path into tokens. Panics on a malformed index.
pub fn tokenize_path(path: &str) -> Vec<PathToken> {
    let mut tokens = Vec::new();
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        if segment == "len()" || segment == "size()" {
            tokens.push(PathToken::Len);
            continue;
        }
        let mut parts = segment.split('[');
        if let Some(field) = parts.next().filter(|f| !f.is_empty()) {
            tokens.push(PathToken::Field(field.to_string()));
        }
        for index in parts {
            let index = index
                .strip_suffix(']')
                .and_then(|i| i.parse().ok())
                .unwrap_or_else(|| panic!("malformed index in JSON path {path:?}"));
            tokens.push(PathToken::Index(index));
        }
    }
    tokens
}

/// Value at `path`, `null` when a segment is missing.
pub fn resolve_path(root: &Value, path: &str) -> Value {
    tokenize_path(path)
        .into_iter()
        .fold(root.clone(), |current, token| match token {
            PathToken::Field(name) => current.get(&name).cloned().unwrap_or(Value::Null),
            PathToken::Index(index) => current.get(index).cloned().unwrap_or(Value::Null),
            PathToken::Len => match &current {
                Value::Array(items) => items.len().into(),
                Value::Object(map) => map.len().into(),
                Value::String(s) => s.chars().count().into(),
                other => panic!("len() applied to {other} in JSON path {path:?}"),
            },
        })
}
