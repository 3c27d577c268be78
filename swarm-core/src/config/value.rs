use std::collections::BTreeMap;

use serde_yaml::Value as Yaml;

use super::ConfigError;

/// A configuration leaf, as read from YAML or the environment.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
    List(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    pub(crate) fn from_yaml(value: &Yaml) -> Self {
        match value {
            Yaml::Null => ConfigValue::Null,
            Yaml::Bool(b) => ConfigValue::Bool(*b),
            Yaml::Number(n) => n
                .as_i64()
                .map(ConfigValue::Integer)
                .or_else(|| n.as_f64().map(ConfigValue::Float))
                .unwrap_or_else(|| ConfigValue::String(n.to_string())),
            Yaml::String(s) => ConfigValue::String(s.clone()),
            Yaml::Sequence(items) => ConfigValue::List(items.iter().map(Self::from_yaml).collect()),
            Yaml::Mapping(map) => ConfigValue::Map(
                map.iter()
                    .filter_map(|(k, v)| {
                        let key = match k {
                            Yaml::String(s) => s.clone(),
                            Yaml::Number(n) => n.to_string(),
                            Yaml::Bool(b) => b.to_string(),
                            _ => return None,
                        };
                        Some((key, Self::from_yaml(v)))
                    })
                    .collect(),
            ),
            Yaml::Tagged(tagged) => Self::from_yaml(&tagged.value),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ConfigValue::String(_) => "string",
            ConfigValue::Integer(_) => "integer",
            ConfigValue::Float(_) => "float",
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Null => "null",
            ConfigValue::List(_) => "list",
            ConfigValue::Map(_) => "map",
        }
    }
}

fn mismatch(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::TypeMismatch {
        key: key.to_string(),
        expected,
    }
}

/// Conversion out of a [`ConfigValue`]. Scalars are also accepted in their
/// string form, since environment overlays are always strings.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be read from the configuration",
    note = "supported: String, bool, integers, f64, Option<T>, Vec<T>, BTreeMap<String, T>"
)]
pub trait FromConfigValue: Sized {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError>;
}

impl FromConfigValue for String {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::String(s) => Ok(s.clone()),
            ConfigValue::Integer(i) => Ok(i.to_string()),
            ConfigValue::Float(f) => Ok(f.to_string()),
            ConfigValue::Bool(b) => Ok(b.to_string()),
            _ => Err(mismatch(key, "String")),
        }
    }
}

impl FromConfigValue for bool {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Bool(b) => Ok(*b),
            ConfigValue::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(mismatch(key, "bool")),
            },
            _ => Err(mismatch(key, "bool")),
        }
    }
}

impl FromConfigValue for f64 {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Float(f) => Ok(*f),
            ConfigValue::Integer(i) => Ok(*i as f64),
            ConfigValue::String(s) => s.trim().parse().map_err(|_| mismatch(key, "f64")),
            _ => Err(mismatch(key, "f64")),
        }
    }
}

macro_rules! integer_values {
    ($($ty:ty),+) => {$(
        impl FromConfigValue for $ty {
            fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
                let wide: i64 = match value {
                    ConfigValue::Integer(i) => *i,
                    ConfigValue::String(s) => {
                        s.trim().parse().map_err(|_| mismatch(key, stringify!($ty)))?
                    }
                    _ => return Err(mismatch(key, stringify!($ty))),
                };
                <$ty>::try_from(wide).map_err(|_| mismatch(key, stringify!($ty)))
            }
        }
    )+};
}

integer_values!(i64, i32, u16, u32, u64, usize);

impl<T: FromConfigValue> FromConfigValue for Option<T> {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        if *value == ConfigValue::Null {
            return Ok(None);
        }
        T::from_config_value(value, key).map(Some)
    }
}

/// A list, a comma-separated string (`SWARM_LANGUAGES=en,fr`) or a single
/// scalar read as a one-element list.
impl<T: FromConfigValue> FromConfigValue for Vec<T> {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        let items: Vec<ConfigValue> = match value {
            ConfigValue::List(items) => items.clone(),
            ConfigValue::String(s) => s
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| ConfigValue::String(part.to_string()))
                .collect(),
            ConfigValue::Map(_) => return Err(mismatch(key, "list")),
            scalar => vec![scalar.clone()],
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| T::from_config_value(item, &format!("{key}[{i}]")))
            .collect()
    }
}

impl<V: FromConfigValue> FromConfigValue for BTreeMap<String, V> {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        let ConfigValue::Map(map) = value else {
            tracing::debug!(key, found = value.kind(), "Expected a map");
            return Err(mismatch(key, "map"));
        };
        map.iter()
            .map(|(name, child)| Ok((name.clone(), V::from_config_value(child, &format!("{key}.{name}"))?)))
            .collect()
    }
}
