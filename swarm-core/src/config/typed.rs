use super::{ConfigError, SwarmConfig};

/// Metadata about a single configuration property.
#[derive(Debug, Clone)]
pub struct PropertyMeta {
    /// Relative key (e.g., `"pool_size"`).
    pub key: String,
    /// Absolute key (e.g., `"app.database.pool_size"`).
    pub full_key: String,
    /// Rust type name (e.g., `"i64"`).
    pub type_name: &'static str,
    /// Whether the property is required (no default and not `Option`).
    pub required: bool,
    /// Default value as a string, if any.
    pub default_value: Option<String>,
    /// Description from doc comments.
    pub description: Option<String>,
}

impl PropertyMeta {
    /// Describe the property `key` of the section at `prefix`.
    pub fn new(prefix: &str, key: &str, type_name: &'static str) -> Self {
        Self {
            key: key.to_string(),
            full_key: format!("{prefix}.{key}"),
            type_name,
            required: false,
            default_value: None,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

/// Trait for strongly-typed configuration sections.
///
/// A section reads its keys below [`prefix()`](Self::prefix) and fills in
/// defaults for the missing ones:
///
/// ```ignore
/// impl ConfigProperties for UploadConfig {
///     fn prefix() -> &'static str { "app.upload" }
///
///     fn properties_metadata() -> Vec<PropertyMeta> {
///         vec![PropertyMeta::new("app.upload", "max_size", "u64").default_value("1048576")]
///     }
///
///     fn from_config(config: &SwarmConfig) -> Result<Self, ConfigError> {
///         Ok(Self { max_size: config.get_or("app.upload.max_size", 1_048_576) })
///     }
/// }
/// ```
pub trait ConfigProperties: Sized {
    /// The configuration key prefix (e.g., `"app.database"`).
    fn prefix() -> &'static str;

    /// Metadata about all expected properties.
    fn properties_metadata() -> Vec<PropertyMeta>;

    /// Construct from a `SwarmConfig` instance.
    fn from_config(config: &SwarmConfig) -> Result<Self, ConfigError>;
}
