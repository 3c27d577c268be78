mod loader;
pub mod typed;
pub mod value;

use std::collections::{BTreeMap, HashMap};
use std::ops::Deref;
use std::path::{Path, PathBuf};

pub use typed::{ConfigProperties, PropertyMeta};
pub use value::{ConfigValue, FromConfigValue};

/// Error type for configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// The requested key was not found in the configuration.
    NotFound(String),
    /// The value could not be converted to the requested type.
    TypeMismatch { key: String, expected: &'static str },
    /// An I/O or YAML parsing error occurred while loading config files.
    Load(String),
    /// A value was present and well typed but not acceptable.
    Invalid { key: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "Config key not found: {key}"),
            ConfigError::TypeMismatch { key, expected } => {
                write!(f, "Config type mismatch for '{key}': expected {expected}")
            }
            ConfigError::Load(msg) => write!(f, "Config load error: {msg}"),
            ConfigError::Invalid { key, message } => {
                write!(f, "Invalid config value for '{key}': {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Application configuration loaded from YAML files, `.env` files, and environment variables.
///
/// `SwarmConfig` (= `SwarmConfig<()>`) provides raw key-value access only.
/// `SwarmConfig<T>` adds typed access to a config section via `Deref<Target = T>`.
///
/// Resolution order (lowest to highest priority):
/// 1. `application.yaml` (base)
/// 2. `application-{profile}.yaml` (profile override)
/// 3. `.env` file (loaded into process environment)
/// 4. `.env.{profile}` file (loaded into process environment)
/// 5. Environment variables (e.g., `SWARM_TITLE` overrides `swarm.title`)
///
/// `.env` files never overwrite already-set environment variables.
///
/// Profile is determined by: `SWARM_PROFILE` env var > argument.
#[derive(Debug, Clone)]
pub struct SwarmConfig<T = ()> {
    values: HashMap<String, ConfigValue>,
    profile: String,
    typed: T,
}

// ── Constructors (only on SwarmConfig<()>) ──────────────────────────────

impl SwarmConfig {
    /// Load configuration for the given profile from the current working directory.
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        Self::load_from(".", profile)
    }

    /// Load configuration for the given profile, looking for the YAML and
    /// `.env` files inside `dir`.
    pub fn load_from(dir: impl AsRef<Path>, profile: &str) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let active_profile =
            std::env::var("SWARM_PROFILE").unwrap_or_else(|_| profile.to_string());

        let mut values = HashMap::new();

        // 1. Load base config
        loader::merge_file(&dir.join("application.yaml"), &mut values)?;

        // 2. Load profile config
        let profile_path: PathBuf = dir.join(format!("application-{active_profile}.yaml"));
        loader::merge_file(&profile_path, &mut values)?;

        // 3. Load .env files (does NOT overwrite existing env vars)
        let _ = dotenvy::from_path(dir.join(".env"));
        let _ = dotenvy::from_path(dir.join(format!(".env.{active_profile}")));

        // 4. Overlay environment variables
        // Convention: `swarm.title` <-> `SWARM_TITLE`
        for (env_key, env_val) in std::env::vars() {
            let config_key = env_key.to_lowercase().replace('_', ".");
            values.insert(config_key, ConfigValue::String(env_val));
        }

        tracing::debug!(profile = %active_profile, keys = values.len(), "Configuration loaded");

        Ok(SwarmConfig {
            values,
            profile: active_profile,
            typed: (),
        })
    }

    /// Create a config from a YAML string (useful for testing).
    pub fn from_yaml_str(yaml: &str, profile: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        loader::merge_str(yaml, &mut values)?;
        Ok(SwarmConfig {
            values,
            profile: profile.to_string(),
            typed: (),
        })
    }

    /// Create an empty config (useful for testing).
    pub fn empty() -> Self {
        SwarmConfig {
            values: HashMap::new(),
            profile: "test".to_string(),
            typed: (),
        }
    }

    /// Set a value programmatically.
    pub fn set(&mut self, key: &str, value: ConfigValue) {
        self.values.insert(key.to_string(), value);
    }

    /// Upgrade to a typed config by constructing `T` from the raw values.
    ///
    /// ```ignore
    /// let config = SwarmConfig::load("dev")?.with_typed::<SwarmOptions>()?;
    /// config.title  // typed field access via Deref
    /// config.get::<String>("swarm.title")  // raw access still works
    /// ```
    pub fn with_typed<C: ConfigProperties>(self) -> Result<SwarmConfig<C>, ConfigError> {
        let typed = C::from_config(&self)?;
        Ok(SwarmConfig {
            values: self.values,
            profile: self.profile,
            typed,
        })
    }
}

// ── Methods available on all SwarmConfig<T> ────────────────────────────

impl<T> SwarmConfig<T> {
    /// Get a typed value for the given dot-separated key (raw access).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if the key does not exist, or
    /// `ConfigError::TypeMismatch` if the value cannot be converted.
    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        let value = self.lookup(key).ok_or_else(|| ConfigError::NotFound(key.to_string()))?;
        V::from_config_value(value, key)
    }

    /// Get a typed value, returning a default if the key is missing.
    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    /// Get a typed value if the key is present; a present value of the
    /// wrong type is still an error.
    pub fn get_opt<V: FromConfigValue>(&self, key: &str) -> Result<Option<V>, ConfigError> {
        match self.lookup(key) {
            Some(value) => V::from_config_value(value, key).map(Some),
            None => Ok(None),
        }
    }

    /// Collect the direct children of a mapping key (`prefix.name`), keyed
    /// by `name`. YAML mappings are flattened on load, so this is how a
    /// free-form map section is read back.
    pub fn children<V: FromConfigValue>(
        &self,
        prefix: &str,
    ) -> Result<BTreeMap<String, V>, ConfigError> {
        let mut out = BTreeMap::new();
        let start = format!("{prefix}.");
        for (key, value) in &self.values {
            if let Some(name) = key.strip_prefix(&start) {
                if !name.contains('.') {
                    out.insert(name.to_string(), V::from_config_value(value, key)?);
                }
            }
        }
        Ok(out)
    }

    /// Check whether a key exists in the config.
    pub fn contains_key(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// The active profile name.
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Get a reference to the typed config layer.
    pub fn typed(&self) -> &T {
        &self.typed
    }

    /// Downgrade to a raw (untyped) config, discarding the typed layer.
    pub fn raw(&self) -> SwarmConfig {
        SwarmConfig {
            values: self.values.clone(),
            profile: self.profile.clone(),
            typed: (),
        }
    }

    // Env overlays cannot express underscores: `SWARM_DEFAULT_VERSION` lands
    // on `swarm.default.version` and must still win over the YAML value of
    // `swarm.default_version`.
    fn lookup(&self, key: &str) -> Option<&ConfigValue> {
        if key.contains('_') {
            if let Some(value) = self.values.get(&key.replace('_', ".")) {
                return Some(value);
            }
        }
        self.values.get(key)
    }
}

// ── Deref for ergonomic typed field access ──────────────────────────────

impl<T> Deref for SwarmConfig<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.typed
    }
}
