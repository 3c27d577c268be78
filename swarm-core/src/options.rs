//! Typed framework options, read from the `swarm.*` configuration section.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{ConfigError, ConfigProperties, PropertyMeta, SwarmConfig};
use crate::meta::Access;

/// One entry of the API description's `servers` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Where an API key is transported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    Header,
    Query,
    Cookie,
}

impl ApiKeyLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiKeyLocation::Header => "header",
            ApiKeyLocation::Query => "query",
            ApiKeyLocation::Cookie => "cookie",
        }
    }
}

impl std::str::FromStr for ApiKeyLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "header" => Ok(ApiKeyLocation::Header),
            "query" => Ok(ApiKeyLocation::Query),
            "cookie" => Ok(ApiKeyLocation::Cookie),
            other => Err(format!("unknown api key location `{other}`")),
        }
    }
}

/// OAuth2 grant advertised in the API description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OAuth2Flow {
    AuthorizationCode,
    Implicit,
    Password,
    ClientCredentials,
}

impl OAuth2Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuth2Flow::AuthorizationCode => "authorizationCode",
            OAuth2Flow::Implicit => "implicit",
            OAuth2Flow::Password => "password",
            OAuth2Flow::ClientCredentials => "clientCredentials",
        }
    }
}

impl std::str::FromStr for OAuth2Flow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorizationCode" | "authorization_code" => Ok(OAuth2Flow::AuthorizationCode),
            "implicit" => Ok(OAuth2Flow::Implicit),
            "password" => Ok(OAuth2Flow::Password),
            "clientCredentials" | "client_credentials" => Ok(OAuth2Flow::ClientCredentials),
            other => Err(format!("unknown oauth2 flow `{other}`")),
        }
    }
}

/// Authentication scheme, forwarded as-is to the API description.
///
/// Nothing in the framework verifies credentials; callers plug a scope
/// provider into the builder for that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Bearer {
        format: Option<String>,
    },
    ApiKey {
        location: ApiKeyLocation,
        name: String,
    },
    OpenIdConnect {
        url: String,
    },
    OAuth2 {
        flow: OAuth2Flow,
        authorization_url: Option<String>,
        token_url: Option<String>,
        refresh_url: Option<String>,
        scopes: BTreeMap<String, String>,
    },
}

/// Options shared by every component of an application.
///
/// Built programmatically (`SwarmOptions::default()` plus the fluent
/// setters) or read from the `swarm` config section:
///
/// ```yaml
/// swarm:
///   title: Pet store
///   default_version: v2
///   monitor: false
///   documentation_access: [docs]
///   languages: [en, fr]
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SwarmOptions {
    pub title: String,
    pub description: String,
    pub log_level: String,
    pub default_version: String,
    pub servers: Vec<ServerInfo>,
    pub auth: Option<AuthScheme>,
    pub documentation_access: Option<Access>,
    pub documentation_path: String,
    pub monitor: bool,
    pub monitor_access: Option<Access>,
    pub default_language: String,
    pub languages: Vec<String>,
    /// Largest accepted request body, in bytes. Larger payloads get a 413.
    pub body_limit: usize,
}

/// Request body limit applied when none is configured (2 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

impl Default for SwarmOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            log_level: "error".to_string(),
            default_version: "v1".to_string(),
            servers: Vec::new(),
            auth: None,
            documentation_access: None,
            documentation_path: "swagger.json".to_string(),
            monitor: true,
            monitor_access: None,
            default_language: "en".to_string(),
            languages: vec!["en".to_string()],
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl SwarmOptions {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn default_version(mut self, version: impl Into<String>) -> Self {
        self.default_version = version.into();
        self
    }

    pub fn documentation_access(mut self, access: impl Into<Access>) -> Self {
        self.documentation_access = Some(access.into());
        self
    }

    pub fn documentation_path(mut self, path: impl Into<String>) -> Self {
        self.documentation_path = path.into().trim_start_matches('/').to_string();
        self
    }

    pub fn monitor(mut self, enabled: bool) -> Self {
        self.monitor = enabled;
        self
    }

    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    pub fn monitor_access(mut self, access: impl Into<Access>) -> Self {
        self.monitor_access = Some(access.into());
        self
    }

    pub fn languages<I, S>(mut self, default_language: impl Into<String>, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_language = default_language.into();
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_server(mut self, url: impl Into<String>, description: Option<&str>) -> Self {
        self.servers.push(ServerInfo {
            url: url.into(),
            description: description.map(str::to_string),
        });
        self
    }

    pub fn basic_auth(mut self) -> Self {
        self.auth = Some(AuthScheme::Basic);
        self
    }

    /// Bearer tokens; the format defaults to `JWT`.
    pub fn bearer_auth(mut self, format: Option<&str>) -> Self {
        self.auth = Some(AuthScheme::Bearer {
            format: Some(format.unwrap_or("JWT").to_string()),
        });
        self
    }

    pub fn api_key_auth(mut self, location: ApiKeyLocation, name: impl Into<String>) -> Self {
        self.auth = Some(AuthScheme::ApiKey {
            location,
            name: name.into(),
        });
        self
    }

    pub fn open_id_auth(mut self, connect_url: impl Into<String>) -> Self {
        self.auth = Some(AuthScheme::OpenIdConnect {
            url: connect_url.into(),
        });
        self
    }

    pub fn oauth2_authorization_code(
        self,
        authorization_url: impl Into<String>,
        token_url: impl Into<String>,
        refresh_url: Option<&str>,
        scopes: BTreeMap<String, String>,
    ) -> Self {
        self.oauth2(
            OAuth2Flow::AuthorizationCode,
            Some(authorization_url.into()),
            Some(token_url.into()),
            refresh_url,
            scopes,
        )
    }

    pub fn oauth2_implicit(
        self,
        authorization_url: impl Into<String>,
        refresh_url: Option<&str>,
        scopes: BTreeMap<String, String>,
    ) -> Self {
        self.oauth2(
            OAuth2Flow::Implicit,
            Some(authorization_url.into()),
            None,
            refresh_url,
            scopes,
        )
    }

    pub fn oauth2_password(
        self,
        token_url: impl Into<String>,
        refresh_url: Option<&str>,
        scopes: BTreeMap<String, String>,
    ) -> Self {
        self.oauth2(OAuth2Flow::Password, None, Some(token_url.into()), refresh_url, scopes)
    }

    pub fn oauth2_client_credentials(
        self,
        token_url: impl Into<String>,
        refresh_url: Option<&str>,
        scopes: BTreeMap<String, String>,
    ) -> Self {
        self.oauth2(
            OAuth2Flow::ClientCredentials,
            None,
            Some(token_url.into()),
            refresh_url,
            scopes,
        )
    }

    fn oauth2(
        mut self,
        flow: OAuth2Flow,
        authorization_url: Option<String>,
        token_url: Option<String>,
        refresh_url: Option<&str>,
        scopes: BTreeMap<String, String>,
    ) -> Self {
        self.auth = Some(AuthScheme::OAuth2 {
            flow,
            authorization_url,
            token_url,
            refresh_url: refresh_url.map(str::to_string),
            scopes,
        });
        self
    }

    /// Pick the request language from an `Accept-Language` header value.
    ///
    /// The first listed tag (quality suffix stripped) that is one of
    /// [`languages`](Self::languages) wins; otherwise the default language.
    pub fn negotiate_language(&self, accept_language: Option<&str>) -> String {
        accept_language
            .unwrap_or_default()
            .split(',')
            .map(|entry| entry.split(';').next().unwrap_or_default().trim())
            .find(|tag| self.languages.iter().any(|lang| lang == tag))
            .map(str::to_string)
            .unwrap_or_else(|| self.default_language.clone())
    }
}

impl ConfigProperties for SwarmOptions {
    fn prefix() -> &'static str {
        "swarm"
    }

    fn properties_metadata() -> Vec<PropertyMeta> {
        let p = Self::prefix();
        vec![
            PropertyMeta::new(p, "title", "String").description("API title"),
            PropertyMeta::new(p, "description", "String"),
            PropertyMeta::new(p, "log_level", "String").default_value("error"),
            PropertyMeta::new(p, "default_version", "String").default_value("v1"),
            PropertyMeta::new(p, "servers", "Vec<String>"),
            PropertyMeta::new(p, "auth.type", "String")
                .description("basic, bearer, api_key, open_id or oauth2"),
            PropertyMeta::new(p, "documentation_access", "Vec<String>"),
            PropertyMeta::new(p, "documentation_path", "String").default_value("swagger.json"),
            PropertyMeta::new(p, "monitor", "bool").default_value("true"),
            PropertyMeta::new(p, "monitor_access", "Vec<String>"),
            PropertyMeta::new(p, "default_language", "String").default_value("en"),
            PropertyMeta::new(p, "languages", "Vec<String>").default_value("[en]"),
            PropertyMeta::new(p, "body_limit", "usize")
                .description("Largest accepted request body, in bytes")
                .default_value("2097152"),
        ]
    }

    fn from_config(config: &SwarmConfig) -> Result<Self, ConfigError> {
        let defaults = SwarmOptions::default();
        let servers = config
            .get_opt::<Vec<String>>("swarm.servers")?
            .unwrap_or_default()
            .into_iter()
            .map(|url| ServerInfo {
                url,
                description: None,
            })
            .collect();

        Ok(SwarmOptions {
            title: config.get_or("swarm.title", defaults.title),
            description: config.get_or("swarm.description", defaults.description),
            log_level: config.get_or("swarm.log_level", defaults.log_level),
            default_version: config.get_or("swarm.default_version", defaults.default_version),
            servers,
            auth: auth_from_config(config)?,
            documentation_access: config
                .get_opt::<Vec<String>>("swarm.documentation_access")?
                .map(Access::from),
            documentation_path: config
                .get_or("swarm.documentation_path", defaults.documentation_path)
                .trim_start_matches('/')
                .to_string(),
            monitor: config.get_opt("swarm.monitor")?.unwrap_or(defaults.monitor),
            monitor_access: config
                .get_opt::<Vec<String>>("swarm.monitor_access")?
                .map(Access::from),
            default_language: config.get_or("swarm.default_language", defaults.default_language),
            languages: config.get_or("swarm.languages", defaults.languages),
            body_limit: config.get_opt("swarm.body_limit")?.unwrap_or(defaults.body_limit),
        })
    }
}

fn auth_from_config(config: &SwarmConfig) -> Result<Option<AuthScheme>, ConfigError> {
    let Some(kind) = config.get_opt::<String>("swarm.auth.type")? else {
        return Ok(None);
    };
    let invalid = |message: String| ConfigError::Invalid {
        key: "swarm.auth.type".to_string(),
        message,
    };

    let scheme = match kind.as_str() {
        "basic" => AuthScheme::Basic,
        "bearer" => AuthScheme::Bearer {
            format: Some(config.get_or("swarm.auth.format", "JWT".to_string())),
        },
        "api_key" | "apiKey" => AuthScheme::ApiKey {
            location: config
                .get_or("swarm.auth.location", "header".to_string())
                .parse()
                .map_err(invalid)?,
            name: config.get("swarm.auth.name")?,
        },
        "open_id" | "openId" => AuthScheme::OpenIdConnect {
            url: config.get("swarm.auth.url")?,
        },
        "oauth2" => AuthScheme::OAuth2 {
            flow: config
                .get::<String>("swarm.auth.flow")?
                .parse()
                .map_err(invalid)?,
            authorization_url: config.get_opt("swarm.auth.authorization_url")?,
            token_url: config.get_opt("swarm.auth.token_url")?,
            refresh_url: config.get_opt("swarm.auth.refresh_url")?,
            scopes: config.children("swarm.auth.scopes")?,
        },
        other => return Err(invalid(format!("unknown auth type `{other}`"))),
    };
    Ok(Some(scheme))
}
