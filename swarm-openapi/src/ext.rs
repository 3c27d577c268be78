use swarm_core::{Plugin, Swarm};

use crate::docs::docs_controller;

const DEFAULT_ASSETS_URL: &str = "/swagger";

/// Plugin that registers the `Swagger` documentation controller.
///
/// # Example
///
/// ```ignore
/// use swarm_openapi::OpenApiPlugin;
///
/// Swarm::new(SwarmOptions::default().title("Pets"))
///     .with(OpenApiPlugin::new().assets_url("https://unpkg.com/swagger-ui-dist@5"))
///     .controller::<Pets>()
/// ```
pub struct OpenApiPlugin {
    assets_url: String,
}

impl OpenApiPlugin {
    pub fn new() -> Self {
        Self {
            assets_url: DEFAULT_ASSETS_URL.to_string(),
        }
    }

    /// Base URL the Swagger UI stylesheets and scripts are loaded from.
    pub fn assets_url(mut self, url: impl Into<String>) -> Self {
        self.assets_url = url.into();
        self
    }
}

impl Default for OpenApiPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for OpenApiPlugin {
    fn install(self, app: Swarm) -> Swarm {
        let meta = docs_controller(app.options(), &self.assets_url);
        app.register(meta)
    }
}
