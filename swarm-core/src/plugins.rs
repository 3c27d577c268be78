//! Built-in plugins.

use crate::builder::Swarm;
use crate::plugin::Plugin;

/// CORS plugin.
///
/// ```ignore
/// Swarm::new(options).with(Cors::permissive())
/// ```
pub struct Cors {
    layer: tower_http::cors::CorsLayer,
}

impl Cors {
    /// Any origin, method and header.
    pub fn permissive() -> Self {
        Self {
            layer: crate::layers::default_cors(),
        }
    }

    pub fn new(layer: tower_http::cors::CorsLayer) -> Self {
        Self { layer }
    }
}

impl Plugin for Cors {
    fn install(self, app: Swarm) -> Swarm {
        let layer = self.layer;
        app.with_layer_fn(move |router| router.layer(layer))
    }
}

/// Log subscriber plus HTTP request tracing.
///
/// Installs the global subscriber at the configured `log_level` (unless
/// `RUST_LOG` overrides it) and wraps the router in a `TraceLayer`.
pub struct Tracing;

impl Plugin for Tracing {
    fn install(self, app: Swarm) -> Swarm {
        crate::layers::init_tracing(&app.options().log_level);
        app.with_layer_fn(|router| router.layer(crate::layers::default_trace()))
    }
}

/// Converts panics raised by handlers into JSON 500 responses.
pub struct ErrorHandling;

impl Plugin for ErrorHandling {
    fn install(self, app: Swarm) -> Swarm {
        app.with_layer_fn(|router| router.layer(crate::layers::catch_panic_layer()))
    }

    fn should_be_last() -> bool {
        true
    }
}
