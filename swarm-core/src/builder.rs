use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};

use crate::config::{ConfigError, ConfigProperties, SwarmConfig};
use crate::controller::{Controller, Controllers};
use crate::dispatch::{build_routes, AppState, Injector};
use crate::guards::ScopeProvider;
use crate::health::Health;
use crate::hooks::{HookPoint, HookState, Hooks};
use crate::http::Router;
use crate::meta::{ControllerMeta, HttpVerb, MethodMeta};
use crate::monitoring::monitoring_controller;
use crate::options::SwarmOptions;
use crate::plugin::Plugin;
use crate::schema::{RouteSchema, SchemaTable};
use crate::transport::{mount, with_trailing_slash_fallback};
use crate::ApiError;

type LayerFn = Box<dyn FnOnce(Router) -> Router + Send>;

/// Application builder.
///
/// Collects controllers, schemas, hooks and the external collaborators
/// (scope provider, injectors), then freezes everything into an axum
/// [`Router`].
///
/// ```ignore
/// Swarm::new(SwarmOptions::default().title("Pets"))
///     .with(Tracing)
///     .controller::<Pets>()
///     .with_schema("Pet", pet_schema)
///     .with_scope_provider(|req: &Request| scopes_from_token(req))
///     .serve("0.0.0.0:3000")
///     .await?;
/// ```
pub struct Swarm {
    options: SwarmOptions,
    controllers: Controllers,
    schemas: SchemaTable,
    hooks: Hooks,
    injectors: Vec<Arc<dyn Injector>>,
    scope_provider: Option<Arc<dyn ScopeProvider>>,
    custom_layers: Vec<LayerFn>,
    last_plugin_name: Option<&'static str>,
}

impl Swarm {
    /// A builder with the `Health` controller, plus `Monitoring` when
    /// `options.monitor` is on.
    pub fn new(options: SwarmOptions) -> Self {
        let mut controllers = Controllers::new(options.default_version.clone());
        controllers.add::<Health>();
        if options.monitor {
            controllers.register(monitoring_controller(&options));
        }
        Self {
            options,
            controllers,
            schemas: SchemaTable::new(),
            hooks: Hooks::new(),
            injectors: Vec::new(),
            scope_provider: None,
            custom_layers: Vec::new(),
            last_plugin_name: None,
        }
    }

    /// A builder whose options come from the `swarm.*` configuration keys.
    pub fn from_config(config: &SwarmConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(SwarmOptions::from_config(config)?))
    }

    pub fn options(&self) -> &SwarmOptions {
        &self.options
    }

    // ── Registry ────────────────────────────────────────────────────────

    /// Register a [`Controller`] type.
    pub fn controller<C: Controller>(mut self) -> Self {
        self.controllers.add::<C>();
        self
    }

    /// Register a controller from hand-built metadata.
    pub fn register(mut self, meta: ControllerMeta) -> Self {
        self.controllers.register(meta);
        self
    }

    /// Add or replace one method of an already registered controller.
    pub fn add_method(mut self, controller: &str, meta: MethodMeta) -> Self {
        self.controllers.add_method(controller, meta);
        self
    }

    pub fn controllers(&self) -> &Controllers {
        &self.controllers
    }

    pub fn controllers_mut(&mut self) -> &mut Controllers {
        &mut self.controllers
    }

    /// Add a named schema to the reference table.
    pub fn with_schema(mut self, name: impl Into<String>, schema: Value) -> Self {
        self.schemas.insert(name, schema);
        self
    }

    pub fn schemas_mut(&mut self) -> &mut SchemaTable {
        &mut self.schemas
    }

    // ── Collaborators ───────────────────────────────────────────────────

    /// Append a handler to the hook chain of `point`.
    pub fn on<F, Fut>(mut self, point: HookPoint, f: F) -> Self
    where
        F: Fn(HookState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookState, ApiError>> + Send + 'static,
    {
        self.hooks.add(point, f);
        self
    }

    /// Register the provider of an `inject(name)` argument binding.
    pub fn with_injector(mut self, injector: Arc<dyn Injector>) -> Self {
        self.injectors.push(injector);
        self
    }

    /// Set the function asked for the caller's scopes before each access check.
    pub fn with_scope_provider<P: ScopeProvider>(mut self, provider: P) -> Self {
        self.scope_provider = Some(Arc::new(provider));
        self
    }

    // ── Plugins and layers ──────────────────────────────────────────────

    /// Install a [`Plugin`] into this builder.
    pub fn with<Pl: Plugin>(mut self, plugin: Pl) -> Self {
        if let Some(last_name) = self.last_plugin_name {
            tracing::warn!(
                previous = last_name,
                current = Pl::name(),
                "Plugin {} should be installed last, but {} is being installed after it",
                last_name,
                Pl::name(),
            );
        }
        if Pl::should_be_last() {
            self.last_plugin_name = Some(Pl::name());
        }
        plugin.install(self)
    }

    /// Apply a custom transformation to the assembled router. Transformations
    /// run in registration order.
    pub fn with_layer_fn<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Router) -> Router + Send + 'static,
    {
        self.custom_layers.push(Box::new(f));
        self
    }

    // ── Build ───────────────────────────────────────────────────────────

    /// Run `preRegister`, freeze the registry, mount one route per method
    /// and version, then run `postRegister`.
    pub async fn build_app(self) -> Result<SwarmApp, ApiError> {
        let Swarm {
            options,
            controllers,
            schemas,
            hooks,
            injectors,
            scope_provider,
            custom_layers,
            ..
        } = self;

        hooks.run(HookPoint::PreRegister, HookState::None).await?;

        let state = Arc::new(AppState::new(
            options,
            controllers,
            schemas,
            hooks,
            injectors,
            scope_provider,
        ));
        let routes = build_routes(&state);

        let mut router = with_trailing_slash_fallback(mount(&routes));
        for layer_fn in custom_layers {
            router = layer_fn(router);
        }

        state.hooks.run(HookPoint::PostRegister, HookState::None).await?;

        let routes = routes
            .into_iter()
            .map(|route| RouteInfo {
                operation_id: route
                    .handler
                    .method()
                    .operation_id(route.handler.controller()),
                verb: route.verb,
                url: route.url,
                schema: route.schema,
            })
            .collect();

        Ok(SwarmApp {
            router,
            state,
            routes,
        })
    }

    /// Build and return the router only.
    pub async fn build(self) -> Result<Router, ApiError> {
        Ok(self.build_app().await?.into_router())
    }

    /// Build the application and serve it on `addr` until SIGTERM or Ctrl-C.
    pub async fn serve(self, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.build_app().await?.serve(addr).await
    }
}

/// One installed route.
#[derive(Debug, Clone)]
pub struct RouteInfo {
    pub verb: HttpVerb,
    pub url: String,
    /// `Controller@method`.
    pub operation_id: String,
    pub schema: RouteSchema,
}

/// A built application: the router plus the frozen state it dispatches to.
pub struct SwarmApp {
    router: Router,
    state: Arc<AppState>,
    routes: Vec<RouteInfo>,
}

impl SwarmApp {
    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn into_router(self) -> Router {
        self.router
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Every `(verb, url, schema)` installed, one per method and version.
    pub fn routes(&self) -> &[RouteInfo] {
        &self.routes
    }

    /// Reject new requests and drain the `preShutdown` chain.
    pub async fn shutdown(&self) {
        shutdown(&self.state).await;
    }

    /// Run `preListen`, bind, run `postListen` and serve. On SIGTERM or
    /// Ctrl-C the shutdown flag is set and `preShutdown` is awaited before
    /// the server stops.
    pub async fn serve(self, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
        let SwarmApp { router, state, .. } = self;

        state.hooks.run(HookPoint::PreListen, HookState::None).await?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        state.hooks.run(HookPoint::PostListen, HookState::None).await?;

        info!(%addr, "Swarm server listening");
        let shutdown_state = state.clone();
        crate::http::serve(
            listener,
            router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown(&shutdown_state).await;
        })
        .await?;

        info!("Swarm server stopped");
        Ok(())
    }
}

async fn shutdown(state: &AppState) {
    info!("Graceful shutdown start");
    state.begin_shutdown();
    if let Err(err) = state.hooks.run(HookPoint::PreShutdown, HookState::None).await {
        error!(error = %err, "preShutdown hook failed");
    }
    info!("All preShutdown hooks done, now shutdown");
}

/// Wait for a shutdown signal (Ctrl-C or SIGTERM on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
