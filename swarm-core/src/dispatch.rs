//! Request dispatch: one [`Route`] per (method, version), each running the
//! hook / access / handler / statistics sequence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info};

use crate::controller::{ControllerDescriptor, Controllers, MethodDescriptor};
use crate::guards::{check_access, ScopeProvider};
use crate::hooks::{HandlerState, HookPoint, HookState, Hooks};
use crate::meta::{ArgBinding, ArgSource, HttpVerb};
use crate::monitor::Monitor;
use crate::options::SwarmOptions;
use crate::request::{Arg, Args, Reply, Request};
use crate::schema::{generate_request_schema, RouteSchema, SchemaTable};
use crate::ApiError;

/// Supplies a request-derived value for an argument bound to
/// `ArgSource::Injector(name)`.
pub trait Injector: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// `None` leaves the argument empty.
    fn inject(&self, request: &Request) -> Option<Value>;
}

struct FnInjector<F> {
    name: String,
    f: F,
}

impl<F> Injector for FnInjector<F>
where
    F: Fn(&Request) -> Option<Value> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn inject(&self, request: &Request) -> Option<Value> {
        (self.f)(request)
    }
}

/// Build an [`Injector`] from a closure.
pub fn injector<F>(name: impl Into<String>, f: F) -> Arc<dyn Injector>
where
    F: Fn(&Request) -> Option<Value> + Send + Sync + 'static,
{
    Arc::new(FnInjector {
        name: name.into(),
        f,
    })
}

/// Everything a dispatched request can reach. Frozen once the application
/// is built; only the shutdown flag and the statistics change afterwards.
pub struct AppState {
    pub options: Arc<SwarmOptions>,
    pub controllers: Arc<Controllers>,
    pub schemas: Arc<SchemaTable>,
    pub hooks: Arc<Hooks>,
    pub monitor: Arc<Monitor>,
    injectors: Vec<Arc<dyn Injector>>,
    scope_provider: Option<Arc<dyn ScopeProvider>>,
    shutting_down: AtomicBool,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("controllers", &self.controllers.len())
            .field("schemas", &self.schemas.len())
            .field("hooks", &self.hooks)
            .field("injectors", &self.injectors.len())
            .field("shutting_down", &self.is_shutting_down())
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        options: SwarmOptions,
        controllers: Controllers,
        schemas: SchemaTable,
        hooks: Hooks,
        injectors: Vec<Arc<dyn Injector>>,
        scope_provider: Option<Arc<dyn ScopeProvider>>,
    ) -> Self {
        Self {
            options: Arc::new(options),
            controllers: Arc::new(controllers),
            schemas: Arc::new(schemas),
            hooks: Arc::new(hooks),
            monitor: Arc::new(Monitor::new()),
            injectors,
            scope_provider,
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Reject every request dispatched from now on.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn injector(&self, name: &str) -> Option<&Arc<dyn Injector>> {
        self.injectors.iter().find(|i| i.name() == name)
    }
}

/// A mountable `(verb, url, schema, handler)` tuple.
#[derive(Clone, Debug)]
pub struct Route {
    pub verb: HttpVerb,
    pub url: String,
    pub schema: RouteSchema,
    pub handler: RouteHandler,
}

/// Build the routes of every registered method, one per version. Root
/// controllers are not version-namespaced, so each of their methods yields
/// a single route.
pub fn build_routes(state: &Arc<AppState>) -> Vec<Route> {
    let mut routes = Vec::new();
    for (controller, method) in state.controllers.routable() {
        let schema = generate_request_schema(controller, method, &state.schemas);
        let mut urls: Vec<String> = Vec::new();
        for version in &method.versions {
            let url = method.url(controller, version);
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        for url in urls {
            info!(
                "Added route for {}: {} {}",
                method.operation_id(controller),
                method.verb,
                url
            );
            routes.push(Route {
                verb: method.verb,
                url,
                schema: schema.clone(),
                handler: RouteHandler {
                    state: state.clone(),
                    controller: controller.clone(),
                    method: method.clone(),
                },
            });
        }
    }
    routes
}

/// Runs one method for one request.
#[derive(Clone)]
pub struct RouteHandler {
    state: Arc<AppState>,
    controller: Arc<ControllerDescriptor>,
    method: Arc<MethodDescriptor>,
}

impl std::fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteHandler")
            .field("controller", &self.controller.name)
            .field("method", &self.method.name)
            .finish()
    }
}

impl RouteHandler {
    pub fn controller(&self) -> &Arc<ControllerDescriptor> {
        &self.controller
    }

    pub fn method(&self) -> &Arc<MethodDescriptor> {
        &self.method
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Dispatch `request`. `reply` collects the status and headers the
    /// handler sets; the returned value is the response body.
    pub async fn handle(&self, mut request: Request, reply: Reply) -> Result<Value, ApiError> {
        let state = &self.state;
        if state.is_shutting_down() {
            return Err(ApiError::ServiceUnavailable("Server is shutting down".into()));
        }
        let started = Instant::now();
        let operation = self.method.operation_id(&self.controller);
        debug!(operation = %operation, uri = %request.uri, "Dispatching request");

        request.attach(state.clone());
        if let Some(provider) = &state.scope_provider {
            request.scopes = provider.scopes(&request).await;
        }

        let request = match state.hooks.run(HookPoint::PreAccess, HookState::Request(request)).await? {
            HookState::Request(request) => request,
            other => return Err(unexpected_state(HookPoint::PreAccess, &other)),
        };

        check_access(
            request.scopes.as_deref(),
            self.method.effective_access(&self.controller),
            &request.params,
        )?;

        state.hooks.run(HookPoint::PostAccess, HookState::None).await?;

        let request = Arc::new(request);
        let handler_state = HandlerState {
            request: request.clone(),
            controller: self.controller.clone(),
            method: self.method.clone(),
            error: None,
        };
        let hook_state = state
            .hooks
            .run(HookPoint::PreHandler, HookState::Handler(handler_state))
            .await?;

        let args = resolve_args(&self.method.args, self.method.raw_body, &request, &reply, state);

        match (self.method.handler)(args).await {
            Ok(value) => {
                state.hooks.run(HookPoint::PostHandler, hook_state).await?;
                let value = match state.hooks.run(HookPoint::PreResponse, HookState::Response(value)).await? {
                    HookState::Response(value) => value,
                    other => return Err(unexpected_state(HookPoint::PreResponse, &other)),
                };
                if state.options.monitor {
                    state
                        .monitor
                        .record(&self.controller.name, &self.method.name, started.elapsed());
                }
                Ok(value)
            }
            Err(err) => {
                debug!(operation = %operation, error = %err, "Handler failed");
                let failed = match hook_state {
                    HookState::Handler(mut handler_state) => {
                        handler_state.error = Some(err.clone());
                        handler_state
                    }
                    _ => HandlerState {
                        request,
                        controller: self.controller.clone(),
                        method: self.method.clone(),
                        error: Some(err.clone()),
                    },
                };
                state.hooks.run(HookPoint::OnError, HookState::Handler(failed)).await?;
                Err(err)
            }
        }
    }
}

fn unexpected_state(point: HookPoint, state: &HookState) -> ApiError {
    ApiError::Internal(format!("{point} hook returned a {} state", state.kind()))
}

/// Resolve argument bindings into positional arguments. The list is sized to
/// the highest bound position plus one; positions without a binding, or
/// whose source has nothing to offer, stay empty.
pub fn resolve_args(
    bindings: &[ArgBinding],
    raw_body: bool,
    request: &Arc<Request>,
    reply: &Reply,
    state: &AppState,
) -> Args {
    let size = bindings.iter().map(|b| b.position + 1).max().unwrap_or(0);
    let mut slots: Vec<Option<Arg>> = vec![None; size];

    let mut ordered: Vec<&ArgBinding> = bindings.iter().collect();
    ordered.sort_by_key(|b| b.position);

    for binding in ordered {
        let key = binding.key.as_deref().filter(|k| !k.is_empty());
        slots[binding.position] = match &binding.source {
            ArgSource::Body => keyed(&request.body, key),
            ArgSource::RawBody => raw_body
                .then(|| request.raw_body.clone())
                .flatten()
                .map(Arg::Raw),
            ArgSource::Query => match key {
                Some(k) => request.query.get(k).cloned().map(Arg::Value),
                None => Some(Arg::Value(Value::Object(request.query.clone()))),
            },
            ArgSource::Header => match key {
                Some(k) => request.header(k).map(|v| Arg::Value(Value::String(v.to_string()))),
                None => Some(Arg::Value(request.headers_value())),
            },
            ArgSource::Param => match key {
                Some(k) => request.params.get(k).map(|v| Arg::Value(Value::String(v.clone()))),
                None => Some(Arg::Value(request.params_value())),
            },
            ArgSource::Request => Some(Arg::Request(request.clone())),
            ArgSource::Response => Some(Arg::Response(reply.clone())),
            ArgSource::Injector(name) => state
                .injector(name)
                .and_then(|i| i.inject(request))
                .map(Arg::Value),
        };
    }
    Args::new(slots)
}

fn keyed(value: &Value, key: Option<&str>) -> Option<Arg> {
    match key {
        Some(k) => value.get(k).cloned().map(Arg::Value),
        None => Some(Arg::Value(value.clone())),
    }
}
