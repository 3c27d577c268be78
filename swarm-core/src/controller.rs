//! Controller registry: turns [`ControllerMeta`] into the normalized
//! controller/method graph every other component reads.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::meta::{
    Accepts, Access, ArgBinding, ArgSource, ControllerMeta, HttpVerb, MethodMeta, ParamSpec,
    ReturnSpec,
};
use crate::request::HandlerFn;

/// A group of routable methods sharing a path prefix and default
/// versions/access.
///
/// ```ignore
/// struct Users;
///
/// impl Controller for Users {
///     fn describe(meta: &mut ControllerMeta) {
///         meta.title("Users").prefix("/users", false);
///         meta.method("login")
///             .post("/login")
///             .accepts("Login")
///             .returns(200, "Session", "Logged in")
///             .body(0)
///             .handler(login);
///     }
/// }
/// ```
pub trait Controller: Send + Sync + 'static {
    /// Registry key. Defaults to the type's name without its module path.
    fn name() -> &'static str
    where
        Self: Sized,
    {
        let full = std::any::type_name::<Self>();
        let path = full.split('<').next().unwrap_or(full);
        path.rsplit("::").next().unwrap_or(path)
    }

    /// Attach the controller's metadata.
    fn describe(meta: &mut ControllerMeta);

    /// Collect the metadata into a fresh [`ControllerMeta`].
    fn meta() -> ControllerMeta
    where
        Self: Sized,
    {
        let mut meta = ControllerMeta::new(Self::name());
        Self::describe(&mut meta);
        meta
    }
}

/// Normalized controller.
#[derive(Debug, Clone)]
pub struct ControllerDescriptor {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Leading slash, no trailing slash (`/` for the empty prefix).
    pub prefix: String,
    pub root: bool,
    pub versions: Vec<String>,
    pub access: Option<Access>,
    pub parameters: Vec<ParamSpec>,
    pub methods: Vec<Arc<MethodDescriptor>>,
}

impl ControllerDescriptor {
    pub fn method(&self, name: &str) -> Option<&Arc<MethodDescriptor>> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Title shown in the API description (falls back to the name).
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

/// Normalized, routable method.
#[derive(Clone)]
pub struct MethodDescriptor {
    pub name: String,
    pub verb: HttpVerb,
    pub route: String,
    /// Controller prefix joined with `route`, computed once.
    pub full_route: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub access: Option<Access>,
    pub accepts: Option<Accepts>,
    pub returns: Vec<ReturnSpec>,
    pub parameters: Vec<ParamSpec>,
    pub query: Vec<ParamSpec>,
    pub versions: Vec<String>,
    pub args: Vec<ArgBinding>,
    pub raw_body: bool,
    pub handler: HandlerFn,
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("verb", &self.verb)
            .field("full_route", &self.full_route)
            .field("access", &self.access)
            .field("versions", &self.versions)
            .field("args", &self.args)
            .field("raw_body", &self.raw_body)
            .finish_non_exhaustive()
    }
}

impl MethodDescriptor {
    /// Method access if set, else the controller's.
    pub fn effective_access<'a>(&'a self, controller: &'a ControllerDescriptor) -> Option<&'a Access> {
        self.access.as_ref().or(controller.access.as_ref())
    }

    /// `Controller@method`, the key used by statistics and the API description.
    pub fn operation_id(&self, controller: &ControllerDescriptor) -> String {
        format!("{}@{}", controller.name, self.name)
    }

    /// URL the method is mounted at for `version`.
    pub fn url(&self, controller: &ControllerDescriptor, version: &str) -> String {
        if controller.root {
            self.full_route.clone()
        } else if self.full_route == "/" {
            format!("/{version}")
        } else {
            format!("/{version}{}", self.full_route)
        }
    }
}

/// Normalize a path: exactly one leading slash, no trailing slash, no empty
/// segments. The empty path is `/`.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Join a controller prefix and a method route.
///
/// ```
/// # use swarm_core::controller::full_route;
/// assert_eq!(full_route("users/", "login"), "/users/login");
/// assert_eq!(full_route("/", "/"), "/");
/// ```
pub fn full_route(prefix: &str, route: &str) -> String {
    normalize_path(&format!("{prefix}/{route}"))
}

fn default_args() -> Vec<ArgBinding> {
    vec![
        ArgBinding {
            position: 0,
            source: ArgSource::Request,
            key: None,
        },
        ArgBinding {
            position: 1,
            source: ArgSource::Response,
            key: None,
        },
    ]
}

fn non_empty(versions: Option<Vec<String>>) -> Option<Vec<String>> {
    versions.filter(|v| !v.is_empty())
}

/// The controller registry.
///
/// Registering a controller or method under an existing name replaces the
/// previous entry in place; nothing is merged field by field.
#[derive(Debug, Clone)]
pub struct Controllers {
    default_version: String,
    list: Vec<Arc<ControllerDescriptor>>,
}

impl Controllers {
    pub fn new(default_version: impl Into<String>) -> Self {
        Self {
            default_version: default_version.into(),
            list: Vec::new(),
        }
    }

    /// Register a [`Controller`] type.
    pub fn add<C: Controller>(&mut self) {
        self.register(C::meta());
    }

    /// Register a controller from its metadata and add every routable method.
    pub fn register(&mut self, meta: ControllerMeta) {
        debug!(controller = %meta.name, methods = meta.methods.len(), "Discovered controller metadata");
        let ControllerMeta {
            name,
            title,
            description,
            prefix,
            root,
            versions,
            access,
            parameters,
            methods,
        } = meta;

        self.add_controller(ControllerDescriptor {
            name: name.clone(),
            title,
            description,
            prefix: normalize_path(prefix.as_deref().unwrap_or("/")),
            root,
            versions: non_empty(versions).unwrap_or_else(|| vec![self.default_version.clone()]),
            access,
            parameters,
            methods: Vec::new(),
        });
        for method in methods {
            self.add_method(&name, method);
        }
    }

    /// Add or replace a controller. Its `methods` are kept as given.
    pub fn add_controller(&mut self, controller: ControllerDescriptor) {
        info!(controller = %controller.name, "Adding controller");
        let controller = Arc::new(controller);
        match self.list.iter_mut().find(|c| c.name == controller.name) {
            Some(slot) => *slot = controller,
            None => self.list.push(controller),
        }
    }

    /// Add or replace a method of an already registered controller.
    ///
    /// Methods lacking a verb, a route or a handler are not routable and are
    /// skipped with a warning.
    pub fn add_method(&mut self, controller_name: &str, meta: MethodMeta) {
        let Some(slot) = self.list.iter_mut().find(|c| c.name == controller_name) else {
            error!(
                controller = controller_name,
                method = %meta.name,
                "Cannot add method to unknown controller"
            );
            return;
        };

        let (Some(verb), Some(route), Some(handler)) = (meta.verb, meta.route, meta.handler) else {
            warn!(
                controller = controller_name,
                method = %meta.name,
                "Method is missing a verb, a route or a handler and cannot be routed"
            );
            return;
        };

        let controller = Arc::make_mut(slot);
        info!(controller = controller_name, method = %meta.name, "Adding method");
        let method = Arc::new(MethodDescriptor {
            full_route: full_route(&controller.prefix, &route),
            name: meta.name,
            verb,
            route,
            title: meta.title,
            description: meta.description,
            access: meta.access,
            accepts: meta.accepts,
            returns: meta.returns,
            parameters: meta.parameters,
            query: meta.query,
            versions: non_empty(meta.versions).unwrap_or_else(|| controller.versions.clone()),
            args: if meta.args.is_empty() {
                default_args()
            } else {
                meta.args
            },
            raw_body: meta.raw_body,
            handler,
        });

        match controller.methods.iter_mut().find(|m| m.name == method.name) {
            Some(existing) => *existing = method,
            None => controller.methods.push(method),
        }
    }

    pub fn default_version(&self) -> &str {
        &self.default_version
    }

    /// Registered controllers, in registration order.
    pub fn list(&self) -> &[Arc<ControllerDescriptor>] {
        &self.list
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ControllerDescriptor>> {
        self.list.iter().find(|c| c.name == name)
    }

    /// Every routable `(controller, method)` pair.
    pub fn routable(
        &self,
    ) -> impl Iterator<Item = (&Arc<ControllerDescriptor>, &Arc<MethodDescriptor>)> {
        self.list
            .iter()
            .flat_map(|c| c.methods.iter().map(move |m| (c, m)))
    }

    /// Whether `version` is the default version or is served by some
    /// controller or method.
    pub fn has_version(&self, version: &str) -> bool {
        version == self.default_version
            || self.list.iter().any(|c| {
                c.versions.iter().any(|v| v == version)
                    || c.methods.iter().any(|m| m.versions.iter().any(|v| v == version))
            })
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}
