//! Everything an application needs with a single `use`.
//!
//! ```ignore
//! use swarm_core::prelude::*;
//!
//! struct Hello;
//!
//! impl Controller for Hello {
//!     fn describe(meta: &mut ControllerMeta) {
//!         meta.prefix("/hello", false);
//!         meta.method("greet")
//!             .get("/:name")
//!             .param(0, "name")
//!             .handler(|args: Args| async move {
//!                 Ok(json!({ "hello": args.str(0) }))
//!             });
//!     }
//! }
//! ```

pub use crate::builder::{Swarm, SwarmApp};
pub use crate::config::{ConfigProperties, SwarmConfig};
pub use crate::controller::Controller;
pub use crate::dispatch::{injector, Injector};
pub use crate::error::ApiError;
pub use crate::guards::ScopeProvider;
pub use crate::hooks::{HandlerState, HookPoint, HookState};
pub use crate::http::{HeaderMap, Json, Method, StatusCode};
pub use crate::meta::{Access, ArgSource, ControllerMeta, HttpVerb, MethodMeta, SchemaRef};
pub use crate::options::{ApiKeyLocation, AuthScheme, OAuth2Flow, SwarmOptions};
pub use crate::plugin::Plugin;
pub use crate::plugins::{Cors, ErrorHandling, Tracing};
pub use crate::request::{Args, Reply, Request};
pub use crate::schema::SchemaTable;
pub use crate::map_error;
pub use serde_json::{json, Value};
