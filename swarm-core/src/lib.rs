//! Core runtime for Swarm: declarative controller metadata, the controller
//! registry, access gate, hook bus, request dispatch and call statistics,
//! mounted on axum.

pub mod builder;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod guards;
pub mod health;
pub mod hooks;
pub mod http;
pub mod layers;
pub mod meta;
pub mod monitor;
pub mod monitoring;
pub mod options;
pub mod plugin;
pub mod plugins;
pub mod prelude;
pub mod request;
pub mod schema;
pub mod transport;

pub use builder::{RouteInfo, Swarm, SwarmApp};
pub use config::{ConfigError, ConfigProperties, ConfigValue, FromConfigValue, PropertyMeta, SwarmConfig};
pub use controller::{Controller, ControllerDescriptor, Controllers, MethodDescriptor};
pub use dispatch::{injector, AppState, Injector, Route, RouteHandler};
pub use error::ApiError;
pub use guards::{check_access, ScopeProvider};
pub use hooks::{HandlerState, HookPoint, HookState, Hooks};
pub use layers::{default_cors, default_trace, init_tracing};
pub use meta::{Access, ArgSource, ControllerMeta, HttpVerb, MethodMeta, SchemaRef};
pub use monitor::{CallStatRecord, Monitor, StatsReport};
pub use options::{ApiKeyLocation, AuthScheme, OAuth2Flow, ServerInfo, SwarmOptions, DEFAULT_BODY_LIMIT};
pub use plugin::Plugin;
pub use request::{handler, Arg, Args, BoxFuture, HandlerFn, Reply, Request};
pub use schema::{generate_request_schema, RouteSchema, SchemaTable};
