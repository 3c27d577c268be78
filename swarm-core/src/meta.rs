//! Attribute-style metadata attached to controllers and their methods.
//!
//! A [`ControllerMeta`] is filled once per controller, either by
//! [`Controller::describe`](crate::controller::Controller::describe) or by
//! hand, and handed to the [`Controllers`](crate::controller::Controllers)
//! registry which normalizes it. Every field is optional: an absent field
//! inherits the controller-level (or framework-level) default, an explicitly
//! set one, even an empty list, is kept as-is.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::request::{handler, Args, HandlerFn};
use crate::ApiError;

/// HTTP verbs a method can be routed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Delete => "DELETE",
        }
    }

    /// Lower-case form, as used for API description path items.
    pub fn lowercase(&self) -> &'static str {
        match self {
            HttpVerb::Get => "get",
            HttpVerb::Post => "post",
            HttpVerb::Put => "put",
            HttpVerb::Patch => "patch",
            HttpVerb::Delete => "delete",
        }
    }

    /// Whether the verb carries a request body.
    pub fn has_body(&self) -> bool {
        matches!(self, HttpVerb::Post | HttpVerb::Put | HttpVerb::Patch)
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpVerb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpVerb::Get),
            "POST" => Ok(HttpVerb::Post),
            "PUT" => Ok(HttpVerb::Put),
            "PATCH" => Ok(HttpVerb::Patch),
            "DELETE" => Ok(HttpVerb::Delete),
            other => Err(format!("unsupported HTTP verb `{other}`")),
        }
    }
}

/// A schema given either by name (an entry of the
/// [`SchemaTable`](crate::schema::SchemaTable), optionally followed by a
/// `#/pointer`) or inline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SchemaRef {
    Named(String),
    Inline(Value),
}

impl SchemaRef {
    /// Table name of a named reference, without its pointer part.
    pub fn table_name(&self) -> Option<&str> {
        match self {
            SchemaRef::Named(name) => name.split('#').next(),
            SchemaRef::Inline(_) => None,
        }
    }
}

impl From<&str> for SchemaRef {
    fn from(name: &str) -> Self {
        SchemaRef::Named(name.to_string())
    }
}

impl From<String> for SchemaRef {
    fn from(name: String) -> Self {
        SchemaRef::Named(name)
    }
}

impl From<Value> for SchemaRef {
    fn from(schema: Value) -> Self {
        SchemaRef::Inline(schema)
    }
}

/// Required scopes. The caller needs any one of them; an empty list only
/// requires the caller to be authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Access(Vec<String>);

impl Access {
    /// Any authenticated caller.
    pub fn authenticated() -> Self {
        Access(Vec::new())
    }

    pub fn scopes(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Access {
    fn from(scope: &str) -> Self {
        Access(vec![scope.to_string()])
    }
}

impl From<String> for Access {
    fn from(scope: String) -> Self {
        Access(vec![scope])
    }
}

impl From<Vec<String>> for Access {
    fn from(scopes: Vec<String>) -> Self {
        Access(scopes)
    }
}

impl From<Vec<&str>> for Access {
    fn from(scopes: Vec<&str>) -> Self {
        Access(scopes.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Access {
    fn from(scopes: [&str; N]) -> Self {
        Access(scopes.iter().map(|s| s.to_string()).collect())
    }
}

/// A path or query parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    pub schema: Option<SchemaRef>,
    pub description: Option<String>,
}

/// Documented response for one status code (`200`, `404`, `"2xx"`, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnSpec {
    pub code: String,
    pub schema: Option<SchemaRef>,
    pub description: String,
    pub mime_type: String,
}

/// Accepted request body: all schemas must hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Accepts {
    pub schemas: Vec<SchemaRef>,
    pub mime_type: String,
}

/// Where a positional handler argument comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ArgSource {
    Body,
    RawBody,
    Query,
    Header,
    Param,
    Request,
    Response,
    /// Supplied by the injector registered under this name.
    Injector(String),
}

impl ArgSource {
    /// Parse a binding kind; unknown kinds address an injector.
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "body" => ArgSource::Body,
            "rawbody" | "rawBody" | "raw_body" => ArgSource::RawBody,
            "query" => ArgSource::Query,
            "headers" | "header" => ArgSource::Header,
            "params" | "param" => ArgSource::Param,
            "request" => ArgSource::Request,
            "response" => ArgSource::Response,
            other => ArgSource::Injector(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgBinding {
    pub position: usize,
    pub source: ArgSource,
    /// Sub-field, header or parameter name; `None` binds the whole facet.
    pub key: Option<String>,
}

/// Metadata of one controller method.
#[derive(Clone, Default)]
pub struct MethodMeta {
    pub name: String,
    pub verb: Option<HttpVerb>,
    pub route: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub access: Option<Access>,
    pub accepts: Option<Accepts>,
    pub returns: Vec<ReturnSpec>,
    pub parameters: Vec<ParamSpec>,
    pub query: Vec<ParamSpec>,
    pub versions: Option<Vec<String>>,
    pub args: Vec<ArgBinding>,
    pub raw_body: bool,
    pub handler: Option<HandlerFn>,
}

impl fmt::Debug for MethodMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodMeta")
            .field("name", &self.name)
            .field("verb", &self.verb)
            .field("route", &self.route)
            .field("access", &self.access)
            .field("versions", &self.versions)
            .field("args", &self.args)
            .field("has_handler", &self.handler.is_some())
            .finish_non_exhaustive()
    }
}

// Replace the entry with the same key, keep the others.
fn upsert<T>(list: &mut Vec<T>, item: T, same: impl Fn(&T, &T) -> bool) {
    list.retain(|existing| !same(existing, &item));
    list.push(item);
}

impl MethodMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn route(&mut self, verb: HttpVerb, path: impl Into<String>) -> &mut Self {
        self.verb = Some(verb);
        self.route = Some(path.into());
        self
    }

    pub fn get(&mut self, path: impl Into<String>) -> &mut Self {
        self.route(HttpVerb::Get, path)
    }

    pub fn post(&mut self, path: impl Into<String>) -> &mut Self {
        self.route(HttpVerb::Post, path)
    }

    pub fn put(&mut self, path: impl Into<String>) -> &mut Self {
        self.route(HttpVerb::Put, path)
    }

    pub fn patch(&mut self, path: impl Into<String>) -> &mut Self {
        self.route(HttpVerb::Patch, path)
    }

    pub fn delete(&mut self, path: impl Into<String>) -> &mut Self {
        self.route(HttpVerb::Delete, path)
    }

    pub fn title(&mut self, title: impl Into<String>) -> &mut Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    pub fn access(&mut self, access: impl Into<Access>) -> &mut Self {
        self.access = Some(access.into());
        self
    }

    /// Accept a JSON body matching `schema`. Calling it again adds another
    /// schema the body must also satisfy.
    pub fn accepts(&mut self, schema: impl Into<SchemaRef>) -> &mut Self {
        self.accepts_as(schema, "application/json")
    }

    pub fn accepts_as(
        &mut self,
        schema: impl Into<SchemaRef>,
        mime_type: impl Into<String>,
    ) -> &mut Self {
        let mime_type = mime_type.into();
        match &mut self.accepts {
            Some(accepts) => {
                accepts.schemas.push(schema.into());
                accepts.mime_type = mime_type;
            }
            None => {
                self.accepts = Some(Accepts {
                    schemas: vec![schema.into()],
                    mime_type,
                })
            }
        }
        self
    }

    /// Document a JSON response for `code`.
    pub fn returns(
        &mut self,
        code: impl ToString,
        schema: impl Into<SchemaRef>,
        description: impl Into<String>,
    ) -> &mut Self {
        self.returns_as(code, Some(schema.into()), description, "application/json")
    }

    pub fn returns_as(
        &mut self,
        code: impl ToString,
        schema: Option<SchemaRef>,
        description: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> &mut Self {
        let spec = ReturnSpec {
            code: code.to_string(),
            schema,
            description: description.into(),
            mime_type: mime_type.into(),
        };
        upsert(&mut self.returns, spec, |a, b| a.code == b.code);
        self
    }

    pub fn parameter(
        &mut self,
        name: impl Into<String>,
        schema: impl Into<SchemaRef>,
        description: impl Into<String>,
    ) -> &mut Self {
        let spec = param_spec(name, schema, description);
        upsert(&mut self.parameters, spec, |a, b| a.name == b.name);
        self
    }

    pub fn query(
        &mut self,
        name: impl Into<String>,
        schema: impl Into<SchemaRef>,
        description: impl Into<String>,
    ) -> &mut Self {
        let spec = param_spec(name, schema, description);
        upsert(&mut self.query, spec, |a, b| a.name == b.name);
        self
    }

    pub fn version(&mut self, version: impl Into<String>) -> &mut Self {
        self.versions.get_or_insert_with(Vec::new).push(version.into());
        self
    }

    pub fn versions<I, S>(&mut self, versions: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.versions = Some(versions.into_iter().map(Into::into).collect());
        self
    }

    /// Bind argument `position` to `source`, replacing an earlier binding of
    /// the same position.
    pub fn bind(&mut self, position: usize, source: ArgSource, key: Option<&str>) -> &mut Self {
        let binding = ArgBinding {
            position,
            source,
            key: key.map(str::to_string),
        };
        upsert(&mut self.args, binding, |a, b| a.position == b.position);
        self
    }

    pub fn body(&mut self, position: usize) -> &mut Self {
        self.bind(position, ArgSource::Body, None)
    }

    pub fn body_key(&mut self, position: usize, key: &str) -> &mut Self {
        self.bind(position, ArgSource::Body, Some(key))
    }

    /// Keep the payload unparsed and bind it to `position`.
    pub fn raw_body(&mut self, position: usize) -> &mut Self {
        self.raw_body = true;
        self.bind(position, ArgSource::RawBody, None)
    }

    pub fn query_arg(&mut self, position: usize, key: Option<&str>) -> &mut Self {
        self.bind(position, ArgSource::Query, key)
    }

    pub fn header(&mut self, position: usize, name: &str) -> &mut Self {
        self.bind(position, ArgSource::Header, Some(name))
    }

    pub fn param(&mut self, position: usize, name: &str) -> &mut Self {
        self.bind(position, ArgSource::Param, Some(name))
    }

    pub fn request(&mut self, position: usize) -> &mut Self {
        self.bind(position, ArgSource::Request, None)
    }

    pub fn response(&mut self, position: usize) -> &mut Self {
        self.bind(position, ArgSource::Response, None)
    }

    pub fn inject(&mut self, position: usize, injector: &str) -> &mut Self {
        self.bind(position, ArgSource::Injector(injector.to_string()), None)
    }

    pub fn handler<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        self.handler = Some(handler(f));
        self
    }

    /// Fold a later fragment for the same method into this one: set fields
    /// overwrite, keyed lists (`returns`, `parameters`, `query`, argument
    /// positions) are upserted.
    pub fn merge(&mut self, other: MethodMeta) {
        if other.verb.is_some() {
            self.verb = other.verb;
        }
        if other.route.is_some() {
            self.route = other.route;
        }
        if other.title.is_some() {
            self.title = other.title;
        }
        if other.description.is_some() {
            self.description = other.description;
        }
        if other.access.is_some() {
            self.access = other.access;
        }
        if other.accepts.is_some() {
            self.accepts = other.accepts;
        }
        if other.versions.is_some() {
            self.versions = other.versions;
        }
        if other.handler.is_some() {
            self.handler = other.handler;
        }
        self.raw_body |= other.raw_body;
        for spec in other.returns {
            upsert(&mut self.returns, spec, |a, b| a.code == b.code);
        }
        for spec in other.parameters {
            upsert(&mut self.parameters, spec, |a, b| a.name == b.name);
        }
        for spec in other.query {
            upsert(&mut self.query, spec, |a, b| a.name == b.name);
        }
        for binding in other.args {
            upsert(&mut self.args, binding, |a, b| a.position == b.position);
        }
    }
}

fn param_spec(
    name: impl Into<String>,
    schema: impl Into<SchemaRef>,
    description: impl Into<String>,
) -> ParamSpec {
    let description = description.into();
    ParamSpec {
        name: name.into(),
        schema: Some(schema.into()),
        description: (!description.is_empty()).then_some(description),
    }
}

/// Metadata of one controller: its own fields plus its methods.
#[derive(Debug, Clone, Default)]
pub struct ControllerMeta {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub prefix: Option<String>,
    pub root: bool,
    pub versions: Option<Vec<String>>,
    pub access: Option<Access>,
    pub parameters: Vec<ParamSpec>,
    pub methods: Vec<MethodMeta>,
}

impl ControllerMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn title(&mut self, title: impl Into<String>) -> &mut Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    /// Path prefix of every method. A `root` prefix is mounted as-is instead
    /// of below `/{version}`.
    pub fn prefix(&mut self, prefix: impl Into<String>, root: bool) -> &mut Self {
        self.prefix = Some(prefix.into());
        self.root = root;
        self
    }

    pub fn version(&mut self, version: impl Into<String>) -> &mut Self {
        self.versions.get_or_insert_with(Vec::new).push(version.into());
        self
    }

    pub fn versions<I, S>(&mut self, versions: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.versions = Some(versions.into_iter().map(Into::into).collect());
        self
    }

    pub fn access(&mut self, access: impl Into<Access>) -> &mut Self {
        self.access = Some(access.into());
        self
    }

    /// Path parameter shared by every method (declared in the prefix).
    pub fn parameter(
        &mut self,
        name: impl Into<String>,
        schema: impl Into<SchemaRef>,
        description: impl Into<String>,
    ) -> &mut Self {
        let spec = param_spec(name, schema, description);
        upsert(&mut self.parameters, spec, |a, b| a.name == b.name);
        self
    }

    /// Metadata of method `name`, created on first use.
    pub fn method(&mut self, name: &str) -> &mut MethodMeta {
        let index = match self.methods.iter().position(|m| m.name == name) {
            Some(index) => index,
            None => {
                self.methods.push(MethodMeta::new(name));
                self.methods.len() - 1
            }
        };
        &mut self.methods[index]
    }

    /// Attach a pre-built method fragment, merging it into an existing
    /// method of the same name.
    pub fn attach(&mut self, fragment: MethodMeta) -> &mut Self {
        match self.methods.iter_mut().find(|m| m.name == fragment.name) {
            Some(existing) => existing.merge(fragment),
            None => self.methods.push(fragment),
        }
        self
    }
}
