use serde_json::{json, Map, Value};
use swarm_core::controller::{ControllerDescriptor, MethodDescriptor};
use swarm_core::meta::ParamSpec;
use swarm_core::options::{AuthScheme, OAuth2Flow};
use swarm_core::transport::axum_path;
use swarm_core::{AppState, SchemaTable, SwarmOptions};

/// `components.securitySchemes.auth` for the configured scheme.
pub fn security_scheme(auth: &AuthScheme) -> Value {
    match auth {
        AuthScheme::Basic => json!({ "type": "http", "scheme": "basic" }),
        AuthScheme::Bearer { format } => {
            let mut scheme = json!({ "type": "http", "scheme": "bearer" });
            if let Some(format) = format {
                scheme["bearerFormat"] = json!(format);
            }
            scheme
        }
        AuthScheme::ApiKey { location, name } => {
            json!({ "type": "apiKey", "in": location.as_str(), "name": name })
        }
        AuthScheme::OpenIdConnect { url } => {
            json!({ "type": "openIdConnect", "openIdConnectUrl": url })
        }
        AuthScheme::OAuth2 {
            flow,
            authorization_url,
            token_url,
            refresh_url,
            scopes,
        } => {
            let mut settings = Map::new();
            // The implicit grant has no token endpoint, the password and
            // client credential grants have no authorization endpoint.
            if matches!(flow, OAuth2Flow::AuthorizationCode | OAuth2Flow::Implicit) {
                if let Some(url) = authorization_url {
                    settings.insert("authorizationUrl".into(), json!(url));
                }
            }
            if !matches!(flow, OAuth2Flow::Implicit) {
                if let Some(url) = token_url {
                    settings.insert("tokenUrl".into(), json!(url));
                }
            }
            if let Some(url) = refresh_url {
                settings.insert("refreshUrl".into(), json!(url));
            }
            settings.insert("scopes".into(), json!(scopes));
            json!({ "type": "oauth2", "flows": { flow.as_str(): settings } })
        }
    }
}

fn parameter(spec: &ParamSpec, location: &str, required: bool, table: &SchemaTable) -> Value {
    let mut param = Map::new();
    param.insert("name".into(), json!(spec.name));
    param.insert("in".into(), json!(location));
    if let Some(description) = &spec.description {
        param.insert("description".into(), json!(description));
    }
    if let Some(schema) = spec.schema.as_ref().and_then(|s| table.resolve_for_docs(s)) {
        param.insert("schema".into(), schema);
    }
    param.insert("required".into(), json!(required));
    Value::Object(param)
}

fn media(mime_type: &str, schema: Option<Value>) -> Value {
    let mut content = Map::new();
    content.insert(
        mime_type.to_string(),
        match schema {
            Some(schema) => json!({ "schema": schema }),
            None => json!({}),
        },
    );
    Value::Object(content)
}

/// The path item operation of one method.
pub fn operation(
    controller: &ControllerDescriptor,
    method: &MethodDescriptor,
    table: &SchemaTable,
) -> Value {
    let mut op = Map::new();
    op.insert("tags".into(), json!([controller.display_name()]));
    if let Some(title) = &method.title {
        op.insert("summary".into(), json!(title));
    }
    if let Some(description) = &method.description {
        op.insert("description".into(), json!(description));
    }
    op.insert("operationId".into(), json!(method.operation_id(controller)));

    if let Some(access) = method.effective_access(controller) {
        op.insert("security".into(), json!([{ "auth": access }]));
    }

    let parameters: Vec<Value> = controller
        .parameters
        .iter()
        .chain(method.parameters.iter())
        .map(|spec| parameter(spec, "path", true, table))
        .chain(
            method
                .query
                .iter()
                .map(|spec| parameter(spec, "query", false, table)),
        )
        .collect();
    op.insert("parameters".into(), json!(parameters));

    if let Some(accepts) = method.accepts.as_ref().filter(|_| method.verb.has_body()) {
        let mut schemas: Vec<Value> = accepts
            .schemas
            .iter()
            .filter_map(|s| table.resolve_for_docs(s))
            .collect();
        let schema = match schemas.len() {
            0 => None,
            1 => schemas.pop(),
            _ => Some(json!({ "allOf": schemas })),
        };
        op.insert(
            "requestBody".into(),
            json!({ "required": true, "content": media(&accepts.mime_type, schema) }),
        );
    }

    let responses: Map<String, Value> = method
        .returns
        .iter()
        .map(|ret| {
            let schema = ret.schema.as_ref().and_then(|s| table.resolve_for_docs(s));
            (
                ret.code.clone(),
                json!({
                    "description": ret.description,
                    "content": media(&ret.mime_type, schema),
                }),
            )
        })
        .collect();
    op.insert("responses".into(), Value::Object(responses));

    Value::Object(op)
}

fn header(options: &SwarmOptions, version: &str, table: &SchemaTable) -> Map<String, Value> {
    let mut components = Map::new();
    components.insert("schemas".into(), Value::Object(table.components()));
    if let Some(auth) = &options.auth {
        components.insert("securitySchemes".into(), json!({ "auth": security_scheme(auth) }));
    }

    let servers: Vec<Value> = options
        .servers
        .iter()
        .map(|server| match &server.description {
            Some(description) => json!({ "url": server.url, "description": description }),
            None => json!({ "url": server.url }),
        })
        .collect();

    let mut doc = Map::new();
    doc.insert("openapi".into(), json!("3.0.0"));
    doc.insert(
        "info".into(),
        json!({
            "title": options.title,
            "description": options.description,
            "version": version,
        }),
    );
    doc.insert("servers".into(), json!(servers));
    doc.insert("components".into(), Value::Object(components));
    doc
}

/// Build the OpenAPI document of `version`.
///
/// Every controller becomes a tag. Methods are listed when their versions
/// include `version`; root controllers are listed whatever the version.
pub fn build_document(state: &AppState, version: &str) -> Value {
    let table = &state.schemas;
    let mut doc = header(&state.options, version, table);
    let mut paths = Map::new();
    let mut tags = Vec::new();

    for controller in state.controllers.list() {
        let mut tag = Map::new();
        tag.insert("name".into(), json!(controller.display_name()));
        if let Some(description) = &controller.description {
            tag.insert("description".into(), json!(description));
        }
        tags.push(Value::Object(tag));

        for method in &controller.methods {
            if !controller.root && !method.versions.iter().any(|v| v == version) {
                continue;
            }
            let path = axum_path(&method.url(controller, version));
            let item = paths.entry(path).or_insert_with(|| json!({}));
            if let Some(item) = item.as_object_mut() {
                item.insert(
                    method.verb.lowercase().to_string(),
                    operation(controller, method, table),
                );
            }
        }
    }

    doc.insert("paths".into(), Value::Object(paths));
    doc.insert("tags".into(), Value::Array(tags));
    Value::Object(doc)
}
