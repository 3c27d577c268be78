//! The `Swagger` controller: the OpenAPI document and a Swagger UI page per
//! API version.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{json, Value};
use swarm_core::{ApiError, AppState, Args, ControllerMeta, Request, SwarmOptions};
use tracing::debug;

use crate::builder::build_document;

/// Built documents, one per version. The registry is frozen once the
/// application is built, so a document never goes stale.
#[derive(Debug, Default)]
pub struct DocumentCache {
    documents: DashMap<String, Arc<Value>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The document of `version`, built on first request. `None` when no
    /// controller serves that version.
    pub fn get_or_build(&self, state: &AppState, version: &str) -> Option<Arc<Value>> {
        if let Some(document) = self.documents.get(version) {
            return Some(document.clone());
        }
        if !state.controllers.has_version(version) {
            return None;
        }
        debug!(version, "Building OpenAPI document");
        let document = self
            .documents
            .entry(version.to_string())
            .or_insert_with(|| Arc::new(build_document(state, version)))
            .clone();
        Some(document)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn unknown_version(version: &str) -> ApiError {
    debug!(version, "Documentation requested for an unknown version");
    ApiError::NotFound("Unknown API version".into())
}

/// The `version` path parameter, checked against the registry.
fn requested_version(request: &Request, default_version: &str) -> Result<String, ApiError> {
    let version = request
        .params
        .get("version")
        .cloned()
        .unwrap_or_else(|| default_version.to_string());
    if request.app()?.controllers.has_version(&version) {
        Ok(version)
    } else {
        Err(unknown_version(&version))
    }
}

fn request_arg(args: &Args) -> Result<&Arc<Request>, ApiError> {
    args.request(0)
        .ok_or_else(|| ApiError::Internal("missing request argument".into()))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn swagger_page(assets: &str, version: &str) -> String {
    let assets = escape_html(assets);
    let version = escape_html(version);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8">
    <title>Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="{assets}/swagger-ui.css" />
    <link rel="stylesheet" type="text/css" href="{assets}/index.css" />
    <link rel="icon" type="image/png" href="{assets}/favicon-32x32.png" sizes="32x32" />
    <link rel="icon" type="image/png" href="{assets}/favicon-16x16.png" sizes="16x16" />
  </head>
  <body>
    <div id="swagger-ui"></div>
    <script src="{assets}/swagger-ui-bundle.js" charset="UTF-8"></script>
    <script src="{assets}/swagger-ui-standalone-preset.js" charset="UTF-8"></script>
    <script src="/{version}/swagger-initializer.js" charset="UTF-8"></script>
  </body>
</html>
"#
    )
}

fn swagger_initializer(document_path: &str, version: &str) -> String {
    let url = Value::String(format!("/{version}/{document_path}"));
    format!(
        r#"window.onload = function() {{
  window.ui = SwaggerUIBundle({{
    url: {url},
    dom_id: '#swagger-ui',
    deepLinking: true,
    presets: [
      SwaggerUIBundle.presets.apis,
      SwaggerUIStandalonePreset
    ],
    plugins: [
      SwaggerUIBundle.plugins.DownloadUrl
    ],
    layout: "StandaloneLayout"
  }});
}};
"#
    )
}

/// Metadata of the documentation controller.
///
/// Mounted at the root: `GET /{version}/{documentation_path}` returns the
/// document, `GET /{version}` the Swagger UI page and
/// `GET /{version}/swagger-initializer.js` its bootstrap script. The UI
/// assets are loaded from `assets_url`. Access is gated by
/// `documentation_access`.
pub fn docs_controller(options: &SwarmOptions, assets_url: &str) -> ControllerMeta {
    let cache = Arc::new(DocumentCache::new());
    let default_version = options.default_version.clone();
    let document_path = options.documentation_path.clone();
    let assets = assets_url.trim_end_matches('/').to_string();

    let mut meta = ControllerMeta::new("Swagger");
    meta.title("Swagger")
        .description("Handles API documentation display")
        .prefix("/", true);
    if let Some(access) = &options.documentation_access {
        meta.access(access.clone());
    }

    let version_param = json!({ "type": "string" });
    let version_help = format!("The API version, defaults to : {default_version}");

    let file_version = default_version.clone();
    meta.method("getSwaggerFile")
        .get(format!("/:version/{document_path}"))
        .title("Get Swagger documentation file")
        .parameter("version", version_param.clone(), version_help.clone())
        .returns(
            200,
            json!({ "type": "object", "additionalProperties": true }),
            "Swagger JSON file",
        )
        .request(0)
        .handler(move |args: Args| {
            let cache = cache.clone();
            let file_version = file_version.clone();
            async move {
                let request = request_arg(&args)?;
                let version = requested_version(request, &file_version)?;
                let document = cache
                    .get_or_build(request.app()?, &version)
                    .ok_or_else(|| unknown_version(&version))?;
                Ok(Value::clone(&document))
            }
        });

    let page_version = default_version.clone();
    meta.method("getSwaggerUi")
        .get("/:version")
        .title("Get Swagger UI")
        .parameter("version", version_param.clone(), version_help.clone())
        .returns_as(200, Some(json!({ "type": "string" }).into()), "Swagger UI HTML code", "text/html")
        .request(0)
        .response(1)
        .handler(move |args: Args| {
            let assets = assets.clone();
            let page_version = page_version.clone();
            async move {
                let version = requested_version(request_arg(&args)?, &page_version)?;
                let page = swagger_page(&assets, &version);
                if let Some(reply) = args.response(1) {
                    reply.content_type("text/html; charset=utf-8");
                }
                Ok(Value::String(page))
            }
        });

    meta.method("getInitializerFile")
        .get("/:version/swagger-initializer.js")
        .title("Get Swagger UI initializer")
        .parameter("version", version_param, version_help)
        .returns_as(
            200,
            Some(json!({ "type": "string" }).into()),
            "Swagger UI initialization script",
            "text/javascript",
        )
        .request(0)
        .response(1)
        .handler(move |args: Args| {
            let document_path = document_path.clone();
            let default_version = default_version.clone();
            async move {
                let version = requested_version(request_arg(&args)?, &default_version)?;
                let script = swagger_initializer(&document_path, &version);
                if let Some(reply) = args.response(1) {
                    reply.content_type("text/javascript");
                }
                Ok(Value::String(script))
            }
        });

    meta
}
