use std::sync::Arc;

use http_body_util::BodyExt;
use serde_json::{json, Value};
use swarm_core::http::{Body, HeaderMap, HttpRequest, Router, CONTENT_TYPE};
use swarm_core::prelude::*;
use swarm_openapi::{DocumentCache, OpenApiPlugin};
use tower::ServiceExt;

struct Pets;

impl Controller for Pets {
    fn describe(meta: &mut ControllerMeta) {
        meta.prefix("/pets", false).versions(["v1", "v2"]);
        meta.method("list")
            .get("/")
            .handler(|_| async { Ok(json!([])) });
    }
}

async fn router(options: SwarmOptions) -> Router {
    Swarm::new(options)
        .with(OpenApiPlugin::new())
        .controller::<Pets>()
        .with_scope_provider(|request: &Request| {
            request
                .header("x-scopes")
                .map(|s| s.split(',').map(str::to_string).collect::<Vec<_>>())
        })
        .build()
        .await
        .unwrap()
}

async fn get(router: &Router, uri: &str, scopes: Option<&str>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let mut builder = HttpRequest::builder().uri(uri);
    if let Some(scopes) = scopes {
        builder = builder.header("x-scopes", scopes);
    }
    let response = router
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, body)
}

fn content_type(headers: &HeaderMap) -> &str {
    headers.get(CONTENT_TYPE).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn serves_the_document_of_each_version() {
    let router = router(SwarmOptions::default().title("Pets")).await;

    let (status, headers, body) = get(&router, "/v1/swagger.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type(&headers).starts_with("application/json"));
    let doc: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(doc["info"]["version"], "v1");
    assert!(doc["paths"].get("/v1/pets").is_some());
    assert!(doc["paths"].get("/{version}/swagger.json").is_some());
    assert!(doc["tags"].as_array().unwrap().iter().any(|tag| tag["name"] == "Swagger"));

    let (_, _, body) = get(&router, "/v2/swagger.json", None).await;
    let doc: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(doc["info"]["version"], "v2");
    assert!(doc["paths"].get("/v2/pets").is_some());
    assert!(doc["paths"].get("/v1/pets").is_none());
}

#[tokio::test]
async fn document_path_is_configurable() {
    let router = router(SwarmOptions::default().documentation_path("/openapi.json")).await;

    assert_eq!(get(&router, "/v1/openapi.json", None).await.0, StatusCode::OK);
    assert_eq!(get(&router, "/v1/swagger.json", None).await.0, StatusCode::NOT_FOUND);

    let (_, _, body) = get(&router, "/v1/swagger-initializer.js", None).await;
    assert!(String::from_utf8(body).unwrap().contains(r#"url: "/v1/openapi.json""#));
}

#[tokio::test]
async fn serves_the_swagger_ui_page() {
    let router = router(SwarmOptions::default()).await;

    let (status, headers, body) = get(&router, "/v2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type(&headers).starts_with("text/html"));
    let page = String::from_utf8(body).unwrap();
    assert!(page.contains(r#"href="/swagger/swagger-ui.css""#));
    assert!(page.contains(r#"src="/v2/swagger-initializer.js""#));
}

#[tokio::test]
async fn serves_the_initializer_script() {
    let router = router(SwarmOptions::default()).await;

    let (status, headers, body) = get(&router, "/v1/swagger-initializer.js", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type(&headers), "text/javascript");
    let script = String::from_utf8(body).unwrap();
    assert!(script.contains(r#"url: "/v1/swagger.json""#));
    assert!(script.contains("dom_id: '#swagger-ui'"));
}

#[tokio::test]
async fn assets_url_is_configurable() {
    let router = Swarm::new(SwarmOptions::default())
        .with(OpenApiPlugin::new().assets_url("https://cdn.example.com/swagger-ui/"))
        .build()
        .await
        .unwrap();

    let (_, _, body) = get(&router, "/v1", None).await;
    let page = String::from_utf8(body).unwrap();
    assert!(page.contains(r#"src="https://cdn.example.com/swagger-ui/swagger-ui-bundle.js""#));
}

#[tokio::test]
async fn documentation_access_gates_every_docs_route() {
    let router = router(SwarmOptions::default().documentation_access("docs")).await;

    for uri in ["/v1/swagger.json", "/v1", "/v1/swagger-initializer.js"] {
        assert_eq!(get(&router, uri, None).await.0, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(get(&router, uri, Some("other")).await.0, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(get(&router, uri, Some("docs")).await.0, StatusCode::OK, "{uri}");
    }

    let (_, _, body) = get(&router, "/v1/swagger.json", Some("docs")).await;
    let doc: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        doc["paths"]["/{version}/swagger.json"]["get"]["security"],
        json!([{ "auth": ["docs"] }])
    );
}

#[tokio::test]
async fn documents_are_built_once_per_version() {
    let app = Swarm::new(SwarmOptions::default())
        .controller::<Pets>()
        .build_app()
        .await
        .unwrap();
    let cache = DocumentCache::new();

    let first = cache.get_or_build(app.state(), "v1").unwrap();
    let again = cache.get_or_build(app.state(), "v1").unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(cache.len(), 1);

    assert!(cache.get_or_build(app.state(), "v2").is_some());
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn unknown_versions_are_not_cached() {
    let app = Swarm::new(SwarmOptions::default())
        .controller::<Pets>()
        .build_app()
        .await
        .unwrap();
    let cache = DocumentCache::new();

    for i in 0..20 {
        assert!(cache.get_or_build(app.state(), &format!("junk{i}")).is_none());
    }
    assert!(cache.is_empty());
}

#[tokio::test]
async fn unknown_versions_are_not_found() {
    let router = router(SwarmOptions::default()).await;

    for uri in ["/v3/swagger.json", "/v3", "/v3/swagger-initializer.js", "/junk0/swagger.json"] {
        assert_eq!(get(&router, uri, None).await.0, StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn markup_in_the_version_is_never_echoed() {
    let router = router(SwarmOptions::default()).await;

    let (status, _, body) = get(&router, "/%3Cimg%20src%3Dx%20onerror%3Dalert(1)%3E", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body = String::from_utf8(body).unwrap();
    assert!(!body.contains("<img"));
}

struct Pages;

impl Controller for Pages {
    fn describe(meta: &mut ControllerMeta) {
        meta.prefix("/", true);
        meta.method("page")
            .get("/:slug")
            .param(0, "slug")
            .handler(|args: Args| async move { Ok(json!({ "page": args.str(0) })) });
    }
}

#[tokio::test]
async fn root_routes_may_overlap_the_docs_routes() {
    let router = Swarm::new(SwarmOptions::default())
        .with(OpenApiPlugin::new())
        .controller::<Pets>()
        .controller::<Pages>()
        .build()
        .await
        .unwrap();

    let (status, _, body) = get(&router, "/about", None).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["page"], "about");

    assert_eq!(get(&router, "/v1/swagger.json", None).await.0, StatusCode::OK);
    assert_eq!(get(&router, "/v1/swagger-initializer.js", None).await.0, StatusCode::OK);
}
