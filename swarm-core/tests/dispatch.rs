use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use http_body_util::BodyExt;
use serde_json::{json, Value};
use swarm_core::http::{Body, HeaderMap, HttpRequest, Router, StatusCode, CONTENT_TYPE};
use swarm_core::prelude::*;
use swarm_core::SwarmApp;
use tower::ServiceExt;

struct Pets;

impl Controller for Pets {
    fn describe(meta: &mut ControllerMeta) {
        meta.title("Pets").prefix("/pets", false).versions(["v1", "v2"]);

        meta.method("show")
            .get("/:id")
            .param(0, "id")
            .query_arg(1, Some("verbose"))
            .header(2, "x-trace")
            .handler(|args: Args| async move {
                Ok(json!({
                    "id": args.str(0),
                    "verbose": args.value(1),
                    "trace": args.str(2),
                }))
            });

        meta.method("create")
            .post("/")
            .access("pets:write")
            .body(0)
            .body_key(1, "name")
            .handler(|args: Args| async move {
                Ok(json!({ "created": args.value(0), "name": args.str(1) }))
            });

        meta.method("upload")
            .post("/upload")
            .raw_body(0)
            .handler(|args: Args| async move {
                let size = args.raw(0).map_or(0, |bytes| bytes.len());
                Ok(json!({ "size": size }))
            });

        meta.method("owner")
            .get("/:id/owner")
            .version("v2")
            .inject(0, "user")
            .param(1, "id")
            .handler(|args: Args| async move {
                Ok(json!({ "user": args.value(0), "pet": args.str(1) }))
            });

        meta.method("banner")
            .get("/banner")
            .response(0)
            .handler(|args: Args| async move {
                if let Some(reply) = args.response(0) {
                    reply.status(StatusCode::CREATED).content_type("text/plain");
                }
                Ok(json!("hello"))
            });

        meta.method("missing")
            .get("/missing")
            .handler(|_| async { Err(ApiError::NotFound("No such pet".into())) });

        meta.method("owned")
            .get("/owned/:id")
            .access("pet:{id}")
            .handler(|_| async { Ok(json!({ "ok": true })) });
    }
}

fn scopes_from_header(request: &Request) -> Option<Vec<String>> {
    request
        .header("x-scopes")
        .map(|s| s.split(',').map(|scope| scope.trim().to_string()).collect())
}

fn swarm() -> Swarm {
    Swarm::new(SwarmOptions::default().title("Pets"))
        .controller::<Pets>()
        .with_scope_provider(scopes_from_header)
        .with_injector(injector("user", |request: &Request| {
            request.header("x-user").map(|user| json!(user))
        }))
}

async fn app() -> SwarmApp {
    swarm().build_app().await.unwrap()
}

async fn send(router: &Router, request: HttpRequest<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, body)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = HttpRequest::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, _, body) = send(router, request).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn post(uri: &str, content_type: &str, body: &str) -> HttpRequest<Body> {
    HttpRequest::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn binds_path_query_and_header_arguments() {
    let app = app().await;
    let request = HttpRequest::builder()
        .uri("/v1/pets/rex%20jr?verbose=yes")
        .header("x-trace", "abc")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app.router(), request).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({ "id": "rex jr", "verbose": "yes", "trace": "abc" }));
}

#[tokio::test]
async fn every_version_gets_a_route() {
    let app = app().await;
    assert_eq!(get(app.router(), "/v1/pets/a").await.0, StatusCode::OK);
    assert_eq!(get(app.router(), "/v2/pets/a").await.0, StatusCode::OK);
    assert_eq!(get(app.router(), "/v3/pets/a").await.0, StatusCode::NOT_FOUND);

    // `owner` only exists in v2.
    assert_eq!(get(app.router(), "/v1/pets/a/owner").await.0, StatusCode::NOT_FOUND);
    let urls: Vec<&str> = app
        .routes()
        .iter()
        .filter(|r| r.operation_id == "Pets@show")
        .map(|r| r.url.as_str())
        .collect();
    assert_eq!(urls, vec!["/v1/pets/:id", "/v2/pets/:id"]);
    let health: Vec<_> = app
        .routes()
        .iter()
        .filter(|r| r.operation_id == "Health@healthy")
        .collect();
    assert_eq!(health.len(), 1);
    assert_eq!(health[0].url, "/health");
}

#[tokio::test]
async fn access_is_checked_before_the_handler() {
    let app = app().await;

    let (status, _, body) = send(app.router(), post("/v1/pets", "application/json", "{}")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].is_string());

    let mut request = post("/v1/pets", "application/json", r#"{"name":"Rex"}"#);
    request.headers_mut().insert("x-scopes", "pets:read".parse().unwrap());
    assert_eq!(send(app.router(), request).await.0, StatusCode::FORBIDDEN);

    let mut request = post("/v1/pets", "application/json", r#"{"name":"Rex"}"#);
    request.headers_mut().insert("x-scopes", "pets:read, pets:write".parse().unwrap());
    let (status, _, body) = send(app.router(), request).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({ "created": { "name": "Rex" }, "name": "Rex" }));
}

#[tokio::test]
async fn access_scopes_expand_path_parameters() {
    let app = app().await;
    let request = |scopes: &str| {
        HttpRequest::builder()
            .uri("/v1/pets/owned/7")
            .header("x-scopes", scopes)
            .body(Body::empty())
            .unwrap()
    };
    assert_eq!(send(app.router(), request("pet:7")).await.0, StatusCode::OK);
    assert_eq!(send(app.router(), request("pet:8")).await.0, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invalid_json_is_a_bad_request() {
    let app = app().await;
    let mut request = post("/v1/pets", "application/json", "{not json");
    request.headers_mut().insert("x-scopes", "pets:write".parse().unwrap());
    assert_eq!(send(app.router(), request).await.0, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn form_bodies_are_parsed_into_objects() {
    let app = app().await;
    let mut request = post("/v1/pets", "application/x-www-form-urlencoded", "name=Rex&age=3");
    request.headers_mut().insert("x-scopes", "pets:write".parse().unwrap());
    let (status, _, body) = send(app.router(), request).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["created"], json!({ "name": "Rex", "age": "3" }));
}

#[tokio::test]
async fn raw_body_methods_get_the_bytes() {
    let app = app().await;
    let request = post("/v1/pets/upload", "application/json", "{not parsed");
    let (status, _, body) = send(app.router(), request).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({ "size": 11 }));
}

#[tokio::test]
async fn injectors_supply_custom_arguments() {
    let app = app().await;
    let request = HttpRequest::builder()
        .uri("/v2/pets/9/owner")
        .header("x-user", "alice")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app.router(), request).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({ "user": "alice", "pet": "9" }));

    // A miss leaves the argument empty.
    let (status, body) = get(app.router(), "/v2/pets/9/owner").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "user": null, "pet": "9" }));
}

#[tokio::test]
async fn reply_handle_sets_status_and_content_type() {
    let app = app().await;
    let request = HttpRequest::builder().uri("/v1/pets/banner").body(Body::empty()).unwrap();
    let (status, headers, body) = send(app.router(), request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(headers[CONTENT_TYPE], "text/plain");
    assert_eq!(body, b"hello");
}

#[tokio::test]
async fn handler_errors_reach_on_error_and_skip_post_handler() {
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let on_error = seen.clone();
    let post_handler = seen.clone();
    let app = swarm()
        .on(HookPoint::OnError, move |state| {
            let seen = on_error.clone();
            async move {
                if let HookState::Handler(handler) = &state {
                    let error = handler.error.as_ref().map(ToString::to_string).unwrap_or_default();
                    seen.lock().unwrap().push(format!("onError {} {}", handler.method.name, error));
                }
                Ok(state)
            }
        })
        .on(HookPoint::PostHandler, move |state| {
            let seen = post_handler.clone();
            async move {
                seen.lock().unwrap().push("postHandler".to_string());
                Ok(state)
            }
        })
        .build_app()
        .await
        .unwrap();

    let (status, body) = get(app.router(), "/v1/pets/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "No such pet" }));

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].starts_with("onError missing"));
    assert!(seen[0].contains("No such pet"));
}

#[tokio::test]
async fn pipeline_stages_run_in_order() {
    let seen = Arc::new(Mutex::new(Vec::<&'static str>::new()));
    let mut builder = swarm();
    for (point, name) in [
        (HookPoint::PreResponse, "preResponse"),
        (HookPoint::PostHandler, "postHandler"),
        (HookPoint::PreHandler, "preHandler"),
        (HookPoint::PostAccess, "postAccess"),
        (HookPoint::PreAccess, "preAccess"),
    ] {
        let seen = seen.clone();
        builder = builder.on(point, move |state| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(name);
                Ok(state)
            }
        });
    }
    let app = builder
        .on(HookPoint::PreResponse, |state| async move {
            match state {
                HookState::Response(value) => Ok(HookState::Response(json!({ "wrapped": value }))),
                other => Ok(other),
            }
        })
        .build_app()
        .await
        .unwrap();

    let (status, body) = get(app.router(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "wrapped": { "ok": true } }));
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["preAccess", "postAccess", "preHandler", "postHandler", "preResponse"]
    );
}

#[tokio::test]
async fn pre_access_can_rewrite_the_request() {
    let app = swarm()
        .on(HookPoint::PreAccess, |state| async move {
            match state {
                HookState::Request(request) => Ok(HookState::Request(
                    request.with_scopes(["pets:write"]),
                )),
                other => Ok(other),
            }
        })
        .build_app()
        .await
        .unwrap();
    let (status, _, _) = send(app.router(), post("/v1/pets", "application/json", "{}")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn shutdown_rejects_requests_before_any_hook() {
    let pre_access = Arc::new(AtomicUsize::new(0));
    let counter = pre_access.clone();
    let app = swarm()
        .on(HookPoint::PreAccess, move |state| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(state)
            }
        })
        .build_app()
        .await
        .unwrap();

    assert_eq!(get(app.router(), "/health").await.0, StatusCode::OK);
    assert_eq!(pre_access.load(Ordering::SeqCst), 1);

    app.shutdown().await;
    assert!(app.state().is_shutting_down());

    let (status, body) = get(app.router(), "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());
    assert_eq!(get(app.router(), "/v1/pets/1").await.0, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(pre_access.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn pre_shutdown_hooks_are_awaited() {
    let drained = Arc::new(AtomicUsize::new(0));
    let counter = drained.clone();
    let app = swarm()
        .on(HookPoint::PreShutdown, move |state| {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(state)
            }
        })
        .build_app()
        .await
        .unwrap();
    app.shutdown().await;
    assert_eq!(drained.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn register_hooks_run_during_build() {
    let seen = Arc::new(Mutex::new(Vec::<&'static str>::new()));
    let pre = seen.clone();
    let post = seen.clone();
    let _app = swarm()
        .on(HookPoint::PreRegister, move |state| {
            let seen = pre.clone();
            async move {
                seen.lock().unwrap().push("preRegister");
                Ok(state)
            }
        })
        .on(HookPoint::PostRegister, move |state| {
            let seen = post.clone();
            async move {
                seen.lock().unwrap().push("postRegister");
                Ok(state)
            }
        })
        .build_app()
        .await
        .unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["preRegister", "postRegister"]);
}

#[tokio::test]
async fn health_answers_with_and_without_trailing_slash() {
    let app = app().await;
    assert_eq!(get(app.router(), "/health").await, (StatusCode::OK, json!({ "ok": true })));
    assert_eq!(get(app.router(), "/health/").await, (StatusCode::OK, json!({ "ok": true })));
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let app = app().await;
    let (status, body) = get(app.router(), "/nowhere").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("/nowhere"));
}

#[tokio::test]
async fn monitoring_reports_successful_calls() {
    let app = app().await;
    for _ in 0..2 {
        assert_eq!(get(app.router(), "/v1/pets/a").await.0, StatusCode::OK);
    }
    // Failures are not recorded.
    assert_eq!(get(app.router(), "/v1/pets/missing").await.0, StatusCode::NOT_FOUND);

    let (status, body) = get(app.router(), "/__monitoring__/stats/Pets@show").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["global"]["calls"], 2);
    assert!(body["uptime"].is_u64());
    assert_eq!(body["perDay"].as_object().unwrap().len(), 1);

    assert!(app.state().monitor.get("Pets", "missing").is_none());

    let (status, body) = get(app.router(), "/__monitoring__/stats/all?days=0").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["global"]["calls"].as_u64().unwrap() >= 2);

    let (status, _) = get(app.router(), "/__monitoring__/stats/all?days=soon").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn monitoring_can_be_disabled_or_gated() {
    let app = Swarm::new(SwarmOptions::default().monitor(false))
        .build_app()
        .await
        .unwrap();
    assert_eq!(
        get(app.router(), "/__monitoring__/stats/all").await.0,
        StatusCode::NOT_FOUND
    );

    let app = Swarm::new(SwarmOptions::default().monitor_access("admin"))
        .with_scope_provider(scopes_from_header)
        .build_app()
        .await
        .unwrap();
    assert_eq!(
        get(app.router(), "/__monitoring__/stats/all").await.0,
        StatusCode::FORBIDDEN
    );
}
