use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use swarm_core::{ApiError, HookPoint, HookState, Hooks};

fn response(state: HookState) -> Value {
    match state {
        HookState::Response(value) => value,
        other => panic!("expected a response state, got {}", other.kind()),
    }
}

#[tokio::test]
async fn handlers_run_in_registration_order() {
    let mut hooks = Hooks::new();
    hooks.add(HookPoint::PreResponse, |state| async move {
        let value = response(state);
        Ok(HookState::Response(json!(format!("{}1", value.as_str().unwrap_or_default()))))
    });
    hooks.add(HookPoint::PreResponse, |state| async move {
        let value = response(state);
        Ok(HookState::Response(json!(format!("{}2", value.as_str().unwrap_or_default()))))
    });

    let out = hooks
        .run(HookPoint::PreResponse, HookState::Response(json!("x")))
        .await
        .unwrap();
    assert_eq!(response(out), json!("x12"));
}

#[tokio::test]
async fn empty_chain_returns_input() {
    let hooks = Hooks::new();
    assert!(hooks.is_empty());
    let out = hooks
        .run(HookPoint::PreResponse, HookState::Response(json!({ "a": 1 })))
        .await
        .unwrap();
    assert_eq!(response(out), json!({ "a": 1 }));
}

#[tokio::test]
async fn chains_are_per_point() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut hooks = Hooks::new();
    let counter = calls.clone();
    hooks.add(HookPoint::PostAccess, move |state| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(state)
        }
    });

    hooks.run(HookPoint::PreShutdown, HookState::None).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    hooks.run(HookPoint::PostAccess, HookState::None).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(hooks.len(HookPoint::PostAccess), 1);
    assert_eq!(hooks.len(HookPoint::PreShutdown), 0);
}

#[tokio::test]
async fn first_error_stops_the_chain() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut hooks = Hooks::new();
    hooks.add(HookPoint::PreListen, |_| async {
        Err(ApiError::Internal("not ready".into()))
    });
    let counter = calls.clone();
    hooks.add(HookPoint::PreListen, move |state| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(state)
        }
    });

    let err = hooks.run(HookPoint::PreListen, HookState::None).await.unwrap_err();
    assert_eq!(err.to_string(), ApiError::Internal("not ready".into()).to_string());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn hook_point_names() {
    let names: Vec<&str> = HookPoint::ALL.iter().map(HookPoint::as_str).collect();
    assert_eq!(
        names,
        vec![
            "preRegister",
            "postRegister",
            "preListen",
            "postListen",
            "preAccess",
            "postAccess",
            "preHandler",
            "onError",
            "postHandler",
            "preResponse",
            "preShutdown",
        ]
    );
}
