use std::collections::HashMap;

use swarm_core::guards::{check_access, expand_scope};
use swarm_core::{Access, ApiError};

fn scopes(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn allowed(caller: Option<&[&str]>, required: Option<Access>) -> bool {
    let caller = caller.map(scopes);
    check_access(caller.as_deref(), required.as_ref(), &HashMap::new()).is_ok()
}

#[test]
fn public_endpoint_allows_everyone() {
    assert!(allowed(None, None));
    assert!(allowed(Some(&["a"]), None));
}

#[test]
fn unauthenticated_caller_is_denied_even_for_empty_requirement() {
    assert!(!allowed(None, Some(Access::authenticated())));
    assert!(!allowed(None, Some(Access::from("a"))));
}

#[test]
fn empty_requirement_allows_any_authenticated_caller() {
    assert!(allowed(Some(&["a"]), Some(Access::authenticated())));
    assert!(allowed(Some(&[]), Some(Access::authenticated())));
}

#[test]
fn any_required_scope_is_enough() {
    assert!(!allowed(Some(&["a"]), Some(Access::from("b"))));
    assert!(allowed(Some(&["a", "b"]), Some(Access::from("b"))));
    assert!(allowed(Some(&["b"]), Some(Access::from(["a", "b"]))));
    assert!(!allowed(Some(&["c"]), Some(Access::from(["a", "b"]))));
}

#[test]
fn denial_is_forbidden() {
    let err = check_access(Some(&scopes(&["a"])), Some(&Access::from("b")), &HashMap::new())
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
    assert_eq!(err.status(), 403);

    let err = check_access(None, Some(&Access::authenticated()), &HashMap::new()).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}

#[test]
fn required_scopes_are_expanded_with_path_params() {
    let mut params = HashMap::new();
    params.insert("id".to_string(), "42".to_string());
    let required = Access::from("user:{id}");

    assert!(check_access(Some(&scopes(&["user:42"])), Some(&required), &params).is_ok());
    assert!(check_access(Some(&scopes(&["user:7"])), Some(&required), &params).is_err());
    // The literal template is not a wildcard.
    assert!(check_access(Some(&scopes(&["user:{id}"])), Some(&required), &params).is_err());
}

#[test]
fn expand_scope_keeps_unknown_tokens() {
    let mut params = HashMap::new();
    params.insert("org".to_string(), "acme".to_string());
    assert_eq!(expand_scope("org:{org}:{team}", &params), "org:acme:{team}");
    assert_eq!(expand_scope("plain", &params), "plain");
}

#[test]
fn substituted_values_are_not_expanded_again() {
    let mut params = HashMap::new();
    params.insert("org".to_string(), "{user}".to_string());
    params.insert("user".to_string(), "acme".to_string());
    let required = Access::from("org:{org}");

    for _ in 0..50 {
        assert_eq!(expand_scope("org:{org}", &params), "org:{user}");
        assert!(check_access(Some(&scopes(&["org:acme"])), Some(&required), &params).is_err());
    }
    assert!(check_access(Some(&scopes(&["org:{user}"])), Some(&required), &params).is_ok());
}

#[test]
fn expand_scope_handles_adjacent_and_unterminated_tokens() {
    let mut params = HashMap::new();
    params.insert("a".to_string(), "1".to_string());
    params.insert("b".to_string(), "2".to_string());
    assert_eq!(expand_scope("{a}{b}:{a}", &params), "12:1");
    assert_eq!(expand_scope("x:{a}:{open", &params), "x:1:{open");
}
