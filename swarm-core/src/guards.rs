//! Access control gate and the caller-scope provider seam.

use std::collections::HashMap;

use crate::meta::Access;
use crate::request::{BoxFuture, Request};
use crate::ApiError;

/// Check the caller's granted scopes against an access requirement.
///
/// Evaluation order:
/// 1. no requirement: allowed, the endpoint is public;
/// 2. unauthenticated caller (`None`): denied, whatever is required;
/// 3. empty requirement: any authenticated caller is allowed;
/// 4. otherwise the caller needs any one of the required scopes, after
///    `{param}` tokens in them are replaced by the matching path parameter.
///
/// Denials are [`ApiError::Forbidden`].
pub fn check_access(
    caller: Option<&[String]>,
    required: Option<&Access>,
    params: &HashMap<String, String>,
) -> Result<(), ApiError> {
    let Some(required) = required else {
        return Ok(());
    };
    let Some(granted) = caller else {
        return Err(ApiError::Forbidden("Authentication required".into()));
    };
    if required.is_empty() {
        return Ok(());
    }

    let allowed = required
        .scopes()
        .iter()
        .map(|scope| expand_scope(scope, params))
        .any(|scope| granted.iter().any(|g| *g == scope));
    if allowed {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Insufficient scopes".into()))
    }
}

/// Replace `{name}` tokens with path parameter values in a single left to
/// right pass. Substituted values are never rescanned. Unknown tokens stay
/// literal.
pub fn expand_scope(scope: &str, params: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(scope.len());
    let mut rest = scope;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let Some(close) = tail.find('}') else {
            rest = tail;
            break;
        };
        let name = &tail[1..close];
        match params.get(name) {
            Some(value) if !name.contains('{') => out.push_str(value),
            _ => out.push_str(&tail[..=close]),
        }
        rest = &tail[close + 1..];
    }
    out.push_str(rest);
    out
}

/// Supplies the scopes granted to the caller of a request, once per request
/// and before the access check. `None` means unauthenticated.
///
/// Any `Fn(&Request) -> Option<Vec<String>>` is a provider; implement the
/// trait directly when the lookup has to await.
pub trait ScopeProvider: Send + Sync + 'static {
    fn scopes(&self, request: &Request) -> BoxFuture<Option<Vec<String>>>;
}

impl<F> ScopeProvider for F
where
    F: Fn(&Request) -> Option<Vec<String>> + Send + Sync + 'static,
{
    fn scopes(&self, request: &Request) -> BoxFuture<Option<Vec<String>>> {
        let scopes = self(request);
        Box::pin(std::future::ready(scopes))
    }
}
