//! Named lifecycle hooks.
//!
//! Each [`HookPoint`] owns an ordered chain of async handlers. Running a
//! point threads one [`HookState`] through the chain: every handler gets the
//! previous handler's return value, so `H1` then `H2` yields `H2(H1(state))`.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::controller::{ControllerDescriptor, MethodDescriptor};
use crate::request::{BoxFuture, Request};
use crate::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    PreRegister,
    PostRegister,
    PreListen,
    PostListen,
    PreAccess,
    PostAccess,
    PreHandler,
    OnError,
    PostHandler,
    PreResponse,
    PreShutdown,
}

impl HookPoint {
    pub const ALL: [HookPoint; 11] = [
        HookPoint::PreRegister,
        HookPoint::PostRegister,
        HookPoint::PreListen,
        HookPoint::PostListen,
        HookPoint::PreAccess,
        HookPoint::PostAccess,
        HookPoint::PreHandler,
        HookPoint::OnError,
        HookPoint::PostHandler,
        HookPoint::PreResponse,
        HookPoint::PreShutdown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookPoint::PreRegister => "preRegister",
            HookPoint::PostRegister => "postRegister",
            HookPoint::PreListen => "preListen",
            HookPoint::PostListen => "postListen",
            HookPoint::PreAccess => "preAccess",
            HookPoint::PostAccess => "postAccess",
            HookPoint::PreHandler => "preHandler",
            HookPoint::OnError => "onError",
            HookPoint::PostHandler => "postHandler",
            HookPoint::PreResponse => "preResponse",
            HookPoint::PreShutdown => "preShutdown",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The handler being dispatched, as seen by `preHandler`, `postHandler` and
/// `onError`.
#[derive(Clone, Debug)]
pub struct HandlerState {
    pub request: Arc<Request>,
    pub controller: Arc<ControllerDescriptor>,
    pub method: Arc<MethodDescriptor>,
    /// Set for `onError`.
    pub error: Option<ApiError>,
}

/// Value threaded through a hook chain.
///
/// Lifecycle points and `postAccess` carry `None`, `preAccess` the request,
/// the handler points a [`HandlerState`], `preResponse` the response value.
#[derive(Clone, Debug)]
pub enum HookState {
    None,
    Request(Request),
    Handler(HandlerState),
    Response(Value),
}

impl HookState {
    pub fn kind(&self) -> &'static str {
        match self {
            HookState::None => "none",
            HookState::Request(_) => "request",
            HookState::Handler(_) => "handler",
            HookState::Response(_) => "response",
        }
    }
}

pub type HookFn = Arc<dyn Fn(HookState) -> BoxFuture<Result<HookState, ApiError>> + Send + Sync>;

/// Registered hook chains. Handlers are appended and never removed.
#[derive(Clone, Default)]
pub struct Hooks {
    chains: HashMap<HookPoint, Vec<HookFn>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for point in HookPoint::ALL {
            let count = self.len(point);
            if count > 0 {
                map.entry(&point.as_str(), &count);
            }
        }
        map.finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler to the chain of `point`.
    pub fn add<F, Fut>(&mut self, point: HookPoint, f: F)
    where
        F: Fn(HookState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookState, ApiError>> + Send + 'static,
    {
        let hook: HookFn = Arc::new(move |state| Box::pin(f(state)));
        self.chains.entry(point).or_default().push(hook);
    }

    /// Number of handlers registered for `point`.
    pub fn len(&self, point: HookPoint) -> usize {
        self.chains.get(&point).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.chains.values().all(Vec::is_empty)
    }

    /// Run the chain of `point` sequentially. The first error stops the
    /// chain and is returned; an empty chain returns `state` unchanged.
    pub async fn run(&self, point: HookPoint, state: HookState) -> Result<HookState, ApiError> {
        let Some(chain) = self.chains.get(&point) else {
            return Ok(state);
        };
        let mut state = state;
        for hook in chain {
            state = hook(state).await?;
        }
        Ok(state)
    }
}
