//! Plugin system.
//!
//! Plugins are composable units of functionality installed into a
//! [`Swarm`] builder with `.with(plugin)`. They can add layers, register
//! controllers and schemas, attach hooks or injectors.

use crate::builder::Swarm;

/// A composable unit of functionality that can be installed into a [`Swarm`].
///
/// # Example
///
/// ```ignore
/// use swarm_core::{Plugin, Swarm};
///
/// pub struct RequestLog;
///
/// impl Plugin for RequestLog {
///     fn install(self, app: Swarm) -> Swarm {
///         app.on(HookPoint::PreAccess, |state| async move {
///             if let HookState::Request(request) = &state {
///                 tracing::info!(uri = %request.uri, "incoming");
///             }
///             Ok(state)
///         })
///     }
/// }
/// ```
pub trait Plugin: Send + 'static {
    /// Install this plugin into the given builder, returning the modified builder.
    fn install(self, app: Swarm) -> Swarm;

    /// Whether this plugin should be installed last in the layer stack.
    ///
    /// The builder warns when another plugin is added after one that
    /// returns `true`.
    fn should_be_last() -> bool
    where
        Self: Sized,
    {
        false
    }

    /// The name of this plugin (for diagnostics).
    fn name() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}
