//! Swarm: declarative API controllers over axum, with generated OpenAPI
//! documentation.
//!
//! This facade crate re-exports the Swarm sub-crates through a single
//! dependency:
//!
//! ```ignore
//! use swarm::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SwarmConfig::load("dev")?;
//!     Swarm::from_config(&config)?
//!         .with(Tracing)
//!         .with(OpenApiPlugin::new())
//!         .controller::<Pets>()
//!         .with(ErrorHandling)
//!         .serve("0.0.0.0:3000")
//!         .await
//! }
//! ```
//!
//! # Feature flags
//!
//! | Feature   | Default | Crate           |
//! |-----------|---------|-----------------|
//! | `openapi` | **yes** | `swarm-openapi` |
//! | `test`    | no      | `swarm-test`    |

pub use swarm_core::*;

#[cfg(feature = "openapi")]
pub use swarm_openapi;

#[cfg(feature = "test")]
pub use swarm_test;

/// Unified prelude: `use swarm::prelude::*`.
pub mod prelude {
    pub use swarm_core::prelude::*;

    #[cfg(feature = "openapi")]
    pub use swarm_openapi::{OpenApiPlugin, SchemaExt};
}
