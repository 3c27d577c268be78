//! OpenAPI 3.0 documents and Swagger UI for Swarm applications, generated
//! from the controller registry and the schema table.

mod builder;
mod docs;
mod ext;
pub mod schema;

pub use builder::{build_document, operation, security_scheme};
pub use docs::{docs_controller, DocumentCache};
pub use ext::OpenApiPlugin;
pub use schema::{register_type, SchemaExt};
