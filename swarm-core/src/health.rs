//! Built-in health check controller.
//!
//! | Path           | Description                                        |
//! |----------------|----------------------------------------------------|
//! | `GET /health`  | `{"ok": true}` while accepting traffic, 503 once shutdown started |
//!
//! The route goes through the regular dispatch pipeline, which is what
//! turns it into a 503 during shutdown.

use serde_json::json;

use crate::controller::Controller;
use crate::meta::ControllerMeta;

pub struct Health;

impl Controller for Health {
    fn describe(meta: &mut ControllerMeta) {
        meta.title("Healthcheck")
            .description("Adds a health check endpoint")
            .prefix("/health", true);
        meta.method("healthy")
            .get("/")
            .title("Is the API healthy ?")
            .returns(
                200,
                json!({ "type": "object", "properties": { "ok": { "type": "boolean" } } }),
                "The API is healthy",
            )
            .returns(
                503,
                json!({ "type": "object", "properties": { "error": { "type": "string" } } }),
                "The API is shutting down",
            )
            .handler(|_| async { Ok(json!({ "ok": true })) });
    }
}
