//! Built-in statistics controller, `GET /__monitoring__/stats/:filter`.

use chrono::Local;
use serde_json::{json, Value};

use crate::meta::ControllerMeta;
use crate::options::SwarmOptions;
use crate::request::Args;
use crate::ApiError;

const DEFAULT_DAYS: i64 = 30;

fn bucket_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "calls": { "type": "number" },
            "duration": {
                "type": "object",
                "properties": {
                    "avg": { "type": "number" },
                    "min": { "type": "number", "nullable": true },
                    "max": { "type": "number", "nullable": true }
                }
            }
        }
    })
}

/// Metadata of the monitoring controller, gated by `monitor_access`.
pub fn monitoring_controller(options: &SwarmOptions) -> ControllerMeta {
    let mut meta = ControllerMeta::new("Monitoring");
    meta.title("Monitoring")
        .description("Handles Swarm instance monitoring stats")
        .prefix("/__monitoring__", true);
    if let Some(access) = &options.monitor_access {
        meta.access(access.clone());
    }
    meta.method("getStats")
        .get("/stats/:filter")
        .title("Retrieve statistics from Swarm instance")
        .parameter(
            "filter",
            json!({ "type": "string" }),
            "Method name as in controller@method. Use \"all\" to retrieve global statistics.",
        )
        .query(
            "days",
            json!({ "type": "integer", "minimum": 0 }),
            "Number of days of per-day statistics, defaults to 30",
        )
        .returns(
            200,
            json!({
                "type": "object",
                "properties": {
                    "uptime": {
                        "type": "number",
                        "description": "Number of milliseconds since last reboot"
                    },
                    "global": bucket_schema(),
                    "perDay": { "type": "object", "additionalProperties": bucket_schema() }
                }
            }),
            "Statistics",
        )
        .request(0)
        .handler(get_stats);
    meta
}

async fn get_stats(args: Args) -> Result<Value, ApiError> {
    let request = args
        .request(0)
        .ok_or_else(|| ApiError::Internal("missing request argument".into()))?;
    let app = request.app()?;

    let filter = request.params.get("filter").map_or("all", String::as_str);
    let days = match request.query.get("days") {
        None => DEFAULT_DAYS,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(DEFAULT_DAYS),
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("Invalid days value `{s}`")))?,
        Some(other) => return Err(ApiError::BadRequest(format!("Invalid days value `{other}`"))),
    };

    let report = app.monitor.report(filter, days, Local::now().date_naive());
    Ok(serde_json::to_value(report)?)
}
