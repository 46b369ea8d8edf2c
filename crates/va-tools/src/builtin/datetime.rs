//! `get_datetime` — current time in ISO-8601, optionally in a named timezone.

use chrono::Utc;
use chrono_tz::Tz;
use serde_json::Value;

use va_domain::{CancelToken, ToolDefinition};

use crate::registry::{Tool, ToolOutcome};

pub struct GetDatetimeTool;

#[async_trait::async_trait]
impl Tool for GetDatetimeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_datetime".into(),
            description: "Returns the current date and time in ISO-8601 format, optionally in a named IANA timezone.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "timezone": {
                        "type": "string",
                        "description": "IANA timezone name, e.g. 'America/New_York'. Defaults to UTC."
                    }
                }
            }),
        }
    }

    async fn invoke(&self, arguments: Value, _cancel: CancelToken) -> ToolOutcome {
        let tz_name = arguments.get("timezone").and_then(|v| v.as_str());

        match tz_name {
            None => ToolOutcome::ok(Utc::now().to_rfc3339()),
            Some(name) => match name.parse::<Tz>() {
                Ok(tz) => ToolOutcome::ok(Utc::now().with_timezone(&tz).to_rfc3339()),
                Err(_) => ToolOutcome::error(format!("unknown timezone: '{name}'")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_is_utc_and_well_formed() {
        let outcome = GetDatetimeTool
            .invoke(serde_json::json!({}), CancelToken::new())
            .await;
        assert!(!outcome.is_error);
        assert!(chrono::DateTime::parse_from_rfc3339(&outcome.text).is_ok());
    }

    #[tokio::test]
    async fn unknown_timezone_is_error() {
        let outcome = GetDatetimeTool
            .invoke(serde_json::json!({"timezone": "Nowhere/Fake"}), CancelToken::new())
            .await;
        assert!(outcome.is_error);
    }

    #[tokio::test]
    async fn named_timezone_resolves() {
        let outcome = GetDatetimeTool
            .invoke(serde_json::json!({"timezone": "Europe/Paris"}), CancelToken::new())
            .await;
        assert!(!outcome.is_error);
    }
}
