//! Clock tool.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::Tool;

/// Return the current local time.
pub struct GetCurrentTime;

#[async_trait]
impl Tool for GetCurrentTime {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Returns the current time as a string."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: Value, _workspace: &Path) -> anyhow::Result<String> {
        Ok(chrono::Local::now().format("%H:%M:%S").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn formats_hours_minutes_seconds() {
        let time = GetCurrentTime
            .execute(Value::Null, Path::new("."))
            .await
            .unwrap();
        assert!(chrono::NaiveTime::parse_from_str(&time, "%H:%M:%S").is_ok());
    }
}
