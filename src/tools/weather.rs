//! Weather tool: locate the caller by IP, then ask Open-Meteo.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::Tool;

const IPINFO_URL: &str = "https://ipinfo.io/json";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Current temperature plus today's high and low for the caller's location.
pub struct GetWeatherFromIp {
    client: reqwest::Client,
    ipinfo_url: String,
    forecast_url: String,
}

impl GetWeatherFromIp {
    pub fn new() -> Self {
        Self::with_endpoints(IPINFO_URL, FORECAST_URL)
    }

    pub fn with_endpoints(ipinfo_url: impl Into<String>, forecast_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            ipinfo_url: ipinfo_url.into(),
            forecast_url: forecast_url.into(),
        }
    }
}

impl Default for GetWeatherFromIp {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct IpInfo {
    loc: String,
}

#[derive(Debug, Deserialize)]
struct Forecast {
    current: Current,
    daily: Daily,
}

#[derive(Debug, Deserialize)]
struct Current {
    temperature_2m: f64,
}

#[derive(Debug, Deserialize)]
struct Daily {
    temperature_2m_max: Vec<f64>,
    temperature_2m_min: Vec<f64>,
}

#[async_trait]
impl Tool for GetWeatherFromIp {
    fn name(&self) -> &str {
        "get_weather_from_ip"
    }

    fn description(&self) -> &str {
        "Gets the current, high, and low temperature in Celsius for the user's location, based on their IP address."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: Value, _workspace: &Path) -> anyhow::Result<String> {
        let info: IpInfo = self
            .client
            .get(&self.ipinfo_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let (lat, lon) = info
            .loc
            .split_once(',')
            .ok_or_else(|| anyhow::anyhow!("Unexpected location format: {}", info.loc))?;

        let forecast: Forecast = self
            .client
            .get(&self.forecast_url)
            .query(&[
                ("latitude", lat.trim()),
                ("longitude", lon.trim()),
                ("current", "temperature_2m"),
                ("daily", "temperature_2m_max,temperature_2m_min"),
                ("temperature_unit", "celsius"),
                ("timezone", "auto"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::debug!(?forecast, "Weather data");

        let high = forecast
            .daily
            .temperature_2m_max
            .first()
            .ok_or_else(|| anyhow::anyhow!("Forecast has no daily maximum"))?;
        let low = forecast
            .daily
            .temperature_2m_min
            .first()
            .ok_or_else(|| anyhow::anyhow!("Forecast has no daily minimum"))?;

        Ok(format!(
            "Current: {}°C, High: {}°C, Low: {}°C",
            forecast.current.temperature_2m, high, low
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn combines_location_and_forecast() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/json")
            .with_status(200)
            .with_body(r#"{"ip": "1.2.3.4", "loc": "37.77,-122.42"}"#)
            .create_async()
            .await;
        let forecast = server
            .mock("GET", "/v1/forecast")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("latitude".into(), "37.77".into()),
                mockito::Matcher::UrlEncoded("longitude".into(), "-122.42".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"current": {"temperature_2m": 18.2},
                    "daily": {"temperature_2m_max": [21.0], "temperature_2m_min": [12.5]}}"#,
            )
            .create_async()
            .await;

        let tool = GetWeatherFromIp::with_endpoints(
            format!("{}/json", server.url()),
            format!("{}/v1/forecast", server.url()),
        );
        let result = tool.execute(Value::Null, Path::new(".")).await.unwrap();

        forecast.assert_async().await;
        assert_eq!(result, "Current: 18.2°C, High: 21°C, Low: 12.5°C");
    }

    #[tokio::test]
    async fn bad_location_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/json")
            .with_status(200)
            .with_body(r#"{"loc": "nowhere"}"#)
            .create_async()
            .await;

        let tool = GetWeatherFromIp::with_endpoints(
            format!("{}/json", server.url()),
            format!("{}/v1/forecast", server.url()),
        );
        let err = tool.execute(Value::Null, Path::new(".")).await.unwrap_err();
        assert!(err.to_string().contains("Unexpected location format"));
    }
}
