use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::errors::{ToolError, ToolResult};
use crate::models::tool::{Tool, ToolInput};

pub const NAME: &str = "get_weather";
pub const OPENWEATHER_HOST: &str = "https://api.openweathermap.org";

/// Used when the model asks for the weather without naming a place
pub const DEFAULT_LOCATION: &str = "Catonsville, Maryland";

const PLACEHOLDER_LOCATIONS: &[&str] = &[
    "here",
    "current",
    "current location",
    "my location",
    "local",
    "unknown",
];

pub fn tool() -> Tool {
    Tool::new(
        NAME,
        "Get the current weather conditions for a location. Leave the location empty to use \
        the user's home location.",
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "City and region, e.g. \"Baltimore, Maryland\" or \"Paris, France\""
                }
            },
            "required": ["location"]
        }),
    )
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Place {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl Place {
    pub fn display_name(&self) -> String {
        [Some(self.name.as_str()), self.state.as_deref(), self.country.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conditions {
    pub description: String,
    pub temperature_f: f64,
    pub feels_like_f: f64,
    pub humidity: u32,
    pub wind_mph: f64,
}

/// A geocoding plus current conditions backend
#[async_trait]
pub trait WeatherService: Send + Sync {
    /// Resolve a free-form location, `None` when nothing matched
    async fn geocode(&self, location: &str) -> ToolResult<Option<Place>>;

    async fn current(&self, place: &Place) -> ToolResult<Conditions>;
}

// Response shapes of the current weather endpoint
#[derive(Deserialize)]
struct CurrentResponse {
    #[serde(default)]
    weather: Vec<WeatherEntry>,
    main: MainEntry,
    #[serde(default)]
    wind: Option<WindEntry>,
}

#[derive(Deserialize)]
struct WeatherEntry {
    description: String,
}

#[derive(Deserialize)]
struct MainEntry {
    temp: f64,
    feels_like: f64,
    humidity: u32,
}

#[derive(Deserialize)]
struct WindEntry {
    speed: f64,
}

pub struct OpenWeatherMap {
    client: Client,
    api_key: String,
    host: String,
}

impl OpenWeatherMap {
    pub fn new<K: Into<String>>(api_key: K) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: api_key.into(),
            host: OPENWEATHER_HOST.to_string(),
        }
    }

    pub fn with_host<H: Into<String>>(mut self, host: H) -> Self {
        self.host = host.into();
        self
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> ToolResult<T> {
        let url = format!("{}{}", self.host.trim_end_matches('/'), endpoint);
        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl WeatherService for OpenWeatherMap {
    async fn geocode(&self, location: &str) -> ToolResult<Option<Place>> {
        let places: Vec<Place> = self
            .get(
                "/geo/1.0/direct",
                &[("q", location.to_string()), ("limit", "1".to_string())],
            )
            .await?;
        Ok(places.into_iter().next())
    }

    async fn current(&self, place: &Place) -> ToolResult<Conditions> {
        let response: CurrentResponse = self
            .get(
                "/data/2.5/weather",
                &[
                    ("lat", place.lat.to_string()),
                    ("lon", place.lon.to_string()),
                    ("units", "imperial".to_string()),
                ],
            )
            .await?;

        Ok(Conditions {
            description: response
                .weather
                .into_iter()
                .next()
                .map(|entry| entry.description)
                .unwrap_or_else(|| "unknown".to_string()),
            temperature_f: response.main.temp,
            feels_like_f: response.main.feels_like,
            humidity: response.main.humidity,
            wind_mph: response.wind.map(|wind| wind.speed).unwrap_or_default(),
        })
    }
}

/// The location to look up, falling back to the default for empty or vague input
pub fn resolve_location(location: &str) -> &str {
    let trimmed = location.trim();
    let is_placeholder = PLACEHOLDER_LOCATIONS
        .iter()
        .any(|placeholder| trimmed.eq_ignore_ascii_case(placeholder));
    if trimmed.is_empty() || is_placeholder {
        DEFAULT_LOCATION
    } else {
        trimmed
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn format_conditions(place: &Place, conditions: &Conditions) -> String {
    format!(
        "Current weather in {}:\n\
        Conditions: {}\n\
        Temperature: {:.0}°F (feels like {:.0}°F)\n\
        Humidity: {}%\n\
        Wind: {:.0} mph",
        place.display_name(),
        capitalize(&conditions.description),
        conditions.temperature_f,
        conditions.feels_like_f,
        conditions.humidity,
        conditions.wind_mph
    )
}

pub async fn get_weather(backend: &dyn WeatherService, input: &Value) -> ToolResult<String> {
    let location = resolve_location(input.str_arg("location"));
    let place = backend
        .geocode(location)
        .await?
        .ok_or_else(|| ToolError::LocationNotFound(location.to_string()))?;

    let conditions = backend.current(&place).await?;
    Ok(format_conditions(&place, &conditions))
}
