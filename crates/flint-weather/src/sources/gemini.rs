//! Gemini generative-language client, used both as an AI weather source and
//! as the chat model.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flint_core::{GeminiConfig, ReqwestErrorExt, SourceError};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use super::{
    handle_response, Capabilities, ChatSource, SourceDescriptor, WeatherSource,
};
use crate::chat::WeatherContext;
use crate::types::{percent, round1, CurrentConditions, LocationInfo, SourceKind};

pub const SOURCE_NAME: &str = "Gemini AI";

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

/// Shape the weather prompt asks the model to answer in.
#[derive(Debug, Deserialize)]
struct AiWeather {
    condition: String,
    temperature_celsius: f64,
    feels_like_celsius: Option<f64>,
    #[serde(default)]
    humidity_percent: f64,
    #[serde(default)]
    wind_speed_kmh: f64,
    description: Option<String>,
    #[serde(default)]
    alerts: Vec<String>,
}

/// Slice from the first `{` to the last `}` of a model reply.
pub(crate) fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Low-level generateContent client.
pub struct GeminiClient {
    client: Client,
    api_url: String,
    api_key: String,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(client: Client, api_url: &str, api_key: &str, max_output_tokens: u32) -> Self {
        Self {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            max_output_tokens,
        }
    }

    /// Returns `None` when no API key is configured.
    pub fn from_config(client: Client, config: &GeminiConfig) -> Option<Self> {
        let api_key = config.api_key.as_deref().filter(|k| !k.is_empty())?;
        Some(Self::new(
            client,
            &config.api_url,
            api_key,
            config.max_output_tokens,
        ))
    }

    /// Send a single-turn prompt and return the first candidate's text.
    #[instrument(skip(self, prompt), level = "debug")]
    pub async fn generate(
        &self,
        prompt: &str,
        temperature: f64,
        top_p: Option<f64>,
    ) -> Result<String, SourceError> {
        let mut generation_config = json!({
            "temperature": temperature,
            "maxOutputTokens": self.max_output_tokens,
        });
        if let Some(top_p) = top_p {
            generation_config["topP"] = json!(top_p);
        }

        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": generation_config,
        });

        let response = self
            .client
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(ReqwestErrorExt::into_source_error)?;

        let parsed: GenerateResponse = handle_response(response).await?;
        parsed
            .into_text()
            .ok_or_else(|| SourceError::Malformed("no candidate text".to_string()))
    }
}

/// AI weather estimate. Never counted as real data.
pub struct GeminiWeather {
    client: Arc<GeminiClient>,
    descriptor: SourceDescriptor,
}

impl GeminiWeather {
    pub fn new(client: Arc<GeminiClient>, min_interval: Duration) -> Self {
        Self {
            client,
            descriptor: SourceDescriptor {
                name: "gemini",
                kind: SourceKind::Ai,
                capabilities: Capabilities::CURRENT_ONLY,
                min_interval: Some(min_interval),
                quota_limited: true,
            },
        }
    }
}

fn weather_prompt(location: &LocationInfo) -> String {
    format!(
        "Weather for {} ({}, {}).\n\
         Return ONLY JSON:\n\
         {{\"condition\": \"Clear/Cloudy/etc\", \"temperature_celsius\": 25.0, \
         \"feels_like_celsius\": 24.0, \"humidity_percent\": 65, \"wind_speed_kmh\": 15.0, \
         \"description\": \"brief\", \"alerts\": [\"tip1\"]}}",
        location.city, location.latitude, location.longitude
    )
}

fn parse_weather(text: &str) -> Result<CurrentConditions, SourceError> {
    let json = extract_json_object(text)
        .ok_or_else(|| SourceError::Malformed("no JSON object in reply".to_string()))?;
    let ai: AiWeather =
        serde_json::from_str(json).map_err(|e| SourceError::Malformed(e.to_string()))?;

    let mut current = CurrentConditions::new(
        SOURCE_NAME,
        SourceKind::Ai,
        ai.condition,
        round1(ai.temperature_celsius),
        round1(ai.feels_like_celsius.unwrap_or(ai.temperature_celsius)),
        percent(ai.humidity_percent),
        round1(ai.wind_speed_kmh),
    );
    current.description = ai.description;
    current.alerts = ai.alerts;
    Ok(current)
}

#[async_trait]
impl WeatherSource for GeminiWeather {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    #[instrument(skip(self, location), fields(city = %location.city), level = "debug")]
    async fn current(&self, location: &LocationInfo) -> Result<CurrentConditions, SourceError> {
        let text = self.client.generate(&weather_prompt(location), 0.5, None).await?;
        let current = parse_weather(&text)?;
        tracing::info!("Gemini weather OK for {}", location.city);
        Ok(current)
    }
}

/// Chat replies grounded in the supplied weather context.
pub struct GeminiChat {
    client: Arc<GeminiClient>,
    descriptor: SourceDescriptor,
}

impl GeminiChat {
    pub fn new(client: Arc<GeminiClient>, min_interval: Duration) -> Self {
        Self {
            client,
            descriptor: SourceDescriptor {
                name: "gemini_chat",
                kind: SourceKind::Ai,
                capabilities: Capabilities::default(),
                min_interval: Some(min_interval),
                quota_limited: true,
            },
        }
    }
}

fn chat_prompt(message: &str, ctx: &WeatherContext) -> String {
    format!(
        "You are a helpful weather assistant. Current weather data for {city}, {country}:\n\
         - Temperature: {temp} degrees Celsius (feels like {feels} C)\n\
         - Condition: {condition}\n\
         - Humidity: {humidity} percent\n\
         - Wind: {wind} km/h\n\
         - Today forecast: {today}\n\
         - Tomorrow forecast: {tomorrow}\n\n\
         User question: {message}\n\n\
         Provide a natural, conversational response in 2-4 complete sentences. \
         Include specific data from above. Finish your thoughts completely.",
        city = ctx.city,
        country = ctx.country,
        temp = ctx.temperature_celsius,
        feels = ctx.feels_like_celsius,
        condition = ctx.condition,
        humidity = ctx.humidity_percent,
        wind = ctx.wind_speed_kmh,
        today = ctx.forecast_today,
        tomorrow = ctx.forecast_tomorrow,
        message = message,
    )
}

#[async_trait]
impl ChatSource for GeminiChat {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    #[instrument(skip(self, message, context), level = "debug")]
    async fn reply(&self, message: &str, context: &WeatherContext) -> Result<String, SourceError> {
        let text = self
            .client
            .generate(&chat_prompt(message, context), 0.7, Some(0.9))
            .await?;
        let reply = text.trim();
        if reply.is_empty() {
            return Err(SourceError::Malformed("empty chat reply".to_string()));
        }
        tracing::info!("Gemini chat success");
        Ok(reply.to_string())
    }
}
