//! Free-text advice about routes and stations from an external grounding
//! service. Purely an enrichment: failures degrade to canned text.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use shared::{ChargingStation, Coordinate, GroundedText, GroundingSource};

use crate::error::ProviderError;

pub const ROUTE_FALLBACK: &str =
    "Consider the efficient route to save battery given the expected terrain and traffic.";
pub const ROUTE_EMPTY: &str = "Analysis based on real geographic data.";
pub const ROUTE_NEUTRAL: &str = "Route analysed: typical terrain variation for the region. Ride defensively and watch regeneration on descents.";
pub const STATION_FALLBACK: &str = "Charging station detected successfully.";
pub const STATION_EMPTY: &str = "Station available for charging with basic services nearby.";
const SOURCE_TITLE_FALLBACK: &str = "Place details";

/// Phrases with which a model declines to analyse a route.
const REFUSAL_MARKERS: [&str; 5] = ["não posso", "não consigo", "i can't", "i cannot", "i'm unable"];

#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    #[error("advisory service unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Clone)]
pub struct RouteInsightRequest {
    pub origin: String,
    pub destination: String,
    pub relief: String,
    pub battery_pct: u32,
    pub user_location: Option<Coordinate>,
}

#[async_trait]
pub trait Advisor: Send + Sync {
    async fn route_insight(&self, request: &RouteInsightRequest) -> Result<GroundedText, AdvisorError>;

    async fn station_details(
        &self,
        station: &ChargingStation,
        user_location: Coordinate,
    ) -> Result<GroundedText, AdvisorError>;
}

/// Advisor used when no grounding backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct CannedAdvisor;

#[async_trait]
impl Advisor for CannedAdvisor {
    async fn route_insight(&self, _request: &RouteInsightRequest) -> Result<GroundedText, AdvisorError> {
        Ok(canned(ROUTE_FALLBACK))
    }

    async fn station_details(
        &self,
        _station: &ChargingStation,
        _user_location: Coordinate,
    ) -> Result<GroundedText, AdvisorError> {
        Ok(canned(STATION_FALLBACK))
    }
}

/// Gemini `generateContent` with the Google Maps grounding tool.
pub struct GeminiAdvisor {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiAdvisor {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    async fn generate(
        &self,
        prompt: String,
        near: Option<Coordinate>,
    ) -> Result<GroundedText, AdvisorError> {
        let mut body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "tools": [{"googleMaps": {}}],
        });
        if let Some(near) = near {
            body["toolConfig"] = json!({
                "retrievalConfig": {"latLng": {"latitude": near.lat, "longitude": near.lng}}
            });
        }

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::from)?;
        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status()).into());
        }
        let body = response.bytes().await.map_err(ProviderError::from)?;
        parse_generated(&body)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    maps: Option<MapsChunk>,
}

#[derive(Debug, Deserialize)]
struct MapsChunk {
    uri: String,
    #[serde(default)]
    title: Option<String>,
}

/// Text of the first candidate plus its map citations, in answer order.
fn parse_generated(body: &[u8]) -> Result<GroundedText, AdvisorError> {
    let response: GenerateResponse = serde_json::from_slice(body).map_err(ProviderError::from)?;
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(ProviderError::Incomplete("candidates"))?;

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default();
    let sources = candidate
        .grounding_metadata
        .map(|meta| meta.grounding_chunks)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|chunk| chunk.maps)
        .map(|maps| GroundingSource {
            title: maps.title.unwrap_or_default(),
            uri: maps.uri,
        })
        .collect();

    Ok(GroundedText { text, sources })
}

#[async_trait]
impl Advisor for GeminiAdvisor {
    async fn route_insight(&self, request: &RouteInsightRequest) -> Result<GroundedText, AdvisorError> {
        let relief = if request.relief.trim().is_empty() {
            String::new()
        } else {
            format!(" Expected relief: {}.", request.relief)
        };
        let prompt = format!(
            "Using Google Maps, describe the route from {} to {}. The rider is on an electric \
             bike with {}% battery.{relief} Assess the terrain, typical traffic and steep \
             gradients qualitatively, then give a short recommendation (at most 2 sentences) \
             on saving energy and riding safely.",
            request.origin, request.destination, request.battery_pct
        );
        self.generate(prompt, request.user_location).await
    }

    async fn station_details(
        &self,
        station: &ChargingStation,
        user_location: Coordinate,
    ) -> Result<GroundedText, AdvisorError> {
        let prompt = format!(
            "Using Google Maps, check the status and reviews of the charging station \"{}\" at \
             {:.5},{:.5}. Report its recent reliability and whether there are cafes or services \
             nearby to wait while charging.",
            station.name, station.lat, station.lng
        );
        self.generate(prompt, Some(user_location)).await
    }
}

fn canned(text: &str) -> GroundedText {
    GroundedText {
        text: text.to_string(),
        sources: Vec::new(),
    }
}

fn looks_like_refusal(text: &str) -> bool {
    let lower = text.to_lowercase();
    REFUSAL_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn dedupe_sources(sources: Vec<GroundingSource>) -> Vec<GroundingSource> {
    let mut unique: Vec<GroundingSource> = Vec::with_capacity(sources.len());
    for source in sources {
        if !unique.iter().any(|s| s.uri == source.uri) {
            unique.push(source);
        }
    }
    unique
}

fn titled(mut source: GroundingSource) -> GroundingSource {
    if source.title.trim().is_empty() {
        source.title = SOURCE_TITLE_FALLBACK.to_string();
    }
    source
}

pub async fn route_insight_or_fallback(
    advisor: &dyn Advisor,
    request: &RouteInsightRequest,
) -> GroundedText {
    match advisor.route_insight(request).await {
        Ok(insight) => {
            let text = if insight.text.trim().is_empty() {
                ROUTE_EMPTY.to_string()
            } else if looks_like_refusal(&insight.text) {
                ROUTE_NEUTRAL.to_string()
            } else {
                insight.text
            };
            GroundedText {
                text,
                sources: dedupe_sources(insight.sources.into_iter().map(titled).collect()),
            }
        }
        Err(err) => {
            tracing::warn!("route insight failed: {err}");
            canned(ROUTE_FALLBACK)
        }
    }
}

pub async fn station_details_or_fallback(
    advisor: &dyn Advisor,
    station: &ChargingStation,
    user_location: Coordinate,
) -> GroundedText {
    match advisor.station_details(station, user_location).await {
        Ok(details) => GroundedText {
            text: if details.text.trim().is_empty() {
                STATION_EMPTY.to_string()
            } else {
                details.text
            },
            sources: details.sources.into_iter().map(titled).collect(),
        },
        Err(err) => {
            tracing::warn!("station details for {} failed: {err}", station.id);
            canned(STATION_FALLBACK)
        }
    }
}
