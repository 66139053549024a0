//! Forward and reverse geocoding via Nominatim (OpenStreetMap).
//! Free, no API key required, but callers must send a User-Agent and keep to
//! one request per second.

use std::time::Duration;

use async_trait::async_trait;
use flint_core::{NominatimConfig, ReqwestErrorExt, SourceError};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use super::{handle_response, Capabilities, Geocoder, SourceDescriptor};
use crate::types::{Coordinate, LocationInfo, SourceKind};

const SEARCH_LIMIT: &str = "5";

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: NominatimAddress,
    #[serde(default)]
    display_name: String,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    display_name: String,
    lat: String,
    lon: String,
    #[serde(default)]
    address: NominatimAddress,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    suburb: Option<String>,
    neighbourhood: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

impl NominatimAddress {
    /// Prefer city > town > village for the primary place name
    fn place(&self) -> Option<&str> {
        self.city
            .as_deref()
            .or(self.town.as_deref())
            .or(self.village.as_deref())
    }

    fn locality(&self) -> Option<&str> {
        self.suburb.as_deref().or(self.neighbourhood.as_deref())
    }
}

pub struct NominatimClient {
    client: Client,
    base_url: String,
    user_agent: String,
    descriptor: SourceDescriptor,
}

impl NominatimClient {
    pub fn new(client: Client, base_url: &str, user_agent: &str, min_interval: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
            descriptor: SourceDescriptor {
                name: "nominatim",
                kind: SourceKind::Provider,
                capabilities: Capabilities::default(),
                min_interval: Some(min_interval),
                quota_limited: false,
            },
        }
    }

    pub fn from_config(client: Client, config: &NominatimConfig) -> Self {
        Self::new(
            client,
            &config.base_url,
            &config.user_agent,
            config.min_interval(),
        )
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    #[instrument(skip(self), level = "debug")]
    async fn reverse(&self, coordinate: Coordinate) -> Result<LocationInfo, SourceError> {
        let url = format!("{}/reverse", self.base_url);
        let lat = coordinate.latitude().to_string();
        let lon = coordinate.longitude().to_string();

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .query(&[
                ("format", "json"),
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("zoom", "18"),
                ("addressdetails", "1"),
            ])
            .send()
            .await
            .map_err(ReqwestErrorExt::into_source_error)?;

        let body: ReverseResponse = handle_response(response).await?;
        if let Some(error) = body.error {
            return Err(SourceError::Malformed(error));
        }

        let address = &body.address;
        let location = LocationInfo {
            latitude: coordinate.latitude(),
            longitude: coordinate.longitude(),
            locality: address.locality().unwrap_or("Unknown").to_string(),
            city: address.place().unwrap_or("Unknown City").to_string(),
            region: address.state.clone().unwrap_or_default(),
            country: address
                .country
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            display_name: body.display_name,
        };

        tracing::info!("Reverse geocoded to: {}, {}", location.city, location.country);
        Ok(location)
    }

    #[instrument(skip(self), level = "debug")]
    async fn search(&self, query: &str) -> Result<Vec<LocationInfo>, SourceError> {
        let url = format!("{}/search", self.base_url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .query(&[
                ("format", "json"),
                ("q", query),
                ("limit", SEARCH_LIMIT),
                ("addressdetails", "1"),
            ])
            .send()
            .await
            .map_err(ReqwestErrorExt::into_source_error)?;

        let results: Vec<SearchResult> = handle_response(response).await?;

        let locations = results
            .into_iter()
            .filter_map(|r| {
                let (Ok(latitude), Ok(longitude)) = (r.lat.parse::<f64>(), r.lon.parse::<f64>())
                else {
                    tracing::debug!("Skipping search result with bad coordinates: {}", r.display_name);
                    return None;
                };
                Some(LocationInfo {
                    latitude,
                    longitude,
                    locality: r.address.locality().unwrap_or_default().to_string(),
                    city: r.address.place().unwrap_or_default().to_string(),
                    region: r.address.state.clone().unwrap_or_default(),
                    country: r.address.country.clone().unwrap_or_default(),
                    display_name: r.display_name,
                })
            })
            .collect();

        Ok(locations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const UA: &str = "FlintWeather-test/0.1";

    fn client_for(server: &MockServer) -> NominatimClient {
        NominatimClient::new(Client::new(), &server.uri(), UA, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_reverse_prefers_city_then_town() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(header("user-agent", UA))
            .and(query_param("zoom", "18"))
            .and(query_param("lat", "47.6062"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "display_name": "Pike Place, Seattle, Washington, United States",
                "address": {
                    "neighbourhood": "Belltown",
                    "town": "Not Seattle",
                    "city": "Seattle",
                    "state": "Washington",
                    "country": "United States"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let coord = Coordinate::new(47.6062, -122.3321).unwrap();
        let location = client_for(&server).reverse(coord).await.unwrap();

        assert_eq!(location.city, "Seattle");
        assert_eq!(location.locality, "Belltown");
        assert_eq!(location.region, "Washington");
        assert_eq!(location.country, "United States");
        assert_eq!(location.latitude, 47.6062);
    }

    #[tokio::test]
    async fn test_reverse_sparse_address_uses_placeholders() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "display_name": "Somewhere",
                "address": {"village": "Hamlet"}
            })))
            .mount(&server)
            .await;

        let coord = Coordinate::new(10.0, 10.0).unwrap();
        let location = client_for(&server).reverse(coord).await.unwrap();
        assert_eq!(location.city, "Hamlet");
        assert_eq!(location.locality, "Unknown");
        assert_eq!(location.country, "Unknown");
        assert_eq!(location.region, "");
    }

    #[tokio::test]
    async fn test_reverse_error_body_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "Unable to geocode"})),
            )
            .mount(&server)
            .await;

        let coord = Coordinate::new(0.0, -140.0).unwrap();
        let err = client_for(&server).reverse(coord).await.unwrap_err();
        assert_eq!(err, SourceError::Malformed("Unable to geocode".to_string()));
    }

    #[tokio::test]
    async fn test_search_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "Springfield"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"display_name": "Springfield, Illinois", "lat": "39.78", "lon": "-89.65",
                 "address": {"city": "Springfield", "country": "United States"}},
                {"display_name": "Broken", "lat": "north", "lon": "-1"},
                {"display_name": "Springfield, Oregon", "lat": "44.05", "lon": "-123.02",
                 "address": {"town": "Springfield", "country": "United States"}}
            ])))
            .mount(&server)
            .await;

        let results = client_for(&server).search("Springfield").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].latitude, 39.78);
        assert_eq!(results[0].city, "Springfield");
        assert_eq!(results[1].display_name, "Springfield, Oregon");
    }

    #[tokio::test]
    async fn test_search_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server).search("Paris").await.unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 503, .. }));
    }
}
