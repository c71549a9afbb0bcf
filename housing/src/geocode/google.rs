//! Google Geocoding API provider.

use serde::Deserialize;
use tracing::debug;

use super::{GeocodeError, GeocodeProvider};
use crate::models::Coordinates;

pub const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

/// Geocoding JSON API client. One request per call; retries belong to the resolver.
#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl GoogleGeocoder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: GOOGLE_GEOCODE_URL.to_string(),
        }
    }

    /// Point the client at another endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl GeocodeProvider for GoogleGeocoder {
    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("key", self.api_key.as_str()), ("address", address)])
            .send()
            .await
            .map_err(|e| GeocodeError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GeocodeError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(GeocodeError::Status {
                status: status.to_string(),
                body,
            });
        }

        let parsed: GeocodeResponse =
            serde_json::from_str(&body).map_err(|e| GeocodeError::Decode(format!("{}: {}", e, body)))?;

        match parsed.status.as_str() {
            "OK" => {
                let first = parsed.results.into_iter().next().ok_or_else(|| GeocodeError::NoMatch {
                    address: address.to_string(),
                })?;
                let loc = first.geometry.location;
                debug!(address, lat = loc.lat, lng = loc.lng, "geocoded");
                Ok(Coordinates::new(loc.lat, loc.lng))
            }
            "ZERO_RESULTS" => Err(GeocodeError::NoMatch {
                address: address.to_string(),
            }),
            other => Err(GeocodeError::Status {
                status: other.to_string(),
                body,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/geocode/json", addr)
    }

    async fn stub(Query(params): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
        if params.get("key").map(String::as_str) != Some("test-key") {
            return (StatusCode::OK, Json(json!({ "status": "REQUEST_DENIED", "results": [] })));
        }
        let body = match params.get("address").map(String::as_str) {
            Some("臺北市中正區忠孝西路一段1~30號") => json!({
                "status": "OK",
                "results": [
                    { "geometry": { "location": { "lat": 25.0478, "lng": 121.5170 } } },
                    { "geometry": { "location": { "lat": 0.0, "lng": 0.0 } } }
                ]
            }),
            Some("空白") => json!({ "status": "OK", "results": [] }),
            Some("broken") => return (StatusCode::BAD_GATEWAY, Json(json!({}))),
            _ => json!({ "status": "ZERO_RESULTS", "results": [] }),
        };
        (StatusCode::OK, Json(body))
    }

    async fn client(key: &str) -> GoogleGeocoder {
        let url = serve(Router::new().route("/geocode/json", get(stub))).await;
        GoogleGeocoder::new(key).with_endpoint(url)
    }

    #[tokio::test]
    async fn test_ok_takes_first_result() {
        let geo = client("test-key").await;
        let coords = geo.geocode("臺北市中正區忠孝西路一段1~30號").await.unwrap();
        assert_eq!(coords, Coordinates::new(25.0478, 121.5170));
    }

    #[tokio::test]
    async fn test_zero_results_is_no_match() {
        let geo = client("test-key").await;
        let err = geo.geocode("月球表面").await.unwrap_err();
        assert!(err.is_no_match());
    }

    #[tokio::test]
    async fn test_ok_without_results_is_no_match() {
        let geo = client("test-key").await;
        assert!(geo.geocode("空白").await.unwrap_err().is_no_match());
    }

    #[tokio::test]
    async fn test_denied_is_transient() {
        let geo = client("wrong-key").await;
        let err = geo.geocode("臺北市中正區忠孝西路一段1~30號").await.unwrap_err();
        assert!(matches!(&err, GeocodeError::Status { status, .. } if status == "REQUEST_DENIED"));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_http_error_is_transient() {
        let geo = client("test-key").await;
        let err = geo.geocode("broken").await.unwrap_err();
        assert!(matches!(err, GeocodeError::Status { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_unreachable_is_transient() {
        let geo = GoogleGeocoder::new("k").with_endpoint("http://127.0.0.1:1/geocode/json");
        let err = geo.geocode("x").await.unwrap_err();
        assert!(matches!(err, GeocodeError::Request(_)));
    }
}
