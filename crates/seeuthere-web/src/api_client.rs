// ABOUTME: Client for the upstream seeuthere backend API, used by page query fetchers.
// ABOUTME: BackendApi is the seam; HttpBackend implements it with reqwest and classifies failures.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use seeuthere_core::{
    AccessToken, FetchError, Friend, Location, MidpointResult, OAuthProvider, Place,
    PlaceCategory, Point, SavedAddress, SpecificLocation, UserProfile,
};

/// Operations the shell needs from the backend.
#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn profile(&self, token: &str) -> Result<UserProfile, FetchError>;

    async fn addresses(&self, token: &str) -> Result<Vec<SavedAddress>, FetchError>;

    async fn friends(&self, token: &str) -> Result<Vec<Friend>, FetchError>;

    /// Trade an OAuth authorization code for an access token.
    async fn exchange_code(
        &self,
        provider: OAuthProvider,
        code: &str,
    ) -> Result<AccessToken, FetchError>;

    async fn midpoint(&self, points: &[Point]) -> Result<MidpointResult, FetchError>;

    /// Coordinates matching an address or place name.
    async fn coordinates(&self, address: &str) -> Result<Vec<Location>, FetchError>;

    /// Places matching a keyword.
    async fn search_places(&self, keyword: &str) -> Result<Vec<Place>, FetchError>;

    /// Addresses at a coordinate.
    async fn address_at(&self, point: Point) -> Result<Vec<SpecificLocation>, FetchError>;

    /// Places of one category around a coordinate.
    async fn nearby(
        &self,
        category: PlaceCategory,
        point: Point,
    ) -> Result<Vec<Place>, FetchError>;
}

#[derive(Serialize)]
struct MidpointRequest<'a> {
    locations: &'a [Point],
}

/// reqwest-backed implementation talking JSON to the backend.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, FetchError> {
        let response = request
            .send()
            .await
            .map_err(|e| FetchError::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_response(status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::decode(e.to_string()))
    }

    async fn get_authorized<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
    ) -> Result<T, FetchError> {
        self.send(self.client.get(self.url(path)).bearer_auth(token))
            .await
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn profile(&self, token: &str) -> Result<UserProfile, FetchError> {
        self.get_authorized("/api/members", token).await
    }

    async fn addresses(&self, token: &str) -> Result<Vec<SavedAddress>, FetchError> {
        self.get_authorized("/api/members/address", token).await
    }

    async fn friends(&self, token: &str) -> Result<Vec<Friend>, FetchError> {
        self.get_authorized("/api/members/friends", token).await
    }

    async fn exchange_code(
        &self,
        provider: OAuthProvider,
        code: &str,
    ) -> Result<AccessToken, FetchError> {
        let url = self.url(&format!("/api/{}/oauth", provider.as_str()));
        self.send(self.client.get(url).query(&[("code", code)]))
            .await
    }

    async fn midpoint(&self, points: &[Point]) -> Result<MidpointResult, FetchError> {
        let body = MidpointRequest { locations: points };
        self.send(
            self.client
                .post(self.url("/api/locations/midPoint"))
                .json(&body),
        )
        .await
    }

    async fn coordinates(&self, address: &str) -> Result<Vec<Location>, FetchError> {
        let url = self.url("/api/locations/coordinate");
        self.send(self.client.get(url).query(&[("address", address)]))
            .await
    }

    async fn search_places(&self, keyword: &str) -> Result<Vec<Place>, FetchError> {
        let url = self.url("/api/locations/search");
        self.send(self.client.get(url).query(&[("keyword", keyword)]))
            .await
    }

    async fn address_at(&self, point: Point) -> Result<Vec<SpecificLocation>, FetchError> {
        let url = self.url("/api/locations/address");
        self.send(self.client.get(url).query(&[("x", point.x), ("y", point.y)]))
            .await
    }

    async fn nearby(
        &self,
        category: PlaceCategory,
        point: Point,
    ) -> Result<Vec<Place>, FetchError> {
        let url = self.url("/api/locations/utility");
        let x = point.x.to_string();
        let y = point.y.to_string();
        self.send(self.client.get(url).query(&[
            ("category", category.backend_name()),
            ("x", x.as_str()),
            ("y", y.as_str()),
        ]))
        .await
    }
}

/// Build a FetchError from a non-success response, preferring the
/// backend's `message` field over the bare status text.
pub fn error_from_response(status: StatusCode, body: &str) -> FetchError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(|r| format!("{} {}", status.as_u16(), r))
                .unwrap_or_else(|| status.as_u16().to_string())
        });
    FetchError::from_status(status.as_u16(), message)
}
