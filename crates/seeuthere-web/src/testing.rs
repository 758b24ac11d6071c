// ABOUTME: Test utilities for seeuthere-web, including a stub backend API.
// ABOUTME: Used in tests to drive pages without a running backend server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use seeuthere_core::{
    AccessToken, FetchError, Friend, Location, MidpointResult, OAuthProvider, Place,
    PlaceCategory, Point, QueryOptions, RetryPolicy, SavedAddress, SpecificLocation, Staleness,
    UserProfile,
};

use crate::api_client::BackendApi;
use crate::app_state::{AppState, SharedState};
use crate::config::ShellConfig;

/// Token the stub treats as expired.
pub const EXPIRED_TOKEN: &str = "expired";
/// OAuth code the stub accepts.
pub const GOOD_CODE: &str = "good-code";

/// Addresses the stub can geocode, with their coordinates.
pub const KNOWN_ADDRESSES: [(&str, f64, f64); 2] = [
    ("Gangnam Station", 127.0276, 37.4979),
    ("Seoul Station", 126.9723, 37.5559),
];
/// Keyword the stub's place search answers.
pub const KNOWN_KEYWORD: &str = "Jamsil";

/// A stub backend with canned data and per-method failure injection.
///
/// Any token other than [`EXPIRED_TOKEN`] is accepted. Calls are counted per
/// method so tests can check what the query cache actually fetched.
#[derive(Debug, Default)]
pub struct StubBackend {
    calls: Mutex<HashMap<&'static str, u32>>,
    failures: HashMap<&'static str, FetchError>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `method` fail with `error`.
    pub fn failing(mut self, method: &'static str, error: FetchError) -> Self {
        self.failures.insert(method, error);
        self
    }

    /// Number of calls made to `method` so far.
    pub fn calls(&self, method: &str) -> u32 {
        self.calls
            .lock()
            .map(|c| c.get(method).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn record(&self, method: &'static str) -> Result<(), FetchError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(method).or_insert(0) += 1;
        }
        match self.failures.get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn authorize(&self, method: &'static str, token: &str) -> Result<(), FetchError> {
        self.record(method)?;
        if token == EXPIRED_TOKEN {
            return Err(FetchError::from_status(401, "INVALID_TOKEN: token expired"));
        }
        Ok(())
    }
}

#[async_trait]
impl BackendApi for StubBackend {
    async fn profile(&self, token: &str) -> Result<UserProfile, FetchError> {
        self.authorize("profile", token)?;
        Ok(UserProfile {
            id: "1".to_string(),
            nickname: "wedge".to_string(),
            profile_image: None,
            member_id: Some("wedge01".to_string()),
        })
    }

    async fn addresses(&self, token: &str) -> Result<Vec<SavedAddress>, FetchError> {
        self.authorize("addresses", token)?;
        Ok(vec![SavedAddress {
            id: 1,
            nickname: "home".to_string(),
            full_address: "Seoul Jung-gu Sejong-daero 110".to_string(),
            x: 126.978,
            y: 37.566,
        }])
    }

    async fn friends(&self, token: &str) -> Result<Vec<Friend>, FetchError> {
        self.authorize("friends", token)?;
        Ok(vec![
            Friend {
                id: "2".to_string(),
                nickname: "biggs".to_string(),
                member_id: Some("biggs02".to_string()),
                profile_image: None,
            },
            Friend {
                id: "3".to_string(),
                nickname: "jek".to_string(),
                member_id: None,
                profile_image: None,
            },
        ])
    }

    async fn exchange_code(
        &self,
        provider: OAuthProvider,
        code: &str,
    ) -> Result<AccessToken, FetchError> {
        self.record("exchange_code")?;
        if code != GOOD_CODE {
            return Err(FetchError::from_status(400, "authorization code rejected"));
        }
        Ok(AccessToken {
            access_token: format!("{}-token", provider.as_str()),
        })
    }

    async fn midpoint(&self, points: &[Point]) -> Result<MidpointResult, FetchError> {
        self.record("midpoint")?;
        let c = Point::centroid(points)
            .ok_or_else(|| FetchError::from_status(400, "no locations given"))?;
        Ok(MidpointResult { x: c.x, y: c.y })
    }

    async fn coordinates(&self, address: &str) -> Result<Vec<Location>, FetchError> {
        self.record("coordinates")?;
        Ok(KNOWN_ADDRESSES
            .iter()
            .filter(|(name, _, _)| name.eq_ignore_ascii_case(address.trim()))
            .map(|(name, x, y)| Location {
                address_name: format!("Seoul {}", name),
                place_name: name.to_string(),
                x: *x,
                y: *y,
            })
            .collect())
    }

    async fn search_places(&self, keyword: &str) -> Result<Vec<Place>, FetchError> {
        self.record("search_places")?;
        if !keyword.trim().eq_ignore_ascii_case(KNOWN_KEYWORD) {
            return Ok(Vec::new());
        }
        Ok(vec![place("Jamsil Station", "지하철역", 127.1002, 37.5133)])
    }

    async fn address_at(&self, _point: Point) -> Result<Vec<SpecificLocation>, FetchError> {
        self.record("address_at")?;
        Ok(vec![SpecificLocation {
            main_address: "Seoul Jung-gu Taepyeong-ro 1-ga 31".to_string(),
            building_name: "City Hall".to_string(),
        }])
    }

    async fn nearby(
        &self,
        category: PlaceCategory,
        point: Point,
    ) -> Result<Vec<Place>, FetchError> {
        self.record("nearby")?;
        let places = match category {
            PlaceCategory::Cafe => vec![
                place("Blue Bottle", category.backend_name(), point.x, point.y),
                place("Fritz Coffee", category.backend_name(), point.x, point.y),
            ],
            other => vec![place(
                &format!("{} spot", other.as_str()),
                other.backend_name(),
                point.x,
                point.y,
            )],
        };
        Ok(places)
    }
}

fn place(name: &str, category: &str, x: f64, y: f64) -> Place {
    Place {
        place_name: name.to_string(),
        address_name: "Seoul".to_string(),
        road_address_name: String::new(),
        category_group_name: category.to_string(),
        phone: String::new(),
        place_url: String::new(),
        distance: "120".to_string(),
        x,
        y,
    }
}

/// App state over `backend` with local config and no retry delay.
pub fn test_state(backend: Arc<StubBackend>) -> SharedState {
    Arc::new(AppState::new(
        ShellConfig::local(),
        backend,
        QueryOptions {
            stale_time: Staleness::Infinite,
            retry: RetryPolicy::immediate(),
        },
    ))
}
