// ABOUTME: Data types exchanged with the backend API and shown on pages.
// ABOUTME: Coordinates, participants, members, location lookups, nearby places and midpoint results.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A map coordinate: `x` is longitude, `y` is latitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Average of the given points, or None when there are none.
    pub fn centroid(points: &[Point]) -> Option<Point> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let (sx, sy) = points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Point::new(sx / n, sy / n))
    }

    pub fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && (-180.0..=180.0).contains(&self.x)
            && (-90.0..=90.0).contains(&self.y)
    }
}

/// Someone taking part in a midpoint search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Ulid,
    pub name: String,
    pub address: String,
    pub point: Point,
}

/// Signed-in member, as returned by `GET /api/members`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub nickname: String,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub member_id: Option<String>,
}

/// Address saved by a member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAddress {
    pub id: i64,
    pub nickname: String,
    pub full_address: String,
    pub x: f64,
    pub y: f64,
}

/// A member's friend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    pub id: String,
    pub nickname: String,
    #[serde(default)]
    pub member_id: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
}

/// Meeting point computed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MidpointResult {
    pub x: f64,
    pub y: f64,
}

/// Candidate coordinate for an address query, from
/// `GET /api/locations/coordinate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub address_name: String,
    #[serde(default)]
    pub place_name: String,
    pub x: f64,
    pub y: f64,
}

impl Location {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Place name when there is one, otherwise the address.
    pub fn label(&self) -> &str {
        if self.place_name.is_empty() {
            &self.address_name
        } else {
            &self.place_name
        }
    }
}

/// Address at a coordinate, from `GET /api/locations/address`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecificLocation {
    pub main_address: String,
    #[serde(default)]
    pub building_name: String,
}

/// A place from keyword search or a category search around a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub place_name: String,
    #[serde(default)]
    pub address_name: String,
    #[serde(default)]
    pub road_address_name: String,
    #[serde(default)]
    pub category_group_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub place_url: String,
    /// Metres from the search centre, as text.
    #[serde(default)]
    pub distance: String,
    pub x: f64,
    pub y: f64,
}

impl Place {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Kinds of place offered around a meeting point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceCategory {
    #[default]
    Cafe,
    Restaurant,
    Subway,
    Culture,
    Tour,
}

impl PlaceCategory {
    pub const ALL: [PlaceCategory; 5] = [
        PlaceCategory::Cafe,
        PlaceCategory::Restaurant,
        PlaceCategory::Subway,
        PlaceCategory::Culture,
        PlaceCategory::Tour,
    ];

    /// Name used in page URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceCategory::Cafe => "cafe",
            PlaceCategory::Restaurant => "restaurant",
            PlaceCategory::Subway => "subway",
            PlaceCategory::Culture => "culture",
            PlaceCategory::Tour => "tour",
        }
    }

    /// Category name the backend translates to a map provider code.
    pub fn backend_name(&self) -> &'static str {
        match self {
            PlaceCategory::Cafe => "카페",
            PlaceCategory::Restaurant => "음식점",
            PlaceCategory::Subway => "지하철역",
            PlaceCategory::Culture => "문화시설",
            PlaceCategory::Tour => "관광명소",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

/// Login providers handled by the OAuth page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Kakao,
    Naver,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Kakao => "kakao",
            OAuthProvider::Naver => "naver",
        }
    }

    /// Provider named by the last segment of a login path such as `/login/naver`.
    pub fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/').rsplit('/').next()? {
            "kakao" => Some(OAuthProvider::Kakao),
            "naver" => Some(OAuthProvider::Naver),
            _ => None,
        }
    }
}

/// Token returned by the OAuth code exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub access_token: String,
}
