// ABOUTME: Explicit per-page context objects: user identity, participants, and map view.
// ABOUTME: PageContext is built per matched route; the map view exists only for the midpoint page.

use serde::Serialize;
use ulid::Ulid;

use crate::model::{Participant, Point};
use crate::route::Page;
use crate::session::Session;

/// Zoom levels accepted by the map view, closest first.
pub const MIN_MAP_LEVEL: u8 = 1;
pub const MAX_MAP_LEVEL: u8 = 14;
pub const DEFAULT_MAP_LEVEL: u8 = 5;

/// Map center used before any participant is added (Seoul City Hall).
pub const DEFAULT_MAP_CENTER: Point = Point {
    x: 126.978_4,
    y: 37.566_6,
};

/// Identity of the current visitor.
#[derive(Debug, Clone, Default)]
pub struct UserContext {
    pub session: Session,
}

impl UserContext {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }
}

/// People taking part in the current midpoint search.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParticipantContext {
    participants: Vec<Participant>,
}

impl ParticipantContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Add a participant and return its id.
    pub fn add(&mut self, name: impl Into<String>, address: impl Into<String>, point: Point) -> Ulid {
        let id = Ulid::new();
        self.participants.push(Participant {
            id,
            name: name.into(),
            address: address.into(),
            point,
        });
        id
    }

    /// Remove a participant. Returns false if the id was unknown.
    pub fn remove(&mut self, id: Ulid) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| p.id != id);
        self.participants.len() != before
    }

    pub fn points(&self) -> Vec<Point> {
        self.participants.iter().map(|p| p.point).collect()
    }

    pub fn centroid(&self) -> Option<Point> {
        Point::centroid(&self.points())
    }
}

/// Requested map position, typically from query parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MapViewRequest {
    pub center: Option<Point>,
    pub level: Option<u8>,
}

/// Map view state for the midpoint page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapViewContext {
    pub center: Point,
    pub level: u8,
}

impl MapViewContext {
    pub fn new(center: Point, level: u8) -> Self {
        Self {
            center,
            level: level.clamp(MIN_MAP_LEVEL, MAX_MAP_LEVEL),
        }
    }

    /// Resolve the map view: explicit center, else the participants'
    /// centroid, else the default center.
    pub fn resolve(request: MapViewRequest, participants: &ParticipantContext) -> Self {
        let center = request
            .center
            .filter(Point::is_valid)
            .or_else(|| participants.centroid())
            .unwrap_or(DEFAULT_MAP_CENTER);
        Self::new(center, request.level.unwrap_or(DEFAULT_MAP_LEVEL))
    }
}

/// Which scoped containers a page receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Providers {
    pub user: bool,
    pub participants: bool,
    pub map_view: bool,
}

impl Providers {
    pub fn for_page(page: Page) -> Self {
        Self {
            user: true,
            participants: true,
            map_view: page == Page::Midpoint,
        }
    }
}

/// Everything a page renderer may read, passed explicitly.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub page: Page,
    pub user: UserContext,
    pub participants: ParticipantContext,
    pub map_view: Option<MapViewContext>,
}

impl PageContext {
    pub fn build(
        page: Page,
        user: UserContext,
        participants: ParticipantContext,
        map_request: MapViewRequest,
    ) -> Self {
        let map_view = Providers::for_page(page)
            .map_view
            .then(|| MapViewContext::resolve(map_request, &participants));
        Self {
            page,
            user,
            participants,
            map_view,
        }
    }
}
