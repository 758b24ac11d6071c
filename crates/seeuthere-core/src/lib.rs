// ABOUTME: Core library for seeuthere: route table, auth gate, page contexts and query cache.
// ABOUTME: Framework-free logic shared by the web shell; no HTTP types appear here.

pub mod context;
pub mod error;
pub mod gate;
pub mod model;
pub mod query;
pub mod route;
pub mod session;

pub use context::{
    MapViewContext, MapViewRequest, PageContext, ParticipantContext, Providers, UserContext,
};
pub use error::{FetchError, FetchErrorKind, INVALID_TOKEN_ERROR};
pub use gate::{AuthGate, GateDecision};
pub use model::{
    AccessToken, Friend, Location, MidpointResult, OAuthProvider, Participant, Place, PlaceCategory,
    Point, SavedAddress, SpecificLocation, UserProfile,
};
pub use query::{QueryClient, QueryKey, QueryOptions, QuerySnapshot, QueryStatus, RetryPolicy, Staleness};
pub use route::{Page, RouteEntry, RouteError, RouteMatch, RouteTable};
pub use session::Session;
