// ABOUTME: Navigation dispatch for the web shell plus the midpoint participant form handlers.
// ABOUTME: Resolves the route, builds the explicit PageContext, and hands it to the page renderer.

pub mod pages;

use std::collections::HashMap;

use axum::extract::{Form, Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{AppendHeaders, Html, IntoResponse, Redirect, Response};
use seeuthere_core::{MapViewRequest, Page, PageContext, Point, QueryStatus, UserContext};
use serde::Deserialize;
use ulid::Ulid;

use crate::app_state::{AppState, SharedState};
use crate::cookies::{session_from_headers, visitor_cookie, visitor_from_headers};

/// Row of the query devtools panel.
#[derive(Debug, Clone)]
pub struct DevtoolsRow {
    pub key: String,
    pub status: &'static str,
    pub fetches: u32,
    pub failures: u32,
    pub updated_at: String,
    pub error: String,
}

/// Layout data shared by every page: nav bar state and the devtools panel.
#[derive(Debug, Clone)]
pub struct Chrome {
    pub page: &'static str,
    pub authenticated: bool,
    pub devtools: bool,
    pub queries: Vec<DevtoolsRow>,
}

impl Chrome {
    /// Build the layout for `ctx`. Call after the page's fetches so the
    /// devtools panel shows them.
    pub async fn build(state: &AppState, ctx: &PageContext) -> Self {
        let queries = if state.config.devtools {
            state
                .queries
                .snapshot()
                .await
                .into_iter()
                .map(|q| DevtoolsRow {
                    key: q.label,
                    status: status_label(q.status),
                    fetches: q.fetch_count,
                    failures: q.failure_count,
                    updated_at: q.updated_at.unwrap_or_default(),
                    error: q.error.unwrap_or_default(),
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            page: ctx.page.name(),
            authenticated: ctx.user.is_authenticated(),
            devtools: state.config.devtools,
            queries,
        }
    }
}

fn status_label(status: QueryStatus) -> &'static str {
    match status {
        QueryStatus::Idle => "idle",
        QueryStatus::Fetching => "fetching",
        QueryStatus::Success => "success",
        QueryStatus::Error => "error",
    }
}

/// Parse `?x=&y=&level=` into a map view request. Partial or malformed
/// coordinates are ignored.
fn map_request(params: &HashMap<String, String>) -> MapViewRequest {
    let coord = |name: &str| params.get(name).and_then(|v| v.parse::<f64>().ok());
    let center = match (coord("x"), coord("y")) {
        (Some(x), Some(y)) => Some(Point::new(x, y)),
        _ => None,
    };
    let level = params.get("level").and_then(|v| v.parse::<u8>().ok());
    MapViewRequest { center, level }
}

/// Fallback handler: every navigable path goes through the route table.
pub async fn navigate(
    State(state): State<SharedState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let route = state.routes.resolve(uri.path());
    let session = session_from_headers(&headers, &state.config.session_cookie);

    let (visitor, new_visitor) = match visitor_from_headers(&headers) {
        Some(id) => (id, false),
        None => (Ulid::new(), true),
    };
    let participants = state.visitors.participants(visitor).await;

    let ctx = PageContext::build(
        route.page,
        UserContext::new(session),
        participants,
        map_request(&params),
    );
    tracing::debug!(path = %uri.path(), page = ctx.page.name(), "rendering page");

    let response = pages::render(&state, &ctx, &route, &params).await;

    if new_visitor {
        (AppendHeaders([(header::SET_COOKIE, visitor_cookie(visitor))]), response).into_response()
    } else {
        response
    }
}

/// Form data for adding a participant on the midpoint page. Coordinates
/// are optional; without them the address is looked up.
#[derive(Debug, Deserialize)]
pub struct ParticipantForm {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
}

/// Coordinates typed into the form, if any.
fn form_point(form: &ParticipantForm) -> Result<Option<Point>, ()> {
    let field = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<f64>().map_err(|_| ()))
            .transpose()
    };
    match (field(&form.x)?, field(&form.y)?) {
        (Some(x), Some(y)) => Ok(Some(Point::new(x, y))),
        (None, None) => Ok(None),
        _ => Err(()),
    }
}

fn form_error(status: StatusCode, message: &'static str) -> Response {
    (status, Html(format!("<p class=\"error-msg\">{}</p>", message))).into_response()
}

/// POST /midpoint/participants - Add a participant, then return to the midpoint page.
pub async fn add_participant(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(form): Form<ParticipantForm>,
) -> Response {
    let name = form.name.trim();
    if name.is_empty() {
        return form_error(StatusCode::BAD_REQUEST, "A participant needs a name.");
    }

    let (point, address) = match form_point(&form) {
        Ok(Some(point)) => (point, form.address.trim().to_string()),
        Ok(None) if form.address.trim().is_empty() => {
            return form_error(StatusCode::BAD_REQUEST, "Enter an address or coordinates.");
        }
        Ok(None) => match pages::search_locations(&state, &form.address).await {
            Ok(found) => match found.into_iter().next() {
                Some(location) => (location.point(), location.address_name),
                None => {
                    return form_error(
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "No location matches that address.",
                    );
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, "address lookup failed");
                return form_error(StatusCode::BAD_GATEWAY, "Address lookup failed. Try again.");
            }
        },
        Err(()) => {
            return form_error(StatusCode::BAD_REQUEST, "Coordinates must be two numbers.");
        }
    };
    if !point.is_valid() {
        return form_error(StatusCode::BAD_REQUEST, "Coordinates are out of range.");
    }

    let (visitor, new_visitor) = match visitor_from_headers(&headers) {
        Some(id) => (id, false),
        None => (Ulid::new(), true),
    };

    let id = match state.visitors.add(visitor, name, &address, point).await {
        Ok(id) => id,
        Err(err) => {
            tracing::debug!(%visitor, error = %err, "participant rejected");
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Html(format!("<p class=\"error-msg\">{}</p>", err)),
            )
                .into_response();
        }
    };
    tracing::info!(%visitor, participant = %id, "participant added");

    let redirect = Redirect::to(state.path_of(Page::Midpoint));
    if new_visitor {
        (AppendHeaders([(header::SET_COOKIE, visitor_cookie(visitor))]), redirect).into_response()
    } else {
        redirect.into_response()
    }
}

/// POST /midpoint/participants/{id}/delete - Remove a participant.
pub async fn remove_participant(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = id.parse::<Ulid>() else {
        return form_error(StatusCode::BAD_REQUEST, "Invalid participant ID.");
    };

    if let Some(visitor) = visitor_from_headers(&headers) {
        if state.visitors.remove(visitor, id).await {
            tracing::info!(%visitor, participant = %id, "participant removed");
        }
    }

    Redirect::to(state.path_of(Page::Midpoint)).into_response()
}
