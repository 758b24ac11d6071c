// ABOUTME: Page renderers and their Askama templates, one per logical page.
// ABOUTME: Each renderer receives the explicit PageContext and fetches through the shared query cache.

use std::collections::HashMap;

use askama::Template;
use askama_derive_axum::IntoResponse as AskamaIntoResponse;
use axum::http::{StatusCode, header};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use seeuthere_core::{
    FetchError, Location, MapViewContext, MapViewRequest, MidpointResult, OAuthProvider, Page,
    PageContext, PlaceCategory, Point, QueryKey, RouteMatch, UserContext, UserProfile,
};

use super::Chrome;
use crate::app_state::AppState;
use crate::cookies::{expired_cookie, session_cookie};

/// Render the page for `ctx`.
pub async fn render(
    state: &AppState,
    ctx: &PageContext,
    route: &RouteMatch,
    params: &HashMap<String, String>,
) -> Response {
    match ctx.page {
        Page::Home => HomeTemplate {
            chrome: Chrome::build(state, ctx).await,
        }
        .into_response(),
        Page::Midpoint => midpoint(state, ctx, params).await,
        Page::Welcome => welcome(state, ctx).await,
        Page::Profile => profile(state, ctx).await,
        Page::Address => address(state, ctx).await,
        Page::Friend => friend(state, ctx).await,
        Page::Login => LoginTemplate {
            chrome: Chrome::build(state, ctx).await,
            kakao_url: state.config.kakao_auth_url.clone(),
            naver_url: state.config.naver_auth_url.clone(),
        }
        .into_response(),
        Page::OAuth => oauth(state, ctx, route, params).await,
        Page::Logout => logout(state, ctx).await,
        Page::NotFound => (
            StatusCode::NOT_FOUND,
            NotFoundTemplate {
                chrome: Chrome::build(state, ctx).await,
            },
        )
            .into_response(),
    }
}

/// Invalid tokens end the session; other failures become a visible error state.
pub(crate) fn failure(state: &AppState, err: FetchError) -> Result<String, Response> {
    if err.is_invalid_token() {
        tracing::info!(error = %err, "invalid token, ending session");
        Err(Redirect::to(state.path_of(Page::Logout)).into_response())
    } else {
        Ok(err.message)
    }
}

/// Query key scoped to the signed-in user, with the token to fetch with.
fn user_key<'a>(
    state: &AppState,
    user: &'a UserContext,
    name: &str,
) -> Result<(QueryKey, &'a str), Response> {
    match (user.session.token(), user.session.fingerprint()) {
        (Some(token), Some(fp)) => Ok((QueryKey::new([name.to_string(), fp]), token)),
        // The auth gate keeps anonymous visitors off these pages.
        _ => Err(Redirect::to(state.gate.login_path()).into_response()),
    }
}

/// Locations matching an address or place name. Address lookup comes
/// first; when it finds nothing, keyword place search fills in.
pub async fn search_locations(state: &AppState, query: &str) -> Result<Vec<Location>, FetchError> {
    let query = query.trim();
    let api = state.api.as_ref();

    let found = state
        .queries
        .fetch(QueryKey::new(["search", query]), move || api.coordinates(query))
        .await?;
    if !found.is_empty() {
        return Ok(found);
    }

    let places = state
        .queries
        .fetch(QueryKey::new(["places", query]), move || api.search_places(query))
        .await?;
    Ok(places
        .into_iter()
        .map(|p| Location {
            address_name: if p.road_address_name.is_empty() {
                p.address_name
            } else {
                p.road_address_name
            },
            place_name: p.place_name,
            x: p.x,
            y: p.y,
        })
        .collect())
}

fn point_key(name: &str, extra: Option<&str>, point: Point) -> QueryKey {
    let mut parts = vec![name.to_string()];
    parts.extend(extra.map(String::from));
    parts.push(format!("{},{}", coord(point.x), coord(point.y)));
    QueryKey::new(parts)
}

fn coord(v: f64) -> String {
    format!("{:.6}", v)
}

// -- Home / Login / NotFound --

#[derive(Template, AskamaIntoResponse)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub chrome: Chrome,
}

#[derive(Template, AskamaIntoResponse)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub chrome: Chrome,
    pub kakao_url: String,
    pub naver_url: String,
}

#[derive(Template, AskamaIntoResponse)]
#[template(path = "pages/not_found.html")]
pub struct NotFoundTemplate {
    pub chrome: Chrome,
}

// -- Midpoint --

pub struct ParticipantView {
    pub id: String,
    pub name: String,
    pub address: String,
    pub x: String,
    pub y: String,
}

pub struct MapView {
    pub x: String,
    pub y: String,
    pub level: u8,
}

pub struct PointView {
    pub x: String,
    pub y: String,
    /// Address at the point, when the reverse lookup found one.
    pub address: Option<String>,
}

pub struct CandidateView {
    pub label: String,
    pub address: String,
    pub x: String,
    pub y: String,
}

pub struct PlaceView {
    pub name: String,
    pub category: String,
    pub address: String,
    pub distance: String,
    pub url: String,
}

pub struct CategoryView {
    pub name: &'static str,
    pub selected: bool,
}

#[derive(Template, AskamaIntoResponse)]
#[template(path = "pages/midpoint.html")]
pub struct MidpointTemplate {
    pub chrome: Chrome,
    pub participants: Vec<ParticipantView>,
    pub full: bool,
    pub map: MapView,
    pub search: String,
    pub search_name: String,
    pub candidates: Vec<CandidateView>,
    pub searched: bool,
    pub result: Option<PointView>,
    pub categories: Vec<CategoryView>,
    pub places: Vec<PlaceView>,
    pub needs_more: bool,
    pub error: Option<String>,
}

/// Key identifying a midpoint search: the participants' coordinates, sorted
/// so the order participants were added in does not matter.
pub fn midpoint_key(points: &[Point]) -> QueryKey {
    let mut coords: Vec<String> = points
        .iter()
        .map(|p| format!("{},{}", coord(p.x), coord(p.y)))
        .collect();
    coords.sort();
    QueryKey::new(["midpoint".to_string(), coords.join("|")])
}

async fn midpoint(
    state: &AppState,
    ctx: &PageContext,
    params: &HashMap<String, String>,
) -> Response {
    let points = ctx.participants.points();
    let needs_more = points.len() < 2;
    let category = params
        .get("category")
        .and_then(|c| PlaceCategory::parse(c))
        .unwrap_or_default();
    let search = params
        .get("search")
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let api = state.api.as_ref();

    let mut errors = Vec::new();
    let mut record = |err: FetchError| -> Result<(), Response> {
        errors.push(failure(state, err)?);
        Ok(())
    };

    let mut candidates = Vec::new();
    if !search.is_empty() {
        match search_locations(state, &search).await {
            Ok(found) => {
                candidates = found
                    .iter()
                    .map(|l| CandidateView {
                        label: l.label().to_string(),
                        address: l.address_name.clone(),
                        x: coord(l.x),
                        y: coord(l.y),
                    })
                    .collect()
            }
            Err(err) => {
                if let Err(redirect) = record(err) {
                    return redirect;
                }
            }
        }
    }

    let mut result = None;
    let mut places = Vec::new();
    if !needs_more {
        let pts = points.as_slice();
        match state
            .queries
            .fetch(midpoint_key(pts), move || api.midpoint(pts))
            .await
        {
            Ok(MidpointResult { x, y }) => {
                let at = Point::new(x, y);

                let address = match state
                    .queries
                    .fetch(point_key("address", None, at), move || api.address_at(at))
                    .await
                {
                    Ok(found) => found.into_iter().next().map(|a| {
                        if a.building_name.is_empty() {
                            a.main_address
                        } else {
                            format!("{} ({})", a.main_address, a.building_name)
                        }
                    }),
                    Err(err) => {
                        if let Err(redirect) = record(err) {
                            return redirect;
                        }
                        None
                    }
                };

                match state
                    .queries
                    .fetch(point_key("nearby", Some(category.as_str()), at), move || {
                        api.nearby(category, at)
                    })
                    .await
                {
                    Ok(found) => {
                        places = found
                            .into_iter()
                            .map(|p| PlaceView {
                                name: p.place_name,
                                category: p.category_group_name,
                                address: if p.road_address_name.is_empty() {
                                    p.address_name
                                } else {
                                    p.road_address_name
                                },
                                distance: p.distance,
                                url: p.place_url,
                            })
                            .collect()
                    }
                    Err(err) => {
                        if let Err(redirect) = record(err) {
                            return redirect;
                        }
                    }
                }

                result = Some(PointView {
                    x: coord(x),
                    y: coord(y),
                    address,
                });
            }
            Err(err) => {
                if let Err(redirect) = record(err) {
                    return redirect;
                }
            }
        }
    }

    // PageContext::build always provides a map view for this page.
    let view = ctx
        .map_view
        .unwrap_or_else(|| MapViewContext::resolve(MapViewRequest::default(), &ctx.participants));

    MidpointTemplate {
        chrome: Chrome::build(state, ctx).await,
        participants: ctx
            .participants
            .participants()
            .iter()
            .map(|p| ParticipantView {
                id: p.id.to_string(),
                name: p.name.clone(),
                address: p.address.clone(),
                x: coord(p.point.x),
                y: coord(p.point.y),
            })
            .collect(),
        full: ctx.participants.len() >= state.visitors.limits().max_participants,
        map: MapView {
            x: coord(view.center.x),
            y: coord(view.center.y),
            level: view.level,
        },
        searched: !search.is_empty(),
        search,
        search_name: params
            .get("name")
            .map(|n| n.trim().to_string())
            .unwrap_or_default(),
        candidates,
        result,
        categories: PlaceCategory::ALL
            .into_iter()
            .map(|c| CategoryView {
                name: c.as_str(),
                selected: c == category,
            })
            .collect(),
        places,
        needs_more,
        error: if errors.is_empty() {
            None
        } else {
            Some(errors.join(" "))
        },
    }
    .into_response()
}

// -- Welcome / Profile --

#[derive(Template, AskamaIntoResponse)]
#[template(path = "pages/welcome.html")]
pub struct WelcomeTemplate {
    pub chrome: Chrome,
    pub nickname: Option<String>,
    pub error: Option<String>,
}

pub struct ProfileView {
    pub nickname: String,
    pub member_id: String,
    pub image: Option<String>,
}

#[derive(Template, AskamaIntoResponse)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub chrome: Chrome,
    pub profile: Option<ProfileView>,
    pub error: Option<String>,
}

async fn load_profile(
    state: &AppState,
    ctx: &PageContext,
) -> Result<Result<UserProfile, String>, Response> {
    let (key, token) = user_key(state, &ctx.user, "profile")?;
    let api = state.api.as_ref();
    match state.queries.fetch(key, move || api.profile(token)).await {
        Ok(profile) => Ok(Ok(profile)),
        Err(err) => failure(state, err).map(Err),
    }
}

async fn welcome(state: &AppState, ctx: &PageContext) -> Response {
    let loaded = match load_profile(state, ctx).await {
        Ok(loaded) => loaded,
        Err(redirect) => return redirect,
    };
    let (nickname, error) = match loaded {
        Ok(profile) => (Some(profile.nickname), None),
        Err(message) => (None, Some(message)),
    };
    WelcomeTemplate {
        chrome: Chrome::build(state, ctx).await,
        nickname,
        error,
    }
    .into_response()
}

async fn profile(state: &AppState, ctx: &PageContext) -> Response {
    let loaded = match load_profile(state, ctx).await {
        Ok(loaded) => loaded,
        Err(redirect) => return redirect,
    };
    let (profile, error) = match loaded {
        Ok(p) => (
            Some(ProfileView {
                nickname: p.nickname,
                member_id: p.member_id.unwrap_or_default(),
                image: p.profile_image,
            }),
            None,
        ),
        Err(message) => (None, Some(message)),
    };
    ProfileTemplate {
        chrome: Chrome::build(state, ctx).await,
        profile,
        error,
    }
    .into_response()
}

// -- Address / Friend --

pub struct AddressView {
    pub nickname: String,
    pub full_address: String,
    pub x: String,
    pub y: String,
}

#[derive(Template, AskamaIntoResponse)]
#[template(path = "pages/address.html")]
pub struct AddressTemplate {
    pub chrome: Chrome,
    pub addresses: Vec<AddressView>,
    pub error: Option<String>,
}

async fn address(state: &AppState, ctx: &PageContext) -> Response {
    let (key, token) = match user_key(state, &ctx.user, "addresses") {
        Ok(k) => k,
        Err(redirect) => return redirect,
    };
    let api = state.api.as_ref();
    let (addresses, error) = match state.queries.fetch(key, move || api.addresses(token)).await {
        Ok(list) => (
            list.into_iter()
                .map(|a| AddressView {
                    nickname: a.nickname,
                    full_address: a.full_address,
                    x: coord(a.x),
                    y: coord(a.y),
                })
                .collect(),
            None,
        ),
        Err(err) => match failure(state, err) {
            Ok(message) => (Vec::new(), Some(message)),
            Err(redirect) => return redirect,
        },
    };
    AddressTemplate {
        chrome: Chrome::build(state, ctx).await,
        addresses,
        error,
    }
    .into_response()
}

pub struct FriendView {
    pub nickname: String,
    pub member_id: String,
}

#[derive(Template, AskamaIntoResponse)]
#[template(path = "pages/friend.html")]
pub struct FriendTemplate {
    pub chrome: Chrome,
    pub friends: Vec<FriendView>,
    pub error: Option<String>,
}

async fn friend(state: &AppState, ctx: &PageContext) -> Response {
    let (key, token) = match user_key(state, &ctx.user, "friends") {
        Ok(k) => k,
        Err(redirect) => return redirect,
    };
    let api = state.api.as_ref();
    let (friends, error) = match state.queries.fetch(key, move || api.friends(token)).await {
        Ok(list) => (
            list.into_iter()
                .map(|f| FriendView {
                    nickname: f.nickname,
                    member_id: f.member_id.unwrap_or_default(),
                })
                .collect(),
            None,
        ),
        Err(err) => match failure(state, err) {
            Ok(message) => (Vec::new(), Some(message)),
            Err(redirect) => return redirect,
        },
    };
    FriendTemplate {
        chrome: Chrome::build(state, ctx).await,
        friends,
        error,
    }
    .into_response()
}

// -- OAuth / Logout --

#[derive(Template, AskamaIntoResponse)]
#[template(path = "pages/oauth.html")]
pub struct OAuthTemplate {
    pub chrome: Chrome,
    pub provider: String,
    pub error: String,
}

async fn oauth(
    state: &AppState,
    ctx: &PageContext,
    route: &RouteMatch,
    params: &HashMap<String, String>,
) -> Response {
    let provider = route.pattern.and_then(OAuthProvider::from_path);
    let code = params.get("code").map(|c| c.trim()).filter(|c| !c.is_empty());

    let (status, error) = match (provider, code) {
        (None, _) => (StatusCode::NOT_FOUND, "Unknown login provider.".to_string()),
        (Some(_), None) => (
            StatusCode::BAD_REQUEST,
            "The login provider did not return an authorization code.".to_string(),
        ),
        (Some(provider), Some(code)) => match state.api.exchange_code(provider, code).await {
            Ok(token) => {
                tracing::info!(provider = provider.as_str(), "login succeeded");
                let cookie = session_cookie(&state.config.session_cookie, &token.access_token);
                return (
                    AppendHeaders([(header::SET_COOKIE, cookie)]),
                    Redirect::to(state.path_of(Page::Welcome)),
                )
                    .into_response();
            }
            Err(err) => {
                tracing::warn!(provider = provider.as_str(), error = %err, "login failed");
                (StatusCode::BAD_GATEWAY, format!("Login failed: {}", err.message))
            }
        },
    };

    (
        status,
        OAuthTemplate {
            chrome: Chrome::build(state, ctx).await,
            provider: provider.map(|p| p.as_str()).unwrap_or("unknown").to_string(),
            error,
        },
    )
        .into_response()
}

async fn logout(state: &AppState, ctx: &PageContext) -> Response {
    if let Some(fp) = ctx.user.session.fingerprint() {
        let removed = state.queries.invalidate_containing(&fp).await;
        tracing::info!(removed, "session ended");
    }
    (
        AppendHeaders([(
            header::SET_COOKIE,
            expired_cookie(&state.config.session_cookie),
        )]),
        Redirect::to(state.path_of(Page::Home)),
    )
        .into_response()
}
