// ABOUTME: Cookie helpers for the session token and the per-visitor id.
// ABOUTME: Parses the Cookie header and builds Set-Cookie values for login, logout and new visitors.

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use seeuthere_core::Session;
use ulid::Ulid;

/// Cookie holding the visitor id that keys participant state.
pub const VISITOR_COOKIE: &str = "seeuthere_visitor";

/// Value of the named cookie, if present and non-empty.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

/// Session carried by the request's access-token cookie.
pub fn session_from_headers(headers: &HeaderMap, cookie_name: &str) -> Session {
    Session::from_token(read_cookie(headers, cookie_name))
}

/// Visitor id from the request, or None if missing or malformed.
pub fn visitor_from_headers(headers: &HeaderMap) -> Option<Ulid> {
    read_cookie(headers, VISITOR_COOKIE).and_then(|v| v.parse().ok())
}

pub fn session_cookie(name: &str, token: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", name, token)
}

pub fn expired_cookie(name: &str) -> String {
    format!("{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax", name)
}

pub fn visitor_cookie(id: Ulid) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", VISITOR_COOKIE, id)
}
