// ABOUTME: Assembles the web shell into a single Axum Router with shared state.
// ABOUTME: Page navigation falls through to the route table; the auth gate and tracing wrap everything.

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::app_state::SharedState;
use crate::auth::AuthGateLayer;
use crate::{devtools, web};

/// Build the complete Axum router with all routes and shared state.
pub fn create_router(state: SharedState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/midpoint/participants", post(web::add_participant))
        .route(
            "/midpoint/participants/{id}/delete",
            post(web::remove_participant),
        );

    if state.config.devtools {
        router = router.route("/__devtools/queries", get(devtools::queries));
    }

    let gate = AuthGateLayer::new(
        std::sync::Arc::clone(&state.routes),
        state.gate.clone(),
        &state.config.session_cookie,
    );

    router
        .fallback(web::navigate)
        .layer(gate)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler. Returns 200 OK with a simple JSON body.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EXPIRED_TOKEN, GOOD_CODE, StubBackend, test_state};
    use axum::body::Body;
    use axum::response::Response;
    use http::{Request, StatusCode, header};
    use seeuthere_core::FetchError;
    use std::sync::Arc;
    use tower::ServiceExt;

    const VISITOR: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";

    async fn get(app: Router, path: &str, cookie: Option<&str>) -> Response {
        let mut req = Request::get(path);
        if let Some(cookie) = cookie {
            req = req.header("cookie", cookie);
        }
        app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap()
    }

    async fn post_form(app: Router, path: &str, cookie: &str, form: &str) -> Response {
        app.oneshot(
            Request::post(path)
                .header("cookie", cookie)
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
    }

    async fn body_text(resp: Response) -> String {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    fn location(resp: &Response) -> &str {
        resp.headers()[header::LOCATION].to_str().unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = create_router(test_state(Arc::new(StubBackend::new())));
        let resp = get(app, "/health", None).await;

        assert_eq!(resp.status(), 200);
        let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn home_renders_with_nav_and_sets_visitor_cookie() {
        let app = create_router(test_state(Arc::new(StubBackend::new())));
        let resp = get(app, "/", None).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let set_cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(set_cookie.starts_with("seeuthere_visitor="));

        let html = body_text(resp).await;
        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("data-page=\"home\""));
        assert!(html.contains("href=\"/login\""));
    }

    #[tokio::test]
    async fn unknown_paths_render_not_found() {
        let state = test_state(Arc::new(StubBackend::new()));
        for path in ["/nope", "/midpoint/extra", "/login/google", "/not-found"] {
            let resp = get(create_router(Arc::clone(&state)), path, None).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "path {}", path);
            let html = body_text(resp).await;
            assert!(html.contains("Page not found"), "path {}", path);
        }
    }

    #[tokio::test]
    async fn protected_pages_never_render_for_anonymous_visitors() {
        let backend = Arc::new(StubBackend::new());
        let state = test_state(Arc::clone(&backend));
        for path in ["/welcome", "/profile", "/address", "/friend", "/friend/requests"] {
            let resp = get(create_router(Arc::clone(&state)), path, None).await;
            assert_eq!(resp.status(), StatusCode::SEE_OTHER, "path {}", path);
            assert_eq!(location(&resp), "/login");
        }
        assert_eq!(backend.calls("profile"), 0);
        assert_eq!(backend.calls("friends"), 0);
        assert_eq!(backend.calls("addresses"), 0);
    }

    #[tokio::test]
    async fn friend_page_renders_and_caches_for_session() {
        let backend = Arc::new(StubBackend::new());
        let state = test_state(Arc::clone(&backend));

        for _ in 0..2 {
            let resp = get(
                create_router(Arc::clone(&state)),
                "/friend",
                Some("accessToken=t1"),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::OK);
            let html = body_text(resp).await;
            assert!(html.contains("biggs"));
            assert!(html.contains("jek"));
            assert!(html.contains("href=\"/logout\""));
        }

        assert_eq!(backend.calls("friends"), 1, "infinite staleness fetches once");
    }

    #[tokio::test]
    async fn welcome_and_profile_share_the_profile_query() {
        let backend = Arc::new(StubBackend::new());
        let state = test_state(Arc::clone(&backend));

        let resp = get(create_router(Arc::clone(&state)), "/welcome", Some("accessToken=t1")).await;
        assert!(body_text(resp).await.contains("Welcome, wedge!"));

        let resp = get(create_router(Arc::clone(&state)), "/profile", Some("accessToken=t1")).await;
        let html = body_text(resp).await;
        assert!(html.contains("wedge01"));

        assert_eq!(backend.calls("profile"), 1);
    }

    #[tokio::test]
    async fn address_page_lists_saved_addresses() {
        let app = create_router(test_state(Arc::new(StubBackend::new())));
        let resp = get(app, "/address", Some("accessToken=t1")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains("Sejong-daero"));
    }

    #[tokio::test]
    async fn invalid_token_redirects_to_logout_without_retry() {
        let backend = Arc::new(StubBackend::new());
        let state = test_state(Arc::clone(&backend));

        let cookie = format!("accessToken={}", EXPIRED_TOKEN);
        let resp = get(create_router(state), "/friend", Some(&cookie)).await;

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/logout");
        assert_eq!(backend.calls("friends"), 1);
    }

    #[tokio::test]
    async fn other_failures_retry_then_show_error_state() {
        let backend = Arc::new(
            StubBackend::new().failing("friends", FetchError::from_status(503, "backend unavailable")),
        );
        let state = test_state(Arc::clone(&backend));

        let resp = get(create_router(state), "/friend", Some("accessToken=t1")).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains("backend unavailable"));
        assert_eq!(backend.calls("friends"), 4);
    }

    #[tokio::test]
    async fn logout_clears_cookie_and_session_queries() {
        let backend = Arc::new(StubBackend::new());
        let state = test_state(Arc::clone(&backend));

        get(create_router(Arc::clone(&state)), "/friend", Some("accessToken=t1")).await;
        get(create_router(Arc::clone(&state)), "/friend", Some("accessToken=t2")).await;
        assert_eq!(state.queries.len().await, 2);

        let resp = get(create_router(Arc::clone(&state)), "/logout", Some("accessToken=t1")).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/");
        let cleared = resp
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|c| c.starts_with("accessToken=;"))
            .unwrap();
        assert!(cleared.contains("Max-Age=0"));

        assert_eq!(state.queries.len().await, 1, "other sessions keep their cache");
    }

    #[tokio::test]
    async fn both_oauth_paths_log_in_through_the_same_page() {
        let backend = Arc::new(StubBackend::new());
        let state = test_state(Arc::clone(&backend));

        for (path, token) in [("/login/kakao", "kakao-token"), ("/login/naver", "naver-token")] {
            let uri = format!("{}?code={}", path, GOOD_CODE);
            let resp = get(create_router(Arc::clone(&state)), &uri, None).await;
            assert_eq!(resp.status(), StatusCode::SEE_OTHER, "path {}", path);
            assert_eq!(location(&resp), "/welcome");
            let cookies: Vec<&str> = resp
                .headers()
                .get_all(header::SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect();
            assert!(
                cookies.iter().any(|c| c.starts_with(&format!("accessToken={};", token))),
                "cookies: {:?}",
                cookies
            );
        }
        assert_eq!(backend.calls("exchange_code"), 2);
    }

    #[tokio::test]
    async fn oauth_without_code_shows_error() {
        let app = create_router(test_state(Arc::new(StubBackend::new())));
        let resp = get(app, "/login/naver", None).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let html = body_text(resp).await;
        assert!(html.contains("data-provider=\"naver\""));
        assert!(html.contains("authorization code"));
    }

    #[tokio::test]
    async fn oauth_with_rejected_code_shows_error() {
        let app = create_router(test_state(Arc::new(StubBackend::new())));
        let resp = get(app, "/login/kakao?code=bad", None).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert!(body_text(resp).await.contains("authorization code rejected"));
    }

    #[tokio::test]
    async fn login_page_links_to_providers() {
        let app = create_router(test_state(Arc::new(StubBackend::new())));
        let html = body_text(get(app, "/login", None).await).await;
        assert!(html.contains("/api/kakao/authorize"));
        assert!(html.contains("/api/naver/authorize"));
    }

    #[tokio::test]
    async fn map_view_is_only_rendered_on_midpoint() {
        let state = test_state(Arc::new(StubBackend::new()));
        let cookie = "accessToken=t1";

        let html = body_text(get(create_router(Arc::clone(&state)), "/midpoint", Some(cookie)).await).await;
        assert!(html.contains("data-map-view"));

        for path in ["/", "/login", "/friend", "/profile", "/address", "/welcome", "/nope"] {
            let html = body_text(get(create_router(Arc::clone(&state)), path, Some(cookie)).await).await;
            assert!(!html.contains("data-map-view"), "path {}", path);
        }
    }

    #[tokio::test]
    async fn participants_flow_computes_midpoint() {
        let backend = Arc::new(StubBackend::new());
        let state = test_state(Arc::clone(&backend));
        let cookie = format!("seeuthere_visitor={}", VISITOR);

        let html = body_text(get(create_router(Arc::clone(&state)), "/midpoint", Some(&cookie)).await).await;
        assert!(html.contains("Add at least two participants"));

        for form in ["name=Ann&address=A&x=127.0&y=37.0", "name=Bo&address=B&x=127.2&y=37.4"] {
            let resp = post_form(create_router(Arc::clone(&state)), "/midpoint/participants", &cookie, form).await;
            assert_eq!(resp.status(), StatusCode::SEE_OTHER);
            assert_eq!(location(&resp), "/midpoint");
        }

        let html = body_text(get(create_router(Arc::clone(&state)), "/midpoint", Some(&cookie)).await).await;
        assert!(html.contains("Ann"));
        assert!(html.contains("Bo"));
        assert!(html.contains("data-x=\"127.100000\""));
        assert!(html.contains("data-y=\"37.200000\""));
        assert!(html.contains("data-center-x=\"127.100000\""));
        assert_eq!(backend.calls("midpoint"), 1);

        // Same participants hit the cache.
        get(create_router(Arc::clone(&state)), "/midpoint?level=3", Some(&cookie)).await;
        assert_eq!(backend.calls("midpoint"), 1);
    }

    fn visitor() -> ulid::Ulid {
        VISITOR.parse().unwrap()
    }

    #[tokio::test]
    async fn removing_last_participant_drops_visitor_state() {
        let state = test_state(Arc::new(StubBackend::new()));
        let cookie = format!("seeuthere_visitor={}", VISITOR);

        post_form(
            create_router(Arc::clone(&state)),
            "/midpoint/participants",
            &cookie,
            "name=Ann&address=A&x=127.0&y=37.0",
        )
        .await;
        let id = state.visitors.participants(visitor()).await.participants()[0].id;

        let resp = post_form(
            create_router(Arc::clone(&state)),
            &format!("/midpoint/participants/{}/delete", id),
            &cookie,
            "",
        )
        .await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert!(state.visitors.is_empty().await);
    }

    #[tokio::test]
    async fn invalid_participant_is_rejected() {
        let state = test_state(Arc::new(StubBackend::new()));
        let cookie = format!("seeuthere_visitor={}", VISITOR);
        for form in [
            "name=&address=A&x=127.0&y=37.0",
            "name=Ann&address=&x=&y=",
            "name=Ann&address=A&x=127.0",
            "name=Ann&address=A&x=500&y=37.0",
        ] {
            let resp = post_form(
                create_router(Arc::clone(&state)),
                "/midpoint/participants",
                &cookie,
                form,
            )
            .await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "form {}", form);
        }
        assert!(state.visitors.is_empty().await);
    }

    #[tokio::test]
    async fn cookieless_posts_cannot_grow_visitor_state_without_bound() {
        let state = Arc::new(
            crate::app_state::AppState::new(
                crate::config::ShellConfig::local(),
                Arc::new(StubBackend::new()),
                seeuthere_core::QueryOptions::default(),
            )
            .with_visitor_limits(crate::visitors::VisitorLimits {
                max_visitors: 16,
                ..Default::default()
            }),
        );

        for _ in 0..100 {
            let resp = create_router(Arc::clone(&state))
                .oneshot(
                    Request::post("/midpoint/participants")
                        .header("content-type", "application/x-www-form-urlencoded")
                        .body(Body::from("name=Ann&address=A&x=127.0&y=37.0"))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        }

        assert_eq!(state.visitors.len().await, 16);
    }

    #[tokio::test]
    async fn participant_list_is_capped() {
        let state = test_state(Arc::new(StubBackend::new()));
        let cookie = format!("seeuthere_visitor={}", VISITOR);
        let max = state.visitors.limits().max_participants;

        for i in 0..max {
            let form = format!("name=P{}&address=A&x=127.0&y=37.0", i);
            let resp = post_form(create_router(Arc::clone(&state)), "/midpoint/participants", &cookie, &form).await;
            assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        }
        let resp = post_form(
            create_router(Arc::clone(&state)),
            "/midpoint/participants",
            &cookie,
            "name=Extra&address=A&x=127.0&y=37.0",
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_text(resp).await.contains("at most"));
        assert_eq!(state.visitors.participants(visitor()).await.len(), max);

        let html = body_text(get(create_router(Arc::clone(&state)), "/midpoint", Some(&cookie)).await).await;
        assert!(html.contains("The participant list is full."));
        assert!(!html.contains("class=\"add-participant\""));
    }

    #[tokio::test]
    async fn participant_can_be_added_by_address() {
        let backend = Arc::new(StubBackend::new());
        let state = test_state(Arc::clone(&backend));
        let cookie = format!("seeuthere_visitor={}", VISITOR);

        for name in ["Ann", "Bo"] {
            let form = format!("name={}&address=Gangnam+Station&x=&y=", name);
            let resp = post_form(create_router(Arc::clone(&state)), "/midpoint/participants", &cookie, &form).await;
            assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        }

        let participants = state.visitors.participants(visitor()).await;
        assert_eq!(participants.len(), 2);
        assert_eq!(participants.participants()[0].point, seeuthere_core::Point::new(127.0276, 37.4979));
        assert_eq!(participants.participants()[0].address, "Seoul Gangnam Station");
        assert_eq!(backend.calls("coordinates"), 1, "second lookup is cached");
    }

    #[tokio::test]
    async fn unknown_address_is_rejected() {
        let state = test_state(Arc::new(StubBackend::new()));
        let cookie = format!("seeuthere_visitor={}", VISITOR);
        let resp = post_form(
            create_router(Arc::clone(&state)),
            "/midpoint/participants",
            &cookie,
            "name=Ann&address=Atlantis",
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_text(resp).await.contains("No location matches"));
        assert!(state.visitors.is_empty().await);
    }

    #[tokio::test]
    async fn failed_address_lookup_is_a_gateway_error() {
        let backend = Arc::new(
            StubBackend::new().failing("coordinates", FetchError::from_status(503, "map provider down")),
        );
        let state = test_state(backend);
        let cookie = format!("seeuthere_visitor={}", VISITOR);
        let resp = post_form(
            create_router(Arc::clone(&state)),
            "/midpoint/participants",
            &cookie,
            "name=Ann&address=Seoul+Station",
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn midpoint_search_lists_candidates() {
        let state = test_state(Arc::new(StubBackend::new()));
        let cookie = format!("seeuthere_visitor={}", VISITOR);

        let html = body_text(
            get(
                create_router(Arc::clone(&state)),
                "/midpoint?name=Ann&search=Seoul+Station",
                Some(&cookie),
            )
            .await,
        )
        .await;
        assert!(html.contains("class=\"search-results\""));
        assert!(html.contains("data-x=\"126.972300\""));
        assert!(html.contains("name=\"name\" value=\"Ann\""));

        let html = body_text(
            get(create_router(Arc::clone(&state)), "/midpoint?search=Jamsil", Some(&cookie)).await,
        )
        .await;
        assert!(html.contains("Jamsil Station"));

        let html = body_text(
            get(create_router(Arc::clone(&state)), "/midpoint?search=Atlantis", Some(&cookie)).await,
        )
        .await;
        assert!(html.contains("No matching locations."));
    }

    #[tokio::test]
    async fn midpoint_result_shows_address_and_nearby_places() {
        let backend = Arc::new(StubBackend::new());
        let state = test_state(Arc::clone(&backend));
        let cookie = format!("seeuthere_visitor={}", VISITOR);

        for form in ["name=Ann&address=A&x=127.0&y=37.0", "name=Bo&address=B&x=127.2&y=37.4"] {
            post_form(create_router(Arc::clone(&state)), "/midpoint/participants", &cookie, form).await;
        }

        let html = body_text(get(create_router(Arc::clone(&state)), "/midpoint", Some(&cookie)).await).await;
        assert!(html.contains("Seoul Jung-gu Taepyeong-ro 1-ga 31 (City Hall)"));
        assert!(html.contains("Blue Bottle"));
        assert!(html.contains("href=\"/midpoint?category=cafe\" class=\"selected\""));

        let html = body_text(
            get(create_router(Arc::clone(&state)), "/midpoint?category=subway", Some(&cookie)).await,
        )
        .await;
        assert!(html.contains("subway spot"));
        assert!(!html.contains("Blue Bottle"));

        get(create_router(Arc::clone(&state)), "/midpoint?category=cafe", Some(&cookie)).await;
        assert_eq!(backend.calls("nearby"), 2);
        assert_eq!(backend.calls("address_at"), 1);
    }

    #[tokio::test]
    async fn route_matching_ignores_case() {
        let state = test_state(Arc::new(StubBackend::new()));

        let resp = get(create_router(Arc::clone(&state)), "/Friend", None).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/login");

        let resp = get(create_router(Arc::clone(&state)), "/MIDPOINT", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains("data-map-view"));
    }

    #[tokio::test]
    async fn devtools_lists_cached_queries() {
        let state = test_state(Arc::new(StubBackend::new()));
        get(create_router(Arc::clone(&state)), "/friend", Some("accessToken=t1")).await;

        let resp = get(create_router(Arc::clone(&state)), "/__devtools/queries", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        let entries = json.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["status"], "success");
        assert_eq!(entries[0]["key"][0], "friends");

        let html = body_text(get(create_router(Arc::clone(&state)), "/", None).await).await;
        assert!(html.contains("id=\"query-devtools\""));
        assert!(html.contains("Query cache (1)"));
    }

    #[tokio::test]
    async fn devtools_are_absent_when_disabled() {
        let mut config = crate::config::ShellConfig::local();
        config.devtools = false;
        let state = Arc::new(crate::app_state::AppState::new(
            config,
            Arc::new(StubBackend::new()),
            seeuthere_core::QueryOptions::default(),
        ));

        let resp = get(create_router(Arc::clone(&state)), "/__devtools/queries", None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let html = body_text(get(create_router(state), "/", None).await).await;
        assert!(!html.contains("query-devtools"));
    }

    #[tokio::test]
    async fn pages_reject_other_methods() {
        let app = create_router(test_state(Arc::new(StubBackend::new())));
        let resp = app
            .oneshot(Request::delete("/midpoint").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn profile_query_key_uses_fingerprint_not_token() {
        let state = test_state(Arc::new(StubBackend::new()));
        get(create_router(Arc::clone(&state)), "/profile", Some("accessToken=secret-t")).await;

        let snapshot = state.queries.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].key.starts_with(&["profile"]));
        assert!(!snapshot[0].label.contains("secret-t"));
        assert!(!snapshot[0].key.contains("secret-t"));
    }
}
