// ABOUTME: Auth gate middleware wrapping the protected routes of the web shell.
// ABOUTME: Resolves each request path against the route table and redirects anonymous visitors to login.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use futures::future::BoxFuture;
use seeuthere_core::{AuthGate, GateDecision, RouteTable};
use tower::{Layer, Service};

use crate::cookies::session_from_headers;

/// A tower Layer that applies the auth gate to protected routes.
#[derive(Clone)]
pub struct AuthGateLayer {
    routes: Arc<RouteTable>,
    gate: AuthGate,
    cookie_name: Arc<str>,
}

impl AuthGateLayer {
    pub fn new(routes: Arc<RouteTable>, gate: AuthGate, cookie_name: &str) -> Self {
        Self {
            routes,
            gate,
            cookie_name: Arc::from(cookie_name),
        }
    }
}

impl<S> Layer<S> for AuthGateLayer {
    type Service = AuthGateMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthGateMiddleware {
            inner,
            routes: Arc::clone(&self.routes),
            gate: self.gate.clone(),
            cookie_name: Arc::clone(&self.cookie_name),
        }
    }
}

/// The middleware service that checks the session on protected paths.
#[derive(Clone)]
pub struct AuthGateMiddleware<S> {
    inner: S,
    routes: Arc<RouteTable>,
    gate: AuthGate,
    cookie_name: Arc<str>,
}

impl<S> Service<Request<Body>> for AuthGateMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let route = self.routes.resolve(req.uri().path());
        let session = session_from_headers(req.headers(), &self.cookie_name);

        match self.gate.check(&route, &session) {
            GateDecision::Allow => {
                let mut inner = self.inner.clone();
                Box::pin(async move { inner.call(req).await })
            }
            GateDecision::Redirect(location) => {
                tracing::debug!(
                    path = %req.uri().path(),
                    page = route.page.name(),
                    "redirecting anonymous visitor to login"
                );
                Box::pin(async move {
                    let resp = Response::builder()
                        .status(StatusCode::SEE_OTHER)
                        .header(header::LOCATION, location)
                        .body(Body::empty())
                        .unwrap_or_else(|_| {
                            let mut fallback = Response::new(Body::empty());
                            *fallback.status_mut() = StatusCode::SEE_OTHER;
                            fallback
                        });
                    Ok(resp)
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::get;
    use http::Request;
    use tower::ServiceExt;

    fn test_router() -> Router {
        Router::new()
            .route("/", get(|| async { "home" }))
            .route("/friend", get(|| async { "friends" }))
            .route("/profile/edit", get(|| async { "edit profile" }))
            .route("/login/kakao", get(|| async { "oauth" }))
            .layer(AuthGateLayer::new(
                Arc::new(RouteTable::standard()),
                AuthGate::default(),
                "accessToken",
            ))
    }

    #[tokio::test]
    async fn gate_redirects_without_session() {
        let app = test_router();

        let resp = app
            .oneshot(Request::get("/friend").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn gate_allows_with_session_cookie() {
        let app = test_router();

        let resp = app
            .oneshot(
                Request::get("/friend")
                    .header("cookie", "accessToken=t0k3n")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn gate_covers_nested_protected_paths() {
        let app = test_router();

        let resp = app
            .oneshot(Request::get("/profile/edit").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn gate_ignores_other_cookies() {
        let app = test_router();

        let resp = app
            .oneshot(
                Request::get("/friend")
                    .header("cookie", "seeuthere_visitor=01ARZ3NDEKTSV4RRFFQ69G5FAV")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn gate_exempts_public_routes() {
        for path in ["/", "/login/kakao"] {
            let resp = test_router()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK, "path {}", path);
        }
    }
}
