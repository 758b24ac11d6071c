// ABOUTME: Auth gate decision for protected routes.
// ABOUTME: Allows a protected page only for an authenticated session, otherwise redirects to login.

use crate::route::RouteMatch;
use crate::session::Session;

/// Outcome of checking a route against the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect(&'static str),
}

/// Guards protected routes.
#[derive(Debug, Clone)]
pub struct AuthGate {
    login_path: &'static str,
}

impl Default for AuthGate {
    fn default() -> Self {
        Self::new("/login")
    }
}

impl AuthGate {
    pub fn new(login_path: &'static str) -> Self {
        Self { login_path }
    }

    pub fn login_path(&self) -> &'static str {
        self.login_path
    }

    pub fn check(&self, route: &RouteMatch, session: &Session) -> GateDecision {
        if !route.protected || session.is_authenticated() {
            GateDecision::Allow
        } else {
            GateDecision::Redirect(self.login_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{Page, RouteTable};

    #[test]
    fn protected_routes_redirect_anonymous_visitors() {
        let table = RouteTable::standard();
        let gate = AuthGate::default();
        for entry in table.entries().iter().filter(|e| e.protected) {
            for path in &entry.paths {
                let route = table.resolve(path);
                assert_eq!(
                    gate.check(&route, &Session::Anonymous),
                    GateDecision::Redirect("/login"),
                    "path {}",
                    path
                );
            }
        }
    }

    #[test]
    fn protected_routes_allow_authenticated_sessions() {
        let table = RouteTable::standard();
        let gate = AuthGate::default();
        let session = Session::from_token(Some("t"));
        assert_eq!(gate.check(&table.resolve("/friend"), &session), GateDecision::Allow);
        assert_eq!(gate.check(&table.resolve("/profile/edit"), &session), GateDecision::Allow);
    }

    #[test]
    fn public_routes_are_always_allowed() {
        let table = RouteTable::standard();
        let gate = AuthGate::default();
        for path in ["/", "/midpoint", "/login", "/login/kakao", "/logout", "/nowhere"] {
            let route = table.resolve(path);
            assert_eq!(gate.check(&route, &Session::Anonymous), GateDecision::Allow);
        }
        assert_eq!(table.resolve("/nowhere").page, Page::NotFound);
    }

    #[test]
    fn custom_login_path() {
        let table = RouteTable::standard();
        let gate = AuthGate::new("/signin");
        assert_eq!(
            gate.check(&table.resolve("/welcome"), &Session::Anonymous),
            GateDecision::Redirect("/signin")
        );
    }
}
