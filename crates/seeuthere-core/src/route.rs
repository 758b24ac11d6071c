// ABOUTME: Explicit ordered route table mapping navigable paths to logical pages.
// ABOUTME: Resolves a request path deterministically: most specific match wins, first-listed breaks ties.

use serde::Serialize;
use thiserror::Error;

/// Errors raised while building a route table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("path {path} is declared by both {first:?} and {second:?}")]
    DuplicatePath {
        path: &'static str,
        first: Page,
        second: Page,
    },

    #[error("path {0:?} must start with '/'")]
    InvalidPath(&'static str),

    #[error("route for {0:?} declares no paths")]
    NoPaths(Page),
}

/// Logical pages of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    Home,
    Midpoint,
    Welcome,
    Profile,
    Address,
    Friend,
    Login,
    OAuth,
    Logout,
    NotFound,
}

impl Page {
    pub fn name(&self) -> &'static str {
        match self {
            Page::Home => "home",
            Page::Midpoint => "midpoint",
            Page::Welcome => "welcome",
            Page::Profile => "profile",
            Page::Address => "address",
            Page::Friend => "friend",
            Page::Login => "login",
            Page::OAuth => "oauth",
            Page::Logout => "logout",
            Page::NotFound => "not_found",
        }
    }
}

/// One row of the route table.
#[derive(Debug, Clone, Serialize)]
pub struct RouteEntry {
    pub page: Page,
    /// Alternative paths that all lead to `page`.
    pub paths: Vec<&'static str>,
    /// Exact entries match only the whole path; otherwise any continuation
    /// at a `/` segment boundary matches too.
    pub exact: bool,
    pub protected: bool,
}

impl RouteEntry {
    pub fn exact(page: Page, path: &'static str) -> Self {
        Self {
            page,
            paths: vec![path],
            exact: true,
            protected: false,
        }
    }

    pub fn prefix(page: Page, paths: &[&'static str]) -> Self {
        Self {
            page,
            paths: paths.to_vec(),
            exact: false,
            protected: false,
        }
    }

    /// Mark this entry as reachable only through the auth gate.
    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    /// Returns the specificity of the best path in this entry matching
    /// `path`, or None if no path matches.
    fn specificity(&self, path: &str) -> Option<(usize, &'static str)> {
        let mut best: Option<(usize, &'static str)> = None;
        for pattern in &self.paths {
            let matched = if self.exact {
                pattern.eq_ignore_ascii_case(path)
            } else {
                prefix_matches(pattern, path)
            };
            if matched {
                let score = segment_count(pattern);
                if best.is_none_or(|(s, _)| score > s) {
                    best = Some((score, *pattern));
                }
            }
        }
        best
    }
}

/// Result of resolving a path. Unmatched paths resolve to `Page::NotFound`
/// with no entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteMatch {
    pub page: Page,
    pub entry: Option<usize>,
    pub pattern: Option<&'static str>,
    pub protected: bool,
}

impl RouteMatch {
    fn not_found() -> Self {
        Self {
            page: Page::NotFound,
            entry: None,
            pattern: None,
            protected: false,
        }
    }
}

/// Ordered list of route entries, evaluated deterministically. Matching
/// ignores ASCII case.
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Build a table, rejecting duplicate or malformed paths.
    pub fn new(entries: Vec<RouteEntry>) -> Result<Self, RouteError> {
        let mut seen: Vec<(&'static str, Page)> = Vec::new();
        for entry in &entries {
            if entry.paths.is_empty() {
                return Err(RouteError::NoPaths(entry.page));
            }
            for path in &entry.paths {
                if !path.starts_with('/') {
                    return Err(RouteError::InvalidPath(*path));
                }
                if let Some((_, first)) = seen.iter().find(|(p, _)| p.eq_ignore_ascii_case(path)) {
                    return Err(RouteError::DuplicatePath {
                        path: *path,
                        first: *first,
                        second: entry.page,
                    });
                }
                seen.push((*path, entry.page));
            }
        }
        Ok(Self { entries })
    }

    /// The application's route table.
    pub fn standard() -> Self {
        Self {
            entries: standard_entries(),
        }
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Resolve a raw request path to exactly one page.
    pub fn resolve(&self, raw_path: &str) -> RouteMatch {
        let path = normalize_path(raw_path);
        let mut best: Option<(usize, usize, &'static str)> = None;

        for (index, entry) in self.entries.iter().enumerate() {
            if let Some((score, pattern)) = entry.specificity(path) {
                // Strictly greater so the first-listed entry keeps ties.
                if best.is_none_or(|(s, _, _)| score > s) {
                    best = Some((score, index, pattern));
                }
            }
        }

        match best {
            Some((_, index, pattern)) => {
                let entry = &self.entries[index];
                RouteMatch {
                    page: entry.page,
                    entry: Some(index),
                    pattern: Some(pattern),
                    protected: entry.protected,
                }
            }
            None => RouteMatch::not_found(),
        }
    }

    /// Canonical path for a page, used when rendering links and redirects.
    pub fn path_of(&self, page: Page) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|e| e.page == page)
            .and_then(|e| e.paths.first().copied())
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Entries of the application's route table, in evaluation order.
pub fn standard_entries() -> Vec<RouteEntry> {
    vec![
        RouteEntry::exact(Page::Home, "/"),
        RouteEntry::exact(Page::Midpoint, "/midpoint"),
        RouteEntry::prefix(Page::Welcome, &["/welcome"]).protected(),
        RouteEntry::prefix(Page::Profile, &["/profile"]).protected(),
        RouteEntry::prefix(Page::Address, &["/address"]).protected(),
        RouteEntry::prefix(Page::Friend, &["/friend"]).protected(),
        RouteEntry::exact(Page::Login, "/login"),
        RouteEntry::prefix(Page::OAuth, &["/login/kakao", "/login/naver"]),
        RouteEntry::prefix(Page::Logout, &["/logout"]),
        RouteEntry::exact(Page::NotFound, "/not-found"),
    ]
}

/// Strip query string, fragment and trailing slashes. An empty path is `/`.
pub fn normalize_path(raw: &str) -> &str {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    let trimmed = raw[..end].trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

fn prefix_matches(pattern: &str, path: &str) -> bool {
    if pattern == "/" {
        return true;
    }
    match path.get(..pattern.len()) {
        Some(head) if head.eq_ignore_ascii_case(pattern) => {
            let rest = &path[pattern.len()..];
            rest.is_empty() || rest.starts_with('/')
        }
        _ => false,
    }
}

fn segment_count(pattern: &str) -> usize {
    pattern.split('/').filter(|s| !s.is_empty()).count()
}
