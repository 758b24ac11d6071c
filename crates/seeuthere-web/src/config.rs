// ABOUTME: Configuration loading and validation for the seeuthere web shell.
// ABOUTME: Reads SEEUTHERE_* environment variables and enforces URL and bind-address constraints.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SEEUTHERE_BIND is not a valid socket address: {0}")]
    InvalidBind(String),

    #[error("SEEUTHERE_API_BASE_URL must start with http:// or https://, got {0:?}")]
    InvalidApiBaseUrl(String),

    #[error("SEEUTHERE_SESSION_COOKIE must be a non-empty cookie name without '=', ';' or spaces")]
    InvalidCookieName,
}

/// Web shell configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub bind: SocketAddr,
    pub api_base_url: String,
    pub environment: String,
    pub devtools: bool,
    pub session_cookie: String,
    pub kakao_auth_url: String,
    pub naver_auth_url: String,
}

impl ShellConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - SEEUTHERE_BIND: socket address to bind (default: 127.0.0.1:3000)
    /// - SEEUTHERE_API_BASE_URL: backend API root (default: http://localhost:8080)
    /// - SEEUTHERE_ENV: deployment environment (default: development)
    /// - SEEUTHERE_DEVTOOLS: force the query devtools panel on or off
    /// - SEEUTHERE_SESSION_COOKIE: access-token cookie name (default: accessToken)
    /// - SEEUTHERE_KAKAO_AUTH_URL / SEEUTHERE_NAVER_AUTH_URL: OAuth entry points
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(None, None)
    }

    /// Like [`ShellConfig::from_env`], with command-line values taking
    /// precedence over SEEUTHERE_BIND and SEEUTHERE_API_BASE_URL.
    pub fn from_env_with(
        bind: Option<String>,
        api_base_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = bind
            .or_else(|| std::env::var("SEEUTHERE_BIND").ok())
            .unwrap_or_else(|| "127.0.0.1:3000".to_string());
        let api_base_url = api_base_url
            .or_else(|| std::env::var("SEEUTHERE_API_BASE_URL").ok())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| "http://localhost:8080".to_string());
        let environment = std::env::var("SEEUTHERE_ENV")
            .ok()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| "development".to_string());
        let devtools = std::env::var("SEEUTHERE_DEVTOOLS")
            .ok()
            .filter(|v| !v.is_empty())
            .map(|v| v == "true" || v == "1" || v == "yes");
        let session_cookie = std::env::var("SEEUTHERE_SESSION_COOKIE")
            .unwrap_or_else(|_| "accessToken".to_string());
        let kakao_auth_url = std::env::var("SEEUTHERE_KAKAO_AUTH_URL").ok().filter(|u| !u.is_empty());
        let naver_auth_url = std::env::var("SEEUTHERE_NAVER_AUTH_URL").ok().filter(|u| !u.is_empty());

        Self::build(
            &bind,
            &api_base_url,
            environment,
            devtools,
            session_cookie,
            kakao_auth_url,
            naver_auth_url,
        )
    }

    /// Validate raw settings and fill in derived defaults.
    pub fn build(
        bind: &str,
        api_base_url: &str,
        environment: String,
        devtools: Option<bool>,
        session_cookie: String,
        kakao_auth_url: Option<String>,
        naver_auth_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind: SocketAddr = bind
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind.to_string()))?;

        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidApiBaseUrl(api_base_url.to_string()));
        }
        let api_base_url = api_base_url.trim_end_matches('/').to_string();

        if session_cookie.is_empty()
            || session_cookie.contains(|c: char| c == '=' || c == ';' || c.is_whitespace())
        {
            return Err(ConfigError::InvalidCookieName);
        }

        // Devtools are a development aid; production only gets them on request.
        let devtools = devtools.unwrap_or(environment != "production");

        let kakao_auth_url =
            kakao_auth_url.unwrap_or_else(|| format!("{}/api/kakao/authorize", api_base_url));
        let naver_auth_url =
            naver_auth_url.unwrap_or_else(|| format!("{}/api/naver/authorize", api_base_url));

        Ok(Self {
            bind,
            api_base_url,
            environment,
            devtools,
            session_cookie,
            kakao_auth_url,
            naver_auth_url,
        })
    }

    /// Defaults for tests and local runs: development mode, devtools on.
    pub fn local() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            api_base_url: "http://localhost:8080".to_string(),
            environment: "development".to_string(),
            devtools: true,
            session_cookie: "accessToken".to_string(),
            kakao_auth_url: "http://localhost:8080/api/kakao/authorize".to_string(),
            naver_auth_url: "http://localhost:8080/api/naver/authorize".to_string(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
