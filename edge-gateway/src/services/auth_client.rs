//! HTTP client for the session service.

use axum::http::StatusCode;
use axum_extra::extract::cookie::Cookie;
use reqwest::header;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::SessionServiceSettings;
use crate::policy::SessionState;
use crate::services::refresh::RefreshError;
use crate::utils::cookies::ACCESS_TOKEN_COOKIE;

/// Session snapshot returned by `GET /auth/me`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSnapshot {
    pub user: SessionUser,
    pub two_factor_verified: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub two_factor_enabled: bool,
    pub profile_complete: bool,
}

impl SessionSnapshot {
    pub fn to_state(&self) -> SessionState {
        SessionState {
            authenticated: true,
            two_factor_required: self.user.two_factor_enabled,
            two_factor_verified: self.two_factor_verified,
            profile_complete: self.user.profile_complete,
        }
    }
}

/// Fresh credentials minted by a refresh: the raw Set-Cookie headers to hand
/// back to the browser, plus the new access token for immediate replay.
#[derive(Debug, Clone)]
pub struct RefreshedSession {
    pub set_cookies: Vec<String>,
    pub access_token: String,
}

#[derive(Clone)]
pub struct AuthClient {
    client: reqwest::Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(settings: &SessionServiceSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: settings.url.clone(),
        }
    }

    /// Resolve the session behind a Cookie header. `Ok(None)` means the
    /// access token was missing, expired or otherwise rejected.
    pub async fn fetch_session(
        &self,
        cookie_header: &str,
    ) -> Result<Option<SessionSnapshot>, anyhow::Error> {
        let url = format!("{}/auth/me", self.base_url);

        let response = self
            .client
            .get(&url)
            .header(header::COOKIE, cookie_header)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send GET request to {}: {}", url, e);
                anyhow::anyhow!("HTTP request failed: {}", e)
            })?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "session lookup failed with status {}",
                response.status()
            ));
        }

        let snapshot = response
            .json::<SessionSnapshot>()
            .await
            .map_err(|e| anyhow::anyhow!("invalid session snapshot: {}", e))?;

        Ok(Some(snapshot))
    }

    /// Perform the actual refresh call. Callers must go through the
    /// single-flight registry rather than hitting this directly.
    pub async fn refresh(&self, cookie_header: &str) -> Result<RefreshedSession, RefreshError> {
        let url = format!("{}/auth/refresh", self.base_url);

        let response = self
            .client
            .post(&url)
            .header(header::COOKIE, cookie_header)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send POST request to {}: {}", url, e);
                RefreshError::Transport(e.to_string())
            })?;

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "Refresh rejected");
            return Err(RefreshError::Reauthenticate);
        }

        let set_cookies: Vec<String> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(|value| value.to_string())
            .collect();

        let access_token = set_cookies
            .iter()
            .filter_map(|raw| Cookie::parse(raw.clone()).ok())
            .find(|cookie| cookie.name() == ACCESS_TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(|| {
                RefreshError::Transport("refresh response carried no access cookie".to_string())
            })?;

        Ok(RefreshedSession {
            set_cookies,
            access_token,
        })
    }
}
