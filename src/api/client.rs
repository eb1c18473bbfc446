use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response};
use std::sync::RwLock;
use tokio::sync::broadcast;

use crate::api::types::{ApiError, AuthEvent, Session};
use crate::config;

const AUTH_EVENT_CAPACITY: usize = 16;

/// Client for the managed backend: auth endpoints under `/auth/v1` and
/// filtered row access under `/rest/v1`. Owns the current session and
/// broadcasts auth-state changes to subscribers.
pub struct ApiClient {
    client: Client,
    base_url: Option<String>,
    api_key: Option<String>,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiClient {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            client: Client::new(),
            base_url: None,
            api_key: None,
            session: RwLock::new(None),
            events,
        }
    }

    pub fn new_with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            client: Client::new(),
            base_url: Some(base_url.into()),
            api_key: Some(api_key.into()),
            session: RwLock::new(None),
            events,
        }
    }

    pub(crate) fn http_client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn resolved_base_url(&self) -> String {
        match &self.base_url {
            Some(base) => base.clone(),
            None => config::api_base_url(),
        }
    }

    fn resolved_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(config::api_key)
    }

    pub(crate) fn api_key_value(&self) -> Result<HeaderValue, ApiError> {
        HeaderValue::from_str(&self.resolved_api_key().unwrap_or_default())
            .map_err(|_| ApiError::unknown("Invalid API key format"))
    }

    /// Headers for every backend request: the project API key, plus a bearer
    /// token (the session's access token when signed in, the API key
    /// otherwise, matching the anonymous-access convention).
    pub(crate) fn request_headers(&self) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", self.api_key_value()?);
        let bearer = self
            .current_session()
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.resolved_api_key().unwrap_or_default());
        headers.insert(
            AUTHORIZATION,
            format!("Bearer {}", bearer)
                .parse()
                .map_err(|_| ApiError::unknown("Invalid token format"))?,
        );
        Ok(headers)
    }

    pub fn current_session(&self) -> Option<Session> {
        self.session.read().expect("session lock poisoned").clone()
    }

    /// Installs a session and announces the sign-in. Replaces any previous
    /// session; at most one is ever current.
    pub fn set_session(&self, session: Session) {
        *self.session.write().expect("session lock poisoned") = Some(session.clone());
        let _ = self.events.send(AuthEvent::SignedIn(session));
    }

    pub(crate) fn replace_session(&self, session: Session) {
        *self.session.write().expect("session lock poisoned") = Some(session.clone());
        let _ = self.events.send(AuthEvent::Refreshed(session));
    }

    pub fn clear_session(&self) {
        let had_session = self
            .session
            .write()
            .expect("session lock poisoned")
            .take()
            .is_some();
        if had_session {
            let _ = self.events.send(AuthEvent::SignedOut);
        }
    }

    /// Auth-state change feed. Receivers that fall behind see a lag error
    /// and should re-read `current_session`.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

/// Reads the backend's error envelope out of a non-success response.
pub(crate) async fn error_from_response(response: Response) -> ApiError {
    let status = response.status().as_u16();
    match response.json::<serde_json::Value>().await {
        Ok(body) => ApiError::from_envelope(status, &body),
        Err(_) => ApiError::request_failed(format!("HTTP {}", status)),
    }
}
