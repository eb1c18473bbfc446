use serde_json::json;

use super::client::{error_from_response, ApiClient};
use super::types::{ApiError, AuthUser, Session, TokenResponse};

impl ApiClient {
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, ApiError> {
        let session = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?;
        self.set_session(session.clone());
        Ok(session)
    }

    /// Exchanges the current refresh token for a new session.
    pub async fn refresh_session(&self) -> Result<Session, ApiError> {
        let refresh_token = self
            .current_session()
            .map(|s| s.refresh_token)
            .ok_or_else(|| ApiError::unknown("No session to refresh"))?;
        let session = self
            .token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await?;
        self.replace_session(session.clone());
        Ok(session)
    }

    /// Completes a provider redirect that carried an authorization code.
    pub async fn exchange_code_for_session(&self, code: &str) -> Result<Session, ApiError> {
        let session = self
            .token_grant("pkce", json!({ "auth_code": code }))
            .await?;
        self.set_session(session.clone());
        Ok(session)
    }

    /// Installs bare tokens lifted out of a redirect fragment. The user
    /// descriptor is fetched with the access token so the session is
    /// complete; tokens that the backend rejects never get installed.
    pub async fn set_session_from_tokens(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, ApiError> {
        let user = self.get_user(access_token).await?;
        let session = TokenResponse {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            token_type: "bearer".to_string(),
            expires_in: 3600,
            user,
        }
        .into_session();
        self.set_session(session.clone());
        Ok(session)
    }

    pub async fn get_user(&self, access_token: &str) -> Result<AuthUser, ApiError> {
        let base_url = self.resolved_base_url();
        let response = self
            .http_client()
            .get(format!("{}/auth/v1/user", base_url))
            .header("apikey", self.api_key_value()?)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ApiError::request_failed(format!("Request failed: {}", e)))?;

        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| ApiError::decode(format!("Failed to parse response: {}", e)))
        } else {
            Err(error_from_response(response).await)
        }
    }

    /// Revokes the session remotely, then drops it locally whether or not
    /// the remote call succeeded.
    pub async fn sign_out(&self) -> Result<(), ApiError> {
        let result = match self.current_session() {
            Some(_) => {
                let base_url = self.resolved_base_url();
                let headers = self.request_headers()?;
                match self
                    .http_client()
                    .post(format!("{}/auth/v1/logout", base_url))
                    .headers(headers)
                    .send()
                    .await
                {
                    Ok(response) if response.status().is_success() => Ok(()),
                    Ok(response) => Err(error_from_response(response).await),
                    Err(e) => Err(ApiError::request_failed(format!("Request failed: {}", e))),
                }
            }
            None => Ok(()),
        };
        self.clear_session();
        result
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        payload: serde_json::Value,
    ) -> Result<Session, ApiError> {
        let base_url = self.resolved_base_url();
        let response = self
            .http_client()
            .post(format!(
                "{}/auth/v1/token?grant_type={}",
                base_url, grant_type
            ))
            .headers(self.request_headers()?)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ApiError::request_failed(format!("Request failed: {}", e)))?;

        if response.status().is_success() {
            let token: TokenResponse = response
                .json()
                .await
                .map_err(|e| ApiError::decode(format!("Failed to parse response: {}", e)))?;
            Ok(token.into_session())
        } else {
            Err(error_from_response(response).await)
        }
    }
}
