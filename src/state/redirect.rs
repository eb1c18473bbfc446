use log::warn;
use url::Url;

use crate::api::ApiClient;
use crate::state::auth::AuthStore;

/// What a redirect invocation ended in. There is no third state: the caller
/// either lands in the authenticated area or back on the sign-in screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectOutcome {
    SignedIn,
    SignInRequired,
}

/// Turns a provider redirect URL into an installed session and a settled
/// profile. Tries the authorization-code exchange first, then falls back to
/// tokens carried in the URL fragment. The profile reconciliation is awaited
/// so navigation can rely on it having finished.
pub async fn complete_sign_in(
    api: &ApiClient,
    store: &AuthStore,
    redirect_url: &str,
) -> RedirectOutcome {
    if install_session_from_url(api, redirect_url).await {
        store.refresh().await;
        RedirectOutcome::SignedIn
    } else {
        warn!("redirect URL carried no usable session, routing to sign-in");
        RedirectOutcome::SignInRequired
    }
}

async fn install_session_from_url(api: &ApiClient, redirect_url: &str) -> bool {
    let url = match Url::parse(redirect_url) {
        Ok(url) => url,
        Err(err) => {
            warn!("unparseable redirect URL: {}", err);
            return false;
        }
    };

    if let Some(code) = query_param(&url, "code") {
        match api.exchange_code_for_session(&code).await {
            Ok(_) => return true,
            Err(err) => warn!("code exchange failed, trying fragment tokens: {}", err),
        }
    }

    if let Some((access_token, refresh_token)) = fragment_tokens(&url) {
        match api.set_session_from_tokens(&access_token, &refresh_token).await {
            Ok(_) => return true,
            Err(err) => warn!("installing fragment tokens failed: {}", err),
        }
    }

    false
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Reads `access_token` and `refresh_token` out of a `#k=v&k=v` fragment.
fn fragment_tokens(url: &Url) -> Option<(String, String)> {
    let fragment = url.fragment()?;
    let mut access_token = None;
    let mut refresh_token = None;
    for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
        match key.as_ref() {
            "access_token" => access_token = Some(value.into_owned()),
            "refresh_token" => refresh_token = Some(value.into_owned()),
            _ => {}
        }
    }
    Some((access_token?, refresh_token?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_tokens_reads_both_tokens() {
        let url =
            Url::parse("app://callback#access_token=A&refresh_token=B&token_type=bearer").unwrap();
        assert_eq!(
            fragment_tokens(&url),
            Some(("A".to_string(), "B".to_string()))
        );
    }

    #[test]
    fn fragment_tokens_requires_the_pair() {
        let url = Url::parse("app://callback#access_token=A").unwrap();
        assert_eq!(fragment_tokens(&url), None);
        let url = Url::parse("app://callback").unwrap();
        assert_eq!(fragment_tokens(&url), None);
    }

    #[test]
    fn query_param_finds_the_code() {
        let url = Url::parse("app://callback?code=xyz&state=s1").unwrap();
        assert_eq!(query_param(&url, "code"), Some("xyz".to_string()));
        assert_eq!(query_param(&url, "missing"), None);
    }
}

#[cfg(test)]
mod host_tests {
    use super::*;
    use crate::state::auth::AuthPhase;
    use httpmock::prelude::*;
    use httpmock::Method::PATCH;
    use serde_json::json;
    use std::sync::Arc;

    fn api_client(server: &MockServer) -> Arc<ApiClient> {
        Arc::new(ApiClient::new_with_base_url(server.base_url(), "anon-key"))
    }

    fn user_json(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "email": "asha@example.com",
            "user_metadata": { "full_name": "Asha", "avatar_url": "http://x/a.png" }
        })
    }

    fn profile_json(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "email": "asha@example.com",
            "full_name": "Asha",
            "avatar_url": "http://x/a.png",
            "role": "user",
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    fn mock_profiles(server: &MockServer) {
        server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/profiles")
                .query_param("id", "eq.u1");
            then.status(200).json_body(profile_json("u1"));
        });
        server.mock(|when, then| {
            when.method(PATCH)
                .path("/rest/v1/profiles")
                .query_param("id", "eq.u1");
            then.status(200).json_body(json!([profile_json("u1")]));
        });
    }

    #[tokio::test]
    async fn fragment_redirect_installs_exactly_the_carried_tokens() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET)
                .path("/auth/v1/user")
                .header("authorization", "Bearer A");
            then.status(200).json_body(user_json("u1"));
        });
        mock_profiles(&server);

        let api = api_client(&server);
        let store = AuthStore::new(api.clone());
        let outcome = complete_sign_in(
            &api,
            &store,
            "app://callback#access_token=A&refresh_token=B",
        )
        .await;

        assert_eq!(outcome, RedirectOutcome::SignedIn);
        let session = api.current_session().unwrap();
        assert_eq!(session.access_token, "A");
        assert_eq!(session.refresh_token, "B");
        // refresh is awaited, so the profile is already settled here
        assert_eq!(store.snapshot().phase(), AuthPhase::SignedInWithProfile);
    }

    #[tokio::test]
    async fn code_redirect_goes_through_the_exchange() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST)
                .path("/auth/v1/token")
                .query_param("grant_type", "pkce")
                .json_body_partial(r#"{ "auth_code": "xyz" }"#);
            then.status(200).json_body(json!({
                "access_token": "A",
                "refresh_token": "B",
                "token_type": "bearer",
                "expires_in": 3600,
                "user": user_json("u1")
            }));
        });
        mock_profiles(&server);

        let api = api_client(&server);
        let store = AuthStore::new(api.clone());
        let outcome = complete_sign_in(&api, &store, "app://callback?code=xyz").await;

        assert_eq!(outcome, RedirectOutcome::SignedIn);
        assert_eq!(store.snapshot().phase(), AuthPhase::SignedInWithProfile);
    }

    #[tokio::test]
    async fn redirect_without_tokens_routes_back_to_sign_in() {
        let server = MockServer::start_async().await;
        let api = api_client(&server);
        let store = AuthStore::new(api.clone());

        let outcome = complete_sign_in(&api, &store, "app://callback").await;

        assert_eq!(outcome, RedirectOutcome::SignInRequired);
        assert!(api.current_session().is_none());
        assert_eq!(store.snapshot().phase(), AuthPhase::SignedOut);
    }

    #[tokio::test]
    async fn failed_code_exchange_falls_back_to_fragment_tokens() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST)
                .path("/auth/v1/token")
                .query_param("grant_type", "pkce");
            then.status(400)
                .json_body(json!({ "error_description": "code expired" }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/auth/v1/user");
            then.status(200).json_body(user_json("u1"));
        });
        mock_profiles(&server);

        let api = api_client(&server);
        let store = AuthStore::new(api.clone());
        let outcome = complete_sign_in(
            &api,
            &store,
            "app://callback?code=stale#access_token=A&refresh_token=B",
        )
        .await;

        assert_eq!(outcome, RedirectOutcome::SignedIn);
        assert_eq!(api.current_session().unwrap().access_token, "A");
    }
}
