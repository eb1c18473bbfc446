use super::client::{error_from_response, ApiClient};
use super::types::{ApiError, NewProfile, Profile, ProfileLookup, ProfileUpdate};

const PROFILES_TABLE: &str = "profiles";

impl ApiClient {
    /// Looks up a profile by auth user id. Uses a single-object read so the
    /// backend's zero-row code distinguishes "no such profile" from a failed
    /// query.
    pub async fn get_profile(&self, id: &str) -> Result<ProfileLookup, ApiError> {
        let base_url = self.resolved_base_url();
        let filter = format!("eq.{}", id);
        let response = self
            .http_client()
            .get(format!("{}/rest/v1/{}", base_url, PROFILES_TABLE))
            .headers(self.request_headers()?)
            .header("Accept", "application/vnd.pgrst.object+json")
            .query(&[("select", "*"), ("id", filter.as_str())])
            .send()
            .await
            .map_err(|e| ApiError::request_failed(format!("Request failed: {}", e)))?;

        if response.status().is_success() {
            let profile: Profile = response
                .json()
                .await
                .map_err(|e| ApiError::decode(format!("Failed to parse response: {}", e)))?;
            Ok(ProfileLookup::Found(profile))
        } else {
            let error = error_from_response(response).await;
            if error.is_no_rows() {
                Ok(ProfileLookup::NotFound)
            } else {
                Err(error)
            }
        }
    }

    pub async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile, ApiError> {
        self.insert_row(PROFILES_TABLE, profile).await
    }

    /// Applies a reconciliation patch to one profile row. The payload type
    /// carries identity fields only; role is not part of it.
    pub async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<(), ApiError> {
        let filter = format!("eq.{}", id);
        let _rows: Vec<Profile> = self
            .update_rows(PROFILES_TABLE, &[("id", filter.as_str())], update)
            .await?;
        Ok(())
    }
}
