use serde::de::DeserializeOwned;
use serde::Serialize;

use super::client::{error_from_response, ApiClient};
use super::types::ApiError;

/// Generic row access. Filters are `(column, condition)` pairs where the
/// condition is a raw filter expression such as `eq.some-id`, appended to
/// the table query verbatim.
impl ApiClient {
    pub async fn select_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, &str)],
        order: Option<&str>,
    ) -> Result<Vec<T>, ApiError> {
        let base_url = self.resolved_base_url();
        let mut query: Vec<(&str, &str)> = vec![("select", "*")];
        query.extend_from_slice(filters);
        if let Some(order) = order {
            query.push(("order", order));
        }

        let response = self
            .http_client()
            .get(format!("{}/rest/v1/{}", base_url, table))
            .headers(self.request_headers()?)
            .query(&query)
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

    pub async fn insert_row<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        row: &T,
    ) -> Result<R, ApiError> {
        let base_url = self.resolved_base_url();
        let response = self
            .http_client()
            .post(format!("{}/rest/v1/{}", base_url, table))
            .headers(self.request_headers()?)
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await
            .map_err(|e| ApiError::request_failed(format!("Request failed: {}", e)))?;

        if response.status().is_success() {
            let mut rows: Vec<R> = response
                .json()
                .await
                .map_err(|e| ApiError::decode(format!("Failed to parse response: {}", e)))?;
            rows.pop()
                .ok_or_else(|| ApiError::decode("Insert returned no representation"))
        } else {
            Err(error_from_response(response).await)
        }
    }

    pub async fn update_rows<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, &str)],
        patch: &T,
    ) -> Result<Vec<R>, ApiError> {
        let base_url = self.resolved_base_url();
        let response = self
            .http_client()
            .patch(format!("{}/rest/v1/{}", base_url, table))
            .headers(self.request_headers()?)
            .header("Prefer", "return=representation")
            .query(filters)
            .json(patch)
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

    pub async fn delete_rows(&self, table: &str, filters: &[(&str, &str)]) -> Result<(), ApiError> {
        let base_url = self.resolved_base_url();
        let response = self
            .http_client()
            .delete(format!("{}/rest/v1/{}", base_url, table))
            .headers(self.request_headers()?)
            .query(filters)
            .send()
            .await
            .map_err(|e| ApiError::request_failed(format!("Request failed: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }
}
