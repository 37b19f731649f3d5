//! Common utilities for the Kong admin API client
//!
//! Provides the HTTP plumbing shared by every endpoint.

use crate::error::KongError;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// HTTP client wrapper bound to one Kong admin endpoint
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, KongError> {
        let url = self.build_url(path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let response = check_status("GET", path, response).await?;
        Ok(response.json().await?)
    }

    /// Make a POST request
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, KongError> {
        let url = self.build_url(path);
        debug!("POST {} with body: {}", url, serde_json::to_string(body)?);

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        let response = check_status("POST", path, response).await?;
        Ok(response.json().await?)
    }

    /// Make a PUT request
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, KongError> {
        let url = self.build_url(path);
        debug!("PUT {} with body: {}", url, serde_json::to_string(body)?);

        let response = self
            .client
            .put(&url)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        let response = check_status("PUT", path, response).await?;
        Ok(response.json().await?)
    }

    /// Make a PATCH request
    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, KongError> {
        let url = self.build_url(path);
        debug!("PATCH {} with body: {}", url, serde_json::to_string(body)?);

        let response = self
            .client
            .patch(&url)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        let response = check_status("PATCH", path, response).await?;
        Ok(response.json().await?)
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<(), KongError> {
        let url = self.build_url(path);
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        check_status("DELETE", path, response).await?;
        Ok(())
    }
}

/// Percent-encode a single path segment (API names may contain dots or slashes)
pub fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

async fn check_status(method: &str, path: &str, response: Response) -> Result<Response, KongError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        return Err(KongError::NotFound(format!("{} {} - {}", method, path, body)));
    }

    Err(KongError::Api {
        status: status.as_u16(),
        message: format!("{} {} failed: {}", method, path, body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_trimmed() {
        let http = HttpClient::new(Client::new(), "http://kong:8001/".to_string());
        assert_eq!(http.base_url(), "http://kong:8001");
        assert_eq!(http.build_url("/apis/"), "http://kong:8001/apis/");
    }

    #[test]
    fn segment_escapes_reserved_characters() {
        assert_eq!(segment("myapp-auth"), "myapp-auth");
        assert_eq!(segment("a/b c"), "a%2Fb%20c");
    }
}
