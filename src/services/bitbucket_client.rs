//! Bitbucket Server API client.
//!
//! HTTP client for the Bitbucket Server REST 1.0 API with Basic
//! authentication and the paged-envelope endpoints the aggregation pipeline
//! consumes.

use crate::error::AppError;
use crate::models::{
    PullRequest, PullRequestActivity, PullRequestOrder, PullRequestStatus, Project, Repository,
    User,
};
use crate::services::paginator::Page;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;

/// Default number of values requested per page.
pub const PAGE_SIZE: u64 = 50;

/// Bitbucket client configuration.
#[derive(Debug, Clone)]
pub struct BitbucketClientConfig {
    /// Base URL of the Bitbucket instance (e.g., `https://git.example.com`).
    pub base_url: String,

    /// Login username.
    pub username: String,

    /// Login password or HTTP access token.
    pub password: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl BitbucketClientConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            timeout_secs: 30,
        }
    }
}

/// Bitbucket Server API client.
#[derive(Debug, Clone)]
pub struct BitbucketClient {
    client: Client,
    base_url: String,
}

/// Build the `Authorization: Basic ...` header value.
fn basic_auth_token(username: &str, password: &str) -> String {
    let raw = format!("{}:{}", username, password);
    format!("Basic {}", BASE64.encode(raw.as_bytes()))
}

impl BitbucketClient {
    /// Create a new client with a default Basic authorization header.
    pub fn new(config: BitbucketClientConfig) -> Result<Self, AppError> {
        let mut headers = header::HeaderMap::new();

        let token = basic_auth_token(&config.username, &config.password);
        let mut token_value = header::HeaderValue::from_str(&token)
            .map_err(|_| AppError::authentication("Credentials contain invalid characters"))?;
        token_value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, token_value);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL for a REST 1.0 path.
    fn api_url(&self, path: &str) -> String {
        format!("{}/rest/api/1.0{}", self.base_url, path)
    }

    /// Handle API response errors.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
        endpoint: &str,
    ) -> Result<T, AppError> {
        let status = response.status();

        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| AppError::internal(format!("Failed to parse response: {}", e)))
        } else if status == StatusCode::UNAUTHORIZED {
            Err(AppError::authentication_expired(
                "Bitbucket rejected the stored credentials. Please sign in again.",
            ))
        } else {
            let status_code = status.as_u16();
            let body = response.text().await.unwrap_or_default();
            // Bitbucket reports errors as {"errors": [{"message": "..."}]}
            let body_message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("errors")?
                        .get(0)?
                        .get("message")?
                        .as_str()
                        .map(String::from)
                });

            let message = match (status, body_message) {
                (StatusCode::FORBIDDEN, _) => "Access denied".to_string(),
                (StatusCode::NOT_FOUND, _) => "Resource not found".to_string(),
                (_, Some(msg)) => msg,
                _ => format!("Request failed ({}): {}", status_code, body),
            };

            Err(AppError::bitbucket_api_full(message, status_code, endpoint))
        }
    }

    /// List one page of pull requests for a repository.
    #[allow(clippy::too_many_arguments)]
    pub async fn get_pull_requests(
        &self,
        project_key: &str,
        repo_slug: &str,
        start: u64,
        limit: u64,
        status: PullRequestStatus,
        order: PullRequestOrder,
    ) -> Result<Page<PullRequest>, AppError> {
        let endpoint = format!(
            "/projects/{}/repos/{}/pull-requests",
            urlencoding::encode(project_key),
            urlencoding::encode(repo_slug)
        );
        let url = self.api_url(&endpoint);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("start", start.to_string()),
                ("limit", limit.to_string()),
                ("state", status.as_query_value().to_string()),
                ("order", order.as_query_value().to_string()),
            ])
            .send()
            .await?;

        self.handle_response(response, &endpoint).await
    }

    /// List one page of activities on a pull request.
    pub async fn get_pull_request_activities(
        &self,
        project_key: &str,
        repo_slug: &str,
        pull_request_id: i64,
        start: u64,
    ) -> Result<Page<PullRequestActivity>, AppError> {
        let endpoint = format!(
            "/projects/{}/repos/{}/pull-requests/{}/activities",
            urlencoding::encode(project_key),
            urlencoding::encode(repo_slug),
            pull_request_id
        );
        let url = self.api_url(&endpoint);

        let response = self
            .client
            .get(&url)
            .query(&[("start", start.to_string()), ("limit", PAGE_SIZE.to_string())])
            .send()
            .await?;

        self.handle_response(response, &endpoint).await
    }

    /// List one page of users who participate in a repository.
    pub async fn get_repository_participants(
        &self,
        project_key: &str,
        repo_slug: &str,
        start: u64,
    ) -> Result<Page<User>, AppError> {
        let endpoint = format!(
            "/projects/{}/repos/{}/participants",
            urlencoding::encode(project_key),
            urlencoding::encode(repo_slug)
        );
        let url = self.api_url(&endpoint);

        let response = self
            .client
            .get(&url)
            .query(&[("start", start.to_string()), ("limit", PAGE_SIZE.to_string())])
            .send()
            .await?;

        self.handle_response(response, &endpoint).await
    }

    /// List one page of repositories in a project.
    pub async fn get_project_repositories(
        &self,
        project_key: &str,
        start: u64,
    ) -> Result<Page<Repository>, AppError> {
        let endpoint = format!("/projects/{}/repos", urlencoding::encode(project_key));
        let url = self.api_url(&endpoint);

        let response = self
            .client
            .get(&url)
            .query(&[("start", start.to_string()), ("limit", PAGE_SIZE.to_string())])
            .send()
            .await?;

        self.handle_response(response, &endpoint).await
    }

    /// List one page of projects visible to the user.
    pub async fn get_projects(&self, start: u64) -> Result<Page<Project>, AppError> {
        let endpoint = "/projects/";
        let url = self.api_url(endpoint);

        let response = self
            .client
            .get(&url)
            .query(&[("start", start.to_string()), ("limit", PAGE_SIZE.to_string())])
            .send()
            .await?;

        self.handle_response(response, endpoint).await
    }

    /// Fetch a single user by slug. Used to validate stored credentials.
    pub async fn get_user(&self, user_slug: &str) -> Result<User, AppError> {
        let endpoint = format!("/users/{}", urlencoding::encode(user_slug));
        let url = self.api_url(&endpoint);

        let response = self.client.get(&url).send().await?;
        self.handle_response(response, &endpoint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_auth_token() {
        // RFC 7617 example pair.
        assert_eq!(
            basic_auth_token("Aladdin", "open sesame"),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );
    }

    #[test]
    fn test_api_url_construction() {
        let client = BitbucketClient::new(BitbucketClientConfig::new(
            "https://git.example.com/",
            "anna",
            "secret",
        ))
        .unwrap();

        assert_eq!(client.base_url(), "https://git.example.com");
        assert_eq!(
            client.api_url("/projects/PLAT/repos/billing/pull-requests"),
            "https://git.example.com/rest/api/1.0/projects/PLAT/repos/billing/pull-requests"
        );
    }

    #[test]
    fn test_path_segments_encoded() {
        let encoded = urlencoding::encode("key with space");
        assert_eq!(encoded, "key%20with%20space");
    }
}
