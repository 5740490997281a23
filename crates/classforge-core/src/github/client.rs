//! reqwest implementation of [`HostingApi`] against the GitHub REST API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK, RETRY_AFTER};
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};
use url::Url;

use super::pagination::{self, MAX_PER_PAGE, Page};
use super::{
    ApiError, ApiResult, Commit, CommitComment, Hook, HookSpec, HostingApi, ImportStatus,
    Membership, Permission, Repository, Team,
};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_WEB_URL: &str = "https://github.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for one organization.
#[derive(Debug, Clone)]
pub struct GitHubSettings {
    /// REST API root, e.g. `https://api.github.com`.
    pub api_url: String,
    /// Web root used for browser and clone URLs, e.g. `https://github.com`.
    pub web_url: String,
    pub org: String,
    pub token: String,
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl GitHubSettings {
    pub fn new(org: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            web_url: DEFAULT_WEB_URL.to_string(),
            org: org.into(),
            token: token.into(),
            user_agent: concat!("classforge/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_web_url(mut self, web_url: impl Into<String>) -> Self {
        self.web_url = web_url.into();
        self
    }
}

/// GitHub REST client bound to one organization and token.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: Url,
    web_url: String,
    org: String,
}

impl GitHubClient {
    pub fn new(settings: GitHubSettings) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", settings.token)).map_err(|_| {
            ApiError::Auth {
                path: String::new(),
                status: 0,
                message: "token contains characters not allowed in a header".to_string(),
            }
        })?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );

        let http = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()?;

        // Url::join drops the last path segment unless the base ends in '/'.
        let mut api_root = settings.api_url.trim_end_matches('/').to_string();
        api_root.push('/');
        let api_url = Url::parse(&api_root)?;

        Ok(Self {
            http,
            api_url,
            web_url: settings.web_url.trim_end_matches('/').to_string(),
            org: settings.org,
        })
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        Ok(self.api_url.join(path.trim_start_matches('/'))?)
    }

    async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> ApiResult<Response> {
        let path = url.path().to_string();
        debug!(%method, %path, "github request");
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        check_status(&path, response).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &Value,
    ) -> ApiResult<T> {
        let url = self.endpoint(path)?;
        let response = self.send(method, url, Some(body)).await?;
        decode(path, response).await
    }

    /// Request whose response body is irrelevant (204 or ignored payload).
    async fn send_empty(&self, method: Method, path: &str, body: Option<&Value>) -> ApiResult<()> {
        let url = self.endpoint(path)?;
        self.send(method, url, body).await?;
        Ok(())
    }

    async fn fetch_page<T: DeserializeOwned>(&self, url: Url) -> ApiResult<Page<T>> {
        let path = url.path().to_string();
        let response = self.send(Method::GET, url, None).await?;
        let link = response
            .headers()
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let items = decode(&path, response).await?;
        Ok(Page::new(items, link))
    }

    /// GET every page of a listing endpoint.
    async fn get_all<T: DeserializeOwned + Send>(&self, path: &str) -> ApiResult<Vec<T>> {
        let mut url = self.endpoint(path)?;
        url.query_pairs_mut()
            .append_pair("per_page", &MAX_PER_PAGE.to_string())
            .append_pair("page", "1");
        let first = self.fetch_page(url).await?;
        pagination::resolve_pages(first, |url| self.fetch_page(url)).await
    }

    fn repo_path(&self, repo: &str) -> String {
        format!("repos/{}/{}", self.org, repo)
    }
}

async fn check_status(path: &str, response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let remaining = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_response(
        path,
        status,
        remaining.as_deref(),
        retry_after,
        &body,
    ))
}

async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> ApiResult<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode {
        path: path.to_string(),
        source,
    })
}

#[async_trait]
impl HostingApi for GitHubClient {
    fn repo_url(&self, repo: &str) -> String {
        format!("{}/{}/{}", self.web_url, self.org, repo)
    }

    fn clone_url(&self, repo: &str) -> String {
        format!("{}/{}/{}.git", self.web_url, self.org, repo)
    }

    #[instrument(skip(self), fields(org = %self.org))]
    async fn create_repo(&self, name: &str) -> ApiResult<Repository> {
        let body = json!({
            "name": name,
            "private": true,
            "auto_init": false,
            "has_issues": true,
            "has_wiki": false,
        });
        self.send_json(Method::POST, &format!("orgs/{}/repos", self.org), &body)
            .await
    }

    #[instrument(skip(self), fields(org = %self.org))]
    async fn delete_repo(&self, name: &str) -> ApiResult<()> {
        self.send_empty(Method::DELETE, &self.repo_path(name), None)
            .await
    }

    async fn list_repos(&self) -> ApiResult<Vec<Repository>> {
        self.get_all(&format!("orgs/{}/repos", self.org)).await
    }

    async fn list_teams(&self) -> ApiResult<Vec<Team>> {
        self.get_all(&format!("orgs/{}/teams", self.org)).await
    }

    #[instrument(skip(self), fields(org = %self.org))]
    async fn create_team(&self, name: &str) -> ApiResult<Team> {
        let body = json!({ "name": name, "privacy": "closed" });
        self.send_json(Method::POST, &format!("orgs/{}/teams", self.org), &body)
            .await
    }

    async fn rename_team(&self, team_id: u64, name: &str) -> ApiResult<Team> {
        let body = json!({ "name": name });
        self.send_json(Method::PATCH, &format!("teams/{team_id}"), &body)
            .await
    }

    #[instrument(skip(self), fields(org = %self.org))]
    async fn add_team_to_repo(
        &self,
        team_id: u64,
        repo: &str,
        permission: Permission,
    ) -> ApiResult<()> {
        let body = json!({ "permission": permission.as_str() });
        self.send_empty(
            Method::PUT,
            &format!("teams/{team_id}/repos/{}/{repo}", self.org),
            Some(&body),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn add_team_member(&self, team_id: u64, user: &str) -> ApiResult<Membership> {
        let body = json!({ "role": "member" });
        self.send_json(
            Method::PUT,
            &format!("teams/{team_id}/memberships/{user}"),
            &body,
        )
        .await
    }

    async fn remove_team_member(&self, team_id: u64, user: &str) -> ApiResult<()> {
        self.send_empty(
            Method::DELETE,
            &format!("teams/{team_id}/memberships/{user}"),
            None,
        )
        .await
    }

    #[instrument(skip(self), fields(org = %self.org))]
    async fn add_collaborator(
        &self,
        repo: &str,
        user: &str,
        permission: Permission,
    ) -> ApiResult<()> {
        let body = json!({ "permission": permission.as_str() });
        self.send_empty(
            Method::PUT,
            &format!("{}/collaborators/{user}", self.repo_path(repo)),
            Some(&body),
        )
        .await
    }

    async fn remove_collaborator(&self, repo: &str, user: &str) -> ApiResult<()> {
        self.send_empty(
            Method::DELETE,
            &format!("{}/collaborators/{user}", self.repo_path(repo)),
            None,
        )
        .await
    }

    async fn list_hooks(&self, repo: &str) -> ApiResult<Vec<Hook>> {
        self.get_all(&format!("{}/hooks", self.repo_path(repo)))
            .await
    }

    #[instrument(skip(self, hook), fields(org = %self.org, url = %hook.url))]
    async fn add_hook(&self, repo: &str, hook: &HookSpec) -> ApiResult<Hook> {
        self.send_json(
            Method::POST,
            &format!("{}/hooks", self.repo_path(repo)),
            &hook.to_request_body(),
        )
        .await
    }

    async fn delete_hook(&self, repo: &str, hook_id: u64) -> ApiResult<()> {
        self.send_empty(
            Method::DELETE,
            &format!("{}/hooks/{hook_id}", self.repo_path(repo)),
            None,
        )
        .await
    }

    async fn start_import(&self, repo: &str, source_url: &str) -> ApiResult<ImportStatus> {
        let body = json!({ "vcs": "git", "vcs_url": source_url });
        self.send_json(
            Method::PUT,
            &format!("{}/import", self.repo_path(repo)),
            &body,
        )
        .await
    }

    async fn list_commits(
        &self,
        repo: &str,
        until: Option<DateTime<Utc>>,
    ) -> ApiResult<Vec<Commit>> {
        let path = format!("{}/commits", self.repo_path(repo));
        let mut url = self.endpoint(&path)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("per_page", &MAX_PER_PAGE.to_string());
            if let Some(until) = until {
                query.append_pair("until", &until.to_rfc3339_opts(SecondsFormat::Secs, true));
            }
        }
        Ok(self.fetch_page(url).await?.items)
    }

    async fn post_commit_comment(
        &self,
        repo: &str,
        sha: &str,
        body: &str,
    ) -> ApiResult<CommitComment> {
        let payload = json!({ "body": body });
        self.send_json(
            Method::POST,
            &format!("{}/commits/{sha}/comments", self.repo_path(repo)),
            &payload,
        )
        .await
    }
}
