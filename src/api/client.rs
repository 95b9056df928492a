use color_eyre::{eyre::eyre, Result};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::{ApiConfig, Config};

use super::types::{Application, DashboardStats, Job, JobFilters, JobPage, ProfileUpdate, Role, UserProfile};

const USER_AGENT: &str = concat!("campus-cache/", env!("CARGO_PKG_VERSION"));

/// Campus portal API client
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  base_url: Url,
  token: Option<String>,
}

impl ApiClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    Self::with_token(config, Config::get_api_token())
  }

  /// Create a client with an explicit (or no) bearer token
  pub fn with_token(config: &ApiConfig, token: Option<String>) -> Result<Self> {
    let base_url = Url::parse(&config.base_url)
      .map_err(|e| eyre!("Invalid API base URL '{}': {}", config.base_url, e))?;

    let client = Client::builder()
      .user_agent(USER_AGENT)
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url,
      token,
    })
  }

  fn url(&self, path: &str) -> Result<Url> {
    self
      .base_url
      .join(path)
      .map_err(|e| eyre!("Invalid API path '{}': {}", path, e))
  }

  fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
    let request = self.client.request(method, self.url(path)?);
    Ok(match &self.token {
      Some(token) => request.bearer_auth(token),
      None => request,
    })
  }

  /// Send a request and decode the JSON body, turning HTTP errors into reports
  async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
    let response = request
      .send()
      .await
      .map_err(|e| eyre!("Failed to {}: {}", what, e))?;

    let status = response.status();
    debug!(%status, what, "API response");
    if !status.is_success() {
      let message = response.text().await.unwrap_or_default();
      return Err(eyre!(
        "Failed to {} (HTTP {}): {}",
        what,
        status.as_u16(),
        message.trim()
      ));
    }

    response
      .json::<T>()
      .await
      .map_err(|e| eyre!("Failed to parse response to {}: {}", what, e))
  }

  async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)], what: &str) -> Result<T> {
    let request = self.request(Method::GET, path)?.query(query);
    self.send(request, what).await
  }

  async fn send_json<T: DeserializeOwned, B: Serialize>(
    &self,
    method: Method,
    path: &str,
    body: &B,
    what: &str,
  ) -> Result<T> {
    let request = self.request(method, path)?.json(body);
    self.send(request, what).await
  }

  /// Get one page of the job board
  pub async fn get_jobs(&self, page: u32, filters: &JobFilters) -> Result<JobPage> {
    let mut query = vec![("page", page.to_string())];
    query.extend(filters.query_pairs());
    self.get("/api/jobs", &query, "load jobs").await
  }

  /// Get a single job posting
  pub async fn get_job(&self, job_id: u64) -> Result<Job> {
    self
      .get(&format!("/api/jobs/{}", job_id), &[], &format!("load job {}", job_id))
      .await
  }

  pub async fn get_user_profile(&self, user_id: u64) -> Result<UserProfile> {
    self
      .get(&format!("/api/users/{}/profile", user_id), &[], "load profile")
      .await
  }

  pub async fn update_profile(&self, user_id: u64, update: &ProfileUpdate) -> Result<UserProfile> {
    self
      .send_json(
        Method::PATCH,
        &format!("/api/users/{}/profile", user_id),
        update,
        "update profile",
      )
      .await
  }

  pub async fn get_user_applications(&self, user_id: u64) -> Result<Vec<Application>> {
    self
      .get(
        &format!("/api/users/{}/applications", user_id),
        &[],
        "load applications",
      )
      .await
  }

  /// Apply to a job on behalf of the user
  pub async fn submit_application(&self, user_id: u64, job_id: u64) -> Result<Application> {
    let body = serde_json::json!({ "user_id": user_id, "job_id": job_id });
    self
      .send_json(Method::POST, "/api/applications", &body, "submit application")
      .await
  }

  pub async fn withdraw_application(&self, application_id: u64) -> Result<Application> {
    let body = serde_json::json!({ "status": "withdrawn" });
    self
      .send_json(
        Method::PATCH,
        &format!("/api/applications/{}", application_id),
        &body,
        "withdraw application",
      )
      .await
  }

  pub async fn get_dashboard_stats(&self, user_id: u64, role: Role) -> Result<DashboardStats> {
    let query = [("user_id", user_id.to_string()), ("role", role.to_string())];
    self
      .get("/api/dashboard/stats", &query, "load dashboard stats")
      .await
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }
}
