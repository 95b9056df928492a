//! Portal client bundled with the shared cache store.

use color_eyre::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{CacheStorage, CacheStore, NoopStorage, SqliteStorage, SystemClock};
use crate::config::Config;

use super::client::ApiClient;
use super::keys::{ResourceKey, JOBS_LIST_PREFIX};
use super::types::{Application, ProfileUpdate, Role, UserProfile};

/// Portal client with cache invalidation on writes.
///
/// Reads go through [`bindings`](crate::bindings), which fill the store.
/// Writes go straight to the API and then invalidate every key whose value
/// they may have changed. The store knows nothing about how keys relate, so
/// this fan-out is the only thing keeping dependent views correct.
#[derive(Clone)]
pub struct CachedApiClient {
  inner: ApiClient,
  store: CacheStore,
}

impl CachedApiClient {
  /// Create the client and its store from configuration.
  pub fn new(config: &Config) -> Result<Self> {
    let inner = ApiClient::new(&config.api)?;
    let settings = config.cache.settings()?;

    let storage: Arc<dyn CacheStorage> = if config.cache.persist {
      let path = match &config.cache.path {
        Some(path) => path.clone(),
        None => SqliteStorage::default_path()?,
      };
      match SqliteStorage::open_at(&path) {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
          warn!(error = %e, "Cache persistence unavailable, using memory only");
          Arc::new(NoopStorage)
        }
      }
    } else {
      Arc::new(NoopStorage)
    };

    let store = CacheStore::with_parts(settings, Arc::new(SystemClock), storage);
    Ok(Self::from_parts(inner, store))
  }

  pub fn from_parts(inner: ApiClient, store: CacheStore) -> Self {
    Self { inner, store }
  }

  pub fn api(&self) -> &ApiClient {
    &self.inner
  }

  pub fn store(&self) -> &CacheStore {
    &self.store
  }

  /// Apply to a job.
  ///
  /// Invalidates the user's applications and dashboards, the job itself and
  /// every cached job board page (applicant counts change).
  pub async fn submit_application(&self, user_id: u64, job_id: u64) -> Result<Application> {
    let application = self.inner.submit_application(user_id, job_id).await?;
    info!(user_id, job_id, application_id = application.id, "Application submitted");

    self.invalidate(&ResourceKey::UserApplications { user_id });
    self.invalidate_dashboards(user_id);
    self.invalidate(&ResourceKey::JobDetail { job_id });
    self.store.invalidate_prefix(JOBS_LIST_PREFIX);

    Ok(application)
  }

  /// Withdraw one of the user's applications.
  pub async fn withdraw_application(&self, user_id: u64, application_id: u64) -> Result<Application> {
    let application = self.inner.withdraw_application(application_id).await?;
    info!(user_id, application_id, "Application withdrawn");

    self.invalidate(&ResourceKey::UserApplications { user_id });
    self.invalidate_dashboards(user_id);

    Ok(application)
  }

  /// Update the user's profile.
  pub async fn update_profile(&self, user_id: u64, update: &ProfileUpdate) -> Result<UserProfile> {
    let profile = self.inner.update_profile(user_id, update).await?;
    info!(user_id, "Profile updated");

    self.invalidate(&ResourceKey::UserProfile { user_id });
    self.invalidate_dashboards(user_id);

    Ok(profile)
  }

  fn invalidate(&self, key: &ResourceKey) {
    self.store.invalidate(&key.cache_key());
  }

  /// Dashboard keys include the role, so cover every role.
  fn invalidate_dashboards(&self, user_id: u64) {
    for role in Role::ALL {
      self.invalidate(&ResourceKey::DashboardStats { user_id, role });
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::JobFilters;
  use crate::cache::{CacheSettings, ManualClock};
  use crate::config::ApiConfig;
  use std::sync::Mutex;

  fn cached_client(server: &mockito::ServerGuard) -> CachedApiClient {
    let config = ApiConfig {
      base_url: server.url(),
      timeout_secs: 5,
    };
    let store = CacheStore::with_parts(
      CacheSettings::default(),
      Arc::new(ManualClock::default()),
      Arc::new(NoopStorage),
    );
    CachedApiClient::from_parts(ApiClient::with_token(&config, None).unwrap(), store)
  }

  fn record_invalidations(store: &CacheStore) -> (Arc<Mutex<Vec<String>>>, crate::cache::Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = store.on_invalidate(move |key| sink.lock().unwrap().push(key.to_string()));
    (seen, subscription)
  }

  #[tokio::test]
  async fn test_submit_application_fans_out_invalidation() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
      .mock("POST", "/api/applications")
      .with_status(201)
      .with_header("content-type", "application/json")
      .with_body(
        r#"{"id":5,"job_id":12,"job_title":"Analyst","company":"Initech",
            "status":"pending","applied_at":"2026-10-01"}"#,
      )
      .create_async()
      .await;

    let client = cached_client(&server);
    let jobs_key = ResourceKey::JobsList {
      page: 1,
      filters: JobFilters::default(),
    }
    .cache_key();
    client.store().set(&jobs_key, &"page one", None);
    client.store().set("user_profile_3", &"profile", None);
    let (seen, _subscription) = record_invalidations(client.store());

    client.submit_application(3, 12).await.unwrap();

    let seen = seen.lock().unwrap();
    assert!(seen.contains(&"user_applications_3".to_string()));
    assert!(seen.contains(&"dashboard_stats_3_student".to_string()));
    assert!(seen.contains(&"dashboard_stats_3_recruiter".to_string()));
    assert!(seen.contains(&"job_detail_12".to_string()));
    assert!(seen.contains(&jobs_key));
    assert!(!seen.contains(&"user_profile_3".to_string()));
    assert_eq!(client.store().get::<String>(&jobs_key), None);
    assert!(client.store().get::<String>("user_profile_3").is_some());
  }

  #[tokio::test]
  async fn test_failed_write_invalidates_nothing() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
      .mock("PATCH", "/api/users/3/profile")
      .with_status(422)
      .with_body("invalid graduation year")
      .create_async()
      .await;

    let client = cached_client(&server);
    let (seen, _subscription) = record_invalidations(client.store());

    let update = ProfileUpdate {
      graduation_year: Some(1800),
      ..ProfileUpdate::default()
    };
    assert!(client.update_profile(3, &update).await.is_err());
    assert!(seen.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_withdraw_application_invalidates_applications_and_dashboards() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
      .mock("PATCH", "/api/applications/9")
      .match_body(mockito::Matcher::Json(serde_json::json!({"status": "withdrawn"})))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(
        r#"{"id":9,"job_id":12,"job_title":"Analyst","company":"Initech",
            "status":"withdrawn","applied_at":"2026-10-01"}"#,
      )
      .create_async()
      .await;

    let client = cached_client(&server);
    client.store().set("user_applications_3", &"list", None);
    client.store().set("job_detail_12", &"detail", None);
    let (seen, _subscription) = record_invalidations(client.store());

    let application = client.withdraw_application(3, 9).await.unwrap();

    assert_eq!(application.status, crate::api::ApplicationStatus::Withdrawn);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1 + Role::ALL.len());
    assert!(seen.contains(&"user_applications_3".to_string()));
    for role in Role::ALL {
      let key = ResourceKey::DashboardStats { user_id: 3, role }.cache_key();
      assert!(seen.contains(&key), "{} not invalidated", key);
    }
    assert_eq!(client.store().get::<String>("user_applications_3"), None);
    assert!(client.store().get::<String>("job_detail_12").is_some());
  }

  #[tokio::test]
  async fn test_update_profile_invalidates_profile_and_dashboards() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
      .mock("PATCH", "/api/users/3/profile")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(
        r#"{"id":3,"name":"Ada","email":"ada@example.edu","role":"student",
            "university":"Example U","graduation_year":2027,"skills":["rust"],"cv_url":null}"#,
      )
      .create_async()
      .await;

    let client = cached_client(&server);
    let (seen, _subscription) = record_invalidations(client.store());

    let profile = client
      .update_profile(3, &ProfileUpdate::default())
      .await
      .unwrap();

    assert_eq!(profile.name, "Ada");
    let seen = seen.lock().unwrap();
    assert_eq!(seen[0], "user_profile_3");
    assert_eq!(seen.len(), 1 + Role::ALL.len());
  }
}
