//! Ready-made queries for each portal resource.
//!
//! A binding fixes the fetch function, the cache key and the default polling
//! period for one resource. Callers pass `QueryOptions::default()` unless
//! they need callbacks or a different interval.

use chrono::Duration;

use crate::api::{
  Application, CachedApiClient, DashboardStats, Job, JobFilters, JobPage, ResourceKey, Role,
  UserProfile,
};
use crate::query::{Query, QueryOptions};

/// Job postings change a few times a day.
pub const JOBS_REFETCH_MINUTES: i64 = 10;
/// Application status and dashboard counters move faster.
pub const APPLICATIONS_REFETCH_MINUTES: i64 = 5;
pub const DASHBOARD_REFETCH_MINUTES: i64 = 5;

/// Fill in the resource's polling period unless the caller chose one.
fn with_default_interval<T>(options: QueryOptions<T>, minutes: Option<i64>) -> QueryOptions<T> {
  match (options.refetch_interval, minutes) {
    (None, Some(minutes)) => options.refetch_interval(Duration::minutes(minutes)),
    _ => options,
  }
}

/// Profile of a user. Not polled.
pub fn profile(
  client: &CachedApiClient,
  user_id: u64,
  options: QueryOptions<UserProfile>,
) -> Query<UserProfile> {
  let api = client.api().clone();
  Query::mount(
    client.store().clone(),
    ResourceKey::UserProfile { user_id }.cache_key(),
    move || {
      let api = api.clone();
      async move { api.get_user_profile(user_id).await }
    },
    with_default_interval(options, None),
  )
}

/// One page of the job board.
pub fn jobs(
  client: &CachedApiClient,
  page: u32,
  filters: JobFilters,
  options: QueryOptions<JobPage>,
) -> Query<JobPage> {
  let api = client.api().clone();
  let key = ResourceKey::JobsList {
    page,
    filters: filters.clone(),
  };
  Query::mount(
    client.store().clone(),
    key.cache_key(),
    move || {
      let api = api.clone();
      let filters = filters.clone();
      async move { api.get_jobs(page, &filters).await }
    },
    with_default_interval(options, Some(JOBS_REFETCH_MINUTES)),
  )
}

/// A single job posting. Refreshed through invalidation only.
pub fn job(client: &CachedApiClient, job_id: u64, options: QueryOptions<Job>) -> Query<Job> {
  let api = client.api().clone();
  Query::mount(
    client.store().clone(),
    ResourceKey::JobDetail { job_id }.cache_key(),
    move || {
      let api = api.clone();
      async move { api.get_job(job_id).await }
    },
    with_default_interval(options, None),
  )
}

/// Applications submitted by a user.
pub fn applications(
  client: &CachedApiClient,
  user_id: u64,
  options: QueryOptions<Vec<Application>>,
) -> Query<Vec<Application>> {
  let api = client.api().clone();
  Query::mount(
    client.store().clone(),
    ResourceKey::UserApplications { user_id }.cache_key(),
    move || {
      let api = api.clone();
      async move { api.get_user_applications(user_id).await }
    },
    with_default_interval(options, Some(APPLICATIONS_REFETCH_MINUTES)),
  )
}

/// Dashboard counters for a user in a role.
pub fn dashboard_stats(
  client: &CachedApiClient,
  user_id: u64,
  role: Role,
  options: QueryOptions<DashboardStats>,
) -> Query<DashboardStats> {
  let api = client.api().clone();
  Query::mount(
    client.store().clone(),
    ResourceKey::DashboardStats { user_id, role }.cache_key(),
    move || {
      let api = api.clone();
      async move { api.get_dashboard_stats(user_id, role).await }
    },
    with_default_interval(options, Some(DASHBOARD_REFETCH_MINUTES)),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::ApiClient;
  use crate::cache::{CacheSettings, CacheStore, ManualClock, NoopStorage};
  use crate::config::ApiConfig;
  use std::sync::Arc;

  fn client_for(url: String) -> CachedApiClient {
    let config = ApiConfig {
      base_url: url,
      timeout_secs: 5,
    };
    let store = CacheStore::with_parts(
      CacheSettings::default(),
      Arc::new(ManualClock::default()),
      Arc::new(NoopStorage),
    );
    CachedApiClient::from_parts(ApiClient::with_token(&config, None).unwrap(), store)
  }

  #[tokio::test]
  async fn test_bindings_use_key_conventions_and_intervals() {
    // Disabled so nothing is fetched
    let client = client_for("http://127.0.0.1:9".to_string());

    let profile = profile(&client, 7, QueryOptions::default().enabled(false));
    assert_eq!(profile.key(), "user_profile_7");
    assert_eq!(profile.refetch_interval(), None);

    let jobs = jobs(
      &client,
      1,
      JobFilters::default(),
      QueryOptions::default().enabled(false),
    );
    assert_eq!(jobs.key(), "jobs_list_1_all");
    assert_eq!(jobs.refetch_interval(), Some(Duration::minutes(10)));

    let applications = applications(&client, 7, QueryOptions::default().enabled(false));
    assert_eq!(applications.key(), "user_applications_7");
    assert_eq!(applications.refetch_interval(), Some(Duration::minutes(5)));

    let stats = dashboard_stats(
      &client,
      7,
      Role::Student,
      QueryOptions::default().enabled(false),
    );
    assert_eq!(stats.key(), "dashboard_stats_7_student");
    assert_eq!(stats.refetch_interval(), Some(Duration::minutes(5)));
  }

  #[tokio::test]
  async fn test_caller_interval_wins() {
    let client = client_for("http://127.0.0.1:9".to_string());
    let jobs = jobs(
      &client,
      1,
      JobFilters::default(),
      QueryOptions::default()
        .enabled(false)
        .refetch_interval(Duration::minutes(1)),
    );
    assert_eq!(jobs.refetch_interval(), Some(Duration::minutes(1)));
  }

  #[tokio::test]
  async fn test_applications_binding_fetches_and_caches() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/api/users/7/applications")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(
        r#"[{"id":1,"job_id":2,"job_title":"Backend Intern","company":"Acme",
             "status":"interview","applied_at":"2026-09-20"}]"#,
      )
      .expect(1)
      .create_async()
      .await;
    let client = client_for(server.url());

    let mut first = applications(&client, 7, QueryOptions::default());
    assert!(first.is_loading());
    for _ in 0..100 {
      first.poll();
      if first.data().is_some() {
        break;
      }
      tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(first.data().map(Vec::len), Some(1));

    // A second view on the same key is served from the cache
    let second = applications(&client, 7, QueryOptions::default());
    assert_eq!(second.data(), first.data());
    assert!(!second.is_loading());

    mock.assert_async().await;
  }
}
