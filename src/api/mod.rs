//! Campus portal API adapter.
//!
//! Each read operation wraps one remote call and returns a plain value, which
//! makes it usable as a fetch function for a [`Query`](crate::query::Query).

mod cached_client;
mod client;
mod keys;
mod types;

pub use cached_client::CachedApiClient;
pub use client::ApiClient;
pub use keys::{ResourceKey, JOBS_LIST_PREFIX};
pub use types::{
  Application, ApplicationStatus, DashboardStats, Job, JobFilters, JobPage, ProfileUpdate, Role,
  UserProfile,
};
