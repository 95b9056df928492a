//! Cache key naming for portal resources.

use sha2::{Digest, Sha256};
use std::fmt;

use super::types::{JobFilters, Role};

/// Identifies one cacheable API result.
///
/// Every parameter that shapes a result is part of its key, so different
/// queries never share a key and the same query always maps to the same one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceKey {
  /// Profile of one user
  UserProfile { user_id: u64 },
  /// One page of the job board under a filter set
  JobsList { page: u32, filters: JobFilters },
  /// A single job posting
  JobDetail { job_id: u64 },
  /// Applications submitted by one user
  UserApplications { user_id: u64 },
  /// Dashboard counters for one user in one role
  DashboardStats { user_id: u64, role: Role },
}

/// Prefix shared by every job board page.
pub const JOBS_LIST_PREFIX: &str = "jobs_list_";

impl ResourceKey {
  /// The string key used in the cache store.
  pub fn cache_key(&self) -> String {
    match self {
      Self::UserProfile { user_id } => format!("user_profile_{}", user_id),
      Self::JobsList { page, filters } => {
        format!("{}{}_{}", JOBS_LIST_PREFIX, page, filter_signature(filters))
      }
      Self::JobDetail { job_id } => format!("job_detail_{}", job_id),
      Self::UserApplications { user_id } => format!("user_applications_{}", user_id),
      Self::DashboardStats { user_id, role } => format!("dashboard_stats_{}_{}", user_id, role),
    }
  }

  /// Human-readable description, for logs and the status line.
  pub fn description(&self) -> String {
    match self {
      Self::UserProfile { user_id } => format!("profile of user {}", user_id),
      Self::JobsList { page, filters } => {
        if filters.is_empty() {
          format!("jobs page {}", page)
        } else {
          format!("jobs page {} (filtered)", page)
        }
      }
      Self::JobDetail { job_id } => format!("job {}", job_id),
      Self::UserApplications { user_id } => format!("applications of user {}", user_id),
      Self::DashboardStats { user_id, role } => {
        format!("{} dashboard of user {}", role, user_id)
      }
    }
  }
}

impl fmt::Display for ResourceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.cache_key())
  }
}

/// `all` for an empty filter set, otherwise a short digest of the normalized
/// filters' JSON.
fn filter_signature(filters: &JobFilters) -> String {
  let normalized = filters.normalized();
  if normalized == JobFilters::default() {
    return "all".to_string();
  }

  // Struct fields serialize in declaration order, so this is stable
  let input = serde_json::to_string(&normalized).unwrap_or_default();

  // SHA256 hash for stable, fixed-length keys
  let mut hasher = Sha256::new();
  hasher.update(input.as_bytes());
  let result = hasher.finalize();
  hex::encode(&result[..8])
}
