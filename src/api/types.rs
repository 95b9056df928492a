use serde::{Deserialize, Serialize};
use std::fmt;

/// Account role, part of the dashboard key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  #[default]
  Student,
  Recruiter,
  Admin,
}

impl Role {
  pub fn as_str(&self) -> &'static str {
    match self {
      Role::Student => "student",
      Role::Recruiter => "recruiter",
      Role::Admin => "admin",
    }
  }

  pub const ALL: [Role; 3] = [Role::Student, Role::Recruiter, Role::Admin];
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Job posting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
  pub id: u64,
  pub title: String,
  pub company: String,
  pub location: Option<String>,
  pub job_type: String, // "internship", "full_time", ...
  #[serde(default)]
  pub description: Option<String>,
  pub deadline: Option<String>,
  pub posted_at: String,
}

/// One page of the job board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPage {
  pub jobs: Vec<Job>,
  pub page: u32,
  pub total_pages: u32,
  pub total: u64,
}

/// Job board search filters.
///
/// Field order is fixed, so the JSON form is stable and usable in cache keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilters {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub search: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub location: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub job_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub company: Option<String>,
}

impl JobFilters {
  /// Trimmed, lowercased copy with blank fields dropped.
  pub fn normalized(&self) -> Self {
    fn clean(field: &Option<String>) -> Option<String> {
      field
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
    }

    Self {
      search: clean(&self.search),
      location: clean(&self.location),
      job_type: clean(&self.job_type),
      company: clean(&self.company),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.normalized() == Self::default()
  }

  /// Non-empty filters as query parameters.
  pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
    let normalized = self.normalized();
    [
      ("search", normalized.search),
      ("location", normalized.location),
      ("job_type", normalized.job_type),
      ("company", normalized.company),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|v| (name, v)))
    .collect()
  }
}

/// Student or recruiter profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
  pub id: u64,
  pub name: String,
  pub email: String,
  pub role: Role,
  pub university: Option<String>,
  pub graduation_year: Option<u16>,
  #[serde(default)]
  pub skills: Vec<String>,
  pub cv_url: Option<String>,
}

/// Partial profile update
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub university: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub graduation_year: Option<u16>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub skills: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
  Pending,
  Reviewed,
  Shortlisted,
  Interview,
  Offered,
  Rejected,
  Withdrawn,
}

impl ApplicationStatus {
  pub fn label(&self) -> &'static str {
    match self {
      ApplicationStatus::Pending => "Pending",
      ApplicationStatus::Reviewed => "Reviewed",
      ApplicationStatus::Shortlisted => "Shortlisted",
      ApplicationStatus::Interview => "Interview",
      ApplicationStatus::Offered => "Offered",
      ApplicationStatus::Rejected => "Rejected",
      ApplicationStatus::Withdrawn => "Withdrawn",
    }
  }

  /// Whether the applicant can still withdraw
  pub fn is_open(&self) -> bool {
    matches!(
      self,
      ApplicationStatus::Pending
        | ApplicationStatus::Reviewed
        | ApplicationStatus::Shortlisted
        | ApplicationStatus::Interview
    )
  }
}

/// Application to a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
  pub id: u64,
  pub job_id: u64,
  pub job_title: String,
  pub company: String,
  pub status: ApplicationStatus,
  pub applied_at: String,
}

/// Dashboard counters; which ones are filled depends on the role
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardStats {
  pub applications: u64,
  pub pending: u64,
  pub shortlisted: u64,
  pub interviews: u64,
  pub offers: u64,
  pub active_jobs: u64,
  pub total_applicants: u64,
  pub profile_completeness: u8,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_filters_normalize_blank_and_case() {
    let filters = JobFilters {
      search: Some("  Rust Developer ".into()),
      location: Some("   ".into()),
      ..JobFilters::default()
    };

    let normalized = filters.normalized();
    assert_eq!(normalized.search.as_deref(), Some("rust developer"));
    assert_eq!(normalized.location, None);
  }

  #[test]
  fn test_blank_filters_are_empty() {
    let filters = JobFilters {
      company: Some(" ".into()),
      ..JobFilters::default()
    };
    assert!(filters.is_empty());
  }

  #[test]
  fn test_query_pairs_skip_unset() {
    let filters = JobFilters {
      job_type: Some("Internship".into()),
      ..JobFilters::default()
    };
    assert_eq!(
      filters.query_pairs(),
      vec![("job_type", "internship".to_string())]
    );
  }

  #[test]
  fn test_application_status_wire_format() {
    let status: ApplicationStatus = serde_json::from_str("\"shortlisted\"").unwrap();
    assert_eq!(status, ApplicationStatus::Shortlisted);
    assert!(status.is_open());
    assert!(!ApplicationStatus::Rejected.is_open());
  }

  #[test]
  fn test_dashboard_stats_fill_missing_counters() {
    let stats: DashboardStats = serde_json::from_str(r#"{"applications": 4}"#).unwrap();
    assert_eq!(stats.applications, 4);
    assert_eq!(stats.offers, 0);
  }
}
