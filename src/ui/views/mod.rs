mod applications;
mod dashboard;
mod job_detail;
mod jobs;
mod profile;

pub use applications::ApplicationsView;
pub use dashboard::DashboardView;
pub use job_detail::JobDetailView;
pub use jobs::JobListView;
pub use profile::ProfileView;

use tracing::warn;

use crate::api::Role;
use crate::ui::view::ViewContext;

/// Submit an application in the background and report back
fn spawn_apply(ctx: &ViewContext, job_id: u64, title: &str) {
  if ctx.role != Role::Student {
    ctx.notify("Only students can apply");
    return;
  }

  let ctx = ctx.clone();
  let title = title.to_string();
  tokio::spawn(async move {
    match ctx.client.submit_application(ctx.user_id, job_id).await {
      Ok(_) => ctx.notify(format!("Applied to {}", title)),
      Err(e) => {
        warn!(job_id, error = %e, "Application failed");
        ctx.notify(format!("Could not apply: {}", e));
      }
    }
  });
}
