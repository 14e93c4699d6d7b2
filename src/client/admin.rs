//! Admin console: every report, with search, filters, paging and moderation actions.

use std::collections::{BTreeSet, HashSet};
use std::fmt::Write as _;

use super::api::{ApiClient, ClientError};
use super::dashboard::{render_report_line, render_stats, DashboardStats, StatusFilter};
use super::session::Session;
use super::store::LocalStore;
use crate::models::{Report, ReportStatus};

/// Reports per page unless the query says otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Admin access required")]
    NotAdmin,
    #[error("An update for report {0} is already in progress")]
    Busy(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Api(#[from] ClientError),
}

/// Asks the operator to confirm a destructive action.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Search, filters and paging applied to the in-memory list.
#[derive(Debug, Clone)]
pub struct AdminQuery {
    /// Case-insensitive substring over description, user name and address.
    pub search: String,
    pub status: StatusFilter,
    /// Exact author name.
    pub user: Option<String>,
    /// 1-based page number.
    pub page: usize,
    pub per_page: usize,
}

impl Default for AdminQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            status: StatusFilter::All,
            user: None,
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

impl AdminQuery {
    pub fn matches(&self, report: &Report) -> bool {
        let needle = self.search.trim().to_lowercase();
        let search_ok = needle.is_empty()
            || [&report.description, &report.user_name, &report.address]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
        let user_ok = self
            .user
            .as_deref()
            .is_none_or(|user| report.user_name == user);

        search_ok && self.status.matches(report) && user_ok
    }
}

/// One page of query results.
#[derive(Debug, Clone)]
pub struct Page<'a> {
    pub items: Vec<&'a Report>,
    pub page: usize,
    pub per_page: usize,
    /// Number of reports matching the query across all pages.
    pub total_matches: usize,
}

impl Page<'_> {
    pub fn total_pages(&self) -> usize {
        self.total_matches.div_ceil(self.per_page.max(1))
    }
}

/// Holds the full report list and performs moderation through the API client.
#[derive(Debug)]
pub struct AdminManager {
    api: ApiClient,
    store: LocalStore,
    reports: Vec<Report>,
    in_flight: HashSet<String>,
}

impl AdminManager {
    pub fn new(api: ApiClient, store: LocalStore) -> Self {
        Self {
            api,
            store,
            reports: Vec::new(),
            in_flight: HashSet::new(),
        }
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    /// Replace the in-memory list with every report on the server.
    pub async fn refresh(&mut self) -> Result<(), AdminError> {
        self.require_admin()?;
        self.reports = self.api.list_reports().await?;
        tracing::debug!(count = self.reports.len(), "Admin list refreshed");
        Ok(())
    }

    /// Apply `query` to the in-memory list. Does not touch the network.
    pub fn query(&self, query: &AdminQuery) -> Page<'_> {
        let per_page = query.per_page.max(1);
        let page = query.page.max(1);
        let matching: Vec<&Report> = self.reports.iter().filter(|r| query.matches(r)).collect();
        let total_matches = matching.len();
        let items = matching
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();

        Page {
            items,
            page,
            per_page,
            total_matches,
        }
    }

    /// Distinct report authors, sorted.
    pub fn users(&self) -> Vec<String> {
        self.reports
            .iter()
            .map(|r| r.user_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn stats(&self) -> DashboardStats {
        DashboardStats::from_reports(&self.reports)
    }

    /// Change a report's status on the server, then reload the whole list.
    pub async fn update_status(
        &mut self,
        report_id: &str,
        status: ReportStatus,
    ) -> Result<(), AdminError> {
        self.require_admin()?;
        if !self.in_flight.insert(report_id.to_string()) {
            return Err(AdminError::Busy(report_id.to_string()));
        }

        let result = self.api.update_status(report_id, status).await;
        self.in_flight.remove(report_id);
        result?;

        tracing::info!(report_id, %status, "Status updated");
        self.refresh().await
    }

    /// Delete a report after confirmation. Returns whether anything was deleted.
    pub async fn delete(
        &mut self,
        report_id: &str,
        confirm: &dyn Confirm,
    ) -> Result<bool, AdminError> {
        self.require_admin()?;
        let prompt = format!("Delete report {}? This cannot be undone.", report_id);
        if !confirm.confirm(&prompt) {
            return Ok(false);
        }

        self.api.delete_report(report_id).await?;
        tracing::info!(report_id, "Report deleted");
        self.refresh().await?;
        Ok(true)
    }

    /// Append a comment as the logged-in admin, then reload the list.
    pub async fn add_comment(&mut self, report_id: &str, text: &str) -> Result<(), AdminError> {
        let session = self.require_admin()?;
        if text.trim().is_empty() {
            return Err(AdminError::Validation("Comment cannot be empty".to_string()));
        }

        self.api
            .add_comment(report_id, text.trim(), &session.user.id)
            .await?;
        self.refresh().await
    }

    fn require_admin(&self) -> Result<Session, AdminError> {
        self.store
            .session()
            .filter(Session::is_admin)
            .ok_or(AdminError::NotAdmin)
    }
}

/// Render one page of the admin list with overall counts. Pure.
pub fn render_admin_list(page: &Page<'_>, stats: &DashboardStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", render_stats(stats));
    let _ = writeln!(
        out,
        "Showing page {} of {} ({} matching)",
        page.page,
        page.total_pages().max(1),
        page.total_matches
    );
    let _ = writeln!(out);

    if page.items.is_empty() {
        let _ = writeln!(out, "No reports match.");
        return out;
    }

    for report in &page.items {
        let author = format!(" (by {} <{}>)", report.user_name, report.user_email);
        out.push_str(&render_report_line(report, &author));
        for comment in &report.comments {
            let _ = writeln!(out, "    {}: {}", comment.admin_id, comment.comment_text);
        }
    }
    out
}
