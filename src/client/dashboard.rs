//! The signed-in user's dashboard: their reports, counts and a status filter.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::str::FromStr;

use chrono::DateTime;

use super::api::ApiClient;
use super::store::LocalStore;
use crate::models::{Report, ReportStatus, User};

/// Aggregate counts over a list of reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub resolved: usize,
}

impl DashboardStats {
    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a Report>) -> Self {
        let mut stats = Self::default();
        for report in reports {
            stats.total += 1;
            match report.status {
                ReportStatus::Pending => stats.pending += 1,
                ReportStatus::InProgress => stats.in_progress += 1,
                ReportStatus::Resolved => stats.resolved += 1,
            }
        }
        stats
    }

    /// Percentage of resolved reports, rounded; 0 when there are none.
    pub fn resolution_rate(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let rate = (self.resolved as f64 / self.total as f64 * 100.0).round();
        rate.clamp(0.0, 100.0) as u8
    }
}

/// Which reports to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ReportStatus),
}

impl StatusFilter {
    pub fn matches(&self, report: &Report) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(status) => report.status == *status,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusFilter::All => "All Issues",
            StatusFilter::Only(status) => status.label(),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        ReportStatus::parse(s)
            .map(StatusFilter::Only)
            .ok_or_else(|| format!("unknown status filter: {}", s))
    }
}

/// Reports matching `filter`, in their original order.
pub fn filter_reports(reports: &[Report], filter: StatusFilter) -> Vec<&Report> {
    reports.iter().filter(|r| filter.matches(r)).collect()
}

/// Everything the user dashboard shows.
#[derive(Debug, Clone)]
pub struct UserDashboard {
    pub user: User,
    pub reports: Vec<Report>,
    /// Ids of reports that exist only on this device.
    pub unsynced: HashSet<String>,
    /// Problem loading from the server, if any.
    pub notice: Option<String>,
}

impl UserDashboard {
    pub fn stats(&self) -> DashboardStats {
        DashboardStats::from_reports(&self.reports)
    }
}

/// What the dashboard route resolves to for the current session.
#[derive(Debug, Clone)]
pub enum DashboardView {
    LoginPrompt,
    Admin,
    User(UserDashboard),
}

/// Loads the dashboard for whoever is logged in.
#[derive(Debug, Clone)]
pub struct Dashboard {
    api: ApiClient,
    store: LocalStore,
}

impl Dashboard {
    pub fn new(api: ApiClient, store: LocalStore) -> Self {
        Self { api, store }
    }

    /// Route on the session, then fetch the user's reports.
    ///
    /// A failed fetch still yields a dashboard built from the local cache.
    pub async fn load(&self) -> DashboardView {
        let Some(session) = self.store.session() else {
            return DashboardView::LoginPrompt;
        };
        if session.is_admin() {
            return DashboardView::Admin;
        }

        let user = session.user;
        let (mut reports, notice) = match self.api.list_user_reports(&user.id).await {
            Ok(reports) => (reports, None),
            Err(error) => {
                tracing::warn!(user_id = %user.id, %error, "Falling back to cached reports");
                (Vec::new(), Some(format!("Could not load reports from server: {}", error)))
            }
        };

        let mut unsynced = HashSet::new();
        for cached in self.store.cached_reports() {
            if cached.pending_sync && cached.report.user_id == user.id {
                unsynced.insert(cached.report.id.clone());
                reports.push(cached.report);
            }
        }

        DashboardView::User(UserDashboard {
            user,
            reports,
            unsynced,
            notice,
        })
    }
}

pub fn render_login_prompt() -> String {
    "Please log in to view your dashboard.\n\
     Run `civicbridge login --email <email>` or `civicbridge signup` to create an account.\n"
        .to_string()
}

/// Render the dashboard with the given filter applied. Pure.
pub fn render_dashboard(dashboard: &UserDashboard, filter: StatusFilter) -> String {
    let stats = dashboard.stats();
    let mut out = String::new();

    let _ = writeln!(out, "Welcome back, {}!", dashboard.user.name);
    let _ = writeln!(out, "{}", render_stats(&stats));
    if let Some(notice) = &dashboard.notice {
        let _ = writeln!(out, "! {}", notice);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Filter: {}", filter.label());

    let visible = filter_reports(&dashboard.reports, filter);
    if visible.is_empty() {
        let _ = writeln!(out, "No issues to show.");
        return out;
    }

    for report in visible {
        let sync_note = if dashboard.unsynced.contains(&report.id) {
            " (saved on this device only)"
        } else {
            ""
        };
        out.push_str(&render_report_line(report, sync_note));
        for comment in &report.comments {
            let _ = writeln!(out, "    Admin: {}", comment.comment_text);
        }
    }
    out
}

/// One-line summary of the counts.
pub fn render_stats(stats: &DashboardStats) -> String {
    format!(
        "Total: {}  Pending: {}  In Progress: {}  Resolved: {}  Resolution Rate: {}%",
        stats.total,
        stats.pending,
        stats.in_progress,
        stats.resolved,
        stats.resolution_rate()
    )
}

/// Two-line summary of a report; `note` is appended to the headline.
pub(crate) fn render_report_line(report: &Report, note: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "[{}] {} - {}{}",
        report.status.label(),
        report.issue_type,
        report.description,
        note
    );
    let mut details = vec![report.address.clone(), format_timestamp(&report.timestamp)];
    if let Some(location) = report.location {
        details.push(location.to_string());
    }
    if !report.photos.is_empty() {
        details.push(format!("{} photo(s)", report.photos.len()));
    }
    let _ = writeln!(out, "    {} | id {}", details.join(" | "), report.id);
    out
}

fn format_timestamp(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::session::Session;
    use crate::client::store::CachedReport;
    use crate::models::Role;

    fn report(id: &str, status: ReportStatus) -> Report {
        Report {
            id: id.to_string(),
            user_id: "u1".to_string(),
            user_name: "Ann".to_string(),
            user_email: "ann@example.com".to_string(),
            issue_type: "pothole".to_string(),
            description: format!("Report {}", id),
            location: None,
            address: "Main St".to_string(),
            photos: vec![],
            timestamp: "2024-03-01T10:30:00+00:00".to_string(),
            status,
            comments: vec![],
        }
    }

    fn sample() -> Vec<Report> {
        vec![
            report("1", ReportStatus::Pending),
            report("2", ReportStatus::Resolved),
            report("3", ReportStatus::InProgress),
            report("4", ReportStatus::Pending),
            report("5", ReportStatus::Resolved),
        ]
    }

    #[test]
    fn test_resolution_rate() {
        assert_eq!(DashboardStats::default().resolution_rate(), 0);

        let stats = DashboardStats::from_reports(&sample());
        assert_eq!(stats.total, 5);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.resolved, 2);
        assert_eq!(stats.resolution_rate(), 40);

        let third = vec![
            report("a", ReportStatus::Resolved),
            report("b", ReportStatus::Pending),
            report("c", ReportStatus::Pending),
        ];
        assert_eq!(DashboardStats::from_reports(&third).resolution_rate(), 33);
    }

    #[test]
    fn test_resolution_rate_bounds() {
        for resolved in 0..=7 {
            let mut reports: Vec<Report> = (0..resolved)
                .map(|i| report(&i.to_string(), ReportStatus::Resolved))
                .collect();
            reports.extend(
                (0..(7 - resolved)).map(|i| report(&format!("p{}", i), ReportStatus::Pending)),
            );
            let rate = DashboardStats::from_reports(&reports).resolution_rate();
            assert!(rate <= 100);
            assert_eq!(rate == 100, resolved == 7);
        }
    }

    #[test]
    fn test_filter_preserves_order() {
        let reports = sample();
        for status in ReportStatus::ALL {
            let filtered = filter_reports(&reports, StatusFilter::Only(status));
            assert!(filtered.iter().all(|r| r.status == status));
            let expected: Vec<&Report> = reports.iter().filter(|r| r.status == status).collect();
            assert_eq!(filtered, expected);
        }

        let pending: Vec<&str> = filter_reports(&reports, StatusFilter::Only(ReportStatus::Pending))
            .into_iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(pending, ["1", "4"]);
    }

    #[test]
    fn test_filter_all_is_identity() {
        let reports = sample();
        let all: Vec<Report> = filter_reports(&reports, StatusFilter::All)
            .into_iter()
            .cloned()
            .collect();
        assert_eq!(all, reports);
    }

    #[test]
    fn test_status_filter_parse() {
        assert_eq!("all".parse::<StatusFilter>(), Ok(StatusFilter::All));
        assert_eq!(
            "in-progress".parse::<StatusFilter>(),
            Ok(StatusFilter::Only(ReportStatus::InProgress))
        );
        assert!("done".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn test_render_is_pure_and_filtered() {
        let dashboard = UserDashboard {
            user: User {
                id: "u1".to_string(),
                email: "ann@example.com".to_string(),
                name: "Ann".to_string(),
                role: Role::User,
                created_at: None,
            },
            reports: sample(),
            unsynced: HashSet::from(["4".to_string()]),
            notice: None,
        };

        let pending = render_dashboard(&dashboard, StatusFilter::Only(ReportStatus::Pending));
        assert!(pending.contains("Welcome back, Ann!"));
        assert!(pending.contains("Resolution Rate: 40%"));
        assert!(pending.contains("pothole - Report 1\n"));
        assert!(pending.contains("pothole - Report 4 (saved on this device only)\n"));
        assert!(!pending.contains("Report 2"));

        // Same input, same output; the dashboard itself is untouched
        assert_eq!(
            pending,
            render_dashboard(&dashboard, StatusFilter::Only(ReportStatus::Pending))
        );
        assert_eq!(dashboard.reports, sample());
    }

    #[tokio::test]
    async fn test_load_without_session_is_login_prompt() {
        let dashboard = Dashboard::new(
            ApiClient::new("http://127.0.0.1:9/api", None),
            LocalStore::in_memory(),
        );
        assert!(matches!(dashboard.load().await, DashboardView::LoginPrompt));
    }

    #[tokio::test]
    async fn test_load_offline_uses_cache() {
        let store = LocalStore::in_memory();
        let user = User {
            id: "u1".to_string(),
            email: "ann@example.com".to_string(),
            name: "Ann".to_string(),
            role: Role::User,
            created_at: None,
        };
        store.set_session(Session::new(user)).unwrap();
        store
            .cache_report(CachedReport {
                report: report("local-1", ReportStatus::Pending),
                pending_sync: true,
                last_error: None,
            })
            .unwrap();

        let dashboard = Dashboard::new(ApiClient::new("http://127.0.0.1:9/api", None), store);
        let DashboardView::User(view) = dashboard.load().await else {
            panic!("expected user dashboard");
        };
        assert_eq!(view.reports.len(), 1);
        assert!(view.unsynced.contains("local-1"));
        assert!(view.notice.is_some());
    }
}
