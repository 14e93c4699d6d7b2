//! Report model and its status vocabulary.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Maximum number of photos attached to a single report.
pub const MAX_PHOTOS: usize = 5;

/// Address used when the reporter leaves the address field blank.
pub const MANUAL_LOCATION: &str = "Manual location";

/// Lifecycle stage of a report.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    #[default]
    Pending,
    InProgress,
    Resolved,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 3] = [
        ReportStatus::Pending,
        ReportStatus::InProgress,
        ReportStatus::Resolved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::InProgress => "in_progress",
            ReportStatus::Resolved => "resolved",
        }
    }

    /// Human readable label, e.g. "In Progress".
    pub fn label(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "Pending",
            ReportStatus::InProgress => "In Progress",
            ReportStatus::Resolved => "Resolved",
        }
    }

    /// Parse a status, accepting the legacy hyphenated and spaced spellings.
    ///
    /// `in-progress`, `in progress`, `inprogress` and any casing of
    /// `in_progress` all map to [`ReportStatus::InProgress`].
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect();

        match normalized.as_str() {
            "pending" => Some(ReportStatus::Pending),
            "inprogress" => Some(ReportStatus::InProgress),
            "resolved" => Some(ReportStatus::Resolved),
            _ => None,
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ReportStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(ReportStatus::Pending),
            Some(value) => ReportStatus::parse(value).ok_or_else(|| {
                serde::de::Error::custom(format!("unknown report status: {}", value))
            }),
        }
    }
}

/// Geographic coordinate of a reported issue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether both coordinates are finite and inside the WGS84 range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lat: {:.6}, Lng: {:.6}", self.lat, self.lng)
    }
}

/// Accepts `null`, a full coordinate, or an object whose coordinates are null.
fn deserialize_location<'de, D>(deserializer: D) -> Result<Option<Location>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct RawLocation {
        lat: Option<f64>,
        lng: Option<f64>,
    }

    let raw = Option::<RawLocation>::deserialize(deserializer)?;
    Ok(match raw {
        Some(RawLocation {
            lat: Some(lat),
            lng: Some(lng),
        }) => Some(Location { lat, lng }),
        _ => None,
    })
}

/// Admin comment attached to a report. Comments are append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub report_id: String,
    pub comment_text: String,
    pub admin_id: String,
    pub created_at: String,
}

/// A user-submitted issue report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub user_email: String,
    pub issue_type: String,
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_location")]
    pub location: Option<Location>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub photos: Vec<String>,
    pub timestamp: String,
    #[serde(default)]
    pub status: ReportStatus,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// Request body for creating a new report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportRequest {
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub user_email: String,
    pub issue_type: String,
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_location")]
    pub location: Option<Location>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    /// Client-side creation time; the server stamps its own when absent.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl From<&Report> for CreateReportRequest {
    fn from(report: &Report) -> Self {
        Self {
            user_id: report.user_id.clone(),
            user_name: report.user_name.clone(),
            user_email: report.user_email.clone(),
            issue_type: report.issue_type.clone(),
            description: report.description.clone(),
            location: report.location,
            address: Some(report.address.clone()),
            photos: report.photos.clone(),
            timestamp: Some(report.timestamp.clone()),
        }
    }
}

/// Request body for `PUT /reports/:id/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(deserialize_with = "deserialize_required_status")]
    pub status: ReportStatus,
}

/// Unlike stored reports, a status change must name a status explicitly.
fn deserialize_required_status<'de, D>(deserializer: D) -> Result<ReportStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Err(serde::de::Error::custom("status is required")),
        Some(value) => ReportStatus::parse(value).ok_or_else(|| {
            serde::de::Error::custom(format!("unknown report status: {}", value))
        }),
    }
}

/// Admin id recorded when a comment arrives without one.
pub const DEFAULT_ADMIN_ID: &str = "admin-001";

fn default_admin_id() -> String {
    DEFAULT_ADMIN_ID.to_string()
}

/// Request body for `POST /reports/:id/comment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentRequest {
    pub comment: String,
    #[serde(default = "default_admin_id")]
    pub admin_id: String,
}

/// `{report}` payload of a create response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPayload {
    pub report: Report,
}

/// `{reports}` payload of a list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsPayload {
    pub reports: Vec<Report>,
}
