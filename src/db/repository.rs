//! Database repository for CRUD operations.
//!
//! Uses prepared statements and transactions for data integrity.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::auth::hash_password;
use crate::errors::AppError;
use crate::models::{
    AddCommentRequest, Comment, CreateReportRequest, Location, Report, ReportStatus, Role,
    SignupRequest, User, MANUAL_LOCATION, MAX_PHOTOS,
};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== USER OPERATIONS ====================

    /// Register a new user. Duplicate emails surface as [`AppError::Conflict`].
    pub async fn create_user(&self, request: &SignupRequest) -> Result<User, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let email = request.email.trim().to_lowercase();

        sqlx::query(
            "INSERT INTO users (id, email, name, password_hash, role, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&email)
        .bind(request.name.trim())
        .bind(hash_password(&request.password))
        .bind(Role::User.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => {
                AppError::Conflict(format!("Email {} is already registered", email))
            }
            other => other,
        })?;

        Ok(User {
            id,
            email,
            name: request.name.trim().to_string(),
            role: Role::User,
            created_at: Some(now),
        })
    }

    /// Find a user and their password hash by email.
    pub async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>, AppError> {
        let row = sqlx::query(
            "SELECT id, email, name, password_hash, role, created_at FROM users WHERE email = ?",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let hash: String = row.get("password_hash");
            (user_from_row(&row), hash)
        }))
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query("SELECT id, email, name, role, created_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    // ==================== REPORT OPERATIONS ====================

    /// Create a report together with its photos in a single transaction.
    pub async fn create_report(&self, request: &CreateReportRequest) -> Result<Report, AppError> {
        if request.photos.len() > MAX_PHOTOS {
            return Err(AppError::Validation(format!(
                "At most {} photos are allowed",
                MAX_PHOTOS
            )));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let timestamp = request
            .timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc).to_rfc3339())
            .unwrap_or_else(|| Utc::now().to_rfc3339());
        let address = request
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(MANUAL_LOCATION)
            .to_string();

        // Fill in author details from the account when the client left them out
        let (user_name, user_email) = if request.user_name.trim().is_empty()
            || request.user_email.trim().is_empty()
        {
            match self.get_user(&request.user_id).await? {
                Some(user) => (
                    non_empty_or(&request.user_name, user.name),
                    non_empty_or(&request.user_email, user.email),
                ),
                None => (
                    non_empty_or(&request.user_name, "Unknown".to_string()),
                    non_empty_or(&request.user_email, "Unknown".to_string()),
                ),
            }
        } else {
            (request.user_name.clone(), request.user_email.clone())
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO reports (id, user_id, user_name, user_email, issue_type, description,
                                    latitude, longitude, address, status, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&request.user_id)
        .bind(&user_name)
        .bind(&user_email)
        .bind(request.issue_type.trim())
        .bind(request.description.trim())
        .bind(request.location.map(|l| l.lat))
        .bind(request.location.map(|l| l.lng))
        .bind(&address)
        .bind(ReportStatus::Pending.as_str())
        .bind(&timestamp)
        .execute(&mut *tx)
        .await?;

        for (position, photo) in request.photos.iter().enumerate() {
            sqlx::query(
                "INSERT INTO report_photos (report_id, position, photo_data) VALUES (?, ?, ?)",
            )
            .bind(&id)
            .bind(position as i64)
            .bind(photo)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Report {
            id,
            user_id: request.user_id.clone(),
            user_name,
            user_email,
            issue_type: request.issue_type.trim().to_string(),
            description: request.description.trim().to_string(),
            location: request.location,
            address,
            photos: request.photos.clone(),
            timestamp,
            status: ReportStatus::Pending,
            comments: Vec::new(),
        })
    }

    /// List all reports, newest first.
    pub async fn list_reports(&self) -> Result<Vec<Report>, AppError> {
        self.load_reports(None).await
    }

    /// List reports submitted by one user, newest first.
    pub async fn list_user_reports(&self, user_id: &str) -> Result<Vec<Report>, AppError> {
        self.load_reports(Some(user_id)).await
    }

    /// Set the status of a report.
    pub async fn update_status(&self, id: &str, status: ReportStatus) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE reports SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Report {} not found", id)));
        }
        Ok(())
    }

    /// Append an admin comment to a report.
    pub async fn add_comment(
        &self,
        report_id: &str,
        request: &AddCommentRequest,
    ) -> Result<Comment, AppError> {
        let exists = sqlx::query("SELECT 1 FROM reports WHERE id = ?")
            .bind(report_id)
            .fetch_optional(&self.pool)
            .await?
            .is_some();
        if !exists {
            return Err(AppError::NotFound(format!("Report {} not found", report_id)));
        }

        let comment = Comment {
            id: uuid::Uuid::new_v4().to_string(),
            report_id: report_id.to_string(),
            comment_text: request.comment.trim().to_string(),
            admin_id: request.admin_id.clone(),
            created_at: Utc::now().to_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO admin_comments (id, report_id, admin_id, comment_text, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&comment.id)
        .bind(&comment.report_id)
        .bind(&comment.admin_id)
        .bind(&comment.comment_text)
        .bind(&comment.created_at)
        .execute(&self.pool)
        .await?;

        Ok(comment)
    }

    /// Delete a report. Photos and comments go with it.
    pub async fn delete_report(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM reports WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Report {} not found", id)));
        }
        Ok(())
    }

    /// Load reports with their photos and comments using one query per table.
    async fn load_reports(&self, user_id: Option<&str>) -> Result<Vec<Report>, AppError> {
        let rows = sqlx::query(&format!(
            "{} WHERE (?1 IS NULL OR user_id = ?1) ORDER BY created_at DESC, rowid DESC",
            SELECT_REPORTS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut reports: Vec<Report> = rows.iter().map(report_from_row).collect();
        if reports.is_empty() {
            return Ok(reports);
        }

        let photo_rows = sqlx::query(
            r#"SELECT p.report_id, p.photo_data FROM report_photos p
               JOIN reports r ON r.id = p.report_id
               WHERE (?1 IS NULL OR r.user_id = ?1)
               ORDER BY p.report_id, p.position"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let comment_rows = sqlx::query(
            r#"SELECT c.id, c.report_id, c.admin_id, c.comment_text, c.created_at FROM admin_comments c
               JOIN reports r ON r.id = c.report_id
               WHERE (?1 IS NULL OR r.user_id = ?1)
               ORDER BY c.created_at, c.rowid"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut photos: HashMap<String, Vec<String>> = HashMap::new();
        for row in &photo_rows {
            photos
                .entry(row.get("report_id"))
                .or_default()
                .push(row.get("photo_data"));
        }

        let mut comments: HashMap<String, Vec<Comment>> = HashMap::new();
        for row in &comment_rows {
            let comment = comment_from_row(row);
            comments
                .entry(comment.report_id.clone())
                .or_default()
                .push(comment);
        }

        for report in &mut reports {
            report.photos = photos.remove(&report.id).unwrap_or_default();
            report.comments = comments.remove(&report.id).unwrap_or_default();
        }

        Ok(reports)
    }
}

const SELECT_REPORTS: &str = r#"SELECT id, user_id, user_name, user_email, issue_type, description,
                                      latitude, longitude, address, status, created_at
                               FROM reports"#;

fn non_empty_or(value: &str, fallback: String) -> String {
    if value.trim().is_empty() {
        fallback
    } else {
        value.to_string()
    }
}

// ==================== ROW MAPPERS ====================

fn user_from_row(row: &SqliteRow) -> User {
    let role: String = row.get("role");
    User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        role: role.parse().unwrap_or_default(),
        created_at: row.get("created_at"),
    }
}

fn report_from_row(row: &SqliteRow) -> Report {
    let latitude: Option<f64> = row.get("latitude");
    let longitude: Option<f64> = row.get("longitude");
    let status: String = row.get("status");

    Report {
        id: row.get("id"),
        user_id: row.get("user_id"),
        user_name: row.get("user_name"),
        user_email: row.get("user_email"),
        issue_type: row.get("issue_type"),
        description: row.get("description"),
        location: latitude.zip(longitude).map(|(lat, lng)| Location { lat, lng }),
        address: row.get("address"),
        photos: Vec::new(),
        timestamp: row.get("created_at"),
        status: ReportStatus::parse(&status).unwrap_or_default(),
        comments: Vec::new(),
    }
}

fn comment_from_row(row: &SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        report_id: row.get("report_id"),
        comment_text: row.get("comment_text"),
        admin_id: row.get("admin_id"),
        created_at: row.get("created_at"),
    }
}
