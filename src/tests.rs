//! Integration tests for the CivicBridge backend and the client components
//! that drive it.

use std::sync::Arc;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::client::{
    AdminManager, AdminQuery, ApiClient, Auth, Dashboard, DashboardView, LocalStore,
    ReportManager, SignupForm, StatusFilter, Submission,
};
use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::models::{Location, ReportStatus, MANUAL_LOCATION};
use crate::{create_router, AppState};

const TEST_PSK: &str = "test-api-key";

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_psk(Some(TEST_PSK.to_string())).await
    }

    async fn with_psk(psk: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        let config = Config {
            api_psk: psk.clone(),
            db_path,
            bind_addr: "127.0.0.1:0".to_string(),
            log_level: "warn".to_string(),
            admin_username: "admin".to_string(),
            admin_password: "admin123".to_string(),
            api_url: String::new(),
            state_path: temp_dir.path().join("client-state.json"),
            device_location: None,
        };

        let state = AppState {
            repo,
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let mut client_builder = Client::builder();
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn api(&self) -> ApiClient {
        ApiClient::new(self.url(""), Some(TEST_PSK.to_string()))
    }

    /// A fresh client-side state file, as on a separate device.
    fn device(&self, name: &str) -> LocalStore {
        LocalStore::open(self.temp_dir.path().join(format!("{}.json", name)))
            .expect("Failed to open store")
    }

    /// Register and log in a citizen on a new device.
    async fn citizen(&self, name: &str, email: &str) -> LocalStore {
        let store = self.device(name);
        let auth = Auth::new(self.api(), store.clone());
        auth.signup(&SignupForm {
            name: name.to_string(),
            email: email.to_string(),
            password: "secret1".to_string(),
            confirm: "secret1".to_string(),
        })
        .await
        .expect("Failed to sign up");
        auth.login(email, "secret1").await.expect("Failed to log in");
        store
    }

    /// Log in the administrator on a new device.
    async fn admin(&self) -> AdminManager {
        let store = self.device("admin");
        Auth::new(self.api(), store.clone())
            .admin_login("admin", "admin123")
            .await
            .expect("Failed to log in admin");
        AdminManager::new(self.api(), store)
    }

    async fn submit(&self, store: &LocalStore, issue_type: &str, description: &str) -> String {
        let mut manager = ReportManager::new(self.api(), store.clone());
        manager.set_issue_type(issue_type);
        manager.set_description(description);
        match manager.submit().await.expect("Failed to submit") {
            Submission::Synced(report) => report.id,
            Submission::CachedLocally { error, .. } => panic!("report not synced: {}", error),
        }
    }
}

// ============= HEALTH & AUTH LAYER =============

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    // No API key required
    let resp = Client::new()
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "status": "ok" }));

    fixture.api().health().await.unwrap();
}

#[tokio::test]
async fn test_auth_missing_psk() {
    let fixture = TestFixture::new().await;

    let resp = Client::new()
        .get(fixture.url("/reports"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_auth_bearer_token() {
    let fixture = TestFixture::new().await;

    let resp = Client::new()
        .get(fixture.url("/reports"))
        .header("Authorization", format!("Bearer {}", TEST_PSK))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_no_psk_configured_is_open() {
    let fixture = TestFixture::with_psk(None).await;

    let reports = ApiClient::new(fixture.url(""), None)
        .list_reports()
        .await
        .unwrap();
    assert!(reports.is_empty());
}

// ============= ACCOUNTS =============

#[tokio::test]
async fn test_signup_and_login() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/auth/signup"))
        .json(&json!({ "email": "ann@example.com", "name": "Ann", "password": "secret1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("password").is_none());

    let user = fixture
        .api()
        .login("ann@example.com", "secret1")
        .await
        .unwrap();
    assert_eq!(user.name, "Ann");
}

#[tokio::test]
async fn test_login_failures() {
    let fixture = TestFixture::new().await;
    let api = fixture.api();
    api.signup("ann@example.com", "Ann", "secret1").await.unwrap();

    let wrong_password = api.login("ann@example.com", "nope").await.unwrap_err();
    assert_eq!(wrong_password.status(), Some(401));
    assert_eq!(wrong_password.to_string(), "Wrong password");

    let unknown = api.login("bob@example.com", "secret1").await.unwrap_err();
    assert_eq!(unknown.status(), Some(404));
}

#[tokio::test]
async fn test_duplicate_email_conflict() {
    let fixture = TestFixture::new().await;
    let api = fixture.api();
    api.signup("ann@example.com", "Ann", "secret1").await.unwrap();

    let err = api
        .signup("ANN@example.com", "Ann Again", "secret2")
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(409));
}

#[tokio::test]
async fn test_admin_login() {
    let fixture = TestFixture::new().await;
    let api = fixture.api();

    let admin = api.admin_login("admin", "admin123").await.unwrap();
    assert!(admin.is_admin());
    assert_eq!(admin.id, "admin-001");

    let err = api.admin_login("admin", "wrong").await.unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn test_session_routes_dashboard() {
    let fixture = TestFixture::new().await;

    let store = fixture.citizen("Ann", "ann@example.com").await;
    let session = store.session().unwrap();
    assert!(session.token.starts_with("user-token-"));

    let dashboard = Dashboard::new(fixture.api(), store.clone());
    assert!(matches!(dashboard.load().await, DashboardView::User(_)));

    Auth::new(fixture.api(), store.clone()).logout().unwrap();
    assert!(matches!(dashboard.load().await, DashboardView::LoginPrompt));

    // The logout was persisted
    let reopened = LocalStore::open(store.path().unwrap()).unwrap();
    assert!(reopened.session().is_none());
}

// ============= REPORTS =============

#[tokio::test]
async fn test_report_without_coordinates() {
    let fixture = TestFixture::new().await;
    let store = fixture.citizen("Ann", "ann@example.com").await;

    let mut manager = ReportManager::new(fixture.api(), store.clone());
    manager.set_issue_type("pothole");
    manager.set_description("Large pothole");
    manager.set_address("123 Elm St");
    let submission = manager.submit().await.unwrap();
    assert!(matches!(submission, Submission::Synced(_)));

    let reports = fixture.api().list_reports().await.unwrap();
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.location, None);
    assert_eq!(report.address, "123 Elm St");
    assert_eq!(report.status, ReportStatus::Pending);
    assert_eq!(report.user_name, "Ann");

    // Serialized location is an explicit null
    let raw: Value = fixture
        .client
        .get(fixture.url("/reports"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(raw["reports"][0]["location"].is_null());
}

#[tokio::test]
async fn test_report_with_location_and_photo() {
    let fixture = TestFixture::new().await;
    let store = fixture.citizen("Ann", "ann@example.com").await;

    let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    let mut manager = ReportManager::new(fixture.api(), store.clone());
    manager.set_issue_type("graffiti");
    manager.set_description("Tagged wall");
    manager
        .set_location(
            Location::new(40.7128, -74.006),
            crate::client::report::LocationSource::MapClick,
        )
        .unwrap();
    let outcome = manager.add_photos(vec![crate::client::PhotoFile::new(
        "wall.png",
        png.to_vec(),
    )]);
    assert_eq!(outcome.accepted.len(), 1);

    let Submission::Synced(report) = manager.submit().await.unwrap() else {
        panic!("expected synced report");
    };
    assert_eq!(report.location, Some(Location::new(40.7128, -74.006)));
    assert_eq!(report.address, MANUAL_LOCATION);
    assert_eq!(report.photos.len(), 1);
    assert!(report.photos[0].starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_user_reports_are_scoped_and_newest_first() {
    let fixture = TestFixture::new().await;
    let ann = fixture.citizen("Ann", "ann@example.com").await;
    let bob = fixture.citizen("Bob", "bob@example.com").await;

    let first = fixture.submit(&ann, "pothole", "First").await;
    let second = fixture.submit(&ann, "graffiti", "Second").await;
    fixture.submit(&bob, "streetlight", "Bob's").await;

    let ann_id = ann.session().unwrap().user.id;
    let reports = fixture.api().list_user_reports(&ann_id).await.unwrap();
    let ids: Vec<&str> = reports.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, [second.as_str(), first.as_str()]);

    assert_eq!(fixture.api().list_reports().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_validation_error_envelope() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/reports"))
        .json(&json!({
            "userId": "u1",
            "issueType": "pothole",
            "description": "   ",
            "timestamp": "2024-03-01T10:30:00Z"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"], "description is required");
}

#[tokio::test]
async fn test_too_many_photos_rejected() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/reports"))
        .json(&json!({
            "userId": "u1",
            "issueType": "pothole",
            "description": "Hole",
            "photos": ["a", "b", "c", "d", "e", "f"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_malformed_body_uses_error_envelope() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/auth/login"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "BAD_REQUEST");
}

// ============= LOCAL CACHE =============

#[tokio::test]
async fn test_unreachable_server_caches_then_syncs() {
    let fixture = TestFixture::new().await;
    let store = fixture.citizen("Ann", "ann@example.com").await;

    let offline = ApiClient::new("http://127.0.0.1:9/api", Some(TEST_PSK.to_string()));
    let mut manager = ReportManager::new(offline.clone(), store.clone());
    manager.set_issue_type("pothole");
    manager.set_description("Reported while offline");
    let submission = manager.submit().await.unwrap();
    let Submission::CachedLocally { report, error } = submission else {
        panic!("expected local fallback");
    };
    assert!(error.is_transport());

    // The offline dashboard still shows the cached report
    let DashboardView::User(view) = Dashboard::new(offline, store.clone()).load().await else {
        panic!("expected user dashboard");
    };
    assert!(view.notice.is_some());
    assert!(view.unsynced.contains(&report.id));

    let summary = ReportManager::new(fixture.api(), store.clone())
        .sync_pending()
        .await
        .unwrap();
    assert_eq!(summary.synced.len(), 1);
    assert!(summary.failed.is_empty());
    assert!(store.cached_reports().is_empty());

    let DashboardView::User(view) = Dashboard::new(fixture.api(), store).load().await else {
        panic!("expected user dashboard");
    };
    assert_eq!(view.reports.len(), 1);
    assert_eq!(view.reports[0].description, "Reported while offline");
    assert!(view.unsynced.is_empty());
}

// ============= ADMIN =============

#[tokio::test]
async fn test_admin_status_change_updates_both_dashboards() {
    let fixture = TestFixture::new().await;
    let ann = fixture.citizen("Ann", "ann@example.com").await;
    let report_id = fixture.submit(&ann, "pothole", "Deep hole").await;

    let mut admin = fixture.admin().await;
    admin.refresh().await.unwrap();
    assert_eq!(admin.stats().pending, 1);

    admin
        .update_status(&report_id, ReportStatus::Resolved)
        .await
        .unwrap();
    let stats = admin.stats();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.resolved, 1);
    assert_eq!(stats.resolution_rate(), 100);

    let DashboardView::User(view) = Dashboard::new(fixture.api(), ann).load().await else {
        panic!("expected user dashboard");
    };
    assert_eq!(view.stats().resolved, 1);
}

#[tokio::test]
async fn test_legacy_status_spelling_accepted() {
    let fixture = TestFixture::new().await;
    let ann = fixture.citizen("Ann", "ann@example.com").await;
    let report_id = fixture.submit(&ann, "pothole", "Deep hole").await;

    let resp = fixture
        .client
        .put(fixture.url(&format!("/reports/{}/status", report_id)))
        .json(&json!({ "status": "in-progress" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let raw: Value = fixture
        .client
        .get(fixture.url("/reports"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(raw["reports"][0]["status"], "in_progress");

    let resp = fixture
        .client
        .put(fixture.url(&format!("/reports/{}/status", report_id)))
        .json(&json!({ "status": "done" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_status_update_without_status_is_rejected() {
    let fixture = TestFixture::new().await;
    let ann = fixture.citizen("Ann", "ann@example.com").await;
    let report_id = fixture.submit(&ann, "pothole", "Deep hole").await;
    fixture
        .api()
        .update_status(&report_id, ReportStatus::Resolved)
        .await
        .unwrap();

    for bad in [json!({}), json!({ "status": "" }), json!({ "status": null })] {
        let resp = fixture
            .client
            .put(fixture.url(&format!("/reports/{}/status", report_id)))
            .json(&bad)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "{}", bad);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    let reports = fixture.api().list_reports().await.unwrap();
    assert_eq!(reports[0].status, ReportStatus::Resolved);
}

#[tokio::test]
async fn test_unknown_report_is_not_found() {
    let fixture = TestFixture::new().await;
    let err = fixture
        .api()
        .update_status("missing", ReportStatus::Resolved)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_admin_delete_requires_confirmation() {
    let fixture = TestFixture::new().await;
    let ann = fixture.citizen("Ann", "ann@example.com").await;
    let report_id = fixture.submit(&ann, "pothole", "Deep hole").await;

    let mut admin = fixture.admin().await;
    admin.refresh().await.unwrap();

    let deleted = admin.delete(&report_id, &|_: &str| false).await.unwrap();
    assert!(!deleted);
    assert_eq!(fixture.api().list_reports().await.unwrap().len(), 1);

    let deleted = admin.delete(&report_id, &|_: &str| true).await.unwrap();
    assert!(deleted);
    assert!(admin.reports().is_empty());
    assert!(fixture.api().list_reports().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_comment_and_search() {
    let fixture = TestFixture::new().await;
    let ann = fixture.citizen("Ann", "ann@example.com").await;
    let bob = fixture.citizen("Bob", "bob@example.com").await;
    let report_id = fixture.submit(&ann, "pothole", "Deep pothole").await;
    fixture.submit(&bob, "graffiti", "Tagged wall").await;

    let mut admin = fixture.admin().await;
    admin
        .add_comment(&report_id, "Crew scheduled for Monday")
        .await
        .unwrap();

    let report = admin
        .reports()
        .iter()
        .find(|r| r.id == report_id)
        .unwrap();
    assert_eq!(report.comments.len(), 1);
    assert_eq!(report.comments[0].comment_text, "Crew scheduled for Monday");
    assert_eq!(report.comments[0].admin_id, "admin-001");

    assert_eq!(admin.users(), ["Ann", "Bob"]);

    let query = AdminQuery {
        search: "WALL".to_string(),
        ..AdminQuery::default()
    };
    let page = admin.query(&query);
    assert_eq!(page.total_matches, 1);
    assert_eq!(page.items[0].user_name, "Bob");

    let query = AdminQuery {
        status: StatusFilter::Only(ReportStatus::Resolved),
        ..AdminQuery::default()
    };
    assert_eq!(admin.query(&query).total_matches, 0);
}

#[tokio::test]
async fn test_citizen_cannot_use_admin_console() {
    let fixture = TestFixture::new().await;
    let ann = fixture.citizen("Ann", "ann@example.com").await;

    let mut manager = AdminManager::new(fixture.api(), ann);
    assert!(matches!(
        manager.refresh().await,
        Err(crate::client::AdminError::NotAdmin)
    ));
}

// ============= ROUTER =============

#[tokio::test]
async fn test_router_oneshot_health() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.sqlite");
    let pool = init_database(&db_path).await.unwrap();

    let config = Config {
        api_psk: Some("secret-key".to_string()),
        db_path,
        bind_addr: "127.0.0.1:0".to_string(),
        log_level: "warn".to_string(),
        admin_username: "admin".to_string(),
        admin_password: "admin123".to_string(),
        api_url: String::new(),
        state_path: temp_dir.path().join("state.json"),
        device_location: None,
    };
    let app = create_router(AppState {
        repo: Arc::new(Repository::new(pool)),
        config: Arc::new(config),
    });

    let resp = app
        .clone()
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = app
        .oneshot(Request::get("/api/reports").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}
