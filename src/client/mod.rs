//! Client side of CivicBridge: the components behind every CLI command
//! except `serve`.
//!
//! Components are built explicitly from an [`ApiClient`] and a [`LocalStore`];
//! there is no global state.

pub mod admin;
pub mod api;
pub mod auth;
pub mod chatbot;
pub mod dashboard;
pub mod geo;
pub mod report;
pub mod session;
pub mod settings;
pub mod store;

pub use admin::{render_admin_list, AdminError, AdminManager, AdminQuery, Confirm, Page};
pub use api::{ApiClient, ClientError};
pub use auth::{Auth, AuthError, SignupForm};
pub use dashboard::{
    render_dashboard, render_login_prompt, render_stats, Dashboard, DashboardStats,
    DashboardView, StatusFilter,
};
pub use geo::{ConfiguredGeolocator, GeolocationError, Geolocator};
pub use report::{PhotoFile, ReportError, ReportManager, Submission};
pub use session::Session;
pub use settings::{NotificationSettings, Settings, Theme};
pub use store::LocalStore;
