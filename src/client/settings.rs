//! Appearance and notification preferences.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::store::{LocalStore, StoreError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Auto,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Auto => "auto",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification toggles. Both default to enabled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationSettings {
    pub push: bool,
    pub email: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            push: true,
            email: true,
        }
    }
}

/// Reads and writes preferences in the local store.
#[derive(Debug, Clone)]
pub struct Settings {
    store: LocalStore,
}

impl Settings {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn theme(&self) -> Theme {
        self.store.read(|s| s.theme)
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), StoreError> {
        tracing::debug!(%theme, "Theme changed");
        self.store.update(|s| s.theme = theme)
    }

    pub fn notifications(&self) -> NotificationSettings {
        self.store.read(|s| s.notifications)
    }

    /// Update whichever toggles are given; `None` leaves a toggle unchanged.
    pub fn set_notifications(
        &self,
        push: Option<bool>,
        email: Option<bool>,
    ) -> Result<NotificationSettings, StoreError> {
        self.store.update(|s| {
            if let Some(push) = push {
                s.notifications.push = push;
            }
            if let Some(email) = email {
                s.notifications.email = email;
            }
            s.notifications
        })
    }
}
