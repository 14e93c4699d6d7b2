//! Signup, login and logout.

use super::api::{ApiClient, ClientError};
use super::session::Session;
use super::store::{LocalStore, StoreError};
use crate::models::User;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(&'static str),
    #[error(transparent)]
    Api(#[from] ClientError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), AuthError> {
        if [&self.name, &self.email, &self.password, &self.confirm]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(AuthError::Validation("Please fill in all fields"));
        }
        if self.password != self.confirm {
            return Err(AuthError::Validation("Passwords do not match"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(
                "Password must be at least 6 characters long",
            ));
        }
        Ok(())
    }
}

/// Authentication flows. A successful login is persisted as one [`Session`].
#[derive(Debug, Clone)]
pub struct Auth {
    api: ApiClient,
    store: LocalStore,
}

impl Auth {
    pub fn new(api: ApiClient, store: LocalStore) -> Self {
        Self { api, store }
    }

    /// Register an account. The user still has to log in afterwards.
    pub async fn signup(&self, form: &SignupForm) -> Result<User, AuthError> {
        form.validate()?;
        let user = self
            .api
            .signup(form.email.trim(), form.name.trim(), &form.password)
            .await?;
        tracing::info!(user_id = %user.id, "Account created");
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::Validation("Please fill in all fields"));
        }
        let user = self.api.login(email.trim(), password).await?;
        self.start_session(user)
    }

    pub async fn admin_login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(AuthError::Validation("Please fill in all fields"));
        }
        let user = self.api.admin_login(username.trim(), password).await?;
        self.start_session(user)
    }

    /// Forget the session. Settings and cached reports stay on the device.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.store.clear_session()?;
        tracing::info!("Logged out");
        Ok(())
    }

    pub fn current(&self) -> Option<Session> {
        self.store.session()
    }

    fn start_session(&self, user: User) -> Result<Session, AuthError> {
        let session = Session::new(user);
        self.store.set_session(session.clone())?;
        tracing::info!(user_id = %session.user.id, role = session.user.role.as_str(), "Logged in");
        Ok(session)
    }
}
