use serde::Serialize;
use thiserror::Error;

use crate::gateway::{GatewayError, RpcError};
use crate::logic::{BindingError, BoundViews};
use crate::model::{Profile, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Anonymous,
    Authenticating,
    Authenticated,
    AuthError,
    ProfileLoading,
    ProfileReady,
    ProfileAbsent,
}

impl SessionStatus {
    /// States reached once a session has been stored
    pub fn has_session(&self) -> bool {
        matches!(
            self,
            SessionStatus::Authenticated
                | SessionStatus::ProfileLoading
                | SessionStatus::ProfileReady
                | SessionStatus::ProfileAbsent
        )
    }
}

/// Result of resolving the current identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Authenticated,
    NotAuthenticated,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// Invalid credentials, unconfirmed email, provider rejection
    #[error("{0}")]
    Auth(String),
    #[error("not signed in")]
    NotAuthenticated,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Binding(#[from] BindingError),
}

impl SessionError {
    /// Auth provider failures surface with the provider's own message
    pub fn auth(error: GatewayError) -> Self {
        match error {
            GatewayError::Auth(message) => SessionError::Auth(message),
            other => SessionError::Auth(other.to_string()),
        }
    }
}

/// Everything the session manager owns. Only the manager mutates it.
#[derive(Debug)]
pub(crate) struct SessionContext {
    pub status: SessionStatus,
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    pub views: Option<BoundViews>,
    pub last_error: Option<String>,
    /// Bumped when a login, registration or logout succeeds
    pub epoch: u64,
    /// Operations in flight
    pub pending: usize,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            status: SessionStatus::Anonymous,
            session: None,
            profile: None,
            views: None,
            last_error: None,
            epoch: 0,
            pending: 0,
        }
    }
}

impl SessionContext {
    pub fn clear(&mut self, status: SessionStatus) {
        self.session = None;
        self.profile = None;
        self.views = None;
        self.status = status;
    }

    pub fn store_session(&mut self, session: Session) {
        self.session = Some(session);
        self.profile = None;
        self.views = None;
        self.status = SessionStatus::Authenticated;
    }

    pub fn is_authenticated(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| s.user.is_email_confirmed())
            .unwrap_or(false)
    }
}

/// Read-only view of the session handed to other components
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub is_authenticated: bool,
    pub is_email_verified: bool,
    pub is_business_owner: bool,
    pub user_email: String,
    pub user_name: String,
    pub profile: Option<Profile>,
    pub bound_views: Vec<String>,
    pub last_error: Option<String>,
}

impl From<&SessionContext> for SessionSnapshot {
    fn from(ctx: &SessionContext) -> Self {
        let user = ctx.session.as_ref().map(|s| &s.user);
        Self {
            status: ctx.status,
            is_authenticated: ctx.is_authenticated(),
            is_email_verified: user.map(|u| u.is_email_confirmed()).unwrap_or(false),
            is_business_owner: ctx
                .profile
                .as_ref()
                .map(|p| p.is_business_owner)
                .unwrap_or(false),
            user_email: user.and_then(|u| u.email.clone()).unwrap_or_default(),
            user_name: ctx
                .profile
                .as_ref()
                .map(Profile::full_name)
                .unwrap_or_default(),
            profile: ctx.profile.clone(),
            bound_views: ctx
                .views
                .as_ref()
                .map(|v| v.ids().into_iter().map(str::to_string).collect())
                .unwrap_or_default(),
            last_error: ctx.last_error.clone(),
        }
    }
}
