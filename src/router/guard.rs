use serde::Serialize;

use crate::router::routes::{RouteRecord, LOGIN_PATH};
use crate::session::{AuthStatus, SessionManager};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "to", rename_all = "snake_case")]
pub enum Navigation {
    Proceed,
    Redirect(String),
}

/// Runs before every navigation. Protected routes need a resolved,
/// authenticated session; everything else passes straight through.
#[derive(Clone)]
pub struct RouteGuard {
    session: SessionManager,
    login_path: String,
}

impl RouteGuard {
    pub fn new(session: SessionManager) -> Self {
        Self {
            session,
            login_path: LOGIN_PATH.to_string(),
        }
    }

    pub fn with_login_path(mut self, path: &str) -> Self {
        self.login_path = path.to_string();
        self
    }

    pub async fn before_each(&self, to: &RouteRecord) -> Navigation {
        if !to.requires_auth || self.session.is_authenticated() {
            return Navigation::Proceed;
        }

        match self.session.initialize().await {
            Ok(AuthStatus::Authenticated) => Navigation::Proceed,
            Ok(AuthStatus::NotAuthenticated) => Navigation::Redirect(self.login_path.clone()),
            Err(e) => {
                log::error!("Auth check error: {}", e);
                Navigation::Redirect(self.login_path.clone())
            }
        }
    }
}
