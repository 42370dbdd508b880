pub mod guard;
pub mod routes;

pub use guard::*;
pub use routes::*;

use serde::Serialize;

use crate::session::SessionManager;

/// Alias chains longer than this are treated as a loop
const MAX_REDIRECTS: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NavigationOutcome {
    Render { route: RouteRecord },
    Redirect { to: String },
    NotFound { path: String },
}

/// Route table plus guard: what a navigation to a path ends up doing
#[derive(Clone)]
pub struct AppRouter {
    table: RouteTable,
    guard: RouteGuard,
}

impl AppRouter {
    pub fn new(table: RouteTable, session: SessionManager) -> Self {
        Self {
            table,
            guard: RouteGuard::new(session),
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    pub async fn navigate(&self, path: &str) -> NavigationOutcome {
        let mut current = path.to_string();
        for _ in 0..MAX_REDIRECTS {
            let Some(route) = self.table.find(&current) else {
                return NavigationOutcome::NotFound { path: current };
            };
            if let Some(target) = &route.redirect {
                current = target.clone();
                continue;
            }
            return match self.guard.before_each(route).await {
                Navigation::Proceed => NavigationOutcome::Render {
                    route: route.clone(),
                },
                Navigation::Redirect(to) => NavigationOutcome::Redirect { to },
            };
        }
        log::warn!("Redirect loop navigating to {}", path);
        NavigationOutcome::NotFound {
            path: path.to_string(),
        }
    }
}
