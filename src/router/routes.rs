use serde::Serialize;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/home";

/// One navigable route
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteRecord {
    pub path: String,
    pub name: Option<String>,
    pub requires_auth: bool,
    /// Set on alias routes that only forward elsewhere
    pub redirect: Option<String>,
}

impl RouteRecord {
    pub fn public(path: &str, name: &str) -> Self {
        Self {
            path: path.to_string(),
            name: Some(name.to_string()),
            requires_auth: false,
            redirect: None,
        }
    }

    pub fn protected(path: &str, name: &str) -> Self {
        Self {
            requires_auth: true,
            ..Self::public(path, name)
        }
    }

    pub fn redirect(path: &str, to: &str) -> Self {
        Self {
            path: path.to_string(),
            name: None,
            requires_auth: false,
            redirect: Some(to.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteRecord>,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteRecord>) -> Self {
        Self { routes }
    }

    pub fn find(&self, path: &str) -> Option<&RouteRecord> {
        let path = normalize(path);
        self.routes.iter().find(|r| r.path == path)
    }

    pub fn routes(&self) -> &[RouteRecord] {
        &self.routes
    }
}

/// Drops query string, fragment and trailing slash
fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

/// The booking app's routes
pub fn app_routes() -> RouteTable {
    RouteTable::new(vec![
        RouteRecord::redirect("/", HOME_PATH),
        RouteRecord::protected(HOME_PATH, "Home"),
        RouteRecord::protected("/search", "Search"),
        RouteRecord::protected("/user-profile", "Profile"),
        RouteRecord::protected("/user-profile/edit-profile", "Edit Profile"),
        RouteRecord::protected("/user-profile/profile-details", "Profile Details"),
        RouteRecord::protected("/my-calendar", "My Calendar"),
        RouteRecord::public(LOGIN_PATH, "Login"),
        RouteRecord::public("/register", "Register"),
        RouteRecord::protected("/business-setup/step1", "Business Setup Step 1"),
        RouteRecord::protected("/business-setup/step2", "Business Setup Step 2"),
        RouteRecord::protected("/business-setup/step3", "Business Setup Step 3"),
        RouteRecord::protected("/business-setup/complete", "Business Setup Complete"),
        RouteRecord::protected("/business-dashboard", "Business Dashboard"),
        RouteRecord::protected("/business-settings", "Business Settings"),
        RouteRecord::protected("/business-settings/working-times", "Business Working Times"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_normalizes_paths() {
        let table = app_routes();
        assert_eq!(table.find("/home/").unwrap().name.as_deref(), Some("Home"));
        assert_eq!(table.find("/search?q=fade").unwrap().path, "/search");
        assert!(table.find("/").unwrap().redirect.is_some());
        assert!(table.find("/nowhere").is_none());
    }

    #[test]
    fn test_only_login_and_register_are_public() {
        let public: Vec<_> = app_routes()
            .routes()
            .iter()
            .filter(|r| !r.requires_auth && r.redirect.is_none())
            .map(|r| r.path.clone())
            .collect();
        assert_eq!(public, vec!["/login", "/register"]);
    }
}
