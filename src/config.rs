use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Supabase project URL
    pub url: Option<String>,
    /// Public (anon) API key
    pub publishable_key: Option<String>,
    /// Where sign-up confirmation emails link back to
    pub email_redirect_to: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

/// Resolved backend endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct BackendEndpoint {
    pub url: String,
    pub publishable_key: String,
}

impl AppConfig {
    /// Load configuration from defaults, an optional `seshuns` config file and
    /// `SESHUNS__*` environment variables (`SESHUNS__BACKEND__URL`, ...)
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("seshuns").required(false))
            .add_source(
                config::Environment::with_prefix("SESHUNS")
                    .separator("__")
                    .prefix_separator("__"),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Backend URL and key from config, falling back to the plain Supabase
    /// environment variables. `None` means run against the in-memory backend.
    pub fn backend_endpoint(&self) -> Option<BackendEndpoint> {
        let url = self
            .backend
            .url
            .clone()
            .or_else(|| env_any(&["SUPABASE_URL", "VITE_SUPABASE_URL"]))?;
        let publishable_key = self.backend.publishable_key.clone().or_else(|| {
            env_any(&["SUPABASE_PUBLISHABLE_KEY", "VITE_SUPABASE_PUBLISHABLE_KEY"])
        })?;
        Some(BackendEndpoint {
            url,
            publishable_key,
        })
    }

    /// Get the server bind address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn env_any(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_backend_config_wins() {
        let config = AppConfig {
            backend: BackendConfig {
                url: Some("https://proj.supabase.co".to_string()),
                publishable_key: Some("anon".to_string()),
                email_redirect_to: None,
            },
            ..Default::default()
        };
        assert_eq!(
            config.backend_endpoint(),
            Some(BackendEndpoint {
                url: "https://proj.supabase.co".to_string(),
                publishable_key: "anon".to_string(),
            })
        );
        assert_eq!(config.server_address(), "127.0.0.1:3001");
    }
}
