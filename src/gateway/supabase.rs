use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::gateway::query::{Filter, ReadQuery};
use crate::gateway::traits::{
    AuthGateway, GatewayError, GatewayResult, RpcGateway, TableGateway,
};
use crate::model::{AuthUser, Row, Session, SignUpAttributes, SignUpOutcome};

/// Gateway speaking to a Supabase project over HTTP: GoTrue for identity and
/// PostgREST for tables, views and RPCs.
///
/// The provider's session is only held in memory.
#[derive(Debug)]
pub struct SupabaseGateway {
    client: Client,
    base_url: String,
    api_key: String,
    /// Where confirmation emails send the user back to
    email_redirect_to: Option<String>,
    session: RwLock<Option<Session>>,
}

/// GoTrue error bodies come in a few shapes depending on the endpoint
#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ProviderError {
    fn into_message(self) -> Option<String> {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
    }
}

impl SupabaseGateway {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            email_redirect_to: None,
            session: RwLock::new(None),
        }
    }

    pub fn with_email_redirect(mut self, url: impl Into<String>) -> Self {
        self.email_redirect_to = Some(url.into());
        self
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path)
    }

    fn access_token(&self) -> Option<String> {
        self.session
            .read()
            .as_ref()
            .and_then(|s| s.access_token.clone())
    }

    /// Adds the api key and, when signed in, the user's bearer token
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token().unwrap_or_else(|| self.api_key.clone());
        request
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, request: RequestBuilder) -> GatewayResult<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ProviderError>(&body)
            .ok()
            .and_then(ProviderError::into_message)
            .unwrap_or(body);
        Err(GatewayError::rejected(status.as_u16(), message))
    }

    /// Same as [`Self::send`] but maps provider rejections to auth errors
    async fn send_auth(&self, request: RequestBuilder) -> GatewayResult<Response> {
        self.send(request).await.map_err(|e| match e {
            GatewayError::Rejected { message, .. } => GatewayError::Auth(message),
            other => other,
        })
    }

    async fn json<T: serde::de::DeserializeOwned>(response: Response) -> GatewayResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Serialization(e.to_string()))
    }

    fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
        filters
            .iter()
            .map(|f| {
                let value = match &f.value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (f.field.clone(), format!("eq.{}", value))
            })
            .collect()
    }

    fn store_session(&self, session: Option<Session>) {
        *self.session.write() = session;
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: AuthUser,
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        Session {
            access_token: Some(token.access_token),
            refresh_token: token.refresh_token,
            user: token.user,
        }
    }
}

#[async_trait::async_trait]
impl AuthGateway for SupabaseGateway {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: &SignUpAttributes,
    ) -> GatewayResult<SignUpOutcome> {
        let mut request = self.client.post(self.auth_url("signup")).json(&json!({
            "email": email,
            "password": password,
            "data": attributes,
        }));
        if let Some(redirect) = &self.email_redirect_to {
            request = request.query(&[("redirect_to", redirect)]);
        }

        let body: Value = Self::json(self.send_auth(request).await?).await?;

        // With email confirmation on, GoTrue answers with the bare user object
        if body.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(body)?;
            let session = Session::from(token);
            self.store_session(Some(session.clone()));
            Ok(SignUpOutcome {
                user: session.user.clone(),
                session: Some(session),
            })
        } else {
            let user: AuthUser = serde_json::from_value(body)?;
            Ok(SignUpOutcome {
                user,
                session: None,
            })
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<Session> {
        let request = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        let token: TokenResponse = Self::json(self.send_auth(request).await?).await?;
        let session = Session::from(token);
        self.store_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> GatewayResult<()> {
        if self.access_token().is_some() {
            let request = self.client.post(self.auth_url("logout"));
            self.send_auth(request).await?;
        }
        self.store_session(None);
        Ok(())
    }

    async fn get_current_user(&self) -> GatewayResult<Option<AuthUser>> {
        if self.access_token().is_none() {
            return Ok(None);
        }
        let request = self.client.get(self.auth_url("user"));
        match self.send(request).await {
            Ok(response) => Ok(Some(Self::json(response).await?)),
            // An expired or revoked token means there is no current user
            Err(GatewayError::Rejected { status, .. })
                if status == StatusCode::UNAUTHORIZED.as_u16()
                    || status == StatusCode::FORBIDDEN.as_u16() =>
            {
                self.store_session(None);
                Ok(None)
            }
            Err(GatewayError::Rejected { message, .. }) => Err(GatewayError::Auth(message)),
            Err(e) => Err(e),
        }
    }

    async fn get_session(&self) -> GatewayResult<Option<Session>> {
        Ok(self.session.read().clone())
    }
}

#[async_trait::async_trait]
impl TableGateway for SupabaseGateway {
    async fn read(&self, query: &ReadQuery) -> GatewayResult<Vec<Row>> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(Self::filter_params(&query.filters));
        if let Some(sort) = &query.sort {
            params.push(("order".to_string(), sort.to_order_param()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        let request = self.client.get(self.rest_url(&query.source)).query(&params);
        Self::json(self.send(request).await?).await
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> GatewayResult<Vec<Row>> {
        let request = self
            .client
            .post(self.rest_url(table))
            .header("Prefer", "return=representation")
            .json(&rows);
        Self::json(self.send(request).await?).await
    }

    async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> GatewayResult<Vec<Row>> {
        let request = self
            .client
            .patch(self.rest_url(table))
            .query(&Self::filter_params(filters))
            .header("Prefer", "return=representation")
            .json(&patch);
        Self::json(self.send(request).await?).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> GatewayResult<Vec<Row>> {
        let request = self
            .client
            .delete(self.rest_url(table))
            .query(&Self::filter_params(filters))
            .header("Prefer", "return=representation");
        Self::json(self.send(request).await?).await
    }
}

#[async_trait::async_trait]
impl RpcGateway for SupabaseGateway {
    async fn invoke(&self, name: &str, args: Value) -> GatewayResult<Value> {
        let request = self
            .client
            .post(self.rest_url(&format!("rpc/{}", name)))
            .json(&args);
        Self::json(self.send(request).await?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_params_use_postgrest_eq() {
        let params = SupabaseGateway::filter_params(&[
            Filter::eq("business_id", "b1"),
            Filter::eq("day_of_week", 3),
        ]);
        assert_eq!(
            params,
            vec![
                ("business_id".to_string(), "eq.b1".to_string()),
                ("day_of_week".to_string(), "eq.3".to_string()),
            ]
        );
    }

    #[test]
    fn test_provider_error_message_shapes() {
        let gotrue: ProviderError =
            serde_json::from_value(json!({"error": "invalid_grant", "error_description": "Invalid login credentials"}))
                .unwrap();
        assert_eq!(gotrue.into_message().as_deref(), Some("Invalid login credentials"));

        let postgrest: ProviderError =
            serde_json::from_value(json!({"code": "42501", "message": "permission denied"})).unwrap();
        assert_eq!(postgrest.into_message().as_deref(), Some("permission denied"));
    }

    #[test]
    fn test_urls_strip_trailing_slash() {
        let gateway = SupabaseGateway::new("https://proj.supabase.co/", "key");
        assert_eq!(gateway.auth_url("user"), "https://proj.supabase.co/auth/v1/user");
        assert_eq!(
            gateway.rest_url("users_view"),
            "https://proj.supabase.co/rest/v1/users_view"
        );
    }

    #[tokio::test]
    async fn test_no_token_means_no_current_user() {
        let gateway = SupabaseGateway::new("http://127.0.0.1:9", "key");
        assert_eq!(gateway.get_current_user().await.unwrap(), None);
        assert_eq!(gateway.get_session().await.unwrap(), None);
    }
}
