use serde_json::Value;
use thiserror::Error;

use crate::gateway::query::{Filter, ReadQuery};
use crate::model::{AuthUser, Row, Session, SignUpAttributes, SignUpOutcome};

/// Errors reported by a backend gateway
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// Invalid credentials, unconfirmed email or any other provider rejection
    #[error("{0}")]
    Auth(String),
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("no rows returned from {0}")]
    NoRows(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl GatewayError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Identity operations offered by the auth provider
#[async_trait::async_trait]
pub trait AuthGateway: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: &SignUpAttributes,
    ) -> GatewayResult<SignUpOutcome>;
    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<Session>;
    async fn sign_out(&self) -> GatewayResult<()>;
    /// The user behind the provider's current session, if any
    async fn get_current_user(&self) -> GatewayResult<Option<AuthUser>>;
    async fn get_session(&self) -> GatewayResult<Option<Session>>;
}

/// Generic table and view access
#[async_trait::async_trait]
pub trait TableGateway: Send + Sync {
    async fn read(&self, query: &ReadQuery) -> GatewayResult<Vec<Row>>;
    /// Inserts rows and returns them as stored
    async fn insert(&self, table: &str, rows: Vec<Row>) -> GatewayResult<Vec<Row>>;
    /// Applies the patch to every row matching the filters; returns the updated rows
    async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> GatewayResult<Vec<Row>>;
    /// Deletes every row matching the filters; returns the deleted rows
    async fn delete(&self, table: &str, filters: &[Filter]) -> GatewayResult<Vec<Row>>;
}

/// Named remote procedures. Use [`crate::gateway::rpc::run_rpc`] for the typed form.
#[async_trait::async_trait]
pub trait RpcGateway: Send + Sync {
    async fn invoke(&self, name: &str, args: Value) -> GatewayResult<Value>;
}

pub trait Gateway: AuthGateway + TableGateway + RpcGateway + Send + Sync {}
impl<T: AuthGateway + TableGateway + RpcGateway + Send + Sync> Gateway for T {}
