use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw account record as the auth provider returns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    pub fn new(id: Uuid, email: impl Into<String>) -> Self {
        Self {
            id,
            email: Some(email.into()),
            email_confirmed_at: None,
        }
    }

    pub fn confirmed(mut self, at: DateTime<Utc>) -> Self {
        self.email_confirmed_at = Some(at);
        self
    }

    pub fn is_email_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

/// Authenticated identity: provider tokens plus the account record.
///
/// The access token is absent for sign-ups that still wait on email confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}

impl Session {
    pub fn new(user: AuthUser, access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: None,
            user,
        }
    }

    /// Session for an identity that has no tokens yet
    pub fn pending(user: AuthUser) -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            user,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user.id
    }
}

/// Profile attributes collected at sign-up
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignUpAttributes {
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default)]
    pub is_business_owner: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Result of a successful sign-up
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    /// Present when the provider signs the user in straight away
    pub session: Option<Session>,
}

impl SignUpOutcome {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn into_session(self) -> Session {
        match self.session {
            Some(session) => session,
            None => Session::pending(self.user),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_deserializes_from_provider_shape() {
        let json = r#"{
            "access_token": "tok",
            "refresh_token": "ref",
            "user": {
                "id": "6f1c1f4e-7f5b-4f4a-9c0d-2b8e7d3a1e11",
                "email": "a@b.com",
                "email_confirmed_at": "2024-05-01T10:00:00Z"
            }
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.access_token.as_deref(), Some("tok"));
        assert!(session.user.is_email_confirmed());
    }

    #[test]
    fn test_pending_session_from_unconfirmed_sign_up() {
        let user = AuthUser::new(Uuid::new_v4(), "new@b.com");
        let outcome = SignUpOutcome {
            user: user.clone(),
            session: None,
        };
        let session = outcome.into_session();
        assert!(session.access_token.is_none());
        assert_eq!(session.user, user);
    }
}
