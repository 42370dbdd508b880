use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{null_as_default, SignUpAttributes};

/// Written into `users.password_hash`; credentials live with the auth provider.
pub const MANAGED_PASSWORD_HASH: &str = "managed_by_supabase_auth";

/// Application-level user record (`users` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub first_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_business_owner: bool,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Profile {
    /// "First Last", trimmed so a missing half leaves no stray space
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Row inserted into `users` right after sign-up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUserRecord {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub dob: Option<String>,
    pub gender: Option<String>,
    pub is_business_owner: bool,
    pub display_name: Option<String>,
    pub password_hash: String,
}

impl NewUserRecord {
    pub fn from_sign_up(id: Uuid, email: &str, attributes: &SignUpAttributes) -> Self {
        Self {
            id,
            email: email.to_string(),
            first_name: attributes.first_name.clone(),
            last_name: attributes.last_name.clone(),
            dob: attributes.dob.clone(),
            gender: attributes.gender.clone(),
            is_business_owner: attributes.is_business_owner,
            display_name: attributes.display_name.clone(),
            password_hash: MANAGED_PASSWORD_HASH.to_string(),
        }
    }
}

/// Partial update of a profile; unset fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_business_owner: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
