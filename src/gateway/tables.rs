//! Typed access to the application tables the session layer touches directly.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::gateway::query::{Filter, ReadQuery, SortSpec};
use crate::gateway::traits::{GatewayError, GatewayResult, TableGateway};
use crate::model::{
    now_timestamp, uuid_value, BusinessCategory, BusinessRole, NewUserRecord, Profile,
    ProfileUpdate, Row, SocialLinks, WorkingTimeEntry,
};

pub const USERS: &str = "users";
pub const BUSINESS_CATEGORIES: &str = "business_categories";
pub const BUSINESS_ROLES: &str = "business_roles";
pub const BUSINESS_WORKING_TIMES: &str = "business_working_times";
pub const BUSINESS_SOCIAL_LINKS: &str = "business_social_links";

pub const OWNER_ROLE: &str = "Owner";

fn to_row<T: Serialize>(value: &T) -> GatewayResult<Row> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(GatewayError::Serialization(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

fn from_rows<T: DeserializeOwned>(rows: Vec<Row>) -> GatewayResult<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(Value::Object(row)).map_err(GatewayError::from))
        .collect()
}

/// Exactly-one-row read, like PostgREST's `.single()`
fn single<T: DeserializeOwned>(source: &str, rows: Vec<Row>) -> GatewayResult<T> {
    let mut items = from_rows::<T>(rows)?;
    match items.len() {
        1 => Ok(items.remove(0)),
        0 => Err(GatewayError::NoRows(source.to_string())),
        n => Err(GatewayError::rejected(
            406,
            format!("expected a single row from {}, got {}", source, n),
        )),
    }
}

pub async fn get_profile(gateway: &(impl TableGateway + ?Sized), user_id: Uuid) -> GatewayResult<Profile> {
    let rows = gateway
        .read(&ReadQuery::new(USERS).filter("id", uuid_value(&user_id)))
        .await?;
    single(USERS, rows)
}

pub async fn insert_user(
    gateway: &(impl TableGateway + ?Sized),
    record: &NewUserRecord,
) -> GatewayResult<()> {
    gateway.insert(USERS, vec![to_row(record)?]).await?;
    Ok(())
}

pub async fn update_profile(
    gateway: &(impl TableGateway + ?Sized),
    user_id: Uuid,
    updates: &ProfileUpdate,
) -> GatewayResult<Profile> {
    let mut patch = to_row(updates)?;
    patch.insert("updated_at".to_string(), json!(now_timestamp()));
    let rows = gateway
        .update(USERS, patch, &[Filter::eq("id", uuid_value(&user_id))])
        .await?;
    single(USERS, rows)
}

pub async fn list_categories(gateway: &(impl TableGateway + ?Sized)) -> GatewayResult<Vec<BusinessCategory>> {
    let rows = gateway
        .read(&ReadQuery::new(BUSINESS_CATEGORIES).sort(Some(SortSpec::asc("name"))))
        .await?;
    from_rows(rows)
}

pub async fn owner_role(gateway: &(impl TableGateway + ?Sized)) -> GatewayResult<BusinessRole> {
    let rows = gateway
        .read(&ReadQuery::new(BUSINESS_ROLES).filter("role", OWNER_ROLE))
        .await?;
    single(BUSINESS_ROLES, rows)
}

/// Replaces a business's weekly hours: delete everything, insert the new set.
pub async fn replace_working_times(
    gateway: &(impl TableGateway + ?Sized),
    business_id: Uuid,
    entries: &[WorkingTimeEntry],
) -> GatewayResult<Vec<Row>> {
    let owner = Filter::eq("business_id", uuid_value(&business_id));
    gateway
        .delete(BUSINESS_WORKING_TIMES, std::slice::from_ref(&owner))
        .await?;

    if entries.is_empty() {
        return Ok(Vec::new());
    }
    let rows = entries
        .iter()
        .map(|entry| {
            let mut row = to_row(entry)?;
            row.insert("business_id".to_string(), uuid_value(&business_id));
            Ok(row)
        })
        .collect::<GatewayResult<Vec<Row>>>()?;
    gateway.insert(BUSINESS_WORKING_TIMES, rows).await
}

pub async fn update_social_links(
    gateway: &(impl TableGateway + ?Sized),
    business_id: Uuid,
    links: &SocialLinks,
) -> GatewayResult<SocialLinks> {
    let rows = gateway
        .update(
            BUSINESS_SOCIAL_LINKS,
            to_row(links)?,
            &[Filter::eq("business_id", uuid_value(&business_id))],
        )
        .await?;
    single(BUSINESS_SOCIAL_LINKS, rows)
}
