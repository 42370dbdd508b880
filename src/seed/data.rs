use anyhow::Result;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::gateway::{
    run_rpc, tables, AuthGateway, CreateBusiness, CreateBusinessArgs, MemoryGateway, TableGateway,
};
use crate::model::{
    BusinessDetails, NewUserRecord, Row, SignUpAttributes, SocialLinks, WorkingTimeEntry,
};

pub const DEMO_PASSWORD: &str = "seshuns-demo";
pub const OWNER_EMAIL: &str = "owner@seshuns.dev";
pub const CLIENT_EMAIL: &str = "client@seshuns.dev";

/// In-memory backend with the app's views wired to their tables
pub fn demo_gateway() -> MemoryGateway {
    MemoryGateway::new()
        .with_auto_confirm()
        .with_view("users_view", "users")
        .with_view("businesses_view", "businesses")
        .with_view("business_working_times_view", "business_working_times")
        .with_view("business_participants_view", "business_participants")
}

fn rows(values: Vec<Value>) -> Vec<Row> {
    values
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect()
}

pub async fn load_seed_data(gateway: &MemoryGateway) -> Result<()> {
    load_reference_data(gateway).await?;

    // A client with no business
    let client = gateway.add_account(CLIENT_EMAIL, DEMO_PASSWORD, true);
    let attributes = SignUpAttributes {
        first_name: "Casey".to_string(),
        last_name: "Client".to_string(),
        ..Default::default()
    };
    tables::insert_user(
        gateway,
        &NewUserRecord::from_sign_up(client.id, CLIENT_EMAIL, &attributes),
    )
    .await?;

    // An owner whose business is created through the setup procedure
    let owner = gateway.add_account(OWNER_EMAIL, DEMO_PASSWORD, true);
    let attributes = SignUpAttributes {
        first_name: "Olive".to_string(),
        last_name: "Owner".to_string(),
        is_business_owner: true,
        display_name: Some("olive".to_string()),
        ..Default::default()
    };
    tables::insert_user(
        gateway,
        &NewUserRecord::from_sign_up(owner.id, OWNER_EMAIL, &attributes),
    )
    .await?;

    gateway.sign_in(OWNER_EMAIL, DEMO_PASSWORD).await?;
    let business_id = create_demo_business(gateway).await?;
    gateway.sign_out().await?;
    log::info!("Seeded demo business {}", business_id);

    Ok(())
}

async fn load_reference_data(gateway: &MemoryGateway) -> Result<()> {
    gateway
        .insert(
            tables::BUSINESS_CATEGORIES,
            rows(vec![
                json!({"id": Uuid::new_v4(), "name": "Barber"}),
                json!({"id": Uuid::new_v4(), "name": "Beauty"}),
                json!({"id": Uuid::new_v4(), "name": "Fitness"}),
                json!({"id": Uuid::new_v4(), "name": "Tattoo"}),
            ]),
        )
        .await?;
    gateway
        .insert(
            tables::BUSINESS_ROLES,
            rows(vec![
                json!({"id": Uuid::new_v4(), "role": tables::OWNER_ROLE, "description": "Business owner"}),
                json!({"id": Uuid::new_v4(), "role": "Staff", "description": "Takes bookings"}),
            ]),
        )
        .await?;
    Ok(())
}

async fn create_demo_business(gateway: &MemoryGateway) -> Result<Uuid> {
    let category = tables::list_categories(gateway)
        .await?
        .into_iter()
        .next()
        .map(|c| c.id);

    let details = BusinessDetails {
        name: "Fade Lab".to_string(),
        category_id: category,
        description: Some("Walk-ins welcome".to_string()),
        default_currency: Some("GBP".to_string()),
        address_line1: "1 High Street".to_string(),
        city: "Leeds".to_string(),
        postal_code: "LS1 1AA".to_string(),
        country: "United Kingdom".to_string(),
        is_active_provider: true,
        ..Default::default()
    };
    let links = SocialLinks {
        instagram_url: Some("https://instagram.com/fadelab".to_string()),
        ..Default::default()
    };
    let working_times = (1..=5)
        .map(|day| WorkingTimeEntry::new(day, "09:00", "17:30"))
        .chain(std::iter::once(WorkingTimeEntry::new(6, "10:00", "14:00")))
        .collect::<Result<Vec<_>>>()?;

    let args = CreateBusinessArgs::new(details, links, working_times);
    Ok(run_rpc::<CreateBusiness>(gateway, &args).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_links_owner_to_business() {
        let gateway = demo_gateway();
        load_seed_data(&gateway).await.unwrap();

        let users = gateway.rows("users");
        assert_eq!(users.len(), 2);
        let owner = users
            .iter()
            .find(|u| u["email"] == json!(OWNER_EMAIL))
            .unwrap();
        assert!(owner["business_id"].is_string());
        assert_eq!(gateway.rows("business_working_times").len(), 6);
        assert_eq!(gateway.get_session().await.unwrap(), None);
    }
}
