use seshuns_session::gateway::{AuthGateway, MemoryGateway};
use seshuns_session::model::SignUpAttributes;
use seshuns_session::router::{app_routes, AppRouter, Navigation, NavigationOutcome, RouteGuard};
use seshuns_session::seed::{demo_gateway, load_seed_data, CLIENT_EMAIL, DEMO_PASSWORD, OWNER_EMAIL};
use seshuns_session::{business_graph, AuthStatus, SessionError, SessionManager, SessionStatus};
use std::sync::Arc;
use std::time::Duration;

async fn seeded(latency: Option<Duration>) -> Arc<MemoryGateway> {
    let mut gateway = demo_gateway();
    if let Some(latency) = latency {
        gateway = gateway.with_latency(latency);
    }
    load_seed_data(&gateway).await.unwrap();
    Arc::new(gateway)
}

fn manager(gateway: &Arc<MemoryGateway>) -> SessionManager {
    SessionManager::new(gateway.clone(), business_graph().unwrap())
}

fn position(calls: &[String], call: &str) -> Option<usize> {
    calls.iter().position(|c| c == call)
}

#[tokio::test]
async fn concurrent_initialize_checks_the_provider_once() {
    let gateway = seeded(Some(Duration::from_millis(20))).await;
    gateway.sign_in(OWNER_EMAIL, DEMO_PASSWORD).await.unwrap();
    let before = gateway.call_count("get_current_user");
    let session = manager(&gateway);

    let (a, b, c) = tokio::join!(
        session.initialize(),
        session.initialize(),
        session.initialize()
    );

    assert_eq!(a, Ok(AuthStatus::Authenticated));
    assert_eq!(b, Ok(AuthStatus::Authenticated));
    assert_eq!(c, Ok(AuthStatus::Authenticated));
    assert_eq!(gateway.call_count("get_current_user") - before, 1);
    assert_eq!(gateway.call_count("read:users_view"), 1);
}

#[tokio::test]
async fn owner_session_binds_user_before_business() {
    let gateway = seeded(None).await;
    gateway.sign_in(OWNER_EMAIL, DEMO_PASSWORD).await.unwrap();
    let session = manager(&gateway);

    assert_eq!(session.initialize().await, Ok(AuthStatus::Authenticated));
    assert_eq!(session.status(), SessionStatus::ProfileReady);
    assert!(session.is_business_owner());
    assert_eq!(session.user_name(), "Olive Owner");

    let calls = gateway.calls();
    let user_read = position(&calls, "read:users_view").unwrap();
    let business_read = position(&calls, "read:businesses_view").unwrap();
    assert!(user_read < business_read);

    let views = session.bound_views().unwrap();
    assert_eq!(
        views.ids(),
        vec![
            "user",
            "business",
            "business_social_links",
            "business_working_times",
            "business_participants"
        ]
    );
    assert_eq!(views.get("business_working_times").unwrap().rows.len(), 6);
    assert_eq!(views.get("business_participants").unwrap().rows.len(), 1);
}

#[tokio::test]
async fn client_without_business_gets_only_the_user_view() {
    let gateway = seeded(None).await;
    let session = manager(&gateway);

    session.login(CLIENT_EMAIL, DEMO_PASSWORD).await.unwrap();

    let views = session.bound_views().unwrap();
    assert_eq!(views.ids(), vec!["user"]);
    assert!(!gateway.calls().iter().any(|c| c == "read:businesses_view"));
    assert!(!session.is_business_owner());
}

#[tokio::test]
async fn anonymous_initialize_reports_not_authenticated() {
    let gateway = seeded(None).await;
    let session = manager(&gateway);

    assert_eq!(session.initialize().await, Ok(AuthStatus::NotAuthenticated));
    assert_eq!(session.status(), SessionStatus::Anonymous);
    assert!(session.profile().is_none());
    assert!(session.bound_views().is_none());
    assert_eq!(gateway.call_count("read:users_view"), 0);
}

#[tokio::test]
async fn provider_error_during_initialize_is_reported() {
    let gateway = seeded(None).await;
    gateway.fail_on("get_current_user");
    let session = manager(&gateway);

    assert!(matches!(session.initialize().await, Err(SessionError::Auth(_))));
    assert_eq!(session.status(), SessionStatus::AuthError);
    assert!(!session.is_authenticated());
    assert!(session.last_error().is_some());
}

#[tokio::test]
async fn login_then_logout_round_trip() {
    let gateway = seeded(None).await;
    let session = manager(&gateway);

    session.login(OWNER_EMAIL, DEMO_PASSWORD).await.unwrap();
    assert!(session.is_authenticated());
    assert!(session.is_email_verified());
    assert_eq!(session.user_email(), OWNER_EMAIL);
    assert!(session.profile().is_some());

    session.logout().await.unwrap();
    assert_eq!(session.status(), SessionStatus::Anonymous);
    assert!(!session.is_authenticated());
    assert!(session.session().is_none());
    assert!(session.profile().is_none());
    assert!(session.bound_views().is_none());
    assert_eq!(session.initialize().await, Ok(AuthStatus::NotAuthenticated));
}

#[tokio::test]
async fn failed_login_leaves_state_alone() {
    let gateway = seeded(None).await;
    let session = manager(&gateway);

    let err = session.login(OWNER_EMAIL, "wrong").await.unwrap_err();
    assert_eq!(err, SessionError::Auth("Invalid login credentials".to_string()));
    assert_eq!(session.status(), SessionStatus::Anonymous);
    assert_eq!(
        session.last_error().as_deref(),
        Some("Invalid login credentials")
    );

    session.clear_error();
    assert!(session.last_error().is_none());
}

#[tokio::test]
async fn failed_logout_keeps_the_session() {
    let gateway = seeded(None).await;
    let session = manager(&gateway);
    session.login(OWNER_EMAIL, DEMO_PASSWORD).await.unwrap();

    gateway.fail_on("sign_out");
    assert!(session.logout().await.is_err());

    assert!(session.is_authenticated());
    assert!(session.profile().is_some());
    assert!(session.bound_views().is_some());
    assert!(session.last_error().is_some());
}

#[tokio::test]
async fn register_survives_a_failed_user_row_insert() {
    let gateway = seeded(None).await;
    gateway.fail_on("insert:users");
    let session = manager(&gateway);

    let attributes = SignUpAttributes {
        first_name: "New".to_string(),
        last_name: "Person".to_string(),
        ..Default::default()
    };
    session
        .register("new@seshuns.dev", "secret-pass", attributes)
        .await
        .unwrap();

    assert!(session.is_authenticated());
    assert_eq!(session.user_email(), "new@seshuns.dev");
    assert_eq!(gateway.rows("users").len(), 2);
}

#[tokio::test]
async fn missing_profile_is_not_fatal() {
    let gateway = seeded(None).await;
    gateway.add_account("ghost@seshuns.dev", DEMO_PASSWORD, true);
    let session = manager(&gateway);

    session.login("ghost@seshuns.dev", DEMO_PASSWORD).await.unwrap();

    assert!(session.is_authenticated());
    assert_eq!(session.status(), SessionStatus::ProfileAbsent);
    assert!(session.profile().is_none());
    assert_eq!(session.user_name(), "");
    assert_eq!(session.bound_views().unwrap().ids(), vec!["user"]);
}

#[tokio::test]
async fn logout_during_initialize_wins() {
    let gateway = seeded(Some(Duration::from_millis(20))).await;
    gateway.sign_in(OWNER_EMAIL, DEMO_PASSWORD).await.unwrap();
    let session = manager(&gateway);

    let (init, logout) = tokio::join!(session.initialize(), async {
        tokio::time::sleep(Duration::from_millis(1)).await;
        session.logout().await
    });

    assert!(init.is_ok());
    assert!(logout.is_ok());
    assert_eq!(session.status(), SessionStatus::Anonymous);
    assert!(session.profile().is_none());
    assert!(session.bound_views().is_none());
}

#[tokio::test]
async fn guard_redirects_until_signed_in() {
    let gateway = seeded(None).await;
    let session = manager(&gateway);
    let guard = RouteGuard::new(session.clone());
    let routes = app_routes();
    let dashboard = routes.find("/business-dashboard").unwrap();
    let login = routes.find("/login").unwrap();

    assert_eq!(
        guard.before_each(dashboard).await,
        Navigation::Redirect("/login".to_string())
    );

    let checks = gateway.call_count("get_current_user");
    assert_eq!(guard.before_each(login).await, Navigation::Proceed);
    assert_eq!(gateway.call_count("get_current_user"), checks);

    session.login(OWNER_EMAIL, DEMO_PASSWORD).await.unwrap();
    assert_eq!(guard.before_each(dashboard).await, Navigation::Proceed);
    assert_eq!(gateway.call_count("get_current_user"), checks);
}

#[tokio::test]
async fn guard_restores_an_existing_provider_session() {
    let gateway = seeded(None).await;
    gateway.sign_in(OWNER_EMAIL, DEMO_PASSWORD).await.unwrap();
    let session = manager(&gateway);
    let router = AppRouter::new(app_routes(), session.clone());

    match router.navigate("/").await {
        NavigationOutcome::Render { route } => assert_eq!(route.path, "/home"),
        other => panic!("expected home to render, got {:?}", other),
    }
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn creating_a_business_rebinds_the_views() {
    let gateway = seeded(None).await;
    let session = manager(&gateway);
    session.login(CLIENT_EMAIL, DEMO_PASSWORD).await.unwrap();
    assert_eq!(session.bound_views().unwrap().ids(), vec!["user"]);

    let details = seshuns_session::model::BusinessDetails {
        name: "Second Cut".to_string(),
        address_line1: "2 Low Road".to_string(),
        city: "York".to_string(),
        postal_code: "YO1 1AA".to_string(),
        country: "United Kingdom".to_string(),
        ..Default::default()
    };
    let hours = vec![seshuns_session::model::WorkingTimeEntry::new(2, "08:00", "12:00").unwrap()];
    session
        .create_business(details, Default::default(), hours)
        .await
        .unwrap();

    assert!(session.is_business_owner());
    let views = session.bound_views().unwrap();
    assert!(views.ids().contains(&"business"));
    assert_eq!(views.get("business_working_times").unwrap().rows.len(), 1);
}

#[tokio::test]
async fn profile_updates_and_view_edits_go_through_the_session() {
    let gateway = seeded(None).await;
    let session = manager(&gateway);
    session.login(OWNER_EMAIL, DEMO_PASSWORD).await.unwrap();
    assert!(!session.is_loading());

    let updates = seshuns_session::model::ProfileUpdate {
        first_name: Some("Olivia".to_string()),
        ..Default::default()
    };
    let profile = session.update_profile(updates).await.unwrap();
    assert_eq!(profile.first_name, "Olivia");
    assert_eq!(session.user_name(), "Olivia Owner");

    let mut row = seshuns_session::model::Row::new();
    row.insert("day_of_week".to_string(), serde_json::json!(0));
    row.insert("start_time".to_string(), serde_json::json!("11:00"));
    row.insert("end_time".to_string(), serde_json::json!("15:00"));
    let stored = session
        .insert_view_row("business_working_times", row)
        .await
        .unwrap();
    assert!(stored.contains_key("business_id"));

    let hours = session.bound_views().unwrap();
    let hours = hours.get("business_working_times").unwrap();
    assert_eq!(hours.rows.len(), 7);
    assert_eq!(hours.rows[0]["day_of_week"], serde_json::json!(0));

    let err = session
        .delete_view_row("user", &profile.id.to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Binding(_)));
}

#[tokio::test]
async fn failed_login_during_initialize_keeps_the_resolved_session() {
    let gateway = seeded(Some(Duration::from_millis(20))).await;
    gateway.sign_in(OWNER_EMAIL, DEMO_PASSWORD).await.unwrap();
    let session = manager(&gateway);

    let (init, login) = tokio::join!(session.initialize(), async {
        tokio::time::sleep(Duration::from_millis(1)).await;
        session.login(OWNER_EMAIL, "wrong").await
    });

    assert_eq!(init, Ok(AuthStatus::Authenticated));
    assert!(login.is_err());
    assert!(session.is_authenticated());
    assert_eq!(session.status(), SessionStatus::ProfileReady);
    assert!(session.bound_views().unwrap().is_constructed("business"));
}

#[tokio::test]
async fn failed_logout_during_initialize_keeps_the_resolved_session() {
    let gateway = seeded(Some(Duration::from_millis(20))).await;
    gateway.sign_in(OWNER_EMAIL, DEMO_PASSWORD).await.unwrap();
    gateway.fail_on("sign_out");
    let session = manager(&gateway);

    let (init, logout) = tokio::join!(session.initialize(), async {
        tokio::time::sleep(Duration::from_millis(1)).await;
        session.logout().await
    });

    assert_eq!(init, Ok(AuthStatus::Authenticated));
    assert!(logout.is_err());
    assert!(session.is_authenticated());
    assert_eq!(session.status(), SessionStatus::ProfileReady);
    assert!(session.profile().is_some());
}

#[tokio::test]
async fn concurrent_view_edits_all_land() {
    let gateway = seeded(Some(Duration::from_millis(20))).await;
    let session = manager(&gateway);
    session.login(OWNER_EMAIL, DEMO_PASSWORD).await.unwrap();
    let participants = |session: &SessionManager| {
        session
            .bound_views()
            .unwrap()
            .get("business_participants")
            .unwrap()
            .rows
            .len()
    };
    assert_eq!(participants(&session), 1);

    let mut first = seshuns_session::model::Row::new();
    first.insert("created_at".to_string(), serde_json::json!("2024-05-01T00:00:00Z"));
    let mut second = seshuns_session::model::Row::new();
    second.insert("created_at".to_string(), serde_json::json!("2024-05-02T00:00:00Z"));

    let (a, b) = tokio::join!(
        session.insert_view_row("business_participants", first),
        session.insert_view_row("business_participants", second)
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(participants(&session), 3);
    assert_eq!(gateway.rows("business_participants").len(), 3);
}

#[tokio::test]
async fn null_name_columns_still_load_the_profile() {
    let gateway = seeded(None).await;
    let user = gateway.add_account("nia@seshuns.dev", DEMO_PASSWORD, true);
    gateway.seed_rows(
        "users",
        vec![serde_json::json!({
            "id": user.id,
            "email": "nia@seshuns.dev",
            "first_name": "Nia",
            "last_name": null,
            "is_business_owner": null,
            "business_id": null
        })],
    );
    let session = manager(&gateway);

    session.login("nia@seshuns.dev", DEMO_PASSWORD).await.unwrap();

    assert_eq!(session.status(), SessionStatus::ProfileReady);
    assert!(session.profile().is_some());
    assert_eq!(session.user_name(), "Nia");
    assert!(!session.is_business_owner());
}

#[tokio::test]
async fn secondary_operations_track_loading_and_errors() {
    let gateway = seeded(Some(Duration::from_millis(20))).await;
    let session = manager(&gateway);

    let err = session
        .update_profile(Default::default())
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::NotAuthenticated);
    assert_eq!(session.last_error().as_deref(), Some("not signed in"));

    session.login(CLIENT_EMAIL, DEMO_PASSWORD).await.unwrap();
    assert!(session.last_error().is_none());

    let (reload, loading) = tokio::join!(session.reload_views(), async {
        tokio::time::sleep(Duration::from_millis(1)).await;
        session.is_loading()
    });
    reload.unwrap();
    assert!(loading);
    assert!(!session.is_loading());

    gateway.fail_on("rpc:create_business");
    let details = seshuns_session::model::BusinessDetails {
        name: "Nope".to_string(),
        ..Default::default()
    };
    assert!(session
        .create_business(details, Default::default(), Vec::new())
        .await
        .is_err());
    assert!(session
        .last_error()
        .unwrap()
        .starts_with("RPC create_business failed"));
}
