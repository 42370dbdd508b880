use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::api::handlers::{self, AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session
        .route("/api/session", get(handlers::get_session))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/profile", patch(handlers::update_profile))
        .route("/api/business", post(handlers::create_business))
        // App navigation
        .fallback(get(handlers::navigate))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::business_graph;
    use crate::router::{app_routes, AppRouter};
    use crate::seed::{demo_gateway, load_seed_data, DEMO_PASSWORD, OWNER_EMAIL};
    use crate::session::SessionManager;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn app() -> Router {
        let gateway = demo_gateway();
        load_seed_data(&gateway).await.unwrap();
        let session = SessionManager::new(Arc::new(gateway), business_graph().unwrap());
        let router = AppRouter::new(app_routes(), session.clone());
        create_router(AppState::new(session, router))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_protected_route_redirects_to_login() {
        let app = app().await;
        let response = app
            .oneshot(Request::get("/business-dashboard").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn test_public_route_and_unknown_route() {
        let app = app().await;
        let response = app
            .clone()
            .oneshot(Request::get("/login").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["route"]["name"], "Login");

        let response = app
            .oneshot(Request::get("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_login_then_dashboard_renders_bound_views() {
        let app = app().await;
        let login = Request::post("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({"email": OWNER_EMAIL, "password": DEMO_PASSWORD}).to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(login).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let snapshot = body_json(response).await;
        assert_eq!(snapshot["is_authenticated"], true);
        assert_eq!(snapshot["user_name"], "Olive Owner");

        let response = app
            .oneshot(Request::get("/business-dashboard").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_json(response).await;
        assert_eq!(page["route"]["name"], "Business Dashboard");
        assert_eq!(page["views"]["instances"][1]["id"], "business");
    }

    #[tokio::test]
    async fn test_bad_credentials_are_unauthorized() {
        let app = app().await;
        let login = Request::post("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({"email": OWNER_EMAIL, "password": "nope"}).to_string(),
            ))
            .unwrap();
        let response = app.oneshot(login).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Invalid login credentials");
    }

    #[tokio::test]
    async fn test_invalid_working_times_are_rejected_before_the_rpc() {
        let app = app().await;
        let business_request = |day: u8| {
            let body = serde_json::json!({
                "business": {
                    "name": "Late Shift",
                    "address_line1": "3 Night Lane",
                    "city": "Hull",
                    "postal_code": "HU1 1AA",
                    "country": "United Kingdom",
                    "is_active_provider": true
                },
                "working_times": [{"day_of_week": day, "start_time": "09:00", "end_time": "17:00"}]
            });
            Request::post("/api/business")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap()
        };

        let response = app.clone().oneshot(business_request(8)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        // A well-formed body reaches the handler, which needs a session
        let response = app.oneshot(business_request(1)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
