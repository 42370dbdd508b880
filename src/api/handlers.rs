use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Json, Redirect, Response},
    Json as RequestJson,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::BoundViews;
use crate::model::{BusinessDetails, ProfileUpdate, Profile, SignUpAttributes, SocialLinks, WorkingTimeEntry};
use crate::router::{AppRouter, NavigationOutcome, RouteRecord};
use crate::session::{SessionError, SessionManager, SessionSnapshot};

#[derive(Clone)]
pub struct AppState {
    pub session: SessionManager,
    pub router: AppRouter,
}

impl AppState {
    pub fn new(session: SessionManager, router: AppRouter) -> Self {
        Self { session, router }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(error: SessionError) -> ApiError {
    let status = match &error {
        SessionError::Auth(_) | SessionError::NotAuthenticated => StatusCode::UNAUTHORIZED,
        SessionError::Gateway(_) | SessionError::Rpc(_) => StatusCode::BAD_GATEWAY,
        SessionError::Binding(_) => StatusCode::CONFLICT,
    };
    (status, Json(ErrorResponse::new(&error.to_string())))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub attributes: SignUpAttributes,
}

#[derive(Debug, Deserialize)]
pub struct CreateBusinessRequest {
    pub business: BusinessDetails,
    #[serde(default)]
    pub social_links: SocialLinks,
    #[serde(default)]
    pub working_times: Vec<WorkingTimeEntry>,
}

#[derive(Debug, Serialize)]
pub struct CreateBusinessResponse {
    pub business_id: Uuid,
}

/// What a rendered route hands to the view layer
#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub route: RouteRecord,
    pub user_name: String,
    pub is_business_owner: bool,
    pub views: Option<BoundViews>,
}

/// GET /api/session
pub async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot())
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    RequestJson(req): RequestJson<LoginRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    state
        .session
        .login(&req.email, &req.password)
        .await
        .map_err(error_response)?;
    Ok(Json(state.session.snapshot()))
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    RequestJson(req): RequestJson<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    state
        .session
        .register(&req.email, &req.password, req.attributes)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(state.session.snapshot())))
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>) -> Result<Json<SessionSnapshot>, ApiError> {
    state.session.logout().await.map_err(error_response)?;
    Ok(Json(state.session.snapshot()))
}

/// PATCH /api/profile
pub async fn update_profile(
    State(state): State<AppState>,
    RequestJson(updates): RequestJson<ProfileUpdate>,
) -> Result<Json<Profile>, ApiError> {
    let profile = state
        .session
        .update_profile(updates)
        .await
        .map_err(error_response)?;
    Ok(Json(profile))
}

/// POST /api/business
pub async fn create_business(
    State(state): State<AppState>,
    RequestJson(req): RequestJson<CreateBusinessRequest>,
) -> Result<(StatusCode, Json<CreateBusinessResponse>), ApiError> {
    let business_id = state
        .session
        .create_business(req.business, req.social_links, req.working_times)
        .await
        .map_err(error_response)?;
    Ok((
        StatusCode::CREATED,
        Json(CreateBusinessResponse { business_id }),
    ))
}

/// Any other GET: navigate the app router, guard included
pub async fn navigate(State(state): State<AppState>, uri: Uri) -> Response {
    match state.router.navigate(uri.path()).await {
        NavigationOutcome::Render { route } => Json(PageResponse {
            route,
            user_name: state.session.user_name(),
            is_business_owner: state.session.is_business_owner(),
            views: state.session.bound_views(),
        })
        .into_response(),
        NavigationOutcome::Redirect { to } => Redirect::to(&to).into_response(),
        NavigationOutcome::NotFound { path } => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(&format!("No route for {}", path))),
        )
            .into_response(),
    }
}
