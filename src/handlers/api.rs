use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::models::{
    parse_vote_date, validate_email, validate_restaurant_id, DishResponse, RepositoryError,
    Restaurant, ServiceError, ValidationError, VoteResponse, Voter,
};
use crate::services::{MenuService, RestaurantService, VotingService};

/// Header carrying the authenticated user's email
pub const USER_EMAIL_HEADER: &str = "x-user-email";

type ApiError = (StatusCode, Json<Value>);

/// Shared application state containing all services
#[derive(Clone)]
pub struct ApiState {
    pub voting_service: Arc<VotingService>,
    pub restaurant_service: Arc<RestaurantService>,
    pub menu_service: Arc<MenuService>,
}

/// `?date=dd.MM.yyyy`
#[derive(Debug, Default, Deserialize)]
pub struct VoteDateQuery {
    pub date: Option<String>,
}

/// `?restaurantId=N`
#[derive(Debug, Default, Deserialize)]
pub struct RestaurantIdQuery {
    #[serde(rename = "restaurantId", alias = "restaurant_id")]
    pub restaurant_id: Option<i64>,
}

/// Create API router with vote, restaurant and menu endpoints
pub fn create_api_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/api/vote",
            get(get_vote).post(create_vote).put(update_vote),
        )
        .route("/api/vote/total/:restaurant_id", get(get_total_votes))
        .route("/api/restaurants", get(list_restaurants))
        .route("/api/restaurants/:restaurant_id", get(get_restaurant))
        .route("/api/restaurants/:restaurant_id/menu", get(get_menu))
        .with_state(state)
}

/// The caller, taken from the identity header set by the authenticating proxy
#[async_trait]
impl<S> FromRequestParts<S> for Voter
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let email = parts
            .headers
            .get(USER_EMAIL_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        match validate_email(email) {
            Ok(()) => Ok(Voter::new(email)),
            Err(err) => {
                warn!("Rejected request without a valid user identity: {}", err);
                Err(error_body(
                    StatusCode::UNAUTHORIZED,
                    format!("Authentication required: {}", err),
                ))
            }
        }
    }
}

// =============================================================================
// VOTE ENDPOINTS
// =============================================================================

/// Vote of the caller for a date (default today)
#[instrument(name = "get_vote", skip(state), fields(user = %voter, date = query.date.as_deref()))]
pub async fn get_vote(
    State(state): State<ApiState>,
    voter: Voter,
    Query(query): Query<VoteDateQuery>,
) -> Result<Json<VoteResponse>, ApiError> {
    let date = parse_vote_date(query.date.as_deref()).map_err(validation_error_to_response)?;

    let vote = state
        .voting_service
        .get_vote_for_date(&voter, date)
        .await
        .map_err(service_error_to_response)?;

    Ok(Json(vote.to_response()))
}

/// Cast today's vote
#[instrument(name = "create_vote", skip(state), fields(user = %voter, restaurant_id = query.restaurant_id))]
pub async fn create_vote(
    State(state): State<ApiState>,
    voter: Voter,
    Query(query): Query<RestaurantIdQuery>,
) -> Result<(StatusCode, Json<VoteResponse>), ApiError> {
    let restaurant_id = required_restaurant_id(query.restaurant_id)?;

    let vote = state
        .voting_service
        .create_vote(&voter, restaurant_id)
        .await
        .map_err(service_error_to_response)?;

    info!(vote_id = %vote.id, "Vote created");
    Ok((StatusCode::CREATED, Json(vote.to_response())))
}

/// Change today's vote before the cutoff
#[instrument(name = "update_vote", skip(state), fields(user = %voter, restaurant_id = query.restaurant_id))]
pub async fn update_vote(
    State(state): State<ApiState>,
    voter: Voter,
    Query(query): Query<RestaurantIdQuery>,
) -> Result<Json<VoteResponse>, ApiError> {
    let restaurant_id = required_restaurant_id(query.restaurant_id)?;

    let vote = state
        .voting_service
        .update_vote(&voter, restaurant_id)
        .await
        .map_err(service_error_to_response)?;

    Ok(Json(vote.to_response()))
}

/// Number of votes a restaurant got on a date (default today)
#[instrument(name = "get_total_votes", skip(state), fields(date = query.date.as_deref()))]
pub async fn get_total_votes(
    State(state): State<ApiState>,
    Path(restaurant_id): Path<i64>,
    Query(query): Query<VoteDateQuery>,
) -> Result<Json<u64>, ApiError> {
    let date = parse_vote_date(query.date.as_deref()).map_err(validation_error_to_response)?;

    let total = state
        .voting_service
        .get_total_votes_for_restaurant(restaurant_id, date)
        .await
        .map_err(service_error_to_response)?;

    Ok(Json(total))
}

// =============================================================================
// RESTAURANT ENDPOINTS
// =============================================================================

#[instrument(name = "list_restaurants", skip(state))]
pub async fn list_restaurants(
    State(state): State<ApiState>,
) -> Result<Json<Vec<Restaurant>>, ApiError> {
    state
        .restaurant_service
        .list_restaurants()
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "get_restaurant", skip(state))]
pub async fn get_restaurant(
    State(state): State<ApiState>,
    Path(restaurant_id): Path<i64>,
) -> Result<Json<Restaurant>, ApiError> {
    state
        .restaurant_service
        .get_restaurant(restaurant_id)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

/// Dishes a restaurant offers on a date (default today)
#[instrument(name = "get_menu", skip(state), fields(date = query.date.as_deref()))]
pub async fn get_menu(
    State(state): State<ApiState>,
    Path(restaurant_id): Path<i64>,
    Query(query): Query<VoteDateQuery>,
) -> Result<Json<Vec<DishResponse>>, ApiError> {
    let date = parse_vote_date(query.date.as_deref()).map_err(validation_error_to_response)?;

    let dishes = state
        .menu_service
        .get_menu(restaurant_id, date)
        .await
        .map_err(service_error_to_response)?;

    Ok(Json(dishes.iter().map(|dish| dish.to_response()).collect()))
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

fn required_restaurant_id(restaurant_id: Option<i64>) -> Result<i64, ApiError> {
    let restaurant_id = restaurant_id.ok_or_else(|| {
        validation_error_to_response(ValidationError::RequiredField {
            field: "restaurantId".to_string(),
        })
    })?;
    validate_restaurant_id(restaurant_id).map_err(validation_error_to_response)?;
    Ok(restaurant_id)
}

fn error_body(status: StatusCode, message: String) -> ApiError {
    (
        status,
        Json(json!({
            "error": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

fn validation_error_to_response(err: ValidationError) -> ApiError {
    service_error_to_response(err.into())
}

/// Map service errors onto HTTP status codes
pub fn service_error_to_response(err: ServiceError) -> ApiError {
    let (status, message) = match err {
        ServiceError::RestaurantNotFound { .. }
        | ServiceError::NoRestaurants
        | ServiceError::MenuNotFound { .. }
        | ServiceError::VoteNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        ServiceError::VoteConflict { .. }
        | ServiceError::RestaurantExists { .. }
        | ServiceError::DishExists { .. } => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        ServiceError::ValidationError { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        ServiceError::Repository { source } => match source {
            RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
            RepositoryError::ConstraintViolation { message } => {
                (StatusCode::UNPROCESSABLE_ENTITY, message)
            }
            RepositoryError::ConnectionFailed => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Database connection failed".to_string(),
            ),
            RepositoryError::Timeout => {
                (StatusCode::REQUEST_TIMEOUT, "Request timeout".to_string())
            }
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        },
    };

    error_body(status, message)
}
