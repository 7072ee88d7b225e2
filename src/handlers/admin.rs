use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::repositories::{TableManager, TableNames};
use crate::services::{default_restaurants, MenuService, RestaurantService};

use super::api::service_error_to_response;

/// Admin state containing services
#[derive(Clone)]
pub struct AdminState {
    pub restaurant_service: Arc<RestaurantService>,
    pub menu_service: Arc<MenuService>,
    /// Absent for the in-memory backend
    pub table_manager: Option<Arc<TableManager>>,
    pub tables: TableNames,
}

/// Response for seeding operations
#[derive(Debug, Serialize)]
pub struct SeedResponse {
    pub message: String,
    pub restaurants_created: usize,
    pub dishes_created: usize,
    pub timestamp: String,
}

/// Response for table setup operations
#[derive(Debug, Serialize)]
pub struct SetupTablesResponse {
    pub message: String,
    pub tables_created: Vec<String>,
    pub timestamp: String,
}

/// Create admin router with database management endpoints
pub fn create_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/api/admin/setup-tables", post(setup_tables))
        .route("/api/admin/seed", post(seed_database))
        .with_state(state)
}

/// Create the DynamoDB tables if they are missing
#[instrument(name = "setup_tables", skip(state), fields(
    restaurants_table = %state.tables.restaurants,
    votes_table = %state.tables.votes,
    dishes_table = %state.tables.dishes,
))]
pub async fn setup_tables(
    State(state): State<AdminState>,
) -> Result<Json<SetupTablesResponse>, (StatusCode, Json<Value>)> {
    let timestamp = chrono::Utc::now().to_rfc3339();

    let Some(table_manager) = &state.table_manager else {
        info!("In-memory storage selected, no tables to create");
        return Ok(Json(SetupTablesResponse {
            message: "In-memory storage needs no tables".to_string(),
            tables_created: Vec::new(),
            timestamp,
        }));
    };

    match table_manager.create_all_tables(&state.tables).await {
        Ok(()) => {
            let tables_created = state.tables.all();
            info!("Tables ready: {:?}", tables_created);

            Ok(Json(SetupTablesResponse {
                message: format!("Successfully created {} tables", tables_created.len()),
                tables_created,
                timestamp,
            }))
        }
        Err(err) => {
            error!("Failed to create tables: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to create tables",
                    "message": err.to_string(),
                    "timestamp": timestamp,
                })),
            ))
        }
    }
}

/// Register the sample restaurants that are not there yet and publish
/// today's sample menu for every restaurant
#[instrument(name = "seed_database", skip(state))]
pub async fn seed_database(
    State(state): State<AdminState>,
) -> Result<Json<SeedResponse>, (StatusCode, Json<Value>)> {
    let restaurants = state
        .restaurant_service
        .seed(default_restaurants())
        .await
        .map_err(service_error_to_response)?;

    let catalogue = state
        .restaurant_service
        .list_restaurants()
        .await
        .map_err(service_error_to_response)?;
    let dishes = state
        .menu_service
        .seed_today(&catalogue)
        .await
        .map_err(service_error_to_response)?;

    info!(
        "Seeded {} restaurants and {} dishes",
        restaurants.len(),
        dishes.len()
    );

    Ok(Json(SeedResponse {
        message: format!(
            "Seeded {} restaurants and {} dishes",
            restaurants.len(),
            dishes.len()
        ),
        restaurants_created: restaurants.len(),
        dishes_created: dishes.len(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{InMemoryDishRepository, InMemoryRestaurantRepository};
    use crate::services::{default_menu, FixedClock};
    use chrono::NaiveDate;

    fn memory_state() -> AdminState {
        let restaurants = Arc::new(InMemoryRestaurantRepository::new());
        let clock = Arc::new(FixedClock::at_reference(
            NaiveDate::from_ymd_opt(2024, 3, 5)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        ));

        AdminState {
            restaurant_service: Arc::new(RestaurantService::new(restaurants.clone())),
            menu_service: Arc::new(MenuService::new(
                restaurants,
                Arc::new(InMemoryDishRepository::new()),
                clock,
            )),
            table_manager: None,
            tables: TableNames {
                restaurants: "restaurants".to_string(),
                votes: "votes".to_string(),
                dishes: "dishes".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_setup_tables_without_dynamodb() {
        let Json(response) = setup_tables(State(memory_state())).await.unwrap();
        assert!(response.tables_created.is_empty());
    }

    #[tokio::test]
    async fn test_seed_twice() {
        let state = memory_state();

        let Json(first) = seed_database(State(state.clone())).await.unwrap();
        let Json(second) = seed_database(State(state)).await.unwrap();

        let menu_size: usize = (0..default_restaurants().len())
            .map(|position| default_menu(position).len())
            .sum();

        assert_eq!(first.restaurants_created, default_restaurants().len());
        assert_eq!(first.dishes_created, menu_size);
        assert_eq!(second.restaurants_created, 0);
        assert_eq!(second.dishes_created, 0);
    }
}
