use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::config::{Config, StorageBackend};
use crate::handlers::{
    admin::{create_admin_router, AdminState},
    api::{create_api_router, ApiState},
    health_check, metrics_handler, not_found, request_validation_middleware,
    security_headers_middleware,
};
use crate::observability::{observability_middleware, Metrics};
use crate::repositories::{
    DishRepository, DynamoDbDishRepository, DynamoDbRestaurantRepository, DynamoDbVoteRepository,
    InMemoryDishRepository, InMemoryRestaurantRepository, InMemoryVoteRepository,
    MeteredDishRepository, MeteredRestaurantRepository, MeteredVoteRepository,
    RestaurantRepository, TableManager, TableNames, VoteRepository,
};
use crate::services::{Clock, MenuService, RestaurantService, VotingService};

/// Everything the router needs, independent of the storage backend
#[derive(Clone)]
pub struct AppComponents {
    pub metrics: Arc<Metrics>,
    pub voting_service: Arc<VotingService>,
    pub restaurant_service: Arc<RestaurantService>,
    pub menu_service: Arc<MenuService>,
    pub table_manager: Option<Arc<TableManager>>,
    pub tables: TableNames,
}

/// HTTP limits applied around every route
#[derive(Debug, Clone, Copy)]
pub struct HttpLimits {
    pub request_timeout: Duration,
    pub max_request_size: usize,
}

/// The three stores the services run on
pub struct Stores {
    pub restaurants: Arc<dyn RestaurantRepository>,
    pub votes: Arc<dyn VoteRepository>,
    pub dishes: Arc<dyn DishRepository>,
}

impl AppComponents {
    /// Wire services over the given stores, recording database metrics
    pub fn new(
        stores: Stores,
        tables: TableNames,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let restaurants: Arc<dyn RestaurantRepository> = Arc::new(MeteredRestaurantRepository::new(
            stores.restaurants,
            tables.restaurants.clone(),
            metrics.clone(),
        ));
        let votes: Arc<dyn VoteRepository> = Arc::new(MeteredVoteRepository::new(
            stores.votes,
            tables.votes.clone(),
            metrics.clone(),
        ));
        let dishes: Arc<dyn DishRepository> = Arc::new(MeteredDishRepository::new(
            stores.dishes,
            tables.dishes.clone(),
            metrics.clone(),
        ));

        Self {
            voting_service: Arc::new(VotingService::new_with_metrics(
                restaurants.clone(),
                votes,
                clock.clone(),
                metrics.clone(),
            )),
            menu_service: Arc::new(MenuService::new_with_metrics(
                restaurants.clone(),
                dishes,
                clock,
                metrics.clone(),
            )),
            restaurant_service: Arc::new(RestaurantService::new_with_metrics(
                restaurants,
                metrics.clone(),
            )),
            metrics,
            table_manager: None,
            tables,
        }
    }

    /// Process-local stores, used by tests and the `memory` backend
    pub fn in_memory(clock: Arc<dyn Clock>, metrics: Arc<Metrics>) -> Self {
        Self::new(
            Stores {
                restaurants: Arc::new(InMemoryRestaurantRepository::new()),
                votes: Arc::new(InMemoryVoteRepository::new()),
                dishes: Arc::new(InMemoryDishRepository::new()),
            },
            TableNames {
                restaurants: "memory-restaurants".to_string(),
                votes: "memory-votes".to_string(),
                dishes: "memory-dishes".to_string(),
            },
            clock,
            metrics,
        )
    }

    /// Select stores from configuration
    pub async fn from_config(
        config: &Config,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let database = &config.database;

        match database.storage_backend {
            StorageBackend::Memory => {
                info!("Using in-memory storage");
                Self::in_memory(clock, metrics)
            }
            StorageBackend::Dynamodb => {
                let tables = database.table_names();
                info!(
                    "Using DynamoDB tables: restaurants={}, votes={}, dishes={}",
                    tables.restaurants, tables.votes, tables.dishes
                );
                let client = Arc::new(database.dynamodb_client().await);

                let stores = Stores {
                    restaurants: Arc::new(DynamoDbRestaurantRepository::new(
                        client.clone(),
                        tables.restaurants.clone(),
                        database.region.clone(),
                    )),
                    votes: Arc::new(DynamoDbVoteRepository::new(
                        client.clone(),
                        tables.votes.clone(),
                        database.region.clone(),
                    )),
                    dishes: Arc::new(DynamoDbDishRepository::new(
                        client.clone(),
                        tables.dishes.clone(),
                        database.region.clone(),
                    )),
                };

                let mut components = Self::new(stores, tables, clock, metrics);
                components.table_manager = Some(Arc::new(TableManager::new(client)));
                components
            }
        }
    }
}

/// Build the application router
pub fn create_app(components: AppComponents, limits: HttpLimits) -> Router {
    let metrics_for_middleware = components.metrics.clone();

    let admin_state = AdminState {
        restaurant_service: components.restaurant_service.clone(),
        menu_service: components.menu_service.clone(),
        table_manager: components.table_manager.clone(),
        tables: components.tables.clone(),
    };

    let health = Router::new()
        .route("/health/status", get(health_check))
        .with_state(components.voting_service.clone());

    let metrics = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(components.metrics.clone());

    Router::new()
        .merge(health)
        .merge(metrics)
        .merge(create_api_router(ApiState {
            voting_service: components.voting_service,
            restaurant_service: components.restaurant_service,
            menu_service: components.menu_service,
        }))
        .merge(create_admin_router(admin_state))
        .fallback(not_found)
        // Layers added last run first; a timed-out request drops the handler future.
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(move |req, next| {
            request_validation_middleware(limits.max_request_size, req, next)
        }))
        .layer(middleware::from_fn(move |req, next| {
            observability_middleware(metrics_for_middleware.clone(), req, next)
        }))
        .layer(TimeoutLayer::new(limits.request_timeout))
        .layer(TraceLayer::new_for_http())
}
