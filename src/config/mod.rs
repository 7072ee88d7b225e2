use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::repositories::TableNames;

pub const ENV_PREFIX: &str = "LUNCHVOTE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {message}")]
    LoadError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
}

/// Where restaurants, votes and menus are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Dynamodb,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_storage_backend")]
    pub storage_backend: StorageBackend,
    #[serde(default = "default_restaurants_table")]
    pub restaurants_table_name: String,
    #[serde(default = "default_votes_table")]
    pub votes_table_name: String,
    #[serde(default = "default_dishes_table")]
    pub dishes_table_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// DynamoDB Local or LocalStack
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_service_version")]
    pub service_version: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub enable_json_logging: bool,
}

impl Config {
    /// Load every section from `LUNCHVOTE_*` environment variables
    pub fn from_environment() -> Result<Self, ConfigError> {
        info!("Loading configuration from environment");
        Self::from_source(None)
    }

    /// Load from an explicit variable map instead of the process environment
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_source(Some(vars))
    }

    fn from_source(vars: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let config = Config {
            server: load_section("server", vars.clone())?,
            database: load_section("database", vars.clone())?,
            observability: load_section("observability", vars)?,
        };

        config.validate()?;
        debug!("Configuration: {:?}", config);

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| {
            Err(ConfigError::ValidationError {
                message: message.to_string(),
            })
        };

        if self.server.port == 0 {
            return invalid("Server port cannot be 0");
        }

        if self.server.request_timeout_seconds == 0 {
            return invalid("Request timeout cannot be 0");
        }

        if self.database.storage_backend == StorageBackend::Dynamodb {
            if self.database.restaurants_table_name.is_empty() {
                return invalid("Restaurants table name cannot be empty");
            }
            if self.database.votes_table_name.is_empty() {
                return invalid("Votes table name cannot be empty");
            }
            if self.database.dishes_table_name.is_empty() {
                return invalid("Dishes table name cannot be empty");
            }
            let tables = self.database.table_names();
            if tables.restaurants == tables.votes
                || tables.restaurants == tables.dishes
                || tables.votes == tables.dishes
            {
                return invalid("Restaurants, votes and dishes must use different tables");
            }
        }

        Ok(())
    }
}

fn load_section<T: DeserializeOwned>(
    section: &str,
    vars: Option<HashMap<String, String>>,
) -> Result<T, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::Environment::with_prefix(ENV_PREFIX).source(vars))
        .build()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to load {} config: {}", section, e),
        })?;

    settings
        .try_deserialize()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to deserialize {} config: {}", section, e),
        })
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    pub fn table_names(&self) -> TableNames {
        TableNames {
            restaurants: self.restaurants_table_name.clone(),
            votes: self.votes_table_name.clone(),
            dishes: self.dishes_table_name.clone(),
        }
    }

    /// Build a DynamoDB client for the configured region and endpoint
    pub async fn dynamodb_client(&self) -> DynamoDbClient {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(self.region.clone()));

        if let Some(endpoint) = &self.endpoint_url {
            info!("Using DynamoDB endpoint override {}", endpoint);
            loader = loader.endpoint_url(endpoint);
        }

        DynamoDbClient::new(&loader.load().await)
    }
}

// Default value functions
pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_port() -> u16 {
    8080
}

pub(crate) fn default_timeout() -> u64 {
    30
}

pub(crate) fn default_max_request_size() -> usize {
    64 * 1024
}

pub(crate) fn default_storage_backend() -> StorageBackend {
    StorageBackend::Memory
}

pub(crate) fn default_restaurants_table() -> String {
    "LunchRestaurants".to_string()
}

pub(crate) fn default_votes_table() -> String {
    "LunchVotes".to_string()
}

pub(crate) fn default_dishes_table() -> String {
    "LunchDishes".to_string()
}

pub(crate) fn default_region() -> String {
    "eu-central-1".to_string()
}

pub(crate) fn default_service_name() -> String {
    "lunchvote-rs".to_string()
}

pub(crate) fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub(crate) fn default_log_level() -> String {
    "info".to_string()
}
