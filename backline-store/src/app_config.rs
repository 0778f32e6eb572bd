use backline_catalog::{Catalog, Room};
use serde::Deserialize;
use std::env;
use uuid::Uuid;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub payment: PaymentConfig,
    pub business_rules: BusinessRules,
    pub rooms: Vec<RoomConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    pub provider: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    pub timezone: chrono_tz::Tz,
    pub currency: String,
    pub hold_ttl_minutes: i64,
    #[serde(default = "default_sweep_interval")]
    pub hold_sweep_interval_seconds: u64,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_rate_limit() -> i64 {
    100
}

/// One bookable room as declared in config. The room list is the
/// catalog; there is no rooms table.
#[derive(Debug, Deserialize, Clone)]
pub struct RoomConfig {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    pub open_hour: u32,
    pub close_hour: u32,
    pub hourly_rate_cents: i64,
}

fn default_active() -> bool {
    true
}

impl From<RoomConfig> for Room {
    fn from(room: RoomConfig) -> Self {
        Room {
            id: room.id,
            slug: room.slug,
            name: room.name,
            active: room.active,
            open_hour: room.open_hour,
            close_hour: room.close_hour,
            hourly_rate_cents: room.hourly_rate_cents,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file
            // Default to 'development' env
            // Note that this file is _optional_
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of BACKLINE)
            // Eg.. `BACKLINE__SERVER__PORT=9000` would set the port
            .add_source(config::Environment::with_prefix("BACKLINE").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.rooms.iter().cloned().map(Room::from).collect())
    }
}
