pub mod app_config;
pub mod availability_repo;
pub mod database;
pub mod event_repo;
pub mod hold_repo;
pub mod order_repo;
pub mod redis_repo;
pub mod sweep;

pub use app_config::Config;
pub use availability_repo::PgAvailabilityStore;
pub use database::DbClient;
pub use event_repo::PgSpecialEventStore;
pub use hold_repo::PgHoldStore;
pub use order_repo::PgOrderStore;
pub use redis_repo::RedisClient;
