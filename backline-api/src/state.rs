use std::sync::Arc;

use backline_catalog::SpecialEventStore;
use backline_order::{CartValidator, CheckoutService, OrderService};
use backline_reservation::{AvailabilityProjector, HoldManager};
use backline_store::RedisClient;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub redis: Arc<RedisClient>,
    pub auth: AuthConfig,
    pub rate_limit_per_minute: i64,
    pub availability: Arc<AvailabilityProjector>,
    pub holds: Arc<HoldManager>,
    pub cart: Arc<CartValidator>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub events: Arc<dyn SpecialEventStore>,
}
