use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use backline_api::{
    app,
    state::{AppState, AuthConfig},
};
use backline_catalog::{RateCard, SpecialEventStore};
use backline_core::invoice::{InvoiceService, MockInvoiceService};
use backline_core::notify::{LogNotificationService, NotificationService};
use backline_core::payment::{MockGateway, PaymentGateway};
use backline_core::BusinessClock;
use backline_order::{
    CartValidator, CheckoutService, OrderService, OrderStore, SettlementReconciler,
};
use backline_reservation::{AvailabilityProjector, AvailabilityStore, HoldManager, HoldPolicy};
use backline_shared::BookingTelemetry;
use backline_store::{
    sweep, DbClient, PgAvailabilityStore, PgHoldStore, PgOrderStore, PgSpecialEventStore,
    RedisClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backline_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = backline_store::Config::load().expect("Failed to load config");
    tracing::info!("Starting Backline API on port {}", config.server.port);

    // Postgres Connection
    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    // Redis Connection
    let redis_client = RedisClient::new(&config.redis.url)
        .await
        .expect("Failed to connect to Redis");
    let redis_arc = Arc::new(redis_client);

    // Stores
    let hold_store = Arc::new(PgHoldStore::new(db.pool.clone()));
    let availability_store: Arc<dyn AvailabilityStore> =
        Arc::new(PgAvailabilityStore::new(db.pool.clone()));
    let order_store: Arc<dyn OrderStore> = Arc::new(PgOrderStore::new(db.pool.clone()));
    let event_store: Arc<dyn SpecialEventStore> =
        Arc::new(PgSpecialEventStore::new(db.pool.clone()));

    // External boundaries. Adapters are selected by configuration; only
    // the mock provider ships today.
    let gateway: Arc<dyn PaymentGateway> = match config.payment.provider.as_str() {
        "mock" => Arc::new(MockGateway),
        other => panic!("Unsupported payment provider: {}", other),
    };
    let invoices: Arc<dyn InvoiceService> = Arc::new(MockInvoiceService);
    let notifier: Arc<dyn NotificationService> = Arc::new(LogNotificationService);

    // Domain Services
    let clock = BusinessClock::new(config.business_rules.timezone);
    let catalog = Arc::new(config.catalog());
    let telemetry = BookingTelemetry::new();
    let policy = HoldPolicy::from_minutes(config.business_rules.hold_ttl_minutes);

    let availability = Arc::new(AvailabilityProjector::new(
        availability_store.clone(),
        catalog.clone(),
        clock,
    ));
    let holds = Arc::new(HoldManager::new(
        hold_store,
        catalog.clone(),
        clock,
        policy,
        telemetry.clone(),
    ));
    let cart = Arc::new(CartValidator::new(
        catalog.clone(),
        event_store.clone(),
        availability_store,
        RateCard::new(config.business_rules.currency.clone()),
        clock,
    ));
    let reconciler = Arc::new(SettlementReconciler::new(
        order_store.clone(),
        invoices,
        notifier,
        catalog.clone(),
        clock,
        telemetry.clone(),
    ));
    let checkout = Arc::new(CheckoutService::new(
        order_store.clone(),
        cart.clone(),
        gateway.clone(),
        clock,
        policy,
        config.payment.provider.clone(),
        config.business_rules.currency.clone(),
        telemetry.clone(),
    ));
    let orders = Arc::new(OrderService::new(
        order_store,
        gateway,
        reconciler,
        clock,
        telemetry,
    ));

    // Expired-hold sweeper. Hygiene only; reads already ignore expired
    // rows.
    let sweeper = tokio::spawn(sweep::run_hold_sweeper(
        db.pool.clone(),
        Duration::from_secs(config.business_rules.hold_sweep_interval_seconds),
    ));

    let app_state = AppState {
        redis: redis_arc,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        rate_limit_per_minute: config.business_rules.rate_limit_per_minute,
        availability,
        holds,
        cart,
        checkout,
        orders,
        events: event_store,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .unwrap();

    sweeper.abort();
    tracing::info!("Shut down");
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}
