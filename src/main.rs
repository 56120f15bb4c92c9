use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use storefront_api::{
    app_router,
    config::{init_tracing, load_config},
    db::{establish_connection, run_migrations},
    events::{process_events, EventSender},
    gateway::HttpPaymentGateway,
    handlers::AppServices,
    services::{CartService, CheckoutService, OrderLedgerService},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    init_tracing(&config.log_level, config.log_json);

    info!(
        "Starting {} v{} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        config.environment
    );

    let db = Arc::new(
        establish_connection(&config)
            .await
            .context("failed to connect to database")?,
    );
    if config.auto_migrate {
        run_migrations(&db).await.context("migrations failed")?;
        info!("Database migrations applied");
    }

    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = Arc::new(EventSender::new(event_tx));
    tokio::spawn(process_events(event_rx));

    let gateway = Arc::new(
        HttpPaymentGateway::new(&config.gateway).context("failed to build gateway client")?,
    );

    let cart = CartService::new(db.clone(), event_sender.clone());
    let orders = OrderLedgerService::new(db.clone(), event_sender.clone());
    let checkout = CheckoutService::new(
        db.clone(),
        gateway,
        cart.clone(),
        orders.clone(),
        event_sender.clone(),
        config.gateway.currency.clone(),
    );

    let state = AppState {
        db,
        config: Arc::new(config.clone()),
        event_sender,
        services: AppServices {
            cart,
            checkout,
            orders,
        },
    };

    let app = app_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install ctrl-c handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!("failed to install terminate handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
