use std::sync::Arc;

use anyhow::{ensure, Result};
use clap::Parser;
use invoicedesk::handlers::{self, AppState};
use invoicedesk::store::{InMemoryStore, InvoiceDefaults};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "invoicedesk", about = "InvoiceDesk invoicing and client dashboard API")]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Load the sample clients and invoices on startup
    #[arg(long, default_value_t = false)]
    seed: bool,

    /// Tax rate (fraction) applied when an invoice omits one
    #[arg(long, env = "INVOICEDESK_TAX_RATE", default_value_t = 0.1)]
    default_tax_rate: f64,

    /// Days between issue and due date when an invoice omits a due date
    #[arg(long, env = "INVOICEDESK_PAYMENT_TERMS", default_value_t = 30)]
    payment_terms_days: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("invoicedesk=info".parse()?))
        .init();

    let cli = Cli::parse();
    ensure!(
        cli.default_tax_rate.is_finite() && (0.0..=1.0).contains(&cli.default_tax_rate),
        "default tax rate must be between 0 and 1, got {}",
        cli.default_tax_rate
    );

    let defaults = InvoiceDefaults {
        tax_rate: cli.default_tax_rate,
        payment_terms_days: cli.payment_terms_days,
    };
    let store = InMemoryStore::new(defaults);

    if cli.seed && store.is_empty()? {
        info!("Seeding store with sample clients and invoices...");
        let (clients, invoices) = store.seed_data()?;
        info!("Seeded {} clients and {} invoices.", clients, invoices);
    }

    let state = Arc::new(AppState {
        store: Arc::new(store),
        defaults,
    });

    // CORS: allow all
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = format!("0.0.0.0:{}", cli.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("InvoiceDesk listening on http://localhost:{}", cli.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for CTRL+C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutting down InvoiceDesk...");
        })
        .await?;

    Ok(())
}
