/// Bookstore Catalog - book, review and bookstore location API
///
/// Serves the catalog records together with review aggregations, rankings
/// and geospatial queries over bookstore locations.

mod api;
mod catalog;
mod config;
mod context;
mod db;
mod error;
mod geo;
mod metrics;
mod server;
mod store;

use config::ServerConfig;
use context::AppContext;
use error::CatalogResult;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> CatalogResult<()> {
    // Load configuration first so the log format can follow it
    let config = ServerConfig::from_env()?;

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| config::DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    print_banner();
    metrics::init();

    // Create application context
    let ctx = AppContext::new(config).await?;

    // Start server
    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    ____              __        __
   / __ )____  ____  / /_______/ /_____  ________
  / __  / __ \/ __ \/ //_/ ___/ __/ __ \/ ___/ _ \
 / /_/ / /_/ / /_/ / ,< (__  ) /_/ /_/ / /  /  __/
/_____/\____/\____/_/|_/____/\__/\____/_/   \___/

        Bookstore Catalog v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
