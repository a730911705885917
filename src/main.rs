use dotenvy::dotenv;
use marketplace_stock::{
    config::{catalog::seed_catalog, database, settings::load_app_configuration},
    core::{catalog, report, round},
    errors::Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = load_app_configuration()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Connect and make sure the schema exists
    let db = database::create_connection(&app_config.database)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Seed the catalog from config.toml
    let seeded = seed_catalog(&db, &app_config.stores)
        .await
        .inspect_err(|e| error!("Failed to seed catalog: {}", e))?;
    info!(
        "Catalog seeding: {} stores created ({} already present), {} products, {} variants",
        seeded.stores, seeded.skipped_stores, seeded.products, seeded.variants
    );

    // 6. Report what the engine will serve
    let stores = catalog::list_active_stores(&db).await?;
    info!("{} active stores", stores.len());
    for sales_round in round::list_sales_rounds(&db).await? {
        let summary = report::generate_round_summary(&db, sales_round.id).await?;
        info!("{}", report::format_round_summary(&summary));
    }

    info!(
        "Purchase engine ready (order prefix '{}', round windows {})",
        app_config.purchase.order_code_prefix,
        if app_config.purchase.enforce_round_window {
            "enforced"
        } else {
            "not enforced"
        }
    );
    Ok(())
}
