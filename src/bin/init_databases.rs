use std::sync::Arc;

use anyhow::Context;

use agentic_rag::core::config::{AppPaths, ConfigService};
use agentic_rag::core::logging;
use agentic_rag::db::initialize_databases;

/// Creates and seeds the CRM database and puts the Chinook database in
/// place, without starting the server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    let settings = ConfigService::new(paths.clone())
        .load_settings()
        .context("Failed to load configuration")?;
    logging::init(&settings.logging, &paths);

    let report = initialize_databases(&paths, &settings.database).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.crm {
        anyhow::bail!("CRM database initialization failed");
    }
    if !report.chinook {
        tracing::warn!(
            "Chinook database missing; the music database tool stays disabled until {} exists",
            report.chinook_path.display()
        );
    }
    Ok(())
}
