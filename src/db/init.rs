use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::config::settings::DatabaseSettings;
use crate::core::config::AppPaths;
use crate::core::errors::ApiError;
use crate::crm::sample_data::seed_customers;
use crate::crm::CustomerManager;

/// Where a Chinook database is looked for, relative to the project root.
pub const CHINOOK_CANDIDATES: [&str; 4] = [
    "data/chinook.db",
    "data/Chinook_Sqlite.sqlite",
    "lc-training-data/chinook.db",
    "lc-training-data/Chinook_Sqlite.db",
];

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseInitReport {
    pub crm: bool,
    pub crm_customers: i64,
    pub crm_seeded: usize,
    pub chinook: bool,
    pub chinook_path: PathBuf,
    pub chinook_source: Option<PathBuf>,
}

/// Opens (creating if needed) the CRM database and seeds sample customers
/// when it is empty. Returns the manager and how many rows were seeded.
pub async fn setup_crm_database(
    db_path: &Path,
    sample_records: usize,
) -> Result<(CustomerManager, usize), ApiError> {
    tracing::info!("Setting up CRM database at {}", db_path.display());
    let manager = CustomerManager::open(db_path).await?;

    let existing = manager.get_customer_count().await?;
    if existing > 0 {
        tracing::info!(
            "CRM database already has {} customers; skipping sample data",
            existing
        );
        return Ok((manager, 0));
    }

    let seeded = seed_customers(&manager, sample_records).await?;
    tracing::info!("CRM database seeded with {} sample customers", seeded);
    Ok((manager, seeded))
}

/// Makes sure a non-empty Chinook database exists at `target`, copying the
/// first non-empty candidate when it does not. Returns the copy source, or
/// `None` when the target was already in place.
pub async fn setup_chinook_database(
    project_root: &Path,
    target: &Path,
) -> Result<Option<PathBuf>, ApiError> {
    if non_empty_file(target).await {
        tracing::info!("Chinook database already present at {}", target.display());
        return Ok(None);
    }

    let mut source = None;
    for candidate in CHINOOK_CANDIDATES.iter().map(|c| project_root.join(c)) {
        if candidate != target && non_empty_file(&candidate).await {
            source = Some(candidate);
            break;
        }
    }
    let Some(source) = source else {
        return Err(ApiError::NotFound(format!(
            "Chinook database not found. Place chinook.db at {} or one of: {}",
            target.display(),
            CHINOOK_CANDIDATES.join(", ")
        )));
    };

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(ApiError::internal)?;
    }
    let bytes = tokio::fs::copy(&source, target)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to copy {}: {}", source.display(), e)))?;
    tracing::info!(
        "Copied Chinook database from {} to {} ({} bytes)",
        source.display(),
        target.display(),
        bytes
    );
    Ok(Some(source))
}

async fn non_empty_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

/// Runs both setups. Failures are logged and reflected in the report
/// rather than returned.
pub async fn initialize_databases(paths: &AppPaths, settings: &DatabaseSettings) -> DatabaseInitReport {
    let crm_path = paths.resolve(&settings.crm_path);
    let chinook_path = paths.resolve(&settings.chinook_path);

    let (crm, crm_customers, crm_seeded) =
        match setup_crm_database(&crm_path, settings.crm_sample_records).await {
            Ok((manager, seeded)) => {
                let count = manager.get_customer_count().await.unwrap_or_default();
                (true, count, seeded)
            }
            Err(err) => {
                tracing::error!("CRM database setup failed: {}", err);
                (false, 0, 0)
            }
        };

    let (chinook, chinook_source) =
        match setup_chinook_database(&paths.project_root, &chinook_path).await {
            Ok(source) => (true, source),
            Err(err) => {
                tracing::warn!("Chinook database setup failed: {}", err);
                (false, None)
            }
        };

    tracing::info!(
        "Database initialization: CRM {}, Chinook {}",
        if crm { "ok" } else { "FAILED" },
        if chinook { "ok" } else { "FAILED" }
    );

    DatabaseInitReport {
        crm,
        crm_customers,
        crm_seeded,
        chinook,
        chinook_path,
        chinook_source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn crm_is_seeded_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("crm.db");

        let (manager, seeded) = setup_crm_database(&path, 10).await.unwrap();
        assert_eq!(seeded, 10);
        assert_eq!(manager.get_customer_count().await.unwrap(), 10);

        let (_, seeded_again) = setup_crm_database(&path, 10).await.unwrap();
        assert_eq!(seeded_again, 0);
    }

    #[tokio::test]
    async fn chinook_is_copied_from_first_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let target = root.join("db").join("chinook.db");

        assert!(matches!(
            setup_chinook_database(root, &target).await,
            Err(ApiError::NotFound(_))
        ));

        std::fs::create_dir_all(root.join("lc-training-data")).unwrap();
        std::fs::write(root.join("lc-training-data/chinook.db"), b"SQLite format 3\0").unwrap();
        std::fs::create_dir_all(root.join("data")).unwrap();
        // empty candidates are skipped
        std::fs::write(root.join("data/chinook.db"), b"").unwrap();

        let source = setup_chinook_database(root, &target).await.unwrap();
        assert_eq!(source, Some(root.join("lc-training-data/chinook.db")));
        assert_eq!(std::fs::read(&target).unwrap(), b"SQLite format 3\0");

        // an existing target is kept
        assert_eq!(setup_chinook_database(root, &target).await.unwrap(), None);
    }

    #[tokio::test]
    async fn report_reflects_partial_failure() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::with_root(dir.path().to_path_buf());
        let settings = DatabaseSettings {
            crm_sample_records: 5,
            ..DatabaseSettings::default()
        };

        let report = initialize_databases(&paths, &settings).await;
        assert!(report.crm);
        assert_eq!(report.crm_customers, 5);
        assert!(!report.chinook);
        assert_eq!(report.chinook_path, dir.path().join("db/chinook.db"));
    }
}
