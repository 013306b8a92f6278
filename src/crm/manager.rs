use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use super::model::{ActiveStatus, Customer, NewCustomer};
use crate::core::errors::ApiError;

const CUSTOMER_COLUMNS: &str =
    "customer_id, name, address, email, phone, credit, active_status";

/// Read access to the CRM customer table, plus inserts for seeding.
#[derive(Clone)]
pub struct CustomerManager {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl CustomerManager {
    pub async fn open(db_path: &Path) -> Result<Self, ApiError> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ApiError::internal)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to connect to CRM db: {}", e)))?;

        let manager = Self {
            pool,
            db_path: db_path.to_path_buf(),
        };
        manager.init_schema().await?;
        Ok(manager)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS customers (
                customer_id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                address TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                phone TEXT NOT NULL,
                credit REAL NOT NULL DEFAULT 0.0,
                active_status TEXT NOT NULL DEFAULT 'active'
                    CHECK (active_status IN ('active', 'inactive'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init customers table: {}", e)))?;

        Ok(())
    }

    /// Inserts a customer. Returns `None` when the email is already taken.
    pub async fn create_customer(&self, customer: &NewCustomer) -> Result<Option<Customer>, ApiError> {
        let result = sqlx::query(
            "INSERT INTO customers (name, address, email, phone, credit, active_status)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&customer.name)
        .bind(&customer.address)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(customer.credit)
        .bind(customer.active_status.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => self.get_customer(done.last_insert_rowid()).await,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tracing::debug!("Customer with email {} already exists", customer.email);
                Ok(None)
            }
            Err(err) => Err(ApiError::internal(err)),
        }
    }

    pub async fn get_customer(&self, customer_id: i64) -> Result<Option<Customer>, ApiError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM customers WHERE customer_id = ?",
            CUSTOMER_COLUMNS
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        row.as_ref().map(row_to_customer).transpose()
    }

    pub async fn get_customer_by_email(&self, email: &str) -> Result<Option<Customer>, ApiError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM customers WHERE email = ? COLLATE NOCASE",
            CUSTOMER_COLUMNS
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        row.as_ref().map(row_to_customer).transpose()
    }

    pub async fn get_all_customers(&self) -> Result<Vec<Customer>, ApiError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM customers ORDER BY customer_id",
            CUSTOMER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        rows.iter().map(row_to_customer).collect()
    }

    pub async fn get_active_customers(&self) -> Result<Vec<Customer>, ApiError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM customers WHERE active_status = ? ORDER BY customer_id",
            CUSTOMER_COLUMNS
        ))
        .bind(ActiveStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        rows.iter().map(row_to_customer).collect()
    }

    /// Case-insensitive substring match on name or email. `%` and `_` in
    /// the term match literally.
    pub async fn search_customers(&self, term: &str) -> Result<Vec<Customer>, ApiError> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }
        let pattern = format!("%{}%", escape_like(term));

        let rows = sqlx::query(&format!(
            "SELECT {} FROM customers
             WHERE name LIKE ?1 ESCAPE '\\' OR email LIKE ?1 ESCAPE '\\'
             ORDER BY customer_id",
            CUSTOMER_COLUMNS
        ))
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        rows.iter().map(row_to_customer).collect()
    }

    pub async fn get_customer_count(&self) -> Result<i64, ApiError> {
        sqlx::query("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await
            .map(|row| row.get::<i64, _>(0))
            .map_err(ApiError::internal)
    }

    pub async fn get_active_count(&self) -> Result<i64, ApiError> {
        sqlx::query("SELECT COUNT(*) FROM customers WHERE active_status = ?")
            .bind(ActiveStatus::Active.as_str())
            .fetch_one(&self.pool)
            .await
            .map(|row| row.get::<i64, _>(0))
            .map_err(ApiError::internal)
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn row_to_customer(row: &SqliteRow) -> Result<Customer, ApiError> {
    let status: String = row.try_get("active_status").map_err(ApiError::internal)?;
    Ok(Customer {
        customer_id: row.try_get("customer_id").map_err(ApiError::internal)?,
        name: row.try_get("name").map_err(ApiError::internal)?,
        address: row.try_get("address").map_err(ApiError::internal)?,
        email: row.try_get("email").map_err(ApiError::internal)?,
        phone: row.try_get("phone").map_err(ApiError::internal)?,
        credit: row.try_get::<f64, _>("credit").unwrap_or_default(),
        active_status: status.parse().map_err(ApiError::Internal)?,
    })
}
