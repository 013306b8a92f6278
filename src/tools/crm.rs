//! Read-only business-client (CRM) lookups exposed to the agent.
//!
//! Lookups that find nothing are ordinary answers for the model, so they
//! come back as `Ok` text. Only database failures surface as errors.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{empty_schema, single_string_schema, string_arg, Tool};
use crate::core::errors::ApiError;
use crate::crm::{format_credit, Customer, CustomerManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrmOperation {
    ById,
    ByEmail,
    Search,
    Active,
    All,
    Count,
}

impl CrmOperation {
    pub const ALL: [CrmOperation; 6] = [
        CrmOperation::ById,
        CrmOperation::ByEmail,
        CrmOperation::Search,
        CrmOperation::Active,
        CrmOperation::All,
        CrmOperation::Count,
    ];

    fn name(self) -> &'static str {
        match self {
            CrmOperation::ById => "get_business_client_by_id",
            CrmOperation::ByEmail => "get_business_client_by_email",
            CrmOperation::Search => "search_business_clients",
            CrmOperation::Active => "get_active_business_clients",
            CrmOperation::All => "get_all_business_clients",
            CrmOperation::Count => "get_business_client_count",
        }
    }

    fn description(self) -> &'static str {
        match self {
            CrmOperation::ById => "Retrieve a business client's complete details (name, address, email, phone, credit, status) by their client ID from the CRM database. Use when the user asks about a specific business client by ID number.",
            CrmOperation::ByEmail => "Retrieve a business client's complete details by their email address from the CRM database. Use when the user asks about a business client by email or wants to verify that a client with an email exists.",
            CrmOperation::Search => "Search business clients in the CRM database by a partial or full name or email. Use when the user wants to find clients whose name or email contains a term.",
            CrmOperation::Active => "List all active business clients in the CRM database with their details. Use when the user asks for active clients only.",
            CrmOperation::All => "List every business client in the CRM database with their details. Use when the user asks for all clients or an overview of the client base.",
            CrmOperation::Count => "Get the total number of business clients in the CRM database with the active/inactive breakdown. Use for quick statistics without client details.",
        }
    }

    fn parameters(self) -> Value {
        match self {
            CrmOperation::ById => json!({
                "type": "object",
                "properties": {
                    "client_id": {
                        "type": "integer",
                        "description": "The unique business client ID number"
                    }
                },
                "required": ["client_id"]
            }),
            CrmOperation::ByEmail => single_string_schema("email", "The business client's email address"),
            CrmOperation::Search => single_string_schema(
                "search_term",
                "Term to search for in business client names or emails",
            ),
            CrmOperation::Active | CrmOperation::All | CrmOperation::Count => empty_schema(),
        }
    }
}

/// The six CRM tools in registration order.
pub fn crm_tools(manager: CustomerManager) -> Vec<Arc<dyn Tool>> {
    CrmOperation::ALL
        .into_iter()
        .map(|operation| Arc::new(CrmTool::new(operation, manager.clone())) as Arc<dyn Tool>)
        .collect()
}

pub struct CrmTool {
    operation: CrmOperation,
    manager: CustomerManager,
}

impl CrmTool {
    pub fn new(operation: CrmOperation, manager: CustomerManager) -> Self {
        Self { operation, manager }
    }

    async fn by_id(&self, args: &Value) -> Result<String, ApiError> {
        let client_id = client_id_arg(args)?;
        Ok(match self.manager.get_customer(client_id).await? {
            Some(customer) => customer.describe(),
            None => format!(
                "Error: Business client with ID {} not found in the database.",
                client_id
            ),
        })
    }

    async fn by_email(&self, args: &Value) -> Result<String, ApiError> {
        let email = string_arg(args, "email")?;
        Ok(match self.manager.get_customer_by_email(&email).await? {
            Some(customer) => customer.describe(),
            None => format!(
                "Error: Business client with email '{}' not found in the database.",
                email
            ),
        })
    }

    async fn search(&self, args: &Value) -> Result<String, ApiError> {
        let term = string_arg(args, "search_term")?;
        let customers = self.manager.search_customers(&term).await?;
        if customers.is_empty() {
            return Ok(format!(
                "No business clients found matching the search term '{}'.",
                term
            ));
        }
        Ok(format!(
            "Found {} business client(s) matching '{}':\n\n{}",
            customers.len(),
            term,
            numbered_list(&customers)
        ))
    }

    async fn active(&self) -> Result<String, ApiError> {
        let customers = self.manager.get_active_customers().await?;
        if customers.is_empty() {
            return Ok("No active business clients found in the database.".to_string());
        }
        Ok(format!(
            "Total Active Business Clients: {}\n\n{}",
            customers.len(),
            numbered_list(&customers)
        ))
    }

    async fn all(&self) -> Result<String, ApiError> {
        let customers = self.manager.get_all_customers().await?;
        if customers.is_empty() {
            return Ok(
                "The business client database is currently empty. No clients found.".to_string(),
            );
        }
        Ok(format!(
            "Total Business Clients: {}\n\n{}",
            customers.len(),
            numbered_list(&customers)
        ))
    }

    async fn count(&self) -> Result<String, ApiError> {
        let total = self.manager.get_customer_count().await?;
        let active = self.manager.get_active_count().await?;
        Ok(format!(
            "Total Business Clients: {}\nActive Business Clients: {}\nInactive Business Clients: {}",
            total,
            active,
            total - active
        ))
    }
}

#[async_trait]
impl Tool for CrmTool {
    fn name(&self) -> &str {
        self.operation.name()
    }

    fn description(&self) -> &str {
        self.operation.description()
    }

    fn parameters(&self) -> Value {
        self.operation.parameters()
    }

    async fn call(&self, args: &Value) -> Result<String, ApiError> {
        let result = match self.operation {
            CrmOperation::ById => self.by_id(args).await,
            CrmOperation::ByEmail => self.by_email(args).await,
            CrmOperation::Search => self.search(args).await,
            CrmOperation::Active => self.active().await,
            CrmOperation::All => self.all().await,
            CrmOperation::Count => self.count().await,
        };
        if let Err(err) = &result {
            tracing::error!("CRM tool {} failed: {}", self.operation.name(), err);
        }
        result
    }
}

/// Accepts the id as a JSON number or a numeric string.
fn client_id_arg(args: &Value) -> Result<i64, ApiError> {
    let raw = match args {
        Value::Object(_) => args.get("client_id"),
        other => Some(other),
    };
    raw.and_then(|value| match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
    .ok_or_else(|| ApiError::BadRequest("`client_id` must be an integer".to_string()))
}

fn numbered_list(customers: &[Customer]) -> String {
    customers
        .iter()
        .enumerate()
        .map(|(idx, customer)| {
            format!(
                "{}. Business Client ID: {}\n   Name: {}\n   Email: {}\n   Phone: {}\n   Address: {}\n   Credit: {}\n   Status: {}",
                idx + 1,
                customer.customer_id,
                customer.name,
                customer.email,
                customer.phone,
                customer.address,
                format_credit(customer.credit),
                customer.active_status
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::manager::tests::{new_customer, test_manager};
    use crate::crm::ActiveStatus;
    use crate::tools::ToolRegistry;

    async fn registry() -> (tempfile::TempDir, ToolRegistry) {
        let (dir, manager) = test_manager().await;
        for (name, email, status) in [
            ("Aarav Sharma", "aarav.sharma@gmail.com", ActiveStatus::Active),
            ("Diya Reddy", "diya.reddy@yahoo.co.in", ActiveStatus::Inactive),
            ("Kabir Sharma", "kabir.s@outlook.com", ActiveStatus::Active),
        ] {
            manager
                .create_customer(&new_customer(name, email, status))
                .await
                .unwrap();
        }
        let mut registry = ToolRegistry::new();
        registry.extend(crm_tools(manager));
        (dir, registry)
    }

    #[tokio::test]
    async fn tools_are_registered_in_order() {
        let (_dir, registry) = registry().await;
        assert_eq!(
            registry.names(),
            vec![
                "get_business_client_by_id",
                "get_business_client_by_email",
                "search_business_clients",
                "get_active_business_clients",
                "get_all_business_clients",
                "get_business_client_count",
            ]
        );
    }

    #[tokio::test]
    async fn lookup_by_id_and_email() {
        let (_dir, registry) = registry().await;

        let found = registry
            .execute("get_business_client_by_id", &json!({"client_id": 2}))
            .await
            .unwrap();
        assert!(found.starts_with("Business Client ID: 2\nName: Diya Reddy\n"));
        assert!(found.contains("Credit: ₹1,500.25"));
        assert!(found.ends_with("Status: inactive"));

        let as_string = registry
            .execute("get_business_client_by_id", &json!({"client_id": "1"}))
            .await
            .unwrap();
        assert!(as_string.contains("Name: Aarav Sharma"));

        assert_eq!(
            registry
                .execute("get_business_client_by_id", &json!({"client_id": 99}))
                .await
                .unwrap(),
            "Error: Business client with ID 99 not found in the database."
        );
        assert!(registry
            .execute("get_business_client_by_id", &json!({"client_id": "abc"}))
            .await
            .is_err());

        let by_email = registry
            .execute("get_business_client_by_email", &json!({"email": "KABIR.S@outlook.com"}))
            .await
            .unwrap();
        assert!(by_email.contains("Name: Kabir Sharma"));
    }

    #[tokio::test]
    async fn listings_and_counts() {
        let (_dir, registry) = registry().await;

        let search = registry
            .execute("search_business_clients", &json!({"search_term": "sharma"}))
            .await
            .unwrap();
        assert!(search.starts_with("Found 2 business client(s) matching 'sharma':\n\n1. Business Client ID: 1"));
        assert!(search.contains("\n\n2. Business Client ID: 3\n   Name: Kabir Sharma"));

        let none = registry
            .execute("search_business_clients", &json!({"search_term": "zzz"}))
            .await
            .unwrap();
        assert_eq!(none, "No business clients found matching the search term 'zzz'.");

        let active = registry
            .execute("get_active_business_clients", &json!({}))
            .await
            .unwrap();
        assert!(active.starts_with("Total Active Business Clients: 2"));
        assert!(!active.contains("Diya"));

        let all = registry.execute("get_all_business_clients", &json!({})).await.unwrap();
        assert!(all.starts_with("Total Business Clients: 3"));

        assert_eq!(
            registry.execute("get_business_client_count", &json!({})).await.unwrap(),
            "Total Business Clients: 3\nActive Business Clients: 2\nInactive Business Clients: 1"
        );
    }

    #[tokio::test]
    async fn empty_database_messages() {
        let mut registry = ToolRegistry::new();
        let (_dir, manager) = test_manager().await;
        registry.extend(crm_tools(manager));

        assert_eq!(
            registry.execute("get_all_business_clients", &json!({})).await.unwrap(),
            "The business client database is currently empty. No clients found."
        );
        assert_eq!(
            registry.execute("get_active_business_clients", &json!({})).await.unwrap(),
            "No active business clients found in the database."
        );
    }
}
