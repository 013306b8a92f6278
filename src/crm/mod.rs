//! Customer relationship records backing the business-client tools.

pub mod manager;
pub mod model;
pub mod sample_data;

pub use manager::CustomerManager;
pub use model::{format_credit, ActiveStatus, Customer, NewCustomer};
