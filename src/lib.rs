pub mod agent;
pub mod core;
pub mod crm;
pub mod db;
pub mod llm;
pub mod server;
pub mod sql;
pub mod state;
pub mod tools;
pub mod vector;
