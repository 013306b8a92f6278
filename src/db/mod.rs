pub mod init;

pub use init::{initialize_databases, setup_chinook_database, setup_crm_database, DatabaseInitReport};
