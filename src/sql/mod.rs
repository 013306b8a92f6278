pub mod chain;
pub mod database;

pub use chain::{extract_sql_query, SqlAnswerChain};
pub use database::MusicDatabase;
