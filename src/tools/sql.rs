use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{single_string_schema, string_arg, Tool};
use crate::core::errors::ApiError;
use crate::sql::SqlAnswerChain;

const DESCRIPTION: &str = "Query the Chinook music store database using natural language. Use this tool for analytical or complex questions about music tracks, albums, artists or genres; customer purchases, invoices or spending patterns; employees; sales and revenue; playlists and media types; or anything needing joins or aggregations. The question is converted to SQL, executed, and answered with specific data from the database. Tables: Artist, Album, Track, Customer, Employee, Invoice, InvoiceLine, Genre, MediaType, Playlist, PlaylistTrack. Example questions: \"Which artist has the most albums?\", \"What are the top 5 bestselling tracks?\", \"Which country's customers have spent the most?\"";

pub struct MusicDatabaseTool {
    chain: Arc<SqlAnswerChain>,
}

impl MusicDatabaseTool {
    pub fn new(chain: Arc<SqlAnswerChain>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl Tool for MusicDatabaseTool {
    fn name(&self) -> &str {
        "query_music_database"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        single_string_schema(
            "question",
            "Natural language question about the music store data",
        )
    }

    /// Chain failures are reported to the model as text so it can rephrase
    /// instead of giving up.
    async fn call(&self, args: &Value) -> Result<String, ApiError> {
        let question = string_arg(args, "question")?;
        match self.chain.run(&question).await {
            Ok(run) => Ok(run.answer),
            Err(err) => {
                tracing::error!("Error querying music database: {}", err);
                Ok(format!(
                    "Error querying music database: {}\n\nPlease try rephrasing your question or make it more specific.",
                    err
                ))
            }
        }
    }
}
