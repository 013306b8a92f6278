//! Natural-language questions over the music database: the model writes a
//! SQLite query, the query runs, and the model phrases the result.

use std::sync::Arc;

use super::database::{ensure_read_only, MusicDatabase};
use crate::core::config::settings::SqlSettings;
use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};

const QUERY_PROMPT: &str = "You are a SQLite expert. Given an input question, first create a syntactically correct SQLite query to run, then look at the results of the query and return the answer to the input question.
Unless the user specifies in the question a specific number of examples to obtain, query for at most {top_k} results using the LIMIT clause as per SQLite. You can order the results to return the most informative data in the database.
Never query for all columns from a table. You must query only the columns that are needed to answer the question. Wrap each column name in double quotes (\") to denote them as delimited identifiers.
Pay attention to use only the column names you can see in the tables below. Be careful to not query for columns that do not exist. Also, pay attention to which column is in which table.
Pay attention to use date('now') function to get the current date, if the question involves \"today\".

Use the following format:

Question: Question here
SQLQuery: SQL Query to run
SQLResult: Result of the SQLQuery
Answer: Final answer here

Only use the following tables:
{table_info}

Question: {question}
SQLQuery: ";

const ANSWER_PROMPT: &str = "You are a helpful assistant analyzing a music store database (Chinook).

Given the following user question, corresponding SQL query, and SQL result, provide a clear, concise answer in business-professional English with specific details from the SQL result.

If the result is empty or null, explain that no data was found.
If there are multiple results, summarize the key findings.

User Question: {question}
SQL Query: {query}
SQL Result: {result}

Answer: ";

/// Intermediate values of one chain run, kept for logging and tests.
#[derive(Debug, Clone)]
pub struct ChainRun {
    pub query: String,
    pub result: String,
    pub answer: String,
}

pub struct SqlAnswerChain {
    db: MusicDatabase,
    llm: Arc<dyn LlmProvider>,
    settings: SqlSettings,
}

impl SqlAnswerChain {
    pub fn new(db: MusicDatabase, llm: Arc<dyn LlmProvider>, settings: SqlSettings) -> Self {
        Self { db, llm, settings }
    }

    pub fn database(&self) -> &MusicDatabase {
        &self.db
    }

    async fn complete(&self, prompt: String, stop: Option<Vec<String>>) -> Result<String, ApiError> {
        let mut request = ChatRequest::new(&self.settings.model_name, vec![ChatMessage::user(prompt)])
            .with_sampling(self.settings.temperature, self.settings.max_tokens);
        if let Some(stop) = stop {
            request = request.with_stop(stop);
        }
        let reply = self.llm.chat(request).await?;
        Ok(reply.text().trim().to_string())
    }

    pub async fn write_query(&self, question: &str) -> Result<String, ApiError> {
        let table_info = self.db.table_info().await?;
        let prompt = QUERY_PROMPT
            .replace("{top_k}", &self.settings.top_k.to_string())
            .replace("{table_info}", &table_info)
            .replace("{question}", question);
        let raw = self
            .complete(prompt, Some(vec!["\nSQLResult:".to_string()]))
            .await?;
        Ok(extract_sql_query(&raw))
    }

    /// Runs the whole chain. SQL errors do not abort it; they become the
    /// result text so the answer step can explain what went wrong.
    pub async fn run(&self, question: &str) -> Result<ChainRun, ApiError> {
        let query = self.write_query(question).await?;
        tracing::debug!("Generated SQL: {}", query);

        let result = match ensure_read_only(&query) {
            Ok(()) => match self.db.run(&query).await {
                Ok(rows) => rows,
                Err(err) => format!("Error: {}", err),
            },
            Err(reason) => {
                tracing::warn!("Refused generated SQL ({}): {}", reason, query);
                format!("Error: {}", reason)
            }
        };

        let prompt = ANSWER_PROMPT
            .replace("{question}", question)
            .replace("{query}", &query)
            .replace("{result}", &result);
        let answer = self.complete(prompt, None).await?;

        Ok(ChainRun {
            query,
            result,
            answer,
        })
    }
}

/// Pulls the SQL statement out of a model reply that may carry a
/// `SQLQuery:` label, a trailing `SQLResult:` section or a code fence.
pub fn extract_sql_query(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let body = after.find("```").map(|end| &after[..end]).unwrap_or(after);
        text = body
            .strip_prefix("sqlite")
            .or_else(|| body.strip_prefix("sql"))
            .or_else(|| body.strip_prefix("SQL"))
            .unwrap_or(body)
            .trim();
    }

    if let Some(pos) = text.find("SQLQuery:") {
        text = text[pos + "SQLQuery:".len()..].trim();
    }
    if let Some(pos) = text.find("SQLResult:") {
        text = text[..pos].trim();
    }

    text.to_string()
}
