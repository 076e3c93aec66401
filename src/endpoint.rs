use crate::error::TurnError;
use crate::history::ConversationTurn;
use crate::logging;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Remote model: one request carrying the ordered turns, one reply text back
#[async_trait]
pub trait ModelEndpoint: Send + Sync {
    async fn complete(&self, messages: &[ConversationTurn]) -> Result<String, TurnError>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [ConversationTurn],
}

/// Read a response body. The body decides the outcome; HTTP status is not consulted.
///
/// - `{"error": {"message": ".."}}` is a declared error, message kept verbatim
/// - `{"choices": [{"message": {"content": ".."}}]}` yields the first choice's content
/// - anything else is a connectivity error
pub fn classify_response(body: &Value) -> Result<String, TurnError> {
    if let Some(error) = body.get("error").filter(|e| is_truthy(e)) {
        return match error.get("message").and_then(Value::as_str) {
            Some(message) => Err(TurnError::Declared(message.to_string())),
            None => Err(TurnError::Connectivity),
        };
    }

    body.get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(TurnError::Connectivity)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Connecting is bounded only once the user opted into a request timeout
fn connect_timeout_for(request_timeout: Option<Duration>) -> Option<Duration> {
    request_timeout.map(|timeout| timeout.min(Duration::from_secs(CONNECT_TIMEOUT_SECS)))
}

/// HTTP client for the chat worker endpoint
pub struct WorkerClient {
    client: Client,
    endpoint: String,
}

impl WorkerClient {
    /// `request_timeout` of `None` sets no timeout at all, connecting included
    pub fn new(endpoint: &str, request_timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(connect) = connect_timeout_for(request_timeout) {
            builder = builder.connect_timeout(connect);
        }
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl ModelEndpoint for WorkerClient {
    async fn complete(&self, messages: &[ConversationTurn]) -> Result<String, TurnError> {
        let request = CompletionRequest { messages };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                logging::log_error(None, &format!("Request to endpoint failed: {}", e));
                TurnError::Connectivity
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            logging::log_error(None, &format!("Failed to read response body: {}", e));
            TurnError::Connectivity
        })?;

        let body: Value = serde_json::from_str(&text).map_err(|e| {
            logging::log_error(
                None,
                &format!(
                    "Unparseable response ({}): {} - {}",
                    status,
                    e,
                    text.chars().take(200).collect::<String>()
                ),
            );
            TurnError::Connectivity
        })?;

        classify_response(&body)
    }
}
